//! System prompts for the two chat personas.

use tracing::warn;

use crate::types::UserContext;

/// A system-prompt family with its modes and the messages the relay returns
/// when the gateway refuses a request.
pub struct Persona {
    pub name: &'static str,
    base_prompt: &'static str,
    modes: &'static [(&'static str, &'static str)],
    pub rate_limited_message: &'static str,
    pub quota_message: &'static str,
    pub unavailable_message: &'static str,
}

impl Persona {
    /// Prompt for `mode`, falling back to the first (default) mode.
    pub fn mode_prompt(&self, mode: Option<&str>) -> &'static str {
        mode.and_then(|m| self.modes.iter().find(|(name, _)| *name == m))
            .unwrap_or(&self.modes[0])
            .1
    }

    pub fn default_mode(&self) -> &'static str {
        self.modes[0].0
    }

    /// The mode a request actually runs in: `requested` when this persona
    /// knows it, otherwise the default.
    pub fn resolve_mode(&self, requested: Option<&str>) -> &'static str {
        match requested {
            Some(mode) => self
                .modes
                .iter()
                .find(|(name, _)| *name == mode)
                .map(|(name, _)| *name)
                .unwrap_or_else(|| {
                    warn!(persona = self.name, mode, "unknown mode, using default");
                    self.default_mode()
                }),
            None => self.default_mode(),
        }
    }
}

pub static COACH: Persona = Persona {
    name: "coach",
    base_prompt: COACH_PROMPT,
    modes: COACH_MODES,
    rate_limited_message: "Rate limit exceeded. Please try again in a moment.",
    quota_message: "AI usage limit reached. Please contact support.",
    unavailable_message: "AI service temporarily unavailable",
};

pub static GENIE: Persona = Persona {
    name: "genie",
    base_prompt: GENIE_PROMPT,
    modes: GENIE_MODES,
    rate_limited_message: "Rate limit exceeded. Please try again shortly.",
    quota_message: "Usage limit reached. Please add credits.",
    unavailable_message: "Service temporarily unavailable",
};

const COACH_PROMPT: &str = "You are the Wellness Genius AI Coach, a commercial advisor for wellness, \
fitness and health-adjacent businesses.

Work through the C.L.E.A.R framework:
C - Context: a trust-sensitive market where retention and long-term engagement matter more than short-term activity.
L - Lens: commercial and behavioural, not motivational or therapeutic.
E - Expectation: actionable advice grounded in commercial reality. No hype, no guarantees.
A - Assumptions: never assume perfect data, unlimited resources, full compliance, or that AI is the answer.
R - Response: key insight, commercial implication, risk or limitation, recommended next action.

Priorities, in order: retention and lifetime value, decision clarity, risk reduction, sustainable monetisation.

Be conservative with financial assumptions. Use British English. Fix weak data foundations before scaling. \
Never lead with incentives for disengagement. Flag anything that would be uncomfortable to explain to a \
regulator, customer or journalist.

Tone: direct, practical and honest.";

const COACH_MODES: &[(&str, &str)] = &[
    (
        "general",
        "MODE: General Advisory\nGive balanced, practical guidance on any wellness business topic.",
    ),
    (
        "strategy",
        "MODE: Strategy & Planning\nFocus on 90-day planning, prioritisation, and avoiding premature AI investment.",
    ),
    (
        "retention",
        "MODE: Retention & Engagement\nFocus on habit formation and behaviour change. Recommend the lightest effective intervention first.",
    ),
    (
        "monetisation",
        "MODE: Monetisation & Commercial\nTranslate for a CFO, model conservatively, and use ranges rather than guarantees.",
    ),
    (
        "risk",
        "MODE: Risk & Governance\nFocus on trust, consent and regulatory exposure. Flag anything uncomfortable to explain publicly.",
    ),
    (
        "planning",
        "MODE: Execution & Planning\nFocus on practical next steps, board-ready updates, and what not to do.",
    ),
];

const GENIE_PROMPT: &str = "You are the Wellness Genie, a senior business operator for wellness, \
fitness and health businesses.

You are not a chatbot, a coach or a therapist. You watch the business, understand its context, speak \
like an experienced COO or CFO, take positions and defend them, and tell people what they need to hear.

Voice: calm, commercial, measured and slightly sceptical. Direct without being harsh. British English. \
No emojis and no motivational language.";

const GENIE_MODES: &[(&str, &str)] = &[
    (
        "daily_operator",
        "MODE: Daily Operator\nGive quick, practical answers for today's decisions. Lead with the answer.",
    ),
    (
        "weekly_review",
        "MODE: Weekly Review\nSummarise what changed, what matters, and the two or three things to act on this week.",
    ),
    (
        "decision_support",
        "MODE: Decision Support\nIdentify overlooked trade-offs, challenge the timing, estimate what could go wrong, and take a position.",
    ),
    (
        "board_mode",
        "MODE: Board / Investor\nSpeak in CFO language with conservative, defensible numbers. Anticipate objections. Format for executives.",
    ),
    (
        "build_mode",
        "MODE: Build Mode (90-Day Planning)\nProduce a prioritised plan: what to do first, what not to do, dependencies, resources and milestones. Be specific.",
    ),
];

pub fn coach_system_prompt(mode: Option<&str>, user_context: Option<&UserContext>) -> String {
    let mut prompt = String::from(COACH.base_prompt);
    if let Some(context) = user_context.map(context_lines).filter(|l| !l.is_empty()) {
        prompt.push_str("\n\nUSER CONTEXT (use this to personalise your guidance):\n");
        prompt.push_str(&context.join("\n"));
    }
    prompt.push_str("\n\n");
    prompt.push_str(COACH.mode_prompt(mode));
    prompt
}

pub fn genie_system_prompt(
    mode: Option<&str>,
    memory_context: Option<&str>,
    document_context: Option<&str>,
) -> String {
    let mut prompt = String::from(GENIE.base_prompt);
    if let Some(memory) = memory_context.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\n## BUSINESS CONTEXT (Use this to personalise responses):\n");
        prompt.push_str(memory);
    }
    if let Some(documents) = document_context.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\n## UPLOADED DOCUMENTS:\n");
        prompt.push_str(documents);
    }
    prompt.push_str("\n\n");
    prompt.push_str(GENIE.mode_prompt(mode));
    prompt
}

fn context_lines(context: &UserContext) -> Vec<String> {
    let fields = [
        ("Business Name", &context.business_name),
        ("Business Type", &context.business_type),
        ("Revenue Band", &context.business_size_band),
        ("Team Size", &context.team_size),
        ("Role", &context.role),
        ("Primary Goal", &context.primary_goal),
        ("Current Frustration", &context.frustration),
        ("AI Experience", &context.ai_experience),
        ("Current Tech", &context.current_tech),
        ("Decision Style", &context.decision_style),
        ("Recent Win", &context.biggest_win),
    ];
    fields
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("{label}: {v}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_falls_back_to_default() {
        assert_eq!(COACH.mode_prompt(Some("astrology")), COACH.mode_prompt(None));
        assert!(COACH.mode_prompt(None).starts_with("MODE: General Advisory"));
        assert_eq!(GENIE.default_mode(), "daily_operator");
    }

    #[test]
    fn resolve_mode_keeps_known_and_replaces_unknown() {
        assert_eq!(GENIE.resolve_mode(Some("board_mode")), "board_mode");
        assert_eq!(GENIE.resolve_mode(Some("general")), "daily_operator");
        assert_eq!(COACH.resolve_mode(None), "general");
    }

    #[test]
    fn coach_prompt_lists_present_profile_fields() {
        let context = UserContext {
            business_name: Some("Harbour Gym".into()),
            team_size: Some("12".into()),
            frustration: Some("   ".into()),
            ..Default::default()
        };
        let prompt = coach_system_prompt(Some("retention"), Some(&context));

        assert!(prompt.contains("USER CONTEXT"));
        assert!(prompt.contains("Business Name: Harbour Gym\nTeam Size: 12"));
        assert!(!prompt.contains("Current Frustration"));
        assert!(prompt.ends_with(COACH.mode_prompt(Some("retention"))));
    }

    #[test]
    fn coach_prompt_omits_empty_profile() {
        let prompt = coach_system_prompt(None, Some(&UserContext::default()));
        assert!(!prompt.contains("USER CONTEXT"));
    }

    #[test]
    fn genie_prompt_appends_context_blocks_in_order() {
        let prompt = genie_system_prompt(
            Some("build_mode"),
            Some("Two studios in Leeds"),
            Some(" "),
        );
        let memory_at = prompt.find("## BUSINESS CONTEXT").unwrap();
        let mode_at = prompt.find("MODE: Build Mode").unwrap();
        assert!(memory_at < mode_at);
        assert!(prompt.contains("Two studios in Leeds"));
        assert!(!prompt.contains("## UPLOADED DOCUMENTS"));
    }
}
