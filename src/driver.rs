//! Stream driver: turns a streamed chat-completion body into a growing
//! assistant message.
//!
//! The driver owns the message list for the duration of one turn and moves
//! through an explicit set of phases:
//!
//! ```text
//! Requesting -> Streaming -> Done
//!                         -> Cancelled
//!      \-----------------\-> Failed
//! ```
//!
//! Each decoded fragment is appended to the assistant entry and the whole
//! list is republished through a [`SnapshotSink`]. A failure rolls the
//! assistant entry back before the final snapshot goes out.

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::accumulator::AssistantTurn;
use crate::delta::{extract_delta, Delta};
use crate::error::{ChatError, NO_BODY_MESSAGE};
use crate::frame::{decode_line, Frame};
use crate::sse_codec::LineSplitter;
use crate::types::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Requesting,
    Streaming,
    Done,
    Cancelled,
    Failed,
}

/// What the rendering side receives while a turn is in flight.
#[derive(Debug)]
pub enum ChatEvent {
    Snapshot(Vec<ChatMessage>),
    Done { content: String },
    Cancelled { content: String },
    Failed(ChatError),
}

/// Receiver of message-list snapshots, one per applied fragment plus a final one.
pub trait SnapshotSink {
    fn publish(&mut self, messages: &[ChatMessage]);
}

impl SnapshotSink for () {
    fn publish(&mut self, _messages: &[ChatMessage]) {}
}

impl SnapshotSink for Vec<Vec<ChatMessage>> {
    fn publish(&mut self, messages: &[ChatMessage]) {
        self.push(messages.to_vec());
    }
}

impl SnapshotSink for mpsc::UnboundedSender<ChatEvent> {
    fn publish(&mut self, messages: &[ChatMessage]) {
        let _ = self.send(ChatEvent::Snapshot(messages.to_vec()));
    }
}

impl<S: SnapshotSink + ?Sized> SnapshotSink for &mut S {
    fn publish(&mut self, messages: &[ChatMessage]) {
        (**self).publish(messages);
    }
}

/// Per-request scratch state, never shared outside its driver.
struct StreamState {
    splitter: LineSplitter,
    bytes_received: usize,
}

/// How a turn ended, together with the message list as last published.
#[derive(Debug)]
pub struct TurnOutcome {
    pub phase: StreamPhase,
    pub messages: Vec<ChatMessage>,
    pub result: Result<String, ChatError>,
}

impl TurnOutcome {
    pub fn into_event(self) -> ChatEvent {
        match (self.phase, self.result) {
            (_, Err(err)) => ChatEvent::Failed(err),
            (StreamPhase::Cancelled, Ok(content)) => ChatEvent::Cancelled { content },
            (_, Ok(content)) => ChatEvent::Done { content },
        }
    }
}

pub struct StreamDriver<K> {
    phase: StreamPhase,
    state: StreamState,
    turn: AssistantTurn,
    messages: Vec<ChatMessage>,
    sink: K,
}

impl<K: SnapshotSink> StreamDriver<K> {
    /// Starts a turn over `messages`, which should already end with the
    /// user's new message.
    pub fn new(messages: Vec<ChatMessage>, sink: K) -> Self {
        Self {
            phase: StreamPhase::Requesting,
            state: StreamState {
                splitter: LineSplitter::new(),
                bytes_received: 0,
            },
            turn: AssistantTurn::begin(&messages),
            messages,
            sink,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn content(&self) -> &str {
        self.turn.content()
    }

    /// Response headers arrived with a success status.
    pub fn begin_streaming(&mut self) {
        if self.phase == StreamPhase::Requesting {
            self.phase = StreamPhase::Streaming;
        }
    }

    /// Feeds one chunk of the body. Returns the phase afterwards; `Done`
    /// means the sentinel was seen and no further input is needed.
    pub fn ingest(&mut self, chunk: &[u8]) -> StreamPhase {
        if self.phase != StreamPhase::Streaming {
            return self.phase;
        }
        self.state.bytes_received += chunk.len();
        self.state.splitter.feed(chunk);

        while let Some(line) = self.state.splitter.next_line() {
            match decode_line(&line) {
                Frame::Data(payload) => match extract_delta(payload) {
                    Delta::Fragment(text) => self.apply(&text),
                    Delta::Empty => {}
                    Delta::Incomplete => {
                        trace!(
                            pending = self.state.splitter.pending(),
                            "deferring undecodable frame to next chunk"
                        );
                        self.state.splitter.push_front(&line);
                        break;
                    }
                },
                Frame::Terminator => {
                    self.phase = StreamPhase::Done;
                    break;
                }
                Frame::Blank | Frame::Comment | Frame::Other => {}
            }
        }
        self.phase
    }

    fn apply(&mut self, fragment: &str) {
        self.turn.append(&mut self.messages, fragment);
        self.sink.publish(&self.messages);
    }

    /// The body ended. Whatever is still buffered is decoded one last time;
    /// frames that still don't parse are malformed and dropped.
    pub fn finish(mut self) -> TurnOutcome {
        if self.phase == StreamPhase::Streaming {
            if self.state.bytes_received == 0 {
                return self.fail(ChatError::RequestFailed(NO_BODY_MESSAGE.to_string()));
            }
            for line in self.state.splitter.finish() {
                match decode_line(&line) {
                    Frame::Data(payload) => match extract_delta(payload) {
                        Delta::Fragment(text) => self.apply(&text),
                        Delta::Empty => {}
                        Delta::Incomplete => {
                            warn!(frame = %line, "dropping malformed frame at end of stream")
                        }
                    },
                    Frame::Terminator => break,
                    Frame::Blank | Frame::Comment | Frame::Other => {}
                }
            }
        }
        self.complete()
    }

    fn complete(mut self) -> TurnOutcome {
        self.phase = StreamPhase::Done;
        self.sink.publish(&self.messages);
        debug!(chars = self.turn.content().len(), "assistant turn complete");
        TurnOutcome {
            phase: StreamPhase::Done,
            messages: self.messages,
            result: Ok(self.turn.into_content()),
        }
    }

    /// Terminal failure: roll back the partial assistant entry and publish
    /// the restored list.
    pub fn fail(mut self, err: ChatError) -> TurnOutcome {
        warn!(kind = ?err.kind(), error = %err, "chat stream failed");
        self.turn.rollback(&mut self.messages);
        self.phase = StreamPhase::Failed;
        self.sink.publish(&self.messages);
        TurnOutcome {
            phase: StreamPhase::Failed,
            messages: self.messages,
            result: Err(err),
        }
    }

    pub fn cancel(mut self) -> TurnOutcome {
        debug!("chat stream cancelled");
        self.phase = StreamPhase::Cancelled;
        TurnOutcome {
            phase: StreamPhase::Cancelled,
            messages: self.messages,
            result: Ok(self.turn.into_content()),
        }
    }

    /// Reads `body` to completion, honouring `cancel` before and during each
    /// read and failing with [`ChatError::Timeout`] when no chunk arrives
    /// within `idle_timeout`.
    pub async fn run<B, E>(
        mut self,
        body: B,
        cancel: &CancellationToken,
        idle_timeout: Option<Duration>,
    ) -> TurnOutcome
    where
        B: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        self.begin_streaming();
        futures::pin_mut!(body);

        loop {
            if cancel.is_cancelled() {
                return self.cancel();
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancel(),
                next = read_next(&mut body, idle_timeout) => next,
            };

            match next {
                Some(Some(Ok(chunk))) => {
                    trace!(len = chunk.len(), "received chunk");
                    if self.ingest(&chunk) == StreamPhase::Done {
                        return self.complete();
                    }
                }
                Some(Some(Err(err))) => return self.fail(ChatError::transport(err)),
                Some(None) => return self.finish(),
                None => {
                    let idle = idle_timeout.unwrap_or_default();
                    return self.fail(ChatError::Timeout(idle));
                }
            }
        }
    }
}

/// `None` when the idle timeout elapsed first.
async fn read_next<B>(body: &mut B, idle_timeout: Option<Duration>) -> Option<Option<B::Item>>
where
    B: Stream + Unpin,
{
    match idle_timeout {
        Some(idle) => tokio::time::timeout(idle, body.next()).await.ok(),
        None => Some(body.next().await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const HI_THERE: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n\
                            data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n\
                            data: [DONE]\n\n";

    fn frame(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    fn history() -> Vec<ChatMessage> {
        vec![ChatMessage::user("hello")]
    }

    fn run_chunks(chunks: &[&[u8]]) -> (TurnOutcome, Vec<Vec<ChatMessage>>) {
        let mut snapshots = Vec::new();
        let mut driver = StreamDriver::new(history(), &mut snapshots);
        driver.begin_streaming();
        let mut done = false;
        for chunk in chunks {
            if driver.ingest(chunk) == StreamPhase::Done {
                done = true;
                break;
            }
        }
        let outcome = if done { driver.complete() } else { driver.finish() };
        (outcome, snapshots)
    }

    #[test]
    fn accumulates_hi_there() {
        let (outcome, _) = run_chunks(&[HI_THERE.as_bytes()]);
        assert_eq!(outcome.phase, StreamPhase::Done);
        assert_eq!(outcome.result.unwrap(), "Hi there");
        assert_eq!(
            outcome.messages,
            vec![ChatMessage::user("hello"), ChatMessage::assistant("Hi there")]
        );
    }

    #[test]
    fn final_content_is_independent_of_chunk_boundaries() {
        let stream = format!(
            ": comment\n{}{}\r\n{}data: [DONE]\n",
            frame("Plan "),
            frame("for").trim_end(),
            frame(" Q3 café")
        );
        let bytes = stream.as_bytes();
        let (whole, _) = run_chunks(&[bytes]);
        let expected = whole.result.unwrap();
        assert_eq!(expected, "Plan for Q3 café");

        for cut in 1..bytes.len() {
            let (outcome, _) = run_chunks(&[&bytes[..cut], &bytes[cut..]]);
            assert_eq!(outcome.result.unwrap(), expected, "split at byte {cut}");
        }

        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        let (outcome, _) = run_chunks(&singles);
        assert_eq!(outcome.result.unwrap(), expected);
    }

    #[test]
    fn snapshots_grow_by_prefix_in_order() {
        let fragments = ["One", ", two", ", three"];
        let stream: String = fragments.iter().map(|f| frame(f)).collect();
        let (outcome, snapshots) = run_chunks(&[stream.as_bytes()]);

        // one per fragment plus the final snapshot
        assert_eq!(snapshots.len(), fragments.len() + 1);
        let mut expected = String::new();
        for (snapshot, fragment) in snapshots.iter().zip(fragments) {
            expected.push_str(fragment);
            assert_eq!(snapshot.len(), 2);
            assert_eq!(snapshot[1], ChatMessage::assistant(expected.clone()));
        }
        assert_eq!(outcome.result.unwrap(), "One, two, three");
    }

    #[test]
    fn recovers_json_split_across_chunks() {
        let (outcome, snapshots) = run_chunks(&[
            &b"data: {\"choices\":[{\"delta\":{\"content\""[..],
            &b":\"hello\"}}]}\n\n"[..],
        ]);
        assert_eq!(outcome.result.unwrap(), "hello");
        // one fragment, one final snapshot
        assert_eq!(snapshots.len(), 2);
    }

    #[test]
    fn undecodable_line_defers_rest_of_chunk() {
        let mut driver = StreamDriver::new(history(), ());
        assert_eq!(driver.phase(), StreamPhase::Requesting);
        driver.begin_streaming();
        let chunk = format!("data: {{\"choices\":\n{}", frame("later"));

        assert_eq!(driver.ingest(chunk.as_bytes()), StreamPhase::Streaming);
        assert_eq!(driver.content(), "");
        assert_eq!(driver.messages(), history().as_slice());

        // at end of input the malformed frame is dropped and the rest applied
        let outcome = driver.finish();
        assert_eq!(outcome.result.unwrap(), "later");
    }

    #[test]
    fn sentinel_and_eof_agree() {
        let body: String = ["a", "b", "c"].iter().map(|f| frame(f)).collect();
        let with_done = format!("{body}data: [DONE]\n\n");

        let (done, _) = run_chunks(&[with_done.as_bytes()]);
        let (eof, _) = run_chunks(&[body.as_bytes()]);
        assert_eq!(done.result.unwrap(), eof.result.unwrap());
    }

    #[test]
    fn unterminated_last_frame_is_applied_at_eof() {
        let body = format!("{}{}", frame("a"), frame("b").trim_end());
        let (outcome, _) = run_chunks(&[body.as_bytes()]);
        assert_eq!(outcome.result.unwrap(), "ab");
    }

    #[test]
    fn ignores_input_after_sentinel() {
        let body = format!("{}data: [DONE]\n{}", frame("kept"), frame("ignored"));
        let mut driver = StreamDriver::new(history(), ());
        driver.begin_streaming();
        assert_eq!(driver.ingest(body.as_bytes()), StreamPhase::Done);
        assert_eq!(driver.ingest(frame("more").as_bytes()), StreamPhase::Done);
        assert_eq!(driver.content(), "kept");
    }

    #[test]
    fn empty_body_is_request_failed() {
        let (outcome, snapshots) = run_chunks(&[]);
        assert_eq!(outcome.phase, StreamPhase::Failed);
        let err = outcome.result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestFailed);
        assert_eq!(err.to_string(), NO_BODY_MESSAGE);
        assert_eq!(snapshots, vec![history()]);
    }

    #[tokio::test]
    async fn transport_error_rolls_back_partial_message() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from(frame("partial"))),
            Err("connection reset".to_string()),
        ];
        let mut snapshots = Vec::new();
        let driver = StreamDriver::new(history(), &mut snapshots);
        let outcome = driver
            .run(futures::stream::iter(chunks), &CancellationToken::new(), None)
            .await;

        assert_eq!(outcome.phase, StreamPhase::Failed);
        assert_eq!(outcome.result.unwrap_err().kind(), ErrorKind::Transport);
        assert_eq!(outcome.messages, history());
        // the partial message was visible, then withdrawn
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0][1].content, "partial");
        assert_eq!(snapshots[1], history());
    }

    #[tokio::test]
    async fn cancelled_token_stops_reading() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let chunks: Vec<Result<Bytes, String>> = vec![Ok(Bytes::from(frame("never")))];

        let outcome = StreamDriver::new(history(), ())
            .run(futures::stream::iter(chunks), &cancel, None)
            .await;
        assert_eq!(outcome.phase, StreamPhase::Cancelled);
        assert_eq!(outcome.result.unwrap(), "");
        assert_eq!(outcome.messages, history());
    }

    #[tokio::test]
    async fn cancel_during_pending_read() {
        let cancel = CancellationToken::new();
        let body = futures::stream::iter(vec![Ok::<_, String>(Bytes::from(frame("kept")))])
            .chain(futures::stream::pending());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = StreamDriver::new(history(), ())
            .run(body, &cancel, None)
            .await;
        assert_eq!(outcome.phase, StreamPhase::Cancelled);
        assert_eq!(outcome.result.unwrap(), "kept");
        assert_eq!(outcome.messages[1].content, "kept");
    }

    #[tokio::test]
    async fn idle_timeout_fails_and_rolls_back() {
        let body = futures::stream::iter(vec![Ok::<_, String>(Bytes::from(frame("slow")))])
            .chain(futures::stream::pending());

        let outcome = StreamDriver::new(history(), ())
            .run(
                body,
                &CancellationToken::new(),
                Some(Duration::from_millis(20)),
            )
            .await;
        assert_eq!(outcome.phase, StreamPhase::Failed);
        assert_eq!(outcome.result.unwrap_err().kind(), ErrorKind::Timeout);
        assert_eq!(outcome.messages, history());
    }

    #[tokio::test]
    async fn channel_sink_receives_snapshots() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let chunks: Vec<Result<Bytes, String>> = vec![Ok(Bytes::from(HI_THERE))];
        let outcome = StreamDriver::new(history(), tx)
            .run(futures::stream::iter(chunks), &CancellationToken::new(), None)
            .await;

        let mut contents = Vec::new();
        while let Ok(ChatEvent::Snapshot(messages)) = rx.try_recv() {
            contents.push(messages.last().map(|m| m.content.clone()).unwrap_or_default());
        }
        assert_eq!(contents, vec!["Hi", "Hi there", "Hi there"]);
        assert!(matches!(outcome.into_event(), ChatEvent::Done { content } if content == "Hi there"));
    }
}
