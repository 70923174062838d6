//! Realtime insert-event listener
//!
//! The hosted store pushes row-level change events over a long-lived SSE
//! stream. Each event carries one `data:` payload: a JSON envelope with the
//! inserted `chat_messages` row. The stream is filtered server-side by table
//! and event type, and client-side by `session_id` equality here.
//!
//! SSE field processing:
//!
//! - `data: [PING]` (case-insensitive) or `event: ping` -- silently
//!   discarded keepalives.
//! - Other `event:` values than `insert`/`INSERT` -- discarded.
//! - All other `data:` values -- parsed and forwarded when they match the
//!   subscribed session.
//!
//! There is no reconnect or resumption: a dropped stream simply ends the
//! channel, consistent with the no-retry error policy. Deduplication against
//! optimistic local appends happens in the message store, by message id.

use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::assistant::message::ChatMessage;
use crate::backend::rest::MessageRow;

/// A change event delivered on a realtime subscription
#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    /// A message row was inserted for the subscribed session
    Inserted(ChatMessage),
}

/// Receiving half of a realtime subscription
pub type MessageEvents = mpsc::UnboundedReceiver<MessageEvent>;

/// Envelope around a pushed row change.
#[derive(Debug, Deserialize)]
struct InsertEnvelope {
    #[serde(default)]
    table: String,
    record: MessageRow,
}

/// Spawn a listener task over an SSE byte stream
///
/// Returns the event receiver; the task ends when the stream does or when
/// the receiver is dropped.
pub(crate) fn spawn_insert_listener<S>(byte_stream: S, session_id: Uuid) -> MessageEvents
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        run_listener(byte_stream, session_id, tx).await;
    });
    rx
}

/// Consume the SSE stream until it ends, forwarding matching inserts.
async fn run_listener<S>(
    byte_stream: S,
    session_id: Uuid,
    tx: mpsc::UnboundedSender<MessageEvent>,
) where
    S: Stream<Item = reqwest::Result<Bytes>>,
{
    use futures::StreamExt;

    // Buffer accumulates raw bytes between `\n\n` boundaries.
    let mut buffer = String::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("realtime stream ended with error: {}", e);
                break;
            }
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(s) => s,
            Err(_) => continue,
        };

        buffer.push_str(text);

        // SSE events are separated by blank lines (`\n\n`).
        while let Some(pos) = buffer.find("\n\n") {
            let event_block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();
            if process_sse_event(&event_block, session_id, &tx).is_err() {
                // Receiver dropped: the subscription is over.
                return;
            }
        }
    }

    // Process any remaining partial event in the buffer.
    if !buffer.is_empty() {
        let _ = process_sse_event(&buffer, session_id, &tx);
    }

    tracing::debug!("realtime listener for session {} finished", session_id);
}

/// Process a single SSE event block (the text between two `\n\n` delimiters).
///
/// Returns `Err(())` only when the receiver has been dropped.
fn process_sse_event(
    event_block: &str,
    session_id: Uuid,
    tx: &mpsc::UnboundedSender<MessageEvent>,
) -> std::result::Result<(), ()> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // Lines starting with `:` are SSE comments; all others are ignored.
    }

    // Discard keepalive pings.
    if let Some(et) = event_type {
        if et.eq_ignore_ascii_case("ping") {
            return Ok(());
        }
        if !et.eq_ignore_ascii_case("insert") {
            return Ok(());
        }
    }

    let data = data_lines.join("\n");
    if data.is_empty() || data.eq_ignore_ascii_case("[ping]") {
        return Ok(());
    }

    let envelope: InsertEnvelope = match serde_json::from_str(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!("discarding unparseable realtime event: {}", e);
            return Ok(());
        }
    };

    if !envelope.table.is_empty() && envelope.table != "chat_messages" {
        return Ok(());
    }
    if envelope.record.session_id != session_id {
        return Ok(());
    }

    let message = envelope.record.into_message();
    tx.send(MessageEvent::Inserted(message)).map_err(|_| ())
}
