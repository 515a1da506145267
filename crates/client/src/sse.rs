//! Server-sent event framing for the `/api/events` stream.

use std::collections::VecDeque;

use futures::{Stream, StreamExt, stream};
use protocol::RealtimeEvent;

use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Keep-alive comments and frames without data carry no event.
    pub fn into_event(self) -> Result<Option<RealtimeEvent>, ClientError> {
        if self.data.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.data)?))
    }
}

/// Incremental decoder; chunks may split frames and lines anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

fn frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|at| (at, 2));
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|at| (at, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut frame = SseFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => frame.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }
    if frame.event.is_none() && data_lines.is_empty() {
        return None;
    }
    frame.data = data_lines.join("\n");
    Some(frame)
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((at, separator)) = frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..at + separator).collect();
            let text = String::from_utf8_lossy(&raw[..at]);
            if let Some(frame) = parse_frame(&text) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Turns a byte stream into realtime events. Undecodable frames are logged
/// and skipped; transport errors end up in the stream.
pub fn decode_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<RealtimeEvent, ClientError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    let state = (bytes, SseDecoder::new(), VecDeque::<SseFrame>::new());
    stream::unfold(state, |(mut bytes, mut decoder, mut pending)| async move {
        loop {
            if let Some(frame) = pending.pop_front() {
                match frame.into_event() {
                    Ok(Some(event)) => return Some((Ok(event), (bytes, decoder, pending))),
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping undecodable realtime frame");
                        continue;
                    }
                }
            }
            match bytes.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.push(chunk.as_ref())),
                Some(Err(err)) => return Some((Err(err.into()), (bytes, decoder, pending))),
                None => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use protocol::realtime::{CONNECTED, TASK_CREATED};
    use uuid::Uuid;

    use super::*;

    fn frame_for(event: &RealtimeEvent) -> String {
        format!(
            "event: {}\ndata: {}\n\n",
            event.event,
            serde_json::to_string(event).unwrap()
        )
    }

    #[test]
    fn frames_split_across_chunks_are_reassembled() {
        let event = RealtimeEvent::new(TASK_CREATED, Some(Uuid::new_v4()), "task", None, None);
        let wire = frame_for(&event);
        let (head, tail) = wire.split_at(wire.len() / 2);

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head.as_bytes()).is_empty());
        let frames = decoder.push(tail.as_bytes());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some(TASK_CREATED));
        let decoded = frames[0].clone().into_event().unwrap().unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn keep_alive_comments_produce_no_frames() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b": ping\n\n").is_empty());
        let frames = decoder.push(b"data: a\r\ndata: b\r\n\r\n");
        assert_eq!(frames[0].data, "a\nb");
    }

    #[tokio::test]
    async fn byte_stream_decodes_into_events() {
        let ws = Uuid::new_v4();
        let first = RealtimeEvent::connected(ws);
        let second = RealtimeEvent::new(TASK_CREATED, Some(ws), "task", None, None);
        let wire = format!("{}: ping\n\nevent: junk\ndata: {{not json\n\n{}", frame_for(&first), frame_for(&second));
        let chunks: Vec<Result<Vec<u8>, ClientError>> = wire
            .as_bytes()
            .chunks(7)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();

        let events: Vec<RealtimeEvent> = decode_events(stream::iter(chunks))
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, CONNECTED);
        assert_eq!(events[1].event, TASK_CREATED);
    }
}
