//! Client-facing message batching
//!
//! Outgoing messages are held until either `max_size` are pending or the
//! oldest has waited `timeout_ms`, then flushed as batches. Consecutive
//! messages for the same audience share a batch, so delivery order per client
//! is the emission order.

use crate::net::protocol::{encode, Audience, EncodeError, Outgoing, ServerMessage};

/// Messages for one audience, sent as a single frame
#[derive(Debug, Clone, PartialEq)]
pub struct ClientBatch {
    pub audience: Audience,
    pub messages: Vec<ServerMessage>,
}

impl ClientBatch {
    /// Length-prefixed frame: [4 bytes little-endian length][bincode payload]
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let payload = encode(&self.messages)?;
        let mut frame = Vec::with_capacity(payload.len() + 4);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

pub struct ClientBatcher {
    max_size: usize,
    timeout_ms: u64,
    pending: Vec<Outgoing>,
    /// When the oldest pending message arrived
    opened_at: Option<u64>,
}

impl ClientBatcher {
    pub fn new(max_size: usize, timeout_ms: u64) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            timeout_ms,
            pending: Vec::with_capacity(max_size),
            opened_at: None,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queue a message; returns batches if this filled the buffer
    pub fn push(&mut self, outgoing: Outgoing, now: u64) -> Option<Vec<ClientBatch>> {
        self.opened_at.get_or_insert(now);
        self.pending.push(outgoing);
        if self.pending.len() >= self.max_size {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Flush if the oldest pending message has waited long enough
    pub fn poll(&mut self, now: u64) -> Option<Vec<ClientBatch>> {
        let opened = self.opened_at?;
        if now.saturating_sub(opened) >= self.timeout_ms {
            Some(self.flush())
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> Vec<ClientBatch> {
        self.opened_at = None;
        let mut batches: Vec<ClientBatch> = Vec::new();
        for outgoing in self.pending.drain(..) {
            match batches.last_mut() {
                Some(last) if last.audience == outgoing.audience => last.messages.push(outgoing.message),
                _ => batches.push(ClientBatch {
                    audience: outgoing.audience,
                    messages: vec![outgoing.message],
                }),
            }
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::id::EntityId;
    use crate::net::protocol::decode;

    fn ammo(available: u32) -> ServerMessage {
        ServerMessage::Ammo { available }
    }

    #[test]
    fn test_flush_on_size() {
        let mut batcher = ClientBatcher::new(3, 1_000);
        assert!(batcher.push(Outgoing::broadcast(ammo(1)), 0).is_none());
        assert!(batcher.push(Outgoing::broadcast(ammo(2)), 0).is_none());
        let batches = batcher.push(Outgoing::broadcast(ammo(3)), 0).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].messages, vec![ammo(1), ammo(2), ammo(3)]);
        assert_eq!(batcher.pending_count(), 0);
    }

    #[test]
    fn test_flush_on_timeout() {
        let mut batcher = ClientBatcher::new(64, 25);
        assert!(batcher.poll(100).is_none());
        batcher.push(Outgoing::broadcast(ammo(1)), 100);
        batcher.push(Outgoing::broadcast(ammo(2)), 110);
        assert!(batcher.poll(124).is_none());
        let batches = batcher.poll(125).unwrap();
        assert_eq!(batches[0].messages.len(), 2);
        // Timer restarts with the next message
        batcher.push(Outgoing::broadcast(ammo(3)), 200);
        assert!(batcher.poll(210).is_none());
    }

    #[test]
    fn test_audience_runs_keep_order() {
        let ship = EntityId::generate();
        let mut batcher = ClientBatcher::new(64, 25);
        batcher.push(Outgoing::broadcast(ammo(1)), 0);
        batcher.push(Outgoing::directed(ship, ammo(2)), 0);
        batcher.push(Outgoing::directed(ship, ammo(3)), 0);
        batcher.push(Outgoing::broadcast(ammo(4)), 0);
        let batches = batcher.flush();
        let audiences: Vec<_> = batches.iter().map(|b| b.audience).collect();
        assert_eq!(
            audiences,
            vec![Audience::Everyone, Audience::Only(ship), Audience::Everyone]
        );
        assert_eq!(batches[1].messages, vec![ammo(2), ammo(3)]);
    }

    #[test]
    fn test_frame_layout() {
        let batch = ClientBatch {
            audience: Audience::Everyone,
            messages: vec![ammo(4)],
        };
        let frame = batch.encode().unwrap();
        let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
        let decoded: Vec<ServerMessage> = decode(&frame[4..]).unwrap();
        assert_eq!(decoded, vec![ammo(4)]);
    }
}
