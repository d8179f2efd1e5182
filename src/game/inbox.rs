//! Hand-off queue into the simulation thread
//!
//! Uses crossbeam-channel for lock-free MPSC communication from connection
//! handlers and broker consumers to the game loop. Producers never touch
//! simulation state; the loop drains everything queued at the start of each
//! tick.

use crossbeam_channel::{unbounded, Receiver, SendError, Sender};

use crate::game::events::DomainEvent;
use crate::net::protocol::{ClientMessage, WireRecord};

/// Work queued for the simulation thread
#[derive(Debug, Clone)]
pub enum InboxItem {
    /// Command from a client connected to this node
    Command(ClientMessage),
    /// Event consumed from the broker, already decoded
    Replicated(DomainEvent),
    /// Raw broker record; decoded on the simulation thread
    Wire(WireRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InboxError {
    /// Game loop stopped
    #[error("inbox disconnected")]
    Disconnected,
}

impl<T> From<SendError<T>> for InboxError {
    fn from(_: SendError<T>) -> Self {
        InboxError::Disconnected
    }
}

/// Receiving side, owned by the game loop
pub struct Inbox {
    sender: Sender<InboxItem>,
    receiver: Receiver<InboxItem>,
}

impl Inbox {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Create a new sender handle for a producer
    pub fn sender(&self) -> InboxSender {
        InboxSender {
            sender: self.sender.clone(),
        }
    }

    /// Take everything queued so far
    pub fn drain(&self) -> Vec<InboxItem> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Clonable sender handle for producers
#[derive(Clone)]
pub struct InboxSender {
    sender: Sender<InboxItem>,
}

impl InboxSender {
    #[inline]
    pub fn send(&self, item: InboxItem) -> Result<(), InboxError> {
        self.sender.send(item).map_err(InboxError::from)
    }

    #[inline]
    pub fn command(&self, message: ClientMessage) -> Result<(), InboxError> {
        self.send(InboxItem::Command(message))
    }

    #[inline]
    pub fn replicated(&self, event: DomainEvent) -> Result<(), InboxError> {
        self.send(InboxItem::Replicated(event))
    }

    #[inline]
    pub fn wire(&self, record: WireRecord) -> Result<(), InboxError> {
        self.send(InboxItem::Wire(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::id::EntityId;
    use crate::net::protocol::Command;

    fn fire(ship: EntityId) -> ClientMessage {
        ClientMessage {
            ship,
            command: Command::Fire,
        }
    }

    #[test]
    fn test_inbox_submit_and_drain() {
        let inbox = Inbox::new();
        let sender = inbox.sender();
        let ship = EntityId::generate();

        sender.command(fire(ship)).unwrap();
        sender.replicated(DomainEvent::left(ship, 5)).unwrap();
        assert_eq!(inbox.pending_count(), 2);

        let items = inbox.drain();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], InboxItem::Command(_)));
        assert!(matches!(items[1], InboxItem::Replicated(_)));
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_inbox_keeps_order_across_senders() {
        let inbox = Inbox::new();
        let a = inbox.sender();
        let b = inbox.sender();
        let first = EntityId::generate();
        let second = EntityId::generate();

        a.command(fire(first)).unwrap();
        b.command(fire(second)).unwrap();
        a.command(fire(first)).unwrap();

        let ships: Vec<EntityId> = inbox
            .drain()
            .into_iter()
            .filter_map(|item| match item {
                InboxItem::Command(m) => Some(m.ship),
                _ => None,
            })
            .collect();
        assert_eq!(ships, vec![first, second, first]);
    }

    #[test]
    fn test_sender_from_other_thread() {
        let inbox = Inbox::new();
        let sender = inbox.sender();
        let ship = EntityId::generate();
        std::thread::spawn(move || {
            for _ in 0..100 {
                sender.command(fire(ship)).unwrap();
            }
        })
        .join()
        .unwrap();
        assert_eq!(inbox.drain().len(), 100);
    }

    #[test]
    fn test_disconnected_sender() {
        let inbox = Inbox::new();
        let sender = inbox.sender();
        drop(inbox);
        assert_eq!(
            sender.command(fire(EntityId::generate())),
            Err(InboxError::Disconnected)
        );
    }
}
