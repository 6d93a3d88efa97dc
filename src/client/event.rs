use crate::identity::Identity;

/// A lifecycle transition recorded by the client registry.
///
/// Events are queued FIFO per registry and must be drained by the scene
/// layer once per tick; they are never expired automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Connected(Identity),
    Disconnected(Identity),
    TimedOut(Identity),
}

impl ClientEvent {
    pub fn identity(&self) -> &Identity {
        match self {
            ClientEvent::Connected(identity)
            | ClientEvent::Disconnected(identity)
            | ClientEvent::TimedOut(identity) => identity,
        }
    }
}
