use std::fmt;

use crate::timing::{EntryKind, SlotId, Ticks};

/// Everything that can go wrong while scheduling or draining the note queue.
///
/// Recoverable variants describe malformed music (an unterminated chord, a
/// note left sounding at the end of a track) and processing carries on.
/// Fatal variants mean the queue's own invariants are broken; they carry a
/// snapshot of the queue so the state can be inspected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("note queue full ({capacity} slots); probably an unterminated chord")]
    CapacityExceeded { capacity: usize },

    #[error("invalid note length {num}/{denom}")]
    InvalidDuration { num: i64, denom: i64 },

    #[error("note {pitch} on channel {channel} sustained beyond end of track")]
    SustainedNote { pitch: u8, channel: u8 },

    #[error("nothing to remove from queue\n{dump}")]
    EmptyQueue { dump: QueueDump },

    #[error("queue head has non-zero time {delay}\n{dump}")]
    HeadNotDue { delay: Ticks, dump: QueueDump },

    #[error("queue check failed: {}\n{dump}", .problems.join("; "))]
    Corrupted { problems: Vec<String>, dump: QueueDump },
}

impl QueueError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            QueueError::EmptyQueue { .. }
                | QueueError::HeadNotDue { .. }
                | QueueError::Corrupted { .. }
        )
    }
}

/// Point-in-time copy of the queue, printed when a fatal error surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDump {
    pub head: Option<SlotId>,
    pub free: Option<SlotId>,
    /// Active entries in queue order with their relative delays.
    pub chain: Vec<(EntryKind, Ticks)>,
}

impl fmt::Display for QueueDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = |s: Option<SlotId>| s.map_or_else(|| "-".to_string(), |i| i.to_string());
        writeln!(f, "head = {} free = {}", slot(self.head), slot(self.free))?;
        write!(f, "Q:")?;
        for (kind, delay) in &self.chain {
            match kind {
                EntryKind::Note { pitch } => write!(f, "p({pitch})-{delay}->")?,
                EntryKind::Trigger => write!(f, "t-{delay}->")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("config serialize: {0}")]
    Serialize(#[from] ron::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
