pub mod config;
pub mod error;
pub mod events;
pub mod timing;

pub use config::QueueConfig;
pub use error::{ConfigError, QueueDump, QueueError};
pub use events::{MidiMessage, TimedEvent};
pub use timing::{EntryKind, NoteQueue, Recorder, Release, Session, Ticks, TrackSink};
