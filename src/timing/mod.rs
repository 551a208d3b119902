mod clock;
mod queue;
mod sink;

pub use clock::{BEND_STEPS, Session, Timeline};
pub use queue::{Entry, EntryKind, Iter, NoteQueue, Release, SlotId, Ticks};
pub use sink::{EventProducer, Recorder, RingSink, TrackSink};
