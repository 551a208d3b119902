use ringbuf::traits::Producer;
use tracing::warn;

use super::{Session, Ticks};
use crate::error::QueueError;
use crate::events::TimedEvent;

pub type EventProducer = ringbuf::HeapProd<TimedEvent>;

/// Everything the clock hands back to the track being generated.
pub trait TrackSink {
    /// Writes one timed event to the output track.
    fn emit(&mut self, event: TimedEvent);

    fn note_off(&mut self, delta: Ticks, pitch: u8, channel: u8) {
        self.emit(TimedEvent::note_off(delta, pitch, channel));
    }

    /// Called when an accompaniment trigger for `channel` falls due. The
    /// session is handed over so the next pattern step can be scheduled and
    /// its events timed off the pending counter.
    fn progress_sequence(&mut self, _channel: u8, _session: &mut Session) {}

    /// Receives recoverable problems found while the track was processed.
    fn report(&mut self, _problem: &QueueError) {}
}

/// Keeps every event and report in memory.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<TimedEvent>,
    pub reports: Vec<QueueError>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events paired with their time since the start of the track.
    pub fn timeline(&self) -> Vec<(Ticks, TimedEvent)> {
        let mut now = 0;
        self.events
            .iter()
            .map(|event| {
                now += event.delta;
                (now, *event)
            })
            .collect()
    }
}

impl TrackSink for Recorder {
    fn emit(&mut self, event: TimedEvent) {
        self.events.push(event);
    }

    fn report(&mut self, problem: &QueueError) {
        self.reports.push(problem.clone());
    }
}

/// Forwards events into a ring buffer for a consumer on another thread.
pub struct RingSink {
    producer: EventProducer,
    dropped: usize,
}

impl RingSink {
    pub fn new(producer: EventProducer) -> Self {
        Self {
            producer,
            dropped: 0,
        }
    }

    /// Events lost because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl TrackSink for RingSink {
    fn emit(&mut self, event: TimedEvent) {
        if self.producer.try_push(event).is_err() {
            self.dropped += 1;
            warn!(dropped = self.dropped, "event buffer is full");
        }
    }

    fn report(&mut self, problem: &QueueError) {
        warn!("{problem}");
    }
}
