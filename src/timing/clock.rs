use std::mem;

use tracing::{debug, instrument, trace, warn};

use super::queue::{EntryKind, NoteQueue, Release, SlotId, Ticks};
use super::sink::TrackSink;
use crate::config::QueueConfig;
use crate::error::{ConfigError, QueueError};
use crate::events::{BEND_CENTER, BEND_MAX, TimedEvent};

/// Pitch wheel messages written before a bent note-off.
pub const BEND_STEPS: Ticks = 8;

/// Running counters shared between the clock and the track generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeline {
    /// Ticks since the last event written to the track.
    pub pending: Ticks,
    /// Ticks since the last event written to the tempo track.
    pub track0: Ticks,
    /// Total ticks already written to the track.
    pub length: Ticks,
    /// Ticks the generator has already spent itself; taken off every
    /// advance.
    pub delay_correction: Ticks,
}

impl Timeline {
    /// Hands out the delta for an event being written now.
    pub fn take_pending(&mut self) -> Ticks {
        let delta = mem::take(&mut self.pending);
        self.length += delta;
        delta
    }

    pub fn take_track0(&mut self) -> Ticks {
        mem::take(&mut self.track0)
    }

    fn elapse(&mut self, ticks: Ticks) {
        self.pending += ticks;
        self.track0 += ticks;
    }
}

/// The note queue together with the clock that drains it, for one track.
#[derive(Debug, Clone)]
pub struct Session {
    queue: NoteQueue,
    timeline: Timeline,
    config: QueueConfig,
}

impl Session {
    pub fn new(config: QueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            queue: NoteQueue::from_config(&config),
            timeline: Timeline::default(),
            config,
        })
    }

    /// Starts a fresh track: empty queue, zeroed counters.
    pub fn reset(&mut self) {
        self.queue.reset();
        self.timeline = Timeline::default();
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn queue(&self) -> &NoteQueue {
        &self.queue
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn take_pending(&mut self) -> Ticks {
        self.timeline.take_pending()
    }

    pub fn take_track0(&mut self) -> Ticks {
        self.timeline.take_track0()
    }

    pub fn set_delay_correction(&mut self, ticks: Ticks) {
        self.timeline.delay_correction = ticks;
    }

    pub fn check(&self) -> Result<(), QueueError> {
        self.queue.check()
    }

    /// Queues the end of a note (or the next accompaniment step) `num /
    /// denom` units plus `extra` ticks from now.
    pub fn schedule(
        &mut self,
        num: i64,
        denom: i64,
        kind: EntryKind,
        channel: u8,
        release: Release,
        extra: Ticks,
    ) -> Result<SlotId, QueueError> {
        let slot = self.queue.schedule(num, denom, kind, channel, release, extra)?;
        if self.config.self_check {
            self.queue.check()?;
        }
        Ok(slot)
    }

    /// Lets `ticks` pass, firing every entry that falls due on the way.
    ///
    /// An entry is only fired once time moves strictly past it, so an entry
    /// due exactly at the end of this step waits for the next one. With
    /// `at_end` set, accompaniment triggers are dropped instead of fired.
    pub fn advance<S>(&mut self, ticks: Ticks, at_end: bool, sink: &mut S) -> Result<(), QueueError>
    where
        S: TrackSink + ?Sized,
    {
        let mut time = ticks;

        while let Some(head) = self.queue.front().copied().filter(|e| e.delay < time) {
            self.timeline.elapse(head.delay);
            time -= head.delay;
            self.queue.advance_head(head.delay);
            let entry = self.queue.pop_due()?;

            match entry.kind {
                EntryKind::Trigger if at_end => {
                    trace!(channel = entry.channel, "trigger dropped at end");
                }
                EntryKind::Trigger => {
                    debug!(channel = entry.channel, "progress sequence");
                    sink.progress_sequence(entry.channel, self);
                }
                EntryKind::Note { pitch } => {
                    match entry.release {
                        Release::Immediate => {
                            sink.note_off(self.timeline.pending, pitch, entry.channel);
                        }
                        Release::BendRamp => self.bend_release(pitch, entry.channel, sink),
                    }
                    let delta = self.timeline.take_pending();
                    debug!(pitch, channel = entry.channel, delta, "note off");
                }
            }
        }

        self.queue.advance_head(time);
        self.timeline.elapse(time - self.timeline.delay_correction);
        trace!(pending = self.timeline.pending, "advanced {ticks}");

        if self.config.self_check {
            self.queue.check()?;
        }
        Ok(())
    }

    /// Spreads the pending ticks over a pitch wheel ramp, then turns the
    /// note off and recentres the wheel.
    fn bend_release<S>(&mut self, pitch: u8, channel: u8, sink: &mut S)
    where
        S: TrackSink + ?Sized,
    {
        let step = self.timeline.pending / BEND_STEPS;
        let mut remaining = self.timeline.pending;
        let mut bend = i32::from(BEND_CENTER);
        let mut velocity = self.config.bend_velocity;

        for _ in 0..BEND_STEPS {
            bend = bend.saturating_add(velocity).clamp(0, i32::from(BEND_MAX));
            velocity = velocity.saturating_add(self.config.bend_acceleration);
            sink.emit(TimedEvent::pitch_wheel(step, channel, bend as u16));
            remaining -= step;
        }

        sink.note_off(remaining, pitch, channel);
        sink.emit(TimedEvent::pitch_wheel(0, channel, BEND_CENTER));
    }

    /// Ends the track: drops outstanding accompaniment triggers, turns off
    /// anything still sounding and pads a short silence.
    #[instrument(skip_all, fields(queued = self.queue.len()))]
    pub fn flush<S>(&mut self, sink: &mut S) -> Result<(), QueueError>
    where
        S: TrackSink + ?Sized,
    {
        let mut skipped = 0;
        while self
            .queue
            .front()
            .is_some_and(|e| e.kind == EntryKind::Trigger)
        {
            skipped += self.queue.discard_head().map_or(0, |e| e.delay);
        }
        if skipped != 0 || !self.queue.is_empty() {
            self.advance(skipped, true, sink)?;
        }

        while let Some(head) = self.queue.front().copied() {
            if let EntryKind::Note { pitch } = head.kind {
                let problem = QueueError::SustainedNote {
                    pitch,
                    channel: head.channel,
                };
                warn!("{problem}");
                sink.report(&problem);
            }
            self.advance(head.delay + 1, true, sink)?;
        }

        self.advance(self.config.tail_padding, true, sink)?;
        debug!(length = self.timeline.length, "track flushed");
        Ok(())
    }
}
