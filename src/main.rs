use std::path::PathBuf;

use notequeue::timing::RingSink;
use notequeue::{
    EntryKind, MidiMessage, QueueConfig, QueueError, Release, Session, TimedEvent, TrackSink,
};
use ringbuf::{
    HeapRb,
    traits::{Consumer, Split},
};
use tracing_subscriber::EnvFilter;

const DRUM_CHANNEL: u8 = 9;
const CLOSED_HAT: u8 = 42;

/// Plays a hi-hat on every trigger and books the next one a beat later.
struct Accompaniment {
    out: RingSink,
    reports: Vec<QueueError>,
    bars: u32,
}

impl TrackSink for Accompaniment {
    fn emit(&mut self, event: TimedEvent) {
        self.out.emit(event);
    }

    fn progress_sequence(&mut self, channel: u8, session: &mut Session) {
        let delta = session.take_pending();
        self.out.emit(TimedEvent {
            delta,
            channel,
            message: MidiMessage::NoteOn {
                pitch: CLOSED_HAT,
                velocity: 80,
            },
        });
        let hat = EntryKind::Note { pitch: CLOSED_HAT };
        if let Err(e) = session.schedule(1, 8, hat, channel, Release::Immediate, 0) {
            self.report(&e);
        }
        if self.bars > 0 {
            self.bars -= 1;
            if let Err(e) = session.schedule(1, 1, EntryKind::Trigger, channel, Release::Immediate, 0) {
                self.report(&e);
            }
        }
    }

    fn report(&mut self, problem: &QueueError) {
        self.reports.push(problem.clone());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => QueueConfig::load(&path)?,
        None => QueueConfig::default(),
    };
    let unit = config.ticks_per_unit;
    let mut session = Session::new(config)?;
    let (producer, mut consumer) = HeapRb::<TimedEvent>::new(1024).split();
    let mut sink = Accompaniment {
        out: RingSink::new(producer),
        reports: Vec::new(),
        bars: 6,
    };

    // (pitches, length as a fraction of a beat, bend on release)
    let phrase: [(&[u8], i64, i64, bool); 5] = [
        (&[60, 64, 67], 1, 1, false),
        (&[62], 1, 2, false),
        (&[64], 1, 2, false),
        (&[65, 69], 2, 1, false),
        (&[72], 1, 1, true),
    ];

    session.schedule(0, 1, EntryKind::Trigger, DRUM_CHANNEL, Release::Immediate, 0)?;
    for (pitches, num, denom, bend) in phrase {
        for &pitch in pitches {
            let delta = session.take_pending();
            sink.emit(TimedEvent {
                delta,
                channel: 0,
                message: MidiMessage::NoteOn { pitch, velocity: 96 },
            });
            let release = if bend { Release::BendRamp } else { Release::Immediate };
            if let Err(e) = session.schedule(num, denom, EntryKind::Note { pitch }, 0, release, 0) {
                sink.report(&e);
            }
        }
        session.advance(unit * num / denom, false, &mut sink)?;
    }
    session.flush(&mut sink)?;

    let mut at = 0;
    while let Some(event) = consumer.try_pop() {
        at += event.delta;
        println!("{at:>6} ch{:<2} {:?}", event.channel, event.message);
    }
    if sink.out.dropped() > 0 {
        println!("warning: {} events did not fit the buffer", sink.out.dropped());
    }
    for problem in &sink.reports {
        println!("warning: {problem}");
    }
    println!("track length: {} ticks", session.timeline().length);
    Ok(())
}
