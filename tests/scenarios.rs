use notequeue::{
    EntryKind, MidiMessage, QueueConfig, QueueError, Recorder, Release, Session, Ticks,
    TimedEvent, TrackSink,
};

fn session(capacity: usize, note_delay: Ticks) -> Session {
    Session::new(QueueConfig {
        capacity,
        ticks_per_unit: 1,
        note_delay,
        self_check: true,
        ..QueueConfig::default()
    })
    .unwrap()
}

fn schedule_note(session: &mut Session, pitch: u8, wait: Ticks) -> Result<(), QueueError> {
    session
        .schedule(wait, 1, EntryKind::Note { pitch }, 0, Release::Immediate, 0)
        .map(|_| ())
}

fn note_offs(recorder: &Recorder) -> Vec<(Ticks, u8)> {
    recorder
        .timeline()
        .into_iter()
        .filter_map(|(at, e)| match e.message {
            MidiMessage::NoteOff { pitch } => Some((at, pitch)),
            _ => None,
        })
        .collect()
}

#[test]
fn chord_with_shared_end_is_split_by_note_delay() {
    let mut session = session(2, 3);
    let mut out = Recorder::new();
    schedule_note(&mut session, 60, 10).unwrap();
    schedule_note(&mut session, 64, 10).unwrap();

    session.advance(20, false, &mut out).unwrap();
    assert_eq!(note_offs(&out), vec![(7, 64), (10, 60)]);
}

#[test]
fn triad_with_shared_end_fires_on_three_ticks() {
    let mut session = session(3, 3);
    let mut out = Recorder::new();
    for pitch in [60, 64, 67] {
        schedule_note(&mut session, pitch, 10).unwrap();
    }

    session.advance(20, false, &mut out).unwrap();
    assert_eq!(note_offs(&out), vec![(4, 67), (7, 64), (10, 60)]);
}

#[test]
fn chord_split_clamps_at_zero() {
    let mut session = session(2, 15);
    let mut out = Recorder::new();
    schedule_note(&mut session, 60, 10).unwrap();
    schedule_note(&mut session, 64, 10).unwrap();

    session.advance(20, false, &mut out).unwrap();
    assert_eq!(note_offs(&out), vec![(0, 64), (10, 60)]);
}

#[test]
fn overflow_is_reported_and_queue_keeps_working() {
    let mut session = session(2, 0);
    let mut out = Recorder::new();
    schedule_note(&mut session, 60, 10).unwrap();
    schedule_note(&mut session, 62, 12).unwrap();

    let err = schedule_note(&mut session, 64, 5).unwrap_err();
    assert_eq!(err, QueueError::CapacityExceeded { capacity: 2 });
    session.check().unwrap();

    session.advance(11, false, &mut out).unwrap();
    schedule_note(&mut session, 65, 4).unwrap();
    session.advance(10, false, &mut out).unwrap();
    session.flush(&mut out).unwrap();

    assert_eq!(note_offs(&out), vec![(10, 60), (12, 62), (15, 65)]);
    assert!(out.reports.is_empty());
}

struct Drums {
    out: Recorder,
    calls: u32,
}

impl TrackSink for Drums {
    fn emit(&mut self, event: TimedEvent) {
        self.out.emit(event);
    }

    fn progress_sequence(&mut self, _channel: u8, _session: &mut Session) {
        self.calls += 1;
    }

    fn report(&mut self, problem: &QueueError) {
        self.out.report(problem);
    }
}

#[test]
fn flush_skips_trigger_but_keeps_its_time() {
    let mut session = session(4, 0);
    let mut sink = Drums {
        out: Recorder::new(),
        calls: 0,
    };
    session
        .schedule(5, 1, EntryKind::Trigger, 9, Release::Immediate, 0)
        .unwrap();

    session.flush(&mut sink).unwrap();
    assert_eq!(sink.calls, 0);
    assert!(sink.out.events.is_empty());
    assert_eq!(session.timeline().pending, 5 + 25);
    assert!(session.queue().is_empty());
}

#[test]
fn flush_skips_leading_triggers_before_notes() {
    let mut session = session(4, 0);
    let mut sink = Drums {
        out: Recorder::new(),
        calls: 0,
    };
    session
        .schedule(5, 1, EntryKind::Trigger, 9, Release::Immediate, 0)
        .unwrap();
    schedule_note(&mut session, 60, 8).unwrap();
    session
        .schedule(12, 1, EntryKind::Trigger, 9, Release::Immediate, 0)
        .unwrap();

    session.flush(&mut sink).unwrap();
    assert_eq!(sink.calls, 0);
    assert_eq!(note_offs(&sink.out), vec![(8, 60)]);
    assert_eq!(
        sink.out.reports,
        vec![QueueError::SustainedNote {
            pitch: 60,
            channel: 0
        }]
    );
}

#[test]
fn sustained_note_is_reported_and_still_released() {
    let mut session = session(4, 0);
    let mut out = Recorder::new();
    schedule_note(&mut session, 67, 40).unwrap();
    session.advance(10, false, &mut out).unwrap();

    session.flush(&mut out).unwrap();
    assert_eq!(
        out.reports,
        vec![QueueError::SustainedNote {
            pitch: 67,
            channel: 0
        }]
    );
    assert_eq!(note_offs(&out), vec![(40, 67)]);
    assert_eq!(session.timeline().length, 40);
    assert_eq!(session.timeline().pending, 1 + 25);
}

#[test]
fn every_entry_fires_once_in_time_order() {
    let mut session = session(16, 2);
    let mut out = Recorder::new();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = |limit: u64| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed % limit
    };

    let mut scheduled = Vec::new();
    for step in 0..200u32 {
        let pitch = (step % 100) as u8;
        if session.queue().free_len() > 0 {
            let wait = next(40) as Ticks;
            schedule_note(&mut session, pitch, wait).unwrap();
            scheduled.push(pitch);
        }
        let queue = session.queue();
        assert_eq!(queue.len() + queue.free_len(), queue.capacity());

        session.advance(next(12) as Ticks, false, &mut out).unwrap();
        session.check().unwrap();
    }
    session.flush(&mut out).unwrap();

    let fired = note_offs(&out);
    assert!(fired.windows(2).all(|w| w[0].0 <= w[1].0));

    let mut fired: Vec<u8> = fired.into_iter().map(|(_, p)| p).collect();
    fired.sort_unstable();
    scheduled.sort_unstable();
    assert_eq!(fired, scheduled);
    assert_eq!(session.queue().free_len(), 16);
}

#[test]
fn shared_end_times_are_kept_apart() {
    let note_delay = 2;
    let mut session = session(16, note_delay);
    let mut out = Recorder::new();
    let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = |limit: u64| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed % limit
    };

    // Chords never end before anything already sounding, so no queued note
    // gets pulled in, and every end lies far enough ahead that nudging
    // through a full queue stays above zero.
    let mut now: Ticks = 0;
    let mut latest_end: Ticks = 0;
    let mut ends: Vec<Ticks> = Vec::new();
    while ends.len() < 120 {
        let members = 1 + next(4) as usize;
        if session.queue().free_len() >= members {
            let end = latest_end.max(now + 40) + next(3) as Ticks * 5;
            for _ in 0..members {
                schedule_note(&mut session, ends.len() as u8, end - now).unwrap();
                ends.push(end);
            }
            latest_end = end;
        }
        let step = next(15) as Ticks;
        session.advance(step, false, &mut out).unwrap();
        now += step;
    }
    session.advance((latest_end - now + 1).max(0), false, &mut out).unwrap();
    session.flush(&mut out).unwrap();
    assert!(out.reports.is_empty());

    let offs = note_offs(&out);
    assert_eq!(offs.len(), ends.len());
    assert!(offs.windows(2).all(|w| w[0].0 < w[1].0), "two notes share a tick");

    let mut fired = vec![0; ends.len()];
    for (at, pitch) in offs {
        fired[pitch as usize] = at;
    }
    for first in 0..ends.len() {
        for later in first + 1..ends.len() {
            if ends[first] == ends[later] {
                assert!(
                    fired[later] + note_delay <= fired[first],
                    "notes {first} and {later} end at {} but fired at {} and {}",
                    ends[first],
                    fired[first],
                    fired[later]
                );
            }
        }
    }
}

#[test]
fn fatal_errors_carry_the_queue_state() {
    let mut session = session(2, 0);
    schedule_note(&mut session, 60, 3).unwrap();

    let mut queue = session.queue().clone();
    let err = queue.pop_due().unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("p(60)-3->"));
}
