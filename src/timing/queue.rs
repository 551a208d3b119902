use tracing::{debug, error, trace, warn};

use crate::config::QueueConfig;
use crate::error::{QueueDump, QueueError};

/// Smallest unit of musical time.
pub type Ticks = i64;
/// Handle of a slot in the queue arena.
pub type SlotId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A sounding note to be turned off.
    Note { pitch: u8 },
    /// Periodic accompaniment trigger; nothing to turn off.
    Trigger,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Release {
    #[default]
    Immediate,
    /// Ramp the pitch wheel away from centre before the note-off.
    BendRamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Ticks after the previous entry in queue order.
    pub delay: Ticks,
    pub kind: EntryKind,
    pub channel: u8,
    pub release: Release,
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    next: Option<SlotId>,
}

/// Fixed-capacity queue of pending note expiries.
///
/// Slots live in one arena and are threaded onto either the active queue,
/// ordered by due time with each delay relative to its predecessor, or the
/// free list, which is used as a stack. Only the head's delay changes when
/// time passes.
#[derive(Debug, Clone)]
pub struct NoteQueue {
    slots: Vec<Slot>,
    head: Option<SlotId>,
    free: Option<SlotId>,
    len: usize,
    ticks_per_unit: Ticks,
    note_delay: Ticks,
}

impl NoteQueue {
    pub fn new(capacity: usize, ticks_per_unit: Ticks, note_delay: Ticks) -> Self {
        let idle = Entry {
            delay: 0,
            kind: EntryKind::Trigger,
            channel: 0,
            release: Release::Immediate,
        };
        let mut queue = Self {
            slots: vec![Slot { entry: idle, next: None }; capacity],
            head: None,
            free: None,
            len: 0,
            ticks_per_unit,
            note_delay,
        };
        queue.reset();
        queue
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity, config.ticks_per_unit, config.note_delay)
    }

    /// Empties the queue and threads every slot back onto the free list.
    pub fn reset(&mut self) {
        let capacity = self.slots.len();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.next = (i + 1 < capacity).then_some(i + 1);
        }
        self.head = None;
        self.free = (capacity > 0).then_some(0);
        self.len = 0;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn free_len(&self) -> usize {
        self.slots.len() - self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<SlotId> {
        self.head
    }

    pub fn front(&self) -> Option<&Entry> {
        self.head.map(|at| &self.slots[at].entry)
    }

    /// Entries in due order, each paired with its absolute remaining time.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            cursor: self.head,
            elapsed: 0,
        }
    }

    /// Converts a note length of `num / denom` units plus `extra` ticks
    /// into a wait, never below zero.
    pub fn wait_for(&self, num: i64, denom: i64, extra: Ticks) -> Result<Ticks, QueueError> {
        let scaled = self
            .ticks_per_unit
            .checked_mul(num)
            .and_then(|product| product.checked_div(denom))
            .ok_or(QueueError::InvalidDuration { num, denom })?;
        Ok(scaled.saturating_add(extra).max(0))
    }

    /// Queues an expiry `num / denom` units plus `extra` ticks from now.
    ///
    /// A full queue is reported and the entry dropped; the queue itself is
    /// left untouched.
    pub fn schedule(
        &mut self,
        num: i64,
        denom: i64,
        kind: EntryKind,
        channel: u8,
        release: Release,
        extra: Ticks,
    ) -> Result<SlotId, QueueError> {
        let wait = self.wait_for(num, denom, extra)?;
        let id = self.allocate()?;
        self.slots[id].entry = Entry {
            delay: wait,
            kind,
            channel,
            release,
        };
        self.link(id, wait);
        debug!(slot = id, wait, ?kind, channel, "scheduled");
        Ok(id)
    }

    fn allocate(&mut self) -> Result<SlotId, QueueError> {
        let Some(id) = self.free else {
            let err = QueueError::CapacityExceeded {
                capacity: self.capacity(),
            };
            warn!("{err}");
            return Err(err);
        };
        self.free = self.slots[id].next.take();
        self.len += 1;
        Ok(id)
    }

    fn release(&mut self, id: SlotId) {
        self.slots[id].next = self.free;
        self.free = Some(id);
        self.len -= 1;
    }

    fn link(&mut self, id: SlotId, wait: Ticks) {
        let mut target = wait;
        let mut tied = false;

        let (prev, cursor, rest) = loop {
            let (prev, cursor, rest, tie) = self.locate(target, tied);
            if tie && self.note_delay > 0 {
                // An entry already ends at the target: aim one note delay
                // earlier and look again, so no two entries share a tick.
                target = (target - self.note_delay).max(0);
                tied = true;
                continue;
            }
            tied |= tie;
            break (prev, cursor, rest);
        };

        if let Some(at) = cursor {
            let queued = self.slots[at].entry.delay;
            self.slots[at].entry.delay = if tied {
                queued - rest
            } else {
                // The queued note now ends relative to the new one, pulled
                // in by the note delay so the two never end together.
                (queued - rest - self.note_delay).max(0)
            };
        }
        self.slots[id].entry.delay = rest;
        self.slots[id].next = cursor;
        match prev {
            Some(p) => self.slots[p].next = Some(id),
            None => self.head = Some(id),
        }
    }

    /// Finds where an entry due in `target` ticks belongs. Returns the
    /// predecessor, the successor, the delay relative to the predecessor and
    /// whether the successor ends exactly at `target`. Zero targets pass
    /// entries that are already due unless `tied` is set, in which case they
    /// go in front of everything.
    fn locate(
        &self,
        target: Ticks,
        tied: bool,
    ) -> (Option<SlotId>, Option<SlotId>, Ticks, bool) {
        let mut rest = target;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(at) = cursor {
            let queued = self.slots[at].entry.delay;
            if queued > rest {
                return (prev, cursor, rest, false);
            }
            if queued == rest && (rest > 0 || tied) {
                return (prev, cursor, rest, rest > 0);
            }
            rest -= queued;
            prev = cursor;
            cursor = self.slots[at].next;
        }
        (prev, None, rest, false)
    }

    /// Moves the head `ticks` closer to being due. A no-op when empty.
    pub(crate) fn advance_head(&mut self, ticks: Ticks) {
        if let Some(at) = self.head {
            self.slots[at].entry.delay -= ticks;
            trace!(slot = at, delay = self.slots[at].entry.delay, "head advanced");
        }
    }

    /// Unlinks the due head and returns its slot to the free list.
    pub fn pop_due(&mut self) -> Result<Entry, QueueError> {
        let Some(at) = self.head else {
            let err = QueueError::EmptyQueue { dump: self.dump() };
            error!("{err}");
            return Err(err);
        };
        let Slot { entry, next } = self.slots[at].clone();
        if entry.delay != 0 {
            let err = QueueError::HeadNotDue {
                delay: entry.delay,
                dump: self.dump(),
            };
            error!("{err}");
            return Err(err);
        }
        self.head = next;
        self.release(at);
        Ok(entry)
    }

    /// Removes the head whether or not it is due. Its delay is carried over
    /// to the successor so later entries keep their due times.
    pub(crate) fn discard_head(&mut self) -> Option<Entry> {
        let at = self.head?;
        let Slot { entry, next } = self.slots[at].clone();
        if let Some(n) = next {
            self.slots[n].entry.delay += entry.delay;
        }
        self.head = next;
        self.release(at);
        Some(entry)
    }

    pub fn dump(&self) -> QueueDump {
        let mut chain = Vec::new();
        let mut cursor = self.head;
        // Bounded so a corrupted chain cannot loop forever.
        for _ in 0..self.slots.len() {
            let Some(at) = cursor.filter(|&at| at < self.slots.len()) else {
                break;
            };
            let entry = &self.slots[at].entry;
            chain.push((entry.kind, entry.delay));
            cursor = self.slots[at].next;
        }
        QueueDump {
            head: self.head,
            free: self.free,
            chain,
        }
    }

    /// Verifies that every slot sits on exactly one list and that both
    /// lists are well formed.
    pub fn check(&self) -> Result<(), QueueError> {
        let mut seen = vec![false; self.slots.len()];
        let mut problems = Vec::new();

        let used = self.walk(self.head, "queue", true, &mut seen, &mut problems);
        let free = self.walk(self.free, "free list", false, &mut seen, &mut problems);

        if used != self.len {
            problems.push(format!("queue holds {used} entries, expected {}", self.len));
        }
        if used + free != self.slots.len() {
            problems.push(format!("used = {used} free = {free}"));
        }
        for (i, _) in seen.iter().enumerate().filter(|(_, hit)| !**hit) {
            problems.push(format!("slot {i} is on neither list"));
        }

        if problems.is_empty() {
            return Ok(());
        }
        let err = QueueError::Corrupted {
            problems,
            dump: self.dump(),
        };
        error!("{err}");
        Err(err)
    }

    fn walk(
        &self,
        start: Option<SlotId>,
        list: &str,
        active: bool,
        seen: &mut [bool],
        problems: &mut Vec<String>,
    ) -> usize {
        let mut count = 0;
        let mut cursor = start;
        while let Some(at) = cursor {
            if at >= self.slots.len() {
                problems.push(format!("{list} link {at} out of range"));
                break;
            }
            if seen[at] {
                problems.push(format!("slot {at} reached twice from {list}"));
                break;
            }
            seen[at] = true;
            count += 1;
            if active && self.slots[at].entry.delay < 0 {
                problems.push(format!(
                    "slot {at} has negative delay {}",
                    self.slots[at].entry.delay
                ));
            }
            cursor = self.slots[at].next;
        }
        count
    }
}

pub struct Iter<'a> {
    queue: &'a NoteQueue,
    cursor: Option<SlotId>,
    elapsed: Ticks,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Ticks, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        let queue = self.queue;
        let slot = &queue.slots[self.cursor?];
        self.elapsed += slot.entry.delay;
        self.cursor = slot.next;
        Some((self.elapsed, &slot.entry))
    }
}
