use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

/// Discriminates the per-event systems in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SimulationStarted,
    PatientArrival,
    ReachedPatient,
    AidCompleted,
    ReachedHospital,
    DropOffCompleted,
    ReachedBase,
    ChargeCompleted,
    QueueSweep,
}

/// A scheduled resumption at a simulated time (minutes).
///
/// `subject` is the ambulance the event resumes, where one exists. `seq` is
/// unique per clock and breaks ties at equal time in insertion order.
/// Activities that can be preempted keep the `seq` of their pending
/// completion event; delivery with a stale `seq` means the activity was
/// interrupted after scheduling and the event must be discarded.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub time: f64,
    pub seq: u64,
    pub kind: EventKind,
    pub subject: Option<Entity>,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Event {}

impl Ord for Event {
    // Reversed so that BinaryHeap pops the earliest (time, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event the schedule is currently processing.
#[derive(Resource, Debug, Clone, Copy)]
pub struct CurrentEvent(pub Event);

/// Simulated clock plus the pending event queue.
///
/// Time is `f64` minutes and only advances when an event is popped; the
/// schedule runs to quiescence between pops, so everything triggered by one
/// event observes the same `now`.
#[derive(Resource, Debug, Default)]
pub struct SimulationClock {
    now: f64,
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedule `kind` at an absolute time, returning the event's `seq`.
    pub fn schedule_at(&mut self, time: f64, kind: EventKind, subject: Option<Entity>) -> u64 {
        debug_assert!(time >= self.now, "event scheduled in the past");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            time,
            seq,
            kind,
            subject,
        });
        seq
    }

    /// Schedule `kind` after `delay` minutes, returning the event's `seq`.
    pub fn schedule_in(&mut self, delay: f64, kind: EventKind, subject: Option<Entity>) -> u64 {
        self.schedule_at(self.now + delay, kind, subject)
    }

    /// Pop the earliest event and advance the clock to its time.
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.time;
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<f64> {
        self.events.peek().map(|event| event.time)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
