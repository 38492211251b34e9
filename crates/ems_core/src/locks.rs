use std::collections::VecDeque;

use bevy_ecs::prelude::Entity;

use crate::error::SimulationError;

/// Priority of a patient-service acquisition. Preempts [`PRIORITY_RELIEF`].
pub const PRIORITY_SERVICE: u8 = 1;
/// Priority of a drive-to-base or charging acquisition.
pub const PRIORITY_RELIEF: u8 = 2;

/// Identifies one acquisition of a [`PreemptibleLock`].
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hold {
    pub request: RequestId,
    pub priority: u8,
    pub since: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Waiter {
    request: RequestId,
    priority: u8,
    enqueued_at: f64,
}

/// Outcome of [`PreemptibleLock::request`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    /// A free slot was taken immediately.
    Granted { request: RequestId },
    /// A lower-priority holder was evicted; the caller must run the
    /// victim's interrupt handling before proceeding.
    Preempting { request: RequestId, victim: Hold },
    /// All slots busy and nobody preemptible; waiting in priority order.
    Queued { request: RequestId },
}

/// Priority lock with preemption, the arbiter of one ambulance.
///
/// Capacity is 1 for ambulances; the type supports larger capacities but
/// nothing in the simulation uses them. A priority-1 request evicts a
/// priority-2 holder on the spot. Priorities other than 1 and 2 are a
/// programming error.
#[derive(Debug, Clone, Default)]
pub struct PreemptibleLock {
    capacity: usize,
    next_request: RequestId,
    holders: Vec<Hold>,
    queue: Vec<Waiter>,
}

impl PreemptibleLock {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_request: 0,
            holders: Vec::new(),
            queue: Vec::new(),
        }
    }

    /// Acquire a slot at `priority`, preempting if the weakest holder is
    /// strictly lower-priority than the requester.
    pub fn request(&mut self, priority: u8, now: f64) -> Result<Acquisition, SimulationError> {
        if priority != PRIORITY_SERVICE && priority != PRIORITY_RELIEF {
            return Err(SimulationError::InvalidPriority { priority });
        }
        let request = self.next_request;
        self.next_request += 1;

        if self.holders.len() < self.capacity {
            self.holders.push(Hold {
                request,
                priority,
                since: now,
            });
            return Ok(Acquisition::Granted { request });
        }

        // Weakest holder: numerically largest priority, then latest grant.
        let victim_slot = self
            .holders
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.since.total_cmp(&b.since))
            })
            .map(|(i, _)| i);

        if let Some(i) = victim_slot {
            if self.holders[i].priority > priority {
                let victim = self.holders.swap_remove(i);
                self.holders.push(Hold {
                    request,
                    priority,
                    since: now,
                });
                return Ok(Acquisition::Preempting { request, victim });
            }
        }

        let waiter = Waiter {
            request,
            priority,
            enqueued_at: now,
        };
        let at = self
            .queue
            .iter()
            .position(|w| (w.priority, w.request) > (priority, request))
            .unwrap_or(self.queue.len());
        self.queue.insert(at, waiter);
        Ok(Acquisition::Queued { request })
    }

    /// Release a held slot. If anyone is waiting, the highest-priority,
    /// earliest-queued waiter is promoted and returned.
    pub fn release(&mut self, request: RequestId, now: f64) -> Option<Hold> {
        if let Some(i) = self.holders.iter().position(|h| h.request == request) {
            self.holders.swap_remove(i);
        }
        if self.holders.len() < self.capacity {
            if !self.queue.is_empty() {
                let waiter = self.queue.remove(0);
                let hold = Hold {
                    request: waiter.request,
                    priority: waiter.priority,
                    since: now,
                };
                self.holders.push(hold);
                return Some(hold);
            }
        }
        None
    }

    /// Withdraw a still-queued request. No effect if already granted.
    pub fn cancel(&mut self, request: RequestId) -> bool {
        if let Some(i) = self.queue.iter().position(|w| w.request == request) {
            self.queue.remove(i);
            true
        } else {
            false
        }
    }

    pub fn holders(&self) -> &[Hold] {
        &self.holders
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.holders.is_empty()
    }

    /// Grant time of the holder acquired under `request`, if still held.
    pub fn held_since(&self, request: RequestId) -> Option<f64> {
        self.holders
            .iter()
            .find(|h| h.request == request)
            .map(|h| h.since)
    }
}

/// Identifies one position in a [`ChargerQueue`].
pub type TicketId = u64;

/// Outcome of [`ChargerQueue::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerResponse {
    Granted { ticket: TicketId },
    Queued { ticket: TicketId },
}

/// A waiter promoted to a charger slot when a session released it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargerGrant {
    pub ticket: TicketId,
    pub ambulance: Entity,
    pub enqueued_at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChargerWaiter {
    ticket: TicketId,
    ambulance: Entity,
    enqueued_at: f64,
}

/// Capacity-N strict-FIFO charger pads of one type at one site.
///
/// Never preempts: an ambulance that stops needing a queued slot must
/// withdraw its ticket itself.
#[derive(Debug, Clone, Default)]
pub struct ChargerQueue {
    capacity: usize,
    next_ticket: TicketId,
    in_use: Vec<TicketId>,
    queue: VecDeque<ChargerWaiter>,
}

impl ChargerQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_ticket: 0,
            in_use: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_free_slot(&self) -> bool {
        self.in_use.len() < self.capacity
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Take a slot or join the FIFO queue.
    pub fn request(&mut self, ambulance: Entity, now: f64) -> ChargerResponse {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if self.has_free_slot() {
            self.in_use.push(ticket);
            ChargerResponse::Granted { ticket }
        } else {
            self.queue.push_back(ChargerWaiter {
                ticket,
                ambulance,
                enqueued_at: now,
            });
            ChargerResponse::Queued { ticket }
        }
    }

    /// Withdraw a ticket still in the queue.
    pub fn cancel(&mut self, ticket: TicketId) -> bool {
        if let Some(i) = self.queue.iter().position(|w| w.ticket == ticket) {
            self.queue.remove(i);
            true
        } else {
            false
        }
    }

    /// Free a slot; the front waiter, if any, takes it and is returned so
    /// the caller can start its charging session.
    pub fn release(&mut self, ticket: TicketId) -> Option<ChargerGrant> {
        if let Some(i) = self.in_use.iter().position(|t| *t == ticket) {
            self.in_use.swap_remove(i);
        }
        if self.has_free_slot() {
            if let Some(waiter) = self.queue.pop_front() {
                self.in_use.push(waiter.ticket);
                return Some(ChargerGrant {
                    ticket: waiter.ticket,
                    ambulance: waiter.ambulance,
                    enqueued_at: waiter.enqueued_at,
                });
            }
        }
        None
    }
}
