//! Event-handler systems, one per [`crate::clock::EventKind`].
//!
//! The runner pops one event at a time, publishes it as
//! [`crate::clock::CurrentEvent`] and runs the schedule; run conditions make
//! exactly one of these systems fire. Everything a handler triggers at the
//! same instant happens inside that call, so the schedule is quiescent
//! between events.

pub mod arrivals;
pub mod charging;
pub mod drive;
pub mod service;
pub mod sweep;
