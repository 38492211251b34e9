use std::collections::VecDeque;

use bevy_ecs::prelude::{Component, Entity, Query, Resource};
use serde::Serialize;

use crate::battery::Battery;
use crate::locks::{PreemptibleLock, RequestId, TicketId};
use crate::network::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineKind {
    Diesel,
    Electric,
}

impl EngineKind {
    pub fn is_electric(&self) -> bool {
        matches!(self, EngineKind::Electric)
    }
}

/// One vehicle of the fleet. The lock serialises its activities: patient
/// service acquires it at [`crate::locks::PRIORITY_SERVICE`] and may preempt
/// a holder at [`crate::locks::PRIORITY_RELIEF`] (base relief driving or
/// charging), never the other way round.
#[derive(Debug, Component)]
pub struct Ambulance {
    pub id: u32,
    pub engine: EngineKind,
    pub base: NodeId,
    /// Last road node reached. Updated when a leg completes or when an
    /// interrupted leg snaps to the nearest node.
    pub location: NodeId,
    pub battery: Battery,
    pub lock: PreemptibleLock,
}

/// A relief drive from the last service location back to the base station.
#[derive(Debug, Clone, Copy)]
pub struct DriveToBase {
    pub from: NodeId,
    /// Lock grant time; elapsed driving is measured from here on interrupt.
    pub started_at: f64,
    pub lock_request: RequestId,
    /// Seq of the pending `ReachedBase` event; stale deliveries are dropped.
    pub event_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeKind {
    DropOff,
    Hospital,
    Base,
}

impl ChargeKind {
    /// Numeric code used in the ambulance output table.
    pub fn code(&self) -> u64 {
        match self {
            ChargeKind::DropOff => 0,
            ChargeKind::Hospital => 1,
            ChargeKind::Base => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ChargePhase {
    /// Ticket queued at the charger, no slot granted yet.
    Waiting,
    /// Plugged in since `since`; `event_seq` guards the pending
    /// `ChargeCompleted` event.
    Charging { since: f64, event_seq: u64 },
}

/// A charging session at a station, from ticket request to unplug.
#[derive(Debug, Clone, Copy)]
pub struct ChargeSession {
    pub site: NodeId,
    pub kind: ChargeKind,
    /// Whether the ticket targets the fast pool or the regular pool.
    pub fast: bool,
    pub speed_kw: f64,
    pub target_kwh: f64,
    pub ticket: TicketId,
    /// When the charger ticket was filed; queue waiting is measured from here.
    pub requested_at: f64,
    /// Relief-priority hold on the ambulance. `None` while charging during a
    /// hospital drop-off, where the service hold is still in place.
    pub lock_request: Option<RequestId>,
    pub phase: ChargePhase,
}

/// State of one patient episode, from assignment to release.
#[derive(Debug, Clone, Copy)]
pub struct ServiceEpisode {
    pub patient_idx: usize,
    pub patient_node: NodeId,
    pub hospital: NodeId,
    /// Emergency call time; waiting and response times are measured from here.
    pub call_time: f64,
    pub to_hospital: bool,
    pub lock_request: RequestId,
    /// Set on arrival at the patient, written out when the episode closes.
    pub response_time: Option<f64>,
}

/// What an ambulance is currently doing. At most one of `service`, `drive`
/// and `charge` is populated, except during a hospital drop-off where a
/// `ChargeKind::DropOff` session runs under the service hold.
#[derive(Debug, Component, Default)]
pub struct Activity {
    /// Claimed for a patient; set at dispatch, before service starts.
    pub assigned: bool,
    /// Actively serving a patient.
    pub helping: bool,
    pub service: Option<ServiceEpisode>,
    pub drive: Option<DriveToBase>,
    pub charge: Option<ChargeSession>,
}

impl Activity {
    pub fn is_free(&self) -> bool {
        !self.assigned && !self.helping
    }

    pub fn is_driving_to_base(&self) -> bool {
        self.drive.is_some()
    }

    /// True only once a charger slot has been granted, not while queued.
    pub fn is_charging(&self) -> bool {
        matches!(
            self.charge,
            Some(ChargeSession {
                phase: ChargePhase::Charging { .. },
                ..
            })
        )
    }
}

/// The fleet as systems query it. Dispatch reads it; event handlers mutate
/// the subject ambulance through [`bevy_ecs::prelude::Query::get_mut`].
pub type Fleet<'w, 's> = Query<'w, 's, (Entity, &'static mut Ambulance, &'static mut Activity)>;

/// A call waiting for an ambulance. Held by value in [`WaitingPatients`]
/// until dispatch succeeds, then moved into the winning ambulance's
/// [`ServiceEpisode`].
#[derive(Debug, Clone, Copy)]
pub struct WaitingPatient {
    pub idx: usize,
    pub call_time: f64,
    pub node: NodeId,
    pub hospital: NodeId,
    pub to_hospital: bool,
}

/// Fleet entities in ascending ambulance id order. Dispatch scans in this
/// order so ties resolve to the lowest id.
#[derive(Debug, Resource, Default)]
pub struct FleetRoster {
    entities: Vec<Entity>,
}

impl FleetRoster {
    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// FIFO queue of unserved calls. Dispatch scans front to back and may remove
/// from the middle, so older calls keep precedence without blocking newer
/// ones an ambulance can actually reach.
#[derive(Debug, Resource, Default)]
pub struct WaitingPatients {
    queue: VecDeque<WaitingPatient>,
}

impl WaitingPatients {
    pub fn push(&mut self, patient: WaitingPatient) {
        self.queue.push_back(patient);
    }

    pub fn remove(&mut self, index: usize) -> Option<WaitingPatient> {
        self.queue.remove(index)
    }

    pub fn get(&self, index: usize) -> Option<&WaitingPatient> {
        self.queue.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaitingPatient> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
