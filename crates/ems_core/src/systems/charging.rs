//! Charging sessions: pool selection, slot queueing, completion and
//! interruption, and the FIFO handoff when a slot frees up.

use bevy_ecs::prelude::{Entity, Res, ResMut};

use crate::battery::{charging_minutes, gained_kwh};
use crate::chargers::{ChargingStationRegistry, PoolChoice, SiteKind};
use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::ecs::{Activity, Ambulance, ChargeKind, ChargePhase, ChargeSession, Fleet};
use crate::error::{SimulationError, SimulationFault};
use crate::locks::{ChargerGrant, ChargerResponse};
use crate::network::{NodeId, RoadNetwork};
use crate::records::{AmbulanceRecord, SimRecords};

use super::drive::begin_drive_to_base;

/// A freed charger slot handed to the front waiter. Applied only after the
/// releasing ambulance's borrow is dropped.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingGrant {
    pub grant: ChargerGrant,
}

/// Open a charging session at a site: pick a pool, take a slot or queue.
///
/// `lock_request` is the relief hold backing the session, `None` for a
/// drop-off charge running under the service hold.
#[allow(clippy::too_many_arguments)]
pub(crate) fn start_charge_session(
    entity: Entity,
    activity: &mut Activity,
    site_node: NodeId,
    site_kind: SiteKind,
    kind: ChargeKind,
    target_kwh: f64,
    lock_request: Option<u64>,
    clock: &mut SimulationClock,
    registry: &mut ChargingStationRegistry,
    records: &mut SimRecords,
    fault: &mut SimulationFault,
) {
    let now = clock.now();
    let Some(site) = registry.site_mut(site_node, site_kind) else {
        fault.latch(SimulationError::NoChargerConfigured { node: site_node });
        return;
    };
    let choice = match site.choose(site_node, &mut records.no_free_charger) {
        Ok(choice) => choice,
        Err(err) => {
            fault.latch(err);
            return;
        }
    };
    let Some(pool) = site.pool_mut(choice) else {
        fault.latch(SimulationError::NoChargerConfigured { node: site_node });
        return;
    };
    let speed_kw = pool.speed_kw;
    let response = pool.slots.request(entity, now);

    let (ticket, phase) = match response {
        ChargerResponse::Granted { ticket } => {
            let seq = clock.schedule_in(
                charging_minutes(target_kwh, speed_kw),
                EventKind::ChargeCompleted,
                Some(entity),
            );
            (
                ticket,
                ChargePhase::Charging {
                    since: now,
                    event_seq: seq,
                },
            )
        }
        ChargerResponse::Queued { ticket } => (ticket, ChargePhase::Waiting),
    };

    activity.charge = Some(ChargeSession {
        site: site_node,
        kind,
        fast: choice == PoolChoice::Fast,
        speed_kw,
        target_kwh,
        ticket,
        requested_at: now,
        lock_request,
        phase,
    });
}

/// Tear down the ambulance's charging session before its target is met.
///
/// A plugged-in session keeps the energy gained so far and frees the slot,
/// possibly granting it onward; a still-queued ticket is withdrawn. Either
/// way the session outcome is recorded.
pub(crate) fn interrupt_charge(
    ambulance: &mut Ambulance,
    activity: &mut Activity,
    now: f64,
    registry: &mut ChargingStationRegistry,
    records: &mut SimRecords,
    fault: &mut SimulationFault,
) -> Option<PendingGrant> {
    let Some(session) = activity.charge.take() else {
        return None;
    };
    let site_kind = match session.kind {
        ChargeKind::Base => SiteKind::Base,
        ChargeKind::DropOff | ChargeKind::Hospital => SiteKind::Hospital,
    };
    let choice = if session.fast {
        PoolChoice::Fast
    } else {
        PoolChoice::Regular
    };
    let Some(pool) = registry
        .site_mut(session.site, site_kind)
        .and_then(|site| site.pool_mut(choice))
    else {
        fault.latch(SimulationError::NoChargerConfigured { node: session.site });
        return None;
    };

    match session.phase {
        ChargePhase::Charging { since, .. } => {
            let gained = gained_kwh(since, now, session.speed_kw);
            let waited = since - session.requested_at;
            records.push_ambulance_event(AmbulanceRecord::charging(
                ambulance.id as u64,
                now,
                ambulance.battery.level(),
                session.kind.code(),
                session.site,
                session.speed_kw,
                waited,
                true,
                Some((now - since, gained)),
            ));
            if let Err(err) = ambulance.battery.charge(gained, ambulance.id) {
                fault.latch(err);
            }
            pool.slots.release(session.ticket).map(|grant| PendingGrant { grant })
        }
        ChargePhase::Waiting => {
            pool.slots.cancel(session.ticket);
            let waited = now - session.requested_at;
            records.push_ambulance_event(AmbulanceRecord::charging(
                ambulance.id as u64,
                now,
                ambulance.battery.level(),
                session.kind.code(),
                session.site,
                session.speed_kw,
                waited,
                true,
                None,
            ));
            None
        }
    }
}

/// Plug in the promoted waiter and schedule its completion.
pub(crate) fn apply_charger_grant(
    pending: PendingGrant,
    clock: &mut SimulationClock,
    fleet: &mut Fleet,
    fault: &mut SimulationFault,
) {
    let now = clock.now();
    let Ok((_, ambulance, mut activity)) = fleet.get_mut(pending.grant.ambulance) else {
        return;
    };
    let session_ok = matches!(
        activity.charge,
        Some(ChargeSession {
            ticket,
            phase: ChargePhase::Waiting,
            ..
        }) if ticket == pending.grant.ticket
    );
    if !session_ok {
        fault.latch(SimulationError::UnexpectedChargerGrant {
            ambulance: ambulance.id,
        });
        return;
    }
    let session = activity.charge.as_mut().unwrap();
    let seq = clock.schedule_in(
        charging_minutes(session.target_kwh, session.speed_kw),
        EventKind::ChargeCompleted,
        Some(pending.grant.ambulance),
    );
    session.phase = ChargePhase::Charging {
        since: now,
        event_seq: seq,
    };
}

/// The session reached its target: book the energy, free the slot, release
/// the relief hold and move on according to the session kind.
pub fn charge_completed_system(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    mut registry: ResMut<ChargingStationRegistry>,
    mut records: ResMut<SimRecords>,
    mut fault: ResMut<SimulationFault>,
    mut fleet: Fleet,
) {
    let Some(entity) = current.0.subject else {
        return;
    };
    let now = clock.now();
    let mut pending = None;

    {
        let Ok((_, mut ambulance, mut activity)) = fleet.get_mut(entity) else {
            return;
        };
        let Some(session) = activity.charge else {
            return;
        };
        // A stale completion: the session it belonged to was interrupted.
        let since = match session.phase {
            ChargePhase::Charging { since, event_seq } if event_seq == current.0.seq => since,
            _ => return,
        };

        let waited = since - session.requested_at;
        records.push_ambulance_event(AmbulanceRecord::charging(
            ambulance.id as u64,
            now,
            ambulance.battery.level(),
            session.kind.code(),
            session.site,
            session.speed_kw,
            waited,
            false,
            Some((
                charging_minutes(session.target_kwh, session.speed_kw),
                session.target_kwh,
            )),
        ));
        let ambulance_id = ambulance.id;
        if let Err(err) = ambulance.battery.charge(session.target_kwh, ambulance_id) {
            fault.latch(err);
            return;
        }
        activity.charge = None;

        let site_kind = match session.kind {
            ChargeKind::Base => SiteKind::Base,
            ChargeKind::DropOff | ChargeKind::Hospital => SiteKind::Hospital,
        };
        let choice = if session.fast {
            PoolChoice::Fast
        } else {
            PoolChoice::Regular
        };
        if let Some(pool) = registry
            .site_mut(session.site, site_kind)
            .and_then(|site| site.pool_mut(choice))
        {
            pending = pool.slots.release(session.ticket).map(|grant| PendingGrant { grant });
        }

        if let Some(request) = session.lock_request {
            if ambulance.lock.release(request, now).is_some() {
                fault.latch(SimulationError::LockContended {
                    ambulance: ambulance.id,
                });
                return;
            }
        }

        // A hospital top-up exists only to make the base reachable again.
        if session.kind == ChargeKind::Hospital {
            begin_drive_to_base(entity, &mut ambulance, &mut activity, &mut clock, &net, &mut fault);
        }
    }

    if let Some(pending) = pending {
        apply_charger_grant(pending, &mut clock, &mut fleet, &mut fault);
    }
}
