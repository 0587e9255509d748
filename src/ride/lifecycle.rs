//! Guarded ride status transitions
//!
//! Every status change is expressed as a [`RideCommand`] issued by an
//! [`Actor`]. [`plan_transition`] checks that the actor may issue the command
//! and that the ride's current status permits it, then produces the next ride
//! record together with its history entry and, on completion, the settlement.
//! Nothing here touches storage; the service persists the plan with a
//! conditional write keyed on the ride's version.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::{Ride, RideHistoryEntry, RideStatus, VehicleClass};
use crate::app_config::AppSettings;
use crate::models::UserRole;
use crate::wallet::{Settlement, SettlementError};

/// Who is issuing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RideCommand {
    SelectVehicle { vehicle_class: VehicleClass },
    Accept,
    StartEnroute,
    ArriveAtPickup,
    StartTrip,
    Complete { tip: Decimal },
    CancelByCustomer { reason: Option<String> },
    CancelByDriver { reason: Option<String> },
    ForceStatus { status: RideStatus, note: Option<String> },
}

impl RideCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RideCommand::SelectVehicle { .. } => "select_vehicle",
            RideCommand::Accept => "accept",
            RideCommand::StartEnroute => "start_enroute",
            RideCommand::ArriveAtPickup => "arrive_at_pickup",
            RideCommand::StartTrip => "start_trip",
            RideCommand::Complete { .. } => "complete",
            RideCommand::CancelByCustomer { .. } => "cancel_by_customer",
            RideCommand::CancelByDriver { .. } => "cancel_by_driver",
            RideCommand::ForceStatus { .. } => "force_status",
        }
    }

    fn required_role(&self) -> UserRole {
        match self {
            RideCommand::SelectVehicle { .. } | RideCommand::CancelByCustomer { .. } => {
                UserRole::Customer
            }
            RideCommand::ForceStatus { .. } => UserRole::Admin,
            _ => UserRole::Driver,
        }
    }

    /// Statuses the command may be issued from
    fn allowed_from(&self) -> &'static [RideStatus] {
        use RideStatus::*;
        match self {
            RideCommand::SelectVehicle { .. } => &[Pending],
            RideCommand::Accept => &[Booked],
            RideCommand::StartEnroute => &[Accepted],
            RideCommand::ArriveAtPickup => &[Accepted, EnrouteToPickup],
            RideCommand::StartTrip => &[Accepted, EnrouteToPickup, AtPickup],
            RideCommand::Complete { .. } => &[InProgress],
            RideCommand::CancelByCustomer { .. } => {
                &[Pending, Booked, Accepted, EnrouteToPickup, AtPickup]
            }
            RideCommand::CancelByDriver { .. } => &[Accepted, EnrouteToPickup, AtPickup],
            RideCommand::ForceStatus { .. } => {
                &[Pending, Booked, Accepted, EnrouteToPickup, AtPickup, InProgress]
            }
        }
    }

    fn target(&self) -> RideStatus {
        match self {
            RideCommand::SelectVehicle { .. } => RideStatus::Booked,
            RideCommand::Accept => RideStatus::Accepted,
            RideCommand::StartEnroute => RideStatus::EnrouteToPickup,
            RideCommand::ArriveAtPickup => RideStatus::AtPickup,
            RideCommand::StartTrip => RideStatus::InProgress,
            RideCommand::Complete { .. } => RideStatus::Completed,
            RideCommand::CancelByCustomer { .. } => RideStatus::CancelledByCustomer,
            RideCommand::CancelByDriver { .. } => RideStatus::CancelledByDriver,
            RideCommand::ForceStatus { status, .. } => *status,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum TransitionError {
    #[error("Ride is already {0} and can no longer change")]
    Terminal(RideStatus),

    #[error("Cannot {command} a ride that is {from}")]
    NotAllowed {
        command: &'static str,
        from: RideStatus,
    },

    #[error("A {role} may not {command} a ride")]
    RoleNotPermitted {
        command: &'static str,
        role: &'static str,
    },

    #[error("Only a party to this ride may {0} it")]
    NotParty(&'static str),

    #[error("Ride cannot be {0} without a fare")]
    MissingFare(RideStatus),

    #[error("Ride cannot be {0} without an assigned driver")]
    MissingDriver(RideStatus),

    #[error("Admins cannot force a ride to {0}")]
    ForbiddenTarget(RideStatus),

    #[error("No fare configured for vehicle class {0:?}")]
    NoFareForClass(VehicleClass),

    #[error("Tips are disabled")]
    TipsDisabled,

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

/// A validated status change, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Version the write must find in the store
    pub expected_version: i64,
    pub expected_status: RideStatus,
    pub next: Ride,
    pub entry: RideHistoryEntry,
    pub settlement: Option<Settlement>,
}

/// Validate `command` against `ride` and build the resulting record
pub fn plan_transition(
    ride: &Ride,
    command: &RideCommand,
    actor: &Actor,
    settings: &AppSettings,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if ride.status.is_terminal() {
        return Err(TransitionError::Terminal(ride.status));
    }

    if actor.role != command.required_role() {
        return Err(TransitionError::RoleNotPermitted {
            command: command.name(),
            role: actor.role.as_str(),
        });
    }

    match command.required_role() {
        UserRole::Customer if ride.customer_id != actor.user_id => {
            return Err(TransitionError::NotParty(command.name()));
        }
        UserRole::Driver
            if *command != RideCommand::Accept && ride.driver_id != Some(actor.user_id) =>
        {
            return Err(TransitionError::NotParty(command.name()));
        }
        _ => {}
    }

    if !command.allowed_from().contains(&ride.status) {
        return Err(TransitionError::NotAllowed {
            command: command.name(),
            from: ride.status,
        });
    }

    let target = command.target();
    let mut next = ride.clone();
    let mut settlement = None;
    let mut note = None;

    match command {
        RideCommand::SelectVehicle { vehicle_class } => {
            let fare = settings
                .quote_fare(*vehicle_class, ride.distance_km())
                .ok_or(TransitionError::NoFareForClass(*vehicle_class))?;
            next.vehicle_class = Some(*vehicle_class);
            next.fare = Some(fare);
        }
        RideCommand::Accept => {
            next.driver_id = Some(actor.user_id);
        }
        RideCommand::Complete { tip } => {
            if *tip > Decimal::ZERO && !settings.toggles.tips_enabled {
                return Err(TransitionError::TipsDisabled);
            }
            let fare = ride.fare.ok_or(TransitionError::MissingFare(target))?;
            let split = Settlement::split(fare, *tip, settings.commission_rate)?;
            next.tip = split.tip;
            next.commission = Some(split.commission);
            next.driver_earnings = Some(split.driver_earnings);
            settlement = Some(split);
        }
        RideCommand::CancelByCustomer { reason } | RideCommand::CancelByDriver { reason } => {
            next.cancel_reason = reason.clone();
            note = reason.clone();
        }
        RideCommand::ForceStatus { status, note: admin_note } => {
            // Completion always goes through the driver so it is settled
            if *status == RideStatus::Completed || *status == ride.status {
                return Err(TransitionError::ForbiddenTarget(*status));
            }
            // Reopening a ride for dispatch releases the driver
            if !status.requires_driver() && !status.is_cancelled() {
                next.driver_id = None;
            }
            note = admin_note.clone();
        }
        RideCommand::StartEnroute | RideCommand::ArriveAtPickup | RideCommand::StartTrip => {}
    }

    if target.requires_fare() && !next.fare.is_some_and(|f| f >= Decimal::ZERO) {
        return Err(TransitionError::MissingFare(target));
    }
    if target.requires_driver() && next.driver_id.is_none() {
        return Err(TransitionError::MissingDriver(target));
    }

    next.status = target;
    next.version = ride.version + 1;
    next.updated_at = now;

    let entry = RideHistoryEntry {
        id: Uuid::new_v4(),
        ride_id: ride.id,
        from_status: Some(ride.status),
        to_status: target,
        actor_id: actor.user_id,
        actor_role: actor.role,
        version: next.version,
        note,
        created_at: now,
    };

    Ok(Transition {
        expected_version: ride.version,
        expected_status: ride.status,
        next,
        entry,
        settlement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer() -> Actor {
        Actor::new(Uuid::new_v4(), UserRole::Customer)
    }

    fn driver() -> Actor {
        Actor::new(Uuid::new_v4(), UserRole::Driver)
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), UserRole::Admin)
    }

    fn pending_ride(customer: &Actor) -> Ride {
        let now = Utc::now();
        Ride {
            id: Uuid::new_v4(),
            customer_id: customer.user_id,
            driver_id: None,
            pickup_address: "MG Road".into(),
            pickup_lat: None,
            pickup_lng: None,
            dropoff_address: "Airport".into(),
            dropoff_lat: None,
            dropoff_lng: None,
            vehicle_class: None,
            fare: None,
            tip: Decimal::ZERO,
            commission: None,
            driver_earnings: None,
            status: RideStatus::Pending,
            version: 1,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(ride: &Ride, command: RideCommand, actor: &Actor) -> Result<Ride, TransitionError> {
        plan_transition(ride, &command, actor, &AppSettings::default(), Utc::now()).map(|t| t.next)
    }

    /// Walk a ride through booking and acceptance
    fn accepted_ride(customer: &Actor, driver: &Actor) -> Ride {
        let ride = pending_ride(customer);
        let ride = apply(
            &ride,
            RideCommand::SelectVehicle {
                vehicle_class: VehicleClass::Sedan,
            },
            customer,
        )
        .unwrap();
        apply(&ride, RideCommand::Accept, driver).unwrap()
    }

    #[test]
    fn test_select_vehicle_books_with_fare() {
        let c = customer();
        let ride = pending_ride(&c);
        let t = plan_transition(
            &ride,
            &RideCommand::SelectVehicle {
                vehicle_class: VehicleClass::Sedan,
            },
            &c,
            &AppSettings::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(t.next.status, RideStatus::Booked);
        assert_eq!(t.next.fare, Some(dec!(110)));
        assert_eq!(t.next.version, 2);
        assert_eq!(t.expected_version, 1);
        assert_eq!(t.expected_status, RideStatus::Pending);
        assert_eq!(t.entry.from_status, Some(RideStatus::Pending));
        assert_eq!(t.entry.to_status, RideStatus::Booked);
        assert!(t.settlement.is_none());
    }

    #[test]
    fn test_select_vehicle_prices_by_distance() {
        let c = customer();
        let mut ride = pending_ride(&c);
        ride.pickup_lat = Some(0.0);
        ride.pickup_lng = Some(0.0);
        ride.dropoff_lat = Some(0.0);
        ride.dropoff_lng = Some(0.1);

        let booked = apply(
            &ride,
            RideCommand::SelectVehicle {
                vehicle_class: VehicleClass::Bike,
            },
            &c,
        )
        .unwrap();
        // ~11.12 km at 8/km on top of 30
        let fare = booked.fare.unwrap();
        assert!(fare > dec!(118) && fare < dec!(120), "fare {}", fare);
    }

    #[test]
    fn test_only_owner_can_select_vehicle() {
        let owner = customer();
        let other = customer();
        let ride = pending_ride(&owner);
        let err = apply(
            &ride,
            RideCommand::SelectVehicle {
                vehicle_class: VehicleClass::Mini,
            },
            &other,
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::NotParty("select_vehicle"));
    }

    #[test]
    fn test_pending_ride_cannot_be_accepted() {
        let c = customer();
        let ride = pending_ride(&c);
        let err = apply(&ride, RideCommand::Accept, &driver()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotAllowed {
                command: "accept",
                from: RideStatus::Pending
            }
        );
    }

    #[test]
    fn test_accept_assigns_driver() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        assert_eq!(ride.status, RideStatus::Accepted);
        assert_eq!(ride.driver_id, Some(d.user_id));
        assert_eq!(ride.version, 3);
    }

    #[test]
    fn test_accepted_ride_cannot_be_accepted_again() {
        let c = customer();
        let ride = accepted_ride(&c, &driver());
        let err = apply(&ride, RideCommand::Accept, &driver()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotAllowed {
                command: "accept",
                from: RideStatus::Accepted
            }
        );
    }

    #[test]
    fn test_customer_cannot_issue_driver_commands() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let err = apply(&ride, RideCommand::StartTrip, &c).unwrap_err();
        assert_eq!(
            err,
            TransitionError::RoleNotPermitted {
                command: "start_trip",
                role: "customer"
            }
        );
    }

    #[test]
    fn test_other_driver_cannot_drive_assigned_ride() {
        let c = customer();
        let ride = accepted_ride(&c, &driver());
        let err = apply(&ride, RideCommand::StartEnroute, &driver()).unwrap_err();
        assert_eq!(err, TransitionError::NotParty("start_enroute"));
    }

    #[test]
    fn test_full_lifecycle_with_optional_pickup_steps() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let ride = apply(&ride, RideCommand::StartEnroute, &d).unwrap();
        assert_eq!(ride.status, RideStatus::EnrouteToPickup);
        let ride = apply(&ride, RideCommand::ArriveAtPickup, &d).unwrap();
        assert_eq!(ride.status, RideStatus::AtPickup);
        let ride = apply(&ride, RideCommand::StartTrip, &d).unwrap();
        assert_eq!(ride.status, RideStatus::InProgress);

        // Pickup steps may be skipped
        let ride2 = accepted_ride(&c, &d);
        let ride2 = apply(&ride2, RideCommand::StartTrip, &d).unwrap();
        assert_eq!(ride2.status, RideStatus::InProgress);
    }

    #[test]
    fn test_complete_produces_settlement() {
        let c = customer();
        let d = driver();
        let mut ride = accepted_ride(&c, &d);
        ride.fare = Some(dec!(350));
        let ride = apply(&ride, RideCommand::StartTrip, &d).unwrap();

        let t = plan_transition(
            &ride,
            &RideCommand::Complete { tip: dec!(0) },
            &d,
            &AppSettings::default(),
            Utc::now(),
        )
        .unwrap();

        let s = t.settlement.unwrap();
        assert_eq!(s.commission, dec!(52.5));
        assert_eq!(s.driver_earnings, dec!(297.5));
        assert_eq!(t.next.status, RideStatus::Completed);
        assert_eq!(t.next.commission, Some(dec!(52.5)));
        assert_eq!(t.next.driver_earnings, Some(dec!(297.5)));
    }

    #[test]
    fn test_tip_rejected_when_disabled() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let ride = apply(&ride, RideCommand::StartTrip, &d).unwrap();

        let mut settings = AppSettings::default();
        settings.toggles.tips_enabled = false;
        let err = plan_transition(
            &ride,
            &RideCommand::Complete { tip: dec!(10) },
            &d,
            &settings,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::TipsDisabled);
    }

    #[test]
    fn test_cannot_complete_before_trip_starts() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let err = apply(&ride, RideCommand::Complete { tip: dec!(0) }, &d).unwrap_err();
        assert!(matches!(err, TransitionError::NotAllowed { .. }));
    }

    #[test]
    fn test_terminal_states_reject_every_command() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let cancelled = apply(
            &ride,
            RideCommand::CancelByCustomer {
                reason: Some("changed plans".into()),
            },
            &c,
        )
        .unwrap();
        assert_eq!(cancelled.status, RideStatus::CancelledByCustomer);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed plans"));

        for (command, actor) in [
            (RideCommand::StartTrip, d),
            (RideCommand::CancelByDriver { reason: None }, d),
            (
                RideCommand::ForceStatus {
                    status: RideStatus::Booked,
                    note: None,
                },
                admin(),
            ),
        ] {
            let err = apply(&cancelled, command, &actor).unwrap_err();
            assert_eq!(err, TransitionError::Terminal(RideStatus::CancelledByCustomer));
        }
    }

    #[test]
    fn test_customer_cannot_cancel_in_progress_ride() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let ride = apply(&ride, RideCommand::StartTrip, &d).unwrap();
        let err = apply(&ride, RideCommand::CancelByCustomer { reason: None }, &c).unwrap_err();
        assert!(matches!(err, TransitionError::NotAllowed { .. }));
    }

    #[test]
    fn test_driver_can_cancel_before_pickup() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let ride = apply(&ride, RideCommand::CancelByDriver { reason: None }, &d).unwrap();
        assert_eq!(ride.status, RideStatus::CancelledByDriver);
    }

    #[test]
    fn test_admin_force_back_to_booked_releases_driver() {
        let c = customer();
        let d = driver();
        let ride = accepted_ride(&c, &d);
        let a = admin();
        let t = plan_transition(
            &ride,
            &RideCommand::ForceStatus {
                status: RideStatus::Booked,
                note: Some("driver unreachable".into()),
            },
            &a,
            &AppSettings::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(t.next.status, RideStatus::Booked);
        assert_eq!(t.next.driver_id, None);
        assert_eq!(t.entry.actor_role, UserRole::Admin);
        assert_eq!(t.entry.note.as_deref(), Some("driver unreachable"));
    }

    #[test]
    fn test_admin_cannot_force_completion_or_skip_fare() {
        let c = customer();
        let d = driver();
        let a = admin();
        let ride = accepted_ride(&c, &d);
        let err = apply(
            &ride,
            RideCommand::ForceStatus {
                status: RideStatus::Completed,
                note: None,
            },
            &a,
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::ForbiddenTarget(RideStatus::Completed));

        let pending = pending_ride(&c);
        let err = apply(
            &pending,
            RideCommand::ForceStatus {
                status: RideStatus::Booked,
                note: None,
            },
            &a,
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::MissingFare(RideStatus::Booked));

        let err = apply(
            &pending,
            RideCommand::ForceStatus {
                status: RideStatus::Accepted,
                note: None,
            },
            &a,
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::MissingFare(RideStatus::Accepted));
    }

    #[test]
    fn test_fare_present_and_non_negative_past_booked() {
        let c = customer();
        let d = driver();
        let a = admin();
        let mut ride = accepted_ride(&c, &d);
        ride.fare = Some(dec!(-5));
        let err = apply(&ride, RideCommand::StartTrip, &d).unwrap_err();
        assert_eq!(err, TransitionError::MissingFare(RideStatus::InProgress));

        ride.fare = None;
        let err = apply(
            &ride,
            RideCommand::ForceStatus {
                status: RideStatus::InProgress,
                note: None,
            },
            &a,
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::MissingFare(RideStatus::InProgress));
    }
}
