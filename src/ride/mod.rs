//! Rides: lifecycle state machine, dispatch and in-ride chat

mod lifecycle;
mod model;
mod service;

pub use lifecycle::{plan_transition, Actor, RideCommand, Transition, TransitionError};
pub use model::*;
pub use service::{RideError, RideService, BOOKABLE_FEED_LIMIT};
