//! User accounts, driver onboarding and presence

mod service;

pub use service::{location_sweeper, UserError, UserService};
