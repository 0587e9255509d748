//! In-app advertisements

mod model;
mod service;

pub use model::*;
pub use service::{AdError, AdService};
