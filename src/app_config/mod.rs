//! Business configuration edited from the admin console

mod model;
mod service;

pub use model::*;
pub use service::{AppConfigService, AppConfigError};
