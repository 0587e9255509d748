//! In-app notifications and push delivery

mod model;
mod push;
mod service;

pub use model::*;
pub use push::{
    HttpPushGateway, LogPushGateway, PushError, PushGateway, PushMessage, PushReport,
    TokenFailure,
};
pub use service::{NotificationError, NotificationService};
