//! HTTP service for risk-scored peer-to-peer transfers.

pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod session;

pub use config::ServiceConfig;
pub use error::TransferError;
pub use routes::{router, AppState};
pub use service::TransferService;
pub use session::Caller;
