pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::GateConfig;
use services::{
    approval::ApprovalWorkflow,
    gate::RequestGate,
    session::IdentityResolver,
    store::{EntitlementStore, ShareStore},
};
use std::sync::Arc;

/// Shared application state handed to the gate middleware and the handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub gate: Arc<RequestGate>,
    pub sessions: Arc<dyn IdentityResolver>,
    pub workflow: Arc<ApprovalWorkflow>,
    pub entitlements: Arc<dyn EntitlementStore>,
    pub shares: Arc<dyn ShareStore>,
}
