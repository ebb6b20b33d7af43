//! Domain models for gate-service.

mod access_request;
mod entitlement;
mod identity;
mod share;

pub use access_request::{AccessRequest, AccessRequestStatus, NewAccessRequest, ReviewAction};
pub use entitlement::{EntitlementSnapshot, PaymentStatus};
pub use identity::Identity;
pub use share::{NewSharedProject, SharedProject};
