//! Verified caller identity.

use serde::{Deserialize, Serialize};

/// The subject of a request as asserted by the external identity provider.
///
/// The gate never checks credentials; an `Identity` only exists once the
/// session token carrying it has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub email: String,
}

impl Identity {
    pub fn new(subject: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: email.into(),
        }
    }
}
