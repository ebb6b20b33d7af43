//! Entitlement snapshot model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    /// Unknown values read as `Unpaid` so a corrupt row never grants access.
    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "pending" => PaymentStatus::Pending,
            _ => PaymentStatus::Unpaid,
        }
    }
}

/// Point-in-time read of a user's premium, payment and admin state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSnapshot {
    pub user_id: String,
    pub email: String,
    pub is_premium: bool,
    pub payment_status: String,
    pub is_admin: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

impl EntitlementSnapshot {
    /// A fresh, unpaid, non-admin account.
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            is_premium: false,
            payment_status: PaymentStatus::Unpaid.as_str().to_string(),
            is_admin: false,
            subscription_expires_at: None,
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.payment_status)
    }

    /// Whether the account has paid for the product, ignoring admin rights
    /// and exemptions.
    pub fn has_paid_access(&self) -> bool {
        self.is_premium || self.payment_status() == PaymentStatus::Paid
    }
}
