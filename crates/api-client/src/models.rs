//! Data models for the admin REST surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<AdminUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminUser {
    pub id: u64,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_verified: bool,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Envelope used by the user listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    pub success: bool,
    pub data: Vec<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub id: u64,
    pub name: String,
    pub price: u64,
    pub duration_days: u32,
    pub features: PackageFeatures,
    #[serde(default)]
    pub feature_ids: Option<Vec<u64>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Older backend revisions return `features` as a single comma-joined
/// string; newer ones return a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackageFeatures {
    List(Vec<String>),
    Legacy(String),
}

impl PackageFeatures {
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::List(names) => names.clone(),
            Self::Legacy(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackagePayload {
    pub name: String,
    pub price: u64,
    pub duration_days: u32,
    pub features: Vec<String>,
    pub feature_ids: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
    pub id: u64,
    pub payment_id: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub proof_image: Option<String>,
    #[serde(default)]
    pub package_name: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivateRequest {
    pub payment_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_payments: u64,
    pub pending_payments: u64,
    pub confirmed_payments: u64,
    pub total_users: u64,
    pub active_subscriptions: u64,
    pub total_revenue: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub id: Option<u64>,
    pub user_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureTier {
    Free,
    Premium,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    pub id: u64,
    pub name: String,
    pub code: String,
    pub status: FeatureTier,
}
