use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i32,
    pub price_id: Option<String>,
    pub features: Option<Json<Vec<String>>>,
    /// None = unlimited
    pub ai_requests_limit: Option<i32>,
    /// None = unlimited
    pub group_limit: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Local mirror of a Stripe subscription. Source of truth is Stripe;
/// this row is synced by the webhook handler.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub stripe_subscription_id: Option<String>,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
