use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email_notifications: bool,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_entry_date: Option<NaiveDate>,
    pub stripe_customer_id: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: SubscriptionStatus,
    pub ai_requests_count: i32,
    pub ai_requests_reset_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "subscription_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Basic,
    Premium,
    Professional,
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        Self::Basic
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Cancelled,
    Inactive,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::Inactive
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_notifications: bool,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_entry_date: Option<NaiveDate>,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: SubscriptionStatus,
    pub entitlements: UserEntitlements,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct UserEntitlements {
    /// None = unlimited
    pub ai_requests_per_month: Option<i32>,
    /// None = unlimited
    pub max_support_groups: Option<i64>,
    pub advanced_analytics: bool,
    pub custom_meditations: bool,
}

impl UserEntitlements {
    pub fn for_tier(tier: &SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Basic => Self {
                ai_requests_per_month: Some(20),
                max_support_groups: Some(2),
                advanced_analytics: false,
                custom_meditations: false,
            },
            SubscriptionTier::Premium => Self {
                ai_requests_per_month: None,
                max_support_groups: None,
                advanced_analytics: true,
                custom_meditations: false,
            },
            SubscriptionTier::Professional => Self {
                ai_requests_per_month: None,
                max_support_groups: None,
                advanced_analytics: true,
                custom_meditations: true,
            },
        }
    }
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        let entitlements = UserEntitlements::for_tier(&u.subscription_tier);
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            email_notifications: u.email_notifications,
            current_streak: u.current_streak,
            longest_streak: u.longest_streak,
            last_entry_date: u.last_entry_date,
            subscription_tier: u.subscription_tier,
            subscription_status: u.subscription_status,
            entitlements,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[allow(dead_code)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}
