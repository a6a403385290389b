use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyChallenge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge: String,
    pub category: String,
    pub difficulty: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub reflection_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteChallengeRequest {
    #[validate(length(max = 5000, message = "Reflection note must be under 5000 characters"))]
    pub reflection_note: Option<String>,
}
