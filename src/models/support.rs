use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupportTopic {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupportGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub topic_id: Option<Uuid>,
    pub is_private: bool,
    pub max_members: i32,
    pub invite_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupMembership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub anonymous_name: String,
    pub role: String,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupportMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    pub membership_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
    pub sentiment: Option<Json<MessageSentiment>>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// Best-effort tone read on a support message. Absent when analysis fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSentiment {
    pub score: i32,
    pub tone: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255, message = "Group name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be under 1000 characters"))]
    pub description: Option<String>,

    pub topic_id: Option<Uuid>,
    pub is_private: Option<bool>,

    #[validate(range(min = 2, max = 500, message = "Max members must be 2-500"))]
    pub max_members: Option<i32>,

    #[validate(length(min = 1, max = 255, message = "Display name must be 1-255 characters"))]
    pub anonymous_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinGroupRequest {
    #[validate(length(min = 1, max = 255, message = "Display name must be 1-255 characters"))]
    pub anonymous_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    #[validate(length(min = 1, max = 10000, message = "Message must be 1-10000 characters"))]
    pub content: String,

    pub is_anonymous: Option<bool>,
}

/// Message joined with the sender's anonymous display name for rendering.
#[derive(Debug, Serialize, FromRow)]
pub struct MessageWithSender {
    pub id: Uuid,
    pub group_id: Uuid,
    pub membership_id: Uuid,
    pub anonymous_name: String,
    pub content: String,
    pub is_anonymous: bool,
    pub sentiment: Option<Json<MessageSentiment>>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}
