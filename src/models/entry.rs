use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub mood: i32,
    pub tags: Option<Json<Vec<String>>>,
    pub analysis: Option<Json<EntryAnalysis>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// AI-derived analysis stored alongside the entry. The streak evaluator
/// does not depend on this payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryAnalysis {
    pub sentiment: Sentiment,
    pub themes: Vec<String>,
    pub insights: String,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentiment {
    /// 1 (very negative) to 5 (very positive)
    pub score: i32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub activity: String,
    pub reason: String,
    pub duration: String,
    pub benefit: String,
}

impl EntryAnalysis {
    /// Neutral payload used when the analysis call fails or is skipped.
    pub fn neutral() -> Self {
        Self {
            sentiment: Sentiment {
                score: 3,
                label: "neutral".into(),
            },
            themes: Vec::new(),
            insights: "Keep writing. Insights improve as you journal more.".into(),
            recommendations: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryRequest {
    #[validate(length(min = 1, max = 20000, message = "Content must be 1-20000 characters"))]
    pub content: String,

    #[validate(range(min = 1, max = 5, message = "Mood must be 1-5"))]
    pub mood: i32,

    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEntryRequest {
    #[validate(length(min = 1, max = 20000, message = "Content must be 1-20000 characters"))]
    pub content: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Mood must be 1-5"))]
    pub mood: Option<i32>,

    pub tags: Option<Vec<String>>,
}
