use axum::{
    extract::{Path, State},
    Extension, Json,
};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{validation_errors, AppError, AppResult};
use crate::models::entry::{CreateEntryRequest, Entry, EntryAnalysis, UpdateEntryRequest};
use crate::services::{ai, quota, streak};
use crate::AppState;

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Entry>>> {
    let entries = sqlx::query_as::<_, Entry>(
        r#"
        SELECT * FROM entries
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(entries))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<Entry>> {
    let entry = sqlx::query_as::<_, Entry>(
        "SELECT * FROM entries WHERE id = $1 AND user_id = $2",
    )
    .bind(entry_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Entry not found".into()))?;

    Ok(Json(entry))
}

/// Sentiment analysis honoring the monthly AI quota. Over-quota (or a quota
/// bookkeeping failure) falls back to the neutral payload; analysis must
/// never block entry persistence.
async fn analyze_with_quota(state: &AppState, user_id: Uuid, content: &str, mood: i32) -> EntryAnalysis {
    let allowed = match quota::consume_ai_request(&state.db, &state.config, user_id).await {
        Ok(allowed) => allowed,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user_id, "AI quota check failed, using fallback analysis");
            false
        }
    };

    if allowed {
        ai::analyze_entry(&state.config, content, mood).await
    } else {
        EntryAnalysis::neutral()
    }
}

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateEntryRequest>,
) -> AppResult<Json<Entry>> {
    body.validate().map_err(validation_errors)?;

    let analysis = analyze_with_quota(&state, auth_user.id, &body.content, body.mood).await;

    let entry = sqlx::query_as::<_, Entry>(
        r#"
        INSERT INTO entries (id, user_id, content, mood, tags, analysis)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&body.content)
    .bind(body.mood)
    .bind(body.tags.map(SqlJson))
    .bind(SqlJson(analysis))
    .fetch_one(&state.db)
    .await?;

    // Gamification side effect: the entry is already committed, so a
    // failure here is logged, never surfaced.
    if let Err(e) = streak::record_entry_activity(&state.db, auth_user.id).await {
        tracing::warn!(
            error = %e,
            user_id = %auth_user.id,
            "Streak/achievement update failed; entry persisted"
        );
    }

    Ok(Json(entry))
}

/// Edits re-run sentiment analysis but never the streak evaluator.
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
    Json(body): Json<UpdateEntryRequest>,
) -> AppResult<Json<Entry>> {
    body.validate().map_err(validation_errors)?;

    let existing = sqlx::query_as::<_, Entry>(
        "SELECT * FROM entries WHERE id = $1 AND user_id = $2",
    )
    .bind(entry_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Entry not found".into()))?;

    let content = body.content.unwrap_or(existing.content);
    let mood = body.mood.unwrap_or(existing.mood);

    let analysis = analyze_with_quota(&state, auth_user.id, &content, mood).await;

    let entry = sqlx::query_as::<_, Entry>(
        r#"
        UPDATE entries SET
            content = $3,
            mood = $4,
            tags = COALESCE($5, tags),
            analysis = $6,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(entry_id)
    .bind(auth_user.id)
    .bind(&content)
    .bind(mood)
    .bind(body.tags.map(SqlJson))
    .bind(SqlJson(analysis))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(entry))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM entries WHERE id = $1 AND user_id = $2")
        .bind(entry_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Entry not found".into()));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}
