use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{validation_errors, AppError, AppResult};
use crate::models::challenge::{CompleteChallengeRequest, DailyChallenge};
use crate::models::entry::EntryAnalysis;
use crate::services::{ai, quota};
use crate::AppState;

/// Return today's challenge, generating one from the user's recent journal
/// themes and active goals if none exists yet.
pub async fn today(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<DailyChallenge>> {
    let today = Utc::now().date_naive();

    let latest = sqlx::query_as::<_, DailyChallenge>(
        r#"
        SELECT * FROM daily_challenges
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?;

    if let Some(challenge) = latest {
        if challenge.created_at.date_naive() == today {
            return Ok(Json(challenge));
        }
    }

    // Context for generation: themes from the last few analyzed entries
    // and active goal titles.
    let analyses = sqlx::query_scalar::<_, Option<SqlJson<EntryAnalysis>>>(
        r#"
        SELECT analysis FROM entries
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 5
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let recent_themes: Vec<String> = analyses
        .into_iter()
        .flatten()
        .flat_map(|a| a.0.themes)
        .collect();

    let goal_titles = sqlx::query_scalar::<_, String>(
        "SELECT title FROM wellness_goals WHERE user_id = $1 AND is_completed = false",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let allowed = quota::consume_ai_request(&state.db, &state.config, auth_user.id)
        .await
        .unwrap_or(false);

    let generated = if allowed {
        ai::generate_challenge(&state.config, &recent_themes, &goal_titles).await
    } else {
        ai::GeneratedChallenge::fallback()
    };

    let challenge = sqlx::query_as::<_, DailyChallenge>(
        r#"
        INSERT INTO daily_challenges (id, user_id, challenge, category, difficulty)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&generated.challenge)
    .bind(&generated.category)
    .bind(&generated.difficulty)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(challenge))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<DailyChallenge>>> {
    let challenges = sqlx::query_as::<_, DailyChallenge>(
        r#"
        SELECT * FROM daily_challenges
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(challenges))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(challenge_id): Path<Uuid>,
    Json(body): Json<CompleteChallengeRequest>,
) -> AppResult<Json<DailyChallenge>> {
    body.validate().map_err(validation_errors)?;

    let existing = sqlx::query_as::<_, DailyChallenge>(
        "SELECT * FROM daily_challenges WHERE id = $1 AND user_id = $2",
    )
    .bind(challenge_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Challenge not found".into()))?;

    if existing.completed {
        return Err(AppError::Conflict("Challenge already completed".into()));
    }

    let challenge = sqlx::query_as::<_, DailyChallenge>(
        r#"
        UPDATE daily_challenges SET
            completed = true,
            completed_at = NOW(),
            reflection_note = $3
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(challenge_id)
    .bind(auth_user.id)
    .bind(&body.reflection_note)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(challenge))
}
