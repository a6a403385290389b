use axum::{extract::State, Extension, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::affirmation::Affirmation;
use crate::services::{ai, quota};
use crate::AppState;

/// Return today's affirmation, generating one if the latest on record is
/// from an earlier day.
pub async fn today(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Affirmation>> {
    let today = Utc::now().date_naive();

    let latest = sqlx::query_as::<_, Affirmation>(
        r#"
        SELECT * FROM affirmations
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?;

    if let Some(affirmation) = latest {
        if affirmation.created_at.date_naive() == today {
            return Ok(Json(affirmation));
        }
    }

    let allowed = quota::consume_ai_request(&state.db, &state.config, auth_user.id)
        .await
        .unwrap_or(false);

    let content = if allowed {
        ai::generate_affirmation(&state.config).await
    } else {
        ai::FALLBACK_AFFIRMATION.to_string()
    };

    let affirmation = sqlx::query_as::<_, Affirmation>(
        r#"
        INSERT INTO affirmations (id, user_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&content)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(affirmation))
}
