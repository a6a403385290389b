use axum::{extract::State, Extension, Json};

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::achievement::{Achievement, UserAchievement};
use crate::AppState;

pub async fn list_catalog(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Achievement>>> {
    let catalog = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements ORDER BY level ASC, name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(catalog))
}

pub async fn list_unlocked(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<UserAchievement>>> {
    let unlocked = sqlx::query_as::<_, UserAchievement>(
        r#"
        SELECT * FROM user_achievements
        WHERE user_id = $1
        ORDER BY unlocked_at ASC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(unlocked))
}
