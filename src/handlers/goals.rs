use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{validation_errors, AppError, AppResult};
use crate::models::goal::{
    CreateGoalRequest, CreateProgressRequest, GoalProgress, UpdateGoalRequest, WellnessGoal,
};
use crate::AppState;

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<WellnessGoal>>> {
    let goals = sqlx::query_as::<_, WellnessGoal>(
        r#"
        SELECT * FROM wellness_goals
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(goals))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateGoalRequest>,
) -> AppResult<Json<WellnessGoal>> {
    body.validate().map_err(validation_errors)?;

    let goal = sqlx::query_as::<_, WellnessGoal>(
        r#"
        INSERT INTO wellness_goals
            (id, user_id, title, description, category, target_value, frequency, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&body.title)
    .bind(&body.description)
    .bind(&body.category)
    .bind(body.target_value)
    .bind(&body.frequency)
    .bind(body.start_date.unwrap_or_else(Utc::now))
    .bind(body.end_date)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(goal))
}

pub async fn update_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
    Json(body): Json<UpdateGoalRequest>,
) -> AppResult<Json<WellnessGoal>> {
    body.validate().map_err(validation_errors)?;

    let _existing = sqlx::query_as::<_, WellnessGoal>(
        "SELECT * FROM wellness_goals WHERE id = $1 AND user_id = $2",
    )
    .bind(goal_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Goal not found".into()))?;

    let goal = sqlx::query_as::<_, WellnessGoal>(
        r#"
        UPDATE wellness_goals SET
            title = COALESCE($3, title),
            description = COALESCE($4, description),
            category = COALESCE($5, category),
            target_value = COALESCE($6, target_value),
            frequency = COALESCE($7, frequency),
            end_date = COALESCE($8, end_date),
            is_completed = current_value >= COALESCE($6, target_value),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(goal_id)
    .bind(auth_user.id)
    .bind(&body.title)
    .bind(&body.description)
    .bind(&body.category)
    .bind(body.target_value)
    .bind(&body.frequency)
    .bind(body.end_date)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(goal))
}

pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM wellness_goals WHERE id = $1 AND user_id = $2")
        .bind(goal_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Goal not found".into()));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn list_progress(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
) -> AppResult<Json<Vec<GoalProgress>>> {
    // Verify ownership before exposing progress rows
    let _goal = sqlx::query_as::<_, WellnessGoal>(
        "SELECT * FROM wellness_goals WHERE id = $1 AND user_id = $2",
    )
    .bind(goal_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Goal not found".into()))?;

    let progress = sqlx::query_as::<_, GoalProgress>(
        r#"
        SELECT * FROM goal_progress
        WHERE goal_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(goal_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(progress))
}

/// Record progress against a goal; the goal auto-completes when the
/// accumulated value reaches its target.
pub async fn add_progress(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_id): Path<Uuid>,
    Json(body): Json<CreateProgressRequest>,
) -> AppResult<Json<WellnessGoal>> {
    body.validate().map_err(validation_errors)?;

    let _goal = sqlx::query_as::<_, WellnessGoal>(
        "SELECT * FROM wellness_goals WHERE id = $1 AND user_id = $2",
    )
    .bind(goal_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Goal not found".into()))?;

    sqlx::query(
        r#"
        INSERT INTO goal_progress (id, goal_id, value, note)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(goal_id)
    .bind(body.value)
    .bind(&body.note)
    .execute(&state.db)
    .await?;

    let goal = sqlx::query_as::<_, WellnessGoal>(
        r#"
        UPDATE wellness_goals SET
            current_value = current_value + $3,
            is_completed = current_value + $3 >= target_value,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(goal_id)
    .bind(auth_user.id)
    .bind(body.value)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(goal))
}
