use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{validation_errors, AppError, AppResult};
use crate::models::support::{
    CreateGroupRequest, CreateMessageRequest, GroupMembership, JoinGroupRequest,
    MessageWithSender, SupportGroup, SupportMessage, SupportTopic,
};
use crate::services::{ai, quota};
use crate::AppState;

const INVITE_CODE_LEN: usize = 10;

const ANON_ADJECTIVES: &[&str] = &[
    "Gentle", "Quiet", "Bright", "Steady", "Kind", "Brave", "Calm", "Warm",
];
const ANON_ANIMALS: &[&str] = &[
    "Otter", "Heron", "Fox", "Willow", "Sparrow", "Badger", "Deer", "Owl",
];

fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Default display name for members who don't pick one.
fn generate_anonymous_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ANON_ADJECTIVES.choose(&mut rng).unwrap_or(&"Gentle");
    let animal = ANON_ANIMALS.choose(&mut rng).unwrap_or(&"Otter");
    let suffix: u16 = rng.gen_range(10..100);
    format!("{} {} {}", adjective, animal, suffix)
}

pub async fn list_topics(State(state): State<AppState>) -> AppResult<Json<Vec<SupportTopic>>> {
    let topics = sqlx::query_as::<_, SupportTopic>(
        "SELECT * FROM support_topics ORDER BY name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(topics))
}

pub async fn list_groups(State(state): State<AppState>) -> AppResult<Json<Vec<SupportGroup>>> {
    let groups = sqlx::query_as::<_, SupportGroup>(
        r#"
        SELECT * FROM support_groups
        WHERE is_private = false
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(groups))
}

pub async fn list_memberships(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<GroupMembership>>> {
    let memberships = sqlx::query_as::<_, GroupMembership>(
        r#"
        SELECT * FROM group_memberships
        WHERE user_id = $1
        ORDER BY joined_at ASC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(memberships))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateGroupRequest>,
) -> AppResult<Json<SupportGroup>> {
    body.validate().map_err(validation_errors)?;

    if !quota::allows_another_group(&state.db, &state.config, auth_user.id).await? {
        return Err(AppError::Forbidden);
    }

    let group_id = Uuid::new_v4();
    let invite_code = generate_invite_code();

    let group = sqlx::query_as::<_, SupportGroup>(
        r#"
        INSERT INTO support_groups (id, name, description, topic_id, is_private, max_members, invite_code)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(group_id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.topic_id)
    .bind(body.is_private.unwrap_or(false))
    .bind(body.max_members.unwrap_or(50))
    .bind(&invite_code)
    .fetch_one(&state.db)
    .await?;

    // The creator joins as admin
    let anonymous_name = body.anonymous_name.unwrap_or_else(generate_anonymous_name);
    sqlx::query(
        r#"
        INSERT INTO group_memberships (id, user_id, group_id, anonymous_name, role, is_admin)
        VALUES ($1, $2, $3, $4, 'admin', true)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(group_id)
    .bind(&anonymous_name)
    .execute(&state.db)
    .await?;

    Ok(Json(group))
}

pub async fn join_group(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(invite_code): Path<String>,
    body: Option<Json<JoinGroupRequest>>,
) -> AppResult<Json<GroupMembership>> {
    let body = body.map(|Json(b)| b).unwrap_or(JoinGroupRequest {
        anonymous_name: None,
    });
    body.validate().map_err(validation_errors)?;

    let group = sqlx::query_as::<_, SupportGroup>(
        "SELECT * FROM support_groups WHERE invite_code = $1",
    )
    .bind(&invite_code)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Group not found".into()))?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_memberships WHERE user_id = $1 AND group_id = $2",
    )
    .bind(auth_user.id)
    .bind(group.id)
    .fetch_one(&state.db)
    .await?;

    if existing > 0 {
        return Err(AppError::Conflict("Already a member of this group".into()));
    }

    let member_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_memberships WHERE group_id = $1",
    )
    .bind(group.id)
    .fetch_one(&state.db)
    .await?;

    if member_count >= group.max_members as i64 {
        return Err(AppError::Conflict("Group is full".into()));
    }

    if !quota::allows_another_group(&state.db, &state.config, auth_user.id).await? {
        return Err(AppError::Forbidden);
    }

    let anonymous_name = body.anonymous_name.unwrap_or_else(generate_anonymous_name);

    let membership = sqlx::query_as::<_, GroupMembership>(
        r#"
        INSERT INTO group_memberships (id, user_id, group_id, anonymous_name, role, is_admin)
        VALUES ($1, $2, $3, $4, 'member', false)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(group.id)
    .bind(&anonymous_name)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(membership))
}

async fn require_membership(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
) -> AppResult<GroupMembership> {
    sqlx::query_as::<_, GroupMembership>(
        "SELECT * FROM group_memberships WHERE user_id = $1 AND group_id = $2",
    )
    .bind(user_id)
    .bind(group_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Forbidden)
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Vec<MessageWithSender>>> {
    require_membership(&state, auth_user.id, group_id).await?;

    let messages = sqlx::query_as::<_, MessageWithSender>(
        r#"
        SELECT m.id, m.group_id, m.membership_id, gm.anonymous_name,
               m.content, m.is_anonymous, m.sentiment, m.created_at, m.edited_at
        FROM support_messages m
        JOIN group_memberships gm ON gm.id = m.membership_id
        WHERE m.group_id = $1
        ORDER BY m.created_at ASC
        "#,
    )
    .bind(group_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(messages))
}

pub async fn create_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<Uuid>,
    Json(body): Json<CreateMessageRequest>,
) -> AppResult<Json<SupportMessage>> {
    body.validate().map_err(validation_errors)?;

    let membership = require_membership(&state, auth_user.id, group_id).await?;

    // Best-effort tone read, gated by the AI quota
    let allowed = quota::consume_ai_request(&state.db, &state.config, auth_user.id)
        .await
        .unwrap_or(false);
    let sentiment = if allowed {
        ai::analyze_message(&state.config, &body.content).await
    } else {
        None
    };

    let message = sqlx::query_as::<_, SupportMessage>(
        r#"
        INSERT INTO support_messages (id, group_id, membership_id, content, is_anonymous, sentiment)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(group_id)
    .bind(membership.id)
    .bind(&body.content)
    .bind(body.is_anonymous.unwrap_or(true))
    .bind(sentiment.map(SqlJson))
    .fetch_one(&state.db)
    .await?;

    sqlx::query("UPDATE group_memberships SET last_active = NOW() WHERE id = $1")
        .bind(membership.id)
        .execute(&state.db)
        .await?;

    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_code_shape() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_invite_codes_are_unique_enough() {
        let a = generate_invite_code();
        let b = generate_invite_code();
        assert_ne!(a, b);
    }

    #[test]
    fn test_anonymous_name_has_three_parts() {
        let name = generate_anonymous_name();
        assert_eq!(name.split_whitespace().count(), 3);
    }
}
