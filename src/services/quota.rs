//! Tier-based entitlement gates: monthly AI-request quota and
//! support-group count. Premium and professional tiers are unlimited.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::user::SubscriptionTier;

/// Check and consume one AI request for the user. Returns false when a
/// basic-tier user has exhausted their monthly allowance; callers then take
/// the fallback path instead of calling the provider.
pub async fn consume_ai_request(db: &PgPool, config: &Config, user_id: Uuid) -> AppResult<bool> {
    let row = sqlx::query_as::<_, (SubscriptionTier, i32, Option<DateTime<Utc>>)>(
        "SELECT subscription_tier, ai_requests_count, ai_requests_reset_date FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    let Some((tier, _count, reset_date)) = row else {
        return Ok(false);
    };

    if tier != SubscriptionTier::Basic {
        return Ok(true);
    }

    let now = Utc::now();

    // New month (or never counted): restart the window at 1.
    if reset_date.map_or(true, |reset| reset <= now) {
        sqlx::query(
            r#"
            UPDATE users SET
                ai_requests_count = 1,
                ai_requests_reset_date = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(next_month_start(now))
        .execute(db)
        .await?;
        return Ok(true);
    }

    // Atomic check-and-increment: the WHERE clause loses the race instead
    // of over-counting.
    let updated = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE users SET ai_requests_count = ai_requests_count + 1
        WHERE id = $1 AND ai_requests_count < $2
        RETURNING ai_requests_count
        "#,
    )
    .bind(user_id)
    .bind(config.basic_ai_requests_per_month)
    .fetch_optional(db)
    .await?;

    Ok(updated.is_some())
}

/// Whether the user may join or create one more support group.
pub async fn allows_another_group(db: &PgPool, config: &Config, user_id: Uuid) -> AppResult<bool> {
    let tier = sqlx::query_scalar::<_, SubscriptionTier>(
        "SELECT subscription_tier FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    let Some(tier) = tier else {
        return Ok(false);
    };

    if tier != SubscriptionTier::Basic {
        return Ok(true);
    }

    let memberships = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_memberships WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(memberships < config.basic_group_limit)
}

/// Midnight UTC on the first day of the month after `now`.
fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_month_start_mid_year() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 13, 45, 0).unwrap();
        let next = next_month_start(now);
        assert_eq!(
            next,
            Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_month_start_rolls_over_december() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        let next = next_month_start(now);
        assert_eq!(
            next,
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
