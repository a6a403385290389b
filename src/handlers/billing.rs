use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::subscription::{Subscription, SubscriptionPlan};
use crate::models::user::{SubscriptionStatus, SubscriptionTier};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub price_id: String,
    /// Target tier: "premium" or "professional"
    pub tier: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub subscription: Option<Subscription>,
}

pub async fn list_plans(State(state): State<AppState>) -> AppResult<Json<Vec<SubscriptionPlan>>> {
    let plans = sqlx::query_as::<_, SubscriptionPlan>(
        "SELECT * FROM subscription_plans ORDER BY price_cents ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(plans))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<SubscriptionInfo>> {
    let (tier, status, stripe_id) =
        sqlx::query_as::<_, (SubscriptionTier, SubscriptionStatus, Option<String>)>(
            "SELECT subscription_tier, subscription_status, stripe_customer_id FROM users WHERE id = $1",
        )
        .bind(auth_user.id)
        .fetch_one(&state.db)
        .await?;

    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(SubscriptionInfo {
        tier,
        status,
        stripe_customer_id: stripe_id,
        subscription,
    }))
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateCheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    if state.config.stripe_secret_key.is_empty() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "Stripe not configured"
        )));
    }

    if body.tier != "premium" && body.tier != "professional" {
        return Err(AppError::Validation(
            "Tier must be premium or professional".into(),
        ));
    }

    // Get or create Stripe customer
    let user = sqlx::query_as::<_, crate::models::user::User>(
        "SELECT * FROM users WHERE id = $1",
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    let customer_id = if let Some(cid) = &user.stripe_customer_id {
        cid.clone()
    } else {
        // Create Stripe customer via API
        let client = reqwest::Client::new();
        let resp = client
            .post("https://api.stripe.com/v1/customers")
            .header(
                "Authorization",
                format!("Bearer {}", state.config.stripe_secret_key),
            )
            .form(&[
                ("email", user.email.as_str()),
                ("name", &format!("{} {}", user.first_name, user.last_name)),
                ("metadata[user_id]", &user.id.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Stripe error: {}", e)))?;

        let customer: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Stripe parse error: {}", e)))?;

        let cid = customer["id"]
            .as_str()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("No customer ID from Stripe")))?
            .to_string();

        sqlx::query("UPDATE users SET stripe_customer_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(auth_user.id)
            .bind(&cid)
            .execute(&state.db)
            .await?;

        cid
    };

    // Create checkout session
    let client = reqwest::Client::new();
    let resp = client
        .post("https://api.stripe.com/v1/checkout/sessions")
        .header(
            "Authorization",
            format!("Bearer {}", state.config.stripe_secret_key),
        )
        .form(&[
            ("customer", customer_id.as_str()),
            ("mode", "subscription"),
            ("line_items[0][price]", &body.price_id),
            ("line_items[0][quantity]", "1"),
            ("metadata[tier]", &body.tier),
            (
                "success_url",
                &format!("{}/subscription?success=true", state.config.frontend_url),
            ),
            (
                "cancel_url",
                &format!("{}/subscription?canceled=true", state.config.frontend_url),
            ),
        ])
        .send()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stripe error: {}", e)))?;

    let session: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stripe parse error: {}", e)))?;

    let url = session["url"]
        .as_str()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("No checkout URL from Stripe")))?
        .to_string();

    Ok(Json(CheckoutResponse { checkout_url: url }))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = $1 AND stripe_subscription_id IS NOT NULL AND cancelled_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("No active subscription".into()))?;

    let stripe_id = subscription
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Subscription missing Stripe id")))?;

    let client = reqwest::Client::new();
    let resp = client
        .delete(format!(
            "https://api.stripe.com/v1/subscriptions/{}",
            stripe_id
        ))
        .header(
            "Authorization",
            format!("Bearer {}", state.config.stripe_secret_key),
        )
        .send()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stripe error: {}", e)))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::Internal(anyhow::anyhow!(
            "Stripe cancel failed {}: {}",
            status,
            body
        )));
    }

    // Mark the local mirror; the subscription.deleted webhook finishes the
    // downgrade.
    sqlx::query(
        r#"
        UPDATE subscriptions SET status = 'cancelled', cancelled_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(subscription.id)
    .execute(&state.db)
    .await?;

    Ok(Json(serde_json::json!({ "cancelled": true })))
}

/// Verify Stripe webhook signature.
/// Header format: t=timestamp,v1=signature[,v1=signature...]
fn verify_stripe_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
) -> Result<(), AppError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let ts = timestamp.ok_or_else(|| {
        AppError::Validation("Missing timestamp in Stripe-Signature".into())
    })?;

    if signatures.is_empty() {
        return Err(AppError::Validation(
            "Missing v1 signature in Stripe-Signature".into(),
        ));
    }

    // Construct the signed payload: "timestamp.payload"
    let signed_payload = format!("{}.{}", ts, String::from_utf8_lossy(payload));

    // Compute expected signature
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid webhook secret")))?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    // Check if any provided signature matches
    let valid = signatures.iter().any(|sig| {
        // Constant-time comparison to prevent timing attacks
        sig.len() == expected.len()
            && sig
                .as_bytes()
                .iter()
                .zip(expected.as_bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    });

    if !valid {
        return Err(AppError::Validation("Invalid Stripe webhook signature".into()));
    }

    // Reject stale events (5 minute tolerance)
    if let Ok(ts_secs) = ts.parse::<i64>() {
        let now = Utc::now().timestamp();
        let tolerance = 300;
        if (now - ts_secs).abs() > tolerance {
            return Err(AppError::Validation(
                "Stripe webhook timestamp outside tolerance".into(),
            ));
        }
    }

    Ok(())
}

fn epoch_to_datetime(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    value.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0))
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    if !state.config.stripe_webhook_secret.is_empty() {
        let sig_header = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".into()))?;

        verify_stripe_signature(&body, sig_header, &state.config.stripe_webhook_secret)?;
    } else {
        tracing::warn!("Stripe webhook secret not configured — signature verification skipped");
    }

    let event: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))?;

    let event_id = event["id"].as_str().unwrap_or("");
    let event_type = event["type"].as_str().unwrap_or("");

    // Deduplicate events
    if !event_id.is_empty() {
        let already_processed = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stripe_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_one(&state.db)
        .await
        .unwrap_or(0);

        if already_processed > 0 {
            tracing::debug!(event_id = event_id, "Stripe event already processed, skipping");
            return Ok(Json(serde_json::json!({ "received": true, "duplicate": true })));
        }

        let _ = sqlx::query(
            "INSERT INTO stripe_events (event_id, event_type) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&state.db)
        .await;
    }

    tracing::info!(event_type = event_type, event_id = event_id, "Stripe webhook received");

    let object = &event["data"]["object"];

    match event_type {
        "checkout.session.completed" => {
            let customer_id = object["customer"].as_str().unwrap_or("");
            let stripe_subscription_id = object["subscription"].as_str().unwrap_or("");

            let tier = match object["metadata"]["tier"].as_str() {
                Some("professional") => "professional",
                _ => "premium",
            };

            sqlx::query(
                r#"
                UPDATE users SET
                    subscription_tier = $2::subscription_tier,
                    subscription_status = 'active',
                    updated_at = NOW()
                WHERE stripe_customer_id = $1
                "#,
            )
            .bind(customer_id)
            .bind(tier)
            .execute(&state.db)
            .await?;

            // Mirror the subscription row
            let user_id = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM users WHERE stripe_customer_id = $1",
            )
            .bind(customer_id)
            .fetch_optional(&state.db)
            .await?;

            let plan_id = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM subscription_plans WHERE name = $1",
            )
            .bind(tier)
            .fetch_optional(&state.db)
            .await?;

            if let (Some(user_id), Some(plan_id), false) =
                (user_id, plan_id, stripe_subscription_id.is_empty())
            {
                sqlx::query(
                    r#"
                    INSERT INTO subscriptions (id, user_id, plan_id, stripe_subscription_id, status, start_date)
                    VALUES ($1, $2, $3, $4, 'active', NOW())
                    ON CONFLICT (stripe_subscription_id) DO UPDATE
                        SET status = 'active', plan_id = EXCLUDED.plan_id
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(plan_id)
                .bind(stripe_subscription_id)
                .execute(&state.db)
                .await?;
            }
        }
        "customer.subscription.updated" => {
            let customer_id = object["customer"].as_str().unwrap_or("");
            let stripe_subscription_id = object["id"].as_str().unwrap_or("");
            let status = object["status"].as_str().unwrap_or("active");

            let sub_status = match status {
                "active" => "active",
                "trialing" => "trialing",
                "past_due" => "past_due",
                "canceled" => "cancelled",
                _ => "inactive",
            };

            sqlx::query(
                r#"
                UPDATE users SET
                    subscription_status = $2::subscription_status,
                    updated_at = NOW()
                WHERE stripe_customer_id = $1
                "#,
            )
            .bind(customer_id)
            .bind(sub_status)
            .execute(&state.db)
            .await?;

            sqlx::query(
                r#"
                UPDATE subscriptions SET status = $2, end_date = $3
                WHERE stripe_subscription_id = $1
                "#,
            )
            .bind(stripe_subscription_id)
            .bind(sub_status)
            .bind(epoch_to_datetime(&object["current_period_end"]))
            .execute(&state.db)
            .await?;
        }
        "customer.subscription.deleted" => {
            let customer_id = object["customer"].as_str().unwrap_or("");
            let stripe_subscription_id = object["id"].as_str().unwrap_or("");

            sqlx::query(
                r#"
                UPDATE users SET
                    subscription_tier = 'basic',
                    subscription_status = 'cancelled',
                    updated_at = NOW()
                WHERE stripe_customer_id = $1
                "#,
            )
            .bind(customer_id)
            .execute(&state.db)
            .await?;

            sqlx::query(
                r#"
                UPDATE subscriptions SET status = 'cancelled', cancelled_at = NOW()
                WHERE stripe_subscription_id = $1 AND cancelled_at IS NULL
                "#,
            )
            .bind(stripe_subscription_id)
            .execute(&state.db)
            .await?;
        }
        "invoice.payment_succeeded" => {
            let customer_id = object["customer"].as_str().unwrap_or("");
            let stripe_subscription_id = object["subscription"].as_str().unwrap_or("");

            if !stripe_subscription_id.is_empty() {
                sqlx::query(
                    r#"
                    UPDATE subscriptions SET
                        status = 'active',
                        start_date = COALESCE($2, start_date),
                        end_date = COALESCE($3, end_date)
                    WHERE stripe_subscription_id = $1
                    "#,
                )
                .bind(stripe_subscription_id)
                .bind(epoch_to_datetime(&object["period_start"]))
                .bind(epoch_to_datetime(&object["period_end"]))
                .execute(&state.db)
                .await?;

                sqlx::query(
                    r#"
                    UPDATE users SET subscription_status = 'active', updated_at = NOW()
                    WHERE stripe_customer_id = $1
                    "#,
                )
                .bind(customer_id)
                .execute(&state.db)
                .await?;
            }
        }
        "invoice.payment_failed" => {
            let customer_id = object["customer"].as_str().unwrap_or("");
            let stripe_subscription_id = object["subscription"].as_str().unwrap_or("");

            if !stripe_subscription_id.is_empty() {
                sqlx::query(
                    "UPDATE subscriptions SET status = 'past_due' WHERE stripe_subscription_id = $1",
                )
                .bind(stripe_subscription_id)
                .execute(&state.db)
                .await?;

                sqlx::query(
                    r#"
                    UPDATE users SET subscription_status = 'past_due', updated_at = NOW()
                    WHERE stripe_customer_id = $1
                    "#,
                )
                .bind(customer_id)
                .execute(&state.db)
                .await?;
            }
        }
        _ => {
            tracing::debug!(event_type = event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], ts: i64, secret: &str) -> String {
        let signed_payload = format!("{}.{}", ts, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id": "evt_1", "type": "invoice.payment_succeeded"}"#;
        let ts = Utc::now().timestamp();
        let sig = sign(payload, ts, "whsec_test");
        let header = format!("t={},v1={}", ts, sig);

        assert!(verify_stripe_signature(payload, &header, "whsec_test").is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = br#"{"id": "evt_1"}"#;
        let ts = Utc::now().timestamp();
        let sig = sign(payload, ts, "whsec_test");
        let header = format!("t={},v1={}", ts, sig);

        let tampered = br#"{"id": "evt_2"}"#;
        assert!(verify_stripe_signature(tampered, &header, "whsec_test").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"id": "evt_1"}"#;
        let ts = Utc::now().timestamp();
        let sig = sign(payload, ts, "whsec_other");
        let header = format!("t={},v1={}", ts, sig);

        assert!(verify_stripe_signature(payload, &header, "whsec_test").is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = br#"{"id": "evt_1"}"#;
        let ts = Utc::now().timestamp() - 3600;
        let sig = sign(payload, ts, "whsec_test");
        let header = format!("t={},v1={}", ts, sig);

        assert!(verify_stripe_signature(payload, &header, "whsec_test").is_err());
    }

    #[test]
    fn test_missing_signature_rejected() {
        let payload = br#"{"id": "evt_1"}"#;
        let header = format!("t={}", Utc::now().timestamp());
        assert!(verify_stripe_signature(payload, &header, "whsec_test").is_err());
    }
}
