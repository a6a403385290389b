//! Outbound calls to the LLM provider (OpenAI chat completions).
//!
//! Every operation here is best-effort: on any failure (HTTP error,
//! timeout, unparsable response) the caller gets a deterministic fallback
//! and the request that triggered the call still succeeds.

use serde::Deserialize;

use crate::config::Config;
use crate::models::entry::EntryAnalysis;
use crate::models::support::MessageSentiment;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub const FALLBACK_AFFIRMATION: &str = "I am worthy of peace and happiness.";

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedChallenge {
    pub challenge: String,
    pub category: String,
    pub difficulty: String,
}

impl GeneratedChallenge {
    pub fn fallback() -> Self {
        Self {
            challenge: "Take a ten-minute walk without your phone and notice five things you can see, hear, or feel.".into(),
            category: "mindfulness".into(),
            difficulty: "easy".into(),
        }
    }
}

async fn chat(
    config: &Config,
    system_prompt: &str,
    user_prompt: &str,
    max_tokens: u32,
) -> Result<String, anyhow::Error> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;

    let response = client
        .post("https://api.openai.com/v1/chat/completions")
        .header(
            "Authorization",
            format!("Bearer {}", config.openai_api_key),
        )
        .header("content-type", "application/json")
        .json(&serde_json::json!({
            "model": config.openai_model,
            "max_tokens": max_tokens,
            "temperature": 0.7,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ]
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI API error {}: {}", status, body);
    }

    let completion: serde_json::Value = response.json().await?;
    let text = completion["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("OpenAI response missing message content"))?;

    Ok(text.trim().to_string())
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Sentiment analysis for a journal entry. Returns the neutral fallback on
/// any provider failure; never blocks entry persistence.
pub async fn analyze_entry(config: &Config, content: &str, mood: i32) -> EntryAnalysis {
    let system = "You are a compassionate wellness assistant analyzing journal entries. \
        Respond with JSON only, using this exact schema: \
        {\"sentiment\": {\"score\": 1-5, \"label\": \"very negative|negative|neutral|positive|very positive\"}, \
        \"themes\": [\"theme\", ...], \
        \"insights\": \"2-3 sentence reflection\", \
        \"recommendations\": [{\"activity\": \"...\", \"reason\": \"...\", \"duration\": \"...\", \"benefit\": \"...\"}]}";

    let user = format!(
        "The writer rated their mood {}/5. Analyze this journal entry:\n\n{}",
        mood, content
    );

    match chat(config, system, &user, 1024).await {
        Ok(text) => match serde_json::from_str::<EntryAnalysis>(strip_code_fence(&text)) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable entry analysis, using neutral fallback");
                EntryAnalysis::neutral()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Entry analysis unavailable, using neutral fallback");
            EntryAnalysis::neutral()
        }
    }
}

/// One short, present-tense daily affirmation.
pub async fn generate_affirmation(config: &Config) -> String {
    let system = "You are a mindfulness coach creating daily affirmations. \
        Generate a single, powerful, and uplifting affirmation that encourages \
        self-reflection and personal growth. The affirmation should be concise \
        (1-2 sentences) and in the present tense. Focus on themes of gratitude, \
        self-acceptance, or personal growth.";

    match chat(config, system, "Generate an affirmation for today.", 100).await {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => FALLBACK_AFFIRMATION.into(),
        Err(e) => {
            tracing::warn!(error = %e, "Affirmation generation unavailable, using fallback");
            FALLBACK_AFFIRMATION.into()
        }
    }
}

/// A personalized daily challenge grounded in the user's recent entries
/// and active goals.
pub async fn generate_challenge(
    config: &Config,
    recent_themes: &[String],
    goal_titles: &[String],
) -> GeneratedChallenge {
    let system = "You are a wellness coach designing one small daily challenge. \
        Respond with JSON only: {\"challenge\": \"one specific, achievable action\", \
        \"category\": \"mindfulness|movement|connection|gratitude|rest\", \
        \"difficulty\": \"easy|medium|hard\"}";

    let user = format!(
        "Recent journal themes: {}\nActive wellness goals: {}\nDesign today's challenge.",
        if recent_themes.is_empty() {
            "none yet".into()
        } else {
            recent_themes.join(", ")
        },
        if goal_titles.is_empty() {
            "none yet".into()
        } else {
            goal_titles.join(", ")
        },
    );

    match chat(config, system, &user, 256).await {
        Ok(text) => match serde_json::from_str::<GeneratedChallenge>(strip_code_fence(&text)) {
            Ok(challenge) => challenge,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable challenge, using fallback");
                GeneratedChallenge::fallback()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Challenge generation unavailable, using fallback");
            GeneratedChallenge::fallback()
        }
    }
}

/// Tone read for a support-group message. Best-effort: None when the
/// provider is unavailable, and the message posts without sentiment.
pub async fn analyze_message(config: &Config, content: &str) -> Option<MessageSentiment> {
    let system = "You gauge the emotional tone of short peer-support messages. \
        Respond with JSON only: {\"score\": 1-5, \"tone\": \"one word\"}";

    match chat(config, system, content, 64).await {
        Ok(text) => match serde_json::from_str::<MessageSentiment>(strip_code_fence(&text)) {
            Ok(sentiment) => Some(sentiment),
            Err(e) => {
                tracing::debug!(error = %e, "Unparsable message sentiment, storing none");
                None
            }
        },
        Err(e) => {
            tracing::debug!(error = %e, "Message sentiment unavailable, storing none");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence_plain_json_untouched() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fence_removes_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fence_removes_bare_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"a\": 1}");
    }

    #[test]
    fn test_neutral_fallback_shape() {
        let analysis = EntryAnalysis::neutral();
        assert_eq!(analysis.sentiment.score, 3);
        assert_eq!(analysis.sentiment.label, "neutral");
        assert!(analysis.themes.is_empty());
        assert!(analysis.recommendations.is_empty());
        assert!(!analysis.insights.is_empty());
    }

    #[test]
    fn test_generated_challenge_parses_provider_shape() {
        let raw = r#"{"challenge": "Write down three things you are grateful for", "category": "gratitude", "difficulty": "easy"}"#;
        let parsed: GeneratedChallenge = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.category, "gratitude");
    }
}
