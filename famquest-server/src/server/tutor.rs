//! Delegated API key resolution and the outbound AI-provider proxy.
//!
//! The resolved key lives for exactly one outbound call: it is read from the
//! parent's settings row, handed to `TutorService::ask`, and dropped. It
//! must never appear in a response body, a log line, or any client-visible
//! field — clients only ever learn whether a key is available.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::config::TutorConfig;
use crate::storage::{Store, StorageError, models::Profile};
use famquest_shared::auth::Role;

/// Which secret a tutoring request should use. A parent uses their own key;
/// a child's request walks the family link to the supervising parent. No
/// link, or no key on the owning parent, resolves to `None`.
pub async fn resolve_provider_key(
    store: &Store,
    caller: &Profile,
) -> Result<Option<String>, StorageError> {
    let owner_id = match caller.role() {
        Role::Parent => caller.id.clone(),
        Role::Child => match store.get_link_by_child(&caller.id).await? {
            Some(link) => link.parent_id,
            None => return Ok(None),
        },
    };
    Ok(store
        .get_parent_settings(&owner_id)
        .await?
        .and_then(|s| s.provider_api_key))
}

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("provider rejected the configured key")]
    InvalidKey,

    #[error("provider rate limit reached")]
    RateLimited,

    /// Provider-internal detail is logged, never forwarded verbatim.
    #[error("provider call failed: {0}")]
    Provider(String),
}

#[derive(Clone)]
pub struct TutorService {
    inner: Arc<TutorServiceInner>,
}

struct TutorServiceInner {
    client: reqwest::Client,
    provider_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl TutorService {
    pub fn from_config(cfg: &TutorConfig) -> Self {
        let client = reqwest::Client::builder()
            // Bound request duration; the key must not outlive one call.
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .expect("failed to build HTTP client");
        TutorService {
            inner: Arc::new(TutorServiceInner {
                client,
                provider_url: cfg.provider_url.clone(),
                model: cfg.model.clone(),
            }),
        }
    }

    /// One outbound completion call on behalf of the caller.
    pub async fn ask(
        &self,
        api_key: &str,
        subject: &str,
        age_group: &str,
        message: &str,
    ) -> Result<String, TutorError> {
        let body = ChatRequest {
            model: &self.inner.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(subject, age_group),
                },
                ChatMessage {
                    role: "user",
                    content: message.to_string(),
                },
            ],
            temperature: 0.7,
            max_tokens: 1000,
        };

        let res = self
            .inner
            .client
            .post(&self.inner.provider_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "tutor: provider request failed");
                TutorError::Provider(if e.is_timeout() {
                    "provider request timed out".to_string()
                } else {
                    "provider unreachable".to_string()
                })
            })?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TutorError::InvalidKey);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TutorError::RateLimited);
        }
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            warn!(status = %status, detail = %detail, "tutor: provider error");
            return Err(TutorError::Provider(format!(
                "provider returned status {}",
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| TutorError::Provider(format!("invalid provider response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TutorError::Provider("provider returned no choices".to_string()))
    }
}

fn system_prompt(subject: &str, age_group: &str) -> String {
    let mut prompt = format!(
        "You are a helpful {subject} tutor for students in the {age_group} age group. "
    );
    match subject {
        "math" => prompt.push_str(
            "You help with math concepts, problem-solving, and explaining mathematical ideas \
             in a clear, age-appropriate way. You can work through problems step-by-step and \
             provide guidance without giving away answers immediately. Always encourage \
             critical thinking and provide praise for effort.",
        ),
        "language" => prompt.push_str(&format!(
            "You help with reading comprehension, writing, vocabulary, grammar, and language \
             skills appropriate for the {age_group} age group. You provide explanations, \
             examples, and constructive feedback that helps the student improve their \
             language abilities.",
        )),
        "science" => prompt.push_str(&format!(
            "You help explain scientific concepts, theories, and experiments in an engaging \
             and age-appropriate way for {age_group} students. You make complex ideas \
             understandable and encourage curiosity and critical thinking.",
        )),
        _ => prompt.push_str(&format!(
            "You provide helpful, educational guidance on {subject} topics appropriate for \
             {age_group} students. You're encouraging, patient, and focus on making learning \
             engaging and fun.",
        )),
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_covers_known_and_unknown_subjects() {
        let math = system_prompt("math", "8-10");
        assert!(math.contains("math tutor"));
        assert!(math.contains("8-10"));

        let other = system_prompt("history", "13-15");
        assert!(other.contains("history topics"));
    }
}
