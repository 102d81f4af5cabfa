//! 언어 모델 모듈 - 조립된 프롬프트로 답변 생성
//!
//! 코어는 `LanguageModel` 트레이트만 알고, Gemini 구현체는 시작 시점에 주입됩니다.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::embedding::{
    backoff_for, describe_api_error, get_api_key, GEMINI_API_BASE, MAX_RETRIES, REQUEST_TIMEOUT,
};

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트 한 번 호출, 답변 텍스트 반환
    async fn call(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

// ============================================================================
// Gemini Chat
// ============================================================================

/// Gemini generateContent 클라이언트
pub struct GeminiChat {
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        })
    }

    /// 환경변수의 API 키로 생성
    pub fn from_env(config: &LlmConfig) -> Result<Self> {
        Self::new(get_api_key()?, config)
    }

    fn request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiChat {
    async fn call(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model);
        let request = self.request(prompt);

        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
                .context("Failed to send generation request")?;

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return parse_answer(&body);
            }

            if status.as_u16() == 429 && attempt < MAX_RETRIES {
                let backoff = backoff_for(attempt);
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            anyhow::bail!("{}", describe_api_error(status, &body));
        }

        anyhow::bail!("Generation failed after {} retries", MAX_RETRIES)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 첫 번째 후보의 텍스트 파트를 이어 붙임 (내용 검사 없이 그대로)
fn parse_answer(body: &str) -> Result<String> {
    let response: GenerateResponse =
        serde_json::from_str(body).context("Failed to parse generation response")?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("Model returned no candidates")?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        tracing::warn!(
            "Model returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        );
    }

    Ok(text)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> GeminiChat {
        GeminiChat::new("test-key".to_string(), &LlmConfig::default()).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_value(chat().request("Hello")).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert!(json["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn test_parse_answer_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Paris "}, {"text": "is the capital."}]},
                "finishReason": "STOP"
            }]
        }"#;

        assert_eq!(parse_answer(body).unwrap(), "Paris is the capital.");
    }

    #[test]
    fn test_parse_answer_without_candidates_fails() {
        assert!(parse_answer(r#"{"candidates": []}"#).is_err());
        assert!(parse_answer("not json").is_err());
    }

    #[test]
    fn test_parse_answer_returns_text_verbatim() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "  \n"}]}}]}"#;
        assert_eq!(parse_answer(body).unwrap(), "  \n");

        let blocked = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        assert_eq!(parse_answer(blocked).unwrap(), "");
    }

    #[test]
    fn test_uses_shared_request_timeout() {
        assert_eq!(REQUEST_TIMEOUT, std::time::Duration::from_secs(30));
    }

    #[test]
    fn test_name_is_model() {
        assert_eq!(chat().name(), "gemini-2.0-flash");
    }
}
