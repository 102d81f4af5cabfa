//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 청크와 질의를 벡터로 변환하는 임베딩 프로바이더입니다.
//! 코어는 `EmbeddingProvider` 트레이트만 알고, 구현체는 시작 시점에 주입됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::from_env(&config.embedding)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서 청크 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 검색 질의 임베딩 (기본 구현: `embed`)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini API 베이스 URL
pub(crate) const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP 요청 타임아웃 (임베딩, 생성, 스크래핑 공통)
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 지원 차원 (MRL)
const SUPPORTED_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

/// batchEmbedContents 요청당 최대 텍스트 수
const MAX_BATCH_SIZE: usize = 100;

/// Rate Limiter 설정 (Gemini 무료 티어: 60 RPM)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이 (1000ms = 60 RPM 준수)
const MIN_DELAY_MS: u64 = 1000;
/// 429 에러 시 최대 재시도 횟수
pub(crate) const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
pub(crate) const INITIAL_BACKOFF_MS: u64 = 2000;

/// 임베딩 작업 종류 (Gemini taskType)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskType {
    Document,
    Query,
}

impl TaskType {
    fn as_str(self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    model: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능 여부 확인 및 대기
    async fn acquire(&mut self) {
        // 1. 최소 딜레이 적용 (버스트 방지)
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::debug!("Min delay: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        let now = Instant::now();

        // 2. 윈도우 밖의 오래된 요청 제거
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        // 3. Rate limit 초과 시 대기
        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        // 4. 현재 요청 기록
        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 새 Gemini 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `config` - 모델 이름과 차원 (768, 1536, 3072 중 선택)
    pub fn new(api_key: String, config: &EmbeddingConfig) -> Result<Self> {
        if !SUPPORTED_DIMENSIONS.contains(&config.dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                config.dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            api_key,
            model: config.model.clone(),
            client,
            dimension: config.dimension,
            rate_limiter,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = get_api_key()?;
        let embedder = Self::new(api_key, config)?;
        tracing::info!(
            "Using Gemini embedding {} (dimension: {})",
            embedder.model,
            embedder.dimension
        );
        Ok(embedder)
    }

    fn model_path(&self) -> String {
        format!("models/{}", self.model)
    }

    fn single_request(&self, text: &str, task: TaskType) -> EmbedRequest {
        EmbedRequest {
            model: self.model_path(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: task.as_str().to_string(),
            output_dimensionality: Some(self.dimension),
        }
    }

    async fn embed_with_task(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let url = format!("{}/{}:embedContent", GEMINI_API_BASE, self.model_path());
        let body = self
            .post_with_retry(&url, &self.single_request(text, task))
            .await?;

        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        Ok(response.embedding.values)
    }

    /// POST + 재시도 (429/전송 실패 시 지수 백오프)
    async fn post_with_retry<T: Serialize + Sync>(&self, url: &str, request: &T) -> Result<String> {
        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            // API 키는 URL이 아닌 헤더로 전송
            let response = match self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff = backoff_for(attempt);
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                return Ok(body);
            }

            if status.as_u16() == 429 {
                let backoff = backoff_for(attempt);
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                anyhow::bail!("{}", describe_api_error(status, &body));
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

/// 지수 백오프 시간
pub(crate) fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
}

/// Gemini 에러 응답을 메시지로 변환
pub(crate) fn describe_api_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) => format!(
            "Gemini API error ({}): {}",
            error.error.status, error.error.message
        ),
        Err(_) => format!("Gemini API error ({}): {}", status, body),
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::Document).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::Query).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/{}:batchEmbedContents", GEMINI_API_BASE, self.model_path());
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(MAX_BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Embedding batch {} ({} texts, {}/{})",
                i + 1,
                batch.len(),
                results.len() + batch.len(),
                texts.len()
            );

            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| self.single_request(text, TaskType::Document))
                    .collect(),
            };

            let body = self.post_with_retry(&url, &request).await?;
            let response: BatchEmbedResponse =
                serde_json::from_str(&body).context("Failed to parse batch embedding response")?;

            if response.embeddings.len() != batch.len() {
                anyhow::bail!(
                    "Batch embedding returned {} vectors for {} texts",
                    response.embeddings.len(),
                    batch.len()
                );
            }

            results.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"]
        .iter()
        .any(|var| std::env::var(var).map(|k| !k.is_empty()).unwrap_or(false))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            dimension,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_dimension() {
        let result = GeminiEmbedding::new("fake_key".to_string(), &config(999));
        let err = result.err();
        assert!(err
            .as_ref()
            .map(|e| e.to_string().contains("Invalid dimension"))
            .unwrap_or(false));
    }

    #[test]
    fn test_valid_dimensions() {
        for dim in SUPPORTED_DIMENSIONS {
            let embedder = GeminiEmbedding::new("fake_key".to_string(), &config(dim)).unwrap();
            assert_eq!(EmbeddingProvider::dimension(&embedder), dim);
        }
    }

    #[tokio::test]
    async fn test_blank_text_skips_api_call() {
        let embedder = GeminiEmbedding::new("fake_key".to_string(), &config(768)).unwrap();
        let vector = embedder.embed("   ").await.unwrap();
        assert_eq!(vector.len(), 768);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_request_serialization() {
        let embedder = GeminiEmbedding::new("fake_key".to_string(), &config(768)).unwrap();
        let request = embedder.single_request("hello", TaskType::Query);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "models/gemini-embedding-001");
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["outputDimensionality"], 768);
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_batch_response_parsing() {
        let body = r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#;
        let response: BatchEmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.embeddings.len(), 2);
        assert_eq!(response.embeddings[1].values, vec![0.3, 0.4]);
    }

    #[test]
    fn test_describe_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let message = describe_api_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(message, "Gemini API error (INVALID_ARGUMENT): API key not valid");

        let message = describe_api_error(reqwest::StatusCode::BAD_GATEWAY, "oops");
        assert!(message.contains("502"));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_for(0), Duration::from_millis(2000));
        assert_eq!(backoff_for(2), Duration::from_millis(8000));
    }
}
