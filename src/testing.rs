//! 테스트용 협력자 (외부 API 없이 결정적으로 동작)

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::extractor::{ExtractedContent, SourceType, TextExtractor};
use crate::llm::LanguageModel;

// ============================================================================
// Embedder
// ============================================================================

/// 단어 해시 버킷 기반 임베더
///
/// 같은 단어를 공유하는 텍스트끼리 유사도가 높아집니다.
pub struct FakeEmbedder {
    dimension: usize,
    fixed: HashMap<String, Vec<f32>>,
    fail_on: Option<String>,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: HashMap::new(),
            fail_on: None,
        }
    }

    /// 특정 텍스트의 벡터 고정
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }

    /// 해당 문자열을 포함한 텍스트는 임베딩 실패
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    fn bucket(&self, word: &str) -> usize {
        let hash = word
            .bytes()
            .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
        hash as usize % self.dimension
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                anyhow::bail!("embedding service unavailable");
            }
        }

        if let Some(vector) = self.fixed.get(text) {
            return Ok(vector.clone());
        }

        let mut vector = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "fake-embedder"
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// 소스 -> 결과 매핑 추출기 (등록되지 않은 소스는 실패)
#[derive(Default)]
pub struct FakeExtractor {
    documents: HashMap<String, std::result::Result<Vec<ExtractedContent>, String>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, source: &str, text: &str) -> Self {
        let content = ExtractedContent {
            text: text.to_string(),
            source_type: SourceType::Text,
            page_number: None,
        };
        self.documents.insert(source.to_string(), Ok(vec![content]));
        self
    }

    pub fn with_pages(mut self, source: &str, pages: &[&str]) -> Self {
        let contents = pages
            .iter()
            .enumerate()
            .map(|(i, text)| ExtractedContent {
                text: text.to_string(),
                source_type: SourceType::Pdf,
                page_number: Some(i + 1),
            })
            .collect();
        self.documents.insert(source.to_string(), Ok(contents));
        self
    }

    pub fn failing(mut self, source: &str, message: &str) -> Self {
        self.documents
            .insert(source.to_string(), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, source: &str) -> Result<Vec<ExtractedContent>> {
        match self.documents.get(source) {
            Some(Ok(contents)) => Ok(contents.clone()),
            Some(Err(message)) => anyhow::bail!("{}", message),
            None => anyhow::bail!("No such source: {}", source),
        }
    }
}

// ============================================================================
// Language Model
// ============================================================================

/// 받은 프롬프트를 기록하고 고정 답변(없으면 프롬프트 그대로)을 반환
#[derive(Default)]
pub struct FakeModel {
    answer: Option<String>,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn call(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail {
            anyhow::bail!("model timed out");
        }
        Ok(self.answer.clone().unwrap_or_else(|| prompt.to_string()))
    }

    fn name(&self) -> &str {
        "fake-model"
    }
}
