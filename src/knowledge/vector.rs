//! Vector 타입 - 청크, 스토어 엔트리, 유사도 계산
//!
//! 임베딩 스토어가 다루는 데이터 모델과 코사인 유사도 유틸리티입니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 임베딩 벡터
pub type EmbeddingVector = Vec<f32>;

/// 청크 메타데이터 (출처 추적용, 랭킹에는 사용하지 않음)
pub type Metadata = BTreeMap<String, MetadataValue>;

// ============================================================================
// Types
// ============================================================================

/// 메타데이터 값 (스칼라만 허용)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// 검색 가능한 텍스트 단위
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 청크 텍스트 (trim 후 비어있지 않음)
    pub text: String,
    /// 출처 메타데이터
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// 메타데이터 없이 생성
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// 메타데이터 항목 추가
    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// 출처 식별자 (`source` 메타데이터)
    pub fn source(&self) -> Option<&str> {
        match self.metadata.get("source") {
            Some(MetadataValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// JSON으로 표현할 수 없는 실수 메타데이터의 키 (NaN, ±inf)
    pub fn non_finite_metadata(&self) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(_, value)| matches!(value, MetadataValue::Float(v) if !v.is_finite()))
            .map(|(key, _)| key.as_str())
    }
}

/// 스토어 엔트리 - (청크, 벡터) 한 쌍을 소유
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub chunk: Chunk,
    pub vector: EmbeddingVector,
}

impl StoreEntry {
    pub fn new(chunk: Chunk, vector: EmbeddingVector) -> Self {
        Self { chunk, vector }
    }
}

/// 검색 결과 (스토어 내부를 참조하지 않는 복사본)
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// 스토어 내 삽입 위치
    pub position: usize,
    /// 청크 복사본
    pub chunk: Chunk,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 벡터 크기 (L2 norm)
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// 코사인 유사도 (쿼리 크기는 미리 계산해 전달)
///
/// dot(a, b) / (|a| * |b|). 후보가 영벡터면 0.0을 반환합니다.
#[inline]
pub(crate) fn cosine_with_norm(query: &[f32], query_norm: f32, candidate: &[f32]) -> f32 {
    let norm = magnitude(candidate);
    if norm == 0.0 {
        return 0.0;
    }
    dot(query, candidate) / (query_norm * norm)
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Tests
// ============================================================================
