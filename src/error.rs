//! 에러 타입
//!
//! 임베딩 스토어/검색 파이프라인의 타입 에러입니다.
//! 외부 협력자(임베딩, 추출, LLM)는 `anyhow::Result`를 반환하고,
//! 코어 경계에서 아래 variant로 변환됩니다.

use std::path::PathBuf;

use thiserror::Error;

/// 코어 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 벡터 길이가 스토어 차원과 다름
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 빈 텍스트 또는 빈 벡터 엔트리
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// 잘못된 검색 요청 (영벡터, 빈 벡터, top_k = 0)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// 저장 파일 구조 검증 실패
    #[error("Corrupt vector store {path:?}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    /// 문서 텍스트 추출 실패
    #[error("Extraction failed for {source_id}: {message}")]
    Extraction { source_id: String, message: String },

    /// 임베딩 계산 실패
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// 언어 모델 호출 실패
    #[error("Model call failed: {0}")]
    ModelCall(String),

    /// 잘못된 설정 또는 프롬프트 템플릿
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// 코어 Result 별칭
pub type Result<T> = std::result::Result<T, RagError>;
