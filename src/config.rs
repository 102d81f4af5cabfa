//! 설정 모듈
//!
//! 시작 시 한 번 로드되어 참조로 전달되는 단일 설정 구조체입니다.
//! 저장 위치: ~/.groundqa/config.toml (없으면 기본값)
//!
//! ```toml
//! [store]
//! path = "data/store.jsonl"
//!
//! [ingest]
//! sources = ["docs/guide.pdf", "docs/notes/", "https://example.com/faq"]
//! chunk_size = 300
//! max_chunks = 400
//!
//! [query]
//! top_k = 5
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::knowledge::ChunkConfig;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.groundqa/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".groundqa")
}

/// URL 형태의 소스인지 확인
pub fn is_url(source: &str) -> bool {
    url::Url::parse(source)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

// ============================================================================
// Config Types
// ============================================================================

/// 루트 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub query: QueryConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
}

/// 벡터 스토어 파일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 저장 파일 경로 (존재 여부가 "수집 필요"/"서비스 가능"을 구분)
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: get_data_dir().join("store.jsonl"),
        }
    }
}

/// 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 수집할 소스 (파일, 폴더, http(s) URL) - 순서대로 처리
    pub sources: Vec<String>,
    /// 청크당 최대 토큰 수
    pub chunk_size: usize,
    /// 문서당 최대 청크 수
    pub max_chunks: usize,
    /// 문장 경계 자르기 최소 길이 (문자 수)
    pub min_chunk_chars: usize,
    /// 임베딩할 최소 청크 길이 (문자 수)
    pub min_chunk_length_to_embed: usize,
    /// 폴더 수집 시 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// 폴더 수집 시 .gitignore 존중 여부
    pub respect_gitignore: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let chunk = ChunkConfig::default();
        Self {
            sources: vec![],
            chunk_size: chunk.chunk_size,
            max_chunks: chunk.max_chunks,
            min_chunk_chars: chunk.min_chunk_chars,
            min_chunk_length_to_embed: chunk.min_chunk_length_to_embed,
            max_file_size: 10 * 1024 * 1024, // 10MB
            respect_gitignore: true,
        }
    }
}

/// 질의 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 검색할 청크 수
    pub top_k: usize,
    /// 검색된 청크를 프롬프트에 합칠 때 구분자
    pub context_separator: String,
    /// 프롬프트 템플릿 파일 (`{input}`, `{documents}` 슬롯 필수)
    pub prompt_template: Option<PathBuf>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_separator: "\n\n".to_string(),
            prompt_template: None,
        }
    }
}

/// 임베딩 모델 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "gemini-embedding-001".to_string(),
            dimension: 768,
        }
    }
}

/// 언어 모델 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.2,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl AppConfig {
    /// 기본 설정 파일 경로 (~/.groundqa/config.toml)
    pub fn default_path() -> PathBuf {
        get_data_dir().join("config.toml")
    }

    /// 설정 로드
    ///
    /// 경로를 지정하면 해당 파일이 반드시 있어야 합니다.
    /// 지정하지 않으면 기본 경로를 읽고, 없으면 기본값을 사용합니다.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    tracing::debug!("No config file at {:?}, using defaults", path);
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// 특정 파일에서 로드 (상대 경로는 설정 파일 위치 기준)
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;

        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> std::result::Result<(), RagError> {
        let positive = [
            ("ingest.chunk_size", self.ingest.chunk_size),
            ("ingest.max_chunks", self.ingest.max_chunks),
            ("query.top_k", self.query.top_k),
            ("embedding.dimension", self.embedding.dimension),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(RagError::Config(format!("{} must be positive", name)));
            }
        }

        if self.store.path.as_os_str().is_empty() {
            return Err(RagError::Config("store.path must not be empty".to_string()));
        }

        Ok(())
    }

    /// 청커 설정
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.ingest.chunk_size,
            max_chunks: self.ingest.max_chunks,
            min_chunk_chars: self.ingest.min_chunk_chars,
            min_chunk_length_to_embed: self.ingest.min_chunk_length_to_embed,
        }
    }

    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };

        self.store.path = resolve(&self.store.path);
        self.query.prompt_template = self.query.prompt_template.as_deref().map(resolve);
        self.ingest.sources = self
            .ingest
            .sources
            .iter()
            .map(|s| {
                if is_url(s) {
                    s.clone()
                } else {
                    resolve(Path::new(s)).to_string_lossy().into_owned()
                }
            })
            .collect();
    }
}

// ============================================================================
// Tests
// ============================================================================
