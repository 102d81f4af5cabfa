//! 소스 수집 모듈
//!
//! 설정된 소스 목록을 개별 문서 목록으로 펼칩니다.
//! 폴더는 .gitignore를 존중하며 파일 이름 순으로 순회하므로
//! 같은 폴더는 항상 같은 순서의 문서를 만듭니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::config::{is_url, IngestConfig};

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 텍스트 파일 (마크다운, 코드 등)
    Text,
    /// PDF 파일
    Pdf,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "txt" | "rst" | "adoc" | "rs" | "ts" | "js" | "py" | "json" | "toml"
            | "yaml" | "yml" | "html" | "htm" | "go" | "java" | "c" | "cpp" | "h" | "sh"
            | "sql" | "xml" | "csv" => Some(FileType::Text),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 폴더 순회로 찾은 파일
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub file_type: FileType,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// 지원하지 않는 확장자나 파일이 아닌 경로는 None
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        let Some(file_type) = FileType::from_path(&path) else {
            return Ok(None);
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            file_type,
            size: metadata.len(),
        }))
    }
}

// ============================================================================
// File Collector
// ============================================================================

/// 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl From<&IngestConfig> for CollectorConfig {
    fn from(ingest: &IngestConfig) -> Self {
        Self {
            respect_gitignore: ingest.respect_gitignore,
            max_file_size: ingest.max_file_size,
            ..Self::default()
        }
    }
}

/// 소스 수집기
#[derive(Debug, Clone, Default)]
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 설정된 소스 하나를 문서 식별자 목록으로 펼침
    ///
    /// - URL: 그대로
    /// - 폴더: 지원 파일을 이름 순으로
    /// - 그 외: 그대로 (존재하지 않는 파일은 추출 단계에서 실패로 기록됨)
    pub fn expand_source(&self, source: &str) -> Result<Vec<String>> {
        if is_url(source) {
            return Ok(vec![source.to_string()]);
        }

        let path = Path::new(source);
        if path.is_dir() {
            let files = self.collect_directory(path)?;
            return Ok(files
                .into_iter()
                .map(|f| f.path.to_string_lossy().into_owned())
                .collect());
        }

        Ok(vec![source.to_string()])
    }

    /// 폴더 재귀 수집 (파일 이름 순)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        if !path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", path);
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            // .git 폴더가 없어도 .gitignore 적용
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) if self.should_include(&file) => files.push(file),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to collect file: {}", e),
            }
        }

        tracing::info!("Collected {} files from {:?}", files.len(), path);
        Ok(files)
    }

    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
