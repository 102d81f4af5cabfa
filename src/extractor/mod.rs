//! 콘텐츠 추출 모듈
//!
//! 수집 소스에서 평문 텍스트를 추출합니다.
//! - 텍스트 파일: 직접 읽기
//! - PDF 파일: pdf-extract로 페이지별 추출
//! - http(s) URL: 웹 페이지 본문 스크래핑

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::collector::FileType;
use crate::config::is_url;
use crate::scraper::WebScraper;

// ============================================================================
// Extracted Content
// ============================================================================

/// 소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Text,
    Pdf,
    Web,
}

/// 추출된 콘텐츠 (페이지 단위)
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// 추출된 텍스트
    pub text: String,
    /// 원본 소스 종류
    pub source_type: SourceType,
    /// PDF 페이지 번호 (1부터 시작)
    pub page_number: Option<usize>,
}

impl ExtractedContent {
    fn whole(text: String, source_type: SourceType) -> Self {
        Self {
            text,
            source_type,
            page_number: None,
        }
    }
}

// ============================================================================
// TextExtractor Trait
// ============================================================================

/// 텍스트 추출 트레이트
///
/// 소스 식별자(파일 경로 또는 URL)에서 평문과 페이지 정보를 추출합니다.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, source: &str) -> Result<Vec<ExtractedContent>>;
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 기본 콘텐츠 추출기 (파일 + URL)
#[derive(Default)]
pub struct ContentExtractor {
    scraper: WebScraper,
}

impl ContentExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            scraper: WebScraper::new()?,
        })
    }

    /// 텍스트 파일에서 추출
    async fn extract_text(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        Ok(vec![ExtractedContent::whole(text, SourceType::Text)])
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages
            .into_iter()
            .map(|(page_num, text)| ExtractedContent {
                text,
                source_type: SourceType::Pdf,
                page_number: Some(page_num),
            })
            .collect())
    }

    /// 웹 페이지에서 추출
    async fn extract_web(&self, url: &str) -> Result<Vec<ExtractedContent>> {
        let scraped = self.scraper.scrape(url).await?;
        Ok(vec![ExtractedContent::whole(
            scraped.to_document_text(),
            SourceType::Web,
        )])
    }
}

#[async_trait]
impl TextExtractor for ContentExtractor {
    async fn extract(&self, source: &str) -> Result<Vec<ExtractedContent>> {
        if is_url(source) {
            return self.extract_web(source).await;
        }

        let path = Path::new(source);
        match FileType::from_path(path) {
            Some(FileType::Text) => self.extract_text(path).await,
            Some(FileType::Pdf) => self.extract_pdf(path).await,
            None => anyhow::bail!("Unsupported file type: {:?}", path),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nParis is the capital of France.").unwrap();

        let extractor = ContentExtractor::new().unwrap();
        let contents = extractor.extract(path.to_str().unwrap()).await.unwrap();

        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].source_type, SourceType::Text);
        assert!(contents[0].page_number.is_none());
        assert!(contents[0].text.contains("Paris"));
    }

    #[tokio::test]
    async fn test_extract_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.txt");

        let extractor = ContentExtractor::new().unwrap();
        assert!(extractor.extract(path.to_str().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn test_extract_unsupported_type_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("binary.exe");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();

        let extractor = ContentExtractor::new().unwrap();
        let err = extractor.extract(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
    }
}
