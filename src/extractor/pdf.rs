//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

/// PDF에서 텍스트 추출
///
/// (페이지 번호, 텍스트) 목록을 반환합니다. 페이지 번호는 1부터 시작합니다.
/// 텍스트가 없는 PDF(스캔 문서 등)는 빈 목록을 반환합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(number_pages(split_pdf_pages(&text)))
}

fn number_pages(pages: Vec<String>) -> Vec<(usize, String)> {
    pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect()
}

/// PDF 텍스트를 페이지별로 분리
fn split_pdf_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리 시도
    let pages = non_empty_parts(text.split('\x0c'));
    if pages.len() > 1 {
        return pages;
    }

    // 페이지 구분자 패턴으로 시도 (예: "--- Page 1 ---")
    if let Ok(page_pattern) =
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
    {
        if page_pattern.is_match(text) {
            let pages = non_empty_parts(page_pattern.split(text));
            if pages.len() > 1 {
                return pages;
            }
        }
    }

    // 분리 실패 - 전체를 하나의 페이지로
    vec![text.trim().to_string()]
}

fn non_empty_parts<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pdf_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0c\x0cPage 3 content";
        let pages = split_pdf_pages(text);
        assert_eq!(pages, vec!["Page 1 content", "Page 2 content", "Page 3 content"]);
    }

    #[test]
    fn test_split_pdf_pages_with_marker() {
        let text = "intro text\n--- Page 2 ---\nsecond page\n--- Page 3 ---\nthird page";
        let pages = split_pdf_pages(text);
        assert_eq!(pages, vec!["intro text", "second page", "third page"]);
    }

    #[test]
    fn test_split_pdf_pages_no_separator() {
        let pages = split_pdf_pages("  Just some text without page breaks ");
        assert_eq!(pages, vec!["Just some text without page breaks"]);
    }

    #[test]
    fn test_number_pages_starts_at_one() {
        let numbered = number_pages(vec!["a".into(), "b".into()]);
        assert_eq!(numbered, vec![(1, "a".to_string()), (2, "b".to_string())]);
    }

    #[test]
    fn test_extract_invalid_pdf_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        assert!(extract_text_from_pdf(&path).is_err());
    }
}
