//! 웹 스크래퍼 모듈
//!
//! http(s) 소스를 가져와 본문 텍스트만 남깁니다.
//! script/style/noscript 안의 텍스트는 버립니다.

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};

use crate::embedding::REQUEST_TIMEOUT;

/// 본문 후보 선택자 (앞에서부터 우선)
const CONTENT_SELECTORS: [&str; 6] = [
    "article",
    "main",
    "[role=main]",
    ".content",
    "#content",
    "body",
];

/// 본문으로 인정할 최소 길이
const MIN_CONTENT_LEN: usize = 100;

const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// 스크랩된 페이지
#[derive(Debug, Clone)]
pub struct ScrapedContent {
    pub title: Option<String>,
    /// 본문 텍스트 (태그 제거, 공백 정리)
    pub content: String,
    pub url: String,
}

impl ScrapedContent {
    /// 청킹용 문서 텍스트 (제목이 있으면 머리에 붙임)
    pub fn to_document_text(&self) -> String {
        match &self.title {
            Some(title) => format!("# {}\n\n{}", title, self.content),
            None => self.content.clone(),
        }
    }
}

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("groundqa/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client })
    }

    /// URL을 가져와 본문 추출
    pub async fn scrape(&self, url: &str) -> Result<ScrapedContent> {
        tracing::info!("Scraping: {}", url);

        let html = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP 요청 실패: {}", url))?
            .error_for_status()
            .with_context(|| format!("HTTP 응답 오류: {}", url))?
            .text()
            .await
            .context("응답 본문 읽기 실패")?;

        Ok(parse_page(url, &html))
    }
}

impl Default for WebScraper {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("Failed to build scraper client: {}", e);
            Self {
                client: reqwest::Client::new(),
            }
        })
    }
}

/// HTML 문서를 ScrapedContent로 변환
fn parse_page(url: &str, html: &str) -> ScrapedContent {
    let document = Html::parse_document(html);

    ScrapedContent {
        title: extract_title(&document),
        content: extract_content(&document),
        url: url.to_string(),
    }
}

/// 제목: <title>, 없으면 첫 <h1>
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|sel| {
        let selector = Selector::parse(sel).ok()?;
        let element = document.select(&selector).next()?;
        let title = element.text().collect::<String>().trim().to_string();
        (!title.is_empty()).then_some(title)
    })
}

fn extract_content(document: &Html) -> String {
    let mut fallback = String::new();

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = visible_text(&element);
            if text.len() > MIN_CONTENT_LEN {
                return text;
            }
            if fallback.is_empty() {
                fallback = text;
            }
        }
    }

    fallback
}

/// 요소의 보이는 텍스트 (공백 하나로 정리)
fn visible_text(element: &ElementRef) -> String {
    let mut words: Vec<&str> = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| SKIPPED_ELEMENTS.iter().any(|s| *s == e.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        words.extend(text.split_whitespace());
    }

    words.join(" ")
}
