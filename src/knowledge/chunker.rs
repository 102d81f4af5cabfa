//! Text Chunking Module
//!
//! 추출된 문서 텍스트를 임베딩에 적합한 크기의 청크로 나눕니다.
//! 단위는 공백으로 구분된 토큰(단어)이며, 같은 입력과 설정에 대해
//! 항상 같은 결과를 냅니다 (저장 파일 재현성).

use super::vector::Chunk;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    /// 청크당 최대 토큰 수
    pub chunk_size: usize,
    /// 문서당 최대 청크 수 (초과분은 잘라냄)
    pub max_chunks: usize,
    /// 문장 경계에서 자르기 위한 최소 청크 길이 (문자 수)
    pub min_chunk_chars: usize,
    /// 이보다 짧은 청크는 버림 (문자 수)
    pub min_chunk_length_to_embed: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            max_chunks: 400,
            min_chunk_chars: 350,
            min_chunk_length_to_embed: 5,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 단일 텍스트를 청크로 분할
    fn split(&self, text: &str, source_id: &str) -> Vec<Chunk>;

    /// 페이지 단위 추출 결과를 분할 (문서 전체가 `max_chunks` 하나를 공유)
    fn split_pages(&self, pages: &[(usize, String)], source_id: &str) -> Vec<Chunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// TokenChunker
// ============================================================================

/// 토큰 윈도우 청커
///
/// `chunk_size` 토큰 윈도우를 잡고, 윈도우가 텍스트 끝에 닿지 않으면
/// 윈도우 안의 마지막 문장 경계(`.`, `!`, `?` 또는 줄바꿈)에서 자릅니다.
/// 단, 잘린 청크가 `min_chunk_chars`보다 짧아지면 윈도우 전체를 유지합니다.
pub struct TokenChunker {
    config: ChunkConfig,
}

impl TokenChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 텍스트를 최대 `budget`개의 청크 문자열로 분할
    fn split_text<'a>(&self, text: &'a str, budget: usize) -> Vec<&'a str> {
        let tokens = token_spans(text);
        let chunk_size = self.config.chunk_size.max(1);

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() && chunks.len() < budget {
            let end = (start + chunk_size).min(tokens.len());
            let cut = if end < tokens.len() {
                self.sentence_cut(text, &tokens[start..end]).map_or(end, |n| start + n)
            } else {
                end
            };

            let slice = text[tokens[start].0..tokens[cut - 1].1].trim();
            if !slice.is_empty() && slice.chars().count() >= self.config.min_chunk_length_to_embed {
                chunks.push(slice);
            }

            start = cut;
        }

        if start < tokens.len() {
            tracing::debug!(
                "Chunk limit {} reached, truncating {} remaining tokens",
                budget,
                tokens.len() - start
            );
        }

        chunks
    }

    /// 윈도우 내 마지막 문장 경계 다음 위치 (윈도우 기준 토큰 수)
    fn sentence_cut(&self, text: &str, window: &[(usize, usize)]) -> Option<usize> {
        let first = window.first()?.0;

        let (i, span) = window
            .iter()
            .enumerate()
            .rev()
            .find(|(_, span)| is_sentence_end(text, **span))?;

        let length = text[first..span.1].chars().count();
        (length >= self.config.min_chunk_chars).then_some(i + 1)
    }
}

impl Chunker for TokenChunker {
    fn split(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        self.split_text(text, self.config.max_chunks)
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                Chunk::new(chunk)
                    .with_metadata("source", source_id)
                    .with_metadata("chunk_index", index)
            })
            .collect()
    }

    fn split_pages(&self, pages: &[(usize, String)], source_id: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for (page, text) in pages {
            let remaining = self.config.max_chunks.saturating_sub(chunks.len());
            if remaining == 0 {
                tracing::debug!("Chunk limit reached for {}, skipping page {}", source_id, page);
                break;
            }

            for piece in self.split_text(text, remaining) {
                let index = chunks.len();
                chunks.push(
                    Chunk::new(piece)
                        .with_metadata("source", source_id)
                        .with_metadata("chunk_index", index)
                        .with_metadata("page", *page),
                );
            }
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "TokenChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 공백으로 구분된 토큰의 바이트 범위 목록
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }

    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}

/// 토큰이 문장 끝인지 (종결 부호로 끝나거나 바로 뒤가 줄바꿈)
fn is_sentence_end(text: &str, (start, end): (usize, usize)) -> bool {
    let token = &text[start..end];
    if token.ends_with(&['.', '!', '?'][..]) {
        return true;
    }

    let rest = &text[end..];
    rest.starts_with('\n') || rest.starts_with("\r\n")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::vector::MetadataValue;

    fn small_config(chunk_size: usize, max_chunks: usize) -> ChunkConfig {
        ChunkConfig {
            chunk_size,
            max_chunks,
            min_chunk_chars: 10,
            min_chunk_length_to_embed: 1,
        }
    }

    fn word_count(s: &str) -> usize {
        s.split_whitespace().count()
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = TokenChunker::with_defaults();
        assert!(chunker.split("", "doc").is_empty());
        assert!(chunker.split("   \n\t  ", "doc").is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunker = TokenChunker::with_defaults();
        let chunks = chunker.split("Paris is the capital of France.", "geo.txt");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Paris is the capital of France.");
        assert_eq!(chunks[0].source(), Some("geo.txt"));
        assert_eq!(
            chunks[0].metadata.get("chunk_index"),
            Some(&MetadataValue::Integer(0))
        );
    }

    #[test]
    fn test_chunker_cuts_at_sentence_boundary() {
        let chunker = TokenChunker::new(small_config(10, 10));
        let text = "One two three four. Five six seven eight nine ten eleven twelve.";

        let chunks = chunker.split(text, "doc");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "One two three four.");
        assert_eq!(chunks[1].text, "Five six seven eight nine ten eleven twelve.");
    }

    #[test]
    fn test_chunker_keeps_window_when_cut_too_short() {
        let config = ChunkConfig {
            min_chunk_chars: 350,
            ..small_config(10, 10)
        };
        let chunker = TokenChunker::new(config);
        let text = "One two three four. Five six seven eight nine ten eleven twelve.";

        let chunks = chunker.split(text, "doc");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "One two three four. Five six seven eight nine ten");
        assert_eq!(chunks[1].text, "eleven twelve.");
    }

    #[test]
    fn test_chunker_newline_is_boundary_and_preserved() {
        let chunker = TokenChunker::new(small_config(6, 10));
        let text = "alpha beta gamma\ndelta epsilon zeta eta theta";

        let chunks = chunker.split(text, "doc");

        assert_eq!(chunks[0].text, "alpha beta gamma");
        assert_eq!(chunks[1].text, "delta epsilon zeta eta theta");

        let chunker = TokenChunker::new(small_config(100, 10));
        let chunks = chunker.split("line one\nline two", "doc");
        assert_eq!(chunks[0].text, "line one\nline two");
    }

    #[test]
    fn test_chunker_respects_bounds() {
        let chunker = TokenChunker::new(small_config(7, 5));
        let text = (0..200)
            .map(|i| if i % 9 == 0 { format!("w{}.", i) } else { format!("w{}", i) })
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = chunker.split(&text, "doc");

        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| word_count(&c.text) <= 7));
        assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
    }

    #[test]
    fn test_chunker_truncates_at_max_chunks() {
        let chunker = TokenChunker::new(small_config(2, 3));
        let chunks = chunker.split("a1 a2 b1 b2 c1 c2 d1 d2 e1 e2", "doc");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a1 a2", "b1 b2", "c1 c2"]);
    }

    #[test]
    fn test_chunker_drops_short_chunks() {
        let config = ChunkConfig {
            min_chunk_length_to_embed: 5,
            ..small_config(1, 10)
        };
        let chunker = TokenChunker::new(config);

        let chunks = chunker.split("ok longer tiny verylong", "doc");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["longer", "verylong"]);
        assert_eq!(
            chunks[1].metadata.get("chunk_index"),
            Some(&MetadataValue::Integer(1))
        );
    }

    #[test]
    fn test_chunker_is_deterministic() {
        let chunker = TokenChunker::new(small_config(5, 50));
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);

        let first = chunker.split(&text, "fox.txt");
        let second = chunker.split(&text, "fox.txt");

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_chunker_multibyte_text() {
        let chunker = TokenChunker::new(small_config(3, 10));
        let chunks = chunker.split("안녕하세요 세계. 러스트 청킹 테스트 입니다", "ko.txt");

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| word_count(&c.text) <= 3));
    }

    #[test]
    fn test_split_pages_shares_budget() {
        let chunker = TokenChunker::new(small_config(2, 3));
        let pages = vec![
            (1, "p1a p1b p1c p1d".to_string()),
            (2, "p2a p2b p2c p2d".to_string()),
        ];

        let chunks = chunker.split_pages(&pages, "book.pdf");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "p2a p2b");
        assert_eq!(chunks[2].metadata.get("page"), Some(&MetadataValue::Integer(2)));
        assert_eq!(
            chunks[2].metadata.get("chunk_index"),
            Some(&MetadataValue::Integer(2))
        );
    }

    #[test]
    fn test_token_spans() {
        let text = "  ab  c\nd ";
        let spans = token_spans(text);
        let tokens: Vec<&str> = spans.iter().map(|(s, e)| &text[*s..*e]).collect();
        assert_eq!(tokens, vec!["ab", "c", "d"]);
    }

    #[test]
    fn test_config_default() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.max_chunks, 400);
        assert!(config.min_chunk_chars > 0);
    }
}
