//! Store Builder - 최초 수집
//!
//! 소스마다 순서대로 추출 → 청킹 → 임베딩 → 추가를 수행하고
//! 마지막에 한 번 저장합니다. 실패한 문서는 통째로 건너뛰고 보고서에 남깁니다.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::collector::FileCollector;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extractor::{ExtractedContent, TextExtractor};

use super::chunker::Chunker;
use super::store::EmbeddingStore;
use super::vector::{Chunk, StoreEntry};

// ============================================================================
// Build Report
// ============================================================================

/// 문서 실패 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Extraction,
    Embedding,
    Store,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Extraction => "extraction",
            FailureKind::Embedding => "embedding",
            FailureKind::Store => "store",
        };
        f.write_str(s)
    }
}

/// 건너뛴 문서
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    pub source: String,
    pub kind: FailureKind,
    pub message: String,
}

impl DocumentFailure {
    fn from_error(source: &str, error: &RagError) -> Self {
        let kind = match error {
            RagError::Extraction { .. } => FailureKind::Extraction,
            RagError::Embedding(_) => FailureKind::Embedding,
            _ => FailureKind::Store,
        };

        Self {
            source: source.to_string(),
            kind,
            message: error.to_string(),
        }
    }
}

/// 수집 결과
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// 청크가 하나 이상 추가된 문서 수
    pub documents_ingested: usize,
    pub chunks_added: usize,
    /// 텍스트가 없어 청크가 0개인 문서
    pub empty_documents: Vec<String>,
    pub failures: Vec<DocumentFailure>,
}

impl BuildReport {
    /// 처리한 문서 수
    pub fn documents_seen(&self) -> usize {
        self.documents_ingested + self.empty_documents.len() + self.failures.len()
    }

    /// 모든 문서가 실패했는지
    pub fn all_failed(&self) -> bool {
        !self.failures.is_empty() && self.failures.len() == self.documents_seen()
    }
}

// ============================================================================
// Store Builder
// ============================================================================

/// 최초 수집기
pub struct StoreBuilder {
    extractor: Arc<dyn TextExtractor>,
    chunker: Box<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    collector: Option<FileCollector>,
}

impl StoreBuilder {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        chunker: Box<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            extractor,
            chunker,
            embedder,
            collector: None,
        }
    }

    /// 폴더 소스를 문서 목록으로 펼칠 수집기 지정
    pub fn with_collector(mut self, collector: FileCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// 소스 목록으로 새 스토어를 만들고 `path`에 한 번 저장
    ///
    /// 문서 단위 실패는 보고서에만 남고, 저장 실패만 에러로 반환됩니다.
    pub async fn build(
        &self,
        sources: &[String],
        path: &Path,
    ) -> Result<(EmbeddingStore, BuildReport)> {
        tracing::info!(
            "Building vector store from {} sources (chunker={}, embedder={}, dimension={})",
            sources.len(),
            self.chunker.name(),
            self.embedder.name(),
            self.embedder.dimension()
        );

        let mut store = EmbeddingStore::new();
        let mut report = BuildReport::default();

        for document in self.expand(sources, &mut report) {
            tracing::info!("Loading document --> {}", document);

            match self.ingest_document(&document, &mut store).await {
                Ok(0) => {
                    tracing::warn!("No chunks produced from {}", document);
                    report.empty_documents.push(document);
                }
                Ok(added) => {
                    report.documents_ingested += 1;
                    report.chunks_added += added;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", document, e);
                    report
                        .failures
                        .push(DocumentFailure::from_error(&document, &e));
                }
            }
        }

        if report.all_failed() {
            tracing::error!(
                "All {} documents failed; persisting an empty store",
                report.failures.len()
            );
        }

        store.save(path)?;

        tracing::info!(
            "Vector store saved to {:?} ({} documents, {} chunks, {} failed)",
            path,
            report.documents_ingested,
            report.chunks_added,
            report.failures.len()
        );

        Ok((store, report))
    }

    /// 설정된 소스를 문서 목록으로 펼침 (펼치기 실패는 추출 실패로 기록)
    fn expand(&self, sources: &[String], report: &mut BuildReport) -> Vec<String> {
        let Some(collector) = &self.collector else {
            return sources.to_vec();
        };

        let mut documents = Vec::new();
        for source in sources {
            match collector.expand_source(source) {
                Ok(expanded) => documents.extend(expanded),
                Err(e) => {
                    tracing::warn!("Failed to expand source {}: {:#}", source, e);
                    report.failures.push(DocumentFailure {
                        source: source.clone(),
                        kind: FailureKind::Extraction,
                        message: format!("{:#}", e),
                    });
                }
            }
        }
        documents
    }

    /// 문서 하나 처리, 추가된 청크 수 반환
    ///
    /// 에러가 나면 이 문서의 청크는 하나도 추가되지 않습니다.
    async fn ingest_document(&self, source: &str, store: &mut EmbeddingStore) -> Result<usize> {
        let contents = self
            .extractor
            .extract(source)
            .await
            .map_err(|e| RagError::Extraction {
                source_id: source.to_string(),
                message: format!("{:#}", e),
            })?;

        let chunks = self.split(&contents, source);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        tracing::debug!("Embedded {} chunks from {}", chunks.len(), source);

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoreEntry::new(chunk, vector))
            .collect();

        store.add(entries)
    }

    /// 페이지 정보가 있으면 페이지 단위로, 없으면 전체 텍스트로 분할
    fn split(&self, contents: &[ExtractedContent], source: &str) -> Vec<Chunk> {
        if contents.iter().any(|c| c.page_number.is_some()) {
            let pages: Vec<(usize, String)> = contents
                .iter()
                .enumerate()
                .map(|(i, c)| (c.page_number.unwrap_or(i + 1), c.text.clone()))
                .collect();
            return self.chunker.split_pages(&pages, source);
        }

        let text = contents
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.chunker.split(&text, source)
    }
}

// ============================================================================
// Tests
// ============================================================================
