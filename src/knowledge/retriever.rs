//! Retriever - 질의 임베딩 후 상위 청크 검색

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

use super::store::EmbeddingStore;
use super::vector::SearchHit;

/// 공유 스토어 위의 검색기
///
/// 스토어는 빌드/로드 후 불변이므로 여러 작업이 잠금 없이 동시에 사용할 수 있습니다.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<EmbeddingStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<EmbeddingStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// 유사도 순 청크 텍스트
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let hits = self.retrieve_scored(query, top_k).await?;
        Ok(hits.into_iter().map(|hit| hit.chunk.text).collect())
    }

    /// 유사도 점수와 메타데이터를 포함한 검색 결과
    pub async fn retrieve_scored(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        let hits = self.store.similarity_search(&vector, top_k)?;
        tracing::debug!("Retrieved {} chunks for query (top_k={})", hits.len(), top_k);

        Ok(hits)
    }
}

// ============================================================================
// Tests
// ============================================================================
