//! Knowledge 모듈 - 임베딩 스토어와 검색
//!
//! - Chunker: 토큰 윈도우 + 문장 경계 분할
//! - Store: 메모리 내 정확한 코사인 검색 + 파일 저장/로드
//! - Builder: 최초 수집 (추출 → 청킹 → 임베딩 → 추가 → 저장)
//! - Retriever / Answer: 질의 임베딩, 상위 K 검색, 프롬프트 조립

mod answer;
mod builder;
mod chunker;
mod retriever;
mod store;
mod vector;

// Re-exports
pub use answer::{AnswerAssembler, PromptTemplate, DEFAULT_PROMPT_TEMPLATE};
pub use builder::{BuildReport, DocumentFailure, FailureKind, StoreBuilder};
pub use chunker::{ChunkConfig, Chunker, TokenChunker};
pub use retriever::Retriever;
pub use store::{EmbeddingStore, StoreStats};
pub use vector::{
    magnitude, Chunk, EmbeddingVector, Metadata, MetadataValue, SearchHit, StoreEntry,
};
