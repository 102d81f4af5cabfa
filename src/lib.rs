//! groundqa - 문서 기반 질의응답 (RAG)
//!
//! 문서를 청크로 나누고 임베딩해 파일 기반 벡터 스토어에 저장한 뒤,
//! 질문과 가장 유사한 청크를 찾아 언어 모델 프롬프트에 넣어 답변합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod scraper;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{get_data_dir, AppConfig};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::{RagError, Result};
pub use extractor::{ContentExtractor, TextExtractor};
pub use knowledge::{
    AnswerAssembler, BuildReport, Chunk, ChunkConfig, Chunker, EmbeddingStore, PromptTemplate,
    Retriever, SearchHit, StoreBuilder, StoreEntry, StoreStats, TokenChunker,
};
pub use llm::{GeminiChat, LanguageModel};
pub use pipeline::{open_or_build, Pipeline, StoreBootstrap};
pub use scraper::{ScrapedContent, WebScraper};
