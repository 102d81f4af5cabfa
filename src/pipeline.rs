//! 질의응답 파이프라인
//!
//! 외부에 노출되는 진입점은 `Pipeline::answer` 하나입니다.
//! 스토어는 빌드/로드가 끝난 뒤 `Arc`로 옮겨져 불변으로만 공유됩니다.

use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::knowledge::{
    AnswerAssembler, BuildReport, EmbeddingStore, PromptTemplate, Retriever, StoreBuilder,
};
use crate::llm::LanguageModel;

// ============================================================================
// Bootstrap
// ============================================================================

/// 시작 시 스토어 준비 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBootstrap {
    /// 저장 파일 로드
    Load,
    /// 수집 후 저장
    Build,
}

impl StoreBootstrap {
    pub fn from_exists(store_exists: bool) -> Self {
        if store_exists {
            StoreBootstrap::Load
        } else {
            StoreBootstrap::Build
        }
    }
}

/// 저장 파일이 있으면 로드, 없으면 수집 후 저장
///
/// 수집한 경우에만 보고서가 함께 반환됩니다.
pub async fn open_or_build(
    path: &Path,
    sources: &[String],
    builder: &StoreBuilder,
) -> Result<(EmbeddingStore, Option<BuildReport>)> {
    match StoreBootstrap::from_exists(path.exists()) {
        StoreBootstrap::Load => {
            tracing::info!("Loading vector store from {:?}", path);
            let store = EmbeddingStore::open(path)?;
            tracing::info!("Loaded {} entries", store.len());
            Ok((store, None))
        }
        StoreBootstrap::Build => {
            tracing::info!("Vector store file not found, ingesting {} sources", sources.len());
            let (store, report) = builder.build(sources, path).await?;
            Ok((store, Some(report)))
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Retriever + Answer Assembler
pub struct Pipeline {
    retriever: Retriever,
    assembler: AnswerAssembler,
    top_k: usize,
}

impl Pipeline {
    pub fn new(retriever: Retriever, assembler: AnswerAssembler, top_k: usize) -> Self {
        Self {
            retriever,
            assembler,
            top_k,
        }
    }

    /// 설정값(top_k, 구분자, 템플릿)으로 조립
    pub fn from_config(
        config: &AppConfig,
        store: Arc<EmbeddingStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let template = match &config.query.prompt_template {
            Some(path) => PromptTemplate::from_file(path)?,
            None => PromptTemplate::default(),
        };

        Ok(Self::new(
            Retriever::new(store, embedder),
            AnswerAssembler::new(template, config.query.context_separator.clone(), model),
            config.query.top_k,
        ))
    }

    /// 질문 → 검색 → 프롬프트 → 답변
    pub async fn answer(&self, question: &str) -> Result<String> {
        let texts = self.retriever.retrieve(question, self.top_k).await?;
        tracing::info!("Answering with {} retrieved chunks", texts.len());
        self.assembler.answer(question, &texts).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::knowledge::{Chunk, StoreEntry, TokenChunker};
    use crate::testing::{FakeEmbedder, FakeExtractor, FakeModel};
    use tempfile::TempDir;

    fn builder(extractor: FakeExtractor, embedder: Arc<FakeEmbedder>) -> StoreBuilder {
        StoreBuilder::new(
            Arc::new(extractor),
            Box::new(TokenChunker::with_defaults()),
            embedder,
        )
    }

    #[test]
    fn test_bootstrap_decision() {
        assert_eq!(StoreBootstrap::from_exists(true), StoreBootstrap::Load);
        assert_eq!(StoreBootstrap::from_exists(false), StoreBootstrap::Build);
    }

    #[tokio::test]
    async fn test_open_or_build_builds_then_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.jsonl");
        let sources = vec!["a.txt".to_string()];
        let embedder = Arc::new(FakeEmbedder::new(8));

        let first = builder(
            FakeExtractor::new().with_text("a.txt", "Paris is the capital of France."),
            embedder.clone(),
        );
        let (built, report) = open_or_build(&path, &sources, &first).await.unwrap();
        assert_eq!(report.unwrap().chunks_added, 1);
        assert!(path.exists());

        // 두 번째 실행은 추출기를 건드리지 않음
        let second = builder(FakeExtractor::new(), embedder);
        let (loaded, report) = open_or_build(&path, &sources, &second).await.unwrap();
        assert!(report.is_none());
        assert_eq!(loaded, built);
    }

    #[tokio::test]
    async fn test_open_corrupt_store_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.jsonl");
        std::fs::write(&path, "not a store").unwrap();

        let builder = builder(FakeExtractor::new(), Arc::new(FakeEmbedder::new(8)));
        let err = open_or_build(&path, &[], &builder).await.unwrap_err();
        assert!(matches!(err, RagError::CorruptStore { .. }));
    }

    #[tokio::test]
    async fn test_answer_end_to_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.jsonl");
        let embedder = Arc::new(FakeEmbedder::new(32));

        let extractor = FakeExtractor::new()
            .with_text("geo.txt", "Paris is the capital of France.")
            .with_text("fruit.txt", "Bananas are yellow and sweet.");
        let sources = vec!["geo.txt".to_string(), "fruit.txt".to_string()];
        let (store, _) = open_or_build(&path, &sources, &builder(extractor, embedder.clone()))
            .await
            .unwrap();

        let mut config = AppConfig::default();
        config.query.top_k = 1;

        let model = Arc::new(FakeModel::echo());
        let pipeline =
            Pipeline::from_config(&config, Arc::new(store), embedder, model.clone()).unwrap();

        let answer = pipeline.answer("What is the capital of France?").await.unwrap();

        assert!(answer.contains("Paris is the capital of France."));
        assert!(!answer.contains("Bananas"));
        assert!(answer.contains("What is the capital of France?"));
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_on_empty_store_still_calls_model() {
        let config = AppConfig::default();
        let model = Arc::new(FakeModel::answering("I don't know."));
        let pipeline = Pipeline::from_config(
            &config,
            Arc::new(EmbeddingStore::new()),
            Arc::new(FakeEmbedder::new(8)),
            model.clone(),
        )
        .unwrap();

        assert_eq!(pipeline.answer("Anything?").await.unwrap(), "I don't know.");
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_question_is_invalid_query() {
        let mut store = EmbeddingStore::new();
        store
            .add(vec![StoreEntry::new(
                Chunk::new("Paris is the capital of France."),
                vec![1.0; 8],
            )])
            .unwrap();

        let model = Arc::new(FakeModel::echo());
        let pipeline = Pipeline::from_config(
            &AppConfig::default(),
            Arc::new(store),
            Arc::new(FakeEmbedder::new(8)),
            model.clone(),
        )
        .unwrap();

        let err = pipeline.answer("").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidQuery(_)));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_template_file_rejected() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("prompt.txt");
        std::fs::write(&template, "only {input}").unwrap();

        let mut config = AppConfig::default();
        config.query.prompt_template = Some(template);

        let result = Pipeline::from_config(
            &config,
            Arc::new(EmbeddingStore::new()),
            Arc::new(FakeEmbedder::new(8)),
            Arc::new(FakeModel::echo()),
        );
        assert!(matches!(result, Err(RagError::Config(_))));
    }
}
