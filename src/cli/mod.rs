//! CLI 모듈
//!
//! groundqa 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::{CollectorConfig, FileCollector};
use crate::config::{get_data_dir, AppConfig};
use crate::embedding::{has_api_key, EmbeddingProvider, GeminiEmbedding};
use crate::extractor::ContentExtractor;
use crate::knowledge::{BuildReport, EmbeddingStore, Retriever, StoreBuilder, TokenChunker};
use crate::llm::GeminiChat;
use crate::pipeline::{open_or_build, Pipeline};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "groundqa")]
#[command(version, about = "문서 기반 질의응답 (RAG)", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: ~/.groundqa/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 설정된 소스로 벡터 스토어 생성
    Build {
        /// 저장 파일이 있어도 다시 생성
        #[arg(long)]
        force: bool,
    },

    /// 질문에 답변 (스토어가 없으면 먼저 생성)
    Ask {
        /// 질문
        question: String,

        /// 검색할 청크 수 (기본: query.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 유사 청크 검색 (답변 생성 없음)
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한 (기본: query.top_k)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    match cli.command {
        Commands::Build { force } => cmd_build(&config, force).await,
        Commands::Ask { question, top_k } => cmd_ask(config, &question, top_k).await,
        Commands::Search { query, limit } => cmd_search(&config, &query, limit).await,
        Commands::Status => cmd_status(&config, cli.config.as_deref()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 스토어 생성 명령어 (build)
async fn cmd_build(config: &AppConfig, force: bool) -> Result<()> {
    let path = &config.store.path;

    if path.exists() && !force {
        println!("[!] 벡터 스토어가 이미 있습니다: {}", path.display());
        println!("    다시 생성하려면 --force 를 사용하세요.");
        return Ok(());
    }

    require_api_key()?;
    warn_if_no_sources(config);

    let embedder = Arc::new(GeminiEmbedding::from_env(&config.embedding)?);
    let builder = store_builder(config, embedder)?;

    println!("[*] {}개 소스 수집 중...", config.ingest.sources.len());
    let (_, report) = builder
        .build(&config.ingest.sources, path)
        .await
        .context("벡터 스토어 생성 실패")?;

    print_report(&report, path);
    Ok(())
}

/// 질의응답 명령어 (ask)
async fn cmd_ask(mut config: AppConfig, question: &str, top_k: Option<usize>) -> Result<()> {
    require_api_key()?;

    if let Some(k) = top_k {
        config.query.top_k = k;
    }

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedding::from_env(&config.embedding)?);
    let store = prepare_store(&config, embedder.clone()).await?;
    let model = Arc::new(GeminiChat::from_env(&config.llm)?);

    let pipeline = Pipeline::from_config(&config, store, embedder, model)?;

    println!("[*] 질문: {}", question);
    let answer = pipeline
        .answer(question)
        .await
        .context("답변 생성 실패")?;

    println!();
    println!("{}", answer.trim_end());
    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(config: &AppConfig, query: &str, limit: Option<usize>) -> Result<()> {
    require_api_key()?;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedding::from_env(&config.embedding)?);
    let store = prepare_store(config, embedder.clone()).await?;
    let retriever = Retriever::new(store, embedder);

    let hits = retriever
        .retrieve_scored(query, limit.unwrap_or(config.query.top_k))
        .await
        .context("검색 실패")?;

    if hits.is_empty() {
        println!("[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("[OK] 검색 결과 ({} 건):\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [유사도: {:.4}] #{}",
            i + 1,
            hit.similarity,
            hit.position
        );

        if let Some(source) = hit.chunk.source() {
            match hit.chunk.metadata.get("page") {
                Some(page) => println!("   출처: {} (p.{})", source, page),
                None => println!("   출처: {}", source),
            }
        }

        println!("   내용: {}", truncate_text(&hit.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &AppConfig, config_path: Option<&Path>) -> Result<()> {
    println!("groundqa v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_path);
    if config_path.exists() {
        println!("[OK] 설정 파일: {}", config_path.display());
    } else {
        println!("[*] 설정 파일: 없음 (기본값 사용)");
    }

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    println!("[*] 소스: {} 개", config.ingest.sources.len());

    let path = &config.store.path;
    if !path.exists() {
        println!("[!] 벡터 스토어 없음: {}", path.display());
        println!("    생성: groundqa build");
        return Ok(());
    }

    match EmbeddingStore::open(path) {
        Ok(store) => {
            let stats = store.stats();
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

            println!("[OK] 벡터 스토어: {} ({})", path.display(), format_bytes(size));
            println!(
                "     청크: {} | 차원: {}",
                stats.entry_count,
                stats
                    .dimension
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );

            for (source, count) in &stats.sources {
                println!("     - {} ({} 청크)", truncate_text(source, 60), count);
            }
        }
        Err(e) => {
            println!("[!] 벡터 스토어 로드 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

fn warn_if_no_sources(config: &AppConfig) {
    if config.ingest.sources.is_empty() {
        println!("[!] ingest.sources 가 비어 있습니다. 빈 스토어가 생성됩니다.");
        println!("    설정 파일: {}", AppConfig::default_path().display());
    }
}

/// 설정으로 StoreBuilder 조립
fn store_builder(config: &AppConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<StoreBuilder> {
    let extractor = ContentExtractor::new().context("ContentExtractor 생성 실패")?;
    let collector = FileCollector::new(CollectorConfig::from(&config.ingest));

    Ok(StoreBuilder::new(
        Arc::new(extractor),
        Box::new(TokenChunker::new(config.chunk_config())),
        embedder,
    )
    .with_collector(collector))
}

/// 저장 파일 로드 또는 최초 수집 후 공유 스토어 반환
async fn prepare_store(
    config: &AppConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<EmbeddingStore>> {
    let path = &config.store.path;
    if !path.exists() {
        println!("[*] 벡터 스토어가 없어 먼저 생성합니다: {}", path.display());
        warn_if_no_sources(config);
    }

    let builder = store_builder(config, embedder)?;
    let (store, report) = open_or_build(path, &config.ingest.sources, &builder)
        .await
        .with_context(|| format!("벡터 스토어 열기 실패: {}", path.display()))?;

    if let Some(report) = report {
        print_report(&report, path);
    }

    Ok(Arc::new(store))
}

fn print_report(report: &BuildReport, path: &Path) {
    if report.all_failed() {
        println!("[!] 모든 문서 수집에 실패했습니다. 빈 스토어가 저장되었습니다.");
    } else {
        println!(
            "[OK] {}개 문서, {}개 청크 저장: {}",
            report.documents_ingested,
            report.chunks_added,
            path.display()
        );
    }

    for source in &report.empty_documents {
        println!("[!] 텍스트 없음: {}", source);
    }

    for failure in &report.failures {
        println!(
            "[!] 실패 ({}): {} - {}",
            failure.kind,
            failure.source,
            truncate_text(&failure.message, 120)
        );
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_parse_ask_with_global_config() {
        let cli = Cli::try_parse_from([
            "groundqa",
            "ask",
            "What is the capital of France?",
            "-k",
            "3",
            "--config",
            "custom.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Ask { question, top_k } => {
                assert_eq!(question, "What is the capital of France?");
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_parse_build_force() {
        let cli = Cli::try_parse_from(["groundqa", "build", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Build { force: true }));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_status_without_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.store.path = dir.path().join("store.jsonl");

        assert!(cmd_status(&config, Some(&dir.path().join("config.toml"))).is_ok());
    }
}
