//! Embedding Store - 메모리 벡터 인덱스 + 파일 영속화
//!
//! (청크, 벡터) 엔트리를 삽입 순서대로 보관하고 전수 코사인 유사도 검색을 제공합니다.
//! 인덱스 구조 없이 전체를 스캔합니다 (O(n·d)).
//!
//! 저장 포맷 (텍스트, JSON Lines):
//! ```text
//! {"format":"groundqa-store","version":1,"dimension":768,"count":2,"created_at":"...","checksum":"<sha256>"}
//! {"text":"...","metadata":{...},"vector":[...]}
//! {"text":"...","metadata":{...},"vector":[...]}
//! ```
//! `checksum`은 헤더 다음 본문 전체의 SHA-256입니다.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};

use super::vector::{
    cosine_with_norm, magnitude, Chunk, Metadata, SearchHit, StoreEntry,
};

/// 저장 파일 포맷 식별자
const STORE_FORMAT: &str = "groundqa-store";

/// 저장 파일 포맷 버전
const STORE_VERSION: u32 = 1;

// ============================================================================
// Persistence Types
// ============================================================================

/// 저장 파일 헤더 (첫 줄)
#[derive(Debug, Serialize, Deserialize)]
struct StoreHeader {
    format: String,
    version: u32,
    dimension: Option<usize>,
    count: usize,
    created_at: DateTime<Utc>,
    checksum: String,
}

/// 저장용 레코드 (쓰기)
#[derive(Serialize)]
struct RecordRef<'a> {
    text: &'a str,
    metadata: &'a Metadata,
    vector: &'a [f32],
}

/// 저장용 레코드 (읽기)
#[derive(Deserialize)]
struct Record {
    text: String,
    #[serde(default)]
    metadata: Metadata,
    vector: Vec<f32>,
}

/// 스토어 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub dimension: Option<usize>,
    pub entry_count: usize,
    /// (출처, 청크 수) - 처음 등장한 순서
    pub sources: Vec<(String, usize)>,
}

// ============================================================================
// EmbeddingStore
// ============================================================================

/// Embedding Store
///
/// 빌드 후에는 불변으로 공유됩니다 (`Arc<EmbeddingStore>`).
/// 내부 가변성이 없으므로 동시 읽기에 잠금이 필요 없습니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingStore {
    entries: Vec<StoreEntry>,
    dimension: Option<usize>,
}

impl EmbeddingStore {
    /// 빈 스토어 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 파일에서 스토어 열기
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self::new();
        store.load(path)?;
        Ok(store)
    }

    /// 확정된 벡터 차원 (첫 삽입 전에는 None)
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 엔트리 읽기 전용 순회 (삽입 순서)
    pub fn entries(&self) -> impl Iterator<Item = &StoreEntry> {
        self.entries.iter()
    }

    /// 엔트리 배치 추가
    ///
    /// 전체를 먼저 검증한 뒤 추가합니다. 하나라도 실패하면 스토어는 변경되지 않습니다.
    /// 첫 번째로 삽입되는 벡터의 길이가 스토어 차원이 됩니다.
    pub fn add(&mut self, entries: Vec<StoreEntry>) -> Result<usize> {
        let Some(first) = entries.first() else {
            return Ok(0);
        };

        let expected = self.dimension.unwrap_or(first.vector.len());

        for entry in &entries {
            if entry.vector.is_empty() {
                return Err(RagError::InvalidEntry("empty embedding vector".to_string()));
            }
            if entry.vector.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: entry.vector.len(),
                });
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(RagError::InvalidEntry(
                    "non-finite value in embedding vector".to_string(),
                ));
            }
            if entry.chunk.text.trim().is_empty() {
                return Err(RagError::InvalidEntry("empty chunk text".to_string()));
            }
            if let Some(key) = entry.chunk.non_finite_metadata() {
                return Err(RagError::InvalidEntry(format!(
                    "non-finite metadata value: {}",
                    key
                )));
            }
        }

        let added = entries.len();
        self.dimension = Some(expected);
        self.entries.extend(entries);

        tracing::debug!("Added {} entries (total={})", added, self.entries.len());
        Ok(added)
    }

    /// 코사인 유사도 상위 `top_k` 검색
    ///
    /// 유사도 내림차순, 동점이면 먼저 삽입된 엔트리가 앞섭니다.
    /// 결과는 스토어와 분리된 복사본입니다.
    pub fn similarity_search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RagError::InvalidQuery("top_k must be at least 1".to_string()));
        }
        if query.is_empty() {
            return Err(RagError::InvalidQuery("empty query vector".to_string()));
        }

        let query_norm = magnitude(query);
        if query_norm == 0.0 || !query_norm.is_finite() {
            return Err(RagError::InvalidQuery(
                "query vector has zero magnitude".to_string(),
            ));
        }

        let Some(dimension) = self.dimension else {
            return Ok(vec![]);
        };

        if query.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_with_norm(query, query_norm, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, similarity)| SearchHit {
                position,
                chunk: self.entries[position].chunk.clone(),
                similarity,
            })
            .collect())
    }

    /// 파일로 저장 (임시 파일에 쓴 뒤 rename으로 교체)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut body = Vec::new();
        for entry in &self.entries {
            serde_json::to_writer(
                &mut body,
                &RecordRef {
                    text: &entry.chunk.text,
                    metadata: &entry.chunk.metadata,
                    vector: &entry.vector,
                },
            )?;
            body.push(b'\n');
        }

        let header = StoreHeader {
            format: STORE_FORMAT.to_string(),
            version: STORE_VERSION,
            dimension: self.dimension,
            count: self.entries.len(),
            created_at: Utc::now(),
            checksum: sha256_hex(&body),
        };

        let tmp_path = temp_path(path);
        if let Err(e) = write_file(&tmp_path, &header, &body) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::info!(
            "Saved vector store: {:?} ({} entries, dimension={:?})",
            path,
            self.entries.len(),
            self.dimension
        );
        Ok(())
    }

    /// 파일에서 읽어 현재 내용을 교체
    ///
    /// 검증에 실패하면 `CorruptStore`를 반환하고 현재 내용은 그대로 둡니다.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let loaded = read_file(path)?;

        tracing::info!(
            "Loaded vector store: {:?} ({} entries, dimension={:?})",
            path,
            loaded.entries.len(),
            loaded.dimension
        );

        *self = loaded;
        Ok(())
    }

    /// 스토어 통계
    pub fn stats(&self) -> StoreStats {
        let mut sources: Vec<(String, usize)> = Vec::new();

        for entry in &self.entries {
            let source = entry.chunk.source().unwrap_or("-");
            match sources.iter_mut().find(|(s, _)| s == source) {
                Some((_, count)) => *count += 1,
                None => sources.push((source.to_string(), 1)),
            }
        }

        StoreStats {
            dimension: self.dimension,
            entry_count: self.entries.len(),
            sources,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 같은 디렉토리의 임시 파일 경로 (`.<name>.tmp`)
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

fn write_file(path: &Path, header: &StoreHeader, body: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, header)?;
    writer.write_all(b"\n")?;
    writer.write_all(body)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    Ok(())
}

fn read_file(path: &Path) -> Result<EmbeddingStore> {
    let raw = fs::read(path).map_err(|e| RagError::corrupt(path, format!("unreadable: {}", e)))?;

    let split = raw
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| RagError::corrupt(path, "missing header line"))?;

    let header: StoreHeader = serde_json::from_slice(&raw[..split])
        .map_err(|e| RagError::corrupt(path, format!("invalid header: {}", e)))?;

    if header.format != STORE_FORMAT {
        return Err(RagError::corrupt(
            path,
            format!("unknown format: {}", header.format),
        ));
    }
    if header.version != STORE_VERSION {
        return Err(RagError::corrupt(
            path,
            format!("unsupported version: {}", header.version),
        ));
    }

    let body = &raw[split + 1..];
    if sha256_hex(body) != header.checksum {
        return Err(RagError::corrupt(path, "checksum mismatch"));
    }

    let dimension = match (header.count, header.dimension) {
        (0, _) => None,
        (_, Some(d)) if d > 0 => Some(d),
        _ => return Err(RagError::corrupt(path, "missing dimension")),
    };

    let mut entries = Vec::new();

    for (line_no, line) in body
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .enumerate()
    {
        let record: Record = serde_json::from_slice(line)
            .map_err(|e| RagError::corrupt(path, format!("record {}: {}", line_no, e)))?;

        if Some(record.vector.len()) != dimension {
            return Err(RagError::corrupt(
                path,
                format!(
                    "record {}: vector length {} does not match dimension {:?}",
                    line_no,
                    record.vector.len(),
                    dimension
                ),
            ));
        }
        if record.text.trim().is_empty() {
            return Err(RagError::corrupt(path, format!("record {}: empty text", line_no)));
        }

        entries.push(StoreEntry::new(
            Chunk {
                text: record.text,
                metadata: record.metadata,
            },
            record.vector,
        ));
    }

    if entries.len() != header.count {
        return Err(RagError::corrupt(
            path,
            format!(
                "declared {} entries but found {}",
                header.count,
                entries.len()
            ),
        ));
    }

    Ok(EmbeddingStore { entries, dimension })
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
