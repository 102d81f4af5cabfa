//! Answer Assembler - 프롬프트 조립 + 언어 모델 호출

use std::path::Path;
use std::sync::Arc;

use crate::error::{RagError, Result};
use crate::llm::LanguageModel;

const INPUT_SLOT: &str = "{input}";
const DOCUMENTS_SLOT: &str = "{documents}";

/// 기본 프롬프트 템플릿
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are a helpful assistant that answers questions using only the provided documents.
If the documents do not contain the answer, say that you don't know.

DOCUMENTS:
{documents}

QUESTION:
{input}
";

// ============================================================================
// Prompt Template
// ============================================================================

/// `{input}`, `{documents}` 두 슬롯을 가진 프롬프트 템플릿
///
/// 치환은 한 번의 왼쪽→오른쪽 스캔으로 끝나며, 치환된 값은 다시 검사하지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// 두 슬롯이 모두 있어야 생성됩니다
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();

        for slot in [INPUT_SLOT, DOCUMENTS_SLOT] {
            if !template.contains(slot) {
                return Err(RagError::Config(format!(
                    "prompt template is missing the {} slot",
                    slot
                )));
            }
        }

        Ok(Self { template })
    }

    /// 템플릿 파일에서 로드
    pub fn from_file(path: &Path) -> Result<Self> {
        let template = std::fs::read_to_string(path)?;
        Self::new(template)
    }

    /// 슬롯 치환
    pub fn render(&self, input: &str, documents: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + input.len() + documents.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if let Some(after) = tail.strip_prefix(INPUT_SLOT) {
                out.push_str(input);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(DOCUMENTS_SLOT) {
                out.push_str(documents);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }

        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

// ============================================================================
// Answer Assembler
// ============================================================================

/// 검색된 청크와 질문으로 프롬프트를 만들어 모델에 전달
pub struct AnswerAssembler {
    template: PromptTemplate,
    separator: String,
    model: Arc<dyn LanguageModel>,
}

impl AnswerAssembler {
    pub fn new(
        template: PromptTemplate,
        separator: impl Into<String>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            template,
            separator: separator.into(),
            model,
        }
    }

    /// 프롬프트 조립 (청크는 검색 순서대로 구분자로 연결)
    pub fn build_prompt(&self, question: &str, retrieved: &[String]) -> String {
        let documents = retrieved.join(&self.separator);
        self.template.render(question, &documents)
    }

    /// 모델 답변을 그대로 반환
    pub async fn answer(&self, question: &str, retrieved: &[String]) -> Result<String> {
        let prompt = self.build_prompt(question, retrieved);

        tracing::debug!(
            "Calling {} with {} chunks ({} chars)",
            self.model.name(),
            retrieved.len(),
            prompt.len()
        );

        self.model
            .call(&prompt)
            .await
            .map_err(|e| RagError::ModelCall(format!("{:#}", e)))
    }
}

// ============================================================================
// Tests
// ============================================================================
