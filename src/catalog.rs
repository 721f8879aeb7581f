use crate::models::{validate_catalog, CatalogDocument, Question, QuestionType, ValidationIssue};
use crate::scoring::max_points;
use std::path::{Path, PathBuf};
use tracing::warn;

const EMBEDDED_CATALOG: &str = include_str!("../data/quiz_questions.json");
const CATALOG_SCHEMA: &str = include_str!("../contracts/catalog.schema.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog schema cannot be compiled: {0}")]
    Schema(String),
    #[error("catalog failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<ValidationIssue>),
}

/// Immutable, ordered list of questions plus the constants the result screen needs.
#[derive(Debug, Clone)]
pub struct Catalog {
    questions: Vec<Question>,
    eligibility_threshold: i64,
    max_score: i64,
}

impl Catalog {
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json_str(EMBEDDED_CATALOG)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let schema: serde_json::Value = serde_json::from_str(CATALOG_SCHEMA)?;
        let compiled = jsonschema::draft202012::new(&schema)
            .map_err(|e| CatalogError::Schema(e.to_string()))?;
        if compiled.validate(&value).is_err() {
            let issues = compiled
                .iter_errors(&value)
                .map(|e| ValidationIssue {
                    field: e.instance_path.to_string(),
                    issue: e.to_string(),
                })
                .collect();
            return Err(CatalogError::Invalid(issues));
        }
        let doc: CatalogDocument = serde_json::from_value(value)?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: CatalogDocument) -> Result<Self, CatalogError> {
        validate_catalog(&doc).map_err(CatalogError::Invalid)?;

        let questions: Vec<Question> = doc.questions.into_iter().map(Question::from_record).collect();
        for q in &questions {
            if let QuestionType::Unsupported(kind) = &q.kind {
                warn!(
                    question_id = q.id,
                    kind = %kind,
                    "question has no input handler and cannot be answered"
                );
            }
        }

        let catalog = Self {
            questions,
            eligibility_threshold: doc.eligibility_threshold,
            max_score: doc.max_score,
        };
        let attainable = catalog.attainable_score();
        if attainable != catalog.max_score {
            warn!(
                declared = catalog.max_score,
                attainable, "catalog maxScore does not match the best attainable score"
            );
        }
        Ok(catalog)
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn by_id(&self, id: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn position_of(&self, id: u32) -> Option<usize> {
        self.questions.iter().position(|q| q.id == id)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn eligibility_threshold(&self) -> i64 {
        self.eligibility_threshold
    }

    pub fn max_score(&self) -> i64 {
        self.max_score
    }

    /// Strictly above the threshold.
    pub fn is_eligible(&self, total_score: i64) -> bool {
        total_score > self.eligibility_threshold
    }

    pub fn attainable_score(&self) -> i64 {
        self.questions.iter().map(max_points).sum()
    }
}
