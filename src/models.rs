use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

/// Input widget a question is rendered with.
///
/// Unknown type strings are kept as [`QuestionType::Unsupported`] instead of failing the load:
/// such a question renders no input and can never be answered from the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    Text,
    Number,
    Dropdown,
    YesNo,
    Date,
    Compound,
    Unsupported(String),
}

impl From<String> for QuestionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "text" => QuestionType::Text,
            "number" => QuestionType::Number,
            "dropdown" => QuestionType::Dropdown,
            "yesno" => QuestionType::YesNo,
            "date" => QuestionType::Date,
            "compound" => QuestionType::Compound,
            _ => QuestionType::Unsupported(raw),
        }
    }
}

impl From<QuestionType> for String {
    fn from(kind: QuestionType) -> Self {
        match kind {
            QuestionType::Text => "text".into(),
            QuestionType::Number => "number".into(),
            QuestionType::Dropdown => "dropdown".into(),
            QuestionType::YesNo => "yesno".into(),
            QuestionType::Date => "date".into(),
            QuestionType::Compound => "compound".into(),
            QuestionType::Unsupported(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialRule {
    Age,
    Language,
    Country,
}

/// One entry of the catalog document as it is stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: u32,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_mapping: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<SpecialRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_label: Option<String>,
    #[serde(default)]
    pub require_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    pub eligibility_threshold: i64,
    pub max_score: i64,
    pub questions: Vec<QuestionRecord>,
}

/// How a question turns an answer into points. Exactly one rule applies per question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoringRule {
    FlatPoints(i64),
    Mapping(BTreeMap<String, i64>),
    Age,
    Language,
    Country,
    None,
}

impl ScoringRule {
    /// Precedence: fixed points, then a value mapping (yes/no and dropdown only), then the
    /// declared special rule.
    pub fn resolve(record: &QuestionRecord) -> Self {
        if let Some(points) = record.points {
            return ScoringRule::FlatPoints(points);
        }
        if let Some(table) = &record.points_mapping {
            if matches!(record.kind, QuestionType::YesNo | QuestionType::Dropdown) {
                return ScoringRule::Mapping(table.clone());
            }
        }
        match record.rule {
            Some(SpecialRule::Age) => ScoringRule::Age,
            Some(SpecialRule::Language) => ScoringRule::Language,
            Some(SpecialRule::Country) => ScoringRule::Country,
            None => ScoringRule::None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    #[serde(rename = "question")]
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip)]
    pub rule: ScoringRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_label: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub require_complete: bool,
}

impl Question {
    pub fn from_record(record: QuestionRecord) -> Self {
        let rule = ScoringRule::resolve(&record);
        Self {
            id: record.id,
            prompt: record.question,
            kind: record.kind,
            options: record.options.unwrap_or_default(),
            rule,
            profile_label: record.profile_label,
            require_complete: record.require_complete,
        }
    }

    /// Whether `answer` unlocks navigation past this question.
    ///
    /// A compound answer counts once the object exists, even with sub-fields missing, unless the
    /// question opts into `requireComplete`.
    pub fn is_answered(&self, answer: Option<&Answer>) -> bool {
        match answer {
            None => false,
            Some(Answer::Compound(name)) => !self.require_complete || name.is_complete(),
            Some(value) => !value.is_empty(),
        }
    }
}

/// `{prefix, firstName, surname}`; each part is set independently as the user types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
}

impl CompoundName {
    pub fn merge(&mut self, partial: CompoundName) {
        if partial.prefix.is_some() {
            self.prefix = partial.prefix;
        }
        if partial.first_name.is_some() {
            self.first_name = partial.first_name;
        }
        if partial.surname.is_some() {
            self.surname = partial.surname;
        }
    }

    pub fn is_complete(&self) -> bool {
        [&self.prefix, &self.first_name, &self.surname]
            .iter()
            .all(|part| part.as_deref().is_some_and(|p| !p.trim().is_empty()))
    }

    pub fn display(&self) -> String {
        [&self.prefix, &self.first_name, &self.surname]
            .iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Number(f64),
    Compound(CompoundName),
}

impl Answer {
    /// Empty strings and zero count as "no answer"; a compound object never does.
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Text(text) => text.is_empty(),
            Answer::Number(n) => *n == 0.0 || n.is_nan(),
            Answer::Compound(_) => false,
        }
    }

    /// Text form of a scalar answer; `None` for compound answers.
    pub fn as_scalar(&self) -> Option<Cow<'_, str>> {
        match self {
            Answer::Text(text) => Some(Cow::Borrowed(text)),
            Answer::Number(n) => Some(Cow::Owned(n.to_string())),
            Answer::Compound(_) => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Answer::Compound(name) => name.display(),
            other => other.as_scalar().map(Cow::into_owned).unwrap_or_default(),
        }
    }

    /// Scalars replace the stored value; compound parts are shallow-merged into an existing
    /// compound answer.
    pub fn merge(&mut self, incoming: Answer) {
        match (self, incoming) {
            (Answer::Compound(existing), Answer::Compound(partial)) => existing.merge(partial),
            (slot, value) => *slot = value,
        }
    }
}

/// Question id → answer. Serialized as a JSON object keyed by the id's decimal string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerStore(BTreeMap<u32, Answer>);

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: u32) -> Option<&Answer> {
        self.0.get(&question_id)
    }

    pub fn contains(&self, question_id: u32) -> bool {
        self.0.contains_key(&question_id)
    }

    pub fn merge(&mut self, question_id: u32, value: Answer) {
        match self.0.get_mut(&question_id) {
            Some(existing) => existing.merge(value),
            None => {
                self.0.insert(question_id, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Answer)> {
        self.0.iter().map(|(id, answer)| (*id, answer))
    }
}

impl FromIterator<(u32, Answer)> for AnswerStore {
    fn from_iter<T: IntoIterator<Item = (u32, Answer)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(alias = "currentIndex")]
    pub index: usize,
    #[serde(default)]
    pub answers: AnswerStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub total_score: i64,
    pub answers: AnswerStore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

pub fn validate_catalog(doc: &CatalogDocument) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    if doc.max_score <= 0 {
        issues.push(ValidationIssue {
            field: "maxScore".into(),
            issue: "must be positive".into(),
        });
    }
    if doc.eligibility_threshold >= doc.max_score {
        issues.push(ValidationIssue {
            field: "eligibilityThreshold".into(),
            issue: "must be below maxScore".into(),
        });
    }
    if doc.questions.is_empty() {
        issues.push(ValidationIssue {
            field: "questions".into(),
            issue: "must contain at least one question".into(),
        });
    }

    let mut ids = HashSet::new();
    for (i, q) in doc.questions.iter().enumerate() {
        if q.id == 0 {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].id"),
                issue: "must be positive".into(),
            });
        }
        if !ids.insert(q.id) {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].id"),
                issue: "must be unique".into(),
            });
        }
        if q.question.trim().is_empty() {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].question"),
                issue: "must not be empty".into(),
            });
        }

        match &q.kind {
            QuestionType::Dropdown => {
                if q.options.as_ref().map_or(true, Vec::is_empty) {
                    issues.push(ValidationIssue {
                        field: format!("questions[{i}].options"),
                        issue: "is required for dropdown".into(),
                    });
                }
            }
            QuestionType::Unsupported(_) => {}
            _ => {
                if q.options.is_some() {
                    issues.push(ValidationIssue {
                        field: format!("questions[{i}].options"),
                        issue: "must be absent unless the question is a dropdown".into(),
                    });
                }
            }
        }

        if q.require_complete && q.kind != QuestionType::Compound {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].requireComplete"),
                issue: "only applies to compound questions".into(),
            });
        }
        if q.rule == Some(SpecialRule::Country) && q.options.is_none() {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].options"),
                issue: "is required by the country rule".into(),
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, kind: &str) -> QuestionRecord {
        QuestionRecord {
            id,
            question: format!("Question {id}"),
            kind: QuestionType::from(kind.to_string()),
            options: None,
            points: None,
            points_mapping: None,
            rule: None,
            profile_label: None,
            require_complete: false,
        }
    }

    fn document(questions: Vec<QuestionRecord>) -> CatalogDocument {
        CatalogDocument {
            eligibility_threshold: 10,
            max_score: 35,
            questions,
        }
    }

    #[test]
    fn validate_catalog_ok() {
        let mut dropdown = record(2, "dropdown");
        dropdown.options = Some(vec!["A".into(), "B".into()]);
        let doc = document(vec![record(1, "text"), dropdown, record(3, "telepathy")]);
        assert!(validate_catalog(&doc).is_ok());
    }

    #[test]
    fn validate_catalog_negative() {
        let mut doc = document(vec![record(1, "text"), record(1, "dropdown"), record(0, "date")]);
        doc.questions[0].question = "  ".into();
        let issues = validate_catalog(&doc).err().unwrap();
        assert!(issues.iter().any(|i| i.issue.contains("unique")));
        assert!(issues.iter().any(|i| i.field == "questions[1].options"));
        assert!(issues.iter().any(|i| i.field == "questions[2].id"));
        assert!(issues.iter().any(|i| i.field == "questions[0].question"));
    }

    #[test]
    fn rule_resolution_precedence() {
        let mut flat = record(1, "yesno");
        flat.points = Some(2);
        flat.points_mapping = Some(BTreeMap::from([("yes".to_string(), 5)]));
        assert_eq!(ScoringRule::resolve(&flat), ScoringRule::FlatPoints(2));

        let mut mapped = record(2, "yesno");
        mapped.points_mapping = Some(BTreeMap::from([("yes".to_string(), 5)]));
        mapped.rule = Some(SpecialRule::Age);
        assert!(matches!(ScoringRule::resolve(&mapped), ScoringRule::Mapping(_)));

        // a mapping on a free-text question is ignored and the special rule applies
        let mut text = record(3, "number");
        text.points_mapping = Some(BTreeMap::from([("25".to_string(), 5)]));
        text.rule = Some(SpecialRule::Age);
        assert_eq!(ScoringRule::resolve(&text), ScoringRule::Age);

        assert_eq!(ScoringRule::resolve(&record(4, "text")), ScoringRule::None);
    }

    #[test]
    fn compound_answers_merge_per_field() {
        let mut store = AnswerStore::new();
        store.merge(
            1,
            Answer::Compound(CompoundName {
                first_name: Some("John".into()),
                ..Default::default()
            }),
        );
        store.merge(
            1,
            Answer::Compound(CompoundName {
                surname: Some("Doe".into()),
                ..Default::default()
            }),
        );
        let Some(Answer::Compound(name)) = store.get(1) else {
            panic!("expected compound answer");
        };
        assert_eq!(name.first_name.as_deref(), Some("John"));
        assert_eq!(name.surname.as_deref(), Some("Doe"));
        assert!(!name.is_complete());
        assert_eq!(name.display(), "John Doe");
    }

    #[test]
    fn scalar_answers_replace() {
        let mut store = AnswerStore::new();
        store.merge(3, Answer::Text("Canada".into()));
        store.merge(3, Answer::Text("Chile".into()));
        assert_eq!(store.get(3), Some(&Answer::Text("Chile".into())));
    }

    #[test]
    fn answered_predicate_is_lenient_for_compound() {
        let mut question = Question::from_record(record(1, "compound"));
        let partial = Answer::Compound(CompoundName {
            prefix: Some("Ms".into()),
            ..Default::default()
        });
        assert!(question.is_answered(Some(&partial)));
        question.require_complete = true;
        assert!(!question.is_answered(Some(&partial)));

        let text = Question::from_record(record(2, "text"));
        assert!(!text.is_answered(Some(&Answer::Text(String::new()))));
        assert!(!text.is_answered(None));
        assert!(text.is_answered(Some(&Answer::Text("x".into()))));
    }

    #[test]
    fn snapshots_use_string_keys_on_disk() {
        let snapshot = ProgressSnapshot {
            index: 2,
            answers: AnswerStore::from_iter([(1, Answer::Text("A".into()))]),
        };
        let raw = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(raw, r#"{"index":2,"answers":{"1":"A"}}"#);

        let legacy: ProgressSnapshot =
            serde_json::from_str(r#"{"currentIndex":1,"answers":{"4":25,"1":{"firstName":"Ana"}}}"#)
                .unwrap();
        assert_eq!(legacy.index, 1);
        assert_eq!(legacy.answers.get(4), Some(&Answer::Number(25.0)));
        assert!(matches!(legacy.answers.get(1), Some(Answer::Compound(_))));
    }

    #[test]
    fn unknown_type_is_preserved() {
        let parsed: QuestionRecord =
            serde_json::from_str(r#"{"id":9,"question":"Upload","type":"photo"}"#).unwrap();
        assert_eq!(parsed.kind, QuestionType::Unsupported("photo".into()));
        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["type"], "photo");
    }
}
