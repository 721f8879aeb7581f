use crate::catalog::Catalog;
use crate::models::AnswerStore;
use serde::Serialize;

pub const NOT_PROVIDED: &str = "Not provided";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileRow {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub rows: Vec<ProfileRow>,
    pub quiz_completed: bool,
    pub has_answers: bool,
}

impl ProfileSummary {
    /// One row per labelled question, in catalog order.
    pub fn build(catalog: &Catalog, answers: &AnswerStore) -> Self {
        let rows = catalog
            .questions()
            .iter()
            .filter_map(|q| {
                let label = q.profile_label.clone()?;
                let value = answers
                    .get(q.id)
                    .map(|a| a.display())
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| NOT_PROVIDED.to_string());
                Some(ProfileRow { label, value })
            })
            .collect();
        Self {
            rows,
            quiz_completed: catalog.questions().iter().all(|q| answers.contains(q.id)),
            has_answers: !answers.is_empty(),
        }
    }
}
