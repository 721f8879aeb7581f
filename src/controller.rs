use crate::catalog::Catalog;
use crate::models::{
    Answer, AnswerStore, ProgressSnapshot, Question, QuestionType, ResultSnapshot, ScoringRule,
};
use crate::scoring::{parse_int, score_all};
use crate::storage::{PersistTask, QuizPersistence};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MIN_AGE: i64 = 18;
pub const MAX_AGE: i64 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum QuizState {
    InProgress {
        index: usize,
    },
    Completed {
        #[serde(rename = "totalScore")]
        total_score: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("{0}")]
    Validation(String),
    #[error("question {0} has not been answered")]
    Unanswered(u32),
    #[error("question {0} is not part of the quiz")]
    UnknownQuestion(u32),
    #[error("question {0} has no input and cannot be answered")]
    NoInput(u32),
    #[error("question #{0} cannot be opened yet")]
    Inaccessible(usize),
    #[error("the quiz can only be finished from the last question")]
    NotAtLastQuestion,
    #[error("the quiz is already completed")]
    AlreadyCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutcome {
    pub total_score: i64,
    pub max_score: i64,
    pub eligible: bool,
}

impl QuizOutcome {
    pub fn verdict(&self) -> &'static str {
        if self.eligible {
            "Eligible"
        } else {
            "Not Eligible"
        }
    }
}

impl fmt::Display for QuizOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Your score: {} / {}", self.total_score, self.max_score)
    }
}

/// One dot of the progress rail under the question.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RailMarker {
    pub index: usize,
    pub question_id: u32,
    pub answered: bool,
    pub current: bool,
    pub accessible: bool,
}

/// Owns the answer store and the current position. Transitions are synchronous; each one that
/// changes persisted state hands back a [`PersistTask`] the caller may await or spawn.
pub struct QuizController {
    catalog: Arc<Catalog>,
    persistence: QuizPersistence,
    answers: AnswerStore,
    state: QuizState,
}

impl QuizController {
    pub fn new(catalog: Arc<Catalog>, persistence: QuizPersistence) -> Self {
        Self {
            catalog,
            persistence,
            answers: AnswerStore::new(),
            state: QuizState::InProgress { index: 0 },
        }
    }

    /// Starts from the saved progress snapshot when there is a readable one.
    pub async fn resume(catalog: Arc<Catalog>, persistence: QuizPersistence) -> Self {
        let mut controller = Self::new(catalog, persistence);
        if let Some(snapshot) = controller.persistence.load_progress().await {
            controller.hydrate(snapshot);
        }
        controller
    }

    fn hydrate(&mut self, snapshot: ProgressSnapshot) {
        let last = self.catalog.len().saturating_sub(1);
        if snapshot.index > last {
            warn!(saved = snapshot.index, last, "saved question index is past the catalog end");
        }
        self.state = QuizState::InProgress {
            index: snapshot.index.min(last),
        };
        self.answers = snapshot.answers;
        debug!(index = snapshot.index.min(last), answers = self.answers.len(), "quiz resumed");
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            QuizState::InProgress { index } => Some(index),
            QuizState::Completed { .. } => None,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_index().and_then(|i| self.catalog.question(i))
    }

    pub fn is_last(&self) -> bool {
        self.current_index()
            .is_some_and(|i| i + 1 == self.catalog.len())
    }

    /// The current question holds an answer that unlocks Next / Finish.
    pub fn can_advance(&self) -> bool {
        self.current_question()
            .is_some_and(|q| q.is_answered(self.answers.get(q.id)))
    }

    pub fn outcome(&self) -> Option<QuizOutcome> {
        match self.state {
            QuizState::Completed { total_score } => Some(self.outcome_for(total_score)),
            QuizState::InProgress { .. } => None,
        }
    }

    pub fn rail(&self) -> Vec<RailMarker> {
        let current = self.current_index();
        self.catalog
            .questions()
            .iter()
            .enumerate()
            .map(|(index, q)| {
                let answered = self.answers.contains(q.id);
                RailMarker {
                    index,
                    question_id: q.id,
                    answered,
                    current: current == Some(index),
                    accessible: current.is_some_and(|c| index <= c) || answered,
                }
            })
            .collect()
    }

    pub fn answer(&mut self, question_id: u32, value: Answer) -> Result<PersistTask, QuizError> {
        self.in_progress_index()?;
        let Some(question) = self.catalog.by_id(question_id) else {
            return Err(QuizError::UnknownQuestion(question_id));
        };
        if matches!(question.kind, QuestionType::Unsupported(_)) {
            return Err(QuizError::NoInput(question_id));
        }
        self.answers.merge(question_id, value);
        debug!(question_id, "answer stored");
        Ok(self.save_progress())
    }

    pub fn next(&mut self) -> Result<Option<PersistTask>, QuizError> {
        let index = self.in_progress_index()?;
        self.check_age(index)?;
        if index + 1 >= self.catalog.len() {
            return Ok(None);
        }
        if !self.can_advance() {
            return Err(QuizError::Unanswered(self.question_id_at(index)));
        }
        Ok(Some(self.move_to(index + 1)))
    }

    pub fn previous(&mut self) -> Result<Option<PersistTask>, QuizError> {
        let index = self.in_progress_index()?;
        self.check_age(index)?;
        if index == 0 {
            return Ok(None);
        }
        Ok(Some(self.move_to(index - 1)))
    }

    /// Jump via the progress rail: only to questions at or before the current one, or already
    /// answered ones.
    pub fn go_to(&mut self, target: usize) -> Result<Option<PersistTask>, QuizError> {
        let index = self.in_progress_index()?;
        if target == index {
            return Ok(None);
        }
        let accessible = self
            .catalog
            .question(target)
            .is_some_and(|q| target <= index || self.answers.contains(q.id));
        if !accessible {
            return Err(QuizError::Inaccessible(target));
        }
        self.check_age(index)?;
        Ok(Some(self.move_to(target)))
    }

    pub fn finish(&mut self) -> Result<(QuizOutcome, PersistTask), QuizError> {
        let index = self.in_progress_index()?;
        if index + 1 != self.catalog.len() {
            return Err(QuizError::NotAtLastQuestion);
        }
        if !self.can_advance() {
            return Err(QuizError::Unanswered(self.question_id_at(index)));
        }
        let total_score = score_all(&self.catalog, &self.answers);
        self.state = QuizState::Completed { total_score };
        let outcome = self.outcome_for(total_score);
        info!(total_score, eligible = outcome.eligible, "quiz completed");
        let task = self.persistence.save_result(&ResultSnapshot {
            total_score,
            answers: self.answers.clone(),
        });
        Ok((outcome, task))
    }

    /// Empties the answers and returns to the first question from any state.
    pub fn restart(&mut self) -> PersistTask {
        self.answers = AnswerStore::new();
        self.state = QuizState::InProgress { index: 0 };
        debug!("quiz restarted");
        self.persistence.clear_progress()
    }

    fn in_progress_index(&self) -> Result<usize, QuizError> {
        self.current_index().ok_or(QuizError::AlreadyCompleted)
    }

    fn question_id_at(&self, index: usize) -> u32 {
        self.catalog.question(index).map_or(0, |q| q.id)
    }

    fn move_to(&mut self, index: usize) -> PersistTask {
        self.state = QuizState::InProgress { index };
        debug!(index, "moved to question");
        self.save_progress()
    }

    fn save_progress(&self) -> PersistTask {
        let snapshot = ProgressSnapshot {
            index: self.current_index().unwrap_or_default(),
            answers: self.answers.clone(),
        };
        self.persistence.save_progress(&snapshot)
    }

    /// Leaving the age question in either direction requires a whole number in [18, 99].
    fn check_age(&self, index: usize) -> Result<(), QuizError> {
        let Some(question) = self.catalog.question(index) else {
            return Ok(());
        };
        if question.rule != ScoringRule::Age {
            return Ok(());
        }
        let age = self
            .answers
            .get(question.id)
            .and_then(Answer::as_scalar)
            .and_then(|v| parse_int(&v));
        match age {
            Some(age) if (MIN_AGE..=MAX_AGE).contains(&age) => Ok(()),
            _ => Err(QuizError::Validation(format!(
                "Please enter a valid age between {MIN_AGE} and {MAX_AGE}."
            ))),
        }
    }

    fn outcome_for(&self, total_score: i64) -> QuizOutcome {
        QuizOutcome {
            total_score,
            max_score: self.catalog.max_score(),
            eligible: self.catalog.is_eligible(total_score),
        }
    }
}
