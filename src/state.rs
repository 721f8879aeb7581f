use crate::accounts::{AccountStore, UserRecord};
use crate::catalog::Catalog;
use crate::controller::QuizController;
use crate::storage::{KeyValueStore, QuizPersistence};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub quiz: Arc<Mutex<QuizController>>,
    pub persistence: QuizPersistence,
    pub accounts: AccountStore,
    /// Session id → signed-in user. Sessions do not survive a restart.
    pub sessions: Arc<DashMap<String, UserRecord>>,
}

impl AppState {
    /// Resumes saved quiz progress from `store` if there is any.
    pub async fn new(catalog: Arc<Catalog>, store: Arc<dyn KeyValueStore>) -> Self {
        let persistence = QuizPersistence::new(store.clone());
        let quiz = QuizController::resume(catalog.clone(), persistence.clone()).await;
        Self {
            catalog,
            quiz: Arc::new(Mutex::new(quiz)),
            persistence,
            accounts: AccountStore::new(store),
            sessions: Arc::new(DashMap::new()),
        }
    }
}
