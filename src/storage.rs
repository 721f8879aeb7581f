use crate::models::{ProgressSnapshot, ResultSnapshot};
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PROGRESS_KEY: &str = "quiz_progress";
pub const SCORE_KEY: &str = "quiz_score";
pub const RESULT_KEY: &str = "quiz_result";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

/// Whole-value string storage keyed by name. Writes overwrite; there are no partial updates.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<String>, StorageError>>;
    fn set(&self, key: &str, value: String) -> BoxFuture<'static, Result<(), StorageError>>;
    fn remove(&self, key: &str) -> BoxFuture<'static, Result<(), StorageError>>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<String>, StorageError>> {
        let entries = self.entries.clone();
        let key = key.to_string();
        Box::pin(async move { Ok(entries.get(&key).map(|v| v.value().clone())) })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, Result<(), StorageError>> {
        let entries = self.entries.clone();
        let key = key.to_string();
        Box::pin(async move {
            entries.insert(key, value);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, Result<(), StorageError>> {
        let entries = self.entries.clone();
        let key = key.to_string();
        Box::pin(async move {
            entries.remove(&key);
            Ok(())
        })
    }
}

/// One `<key>.json` file per key under `root`. Writes go to a sibling temp file that is renamed over
/// the target, so a reader sees either the old or the new value.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<String>, StorageError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::read_to_string(path?).await {
                Ok(raw) => Ok(Some(raw)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            }
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, Result<(), StorageError>> {
        let path = self.path_for(key);
        let root = self.root.clone();
        Box::pin(async move {
            let path = path?;
            tokio::fs::create_dir_all(&root).await?;
            // whole-file replace: overlapping writers never interleave bytes in the target
            let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
            tokio::fs::write(&tmp, value).await?;
            if let Err(err) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(err.into());
            }
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, Result<(), StorageError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::remove_file(path?).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        })
    }
}

/// A deferred write. Failures are logged and swallowed when the task runs; the caller decides
/// whether to await it or let it run in the background.
#[must_use = "nothing is written until the task is run or spawned"]
pub struct PersistTask {
    key: &'static str,
    write: BoxFuture<'static, Result<(), StorageError>>,
}

impl PersistTask {
    fn new(key: &'static str, write: BoxFuture<'static, Result<(), StorageError>>) -> Self {
        Self { key, write }
    }

    fn failed(key: &'static str, err: StorageError) -> Self {
        Self::new(key, Box::pin(async move { Err(err) }))
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Returns whether the write landed.
    pub async fn run(self) -> bool {
        match self.write.await {
            Ok(()) => {
                debug!(key = self.key, "persisted");
                true
            }
            Err(err) => {
                warn!(key = self.key, "failed to persist: {}", err);
                false
            }
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<bool> {
        tokio::spawn(self.run())
    }
}

impl fmt::Debug for PersistTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistTask").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Snapshot-level persistence for the quiz. Reads never fail: unreadable or corrupt values are
/// logged and treated as absent.
#[derive(Clone)]
pub struct QuizPersistence {
    store: Arc<dyn KeyValueStore>,
}

impl QuizPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    pub async fn load_progress(&self) -> Option<ProgressSnapshot> {
        self.load(PROGRESS_KEY).await
    }

    pub async fn load_result(&self) -> Option<ResultSnapshot> {
        self.load(RESULT_KEY).await
    }

    pub async fn load_score(&self) -> Option<i64> {
        self.load(SCORE_KEY).await
    }

    pub fn save_progress(&self, snapshot: &ProgressSnapshot) -> PersistTask {
        match serde_json::to_string(snapshot) {
            Ok(raw) => PersistTask::new(PROGRESS_KEY, self.store.set(PROGRESS_KEY, raw)),
            Err(err) => PersistTask::failed(PROGRESS_KEY, err.into()),
        }
    }

    /// Writes the bare score and the full result under separate keys; both writes are attempted
    /// even if one fails.
    pub fn save_result(&self, snapshot: &ResultSnapshot) -> PersistTask {
        let raw = match serde_json::to_string(snapshot) {
            Ok(raw) => raw,
            Err(err) => return PersistTask::failed(RESULT_KEY, err.into()),
        };
        let score_write = self.store.set(SCORE_KEY, snapshot.total_score.to_string());
        let result_write = self.store.set(RESULT_KEY, raw);
        PersistTask::new(
            RESULT_KEY,
            Box::pin(async move {
                let (score, result) = futures::join!(score_write, result_write);
                score.and(result)
            }),
        )
    }

    /// Overwrites the progress key with an empty snapshot rather than deleting it.
    pub fn clear_progress(&self) -> PersistTask {
        self.save_progress(&ProgressSnapshot::default())
    }

    async fn load<T: DeserializeOwned>(&self, key: &'static str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, "failed to read saved state: {}", err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, "saved state is corrupt, ignoring it: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, AnswerStore};

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("panama-quiz-{}", uuid::Uuid::new_v4()))
    }

    fn sample_progress() -> ProgressSnapshot {
        ProgressSnapshot {
            index: 2,
            answers: AnswerStore::from_iter([(1, Answer::Text("A".into()))]),
        }
    }

    #[tokio::test]
    async fn memory_progress_roundtrip() {
        let persistence = QuizPersistence::new(Arc::new(MemoryStore::new()));
        assert!(persistence.load_progress().await.is_none());
        assert!(persistence.save_progress(&sample_progress()).run().await);
        assert_eq!(persistence.load_progress().await, Some(sample_progress()));
    }

    #[tokio::test]
    async fn corrupt_progress_reads_as_absent() {
        let store = MemoryStore::new();
        store.set(PROGRESS_KEY, "{not json".into()).await.unwrap();
        let persistence = QuizPersistence::new(Arc::new(store));
        assert!(persistence.load_progress().await.is_none());
    }

    #[tokio::test]
    async fn result_writes_score_and_snapshot() {
        let persistence = QuizPersistence::new(Arc::new(MemoryStore::new()));
        let result = ResultSnapshot {
            total_score: 17,
            answers: sample_progress().answers,
        };
        assert!(persistence.save_result(&result).run().await);
        assert_eq!(persistence.load_score().await, Some(17));
        assert_eq!(persistence.load_result().await, Some(result));
    }

    #[tokio::test]
    async fn clear_overwrites_instead_of_deleting() {
        let store = MemoryStore::new();
        let persistence = QuizPersistence::new(Arc::new(store.clone()));
        assert!(persistence.save_progress(&sample_progress()).run().await);
        assert!(persistence.clear_progress().run().await);
        let raw = store.get(PROGRESS_KEY).await.unwrap();
        assert_eq!(raw.as_deref(), Some(r#"{"index":0,"answers":{}}"#));
    }

    #[tokio::test]
    async fn file_store_roundtrip_and_missing_keys() {
        let dir = scratch_dir();
        let store = FileStore::new(&dir);
        assert_eq!(store.get("users").await.unwrap(), None);
        store.set("users", "[]".into()).await.unwrap();
        assert_eq!(store.get("users").await.unwrap().as_deref(), Some("[]"));
        assert!(dir.join("users.json").exists());
        store.remove("users").await.unwrap();
        store.remove("users").await.unwrap();
        assert_eq!(store.get("users").await.unwrap(), None);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let store = FileStore::new(scratch_dir());
        assert!(matches!(
            store.get("../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn overlapping_file_writes_leave_one_whole_snapshot() {
        let dir = scratch_dir();
        let persistence = QuizPersistence::new(Arc::new(FileStore::new(&dir)));
        let snapshots: Vec<ProgressSnapshot> = (0..6)
            .map(|i| ProgressSnapshot {
                index: i,
                answers: (1..=(i as u32 + 1) * 20)
                    .map(|id| (id, Answer::Text("x".repeat(id as usize))))
                    .collect(),
            })
            .collect();

        for _ in 0..20 {
            let handles: Vec<_> = snapshots
                .iter()
                .map(|s| persistence.save_progress(s).spawn())
                .collect();
            for handle in handles {
                assert!(handle.await.unwrap());
            }
            let loaded = persistence.load_progress().await.expect("progress readable");
            assert!(snapshots.contains(&loaded));
        }

        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn dropped_task_writes_nothing() {
        let store = MemoryStore::new();
        let persistence = QuizPersistence::new(Arc::new(store.clone()));
        drop(persistence.save_progress(&sample_progress()));
        assert_eq!(store.get(PROGRESS_KEY).await.unwrap(), None);

        let removal = store.remove(PROGRESS_KEY);
        store.set(PROGRESS_KEY, "{}".into()).await.unwrap();
        drop(removal);
        assert_eq!(store.get(PROGRESS_KEY).await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn failed_write_is_swallowed() {
        let dir = scratch_dir();
        std::fs::write(&dir, "a file where the directory should be").unwrap();
        let persistence = QuizPersistence::new(Arc::new(FileStore::new(&dir)));
        assert!(!persistence.save_progress(&sample_progress()).run().await);
        assert!(persistence.load_progress().await.is_none());
        let _ = std::fs::remove_file(dir);
    }
}
