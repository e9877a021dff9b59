use crate::models::Attempt;
use crate::store::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

/// Append-only attempt history per subject (usually a username).
#[async_trait]
pub trait AttemptHistory: Send + Sync {
    async fn append(&self, subject: &str, attempt: Attempt) -> Result<(), StoreError>;
    async fn list(&self, subject: &str) -> Result<Vec<Attempt>, StoreError>;
}

pub struct MemoryAttemptHistory {
    attempts: DashMap<String, Vec<Attempt>>,
    snapshot_path: Option<PathBuf>,
    /// Held while a snapshot is taken and written so the newest state lands last.
    persist_lock: Mutex<()>,
}

impl MemoryAttemptHistory {
    /// Loads a previous snapshot when one is readable; a missing or unreadable
    /// snapshot starts an empty history.
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        let attempts = DashMap::new();
        if let Some(loaded) = snapshot_path.as_deref().and_then(read_snapshot) {
            for (subject, list) in loaded {
                attempts.insert(subject, list);
            }
        }
        Self {
            attempts,
            snapshot_path,
            persist_lock: Mutex::new(()),
        }
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;
        let snapshot: HashMap<String, Vec<Attempt>> = self
            .attempts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let serialized = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut staging = path.as_os_str().to_owned();
        staging.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, serialized).await?;
        if let Err(err) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Option<HashMap<String, Vec<Attempt>>> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!("failed to read attempt history {}: {}", path.display(), err);
            None
        }
    }
}

#[async_trait]
impl AttemptHistory for MemoryAttemptHistory {
    /// The attempt is recorded once it is in memory. A failed snapshot write is
    /// logged and picked up by the next successful one.
    async fn append(&self, subject: &str, attempt: Attempt) -> Result<(), StoreError> {
        self.attempts
            .entry(subject.to_string())
            .or_default()
            .push(attempt);
        if let Err(err) = self.persist().await {
            warn!("failed to persist attempt history after append for {}: {}", subject, err);
        }
        Ok(())
    }

    async fn list(&self, subject: &str) -> Result<Vec<Attempt>, StoreError> {
        Ok(self
            .attempts
            .get(subject)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn snapshot_dir() -> PathBuf {
        std::env::temp_dir().join(format!("quizline-history-{}", uuid::Uuid::new_v4()))
    }

    fn attempt(quiz_id: u32, score: u32) -> Attempt {
        Attempt {
            quiz_id,
            title: "T".into(),
            completed_at: Utc::now(),
            questions: vec![],
            score,
            total_questions: 2,
            percentage: score * 50,
            grade: "F".into(),
            duration: 10,
        }
    }

    #[tokio::test]
    async fn appends_are_kept_in_order_per_subject() {
        let history = MemoryAttemptHistory::new(None);
        history.append("ana", attempt(0, 1)).await.unwrap();
        history.append("ana", attempt(1, 2)).await.unwrap();
        history.append("bo", attempt(0, 0)).await.unwrap();

        let ana = history.list("ana").await.unwrap();
        assert_eq!(ana.iter().map(|a| a.quiz_id).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(history.list("bo").await.unwrap().len(), 1);
        assert!(history.list("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let path = snapshot_dir().join("history.json");
        let history = MemoryAttemptHistory::new(Some(path.clone()));
        history.append("ana", attempt(3, 2)).await.unwrap();

        let reloaded = MemoryAttemptHistory::new(Some(path.clone()));
        let attempts = reloaded.list("ana").await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].quiz_id, 3);
        if let Some(parent) = path.parent() {
            tokio::fs::remove_dir_all(parent).await.unwrap();
        }
    }

    #[tokio::test]
    async fn failed_snapshot_write_still_records_once() {
        let dir = snapshot_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let blocker = dir.join("not-a-dir");
        tokio::fs::write(&blocker, b"file").await.unwrap();

        let history = MemoryAttemptHistory::new(Some(blocker.join("history.json")));
        assert!(history.append("ana", attempt(0, 2)).await.is_ok());
        assert_eq!(history.list("ana").await.unwrap().len(), 1);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_appends_all_reach_the_snapshot() {
        let dir = snapshot_dir();
        let path = dir.join("history.json");
        let history = Arc::new(MemoryAttemptHistory::new(Some(path.clone())));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let history = Arc::clone(&history);
                tokio::spawn(async move { history.append("ana", attempt(i, 1)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reloaded = MemoryAttemptHistory::new(Some(path));
        assert_eq!(reloaded.list("ana").await.unwrap().len(), 16);
        let mut leftovers = tokio::fs::read_dir(&dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = leftovers.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert_eq!(names, vec![std::ffi::OsString::from("history.json")]);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
