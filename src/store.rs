use crate::models::QuizDefinition;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no quiz with id {0}")]
    NotFound(u32),
    /// The slot was taken between allocation and write.
    #[error("quiz id {0} is already taken")]
    Conflict(u32),
    #[error("stored record {location} is not valid: {source}")]
    Corrupt {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Quiz definitions keyed by id.
///
/// `put` must only succeed when nothing occupies `id`; callers rely on that as
/// the commit point of an allocation.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn list(&self) -> Result<Vec<u32>, StoreError>;
    async fn get(&self, id: u32) -> Result<QuizDefinition, StoreError>;
    async fn put(&self, id: u32, quiz: &QuizDefinition) -> Result<(), StoreError>;
    async fn delete(&self, id: u32) -> Result<(), StoreError>;
}

/// One pretty-printed `quiz_<id>.json` file per definition.
pub struct FileQuizStore {
    dir: PathBuf,
}

impl FileQuizStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: u32) -> PathBuf {
        self.dir.join(format!("quiz_{id}.json"))
    }
}

fn id_from_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("quiz_")?.strip_suffix(".json")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // `quiz_007.json` is not where id 7 lives.
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

#[async_trait]
impl QuizStore for FileQuizStore {
    async fn list(&self) -> Result<Vec<u32>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(id_from_file_name) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn get(&self, id: u32) -> Result<QuizDefinition, StoreError> {
        let path = self.path_for(id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id)),
            Err(err) => return Err(err.into()),
        };
        let mut quiz: QuizDefinition =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                location: path.display().to_string(),
                source,
            })?;
        // The file name is authoritative for the id.
        quiz.id = id;
        Ok(quiz)
    }

    async fn put(&self, id: u32, quiz: &QuizDefinition) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(quiz)?;
        let target = self.path_for(id);
        let staging = self
            .dir
            .join(format!(".quiz_{id}.{}.tmp", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&staging, body).await?;
        // Linking fails when the target exists. Readers never see a partial file.
        let linked = tokio::fs::hard_link(&staging, &target).await;
        if let Err(err) = tokio::fs::remove_file(&staging).await {
            debug!("failed to remove staging file {}: {}", staging.display(), err);
        }
        match linked {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(StoreError::Conflict(id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, id: u32) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryQuizStore {
    quizzes: RwLock<BTreeMap<u32, QuizDefinition>>,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn list(&self) -> Result<Vec<u32>, StoreError> {
        Ok(self.quizzes.read().await.keys().copied().collect())
    }

    async fn get(&self, id: u32) -> Result<QuizDefinition, StoreError> {
        self.quizzes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn put(&self, id: u32, quiz: &QuizDefinition) -> Result<(), StoreError> {
        let mut quizzes = self.quizzes.write().await;
        if quizzes.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        quizzes.insert(id, quiz.clone());
        Ok(())
    }

    async fn delete(&self, id: u32) -> Result<(), StoreError> {
        self.quizzes
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionDefinition;

    fn quiz(id: u32, title: &str) -> QuizDefinition {
        QuizDefinition {
            id,
            title: title.into(),
            questions: vec![QuestionDefinition {
                question_num: 1,
                question_type: None,
                question: "Q".into(),
                instructions: "I".into(),
                answers: vec!["a".into(), "b".into()],
                correct: vec![1],
                selection: vec![],
                is_correct: None,
            }],
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("quizline-store-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn only_quiz_files_carry_ids() {
        assert_eq!(id_from_file_name("quiz_12.json"), Some(12));
        assert_eq!(id_from_file_name("quiz_.json"), None);
        assert_eq!(id_from_file_name("quiz_1a.json"), None);
        assert_eq!(id_from_file_name(".quiz_3.abc.tmp"), None);
        assert_eq!(id_from_file_name("notes.json"), None);
    }

    #[tokio::test]
    async fn zero_padded_names_are_not_listed() {
        assert_eq!(id_from_file_name("quiz_0.json"), Some(0));
        assert_eq!(id_from_file_name("quiz_007.json"), None);
        assert_eq!(id_from_file_name("quiz_00.json"), None);

        let dir = scratch_dir();
        let store = FileQuizStore::open(&dir).await.unwrap();
        tokio::fs::write(dir.join("quiz_007.json"), "{}").await.unwrap();
        store.put(0, &quiz(0, "Zero")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![0]);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_put_is_conditional() {
        let dir = scratch_dir();
        let store = FileQuizStore::open(&dir).await.unwrap();
        store.put(0, &quiz(0, "First")).await.unwrap();
        let err = store.put(0, &quiz(0, "Second")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(0)));
        assert_eq!(store.get(0).await.unwrap().title, "First");
        assert_eq!(store.list().await.unwrap(), vec![0]);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_round_trip_and_delete() {
        let dir = scratch_dir();
        let store = FileQuizStore::open(&dir).await.unwrap();
        store.put(2, &quiz(99, "Two")).await.unwrap();
        tokio::fs::write(dir.join("readme.txt"), "ignored").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![2]);
        assert_eq!(store.get(2).await.unwrap().id, 2);
        assert!(matches!(store.get(5).await, Err(StoreError::NotFound(5))));
        store.delete(2).await.unwrap();
        assert!(matches!(store.delete(2).await, Err(StoreError::NotFound(2))));
        assert!(store.list().await.unwrap().is_empty());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_records() {
        let dir = scratch_dir();
        let store = FileQuizStore::open(&dir).await.unwrap();
        tokio::fs::write(dir.join("quiz_1.json"), "{ not json").await.unwrap();
        assert!(matches!(store.get(1).await, Err(StoreError::Corrupt { .. })));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_mirrors_file_semantics() {
        let store = MemoryQuizStore::new();
        store.put(1, &quiz(1, "One")).await.unwrap();
        assert!(matches!(store.put(1, &quiz(1, "Again")).await, Err(StoreError::Conflict(1))));
        assert_eq!(store.list().await.unwrap(), vec![1]);
        store.delete(1).await.unwrap();
        assert!(matches!(store.get(1).await, Err(StoreError::NotFound(1))));
    }
}
