pub mod allocator;
pub mod auth;
pub mod config;
pub mod decoder;
pub mod error;
pub mod handlers;
pub mod history;
pub mod models;
pub mod parser;
pub mod routes;
pub mod scoring;
pub mod state;
pub mod store;
pub mod validation;

use std::sync::Arc;

pub async fn build_state(config: config::Config) -> anyhow::Result<state::AppState> {
    let quizzes: Arc<dyn store::QuizStore> = Arc::new(store::FileQuizStore::open(&config.quiz_dir).await?);
    let history: Arc<dyn history::AttemptHistory> =
        Arc::new(history::MemoryAttemptHistory::new(config.history_path.clone()));
    let auth: Arc<dyn auth::Authenticator> = Arc::new(auth::TokenAuthenticator::from_config(&config));
    if config.admin_tokens.is_empty() {
        tracing::warn!("no admin tokens configured, quiz authoring is disabled");
    }
    Ok(state::AppState::new(quizzes, history, auth, config))
}
