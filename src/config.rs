use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub quiz_dir: PathBuf,
    pub history_path: Option<PathBuf>,
    /// `(token, subject)` pairs.
    pub admin_tokens: Vec<(String, String)>,
    pub user_tokens: Vec<(String, String)>,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            quiz_dir: PathBuf::from(format!("{}/quizzes", env!("CARGO_MANIFEST_DIR"))),
            history_path: None,
            admin_tokens: Vec::new(),
            user_tokens: Vec::new(),
            cors_origins: vec!["http://localhost:4200".to_string()],
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = non_empty_var("QUIZ_PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let cors_origins = non_empty_var("QUIZ_CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or(defaults.cors_origins);

        Self {
            host: non_empty_var("QUIZ_HOST").unwrap_or(defaults.host),
            port,
            quiz_dir: non_empty_var("QUIZ_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.quiz_dir),
            history_path: non_empty_var("QUIZ_HISTORY_PATH").map(PathBuf::from),
            admin_tokens: non_empty_var("QUIZ_ADMIN_TOKENS")
                .map(|v| parse_token_list(&v))
                .unwrap_or_default(),
            user_tokens: non_empty_var("QUIZ_USER_TOKENS")
                .map(|v| parse_token_list(&v))
                .unwrap_or_default(),
            cors_origins,
        }
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `token=subject,token2=subject2`. Malformed entries are skipped.
pub fn parse_token_list(raw: &str) -> Vec<(String, String)> {
    split_list(raw)
        .into_iter()
        .filter_map(|entry| {
            let (token, subject) = entry.split_once('=')?;
            let (token, subject) = (token.trim(), subject.trim());
            (!token.is_empty() && !subject.is_empty())
                .then(|| (token.to_string(), subject.to_string()))
        })
        .collect()
}
