use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub session_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "kcal").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Self::from_env(&data_dir, |key| std::env::var(key).ok())
    }

    /// Resolve settings from `env`, falling back to files under `data_dir`.
    fn from_env(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = env("KCAL_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token = match env("KCAL_TOKEN").filter(|v| !v.trim().is_empty()) {
            Some(token) => Some(token.trim().to_string()),
            None => read_token_file(&data_dir.join("token"))?,
        };

        let session_dir = env("KCAL_SESSION_DIR")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| data_dir.join("session"), PathBuf::from);

        Ok(Config {
            api_url,
            token,
            session_dir,
        })
    }
}

fn read_token_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let token = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file: {}", path.display()))?;
    let token = token.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}
