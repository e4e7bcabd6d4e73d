//! Locating GGUF weights and tokenizer files, locally or on the Hugging Face hub

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use hf_hub::api::tokio::ApiBuilder;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use tracing::info;

const TOKENIZER_FILE: &str = "tokenizer.json";

/// Resolved on-disk model artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub weights: PathBuf,
    pub tokenizer: PathBuf,
}

/// Find a `.gguf` file: the path itself, or the first one (by name) inside a directory
pub fn find_local_weights(path: &Path) -> Result<Option<PathBuf>> {
    if path.is_file() {
        return Ok(Some(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Ok(None);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("gguf"))
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// `tokenizer.json` next to the weights, if present
pub fn find_local_tokenizer(weights: &Path) -> Option<PathBuf> {
    let dir = weights.parent()?;
    let candidate = dir.join(TOKENIZER_FILE);
    candidate.is_file().then_some(candidate)
}

/// Resolve weights and tokenizer, downloading whatever is not available locally
pub async fn resolve_model_files(config: &ModelConfig) -> Result<ModelFiles> {
    let local_weights = match &config.model_path {
        Some(path) => {
            let found = find_local_weights(path)?;
            if found.is_none() {
                info!(path = %path.display(), "No GGUF weights at model_path, using the hub");
            }
            found
        }
        None => None,
    };

    let local_tokenizer = local_weights.as_deref().and_then(find_local_tokenizer);

    if let (Some(weights), Some(tokenizer)) = (&local_weights, &local_tokenizer) {
        return Ok(ModelFiles {
            weights: weights.clone(),
            tokenizer: tokenizer.clone(),
        });
    }

    let token = std::env::var("HF_TOKEN").ok().filter(|t| !t.trim().is_empty());
    let api = ApiBuilder::new()
        .with_token(token)
        .build()
        .map_err(|e| Error::Model(format!("cannot create hub client: {}", e)))?;

    let weights = match local_weights {
        Some(weights) => weights,
        None => {
            info!(repo = %config.gguf_repo, file = %config.gguf_file, "Downloading model weights");
            api.repo(Repo::new(config.gguf_repo.clone(), RepoType::Model))
                .get(&config.gguf_file)
                .await
                .map_err(|e| Error::Model(format!("cannot fetch {}/{}: {}", config.gguf_repo, config.gguf_file, e)))?
        }
    };

    let tokenizer = match local_tokenizer {
        Some(tokenizer) => tokenizer,
        None => {
            let repo = config.tokenizer_repo();
            info!(repo = %repo, "Downloading tokenizer");
            api.repo(Repo::new(repo.to_string(), RepoType::Model))
                .get(TOKENIZER_FILE)
                .await
                .map_err(|e| Error::Tokenizer(format!("cannot fetch {}/{}: {}", repo, TOKENIZER_FILE, e)))?
        }
    };

    Ok(ModelFiles { weights, tokenizer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_weights_in_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.gguf"), b"").unwrap();
        fs::write(dir.path().join("a.gguf"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let found = find_local_weights(dir.path()).unwrap();
        assert_eq!(found, Some(dir.path().join("a.gguf")));
    }

    #[test]
    fn test_missing_path_yields_none() {
        let dir = TempDir::new().unwrap();
        let found = find_local_weights(&dir.path().join("checkpoint-3")).unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_fully_local_files_skip_the_hub() {
        let dir = TempDir::new().unwrap();
        let weights = dir.path().join("model.gguf");
        fs::write(&weights, b"").unwrap();
        fs::write(dir.path().join(TOKENIZER_FILE), b"{}").unwrap();

        let config = ModelConfig {
            model_path: Some(dir.path().to_path_buf()),
            ..ModelConfig::default()
        };
        let files = resolve_model_files(&config).await.unwrap();
        assert_eq!(files.weights, weights);
        assert_eq!(files.tokenizer, dir.path().join(TOKENIZER_FILE));
    }
}
