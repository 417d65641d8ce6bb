//! Initialize the configuration directory: create ~/.aircooled, a default config and the prompt
//! files.
//!
//! Layout mirrors `crates/lib/config/`: `config/prompts/*.md` → `~/.aircooled/prompts/*.md`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

pub(crate) static DEFAULT_CHAT_PROMPT: &str = include_str!("../config/prompts/chat.md");
pub(crate) static DEFAULT_SUMMARY_PROMPT: &str = include_str!("../config/prompts/summary.md");

/// Config written by `init`: points both payloads at the seeded prompt files so they can be
/// edited in place.
const DEFAULT_CONFIG_JSON: &str = r#"{
  "prompts": {
    "chatFile": "prompts/chat.md",
    "summaryFile": "prompts/summary.md"
  }
}
"#;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` pointing at the prompt files if missing.
/// - Creates the `prompts` subdirectory and seeds `chat.md` / `summary.md` from the built-in
///   payloads if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config::config_dir(config_path);
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG_JSON)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let prompts_dir = config_dir.join("prompts");
    if !prompts_dir.exists() {
        std::fs::create_dir_all(&prompts_dir)
            .with_context(|| format!("creating prompts directory {}", prompts_dir.display()))?;
        log::info!("created prompts directory at {}", prompts_dir.display());
    }
    for (name, content) in [
        ("chat.md", DEFAULT_CHAT_PROMPT),
        ("summary.md", DEFAULT_SUMMARY_PROMPT),
    ] {
        let path = prompts_dir.join(name);
        if path.exists() {
            log::debug!("{} already exists, skipping", path.display());
            continue;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("writing default prompt to {}", path.display()))?;
        log::info!("wrote default prompt to {}", path.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_seeds_config_and_prompts_once() {
        let dir =
            std::env::temp_dir().join(format!("aircooled-init-test-{}", uuid::Uuid::new_v4()));
        let config_path = dir.join("config.json");

        let out = init_config_dir(&config_path).unwrap();
        assert_eq!(out, dir);
        assert!(config_path.exists());
        let chat = dir.join("prompts").join("chat.md");
        assert_eq!(std::fs::read_to_string(&chat).unwrap(), DEFAULT_CHAT_PROMPT);

        std::fs::write(&chat, "edited").unwrap();
        init_config_dir(&config_path).unwrap();
        assert_eq!(std::fs::read_to_string(&chat).unwrap(), "edited");

        let (config, _) = config::load_config(Some(config_path)).unwrap();
        assert_eq!(
            config.prompts.summary_file,
            Some(PathBuf::from("prompts/summary.md"))
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
