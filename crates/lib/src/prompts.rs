//! Instruction payloads prepended to every model call.
//!
//! The payloads are opaque text: the proxy never inspects them.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{self, Config};
use crate::init::{DEFAULT_CHAT_PROMPT, DEFAULT_SUMMARY_PROMPT};

/// The two fixed payloads: one for chat turns, one for summary reports.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub chat: String,
    pub summary: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Prompts {
    /// Payloads compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            chat: DEFAULT_CHAT_PROMPT.to_string(),
            summary: DEFAULT_SUMMARY_PROMPT.to_string(),
        }
    }

    /// Load payloads from `prompts.chatFile` / `prompts.summaryFile` when set, else the built-ins.
    /// A configured file that cannot be read or is blank is an error.
    pub fn load(config: &Config, config_path: &Path) -> Result<Self> {
        let builtin = Self::builtin();
        let chat = match &config.prompts.chat_file {
            Some(f) => read_prompt(&config::resolve_prompt_path(f, config_path))?,
            None => builtin.chat,
        };
        let summary = match &config.prompts.summary_file {
            Some(f) => read_prompt(&config::resolve_prompt_path(f, config_path))?,
            None => builtin.summary,
        };
        Ok(Self { chat, summary })
    }
}

fn read_prompt(path: &Path) -> Result<String> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading prompt from {}", path.display()))?;
    if s.trim().is_empty() {
        anyhow::bail!("prompt file {} is empty", path.display());
    }
    Ok(s)
}
