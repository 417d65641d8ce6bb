//! AIr-Cooled Answers core library: chat proxy, model gateway, conversation state,
//! rich-text rendering and summary export shared by the CLI and desktop applications.

pub mod client;
pub mod config;
pub mod conversation;
pub mod export;
pub mod init;
pub mod llm;
pub mod prompts;
pub mod proxy;
pub mod quotes;
pub mod render;
