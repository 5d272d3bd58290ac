//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling the client.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_API_BASE, StreamFormat};
use crate::controller::DEFAULT_AGENT_LABEL;
use crate::error::{Error, Result};

/// Environment variable consulted when `--api-base` is absent.
pub const API_BASE_ENV: &str = "PARLEY_API_BASE";

/// Environment variable consulted when `--storage` is absent.
pub const STORAGE_ENV: &str = "PARLEY_STORAGE";

/// Command-line arguments for the parley-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat backend.
    #[arrrg(optional, "Backend base URL (default: http://127.0.0.1:8000/)", "URL")]
    pub api_base: Option<String>,

    /// File holding the persisted session token.
    #[arrrg(optional, "Session storage file", "PATH")]
    pub storage: Option<String>,

    /// Label shown on bot replies.
    #[arrrg(optional, "Label for bot replies (default: Text Agent)", "LABEL")]
    pub agent_label: Option<String>,

    /// How to interpret chat response bodies.
    #[arrrg(optional, "Chat body format: auto, raw, sse (default: raw)", "FORMAT")]
    pub format: Option<String>,

    /// Whole-request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: none)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for the chat client.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments and the environment with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Base URL of the backend.
    pub api_base: String,

    /// Session storage file; `None` uses the platform config directory.
    pub storage_path: Option<PathBuf>,

    /// Label shown on bot replies.
    pub agent_label: Option<String>,

    /// How chat response bodies are interpreted.
    pub stream_format: StreamFormat,

    /// Whole-request timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - API base: http://127.0.0.1:8000/
    /// - Storage: platform config directory
    /// - Agent label: Text Agent
    /// - Format: raw
    /// - Timeout: none
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            storage_path: None,
            agent_label: Some(DEFAULT_AGENT_LABEL.to_string()),
            stream_format: StreamFormat::Raw,
            timeout: None,
            use_color: true,
        }
    }

    /// Resolves arguments, falling back to `env` and then to defaults.
    pub fn resolve(args: ChatArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ChatConfig::new();
        let stream_format = match args.format {
            Some(format) => format
                .parse::<StreamFormat>()
                .map_err(|err| Error::validation(err, Some("format".to_string())))?,
            None => defaults.stream_format,
        };
        let agent_label = match args.agent_label {
            Some(label) if label.is_empty() => None,
            Some(label) => Some(label),
            None => defaults.agent_label,
        };
        Ok(ChatConfig {
            api_base: args
                .api_base
                .or_else(|| env(API_BASE_ENV))
                .unwrap_or(defaults.api_base),
            storage_path: args
                .storage
                .or_else(|| env(STORAGE_ENV))
                .map(PathBuf::from),
            agent_label,
            stream_format,
            timeout: args.timeout_secs.map(Duration::from_secs),
            use_color: !args.no_color,
        })
    }

    /// Sets the backend base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sets the session storage file.
    pub fn with_storage_path(mut self, path: Option<PathBuf>) -> Self {
        self.storage_path = path;
        self
    }

    /// Sets the bot reply label.
    pub fn with_agent_label(mut self, label: Option<String>) -> Self {
        self.agent_label = label;
        self
    }

    /// Sets the chat body format.
    pub fn with_stream_format(mut self, format: StreamFormat) -> Self {
        self.stream_format = format;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        ChatConfig::resolve(args, |key| std::env::var(key).ok())
    }
}
