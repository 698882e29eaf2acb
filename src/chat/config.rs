//! Configuration types for the chat binaries.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration the REPL runs with. Values resolve CLI-first, then
//! environment, then built-in defaults.

use arrrg_derive::CommandLine;

/// Flow id used by the responses binary when neither `--flow` nor the
/// environment provides one. This is the backend's stock chat flow.
pub const DEFAULT_FLOW_ID: &str = "b513f6bb-7c10-485e-8edf-ed0fe373a632";

/// Command-line arguments shared by the chat binaries.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Backend base URL; overrides the environment.
    #[arrrg(optional, "Backend base URL (default: $RAGLINE_BASE_URL)", "URL")]
    pub base_url: Option<String>,

    /// Flow id for the responses endpoint; overrides the environment.
    #[arrrg(optional, "Flow id for the responses endpoint", "FLOW")]
    pub flow: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved configuration for a chat run.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Base URL override from the command line, if any.
    pub base_url: Option<String>,
    /// Flow id override from the command line, if any.
    pub flow: Option<String>,
    /// Whether to use ANSI redraw while streaming.
    pub use_color: bool,
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            base_url: args.base_url,
            flow: args.flow,
            use_color: !args.no_color,
        }
    }
}

impl ChatConfig {
    /// The flow id to use: CLI, then the provided environment value, then
    /// [`DEFAULT_FLOW_ID`].
    pub fn resolve_flow(&self, env_flow: Option<&str>) -> String {
        self.flow
            .clone()
            .or_else(|| env_flow.map(String::from))
            .unwrap_or_else(|| DEFAULT_FLOW_ID.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert!(config.base_url.is_none());
        assert!(config.flow.is_none());
        assert!(config.use_color);
    }

    #[test]
    fn no_color_flag_disables_color() {
        let args = ChatArgs {
            base_url: Some("http://localhost:3000".to_string()),
            flow: None,
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:3000"));
        assert!(!config.use_color);
    }

    #[test]
    fn flow_resolution_order() {
        let mut config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config.resolve_flow(None), DEFAULT_FLOW_ID);
        assert_eq!(config.resolve_flow(Some("env-flow")), "env-flow");
        config.flow = Some("cli-flow".to_string());
        assert_eq!(config.resolve_flow(Some("env-flow")), "cli-flow");
    }
}
