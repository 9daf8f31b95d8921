use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MaitreError;

/// Process-wide conversation mode.
///
/// `Manual`: conversations open only through an explicit activation call.
/// `Auto`: inbound text containing an activation word opens one too, and
/// user exit words are honored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Manual,
    #[default]
    Auto,
}

/// The trigger/exit vocabulary and mode.
///
/// This section is re-read between events whenever the config file
/// changes on disk — no restart required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Words that open a conversation in auto mode (case-insensitive
    /// substring match).
    #[serde(default = "default_activation_words")]
    pub activation_words: Vec<String>,
    /// Words in a *user* message that close the conversation (auto mode only).
    #[serde(default = "default_user_exit_words")]
    pub user_exit_words: Vec<String>,
    /// Words in the *operator's own* outgoing message that silently close
    /// the conversation — the manual-takeover signal.
    #[serde(default = "default_operator_exit_words")]
    pub operator_exit_words: Vec<String>,
    /// Literal markers in model output that finish the conversation.
    #[serde(default = "default_terminal_markers")]
    pub terminal_markers: Vec<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            activation_words: default_activation_words(),
            user_exit_words: default_user_exit_words(),
            operator_exit_words: default_operator_exit_words(),
            terminal_markers: default_terminal_markers(),
        }
    }
}

fn default_activation_words() -> Vec<String> {
    vec!["appointment".into(), "booking".into(), "לקבוע תור".into()]
}

fn default_user_exit_words() -> Vec<String> {
    vec!["stop".into(), "human".into(), "נציג".into()]
}

fn default_operator_exit_words() -> Vec<String> {
    vec!["#takeover".into()]
}

fn default_terminal_markers() -> Vec<String> {
    vec!["[CONVERSATION_DONE]".into(), "[HUMAN_HANDOFF]".into()]
}

impl BehaviorConfig {
    /// True when `text` contains any of `words`, case-insensitively.
    fn contains_any(text: &str, words: &[String]) -> bool {
        let lower = text.to_lowercase();
        words
            .iter()
            .filter(|w| !w.trim().is_empty())
            .any(|w| lower.contains(&w.to_lowercase()))
    }

    /// Should this inbound text auto-open a conversation?
    pub fn is_activation(&self, text: &str) -> bool {
        self.mode == Mode::Auto && Self::contains_any(text, &self.activation_words)
    }

    /// Does this *user* message ask to end the conversation?
    pub fn is_user_exit(&self, text: &str) -> bool {
        self.mode == Mode::Auto && Self::contains_any(text, &self.user_exit_words)
    }

    /// Does this *operator* message reclaim the conversation?
    /// Checked in both modes — a human can always take over.
    pub fn is_operator_exit(&self, text: &str) -> bool {
        Self::contains_any(text, &self.operator_exit_words)
    }
}

/// Re-read only the `[behavior]` section of a config file.
///
/// Used by the gateway for hot reload between events; a parse failure
/// keeps the previous vocabulary in place.
pub fn load_behavior(path: &str) -> Result<BehaviorConfig, MaitreError> {
    #[derive(Deserialize)]
    struct BehaviorOnly {
        #[serde(default)]
        behavior: BehaviorConfig,
    }

    let path = Path::new(path);
    if !path.exists() {
        return Ok(BehaviorConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| MaitreError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    let parsed: BehaviorOnly = toml::from_str(&content)
        .map_err(|e| MaitreError::Config(format!("failed to parse behavior section: {e}")))?;
    Ok(parsed.behavior)
}
