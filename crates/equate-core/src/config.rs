//! Converter configuration and the host's structural contract.
//!
//! Every field has a default matching the host as it renders today, so an
//! empty JSON object deserializes to a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for a converter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterConfig {
    pub timing: Timing,
    pub contract: HostContract,
    /// Lower-case labels of the modal's confirm control, across host locales.
    pub confirm_labels: Vec<String>,
    /// Consecutive focus failures tolerated before the session aborts.
    pub max_focus_failures: u32,
    /// `KeyboardEvent.key` value that cancels a running session.
    pub cancel_key: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            contract: HostContract::default(),
            confirm_labels: DEFAULT_CONFIRM_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_focus_failures: 10,
            cancel_key: "Escape".to_string(),
        }
    }
}

/// Best-effort confirm labels. Untested locales may match the wrong control.
pub const DEFAULT_CONFIRM_LABELS: &[&str] =
    &["done", "완료", "完了", "完成", "terminé", "fertig", "hecho"];

impl ConverterConfig {
    /// Check the configuration for values that would stall or break a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contract.roots.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::NoRootSelectors);
        }
        self.contract.validate()?;
        if self.timing.skip_ms <= self.timing.retry_ms {
            return Err(ConfigError::SkipBeforeRetry {
                retry_ms: self.timing.retry_ms,
                skip_ms: self.timing.skip_ms,
            });
        }
        if self.max_focus_failures == 0 {
            return Err(ConfigError::ZeroFailureBudget);
        }
        if self.cancel_key.is_empty() {
            return Err(ConfigError::EmptyCancelKey);
        }
        Ok(())
    }
}

/// All delays and timeouts of a session, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timing {
    /// Re-dispatch the command once if nothing confirmed it by then.
    pub retry_ms: u32,
    /// Give up on the current span and move on.
    pub skip_ms: u32,
    /// Pause after each delimiter deletion.
    pub edit_pause_ms: u32,
    /// Pause between selecting the expression and dispatching the command.
    pub dispatch_pause_ms: u32,
    /// Pause before retrying after a focus failure.
    pub focus_retry_ms: u32,
    /// Pause between seeing the modal and clicking its confirm control.
    pub dialog_pause_ms: u32,
    /// Settle delay after the modal was confirmed.
    pub dialog_settle_ms: u32,
    /// Settle delay after an inline render was observed.
    pub inline_settle_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            retry_ms: 1000,
            skip_ms: 3000,
            edit_pause_ms: 20,
            dispatch_pause_ms: 50,
            focus_retry_ms: 50,
            dialog_pause_ms: 20,
            dialog_settle_ms: 150,
            inline_settle_ms: 100,
        }
    }
}

impl Timing {
    pub fn retry(&self) -> Duration {
        ms(self.retry_ms)
    }

    pub fn skip(&self) -> Duration {
        ms(self.skip_ms)
    }

    pub fn edit_pause(&self) -> Duration {
        ms(self.edit_pause_ms)
    }

    pub fn dispatch_pause(&self) -> Duration {
        ms(self.dispatch_pause_ms)
    }

    pub fn focus_retry(&self) -> Duration {
        ms(self.focus_retry_ms)
    }

    pub fn dialog_pause(&self) -> Duration {
        ms(self.dialog_pause_ms)
    }

    pub fn dialog_settle(&self) -> Duration {
        ms(self.dialog_settle_ms)
    }

    pub fn inline_settle(&self) -> Duration {
        ms(self.inline_settle_ms)
    }
}

fn ms(v: u32) -> Duration {
    Duration::from_millis(u64::from(v))
}

/// Structural conventions of the host document that discovery and
/// confirmation depend on.
///
/// These are the host's private markup, not a published API; bump
/// [`HostContract::VERSION`] whenever the defaults change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostContract {
    /// Candidate containers, most specific first.
    pub roots: Vec<String>,
    /// Regions whose text is code and must never be converted.
    pub code_region: String,
    /// Already-rendered math output.
    pub rendered_math: String,
    /// Container of the modal equation editor.
    pub dialog: String,
    /// Editable input leaf inside the modal.
    pub dialog_editor: String,
    /// Actionable controls inside the modal.
    pub dialog_control: String,
    /// Icon element identifying the conventional confirm glyph.
    pub confirm_icon: String,
    /// Editable inputs inside the modal, used for the Enter fallback.
    pub dialog_input: String,
}

impl HostContract {
    pub const VERSION: u32 = 1;

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("codeRegion", &self.code_region),
            ("renderedMath", &self.rendered_math),
            ("dialog", &self.dialog),
            ("dialogEditor", &self.dialog_editor),
            ("dialogControl", &self.dialog_control),
            ("confirmIcon", &self.confirm_icon),
            ("dialogInput", &self.dialog_input),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptySelector(name));
            }
        }
        Ok(())
    }
}

impl Default for HostContract {
    fn default() -> Self {
        Self {
            roots: [".notion-page-content", ".notion-frame", "main", "body"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            code_region: ".notion-code-block, pre, code".to_string(),
            rendered_math: ".notion-equation, .katex".to_string(),
            dialog: r#"div[role="dialog"]"#.to_string(),
            dialog_editor: r#"div[role="dialog"] [contenteditable="true"][data-content-editable-leaf="true"]"#
                .to_string(),
            dialog_control: r#"div[role="button"]"#.to_string(),
            confirm_icon: "svg".to_string(),
            dialog_input: r#"[contenteditable="true"]"#.to_string(),
        }
    }
}
