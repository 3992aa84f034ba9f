//! WASM bindings for the equate converter.
//!
//! Loaded as a content script on the host page. Exposes a small command
//! surface (`install`, `start`, `cancel`, `isRunning`, `handleMessage`) and
//! shows progress in a heads-up panel while a session runs.

mod bootstrap;
mod hud;
mod types;

pub use types::*;

use equate_browser::ConverterConfig;
use wasm_bindgen::prelude::*;

use crate::bootstrap::{BootstrapError, Install};

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    init_tracing();
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
fn init_tracing() {
    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );

    // A second injected instance finds a subscriber already set; that's fine.
    let _ = set_global_default(Registry::default().with(wasm_layer));
}

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
fn init_tracing() {}

fn js_error(err: BootstrapError) -> JsError {
    JsError::new(&err.to_string())
}

fn parse_config(config: JsValue) -> Result<ConverterConfig, JsError> {
    if config.is_undefined() || config.is_null() {
        return Ok(ConverterConfig::default());
    }
    serde_wasm_bindgen::from_value(config)
        .map_err(|e| JsError::new(&format!("Invalid config: {}", e)))
}

fn ensure_installed() -> Result<(), JsError> {
    bootstrap::install(ConverterConfig::default())
        .map(|_| ())
        .map_err(js_error)
}

/// Install the converter with an optional partial configuration.
///
/// Returns false if it was already installed, in which case the given
/// configuration is ignored.
#[wasm_bindgen]
pub fn install(config: JsValue) -> Result<bool, JsError> {
    let config = parse_config(config)?;
    match bootstrap::install(config).map_err(js_error)? {
        Install::Installed => Ok(true),
        Install::AlreadyInstalled => Ok(false),
    }
}

/// Start converting every `$...$` span on the page.
#[wasm_bindgen]
pub fn start() -> Result<JsValue, JsError> {
    ensure_installed()?;
    let outcome = bootstrap::with_runtime(|rt| rt.start())
        .ok_or_else(|| JsError::new("converter not installed"))?;
    serde_wasm_bindgen::to_value(&JsStartOutcome::from(outcome))
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Cancel the running session. Returns whether one was running.
#[wasm_bindgen]
pub fn cancel() -> bool {
    bootstrap::with_runtime(|rt| rt.cancel()).unwrap_or(false)
}

#[wasm_bindgen(js_name = isRunning)]
pub fn is_running() -> bool {
    bootstrap::with_runtime(|rt| rt.is_running()).unwrap_or(false)
}

/// `{converted, total}` of the running session, or `null`.
#[wasm_bindgen]
pub fn progress() -> Result<JsValue, JsError> {
    let progress = bootstrap::with_runtime(|rt| rt.progress())
        .flatten()
        .map(|(converted, total)| JsProgress { converted, total });
    serde_wasm_bindgen::to_value(&progress)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Summary of the most recent session, or `null`.
#[wasm_bindgen(js_name = lastSummary)]
pub fn last_summary() -> Result<JsValue, JsError> {
    let summary = bootstrap::with_runtime(|rt| rt.last_summary())
        .flatten()
        .map(|s| JsSummary::from(&s));
    serde_wasm_bindgen::to_value(&summary)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// The configuration in effect, with every default filled in.
#[wasm_bindgen(js_name = effectiveConfig)]
pub fn effective_config() -> Result<JsValue, JsError> {
    let config = bootstrap::with_runtime(|rt| rt.config())
        .flatten()
        .unwrap_or_default();
    serde_wasm_bindgen::to_value(&config)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Handle a runtime message from the extension. Returns the reply for
/// recognized messages and `undefined` otherwise.
#[wasm_bindgen(js_name = handleMessage)]
pub fn handle_message(message: JsValue) -> Result<JsValue, JsError> {
    let Ok(message) = serde_wasm_bindgen::from_value::<Message>(message) else {
        return Ok(JsValue::UNDEFINED);
    };
    match message {
        Message::RunConvert => {
            let outcome = start()?;
            tracing::debug!(target: "equate::bootstrap", ?outcome, "RUN_CONVERT handled");
        }
    }
    serde_wasm_bindgen::to_value(&Reply { ok: true })
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}
