//! One converter per page, however many times the script is injected.
//!
//! Within one module instance the runtime lives in a thread-local cell.
//! Across instances the page itself is claimed with a marker attribute on
//! the root element; a later instance that finds the marker stands down.

use std::cell::OnceCell;

use equate_browser::{ConfigError, ConverterConfig, HostError, Runtime};
use thiserror::Error;

use crate::hud::Hud;

/// Attribute set on `<html>` by the instance that owns the page.
pub const READY_ATTR: &str = "data-equate-ready";

thread_local! {
    static RUNTIME: OnceCell<Runtime<Hud>> = const { OnceCell::new() };
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("another converter instance already owns this page")]
    ClaimedElsewhere,
}

/// What an install request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Install {
    Installed,
    AlreadyInstalled,
}

/// Install the converter for this page unless it already is.
pub fn install(config: ConverterConfig) -> Result<Install, BootstrapError> {
    if is_installed() {
        return Ok(Install::AlreadyInstalled);
    }
    config.validate()?;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or(HostError::NoDocument)?;
    let root = document.document_element().ok_or(HostError::NoDocument)?;
    if root.has_attribute(READY_ATTR) {
        return Err(BootstrapError::ClaimedElsewhere);
    }

    let hud = Hud::new(document, &config.cancel_key);
    let runtime = Runtime::new(hud, config)?;
    root.set_attribute(READY_ATTR, "")
        .map_err(|e| HostError::dom(format!("{e:?}")))?;

    RUNTIME.with(|cell| {
        if cell.set(runtime).is_err() {
            tracing::debug!(target: "equate::bootstrap", "runtime installed concurrently");
        }
    });
    tracing::info!(target: "equate::bootstrap", "converter installed");
    Ok(Install::Installed)
}

pub fn is_installed() -> bool {
    RUNTIME.with(|cell| cell.get().is_some())
}

/// Run `f` against the installed runtime, if any.
pub fn with_runtime<T>(f: impl FnOnce(&Runtime<Hud>) -> T) -> Option<T> {
    RUNTIME.with(|cell| cell.get().map(f))
}
