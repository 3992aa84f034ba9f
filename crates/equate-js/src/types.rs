//! Types exposed to JavaScript via wasm-bindgen.

use equate_browser::{SessionEnd, SessionSummary, StartOutcome};
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

/// Message from the extension's background context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "t")]
pub enum Message {
    #[serde(rename = "RUN_CONVERT")]
    RunConvert,
}

/// Acknowledgement sent back for a handled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Reply {
    pub ok: bool,
}

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum JsStartOutcome {
    Started { total: usize },
    AlreadyRunning,
    NothingToDo,
}

impl From<StartOutcome> for JsStartOutcome {
    fn from(outcome: StartOutcome) -> Self {
        match outcome {
            StartOutcome::Started { total } => JsStartOutcome::Started { total },
            StartOutcome::AlreadyRunning => JsStartOutcome::AlreadyRunning,
            StartOutcome::NothingToDo => JsStartOutcome::NothingToDo,
        }
    }
}

/// Progress of the running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsProgress {
    pub converted: usize,
    pub total: usize,
}

/// Final numbers of the last session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsSummary {
    pub converted: usize,
    pub skipped: usize,
    pub total: usize,
    /// "completed", "cancelled" or "aborted".
    pub end: String,
    pub elapsed_ms: u64,
}

impl From<&SessionSummary> for JsSummary {
    fn from(summary: &SessionSummary) -> Self {
        let end = match summary.end {
            SessionEnd::Completed => "completed",
            SessionEnd::Cancelled => "cancelled",
            SessionEnd::Aborted => "aborted",
        };
        Self {
            converted: summary.converted,
            skipped: summary.skipped,
            total: summary.total,
            end: end.to_string(),
            elapsed_ms: u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
