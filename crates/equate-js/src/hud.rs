//! Heads-up progress panel.

use equate_browser::style;
use equate_browser::{ProgressReporter, SessionEnd, SessionSummary};
use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement};

const PANEL_ID: &str = "equate-hud";

/// How long the completion message stays up.
const DONE_VISIBLE_MS: u32 = 3000;

fn progress_html(converted: usize, total: usize, cancel_label: &str) -> String {
    format!(
        "<b>$ → equation</b> ({converted}/{total})<br/>Auto-converting... Press <b>{cancel_label}</b> to stop"
    )
}

fn done_html(converted: usize) -> String {
    format!("<b>Done!</b> Converted {converted} equation(s).")
}

/// Short label for a `KeyboardEvent.key` value.
fn key_label(key: &str) -> String {
    match key {
        "Escape" => "ESC".to_string(),
        other => other.to_uppercase(),
    }
}

/// Fixed panel in the top-right corner of the page.
pub struct Hud {
    document: Document,
    panel: Option<HtmlElement>,
    hide_timer: Option<Timeout>,
    cancel_label: String,
}

impl Hud {
    pub fn new(document: Document, cancel_key: &str) -> Self {
        Self {
            document,
            panel: None,
            hide_timer: None,
            cancel_label: key_label(cancel_key),
        }
    }

    fn panel(&mut self) -> Option<HtmlElement> {
        if let Some(panel) = &self.panel {
            return Some(panel.clone());
        }
        let panel: HtmlElement = match self.document.get_element_by_id(PANEL_ID) {
            Some(existing) => existing.dyn_into().ok()?,
            None => {
                let panel: HtmlElement = self.document.create_element("div").ok()?.dyn_into().ok()?;
                panel.set_id(PANEL_ID);
                self.document.document_element()?.append_child(&panel).ok()?;
                panel
            }
        };
        let background = style::rgba_u32_to_css(style::PANEL_BACKGROUND);
        style::apply(&panel, &style::overlay_base());
        style::apply(
            &panel,
            &[
                ("top", "8px"),
                ("right", "8px"),
                ("background", background.as_str()),
                ("color", "#fff"),
                ("font", "12px system-ui, sans-serif"),
                ("padding", "8px 10px"),
                ("border-radius", "8px"),
                ("box-shadow", "0 2px 12px rgba(0,0,0,0.3)"),
                ("max-width", "360px"),
                ("line-height", "1.4"),
            ],
        );
        self.panel = Some(panel.clone());
        Some(panel)
    }

    fn show(&mut self, html: &str) {
        // A pending hide from the previous session must not blank this one.
        self.hide_timer = None;
        if let Some(panel) = self.panel() {
            panel.set_inner_html(html);
            style::apply(&panel, &[("display", "block")]);
        }
    }

    fn hide(&mut self) {
        self.hide_timer = None;
        if let Some(panel) = &self.panel {
            style::apply(panel, &[("display", "none")]);
        }
    }
}

impl ProgressReporter for Hud {
    fn report_started(&mut self, total: usize) {
        let html = progress_html(0, total, &self.cancel_label);
        self.show(&html);
    }

    fn report_progress(&mut self, current: usize, total: usize) {
        let html = progress_html(current, total, &self.cancel_label);
        self.show(&html);
    }

    fn report_done(&mut self, summary: &SessionSummary) {
        match summary.end {
            SessionEnd::Completed => {
                self.show(&done_html(summary.converted));
                if let Some(panel) = self.panel.clone() {
                    self.hide_timer = Some(Timeout::new(DONE_VISIBLE_MS, move || {
                        style::apply(&panel, &[("display", "none")]);
                    }));
                }
            }
            SessionEnd::Cancelled | SessionEnd::Aborted => self.hide(),
        }
    }
}
