//! Inline styling for the overlays the converter draws over the page.

use web_sys::HtmlElement;

/// Stacking order just below the top, above anything the host draws.
pub const OVERLAY_Z_INDEX: &str = "2147483646";

/// Outline color of the selection mark, packed as 0xRRGGBBAA.
pub const MARK_COLOR: u32 = 0x3FB950FF;

/// Background of the progress panel, packed as 0xRRGGBBAA.
pub const PANEL_BACKGROUND: u32 = 0x141414E6;

/// Convert RGBA u32 (packed as 0xRRGGBBAA) to CSS rgba() string.
pub fn rgba_u32_to_css(color: u32) -> String {
    let r = (color >> 24) & 0xFF;
    let g = (color >> 16) & 0xFF;
    let b = (color >> 8) & 0xFF;
    let a = (color & 0xFF) as f32 / 255.0;
    format!("rgba({}, {}, {}, {:.2})", r, g, b, a)
}

/// Set each `(property, value)` pair on the element's inline style.
///
/// Failures are logged; a half-styled overlay is still better than none.
pub fn apply(element: &HtmlElement, properties: &[(&str, &str)]) {
    let style = element.style();
    for (property, value) in properties {
        if let Err(err) = style.set_property(property, value) {
            tracing::trace!(target: "equate::dom", property, ?err, "style property rejected");
        }
    }
}

/// Fixed-position, click-through overlay base style.
pub fn overlay_base() -> [(&'static str, &'static str); 3] {
    [
        ("position", "fixed"),
        ("pointer-events", "none"),
        ("z-index", OVERLAY_Z_INDEX),
    ]
}
