//! Platform detection for the host command chord.
//!
//! Only what decides the primary shortcut modifier is detected; everything
//! else about the browser is irrelevant to the converter.

use std::sync::OnceLock;

use equate_core::PrimaryModifier;

/// Cached platform detection results.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    pub ios: bool,
    pub mac: bool,
}

impl Platform {
    /// Apple platforms use Cmd where everyone else uses Ctrl.
    pub fn primary_modifier(&self) -> PrimaryModifier {
        PrimaryModifier::for_platform(self.mac || self.ios)
    }

    /// Classify from a user agent and `navigator.platform` string.
    pub fn from_strings(user_agent: &str, platform: &str, touch: bool) -> Self {
        let user_agent = user_agent.to_lowercase();
        let platform = platform.to_lowercase();

        // iPadOS reports a Mac platform; touch support gives it away.
        let ios = user_agent.contains("iphone")
            || user_agent.contains("ipad")
            || user_agent.contains("ipod")
            || (platform.contains("mac") && touch);
        let mac = platform.contains("mac") && !ios;

        Self { ios, mac }
    }
}

static PLATFORM: OnceLock<Platform> = OnceLock::new();

/// Get cached platform info. Detection runs once on first call.
pub fn platform() -> &'static Platform {
    PLATFORM.get_or_init(detect_platform)
}

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
fn detect_platform() -> Platform {
    let Some(window) = web_sys::window() else {
        return Platform::default();
    };
    let navigator = window.navigator();
    let user_agent = navigator.user_agent().unwrap_or_default();
    let platform_str = navigator.platform().unwrap_or_default();
    Platform::from_strings(&user_agent, &platform_str, navigator.max_touch_points() > 0)
}

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
fn detect_platform() -> Platform {
    Platform::default()
}
