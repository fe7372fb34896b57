//! Device class and browser derivation from stored user-agent strings.
//!
//! Deliberately coarse: the report only needs stable grouping keys, not a
//! full user-agent parser. Both lookups are ordered substring tables with a
//! documented first-match rule, like the suggested-action table in
//! [`crate::classifier`].

// ---------------------------------------------------------------------------
// DeviceClass
// ---------------------------------------------------------------------------

/// Coarse device bucket for report grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "desktop",
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
        }
    }
}

/// Ordered device lookup; `iPad` must precede the generic mobile markers
/// because iPad user agents also contain `Mobile`.
const DEVICE_TABLE: &[(&str, DeviceClass)] = &[
    ("iPad", DeviceClass::Tablet),
    ("Tablet", DeviceClass::Tablet),
    ("Mobile", DeviceClass::Mobile),
    ("Android", DeviceClass::Mobile),
];

/// Classify a user-agent string into a device bucket (default: desktop).
pub fn device_class(user_agent: &str) -> DeviceClass {
    DEVICE_TABLE
        .iter()
        .find(|(fragment, _)| user_agent.contains(fragment))
        .map(|(_, class)| *class)
        .unwrap_or(DeviceClass::Desktop)
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Browser family for report grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Opera,
    Other,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Safari => "safari",
            Browser::Edge => "edge",
            Browser::Opera => "opera",
            Browser::Other => "other",
        }
    }
}

/// Ordered browser lookup. Chromium-derived browsers embed `Chrome` (and
/// `Safari`) in their user agents, so `Edg` and `OPR` must come first, and
/// `Chrome` before `Safari`.
const BROWSER_TABLE: &[(&str, Browser)] = &[
    ("Edg", Browser::Edge),
    ("OPR", Browser::Opera),
    ("Opera", Browser::Opera),
    ("Firefox", Browser::Firefox),
    ("Chrome", Browser::Chrome),
    ("Safari", Browser::Safari),
];

/// Classify a user-agent string into a browser family (default: other).
pub fn browser(user_agent: &str) -> Browser {
    BROWSER_TABLE
        .iter()
        .find(|(fragment, _)| user_agent.contains(fragment))
        .map(|(_, browser)| *browser)
        .unwrap_or(Browser::Other)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_DESKTOP: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/120.0.0.0 Safari/537.36";
    const EDGE_DESKTOP: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const SAFARI_IPHONE: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
         (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str =
        "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
         (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const FIREFOX_ANDROID: &str =
        "Mozilla/5.0 (Android 14; Mobile; rv:121.0) Gecko/121.0 Firefox/121.0";

    #[test]
    fn chromium_order_resolves_edge_before_chrome() {
        assert_eq!(browser(EDGE_DESKTOP), Browser::Edge);
        assert_eq!(browser(CHROME_DESKTOP), Browser::Chrome);
    }

    #[test]
    fn safari_only_matches_without_chrome_marker() {
        assert_eq!(browser(SAFARI_IPHONE), Browser::Safari);
    }

    #[test]
    fn firefox_matches() {
        assert_eq!(browser(FIREFOX_ANDROID), Browser::Firefox);
    }

    #[test]
    fn unknown_agent_is_other() {
        assert_eq!(browser("curl/8.4.0"), Browser::Other);
        assert_eq!(browser(""), Browser::Other);
    }

    #[test]
    fn ipad_is_tablet_despite_mobile_marker() {
        assert_eq!(device_class(SAFARI_IPAD), DeviceClass::Tablet);
    }

    #[test]
    fn phone_agents_are_mobile() {
        assert_eq!(device_class(SAFARI_IPHONE), DeviceClass::Mobile);
        assert_eq!(device_class(FIREFOX_ANDROID), DeviceClass::Mobile);
    }

    #[test]
    fn desktop_is_the_default() {
        assert_eq!(device_class(CHROME_DESKTOP), DeviceClass::Desktop);
        assert_eq!(device_class(""), DeviceClass::Desktop);
    }
}
