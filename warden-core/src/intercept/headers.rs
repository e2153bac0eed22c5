use std::sync::atomic::{AtomicBool, Ordering};

const ALLOW_ORIGIN: &str = "access-control-allow-origin";
const FRAME_OPTIONS: &str = "x-frame-options";

/// Runtime switch for relaxed cross-origin behavior, read per response.
pub trait CorsToggle: Send + Sync {
    fn relaxed_cors(&self) -> bool;
}

/// A toggle held in memory.
#[derive(Debug, Default)]
pub struct FixedCorsToggle(AtomicBool);

impl FixedCorsToggle {
    pub fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

impl CorsToggle for FixedCorsToggle {
    fn relaxed_cors(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Response headers as ordered name/value pairs.
pub type ResponseHeaders = Vec<(String, String)>;

/// Result of the response-header hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderRewrite {
    /// Pass the response through untouched.
    Unchanged,
    /// Replace the response headers with these.
    Replace(ResponseHeaders),
}

/// With relaxed CORS on, drop any allow-origin and frame-options headers
/// (names compared case-insensitively) and allow every origin.
pub fn filter_response_headers(toggle: &dyn CorsToggle, headers: &[(String, String)]) -> HeaderRewrite {
    if !toggle.relaxed_cors() {
        return HeaderRewrite::Unchanged;
    }

    let mut rewritten: ResponseHeaders = headers
        .iter()
        .filter(|(name, _)| {
            !name.eq_ignore_ascii_case(ALLOW_ORIGIN) && !name.eq_ignore_ascii_case(FRAME_OPTIONS)
        })
        .cloned()
        .collect();
    rewritten.push((ALLOW_ORIGIN.to_string(), "*".to_string()));
    HeaderRewrite::Replace(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(pairs: &[(&str, &str)]) -> ResponseHeaders {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn strict_mode_passes_through() {
        let toggle = FixedCorsToggle::new(false);
        let original = headers(&[("Access-Control-Allow-Origin", "https://a.test")]);
        assert_eq!(filter_response_headers(&toggle, &original), HeaderRewrite::Unchanged);
    }

    #[test]
    fn relaxed_mode_replaces_conflicting_headers() {
        let toggle = FixedCorsToggle::new(true);
        let original = headers(&[
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "https://a.test"),
            ("X-Frame-Options", "DENY"),
        ]);
        assert_eq!(
            filter_response_headers(&toggle, &original),
            HeaderRewrite::Replace(headers(&[
                ("Content-Type", "application/json"),
                ("access-control-allow-origin", "*"),
            ]))
        );

        toggle.set(false);
        assert_eq!(filter_response_headers(&toggle, &original), HeaderRewrite::Unchanged);
    }
}
