//! Origin helpers shared by the trust broker and the request interceptor.

use anyhow::{Context, Result, bail};
use url::{Origin, Url};

/// Serialized origin (`scheme://host[:port]`) of a URL, or `None` when the
/// URL is unparsable or its origin is opaque (`data:`, `blob:` of an opaque
/// origin, custom schemes).
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    serialized_origin(&parsed)
}

pub(crate) fn serialized_origin(url: &Url) -> Option<String> {
    match url.origin() {
        origin @ Origin::Tuple(..) => Some(origin.ascii_serialization()),
        Origin::Opaque(_) => None,
    }
}

/// Whether two URLs share a non-opaque origin.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (origin_of(a), origin_of(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// One entry of an always-trusted list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    /// A full origin such as `https://extensions.turbowarp.org`.
    Exact(String),
    /// A bare host; matches `http` and `https` on any port.
    Host(String),
    /// `*.example.com`; matches `example.com` and any subdomain over `https`.
    Subdomains(String),
}

impl OriginPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("origin pattern must not be empty");
        }

        if let Some(suffix) = trimmed.strip_prefix("*.") {
            if suffix.is_empty() || suffix.contains('/') || suffix.contains(':') {
                bail!("invalid wildcard origin pattern `{trimmed}`");
            }
            return Ok(Self::Subdomains(suffix.to_ascii_lowercase()));
        }

        if trimmed.contains("://") {
            let url = Url::parse(trimmed)
                .with_context(|| format!("invalid origin pattern `{trimmed}`"))?;
            let origin = serialized_origin(&url)
                .with_context(|| format!("origin pattern `{trimmed}` has an opaque origin"))?;
            return Ok(Self::Exact(origin));
        }

        if trimmed.contains('/') {
            bail!("host pattern `{trimmed}` must not contain a path");
        }
        url::Host::parse(trimmed)
            .with_context(|| format!("invalid host pattern `{trimmed}`"))?;
        Ok(Self::Host(trimmed.to_ascii_lowercase()))
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Self::Exact(origin) => serialized_origin(url).is_some_and(|o| &o == origin),
            Self::Host(host) => {
                matches!(url.scheme(), "http" | "https")
                    && url.host_str().is_some_and(|h| h.eq_ignore_ascii_case(host))
            }
            Self::Subdomains(suffix) => {
                if url.scheme() != "https" {
                    return false;
                }
                let Some(host) = url.host_str() else {
                    return false;
                };
                let host = host.to_ascii_lowercase();
                host == *suffix
                    || host
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn origin_drops_path_and_default_port() {
        assert_eq!(
            origin_of("https://example.com:443/a/b?c"),
            Some("https://example.com".to_string())
        );
        assert_eq!(
            origin_of("http://example.com:8080/"),
            Some("http://example.com:8080".to_string())
        );
        assert_eq!(origin_of("data:text/plain,hi"), None);
        assert_eq!(origin_of("not a url"), None);
    }

    #[test]
    fn same_origin_requires_scheme_host_and_port() {
        assert!(same_origin("https://a.test/x", "https://a.test/y?z"));
        assert!(!same_origin("https://a.test/", "http://a.test/"));
        assert!(!same_origin("https://a.test/", "https://a.test:8443/"));
        assert!(!same_origin("data:,x", "data:,x"));
    }

    #[test]
    fn exact_pattern_matches_only_that_origin() {
        let pattern = OriginPattern::parse("https://extensions.turbowarp.org/").unwrap();
        assert_eq!(
            pattern,
            OriginPattern::Exact("https://extensions.turbowarp.org".to_string())
        );
        assert!(pattern.matches(&url("https://extensions.turbowarp.org/fetch.js")));
        assert!(!pattern.matches(&url("http://extensions.turbowarp.org/fetch.js")));
    }

    #[test]
    fn wildcard_pattern_matches_subdomains_over_https() {
        let pattern = OriginPattern::parse("*.turbowarp.org").unwrap();
        assert!(pattern.matches(&url("https://turbowarp.org/")));
        assert!(pattern.matches(&url("https://trampoline.turbowarp.org/api")));
        assert!(!pattern.matches(&url("https://evilturbowarp.org/")));
        assert!(!pattern.matches(&url("http://trampoline.turbowarp.org/")));
    }

    #[test]
    fn host_pattern_ignores_port() {
        let pattern = OriginPattern::parse("Localhost").unwrap();
        assert!(pattern.matches(&url("http://localhost:8000/")));
        assert!(!pattern.matches(&url("ftp://localhost/")));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(OriginPattern::parse("").is_err());
        assert!(OriginPattern::parse("*.").is_err());
        assert!(OriginPattern::parse("example.com/path").is_err());
        assert!(OriginPattern::parse("data:,x").is_err());
    }
}
