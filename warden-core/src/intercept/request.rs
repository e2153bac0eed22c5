use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::window::WindowId;

/// Resource type of an outbound request, named as the browser engine names
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xhr,
    Ping,
    CspReport,
    Media,
    WebSocket,
    Other,
}

impl ResourceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MainFrame => "mainFrame",
            Self::SubFrame => "subFrame",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Object => "object",
            Self::Xhr => "xhr",
            Self::Ping => "ping",
            Self::CspReport => "cspReport",
            Self::Media => "media",
            Self::WebSocket => "webSocket",
            Self::Other => "other",
        }
    }

    /// Sub-resources whose loading is decided by fetch trust.
    pub fn is_fetchable_subresource(self) -> bool {
        matches!(
            self,
            Self::Stylesheet
                | Self::Script
                | Self::Image
                | Self::Font
                | Self::Xhr
                | Self::Media
                | Self::WebSocket
                | Self::Ping
        )
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceCategory {
    type Err = ClassificationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let category = match raw {
            "mainFrame" => Self::MainFrame,
            "subFrame" => Self::SubFrame,
            "stylesheet" => Self::Stylesheet,
            "script" => Self::Script,
            "image" => Self::Image,
            "font" => Self::Font,
            "object" => Self::Object,
            "xhr" => Self::Xhr,
            "ping" => Self::Ping,
            "cspReport" => Self::CspReport,
            "media" => Self::Media,
            "webSocket" => Self::WebSocket,
            "other" => Self::Other,
            unknown => {
                return Err(ClassificationError::UnknownCategory {
                    category: unknown.to_string(),
                });
            }
        };
        Ok(category)
    }
}

/// An outbound request as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub window: WindowId,
    pub url: String,
    /// Raw resource type. Unknown values are denied.
    pub resource_type: String,
}

impl InterceptedRequest {
    pub fn new(window: WindowId, url: impl Into<String>, category: ResourceCategory) -> Self {
        Self {
            window,
            url: url.into(),
            resource_type: category.as_str().to_string(),
        }
    }

    pub fn from_raw(
        window: WindowId,
        url: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            window,
            url: url.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn category(&self) -> Result<ResourceCategory, ClassificationError> {
        self.resource_type.parse()
    }
}

/// Outcome of classifying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Serve the request from this URL instead.
    Redirect(String),
    Deny,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Deny)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Redirect(target) => write!(f, "redirect {target}"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// A request that could not be classified. Always mapped to [`Verdict::Deny`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("malformed request url `{url}`: {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("unexpected resource category `{category}`")]
    UnknownCategory { category: String },

    #[error("request from unknown {window}")]
    UnknownWindow { window: WindowId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_parse_engine_names() {
        assert_eq!("webSocket".parse(), Ok(ResourceCategory::WebSocket));
        assert_eq!("cspReport".parse(), Ok(ResourceCategory::CspReport));
        assert!(ResourceCategory::Ping.is_fetchable_subresource());
        assert!(!ResourceCategory::SubFrame.is_fetchable_subresource());
        assert!(!ResourceCategory::Other.is_fetchable_subresource());

        let request = InterceptedRequest::from_raw(WindowId::new(1), "https://x.test/", "beacon");
        assert_eq!(
            request.category(),
            Err(ClassificationError::UnknownCategory {
                category: "beacon".to_string()
            })
        );
    }
}
