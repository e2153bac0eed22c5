use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;
use warden_commons::{ErrorReporter, NoopErrorReporter, origin_of};
use warden_config::InterceptConfig;
use warden_config::constants::intercept::DEVTOOLS_SCHEME_PREFIX;

use super::manifest::AssetManifest;
use super::request::{ClassificationError, InterceptedRequest, ResourceCategory, Verdict};
use crate::trust::TrustBroker;
use crate::window::WindowSession;

/// `<md5>.<ext>` anywhere in an asset URL.
static ASSET_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"(?i)[0-9a-f]{32}\.\w{3}"));

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Only ever called with literals covered by the tests below.
        Err(err) => panic!("invalid regex pattern `{pattern}`: {err}"),
    }
}

/// Ordered outbound-request rules; the first matching rule decides and
/// anything left over is denied.
pub struct RequestInterceptor {
    broker: Arc<TrustBroker>,
    manifest: Arc<AssetManifest>,
    asset_origins: Vec<String>,
    extension_origin: String,
    library_scheme: String,
    extension_scheme: String,
    allow_devtools: bool,
    reporter: Arc<dyn ErrorReporter>,
}

impl std::fmt::Debug for RequestInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("asset_origins", &self.asset_origins)
            .field("extension_origin", &self.extension_origin)
            .field("library_scheme", &self.library_scheme)
            .field("extension_scheme", &self.extension_scheme)
            .field("allow_devtools", &self.allow_devtools)
            .finish_non_exhaustive()
    }
}

impl RequestInterceptor {
    pub fn new(
        config: &InterceptConfig,
        broker: Arc<TrustBroker>,
        manifest: Arc<AssetManifest>,
    ) -> Result<Self> {
        Ok(Self {
            broker,
            manifest,
            asset_origins: config.normalized_asset_origins()?,
            extension_origin: config.normalized_extension_origin()?,
            library_scheme: config.library_scheme.clone(),
            extension_scheme: config.extension_scheme.clone(),
            allow_devtools: config.allow_devtools,
            reporter: Arc::new(NoopErrorReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn manifest(&self) -> &Arc<AssetManifest> {
        &self.manifest
    }

    /// Decide what happens to `request`. Never fails: requests that cannot be
    /// classified are reported and denied.
    pub async fn classify(&self, request: &InterceptedRequest) -> Verdict {
        let verdict = match self.evaluate(request).await {
            Ok(verdict) => verdict,
            Err(error) => {
                warn!(window = %request.window, url = %request.url, %error, "denying unclassifiable request");
                if let Err(report_error) = self.reporter.capture(&anyhow::Error::new(error)) {
                    debug!(error = %report_error, "failed to report classification error");
                }
                Verdict::Deny
            }
        };
        debug!(
            window = %request.window,
            url = %request.url,
            category = %request.resource_type,
            verdict = %verdict,
            "classified request"
        );
        verdict
    }

    async fn evaluate(&self, request: &InterceptedRequest) -> Result<Verdict, ClassificationError> {
        if self.allow_devtools && request.url.starts_with(DEVTOOLS_SCHEME_PREFIX) {
            return Ok(Verdict::Allow);
        }

        let window = self
            .broker
            .windows()
            .get(request.window)
            .ok_or(ClassificationError::UnknownWindow {
                window: request.window,
            })?;
        let category = request.category()?;
        let url = Url::parse(&request.url).map_err(|error| ClassificationError::MalformedUrl {
            url: request.url.clone(),
            reason: error.to_string(),
        })?;

        if category == ResourceCategory::MainFrame {
            return Ok(main_frame_verdict(&window, request));
        }

        let origin = origin_of(url.as_str());
        if let Some(origin) = origin.as_deref() {
            if self.asset_origins.iter().any(|asset| asset == origin)
                && let Some(md5ext) = ASSET_ID_REGEX.find(url.as_str())
            {
                // Assets missing from the manifest still load from the CDN.
                return Ok(match self.manifest.resolve(md5ext.as_str()).await {
                    Some(stored) => Verdict::Redirect(format!("{}://./{stored}", self.library_scheme)),
                    None => Verdict::Allow,
                });
            }
            if origin == self.extension_origin {
                return Ok(Verdict::Redirect(self.extension_redirect(&url)));
            }
        }

        if category.is_fetchable_subresource() {
            let allowed = self.broker.can_fetch(request.window, &request.url).await;
            return Ok(if allowed { Verdict::Allow } else { Verdict::Deny });
        }

        Ok(Verdict::Deny)
    }

    fn extension_redirect(&self, url: &Url) -> String {
        let path = url.path().trim_start_matches('/');
        match url.query() {
            Some(query) => format!("{}://./{path}?{query}", self.extension_scheme),
            None => format!("{}://./{path}", self.extension_scheme),
        }
    }
}

fn main_frame_verdict(window: &WindowSession, request: &InterceptedRequest) -> Verdict {
    if request.url == window.initial_url() {
        Verdict::Allow
    } else {
        Verdict::Deny
    }
}
