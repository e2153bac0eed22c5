//! Rule order of the outbound request filter.

use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use warden_commons::MemoryErrorReporter;
use warden_config::{InterceptConfig, TrustConfig};
use warden_core::intercept::{
    AssetManifest, InterceptedRequest, RequestInterceptor, ResourceCategory, StaticManifestSource,
    Verdict,
};
use warden_core::trust::{SecurityPrompt, SecurityPrompter, TrustBroker};
use warden_core::window::{WindowId, WindowRegistry};

const CACHED_ASSET: &str = "0123456789abcdef0123456789abcdef.svg";
const EDITOR_URL: &str = "tw-editor://./gui/editor?project=1";

/// Grants fetches to `allowed.test` only.
struct HostPrompter;

#[async_trait]
impl SecurityPrompter for HostPrompter {
    async fn prompt(&self, prompt: &SecurityPrompt) -> bool {
        prompt.capability.origin() == Some("https://allowed.test")
    }
}

struct Fixture {
    interceptor: RequestInterceptor,
    reporter: Arc<MemoryErrorReporter>,
    window: WindowId,
}

fn fixture(config: InterceptConfig) -> Fixture {
    let broker = Arc::new(
        TrustBroker::new(
            &TrustConfig::default(),
            Arc::new(WindowRegistry::new()),
            Arc::new(HostPrompter),
        )
        .expect("trust config"),
    );
    let window = broker.windows().open(EDITOR_URL).id();
    let manifest = Arc::new(AssetManifest::new(Arc::new(StaticManifestSource::new([
        CACHED_ASSET,
    ]))));
    let reporter = Arc::new(MemoryErrorReporter::new());
    let interceptor = RequestInterceptor::new(&config, broker, manifest)
        .expect("intercept config")
        .with_reporter(reporter.clone());
    Fixture {
        interceptor,
        reporter,
        window,
    }
}

impl Fixture {
    async fn classify(&self, url: &str, category: ResourceCategory) -> Verdict {
        self.interceptor
            .classify(&InterceptedRequest::new(self.window, url, category))
            .await
    }
}

#[tokio::test]
async fn main_frame_is_pinned_to_the_initial_url() {
    let f = fixture(InterceptConfig::default());
    assert_eq!(f.classify(EDITOR_URL, ResourceCategory::MainFrame).await, Verdict::Allow);
    assert_eq!(
        f.classify("tw-editor://./gui/editor?project=2", ResourceCategory::MainFrame)
            .await,
        Verdict::Deny
    );
    assert_eq!(
        f.classify("https://allowed.test/", ResourceCategory::MainFrame).await,
        Verdict::Deny
    );
}

#[tokio::test]
async fn cached_assets_redirect_and_misses_fall_through() {
    let f = fixture(InterceptConfig::default());

    let hit = format!("https://assets.scratch.mit.edu/{CACHED_ASSET}");
    assert_eq!(
        f.classify(&hit, ResourceCategory::Image).await,
        Verdict::Redirect(format!("tw-library://./{CACHED_ASSET}"))
    );

    let upper = "https://cdn.assets.scratch.mit.edu/internalapi/asset/0123456789ABCDEF0123456789ABCDEF.svg/get/";
    assert_eq!(
        f.classify(upper, ResourceCategory::Xhr).await,
        Verdict::Redirect(format!("tw-library://./{CACHED_ASSET}")),
        "redirect names the cached file, not the request's spelling"
    );

    let miss = "https://assets.scratch.mit.edu/ffffffffffffffffffffffffffffffff.png";
    assert_eq!(f.classify(miss, ResourceCategory::Image).await, Verdict::Allow);
    assert!(f.interceptor.manifest().is_loaded());
}

#[tokio::test]
async fn asset_hosts_without_an_asset_id_follow_the_remaining_rules() {
    let f = fixture(InterceptConfig::default());
    for (url, category) in [
        ("https://assets.scratch.mit.edu/evil.html", ResourceCategory::SubFrame),
        ("https://assets.scratch.mit.edu/evil.swf", ResourceCategory::Object),
        ("https://assets.scratch.mit.edu/track", ResourceCategory::Other),
        ("https://cdn.assets.scratch.mit.edu/x.js", ResourceCategory::Script),
    ] {
        assert_eq!(
            f.classify(url, category).await,
            Verdict::Deny,
            "{category} {url} must not be allowed by the asset rule"
        );
    }
}

#[tokio::test]
async fn configured_asset_origins_replace_the_defaults() {
    let config = InterceptConfig {
        asset_origins: vec!["https://mirror.test".to_string()],
        ..InterceptConfig::default()
    };
    let f = fixture(config);
    assert_eq!(
        f.classify(&format!("https://mirror.test/{CACHED_ASSET}"), ResourceCategory::Image)
            .await,
        Verdict::Redirect(format!("tw-library://./{CACHED_ASSET}"))
    );
    assert_eq!(
        f.classify(
            &format!("https://assets.scratch.mit.edu/{CACHED_ASSET}"),
            ResourceCategory::Image
        )
        .await,
        Verdict::Deny,
        "no longer an asset origin, so fetch trust decides"
    );
}

#[tokio::test]
async fn extension_library_is_served_offline() {
    let f = fixture(InterceptConfig::default());
    assert_eq!(
        f.classify(
            "https://extensions.turbowarp.org/Lily/Assets.js?v=2",
            ResourceCategory::Script
        )
        .await,
        Verdict::Redirect("tw-extensions://./Lily/Assets.js?v=2".to_string())
    );
    assert_eq!(
        f.classify("https://extensions.turbowarp.org/", ResourceCategory::SubFrame)
            .await,
        Verdict::Redirect("tw-extensions://./".to_string())
    );
}

#[tokio::test]
async fn subresources_follow_fetch_trust() {
    let f = fixture(InterceptConfig::default());
    assert_eq!(
        f.classify("https://allowed.test/style.css", ResourceCategory::Stylesheet)
            .await,
        Verdict::Allow
    );
    assert_eq!(
        f.classify("wss://blocked.test/socket", ResourceCategory::WebSocket)
            .await,
        Verdict::Deny
    );
}

#[tokio::test]
async fn unlisted_categories_are_denied() {
    let f = fixture(InterceptConfig::default());
    for category in [
        ResourceCategory::SubFrame,
        ResourceCategory::Object,
        ResourceCategory::CspReport,
        ResourceCategory::Other,
    ] {
        assert_eq!(
            f.classify("https://allowed.test/frame", category).await,
            Verdict::Deny,
            "{category} must be denied"
        );
    }
}

#[tokio::test]
async fn unclassifiable_requests_fail_closed_and_are_reported() {
    let f = fixture(InterceptConfig::default());

    let unknown_category = InterceptedRequest::from_raw(f.window, "https://allowed.test/", "beacon");
    assert_eq!(f.interceptor.classify(&unknown_category).await, Verdict::Deny);

    let malformed = InterceptedRequest::from_raw(f.window, "::not a url::", "xhr");
    assert_eq!(f.interceptor.classify(&malformed).await, Verdict::Deny);

    let stranger = InterceptedRequest::new(WindowId::new(777), EDITOR_URL, ResourceCategory::MainFrame);
    assert_eq!(f.interceptor.classify(&stranger).await, Verdict::Deny);

    let messages = f.reporter.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().any(|m| m.contains("beacon")));
    assert!(messages.iter().any(|m| m.contains("::not a url::")));
    assert!(messages.iter().any(|m| m.contains("unknown window-777")));
}

#[tokio::test]
async fn devtools_requests_follow_the_config_switch() {
    let devtools = "devtools://devtools/bundled/inspector.html";
    let open = fixture(InterceptConfig::default());
    assert_eq!(open.classify(devtools, ResourceCategory::MainFrame).await, Verdict::Allow);

    let closed = fixture(InterceptConfig {
        allow_devtools: false,
        ..InterceptConfig::default()
    });
    assert_eq!(closed.classify(devtools, ResourceCategory::MainFrame).await, Verdict::Deny);
}
