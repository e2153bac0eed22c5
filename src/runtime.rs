use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::debug;
use warden_commons::{ErrorReporter, NoopErrorReporter, NoopTelemetry, TelemetrySink};
use warden_config::WardenConfig;
use warden_core::atomic_write::{AtomicWriteSession, AtomicWriter, WriteFailure, WriteLockRegistry};
use warden_core::intercept::{
    AssetManifest, CorsToggle, DirectoryManifestSource, FixedCorsToggle, HeaderRewrite,
    InterceptedRequest, RequestInterceptor, Verdict, filter_response_headers,
};
use warden_core::trust::{
    AssumeMediaAccess, Capability, MediaAccess, Permission, PermissionDetails, PermissionPolicy,
    PromptContext, SecurityPrompter, TrustBroker, TrustEvent,
};
use warden_core::window::{WindowId, WindowRegistry, WindowSession};

/// The wired-up broker: one per process.
pub struct Warden {
    config: WardenConfig,
    writer: AtomicWriter,
    windows: Arc<WindowRegistry>,
    broker: Arc<TrustBroker>,
    interceptor: RequestInterceptor,
    permissions: PermissionPolicy,
    cors: Arc<dyn CorsToggle>,
}

impl std::fmt::Debug for Warden {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warden")
            .field("windows", &self.windows.len())
            .field("broker", &self.broker)
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

impl Warden {
    /// Build with default collaborators: no telemetry, no error reporting,
    /// media access assumed, CORS relaxation off.
    pub fn new(config: WardenConfig, prompter: Arc<dyn SecurityPrompter>) -> Result<Self> {
        WardenBuilder::new(config, prompter).build()
    }

    pub fn builder(config: WardenConfig, prompter: Arc<dyn SecurityPrompter>) -> WardenBuilder {
        WardenBuilder::new(config, prompter)
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn writer(&self) -> &AtomicWriter {
        &self.writer
    }

    pub fn broker(&self) -> &Arc<TrustBroker> {
        &self.broker
    }

    pub fn windows(&self) -> &Arc<WindowRegistry> {
        &self.windows
    }

    pub async fn write_file_atomic(
        &self,
        path: impl AsRef<Path>,
        data: impl Into<Bytes>,
    ) -> Result<(), WriteFailure> {
        self.writer.write_file(path, data).await
    }

    pub async fn open_write_session(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<AtomicWriteSession, WriteFailure> {
        self.writer.open(path).await
    }

    pub fn open_window(&self, initial_url: impl Into<String>) -> Arc<WindowSession> {
        self.windows.open(initial_url)
    }

    /// Tear down a window; its pending prompts resolve to deny.
    pub fn destroy_window(&self, window: WindowId) -> bool {
        self.windows.destroy(window)
    }

    pub async fn request_capability(
        &self,
        window: WindowId,
        capability: Capability,
        context: &PromptContext,
    ) -> bool {
        self.broker.request_capability(window, capability, context).await
    }

    pub async fn can_fetch(&self, window: WindowId, url: &str) -> bool {
        self.broker.can_fetch(window, url).await
    }

    pub async fn classify(&self, request: &InterceptedRequest) -> Verdict {
        self.interceptor.classify(request).await
    }

    pub fn filter_response_headers(&self, headers: &[(String, String)]) -> HeaderRewrite {
        filter_response_headers(self.cors.as_ref(), headers)
    }

    pub fn check_permission(
        &self,
        window: WindowId,
        permission: &Permission,
        details: &PermissionDetails,
    ) -> bool {
        self.permissions.check(window, permission, details)
    }

    pub async fn request_permission(
        &self,
        window: WindowId,
        permission: &Permission,
        details: &PermissionDetails,
    ) -> bool {
        self.permissions.request(window, permission, details).await
    }
}

/// Optional collaborators for [`Warden`].
pub struct WardenBuilder {
    config: WardenConfig,
    prompter: Arc<dyn SecurityPrompter>,
    registry: Option<Arc<WriteLockRegistry>>,
    manifest: Option<Arc<AssetManifest>>,
    telemetry: Arc<dyn TelemetrySink<TrustEvent>>,
    reporter: Arc<dyn ErrorReporter>,
    media: Arc<dyn MediaAccess>,
    cors: Arc<dyn CorsToggle>,
}

impl WardenBuilder {
    pub fn new(config: WardenConfig, prompter: Arc<dyn SecurityPrompter>) -> Self {
        Self {
            config,
            prompter,
            registry: None,
            manifest: None,
            telemetry: Arc::new(NoopTelemetry),
            reporter: Arc::new(NoopErrorReporter),
            media: Arc::new(AssumeMediaAccess),
            cors: Arc::new(FixedCorsToggle::default()),
        }
    }

    /// Use a private lock registry instead of the process-wide one.
    pub fn write_lock_registry(mut self, registry: Arc<WriteLockRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override the manifest derived from `intercept.library_dir`.
    pub fn asset_manifest(mut self, manifest: Arc<AssetManifest>) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink<TrustEvent>>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn media_access(mut self, media: Arc<dyn MediaAccess>) -> Self {
        self.media = media;
        self
    }

    /// Usually the settings store.
    pub fn cors_toggle(mut self, cors: Arc<dyn CorsToggle>) -> Self {
        self.cors = cors;
        self
    }

    pub fn build(self) -> Result<Warden> {
        self.config.validate().context("invalid warden configuration")?;

        let writer = match self.registry {
            Some(registry) => AtomicWriter::with_registry(&self.config.atomic_write, registry),
            None => AtomicWriter::new(&self.config.atomic_write),
        };

        let windows = Arc::new(WindowRegistry::new());
        let broker = Arc::new(
            TrustBroker::new(&self.config.trust, Arc::clone(&windows), self.prompter)
                .context("failed to build trust broker")?
                .with_telemetry(self.telemetry),
        );

        let manifest = self.manifest.unwrap_or_else(|| {
            Arc::new(match &self.config.intercept.library_dir {
                Some(dir) => AssetManifest::new(Arc::new(DirectoryManifestSource::new(dir))),
                None => AssetManifest::empty(),
            })
        });
        let interceptor =
            RequestInterceptor::new(&self.config.intercept, Arc::clone(&broker), manifest)
                .context("failed to build request interceptor")?
                .with_reporter(self.reporter);
        let permissions = PermissionPolicy::new(Arc::clone(&broker), self.media);

        debug!(
            atomic = writer.options().atomic,
            prompts_enabled = self.config.trust.prompts_enabled,
            library_dir = ?self.config.intercept.library_dir,
            "warden initialized"
        );

        Ok(Warden {
            config: self.config,
            writer,
            windows,
            broker,
            interceptor,
            permissions,
            cors: self.cors,
        })
    }
}
