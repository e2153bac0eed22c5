//! Outbound request filtering for hosted project windows.

mod classifier;
mod headers;
mod manifest;
mod request;

pub use classifier::RequestInterceptor;
pub use headers::{CorsToggle, FixedCorsToggle, HeaderRewrite, ResponseHeaders, filter_response_headers};
pub use manifest::{AssetManifest, DirectoryManifestSource, ManifestSource, StaticManifestSource};
pub use request::{ClassificationError, InterceptedRequest, ResourceCategory, Verdict};
