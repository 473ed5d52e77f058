// wpa-net/src/lib.rs
pub mod http;
pub mod registry;
pub mod retry;
pub mod validation;

pub use http::{build_http_client, HttpFetcher};
pub use registry::WordPressOrgRegistry;
pub use retry::{with_retries, RetryPolicy};
pub use validation::{validate_url, verify_zip_content};
