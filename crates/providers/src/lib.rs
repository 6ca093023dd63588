//! Text generation backends for fewshot.
//!
//! All providers implement the `fewshot_core::Provider` trait.
//! The router selects the correct provider from the configured model name.

pub mod cohere;
#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod pricing;
pub mod router;

pub use cohere::CohereProvider;
#[cfg(feature = "local")]
pub use local::LocalProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use pricing::{ModelPricing, PricingTable};
pub use router::{Backend, ResolvedModel, build_from_config, resolve_model};

use fewshot_core::error::ProviderError;

/// HTTP client shared by the hosted providers.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a non-200 API status to a provider error.
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(body),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(429, String::new()),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            status_error(401, "bad key".into()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(500, "boom".into()),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }
}
