//! Provider abstraction for the remote history archive service.
//!
//! [`ArchiveSource`] is the seam between the fetcher and the network: one
//! call per (identifier, year) returning either the raw archive bytes, a
//! "no data" signal, or a rate-limit signal. [`HistoryClient`] is the real
//! HTTP implementation; tests substitute in-memory sources.

pub mod decode;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::{MissingEnvVarError, get_env_var};
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::debug;

use crate::models::identifier::InstrumentId;

/// Environment variable holding the provider bearer token.
pub const TOKEN_ENV_VAR: &str = "HISTORY_API_TOKEN";

/// Errors that can occur during the creation of a provider client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderInitError {
    /// The token environment variable is not set.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// Failed to build the HTTP client.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors from an [`ArchiveSource`] implementation or the retry loop above it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    /// The HTTP request itself failed (network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Request {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider returned an unexpected status code.
    #[snafu(display("API error (status {status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// Rate-limit retries were exhausted for one (identifier, year) pair.
    #[snafu(display("rate limit still hit after {attempts} retries"))]
    RateLimitExhausted { attempts: u32, backtrace: Backtrace },

    /// The response body is not a readable zip archive.
    #[snafu(display("Bad archive: {source}"))]
    BadArchive {
        source: zip::result::ZipError,
        backtrace: Backtrace,
    },
}

/// Outcome of fetching one (identifier, year) archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The archive bytes as returned by the provider.
    Archive(Vec<u8>),
    /// The provider has no data for this identifier and year. Not an error.
    NoData,
    /// The provider asked us to back off; the caller decides retry policy.
    RateLimited,
}

/// A source of per-year history archives.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch_year(&self, id: &InstrumentId, year: i32)
    -> Result<FetchOutcome, ProviderError>;
}

/// HTTP implementation of [`ArchiveSource`].
///
/// Sends `GET {endpoint}?figi={id}&year={year}&interval=1min` with a bearer
/// token, paced by an in-process rate limiter so that batch fetches do not
/// trip the provider's quota on their own.
pub struct HistoryClient {
    client: Client,
    endpoint: String,
    token: SecretString,
    limiter: DefaultDirectRateLimiter,
}

impl HistoryClient {
    /// Creates a client reading the bearer token from [`TOKEN_ENV_VAR`].
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProviderInitError> {
        let token = SecretString::new(get_env_var(TOKEN_ENV_VAR).context(MissingEnvVarSnafu)?.into());
        Self::with_token(endpoint, token)
    }

    /// Creates a client with an explicit token.
    pub fn with_token(
        endpoint: impl Into<String>,
        token: SecretString,
    ) -> Result<Self, ProviderInitError> {
        let client = Client::builder().build().context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
            // Two requests per second keeps a full batch under the provider's
            // documented quota.
            limiter: RateLimiter::direct(Quota::per_second(nonzero!(2u32))),
        })
    }
}

#[async_trait]
impl ArchiveSource for HistoryClient {
    async fn fetch_year(
        &self,
        id: &InstrumentId,
        year: i32,
    ) -> Result<FetchOutcome, ProviderError> {
        self.limiter.until_ready().await;
        debug!(%id, year, "requesting archive");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("figi", id.as_str()),
                ("year", &year.to_string()),
                ("interval", "1min"),
            ])
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .context(RequestSnafu)?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await.context(RequestSnafu)?;
                Ok(FetchOutcome::Archive(bytes.to_vec()))
            }
            StatusCode::NOT_FOUND => Ok(FetchOutcome::NoData),
            StatusCode::TOO_MANY_REQUESTS => Ok(FetchOutcome::RateLimited),
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown API error".to_string());
                ApiSnafu {
                    status: status.as_u16(),
                    message,
                }
                .fail()
            }
        }
    }
}
