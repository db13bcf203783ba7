//! Submission configuration and statistics-service credential resolution.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolleyError};

/// Default number of items per metadata batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default cap on concurrently executing icon uploads.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Environment variable holding the statistics service endpoint.
pub const ENDPOINT_ENV_VAR: &str = "VOLLEY_STATISTICS_ENDPOINT";

/// Environment variable holding the statistics service bearer token.
pub const TOKEN_ENV_VAR: &str = "VOLLEY_STATISTICS_TOKEN";

/// How the upload result relates to the submission result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// The upload outcome is the submission outcome.
    #[default]
    Authoritative,
    /// Upload failures are logged and swallowed; the archive collaborator decides the outcome.
    BestEffort,
}

/// Configuration for a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    /// Maximum number of items per metadata POST
    pub batch_size: usize,

    /// Maximum number of icon uploads executing at once
    pub concurrency: usize,

    /// Whether uploads are authoritative or best-effort telemetry
    pub mode: UploadMode,

    /// Language tag sent as `languageCode`; derived from the process locale when unset
    pub language_code: Option<String>,

    /// Per-call HTTP timeouts
    pub transport: TransportConfig,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            mode: UploadMode::Authoritative,
            language_code: None,
            transport: TransportConfig::default(),
        }
    }
}

impl SubmitConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(VolleyError::Validation(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(VolleyError::Validation(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The `languageCode` to send: the configured override or the process locale's language.
    pub fn resolved_language_code(&self) -> String {
        match &self.language_code {
            Some(code) if !code.trim().is_empty() => code.trim().to_string(),
            _ => process_language(),
        }
    }
}

/// Fixed timeouts enforced on every HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 30_000,
            read_timeout_ms: 60_000,
            write_timeout_ms: 60_000,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Upper bound on one whole call: connect, then send the body, then read the response.
    pub fn request_timeout(&self) -> Duration {
        self.connect_timeout() + self.write_timeout() + self.read_timeout()
    }
}

/// Language subtag of a POSIX locale string such as `en_US.UTF-8` or `pt-BR`.
///
/// `C`, `POSIX` and empty locales map to `en`.
pub fn language_from_locale(locale: &str) -> String {
    let language = locale
        .split(['_', '-', '.', '@'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match language.as_str() {
        "" | "c" | "posix" => "en".to_string(),
        _ => language,
    }
}

/// Language of the current process locale, from `LC_ALL`, `LC_MESSAGES` then `LANG`.
pub fn process_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .map(|locale| language_from_locale(&locale))
        .unwrap_or_else(|| "en".to_string())
}

// ============================================================================
// Credential sources
// ============================================================================

/// A place the statistics service endpoint and token can be read from.
///
/// Sources are layered: [`ServiceSettings::resolve`] consults a primary store first and
/// falls back to an application-wide one per field.
pub trait ConfigSource: Send + Sync {
    fn statistics_endpoint(&self) -> Option<String>;

    fn statistics_token(&self) -> Option<String>;
}

/// Fixed values, typically deserialized from an application config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

impl StaticConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            token: Some(token.into()),
        }
    }
}

impl ConfigSource for StaticConfig {
    fn statistics_endpoint(&self) -> Option<String> {
        self.endpoint.clone()
    }

    fn statistics_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Values captured from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    vars: HashMap<String, String>,
}

impl EnvConfig {
    /// Snapshot the relevant variables of the current process.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::vars().filter(|(key, _)| key == ENDPOINT_ENV_VAR || key == TOKEN_ENV_VAR),
        )
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl ConfigSource for EnvConfig {
    fn statistics_endpoint(&self) -> Option<String> {
        self.vars.get(ENDPOINT_ENV_VAR).cloned()
    }

    fn statistics_token(&self) -> Option<String> {
        self.vars.get(TOKEN_ENV_VAR).cloned()
    }
}

/// Endpoint and bearer token resolved for one submission.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub token: String,
}

// Keep the token out of logs.
impl std::fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ServiceSettings {
    /// Resolve settings from `primary`, falling back to `fallback` for any empty field.
    ///
    /// The token is checked before the endpoint.
    pub fn resolve(primary: &dyn ConfigSource, fallback: &dyn ConfigSource) -> Result<Self> {
        let endpoint = first_non_empty(primary.statistics_endpoint(), || {
            fallback.statistics_endpoint()
        });
        let token = first_non_empty(primary.statistics_token(), || fallback.statistics_token());

        let token = token.ok_or(VolleyError::TokenNotConfigured)?;
        let endpoint = endpoint.ok_or(VolleyError::EndpointNotConfigured)?;

        Ok(Self { endpoint, token })
    }

    /// `{endpoint}{path}` for a service route such as `/app-info/create`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

fn first_non_empty(
    primary: Option<String>,
    fallback: impl FnOnce() -> Option<String>,
) -> Option<String> {
    primary
        .filter(|value| !value.is_empty())
        .or_else(fallback)
        .filter(|value| !value.is_empty())
}
