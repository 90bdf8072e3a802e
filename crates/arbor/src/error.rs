//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use arbor_config::ConfigError;
use arbor_core::{CoreError, RuleError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the platform at {url}: {reason}")]
    #[diagnostic(
        code(arbor::connection_failed),
        help(
            "Check the URL and your network connection.\n\
             URL: {url}\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(arbor::timeout),
        help("Increase the timeout with --timeout or in your profile.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(arbor::auth_failed),
        help(
            "Verify the access token for profile '{profile}'.\n\
             Run: arbor config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    // ── Hierarchy ────────────────────────────────────────────────────
    #[error("Template '{template}' could not be loaded: {reason}")]
    #[diagnostic(
        code(arbor::template),
        help("Check the name, then inspect it with: arbor template show {template}")
    )]
    Template { template: String, reason: String },

    #[error("No template selected")]
    #[diagnostic(
        code(arbor::no_template),
        help("Pass --template <name> or set `template` in your profile.")
    )]
    NoTemplate,

    #[error("Invalid hierarchy query: {reason}")]
    #[diagnostic(
        code(arbor::invalid_query),
        help("Pass --record <id> or set `record_id` in your profile.")
    )]
    InvalidQuery { reason: String },

    #[error("Invalid enrichment rule: {message}")]
    #[diagnostic(code(arbor::rule))]
    Rule { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Platform error{}: {message}", http_status(.status.as_ref()))]
    #[diagnostic(code(arbor::api_error))]
    Api { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(arbor::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(arbor::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: arbor config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No platform configured")]
    #[diagnostic(
        code(arbor::no_config),
        help(
            "Create a profile with: arbor config init\n\
             Or pass --url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(arbor::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {0}")]
    #[diagnostic(code(arbor::keyring))]
    Keyring(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(arbor::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render output: {0}")]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn http_status(status: Option<&u16>) -> String {
    status.map_or_else(String::new, |s| format!(" (HTTP {s})"))
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Template { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::NoTemplate
            | Self::InvalidQuery { .. }
            | Self::Rule { .. }
            | Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Name the profile in authentication help text.
    pub fn with_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: profile.to_owned(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Api { message, status } => CliError::Api { message, status },
            CoreError::ConfigLoadFailed { template, reason } => {
                CliError::Template { template, reason }
            }
            CoreError::InvalidQueryParams { reason } => CliError::InvalidQuery { reason },
            // Surface what actually went wrong underneath the fetch.
            CoreError::FetchFailed { cause } => CliError::from(*cause),
            CoreError::RuleSyntax { message } => CliError::Rule { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other @ (CoreError::EnrichmentFailed { .. }
            | CoreError::SortFieldMissing { .. }
            | CoreError::MalformedHierarchy(_)
            | CoreError::Internal(_)) => CliError::Internal(other.to_string()),
        }
    }
}

impl From<RuleError> for CliError {
    fn from(err: RuleError) -> Self {
        CliError::Rule {
            message: err.to_string(),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Keyring(message) => CliError::Keyring(message),
            ConfigError::Serialization(e) => CliError::Render(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
