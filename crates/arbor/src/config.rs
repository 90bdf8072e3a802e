//! CLI configuration: thin wrapper around `arbor_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--url, --token, --insecure, --timeout). Flags win over the profile.

use std::time::Duration;

use clap::ValueEnum;
use secrecy::SecretString;

use arbor_core::{SourceConfig, TlsVerification, WidgetOptions};

use crate::cli::{GlobalOpts, OutputFormat, TreeArgs};
use crate::error::CliError;

pub use arbor_config::{
    Config, Profile, config_path, load_config_or_default, save_config, store_token,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Output format: flag, then `defaults.output`, then the outline.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&config.defaults.output, true).unwrap_or(OutputFormat::Tree)
    })
}

/// Build a `SourceConfig` from the active profile plus flag overrides.
///
/// Without a profile, `--url` alone is enough.
pub fn resolve_source(global: &GlobalOpts, config: &Config) -> Result<SourceConfig, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut source = match config.profiles.get(&profile_name) {
        Some(profile) => {
            let mut profile = profile.clone();
            if let Some(ref url) = global.url {
                profile.url.clone_from(url);
            }
            arbor_config::profile_to_source_config(&profile, &profile_name, &config.defaults)?
        }
        None => {
            let url_str = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            let url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
                field: "url".into(),
                reason: format!("invalid URL: {url_str}"),
            })?;
            let mut source = SourceConfig::new(url);
            source.timeout = Duration::from_secs(config.defaults.timeout);
            source
        }
    };

    if let Some(ref token) = global.token {
        source.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        source.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        source.timeout = Duration::from_secs(secs);
    }
    Ok(source)
}

/// Widget inputs: `tree` flags over the active profile.
pub fn resolve_widget_options(global: &GlobalOpts, config: &Config, args: &TreeArgs) -> WidgetOptions {
    let profile_name = active_profile_name(global, config);
    let mut options = config
        .profiles
        .get(&profile_name)
        .map(Profile::widget_options)
        .unwrap_or_default();

    if let Some(ref record) = args.record {
        options.record_id = Some(record.clone());
    }
    if let Some(ref template) = args.template {
        options.template_name = Some(template.clone());
    }
    if let Some(ref key) = args.primary_key {
        options.primary_key_field.clone_from(key);
    }
    options
}
