//! `arbor-tui`: interactive terminal browser for one record hierarchy.
//!
//! A header bar shows the template title, icon, record count and the time
//! since the last refresh; below it an expandable tree grid shows the
//! enriched, sorted hierarchy. `r` refreshes, `e`/`c` expand or collapse
//! everything, arrows navigate.
//!
//! Logs go to a file (default `/tmp/arbor-tui.log`) so they never corrupt
//! the terminal. A background data bridge drives the hierarchy widget and
//! feeds its results into the UI action loop.

mod action;
mod app;
mod component;
mod components;
mod data_bridge;
mod event;
mod presenter;
#[cfg(test)]
mod test_support;
mod theme;
mod tui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use arbor_config::{Config, Profile};
use arbor_core::{
    BroadcastSink, DiagnosticSink, EnricherRegistry, HeaderProps, HierarchyWidget, PlatformSource,
    SourceConfig, TlsVerification, WidgetOptions,
};

use crate::app::App;
use crate::components::{HeaderBar, TreeGrid};
use crate::presenter::TuiPresenter;

/// Browse the record hierarchy around one record.
#[derive(Parser, Debug)]
#[command(name = "arbor-tui", version, about)]
struct Cli {
    /// Profile to use (defaults to the configured default profile)
    #[arg(short = 'p', long, env = "ARBOR_PROFILE")]
    profile: Option<String>,

    /// Platform base URL (overrides profile)
    #[arg(short = 'u', long, env = "ARBOR_URL")]
    url: Option<String>,

    /// Bearer token (overrides profile, env var, and keyring)
    #[arg(long, env = "ARBOR_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Record the hierarchy is built around
    #[arg(short = 'r', long, env = "ARBOR_RECORD")]
    record: Option<String>,

    /// Template name
    #[arg(short = 't', long, env = "ARBOR_TEMPLATE")]
    template: Option<String>,

    /// Identifier field of each record
    #[arg(long)]
    primary_key: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long, env = "ARBOR_INSECURE")]
    insecure: bool,

    /// Log file path
    #[arg(long, default_value = "/tmp/arbor-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Everything needed to start one widget.
#[derive(Debug)]
struct Launch {
    source: SourceConfig,
    options: WidgetOptions,
    tick: Duration,
}

/// File-based tracing. The returned guard flushes logs on drop.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("arbor_tui={level},arbor_core={level}")));

    let dir = cli
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(std::path::Path::new("/tmp"));
    let file = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("arbor-tui.log"));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    guard
}

/// Flags over profile over defaults.
fn resolve(cli: &Cli, cfg: &Config) -> Result<Launch> {
    let profile_name = cli
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into());
    let mut profile = cfg.profiles.get(&profile_name).cloned().unwrap_or_else(Profile::default);
    if let Some(url) = &cli.url {
        profile.url.clone_from(url);
    }
    if profile.url.trim().is_empty() {
        return Err(eyre!(
            "no platform URL for profile '{profile_name}': pass --url or run `arbor config init`"
        ));
    }

    let mut source = arbor_config::profile_to_source_config(&profile, &profile_name, &cfg.defaults)?;
    if let Some(token) = &cli.token {
        source.token = Some(SecretString::from(token.clone()));
    }
    if cli.insecure {
        source.tls = TlsVerification::DangerAcceptInvalid;
    }

    let mut options = profile.widget_options();
    if cli.record.is_some() {
        options.record_id.clone_from(&cli.record);
    }
    if cli.template.is_some() {
        options.template_name.clone_from(&cli.template);
    }
    if let Some(key) = &cli.primary_key {
        options.primary_key_field.clone_from(key);
    }

    let tick = profile.tick_interval(&cfg.defaults)?;
    Ok(Launch {
        source,
        options,
        tick,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tui::install_hooks()?;
    let _log_guard = setup_tracing(&cli);

    let launch = resolve(&cli, &arbor_config::load_config_or_default())?;
    info!(
        url = %launch.source.url,
        template = ?launch.options.template_name,
        record = ?launch.options.record_id,
        "starting arbor-tui"
    );

    let header = HeaderBar::new(
        HeaderProps {
            header_name: launch.options.template_name.clone().unwrap_or_else(|| "arbor".into()),
            ..HeaderProps::default()
        },
        launch.tick,
    );
    let grid = TreeGrid::new(
        launch.options.primary_key_field.clone(),
        launch.options.record_id.clone(),
    );
    let mut app = App::new(header, grid);

    let diagnostics = Arc::new(BroadcastSink::new(64));
    let fault_rx = diagnostics.subscribe();
    let widget = Arc::new(HierarchyWidget::new(
        Arc::new(PlatformSource::new(&launch.source)?),
        Arc::new(TuiPresenter::new(app.action_tx())),
        diagnostics as Arc<dyn DiagnosticSink>,
        EnricherRegistry::default(),
        launch.options,
    ));

    let cancel = CancellationToken::new();
    let bridge = tokio::spawn(data_bridge::spawn_data_bridge(
        widget,
        app.header_signals(),
        fault_rx,
        app.action_tx(),
        cancel.clone(),
    ));

    let result = app.run().await;
    cancel.cancel();
    let _ = bridge.await;
    result
}
