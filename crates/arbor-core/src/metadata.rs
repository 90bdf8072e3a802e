// ── Template metadata loader ──
//
// Loads the named template once and publishes it on a watch channel.
// A name is attempted at most once in a row: asking for the same name
// again is a no-op whether the previous attempt succeeded or not. A
// failed load keeps whatever config was published before.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::convert::parse_template;
use crate::diagnostics::DiagnosticSink;
use crate::enrich::EnricherRegistry;
use crate::error::CoreError;
use crate::model::HierarchyConfig;
use crate::source::HierarchySource;

/// Result of a [`MetadataLoader::load`] call.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Blank or absent name; nothing attempted.
    Skipped,
    /// Same name as the last request; nothing attempted.
    Unchanged,
    /// A newer request for a different name finished first.
    Superseded,
    /// Parsed and published.
    Loaded(Arc<HierarchyConfig>),
}

pub struct MetadataLoader<S> {
    source: Arc<S>,
    registry: EnricherRegistry,
    sink: Arc<dyn DiagnosticSink>,
    requested: Mutex<Option<String>>,
    config_tx: watch::Sender<Option<Arc<HierarchyConfig>>>,
}

impl<S: HierarchySource> MetadataLoader<S> {
    pub fn new(source: Arc<S>, registry: EnricherRegistry, sink: Arc<dyn DiagnosticSink>) -> Self {
        let (config_tx, _) = watch::channel(None);
        Self {
            source,
            registry,
            sink,
            requested: Mutex::new(None),
            config_tx,
        }
    }

    /// The last successfully loaded config.
    pub fn current(&self) -> Option<Arc<HierarchyConfig>> {
        self.config_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<HierarchyConfig>>> {
        self.config_tx.subscribe()
    }

    /// Load the template named `name` (trimmed).
    ///
    /// Failures are reported to the sink as `ConfigLoadFailed` and
    /// returned; they are not retried until the name changes.
    pub async fn load(&self, name: Option<&str>) -> Result<LoadOutcome, CoreError> {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            debug!("no template name, skipping load");
            return Ok(LoadOutcome::Skipped);
        };

        {
            let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
            if requested.as_deref() == Some(name) {
                debug!(template = name, "template unchanged, not reloading");
                return Ok(LoadOutcome::Unchanged);
            }
            *requested = Some(name.to_owned());
        }

        info!(template = name, "loading template");
        let parsed = match self.source.fetch_template(name).await {
            Ok(record) => parse_template(name, record, &self.registry),
            Err(e) => Err(e),
        }
        .map_err(|e| match e {
            err @ CoreError::ConfigLoadFailed { .. } => err,
            other => CoreError::ConfigLoadFailed {
                template: name.to_owned(),
                reason: other.to_string(),
            },
        });

        let config = match parsed {
            Ok(config) => Arc::new(config),
            Err(err) => {
                self.sink.report(&err);
                return Err(err);
            }
        };

        if !self.is_requested(name) {
            debug!(template = name, "template load superseded");
            return Ok(LoadOutcome::Superseded);
        }

        debug!(
            template = name,
            columns = config.columns.len(),
            fields = config.fields_to_query.len(),
            "template loaded"
        );
        self.config_tx.send_replace(Some(Arc::clone(&config)));
        Ok(LoadOutcome::Loaded(config))
    }

    fn is_requested(&self, name: &str) -> bool {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            == Some(name)
    }
}
