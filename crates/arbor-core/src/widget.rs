// ── Hierarchy widget ──
//
// Owns one widget instance's loader and coordinator and walks it through
// LoadingConfig -> Fetching -> Assembling -> Ready (or Failed). The
// config must resolve before any fetch; a template-name change reloads
// the config and starts a fresh fetch, a refresh signal repeats the
// cached query.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::diagnostics::DiagnosticSink;
use crate::enrich::EnricherRegistry;
use crate::error::CoreError;
use crate::header::RefreshSignal;
use crate::metadata::{LoadOutcome, MetadataLoader};
use crate::model::{DEFAULT_PRIMARY_KEY, HierarchyConfig, TreeSnapshot};
use crate::refresh::{PresentationSink, RefreshCoordinator, RefreshOutcome, WidgetPhase};
use crate::source::HierarchySource;

/// Caller-set inputs of one widget instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOptions {
    /// Record the hierarchy is built around.
    pub record_id: Option<String>,
    /// Field holding each record's identifier.
    pub primary_key_field: String,
    pub template_name: Option<String>,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            record_id: None,
            primary_key_field: DEFAULT_PRIMARY_KEY.to_owned(),
            template_name: None,
        }
    }
}

pub struct HierarchyWidget<S, P> {
    options: WidgetOptions,
    loader: MetadataLoader<S>,
    coordinator: RefreshCoordinator<S, P>,
}

impl<S: HierarchySource, P: PresentationSink> HierarchyWidget<S, P> {
    pub fn new(
        source: Arc<S>,
        presenter: Arc<P>,
        sink: Arc<dyn DiagnosticSink>,
        registry: EnricherRegistry,
        options: WidgetOptions,
    ) -> Self {
        let loader = MetadataLoader::new(Arc::clone(&source), registry, Arc::clone(&sink));
        let coordinator =
            RefreshCoordinator::new(source, presenter, sink, options.primary_key_field.clone());
        Self {
            options,
            loader,
            coordinator,
        }
    }

    pub fn options(&self) -> &WidgetOptions {
        &self.options
    }

    pub fn config(&self) -> Option<Arc<HierarchyConfig>> {
        self.loader.current()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<S, P> {
        &self.coordinator
    }

    pub fn phase(&self) -> WidgetPhase {
        self.coordinator.phase()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<WidgetPhase> {
        self.coordinator.subscribe_phase()
    }

    pub fn subscribe_config(&self) -> watch::Receiver<Option<Arc<HierarchyConfig>>> {
        self.loader.subscribe()
    }

    pub fn snapshot(&self) -> Option<Arc<TreeSnapshot>> {
        self.coordinator.snapshot()
    }

    /// Load the configured template, then run the first fetch.
    pub async fn start(&self) -> Result<RefreshOutcome, CoreError> {
        info!(
            template = ?self.options.template_name,
            record = ?self.options.record_id,
            "starting hierarchy widget"
        );
        self.apply_template(self.options.template_name.as_deref())
            .await
    }

    /// Switch templates. Only a different name triggers a reload.
    pub async fn set_template_name(&self, name: &str) -> Result<RefreshOutcome, CoreError> {
        self.apply_template(Some(name)).await
    }

    /// Repeat the last fetch with the current config.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(config) = self.loader.current() else {
            debug!("refresh ignored, no template loaded");
            return RefreshOutcome::Skipped;
        };
        if self.coordinator.fetcher().cached_query().is_some() {
            self.coordinator.refresh(config).await
        } else {
            let params = config.query_params(self.options.record_id.as_deref());
            self.coordinator.load(config, &params).await
        }
    }

    /// Refresh on every `RefreshSignal { refresh: true }` until the
    /// sending side is gone.
    pub async fn listen(&self, mut signals: broadcast::Receiver<RefreshSignal>) {
        loop {
            match signals.recv().await {
                Ok(RefreshSignal { refresh: true }) => {
                    let _ = self.refresh().await;
                }
                Ok(RefreshSignal { refresh: false }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "refresh signals lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Icon to show beside `record_id`: the template's record icon for the
    /// widget's own record, empty for every other row.
    pub fn dynamic_icon(&self, record_id: &str) -> String {
        if self.options.record_id.as_deref() != Some(record_id) {
            return String::new();
        }
        self.loader
            .current()
            .and_then(|c| c.record_icon.clone())
            .unwrap_or_default()
    }

    async fn apply_template(&self, name: Option<&str>) -> Result<RefreshOutcome, CoreError> {
        let previous = self.coordinator.phase();
        self.coordinator.set_phase(WidgetPhase::LoadingConfig);

        match self.loader.load(name).await {
            Ok(LoadOutcome::Loaded(config)) => {
                let params = config.query_params(self.options.record_id.as_deref());
                Ok(self.coordinator.load(config, &params).await)
            }
            Ok(LoadOutcome::Skipped | LoadOutcome::Unchanged | LoadOutcome::Superseded) => {
                self.coordinator.set_phase(previous);
                Ok(RefreshOutcome::Skipped)
            }
            Err(err) => {
                self.coordinator.set_phase(WidgetPhase::Failed);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use arbor_api::{HierarchyPayload, HierarchyQuery, TemplateRecord};
    use serde_json::json;

    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::error::FaultKind;
    use crate::header::{HeaderProps, HeaderWidget};
    use crate::model::HierarchyResponse;
    use crate::refresh::tests::RecordingPresenter;

    #[derive(Default)]
    struct StaticSource {
        template_calls: AtomicUsize,
        hierarchy_calls: AtomicUsize,
    }

    impl HierarchySource for StaticSource {
        async fn fetch_template(&self, name: &str) -> Result<TemplateRecord, CoreError> {
            self.template_calls.fetch_add(1, Ordering::SeqCst);
            if name != "Account_Tree" {
                return Err(CoreError::ConfigLoadFailed {
                    template: name.to_owned(),
                    reason: "not found".into(),
                });
            }
            serde_json::from_value(json!({
                "masterLabel": "Account Hierarchy",
                "recordIconName": "standard:account",
                "objectApiName": "Account",
                "fieldsToQuery": "Id,Name",
                "defaultSortByField": "Name",
                "defaultSortDirection": "Asc",
                "recordStructure": "@strategy record-link"
            }))
            .map_err(|e| CoreError::Internal(e.to_string()))
        }

        async fn fetch_hierarchy(&self, query: &HierarchyQuery) -> Result<HierarchyResponse, CoreError> {
            self.hierarchy_calls.fetch_add(1, Ordering::SeqCst);
            let payload: HierarchyPayload = serde_json::from_value(json!({
                "totalRecordCount": 3,
                "baseUrl": "https://acme.example.com",
                "superParentList": [{"Id": query.record_id, "Name": "Beta"}],
                "parentMap": {
                    "A": [{"Id": "B", "Name": "Zed"}, {"Id": "C", "Name": "Amy"}]
                }
            }))
            .map_err(|e| CoreError::Internal(e.to_string()))?;
            Ok(payload.into())
        }
    }

    type Widget = HierarchyWidget<StaticSource, RecordingPresenter>;

    fn widget(template: Option<&str>, record: Option<&str>) -> (Arc<Widget>, Arc<StaticSource>, Arc<CollectingSink>) {
        let source = Arc::new(StaticSource::default());
        let sink = Arc::new(CollectingSink::new());
        let widget = HierarchyWidget::new(
            Arc::clone(&source),
            Arc::new(RecordingPresenter::default()),
            Arc::clone(&sink) as Arc<dyn DiagnosticSink>,
            EnricherRegistry::default(),
            WidgetOptions {
                record_id: record.map(str::to_owned),
                template_name: template.map(str::to_owned),
                ..WidgetOptions::default()
            },
        );
        (Arc::new(widget), source, sink)
    }

    fn names(snapshot: &TreeSnapshot) -> Vec<String> {
        snapshot
            .tree
            .walk()
            .map(|(depth, n)| format!("{depth}:{}", n.text("Name")))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn start_loads_fetches_and_sorts() {
        let (widget, _, sink) = widget(Some("Account_Tree"), Some("A"));
        let outcome = widget.start().await.unwrap();

        let snapshot = outcome
            .snapshot()
            .unwrap_or_else(|| panic!("expected a tree, got {outcome:?}"));
        assert_eq!(names(snapshot), vec!["0:Beta", "1:Amy", "1:Zed"]);
        assert_eq!(
            snapshot.tree.roots()[0].text("recordUrl"),
            "https://acme.example.com/A"
        );
        assert_eq!(widget.phase(), WidgetPhase::Ready);
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn same_template_name_does_not_reload() {
        let (widget, source, _) = widget(Some("Account_Tree"), Some("A"));
        let _ = widget.start().await;

        let again = widget
            .set_template_name(" Account_Tree ")
            .await
            .unwrap();
        assert!(matches!(again, RefreshOutcome::Skipped));
        assert_eq!(source.template_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.hierarchy_calls.load(Ordering::SeqCst), 1);
        assert_eq!(widget.phase(), WidgetPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_template_fails_without_fetching() {
        let (widget, source, sink) = widget(Some("Nope"), Some("A"));
        let err = widget.start().await.expect_err("template is missing");

        assert_eq!(err.kind(), FaultKind::ConfigLoadFailed);
        assert_eq!(sink.count(FaultKind::ConfigLoadFailed), 1);
        assert_eq!(source.hierarchy_calls.load(Ordering::SeqCst), 0);
        assert_eq!(widget.phase(), WidgetPhase::Failed);
        assert!(matches!(widget.refresh().await, RefreshOutcome::Skipped));
    }

    #[tokio::test(start_paused = true)]
    async fn header_refresh_signal_triggers_refetch() {
        let (widget, source, _) = widget(Some("Account_Tree"), Some("A"));
        let _ = widget.start().await;

        let mut header = HeaderWidget::new(HeaderProps::default());
        let mut snapshots = widget.coordinator().subscribe_snapshot();
        snapshots.borrow_and_update();

        let listener = tokio::spawn({
            let widget = Arc::clone(&widget);
            let signals = header.subscribe_refresh();
            async move { widget.listen(signals).await }
        });

        header.mount();
        header.handle_refresh();

        snapshots
            .changed()
            .await
            .expect("snapshot channel closed");
        assert_eq!(snapshots.borrow().as_ref().map(|s| s.epoch), Some(2));
        assert_eq!(source.hierarchy_calls.load(Ordering::SeqCst), 2);

        drop(header);
        listener.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dynamic_icon_only_for_own_record() {
        let (widget, _, _) = widget(Some("Account_Tree"), Some("A"));
        assert_eq!(widget.dynamic_icon("A"), "");

        let _ = widget.start().await;
        assert_eq!(widget.dynamic_icon("A"), "standard:account");
        assert_eq!(widget.dynamic_icon("B"), "");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_record_id_is_invalid_params() {
        let (widget, source, sink) = widget(Some("Account_Tree"), None);
        let outcome = widget.start().await.unwrap();

        assert_eq!(
            outcome.error().map(CoreError::kind),
            Some(FaultKind::InvalidQueryParams)
        );
        assert_eq!(sink.count(FaultKind::InvalidQueryParams), 1);
        assert_eq!(source.hierarchy_calls.load(Ordering::SeqCst), 0);
        assert!(!widget.coordinator().is_busy());
    }
}
