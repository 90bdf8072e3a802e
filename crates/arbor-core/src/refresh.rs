// ── Refresh coordination ──
//
// Every load and refresh runs as one epoch: bump the counter, raise the
// busy flag, fetch, build, publish, wait for the presentation sink to
// finish drawing, then expand all. A result whose epoch has been
// superseded is dropped and never overwrites a newer snapshot. The busy
// flag is lowered by whichever epoch is current when it finishes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::diagnostics::DiagnosticSink;
use crate::error::CoreError;
use crate::fetcher::HierarchyFetcher;
use crate::model::{HierarchyConfig, QueryParams, TreeSnapshot};
use crate::pipeline::build_tree;
use crate::source::HierarchySource;

/// Where a hierarchy widget is in its load cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum WidgetPhase {
    #[default]
    Idle,
    LoadingConfig,
    Fetching,
    Assembling,
    Ready,
    Failed,
}

/// The rendering side of a widget.
pub trait PresentationSink: Send + Sync {
    /// Show or hide the loading indicator.
    fn set_busy(&self, busy: bool);

    /// Draw a new tree. Resolves once the drawing is complete.
    fn render(&self, snapshot: Arc<TreeSnapshot>) -> impl Future<Output = ()> + Send;

    /// Expand every node of the tree last rendered.
    fn expand_all(&self);
}

/// How one epoch ended.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Built, published and rendered.
    Rendered(Arc<TreeSnapshot>),
    /// A newer epoch started first; the result was discarded.
    Stale { epoch: u64 },
    /// Nothing to do (no config loaded yet).
    Skipped,
    /// The fetch failed; the previous tree is kept.
    Failed(CoreError),
}

impl RefreshOutcome {
    pub fn snapshot(&self) -> Option<&Arc<TreeSnapshot>> {
        match self {
            Self::Rendered(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CoreError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

enum Retrieval<'a> {
    Initial(&'a QueryParams),
    Repeat,
}

pub struct RefreshCoordinator<S, P> {
    fetcher: HierarchyFetcher<S>,
    presenter: Arc<P>,
    sink: Arc<dyn DiagnosticSink>,
    primary_key: String,
    epoch: AtomicU64,
    busy_tx: watch::Sender<bool>,
    phase_tx: watch::Sender<WidgetPhase>,
    snapshot_tx: watch::Sender<Option<Arc<TreeSnapshot>>>,
}

impl<S: HierarchySource, P: PresentationSink> RefreshCoordinator<S, P> {
    pub fn new(
        source: Arc<S>,
        presenter: Arc<P>,
        sink: Arc<dyn DiagnosticSink>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            fetcher: HierarchyFetcher::new(source),
            presenter,
            sink,
            primary_key: primary_key.into(),
            epoch: AtomicU64::new(0),
            busy_tx: watch::channel(false).0,
            phase_tx: watch::channel(WidgetPhase::Idle).0,
            snapshot_tx: watch::channel(None).0,
        }
    }

    pub fn fetcher(&self) -> &HierarchyFetcher<S> {
        &self.fetcher
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        *self.busy_tx.borrow()
    }

    pub fn phase(&self) -> WidgetPhase {
        *self.phase_tx.borrow()
    }

    pub fn snapshot(&self) -> Option<Arc<TreeSnapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe_busy(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<WidgetPhase> {
        self.phase_tx.subscribe()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<Arc<TreeSnapshot>>> {
        self.snapshot_tx.subscribe()
    }

    pub(crate) fn set_phase(&self, phase: WidgetPhase) {
        self.phase_tx.send_replace(phase);
    }

    /// First load: fetch with fresh parameters.
    pub async fn load(&self, config: Arc<HierarchyConfig>, params: &QueryParams) -> RefreshOutcome {
        self.run_epoch(config, Retrieval::Initial(params)).await
    }

    /// Refresh: repeat the cached query.
    pub async fn refresh(&self, config: Arc<HierarchyConfig>) -> RefreshOutcome {
        self.run_epoch(config, Retrieval::Repeat).await
    }

    async fn run_epoch(&self, config: Arc<HierarchyConfig>, retrieval: Retrieval<'_>) -> RefreshOutcome {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_busy(true);
        self.set_phase(WidgetPhase::Fetching);

        let fetched = match retrieval {
            Retrieval::Initial(params) => self.fetcher.fetch(epoch, params).await,
            Retrieval::Repeat => self.fetcher.refetch(epoch).await,
        };

        let outcome = match fetched {
            _ if !self.is_current(epoch) => {
                debug!(epoch, current = self.current_epoch(), "dropping stale result");
                RefreshOutcome::Stale { epoch }
            }
            Err(err) => {
                self.sink.report(&err);
                self.set_phase(WidgetPhase::Failed);
                RefreshOutcome::Failed(err)
            }
            Ok(response) => {
                self.set_phase(WidgetPhase::Assembling);
                let assembled = build_tree(&response, &config, &self.primary_key, self.sink.as_ref());
                let snapshot = Arc::new(TreeSnapshot::from_parts(epoch, &config, assembled));
                self.present(epoch, snapshot).await
            }
        };

        if self.is_current(epoch) {
            self.set_busy(false);
        }
        outcome
    }

    async fn present(&self, epoch: u64, snapshot: Arc<TreeSnapshot>) -> RefreshOutcome {
        if !self.publish(&snapshot) {
            debug!(epoch, "newer snapshot already published");
            return RefreshOutcome::Stale { epoch };
        }
        info!(
            epoch,
            nodes = snapshot.node_count,
            total = snapshot.total_count,
            "hierarchy ready"
        );

        self.presenter.render(Arc::clone(&snapshot)).await;
        if !self.is_current(epoch) {
            return RefreshOutcome::Stale { epoch };
        }
        self.presenter.expand_all();
        self.set_phase(WidgetPhase::Ready);
        RefreshOutcome::Rendered(snapshot)
    }

    /// Replace the published snapshot unless a newer epoch got there first.
    fn publish(&self, snapshot: &Arc<TreeSnapshot>) -> bool {
        self.snapshot_tx.send_if_modified(|current| {
            if current
                .as_ref()
                .is_some_and(|existing| existing.epoch > snapshot.epoch)
            {
                return false;
            }
            *current = Some(Arc::clone(snapshot));
            true
        })
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn set_busy(&self, busy: bool) {
        self.busy_tx.send_replace(busy);
        self.presenter.set_busy(busy);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use arbor_api::{HierarchyQuery, TemplateRecord};
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::convert::parse_template;
    use crate::diagnostics::CollectingSink;
    use crate::enrich::EnricherRegistry;
    use crate::error::FaultKind;
    use crate::model::HierarchyResponse;

    /// Presentation sink that records every call.
    #[derive(Default)]
    pub(crate) struct RecordingPresenter {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingPresenter {
        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }

    impl PresentationSink for RecordingPresenter {
        fn set_busy(&self, busy: bool) {
            self.push(format!("busy={busy}"));
        }

        fn render(&self, snapshot: Arc<TreeSnapshot>) -> impl Future<Output = ()> + Send {
            self.push(format!("render epoch={}", snapshot.epoch));
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        fn expand_all(&self) {
            self.push("expand_all".into());
        }
    }

    /// Source whose hierarchy responses are released by the test.
    #[derive(Default)]
    struct GatedSource {
        gates: Mutex<VecDeque<oneshot::Receiver<Result<HierarchyResponse, CoreError>>>>,
    }

    impl GatedSource {
        fn gate(&self) -> oneshot::Sender<Result<HierarchyResponse, CoreError>> {
            let (tx, rx) = oneshot::channel();
            if let Ok(mut gates) = self.gates.lock() {
                gates.push_back(rx);
            }
            tx
        }
    }

    impl HierarchySource for GatedSource {
        async fn fetch_template(&self, name: &str) -> Result<TemplateRecord, CoreError> {
            Err(CoreError::ConfigLoadFailed {
                template: name.to_owned(),
                reason: "unused".into(),
            })
        }

        async fn fetch_hierarchy(&self, _query: &HierarchyQuery) -> Result<HierarchyResponse, CoreError> {
            let gate = self.gates.lock().ok().and_then(|mut g| g.pop_front());
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(CoreError::Internal("gate dropped".into()))),
                None => Err(CoreError::Internal("no gate".into())),
            }
        }
    }

    fn config() -> Arc<HierarchyConfig> {
        let record: TemplateRecord = serde_json::from_value(json!({
            "masterLabel": "Accounts",
            "objectApiName": "Account",
            "fieldsToQuery": "Id,Name",
            "defaultSortByField": "Name",
            "defaultSortDirection": "Asc"
        }))
        .unwrap();
        Arc::new(
            parse_template("Accounts", record, &EnricherRegistry::default())
                .unwrap(),
        )
    }

    fn params() -> QueryParams {
        config().query_params(Some("A"))
    }

    fn response(root_name: &str) -> HierarchyResponse {
        serde_json::from_value::<arbor_api::HierarchyPayload>(json!({
            "totalRecordCount": 1,
            "baseUrl": "https://acme.example.com",
            "superParentList": [{"Id": "A", "Name": root_name}],
            "parentMap": {}
        }))
        .map(HierarchyResponse::from)
        .unwrap()
    }

    type Coordinator = RefreshCoordinator<GatedSource, RecordingPresenter>;

    fn coordinator() -> (Arc<Coordinator>, Arc<GatedSource>, Arc<RecordingPresenter>, Arc<CollectingSink>) {
        let source = Arc::new(GatedSource::default());
        let presenter = Arc::new(RecordingPresenter::default());
        let sink = Arc::new(CollectingSink::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&source),
            Arc::clone(&presenter),
            Arc::clone(&sink) as Arc<dyn DiagnosticSink>,
            "Id",
        ));
        (coordinator, source, presenter, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn renders_then_expands_and_clears_busy() {
        let (coordinator, source, presenter, _) = coordinator();
        let gate = source.gate();
        let _ = gate.send(Ok(response("Beta")));

        let outcome = coordinator.load(config(), &params()).await;

        let snapshot = outcome
            .snapshot()
            .unwrap_or_else(|| panic!("expected a rendered snapshot, got {outcome:?}"));
        assert_eq!(snapshot.title, "Accounts");
        assert_eq!(snapshot.node_count, 1);
        assert_eq!(
            presenter.events(),
            vec!["busy=true", "render epoch=1", "expand_all", "busy=false"]
        );
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.phase(), WidgetPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_prior_tree_and_clears_busy() {
        let (coordinator, source, presenter, sink) = coordinator();
        let _ = source.gate().send(Ok(response("Beta")));
        let _ = coordinator.load(config(), &params()).await;

        let _ = source
            .gate()
            .send(Err(CoreError::Timeout { timeout_secs: 30 }));
        let outcome = coordinator.refresh(config()).await;

        assert_eq!(outcome.error().map(CoreError::kind), Some(FaultKind::FetchFailed));
        assert_eq!(sink.count(FaultKind::FetchFailed), 1);
        assert_eq!(coordinator.snapshot().map(|s| s.epoch), Some(1));
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.phase(), WidgetPhase::Failed);
        assert_eq!(presenter.events().last().map(String::as_str), Some("busy=false"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_params_are_reported_without_fetching() {
        let (coordinator, _, _, sink) = coordinator();
        let outcome = coordinator.load(config(), &config().query_params(None)).await;

        assert_eq!(
            outcome.error().map(CoreError::kind),
            Some(FaultKind::InvalidQueryParams)
        );
        assert_eq!(sink.count(FaultKind::InvalidQueryParams), 1);
        assert!(!coordinator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_never_overwrites_newer_tree() {
        let (coordinator, source, _, _) = coordinator();
        let _ = source.gate().send(Ok(response("Initial")));
        let _ = coordinator.load(config(), &params()).await;

        // Two refreshes in flight; the older one resolves last.
        let older_gate = source.gate();
        let newer_gate = source.gate();

        let older = tokio::spawn({
            let c = Arc::clone(&coordinator);
            async move { c.refresh(config()).await }
        });
        tokio::task::yield_now().await;
        let newer = tokio::spawn({
            let c = Arc::clone(&coordinator);
            async move { c.refresh(config()).await }
        });
        tokio::task::yield_now().await;

        let _ = newer_gate.send(Ok(response("Newer")));
        let newer = newer.await.unwrap();
        assert!(matches!(newer, RefreshOutcome::Rendered(_)));
        assert!(!coordinator.is_busy(), "the current epoch has finished");

        let _ = older_gate.send(Ok(response("Older")));
        let older = older.await.unwrap();
        assert!(matches!(older, RefreshOutcome::Stale { epoch: 2 }));

        let shown = coordinator
            .snapshot()
            .map(|s| s.tree.roots()[0].text("Name"))
            .unwrap();
        assert_eq!(shown, "Newer");
    }
}
