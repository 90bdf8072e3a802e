// ── Hierarchy fetcher ──
//
// Validates query parameters, issues one retrieval, and keeps the most
// recent query and response. `refetch` repeats the cached query so a
// refresh goes back through the same channel as the original load.
// Responses are tagged with the request epoch; an older response never
// replaces a newer one in the cache.

use std::sync::Arc;

use arbor_api::HierarchyQuery;
use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{HierarchyResponse, QueryParams};
use crate::source::HierarchySource;

#[derive(Debug)]
struct CachedResponse {
    epoch: u64,
    response: Arc<HierarchyResponse>,
}

pub struct HierarchyFetcher<S> {
    source: Arc<S>,
    query: ArcSwapOption<HierarchyQuery>,
    cache: ArcSwapOption<CachedResponse>,
}

impl<S: HierarchySource> HierarchyFetcher<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            query: ArcSwapOption::empty(),
            cache: ArcSwapOption::empty(),
        }
    }

    /// Validate `params` and retrieve the hierarchy.
    ///
    /// Missing object name, record id, or fields fail with
    /// `InvalidQueryParams` before the source is called.
    pub async fn fetch(&self, epoch: u64, params: &QueryParams) -> Result<Arc<HierarchyResponse>, CoreError> {
        let query = Arc::new(params.to_query()?);
        self.query.store(Some(Arc::clone(&query)));
        self.issue(epoch, &query).await
    }

    /// Repeat the most recent query.
    pub async fn refetch(&self, epoch: u64) -> Result<Arc<HierarchyResponse>, CoreError> {
        let query = self.query.load_full().ok_or_else(|| CoreError::InvalidQueryParams {
            reason: "nothing has been fetched yet".into(),
        })?;
        self.issue(epoch, &query).await
    }

    /// The most recent query, if any.
    pub fn cached_query(&self) -> Option<Arc<HierarchyQuery>> {
        self.query.load_full()
    }

    /// The newest response retrieved so far.
    pub fn latest(&self) -> Option<Arc<HierarchyResponse>> {
        self.cache.load_full().map(|c| Arc::clone(&c.response))
    }

    async fn issue(&self, epoch: u64, query: &HierarchyQuery) -> Result<Arc<HierarchyResponse>, CoreError> {
        debug!(
            epoch,
            object = %query.s_object_api_name,
            record = %query.record_id,
            "fetching hierarchy"
        );
        let response = self
            .source
            .fetch_hierarchy(query)
            .await
            .map(Arc::new)
            .map_err(CoreError::into_fetch_failure)?;

        let entry = Arc::new(CachedResponse {
            epoch,
            response: Arc::clone(&response),
        });
        self.cache.rcu(|current| match current {
            Some(newer) if newer.epoch > epoch => Some(Arc::clone(newer)),
            _ => Some(Arc::clone(&entry)),
        });

        debug!(
            epoch,
            roots = response.root_nodes.len(),
            total = response.total_count,
            "hierarchy fetched"
        );
        Ok(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use arbor_api::TemplateRecord;
    use tokio_test::assert_ok;

    use super::*;
    use crate::error::FaultKind;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl HierarchySource for CountingSource {
        async fn fetch_template(&self, name: &str) -> Result<TemplateRecord, CoreError> {
            Err(CoreError::ConfigLoadFailed {
                template: name.to_owned(),
                reason: "unused".into(),
            })
        }

        async fn fetch_hierarchy(&self, query: &HierarchyQuery) -> Result<HierarchyResponse, CoreError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            if self.fail {
                return Err(CoreError::Timeout { timeout_secs: 30 });
            }
            Ok(HierarchyResponse {
                total_count: n,
                base_url: format!("https://host/{}", query.record_id),
                ..HierarchyResponse::default()
            })
        }
    }

    fn params() -> QueryParams {
        QueryParams {
            object_name: Some("Account".into()),
            record_id: Some("001".into()),
            root_field_name: None,
            parent_field_name: None,
            fields_to_query: vec!["Id".into(), "Name".into()],
        }
    }

    #[tokio::test]
    async fn invalid_params_never_reach_the_source() {
        let fetcher = HierarchyFetcher::new(Arc::new(CountingSource::default()));
        let mut p = params();
        p.object_name = None;

        let err = fetcher.fetch(1, &p).await.expect_err("object name is required");
        assert_eq!(err.kind(), FaultKind::InvalidQueryParams);
        assert_eq!(fetcher.source.calls.load(Ordering::SeqCst), 0);
        assert!(fetcher.cached_query().is_none());
    }

    #[tokio::test]
    async fn refetch_repeats_cached_query() {
        let fetcher = HierarchyFetcher::new(Arc::new(CountingSource::default()));
        assert_ok!(fetcher.fetch(1, &params()).await);

        let again = assert_ok!(fetcher.refetch(2).await);
        assert_eq!(again.total_count, 2);
        assert_eq!(again.base_url, "https://host/001");
        assert_eq!(fetcher.latest().map(|r| r.total_count), Some(2));
    }

    #[tokio::test]
    async fn refetch_without_history_is_invalid() {
        let fetcher = HierarchyFetcher::new(Arc::new(CountingSource::default()));
        let err = fetcher.refetch(1).await.expect_err("nothing cached");
        assert_eq!(err.kind(), FaultKind::InvalidQueryParams);
    }

    #[tokio::test]
    async fn source_errors_become_fetch_failed() {
        let fetcher = HierarchyFetcher::new(Arc::new(CountingSource {
            fail: true,
            ..CountingSource::default()
        }));
        let err = fetcher.fetch(1, &params()).await.expect_err("source fails");
        assert_eq!(err.kind(), FaultKind::FetchFailed);
        assert!(fetcher.latest().is_none());
        // The query is kept so a manual refresh can retry it.
        assert!(fetcher.cached_query().is_some());
    }

    #[tokio::test]
    async fn older_epoch_does_not_replace_newer_cache() {
        let fetcher = HierarchyFetcher::new(Arc::new(CountingSource::default()));
        assert_ok!(fetcher.fetch(5, &params()).await);
        assert_ok!(fetcher.refetch(3).await);
        assert_eq!(fetcher.latest().map(|r| r.total_count), Some(1));
    }
}
