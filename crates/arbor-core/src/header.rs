// ── Header widget ──
//
// Title, icon, record count, and "time since last refresh". The elapsed
// label is recomputed by a ticker task armed on mount. At most one ticker
// is live per widget: it is cancelled on unmount and replaced on every
// explicit refresh, which also broadcasts a `RefreshSignal`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default period between label recomputations.
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Human label for the time since the last refresh.
///
/// Under a minute is "a few seconds ago", under an hour counts minutes,
/// anything longer counts whole hours.
pub fn elapsed_label(elapsed: Duration) -> String {
    let minutes = elapsed.as_secs() / 60;
    match minutes {
        0 => "a few seconds ago".to_owned(),
        1..=59 => format!("{minutes} minutes ago"),
        _ => format!("{} hour(s) ago", minutes / 60),
    }
}

/// Externally set display inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderProps {
    pub header_name: String,
    pub icon_name: Option<String>,
    pub records_count: u64,
}

/// The refresh event a header emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSignal {
    pub refresh: bool,
}

/// When the data was last refreshed and the label currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshState {
    pub last_refreshed_at: Instant,
    pub displayed_elapsed_label: String,
}

impl RefreshState {
    fn starting_now() -> Self {
        Self {
            last_refreshed_at: Instant::now(),
            displayed_elapsed_label: elapsed_label(Duration::ZERO),
        }
    }

    fn recompute(&mut self, now: Instant) -> bool {
        let label = elapsed_label(now.saturating_duration_since(self.last_refreshed_at));
        if label == self.displayed_elapsed_label {
            return false;
        }
        self.displayed_elapsed_label = label;
        true
    }
}

// ── Ticker ──────────────────────────────────────────────────────────

/// A cancellable periodic label recomputation.
struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn arm(period: Duration, state: Arc<watch::Sender<RefreshState>>, live: Arc<AtomicUsize>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        live.fetch_add(1, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        state.send_if_modified(|s| s.recompute(Instant::now()));
                    }
                }
            }
            live.fetch_sub(1, Ordering::SeqCst);
        });

        Self { cancel, handle }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── HeaderWidget ────────────────────────────────────────────────────

pub struct HeaderWidget {
    props: HeaderProps,
    tick: Duration,
    state_tx: Arc<watch::Sender<RefreshState>>,
    signal_tx: broadcast::Sender<RefreshSignal>,
    ticker: Option<Ticker>,
    live: Arc<AtomicUsize>,
}

impl HeaderWidget {
    pub fn new(props: HeaderProps) -> Self {
        Self::with_tick(props, DEFAULT_TICK)
    }

    pub fn with_tick(props: HeaderProps, tick: Duration) -> Self {
        let (state_tx, _) = watch::channel(RefreshState::starting_now());
        let (signal_tx, _) = broadcast::channel(16);
        Self {
            props,
            tick,
            state_tx: Arc::new(state_tx),
            signal_tx,
            ticker: None,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn props(&self) -> &HeaderProps {
        &self.props
    }

    pub fn set_props(&mut self, props: HeaderProps) {
        self.props = props;
    }

    pub fn set_records_count(&mut self, count: u64) {
        self.props.records_count = count;
    }

    pub fn state(&self) -> RefreshState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_refresh(&self) -> broadcast::Receiver<RefreshSignal> {
        self.signal_tx.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Number of ticker tasks still running for this widget.
    pub fn live_tickers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Arm the ticker. Must be called inside a Tokio runtime.
    pub fn mount(&mut self) {
        self.rearm();
        debug!(header = %self.props.header_name, "header mounted");
    }

    /// Cancel the ticker.
    pub fn unmount(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        debug!(header = %self.props.header_name, "header unmounted");
    }

    /// Reset the timestamp, recompute the label, re-arm the ticker, and
    /// emit `RefreshSignal { refresh: true }`.
    pub fn handle_refresh(&mut self) {
        self.state_tx.send_replace(RefreshState::starting_now());
        self.rearm();
        let receivers = self
            .signal_tx
            .send(RefreshSignal { refresh: true })
            .unwrap_or(0);
        debug!(receivers, "refresh requested");
    }

    /// Recompute the label against the current time.
    pub fn recompute(&self) -> String {
        self.state_tx
            .send_if_modified(|s| s.recompute(Instant::now()));
        self.state_tx.borrow().displayed_elapsed_label.clone()
    }

    fn rearm(&mut self) {
        if let Some(old) = self.ticker.take() {
            old.cancel();
        }
        self.ticker = Some(Ticker::arm(
            self.tick,
            Arc::clone(&self.state_tx),
            Arc::clone(&self.live),
        ));
    }
}

impl Drop for HeaderWidget {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn props() -> HeaderProps {
        HeaderProps {
            header_name: "Account Hierarchy".into(),
            icon_name: Some("standard:account".into()),
            records_count: 12,
        }
    }

    /// Let spawned tasks observe cancellation.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn label_policy() {
        assert_eq!(elapsed_label(Duration::ZERO), "a few seconds ago");
        assert_eq!(elapsed_label(Duration::from_secs(59)), "a few seconds ago");
        assert_eq!(elapsed_label(Duration::from_secs(90)), "1 minutes ago");
        assert_eq!(elapsed_label(Duration::from_secs(59 * 60)), "59 minutes ago");
        assert_eq!(elapsed_label(Duration::from_secs(3700)), "1 hour(s) ago");
        assert_eq!(elapsed_label(Duration::from_secs(50 * 3600)), "50 hour(s) ago");
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_updates_label() {
        let mut header = HeaderWidget::new(props());
        let mut rx = header.subscribe_state();
        header.mount();

        tokio::time::sleep(Duration::from_secs(125)).await;
        settle().await;

        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().displayed_elapsed_label, "2 minutes ago");
        header.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_resets_label_and_keeps_one_ticker() {
        let mut header = HeaderWidget::new(props());
        let mut signals = header.subscribe_refresh();
        header.mount();
        settle().await;
        assert_eq!(header.live_tickers(), 1);

        tokio::time::sleep(Duration::from_secs(3700)).await;
        settle().await;
        assert_eq!(header.state().displayed_elapsed_label, "1 hour(s) ago");

        header.handle_refresh();
        header.handle_refresh();
        settle().await;

        assert_eq!(header.live_tickers(), 1);
        assert_eq!(header.state().displayed_elapsed_label, "a few seconds ago");
        assert_eq!(signals.try_recv().ok(), Some(RefreshSignal { refresh: true }));
        assert_eq!(signals.try_recv().ok(), Some(RefreshSignal { refresh: true }));
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_stops_the_ticker() {
        let mut header = HeaderWidget::new(props());
        header.mount();
        settle().await;
        assert!(header.is_mounted());

        header.unmount();
        settle().await;
        assert_eq!(header.live_tickers(), 0);
        assert!(!header.is_mounted());

        let before = header.state();
        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(header.state(), before);
    }

    #[test]
    fn recompute_on_demand() {
        let header = HeaderWidget::new(props());
        assert_eq!(header.recompute(), "a few seconds ago");
        assert_eq!(header.props().records_count, 12);
    }
}
