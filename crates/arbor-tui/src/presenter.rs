//! [`PresentationSink`] that hands trees to the UI loop.
//!
//! `render` resolves only once the frame holding the new tree has been
//! drawn, so the coordinator's expand-all lands on rows that exist.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use arbor_core::{PresentationSink, TreeSnapshot};

use crate::action::Action;

#[derive(Debug, Clone)]
pub struct TuiPresenter {
    action_tx: mpsc::UnboundedSender<Action>,
}

impl TuiPresenter {
    pub fn new(action_tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { action_tx }
    }
}

impl PresentationSink for TuiPresenter {
    fn set_busy(&self, busy: bool) {
        let _ = self.action_tx.send(Action::Busy(busy));
    }

    fn render(&self, snapshot: Arc<TreeSnapshot>) -> impl Future<Output = ()> + Send {
        let (drawn, done) = oneshot::channel();
        // A closed UI loop drops `drawn`, which resolves `done` at once.
        let _ = self.action_tx.send(Action::ShowTree { snapshot, drawn });
        async move {
            let _ = done.await;
        }
    }

    fn expand_all(&self) {
        let _ = self.action_tx.send(Action::ExpandAll);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::snapshot;

    #[tokio::test(start_paused = true)]
    async fn render_waits_for_the_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let presenter = TuiPresenter::new(tx);

        let rendering = tokio::spawn({
            let presenter = presenter.clone();
            async move { presenter.render(snapshot()).await }
        });

        let Some(Action::ShowTree { snapshot, drawn }) = rx.recv().await else {
            panic!("expected ShowTree");
        };
        assert_eq!(snapshot.epoch, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!rendering.is_finished());

        let _ = drawn.send(());
        rendering.await.unwrap();
    }

    #[tokio::test]
    async fn closed_loop_does_not_block_render() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let presenter = TuiPresenter::new(tx);
        presenter.render(snapshot()).await;
        presenter.set_busy(false);
        presenter.expand_all();
    }

    #[tokio::test]
    async fn busy_and_expand_are_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let presenter = TuiPresenter::new(tx);
        presenter.set_busy(true);
        presenter.expand_all();

        assert!(matches!(rx.recv().await, Some(Action::Busy(true))));
        assert!(matches!(rx.recv().await, Some(Action::ExpandAll)));
    }
}
