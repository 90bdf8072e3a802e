//! Data bridge: drives a [`HierarchyWidget`] and forwards what it reports
//! into the TUI action loop.
//!
//! Starts the widget, then serves header refresh signals until cancelled.
//! Phase changes and diagnostics are forwarded as actions; trees and the
//! busy flag travel through the widget's presenter.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use arbor_core::{CoreError, FaultKind, HierarchySource, HierarchyWidget, RefreshOutcome, RefreshSignal};

use crate::action::{Action, Notification};
use crate::presenter::TuiPresenter;

/// Node-local faults are warnings; everything else failed an operation.
pub fn notification_for(fault: &CoreError) -> Notification {
    match fault.kind() {
        FaultKind::EnrichmentFailed | FaultKind::SortFieldMissing | FaultKind::MalformedHierarchy => {
            Notification::warning(fault.to_string())
        }
        _ => Notification::error(fault.to_string()),
    }
}

pub async fn spawn_data_bridge<S: HierarchySource + 'static>(
    widget: Arc<HierarchyWidget<S, TuiPresenter>>,
    signals: broadcast::Receiver<RefreshSignal>,
    mut diagnostics: broadcast::Receiver<CoreError>,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    let mut phase = widget.subscribe_phase();
    let mut diagnostics_open = true;

    let driver = async {
        match widget.start().await {
            Ok(RefreshOutcome::Skipped) if widget.config().is_none() => {
                let _ = action_tx.send(Action::Notify(Notification::info(
                    "No template configured. Pass --template or set one in the profile.",
                )));
            }
            Ok(outcome) => debug!(?outcome, "first fetch finished"),
            // Already reported through the diagnostics channel.
            Err(e) => warn!(error = %e, "widget failed to start"),
        }
        widget.listen(signals).await;
    };
    tokio::pin!(driver);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            () = &mut driver => {
                debug!("refresh signals closed");
                break;
            }
            Ok(()) = phase.changed() => {
                let current = *phase.borrow_and_update();
                let _ = action_tx.send(Action::PhaseChanged(current));
            }
            result = diagnostics.recv(), if diagnostics_open => match result {
                Ok(fault) => {
                    let _ = action_tx.send(Action::Notify(notification_for(&fault)));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "diagnostics lagged");
                }
                Err(broadcast::error::RecvError::Closed) => diagnostics_open = false,
            },
        }
    }

    debug!("data bridge shut down");
}
