//! Application core: event loop, action dispatch, layout.

use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use arbor_core::RefreshSignal;

use crate::action::{Action, Notification};
use crate::component::Component;
use crate::components::{HeaderBar, TreeGrid};
use crate::event::{Event, EventReader};
use crate::theme;
use crate::tui::Tui;

/// How long a notification stays in the footer.
const NOTIFICATION_TTL: Duration = Duration::from_secs(6);

pub struct App {
    header: HeaderBar,
    grid: TreeGrid,
    notification: Option<(Notification, Instant)>,
    /// Acknowledgements owed to the presenter once the next frame is drawn.
    pending_draws: Vec<oneshot::Sender<()>>,
    running: bool,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(header: HeaderBar, grid: TreeGrid) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            header,
            grid,
            notification: None,
            pending_draws: Vec::new(),
            running: true,
            action_tx,
            action_rx,
        }
    }

    /// Sender for background tasks that feed the loop.
    pub fn action_tx(&self) -> mpsc::UnboundedSender<Action> {
        self.action_tx.clone()
    }

    /// Refresh signals emitted by the header; subscribe before `run`.
    pub fn header_signals(&self) -> broadcast::Receiver<RefreshSignal> {
        self.header.subscribe_refresh()
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        self.header.mount();

        let mut events = EventReader::new(Duration::from_millis(250), Duration::from_millis(33));
        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                let render = matches!(action, Action::Render);
                self.process_action(action)?;
                if render {
                    tui.draw(|frame| self.render(frame))?;
                    self.acknowledge_draws();
                }
            }
        }

        self.header.unmount();
        events.stop();
        tui.exit();
        info!("TUI event loop ended");
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Char('q')) => {
                Ok(Some(Action::Quit))
            }
            (_, KeyCode::Char('r')) => Ok(Some(Action::RequestRefresh)),
            (_, KeyCode::Esc) => Ok(Some(Action::DismissNotification)),
            _ => self.grid.handle_key_event(key),
        }
    }

    fn process_action(&mut self, action: Action) -> Result<()> {
        match &action {
            Action::Quit => self.running = false,
            Action::Tick => self.expire_notification(Instant::now()),
            Action::Notify(notification) => {
                debug!(message = %notification.message, "notification");
                self.notification = Some((notification.clone(), Instant::now()));
            }
            Action::DismissNotification => self.notification = None,
            _ => {}
        }

        let mut follow_up = Vec::new();
        follow_up.extend(self.header.update(&action)?);
        follow_up.extend(self.grid.update(&action)?);

        if let Action::ShowTree { drawn, .. } = action {
            self.pending_draws.push(drawn);
        }
        for next in follow_up {
            self.action_tx.send(next)?;
        }
        Ok(())
    }

    fn acknowledge_draws(&mut self) {
        for drawn in self.pending_draws.drain(..) {
            let _ = drawn.send(());
        }
    }

    fn expire_notification(&mut self, now: Instant) {
        let expired = self
            .notification
            .as_ref()
            .is_some_and(|(_, shown)| now.saturating_duration_since(*shown) >= NOTIFICATION_TTL);
        if expired {
            self.notification = None;
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.header.render(frame, header);
        self.grid.render(frame, body);
        self.render_footer(frame, footer);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let line = match &self.notification {
            Some((note, _)) => Line::from(Span::styled(
                format!(" {}", note.message),
                theme::notification(note.level),
            )),
            None => {
                let hints = [
                    ("r", "refresh"),
                    ("e", "expand"),
                    ("c", "collapse"),
                    ("←→", "fold"),
                    ("↑↓", "move"),
                    ("q", "quit"),
                ];
                let mut spans = vec![Span::raw(" ")];
                for (key, label) in hints {
                    spans.push(Span::styled(key, theme::key_hint_key()));
                    spans.push(Span::styled(format!(" {label}  "), theme::key_hint()));
                }
                Line::from(spans)
            }
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arbor_core::HeaderProps;
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;
    use crate::test_support::{buffer_lines, snapshot};

    fn app() -> App {
        App::new(
            HeaderBar::new(HeaderProps::default(), Duration::from_secs(60)),
            TreeGrid::new("Id", Some("2".into())),
        )
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 12)).unwrap();
        terminal
            .draw(|frame| app.render(frame))
            .unwrap();
        app.acknowledge_draws();
        buffer_lines(terminal.backend().buffer()).join("\n")
    }

    #[tokio::test]
    async fn tree_is_acknowledged_after_draw() {
        let mut app = app();
        let (drawn, mut done) = oneshot::channel();
        app.process_action(Action::ShowTree {
            snapshot: snapshot(),
            drawn,
        })
        .unwrap();

        assert!(done.try_recv().is_err());
        let screen = draw(&mut app);
        assert!(done.try_recv().is_ok());
        assert!(screen.contains("Account Hierarchy"));
        assert!(screen.contains("Acme"));
    }

    #[tokio::test]
    async fn expand_all_after_show() {
        let mut app = app();
        let (drawn, _done) = oneshot::channel();
        app.process_action(Action::ShowTree {
            snapshot: snapshot(),
            drawn,
        })
        .unwrap();
        app.process_action(Action::ExpandAll)
            .unwrap();
        assert!(draw(&mut app).contains("Boston"));
    }

    #[tokio::test]
    async fn global_keys() {
        let mut app = app();
        let key = |c| KeyEvent::from(KeyCode::Char(c));
        assert!(matches!(app.handle_key_event(key('q')), Ok(Some(Action::Quit))));
        assert!(matches!(app.handle_key_event(key('r')), Ok(Some(Action::RequestRefresh))));
        assert!(matches!(app.handle_key_event(key('e')), Ok(Some(Action::ExpandAll))));

        app.process_action(Action::Quit).unwrap();
        assert!(!app.running);
    }

    #[tokio::test(start_paused = true)]
    async fn notifications_expire() {
        let mut app = app();
        app.process_action(Action::Notify(Notification::error("Hierarchy fetch failed")))
            .unwrap();
        assert!(draw(&mut app).contains("Hierarchy fetch failed"));

        tokio::time::advance(NOTIFICATION_TTL).await;
        app.process_action(Action::Tick).unwrap();
        let screen = draw(&mut app);
        assert!(!screen.contains("Hierarchy fetch failed"));
        assert!(screen.contains("refresh"));
    }
}
