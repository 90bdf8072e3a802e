//! Header bar: icon, title, record count, time since last refresh, and a
//! throbber while a fetch is in flight.

use std::time::Duration;

use color_eyre::eyre::Result;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use throbber_widgets_tui::{Throbber, ThrobberState};
use tokio::sync::broadcast;

use arbor_core::{HeaderProps, HeaderWidget, RefreshSignal, WidgetPhase};

use crate::action::Action;
use crate::component::Component;
use crate::theme;

pub struct HeaderBar {
    header: HeaderWidget,
    busy: bool,
    phase: WidgetPhase,
    throbber: ThrobberState,
}

impl HeaderBar {
    pub fn new(props: HeaderProps, tick: Duration) -> Self {
        Self {
            header: HeaderWidget::with_tick(props, tick),
            busy: false,
            phase: WidgetPhase::Idle,
            throbber: ThrobberState::default(),
        }
    }

    /// Arms the elapsed-label ticker. Needs a running Tokio runtime.
    pub fn mount(&mut self) {
        self.header.mount();
    }

    pub fn unmount(&mut self) {
        self.header.unmount();
    }

    pub fn subscribe_refresh(&self) -> broadcast::Receiver<RefreshSignal> {
        self.header.subscribe_refresh()
    }

    #[cfg(test)]
    fn props(&self) -> &HeaderProps {
        self.header.props()
    }

    fn title_line(&self) -> Line<'static> {
        let props = self.header.props();
        let mut spans = Vec::new();
        if let Some(icon) = &props.icon_name {
            spans.push(Span::styled(format!("[{icon}] "), theme::icon_style()));
        }
        spans.push(Span::styled(props.header_name.clone(), theme::title_style()));
        Line::from(spans)
    }

    fn meta_line(&self) -> Line<'static> {
        let props = self.header.props();
        let state = self.header.state();
        let mut text = format!(
            "({}) items • Updated {}",
            props.records_count, state.displayed_elapsed_label
        );
        if self.phase == WidgetPhase::Failed {
            text.push_str(" • failed");
        }
        Line::from(Span::styled(text, theme::header_meta()))
    }
}

impl Component for HeaderBar {
    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::Tick if self.busy => self.throbber.calc_next(),
            Action::RequestRefresh => self.header.handle_refresh(),
            Action::Busy(busy) => self.busy = *busy,
            Action::PhaseChanged(phase) => self.phase = *phase,
            Action::ShowTree { snapshot, .. } => {
                self.header.set_props(HeaderProps {
                    header_name: snapshot.title.clone(),
                    icon_name: snapshot.header_icon.clone(),
                    records_count: snapshot.total_count,
                });
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [title, meta, spinner] = Layout::horizontal([
            Constraint::Min(10),
            Constraint::Length(40),
            Constraint::Length(12),
        ])
        .areas(inner);

        frame.render_widget(Paragraph::new(self.title_line()), title);
        frame.render_widget(Paragraph::new(self.meta_line()).right_aligned(), meta);
        if self.busy {
            let throbber = Throbber::default()
                .label(" Loading")
                .style(theme::header_meta())
                .throbber_style(theme::throbber());
            frame.render_stateful_widget(throbber, spinner, &mut self.throbber);
        }
    }
}

impl Drop for HeaderBar {
    fn drop(&mut self) {
        self.header.unmount();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};
    use tokio::sync::oneshot;

    use super::*;
    use crate::test_support::{buffer_lines, snapshot};

    fn draw(bar: &mut HeaderBar) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 3)).unwrap();
        terminal
            .draw(|frame| bar.render(frame, frame.area()))
            .unwrap();
        buffer_lines(terminal.backend().buffer()).join("\n")
    }

    fn bar() -> HeaderBar {
        HeaderBar::new(
            HeaderProps {
                header_name: "arbor".into(),
                ..HeaderProps::default()
            },
            Duration::from_secs(60),
        )
    }

    #[test]
    fn shows_title_count_and_label() {
        let mut bar = bar();
        let screen = draw(&mut bar);
        assert!(screen.contains("arbor"));
        assert!(screen.contains("(0) items • Updated a few seconds ago"));
        assert!(!screen.contains("Loading"));
    }

    #[test]
    fn new_tree_updates_props() {
        let mut bar = bar();
        let (drawn, _rx) = oneshot::channel();
        bar.update(&Action::ShowTree {
            snapshot: snapshot(),
            drawn,
        })
        .unwrap();

        assert_eq!(bar.props().header_name, "Account Hierarchy");
        assert_eq!(bar.props().records_count, 4);
        let screen = draw(&mut bar);
        assert!(screen.contains("[standard:hierarchy] Account Hierarchy"));
        assert!(screen.contains("(4) items"));
    }

    #[test]
    fn busy_shows_throbber() {
        let mut bar = bar();
        bar.update(&Action::Busy(true)).unwrap();
        assert!(draw(&mut bar).contains("Loading"));

        bar.update(&Action::Busy(false)).unwrap();
        assert!(!draw(&mut bar).contains("Loading"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_key_emits_signal() {
        let mut bar = bar();
        let mut signals = bar.subscribe_refresh();
        bar.mount();

        bar.update(&Action::RequestRefresh).unwrap();
        assert_eq!(signals.try_recv().ok(), Some(RefreshSignal { refresh: true }));
        bar.unmount();
    }
}
