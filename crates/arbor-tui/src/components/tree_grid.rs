//! Expandable tree grid: one row per record, columns inline.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use tracing::{debug, warn};
use tui_tree_widget::{Tree, TreeItem, TreeState};

use arbor_core::{ColumnSpec, EnrichedNode, TreeSnapshot};

use crate::action::{Action, Notification};
use crate::component::Component;
use crate::theme;

/// Deepest level built as nested rows. Below it a branch shows a single
/// "… N more" row; the tree widget walks its items recursively.
const MAX_NESTING: usize = 100;

/// Row identifier: the record's primary key, or its sibling position when
/// the record has none.
fn identifier(node: &EnrichedNode, primary_key: &str, index: usize) -> String {
    node.id(primary_key)
        .map_or_else(|| format!("#{index}"), |id| id.as_str().to_owned())
}

struct RowContext<'a> {
    columns: &'a [ColumnSpec],
    primary_key: &'a str,
    record_id: Option<&'a str>,
    record_icon: Option<&'a str>,
}

/// A row whose child rows are still being built.
struct PendingRow<'n> {
    node: &'n EnrichedNode,
    id: String,
    depth: usize,
    children: Vec<TreeItem<'static, String>>,
}

impl<'n> PendingRow<'n> {
    fn new(node: &'n EnrichedNode, id: String, depth: usize) -> Self {
        Self {
            node,
            id,
            depth,
            children: Vec::new(),
        }
    }
}

impl RowContext<'_> {
    fn line(&self, node: &EnrichedNode, id: &str) -> Line<'static> {
        let mut cells = self.columns.iter().map(|c| node.text(c.display_field()));
        let label = cells
            .next()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| node.text(self.primary_key));

        let mut spans = vec![Span::styled(label, theme::row_label())];
        match (self.record_id, self.record_icon) {
            (Some(own), Some(icon)) if own == id => {
                spans.push(Span::styled(format!(" [{icon}]"), theme::own_record()));
            }
            _ => {}
        }
        for cell in cells.filter(|c| !c.is_empty()) {
            spans.push(Span::styled(format!("  {cell}"), theme::row_column()));
        }
        Line::from(spans)
    }

    /// Rows for one root and everything under it, built bottom-up.
    fn item(&self, root: &EnrichedNode, index: usize) -> std::io::Result<TreeItem<'static, String>> {
        let mut current = PendingRow::new(root, identifier(root, self.primary_key, index), 0);
        let mut parents: Vec<PendingRow<'_>> = Vec::new();
        loop {
            let node = current.node;
            let next = current.children.len();
            match node.children().get(next) {
                Some(child) if current.depth < MAX_NESTING => {
                    let row = PendingRow::new(
                        child,
                        identifier(child, self.primary_key, next),
                        current.depth + 1,
                    );
                    parents.push(std::mem::replace(&mut current, row));
                    continue;
                }
                _ => {}
            }

            let item = self.finish(current)?;
            match parents.pop() {
                Some(mut parent) => {
                    parent.children.push(item);
                    current = parent;
                }
                None => return Ok(item),
            }
        }
    }

    fn finish(&self, row: PendingRow<'_>) -> std::io::Result<TreeItem<'static, String>> {
        let text = self.line(row.node, &row.id);
        if !row.node.has_children() {
            return Ok(TreeItem::new_leaf(row.id, text));
        }
        let mut children = row.children;
        if children.is_empty() {
            let hidden = row.node.subtree_len() - 1;
            children.push(TreeItem::new_leaf(
                format!("{}/more", row.id),
                Line::styled(format!("… {hidden} more"), theme::key_hint()),
            ));
        }
        TreeItem::new(row.id, text, children)
    }
}

/// Identifier paths of every row that has children, parents first.
fn branch_paths(roots: &[EnrichedNode], primary_key: &str) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    let mut stack: Vec<(&EnrichedNode, Vec<String>)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, root)| (root, vec![identifier(root, primary_key, i)]))
        .collect();
    while let Some((node, path)) = stack.pop() {
        if !node.has_children() {
            continue;
        }
        if path.len() <= MAX_NESTING {
            for (i, child) in node.children().iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(identifier(child, primary_key, i));
                stack.push((child, child_path));
            }
        }
        out.push(path);
    }
    out
}

pub struct TreeGrid {
    primary_key: String,
    record_id: Option<String>,
    snapshot: Option<Arc<TreeSnapshot>>,
    items: Vec<TreeItem<'static, String>>,
    state: TreeState<String>,
}

impl TreeGrid {
    pub fn new(primary_key: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            record_id,
            snapshot: None,
            items: Vec::new(),
            state: TreeState::default(),
        }
    }

    #[cfg(test)]
    fn snapshot(&self) -> Option<&Arc<TreeSnapshot>> {
        self.snapshot.as_ref()
    }

    /// Replace the displayed tree. On a row-identity conflict the previous
    /// tree stays on screen.
    pub fn show(&mut self, snapshot: Arc<TreeSnapshot>) -> std::io::Result<()> {
        let ctx = RowContext {
            columns: &snapshot.columns,
            primary_key: &self.primary_key,
            record_id: self.record_id.as_deref(),
            record_icon: snapshot.record_icon.as_deref(),
        };
        let items = snapshot
            .tree
            .roots()
            .iter()
            .enumerate()
            .map(|(i, root)| ctx.item(root, i))
            .collect::<std::io::Result<Vec<_>>>()?;
        Tree::new(&items)?;

        debug!(epoch = snapshot.epoch, rows = snapshot.node_count, "tree replaced");
        self.items = items;
        let first_root = snapshot.tree.roots().first();
        match first_root {
            Some(first) if self.state.selected().is_empty() => {
                self.state.select(vec![identifier(first, &self.primary_key, 0)]);
            }
            _ => {}
        }
        self.snapshot = Some(snapshot);
        Ok(())
    }

    pub fn expand_all(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        for path in branch_paths(snapshot.tree.roots(), &self.primary_key) {
            self.state.open(path);
        }
    }

    pub fn collapse_all(&mut self) {
        self.state.close_all();
    }

    #[cfg(test)]
    fn selected(&self) -> Vec<String> {
        self.state.selected().to_vec()
    }

    fn title(&self) -> Line<'static> {
        let text = match &self.snapshot {
            Some(s) => format!(" {} of {} records ", s.node_count, s.total_count),
            None => " records ".to_owned(),
        };
        Line::from(Span::styled(text, theme::title_style()))
    }

    fn column_line(&self) -> Option<Line<'static>> {
        let snapshot = self.snapshot.as_ref()?;
        if snapshot.columns.is_empty() {
            return None;
        }
        let headings: Vec<&str> = snapshot.columns.iter().map(ColumnSpec::heading).collect();
        Some(Line::from(Span::styled(
            format!(" {}", headings.join(" · ")),
            theme::key_hint(),
        )))
    }
}

impl Component for TreeGrid {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Up | KeyCode::Char('k') => Action::SelectUp,
            KeyCode::Down | KeyCode::Char('j') => Action::SelectDown,
            KeyCode::Left | KeyCode::Char('h') => Action::CollapseSelected,
            KeyCode::Right | KeyCode::Char('l') => Action::ExpandSelected,
            KeyCode::Enter | KeyCode::Char(' ') => Action::ToggleSelected,
            KeyCode::Home | KeyCode::Char('g') => Action::SelectFirst,
            KeyCode::End | KeyCode::Char('G') => Action::SelectLast,
            KeyCode::Char('e') => Action::ExpandAll,
            KeyCode::Char('c') => Action::CollapseAll,
            _ => return Ok(None),
        };
        Ok(Some(action))
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::SelectUp => {
                self.state.key_up();
            }
            Action::SelectDown => {
                self.state.key_down();
            }
            Action::SelectFirst => {
                self.state.select_first();
            }
            Action::SelectLast => {
                self.state.select_last();
            }
            Action::CollapseSelected => {
                self.state.key_left();
            }
            Action::ExpandSelected => {
                self.state.key_right();
            }
            Action::ToggleSelected => {
                self.state.toggle_selected();
            }
            Action::ExpandAll => self.expand_all(),
            Action::CollapseAll => self.collapse_all(),
            Action::ShowTree { snapshot, .. } => {
                if let Err(e) = self.show(Arc::clone(snapshot)) {
                    warn!(error = %e, "tree rows could not be built");
                    return Ok(Some(Action::Notify(Notification::error(format!(
                        "Cannot display hierarchy: {e}"
                    )))));
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default())
            .title(self.title());
        if let Some(columns) = self.column_line() {
            block = block.title_bottom(columns);
        }

        if self.items.is_empty() {
            let text = if self.snapshot.is_some() {
                "No records"
            } else {
                "Waiting for data…"
            };
            frame.render_widget(
                Paragraph::new(Span::styled(format!(" {text}"), theme::key_hint())).block(block),
                area,
            );
            return;
        }

        match Tree::new(&self.items) {
            Ok(tree) => {
                let tree = tree
                    .block(block)
                    .highlight_style(theme::row_selected())
                    .highlight_symbol("▸ ");
                frame.render_stateful_widget(tree, area, &mut self.state);
            }
            Err(e) => {
                frame.render_widget(Paragraph::new(e.to_string()).block(block), area);
            }
        }
    }
}
