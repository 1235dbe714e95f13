use crate::report::rows::TableState;
use crate::widgets::chrome::panel_block;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsKeyResult {
    Ignored,
    Handled,
    Changed,
    AddRow,
    RemoveRow(usize),
}

// Rows fade in over this many ticks after creation
const FADE_TICKS: u64 = 4;

/// Grid editor over one repeatable table: arrow keys move, Enter edits the
/// cell, 'a' appends a row, 'd' deletes the cursor row.
pub fn draw_table(f: &mut Frame, area: Rect, table: &TableState, focused: bool, tick: u64) {
    let mut lines: Vec<Line> = Vec::new();
    let header: Vec<Span> = table
        .def
        .columns
        .iter()
        .enumerate()
        .map(|(ci, c)| {
            let style = if focused && ci == table.cursor_col {
                crate::theme::text_active_bold()
            } else {
                crate::theme::text_muted()
            };
            Span::styled(format!("{:<14} ", truncate(&c.label, 13)), style)
        })
        .collect();
    lines.push(Line::from(header));
    if table.rows.is_empty() {
        lines.push(Line::from(Span::styled(
            "  (no rows — press 'a' to add one)",
            crate::theme::text_muted(),
        )));
    }
    for (ri, row) in table.rows.iter().enumerate() {
        let fresh = tick.saturating_sub(row.born_tick) < FADE_TICKS;
        let mut spans: Vec<Span> = Vec::new();
        for (ci, val) in row.values.iter().enumerate() {
            let here = focused && ri == table.cursor_row && ci == table.cursor_col;
            let mut cell = truncate(val, 13).to_string();
            if here && table.editing {
                cell.push('▏');
            }
            let style = if here {
                if table.editing {
                    crate::theme::text_editing_bold()
                } else {
                    crate::theme::list_cursor_style()
                }
            } else if fresh {
                Style::default().add_modifier(Modifier::DIM)
            } else {
                Style::default()
            };
            spans.push(Span::styled(format!("{cell:<14} "), style));
        }
        lines.push(Line::from(spans));
    }
    let title = format!("{} ({})", table.def.title, table.rows.len());
    let block = panel_block(&title, focused);
    let p = Paragraph::new(lines).block(block);
    f.render_widget(p, area);
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn handle_key(table: &mut TableState, key: KeyEvent) -> RowsKeyResult {
    let cols = table.def.columns.len();
    if table.editing {
        let Some(cell) = table
            .rows
            .get_mut(table.cursor_row)
            .and_then(|r| r.values.get_mut(table.cursor_col))
        else {
            table.editing = false;
            return RowsKeyResult::Handled;
        };
        return match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                table.editing = false;
                RowsKeyResult::Handled
            }
            KeyCode::Backspace => {
                cell.pop();
                RowsKeyResult::Changed
            }
            KeyCode::Char(c) => {
                cell.push(c);
                RowsKeyResult::Changed
            }
            _ => RowsKeyResult::Handled,
        };
    }
    match key.code {
        KeyCode::Up => {
            if table.cursor_row > 0 {
                table.cursor_row -= 1;
                RowsKeyResult::Handled
            } else {
                RowsKeyResult::Ignored
            }
        }
        KeyCode::Down => {
            if table.cursor_row + 1 < table.rows.len() {
                table.cursor_row += 1;
                RowsKeyResult::Handled
            } else {
                RowsKeyResult::Ignored
            }
        }
        KeyCode::Left => {
            if table.cursor_col > 0 {
                table.cursor_col -= 1;
            }
            RowsKeyResult::Handled
        }
        KeyCode::Right => {
            if table.cursor_col + 1 < cols {
                table.cursor_col += 1;
            }
            RowsKeyResult::Handled
        }
        KeyCode::Enter => {
            if table.rows.is_empty() {
                return RowsKeyResult::AddRow;
            }
            table.editing = true;
            RowsKeyResult::Handled
        }
        KeyCode::Char('a') | KeyCode::Char('A') => RowsKeyResult::AddRow,
        KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Delete => {
            if table.rows.is_empty() {
                RowsKeyResult::Handled
            } else {
                RowsKeyResult::RemoveRow(table.cursor_row)
            }
        }
        _ => RowsKeyResult::Ignored,
    }
}
