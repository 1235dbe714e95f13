use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::ui::AppState;
use crate::widgets::chrome::panel_block;

/// Left-hand progress rail: one entry per wizard step, exactly one active.
pub fn draw_progress_rail(f: &mut Frame, area: Rect, state: &AppState, focused: bool) {
    let current = state.wizard.current;
    let mut lines: Vec<Line> = Vec::new();
    for (i, step) in state.wizard.steps.iter().enumerate() {
        let n = i + 1;
        let active = n == current;
        let marker = if active {
            "›"
        } else if n < current {
            "✓"
        } else {
            " "
        };
        let style = if active {
            crate::theme::list_cursor_style()
        } else if n < current {
            crate::theme::text_success()
        } else {
            crate::theme::text_muted()
        };
        let label = format!("{marker} {n:>2}. {}", step.def.title);
        lines.push(Line::from(Span::styled(label, style)));
        if active {
            if let Some(err) = step
                .form
                .fields
                .iter()
                .filter_map(|fld| fld.error.as_deref())
                .next()
            {
                lines.push(Line::from(Span::styled(
                    format!("      ! {err}"),
                    crate::theme::text_error(),
                )));
            }
        }
    }
    let block = panel_block("Steps", focused);
    let p = Paragraph::new(lines).block(block);
    f.render_widget(p, area);
}
