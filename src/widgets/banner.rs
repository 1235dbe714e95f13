use ratatui::layout::Rect;
use ratatui::prelude::Frame;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::ui::AppState;

/// Top banner: centered title over the ambient background, separated from
/// the body by a bottom border.
pub fn draw_banner(f: &mut Frame, area: Rect, state: &AppState) {
    let border = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(if state.busy() {
            crate::theme::ACCENT
        } else {
            crate::theme::MUTED
        }));
    let inner = border.inner(area);

    if state.animations_enabled {
        crate::visuals::draw_ambient_bg(f, inner, &state.theme, state.tick);
    }

    let title = if state.logo_lines.is_empty() {
        vec![state
            .config
            .header
            .clone()
            .unwrap_or_else(|| "SAT Report Builder".to_string())]
    } else {
        state.logo_lines.clone()
    };
    let lw = title
        .iter()
        .map(|s| s.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let logo_w = lw.min(inner.width);
    let lx = if inner.width > lw {
        inner.x + (inner.width - lw) / 2
    } else {
        inner.x
    };
    let needed_h: u16 = title.len() as u16;
    let ly = if inner.height > needed_h {
        inner.y + (inner.height - needed_h) / 2
    } else {
        inner.y
    };
    let logo_style = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    for (i, s) in title.iter().enumerate() {
        let area_i = Rect {
            x: lx,
            y: ly.saturating_add(i as u16),
            width: logo_w,
            height: 1,
        };
        let p = Paragraph::new(Line::from(Span::styled(s.clone(), logo_style)))
            .alignment(ratatui::layout::Alignment::Left)
            .wrap(Wrap { trim: true });
        f.render_widget(p, area_i);
    }

    f.render_widget(border, area);
}
