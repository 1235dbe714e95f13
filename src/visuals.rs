use ratatui::layout::Rect;
use ratatui::prelude::Frame;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

use crate::theme::Theme;

pub fn spinner_head(tick: u64) -> char {
    const SPINNERS: [char; 8] = ['⣾', '⣽', '⣻', '⢿', '⡿', '⣟', '⣯', '⣷'];
    SPINNERS[(tick as usize / 2) % SPINNERS.len()]
}

/// Draw a subtle animated ambient background in the given area.
/// A dim dotted pattern that slowly shifts over time.
pub fn draw_ambient_bg(f: &mut Frame, area: Rect, theme: &Theme, tick: u64) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let mut lines: Vec<Line> = Vec::with_capacity(area.height as usize);
    let phase = (tick % 16) as u16;
    for y in 0..area.height {
        let mut s = String::with_capacity(area.width as usize);
        for x in 0..area.width {
            let v = (x + y + phase) % 8;
            if v == 0 {
                s.push('·');
            } else {
                s.push(' ');
            }
        }
        lines.push(Line::from(Span::styled(
            s,
            Style::default()
                .bg(theme.bg)
                .fg(theme.muted)
                .add_modifier(Modifier::DIM),
        )));
    }
    let p = Paragraph::new(lines)
        .style(Style::default().bg(theme.bg))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}
