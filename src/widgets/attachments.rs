use crate::report::attachments::AttachmentSlot;
use crate::widgets::chrome::panel_block;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachKeyResult {
    Ignored,
    Handled,
    Changed,
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

pub fn draw_slot(f: &mut Frame, area: Rect, slot: &AttachmentSlot, focused: bool) {
    let mut lines: Vec<Line> = Vec::new();
    let mut input = slot.input.clone();
    if focused {
        input.push('▏');
    }
    lines.push(Line::from(vec![
        Span::raw("Add path: "),
        Span::styled(
            input,
            if focused {
                crate::theme::text_editing_bold()
            } else {
                Style::default()
            },
        ),
    ]));
    lines.push(Line::from(""));
    if slot.files.is_empty() {
        lines.push(Line::from(Span::styled(
            "  (no files attached)",
            crate::theme::text_muted(),
        )));
    }
    for (i, file) in slot.files.iter().enumerate() {
        let cur = if focused && i == slot.cursor { '›' } else { ' ' };
        let kind = if file.is_image { "img" } else { "   " };
        let style = if focused && i == slot.cursor {
            crate::theme::list_cursor_style()
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{cur} ")),
            Span::styled(format!("[{kind}] {}", file.name), style),
            Span::styled(
                format!("  {}", human_size(file.size)),
                crate::theme::text_muted(),
            ),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter add • Del remove • paths accumulate across entries",
        crate::theme::text_muted(),
    )));
    let title = format!("{} ({})", slot.title, slot.files.len());
    let block = panel_block(&title, focused);
    let p = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

pub fn handle_key(
    slot: &mut AttachmentSlot,
    key: KeyEvent,
    log: &mut dyn FnMut(String),
) -> AttachKeyResult {
    match key.code {
        KeyCode::Char(c) => {
            slot.input.push(c);
            AttachKeyResult::Handled
        }
        KeyCode::Backspace => {
            slot.input.pop();
            AttachKeyResult::Handled
        }
        KeyCode::Enter => {
            let path = slot.input.trim().to_string();
            if path.is_empty() {
                return AttachKeyResult::Handled;
            }
            slot.input.clear();
            let added = slot.add_paths([path], log);
            if added > 0 {
                AttachKeyResult::Changed
            } else {
                AttachKeyResult::Handled
            }
        }
        KeyCode::Up => {
            if slot.cursor > 0 {
                slot.cursor -= 1;
                AttachKeyResult::Handled
            } else {
                AttachKeyResult::Ignored
            }
        }
        KeyCode::Down => {
            if slot.cursor + 1 < slot.files.len() {
                slot.cursor += 1;
                AttachKeyResult::Handled
            } else {
                AttachKeyResult::Ignored
            }
        }
        KeyCode::Delete => {
            let idx = slot.cursor;
            if slot.remove(idx) {
                AttachKeyResult::Changed
            } else {
                // If the set got inconsistent, rebuild it wholesale
                slot.refresh_from_disk(log);
                AttachKeyResult::Handled
            }
        }
        _ => AttachKeyResult::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typed_path_is_added_on_enter() {
        let dir = std::env::temp_dir().join(format!(
            "sat-tui-attach-widget-{}",
            crate::draft::temporary_submission_id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("shot.png");
        std::fs::write(&file, b"img").unwrap();

        let mut slot = AttachmentSlot::new("scada_screens", "SCADA Screenshots");
        let mut log = |_m: String| {};
        for c in file.to_string_lossy().chars() {
            handle_key(&mut slot, key(KeyCode::Char(c)), &mut log);
        }
        assert_eq!(
            handle_key(&mut slot, key(KeyCode::Enter), &mut log),
            AttachKeyResult::Changed
        );
        assert_eq!(slot.files.len(), 1);
        assert!(slot.input.is_empty());
    }

    #[test]
    fn bad_path_is_logged_and_not_changed() {
        let mut slot = AttachmentSlot::new("s", "S");
        slot.input = "/missing/file.png".into();
        let mut msgs: Vec<String> = Vec::new();
        assert_eq!(
            handle_key(&mut slot, key(KeyCode::Enter), &mut |m| msgs.push(m)),
            AttachKeyResult::Handled
        );
        assert_eq!(msgs.len(), 1);
    }
}
