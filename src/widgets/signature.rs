use crate::report::signature::Signature;
use crate::widgets::chrome::panel_block;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKeyResult {
    Ignored,
    Handled,
    Changed,
}

#[derive(Debug, Clone, Default)]
pub struct SignaturePane {
    pub input: String,
}

pub fn draw_signature(
    f: &mut Frame,
    area: Rect,
    pane: &SignaturePane,
    signature: &Signature,
    focused: bool,
) {
    let mut lines: Vec<Line> = Vec::new();
    let mut input = pane.input.clone();
    if focused {
        input.push('▏');
    }
    lines.push(Line::from(vec![
        Span::raw("Signature image: "),
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
    match signature.path() {
        Some(p) => lines.push(Line::from(vec![
            Span::styled("✓ captured  ", crate::theme::text_success()),
            Span::styled(p.to_string_lossy().to_string(), crate::theme::text_muted()),
        ])),
        None => lines.push(Line::from(Span::styled(
            "(no signature captured)",
            crate::theme::text_muted(),
        ))),
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter set from path • Del clear",
        crate::theme::text_muted(),
    )));
    let block = panel_block("Signature", focused);
    let p = Paragraph::new(lines).block(block);
    f.render_widget(p, area);
}

pub fn handle_key(
    pane: &mut SignaturePane,
    signature: &mut Signature,
    key: KeyEvent,
) -> SignatureKeyResult {
    match key.code {
        KeyCode::Char(c) => {
            pane.input.push(c);
            SignatureKeyResult::Handled
        }
        KeyCode::Backspace => {
            pane.input.pop();
            SignatureKeyResult::Handled
        }
        KeyCode::Enter => {
            let path = pane.input.trim().to_string();
            if path.is_empty() {
                return SignatureKeyResult::Handled;
            }
            if signature.set(path.as_str()) {
                pane.input.clear();
                SignatureKeyResult::Changed
            } else {
                SignatureKeyResult::Handled
            }
        }
        KeyCode::Delete => {
            if signature.is_present() {
                signature.clear();
                SignatureKeyResult::Changed
            } else {
                SignatureKeyResult::Handled
            }
        }
        _ => SignatureKeyResult::Ignored,
    }
}
