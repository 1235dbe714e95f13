use crate::report::assistant::{AssistantState, ChatRole, HINTS};
use crate::widgets::chrome::panel_block;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantAction {
    None,
    Handled,
    Send,
    Upload(String),
    Close,
}

/// Keys for the assistant panel. A ":attach <path>" input becomes a research
/// document upload instead of a chat message.
pub fn handle_key(assistant: &mut AssistantState, key: KeyEvent) -> AssistantAction {
    match key.code {
        KeyCode::Esc => AssistantAction::Close,
        KeyCode::Enter => {
            let text = assistant.input.trim().to_string();
            if let Some(path) = text.strip_prefix(":attach ") {
                let path = path.trim().to_string();
                assistant.input.clear();
                if path.is_empty() {
                    return AssistantAction::Handled;
                }
                return AssistantAction::Upload(path);
            }
            AssistantAction::Send
        }
        KeyCode::Tab => {
            // Cycle the canned hints through the input line
            let next = HINTS
                .iter()
                .position(|h| *h == assistant.input)
                .map(|i| (i + 1) % HINTS.len())
                .unwrap_or(0);
            assistant.input = HINTS[next].to_string();
            AssistantAction::Handled
        }
        KeyCode::Backspace => {
            if key.modifiers.contains(KeyModifiers::ALT) {
                assistant.input.clear();
            } else {
                assistant.input.pop();
            }
            AssistantAction::Handled
        }
        KeyCode::Up => {
            assistant.scroll_y = assistant.scroll_y.saturating_sub(1);
            AssistantAction::Handled
        }
        KeyCode::Down => {
            assistant.scroll_y = assistant.scroll_y.saturating_add(1);
            AssistantAction::Handled
        }
        KeyCode::Char(c) => {
            assistant.input.push(c);
            AssistantAction::Handled
        }
        _ => AssistantAction::None,
    }
}

pub fn draw(f: &mut Frame, area: Rect, assistant: &mut AssistantState, tick: u64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    if assistant.messages.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ask about the report, test procedures, or punch items.",
            crate::theme::text_muted(),
        )));
        lines.push(Line::from(Span::styled(
            "Tab cycles suggested prompts • :attach <path> uploads a document",
            crate::theme::text_muted(),
        )));
    }
    for msg in &assistant.messages {
        let (who, style) = match msg.role {
            ChatRole::User => (
                "you",
                Style::default()
                    .fg(crate::theme::SECONDARY)
                    .add_modifier(Modifier::BOLD),
            ),
            ChatRole::Assistant => (
                "assistant",
                Style::default()
                    .fg(crate::theme::PRIMARY)
                    .add_modifier(Modifier::BOLD),
            ),
        };
        lines.push(Line::from(Span::styled(format!("{who}:"), style)));
        match msg.role {
            ChatRole::Assistant => lines.extend(crate::widgets::markdown::render_markdown(&msg.text)),
            ChatRole::User => {
                for l in msg.text.lines() {
                    lines.push(Line::from(format!("  {l}")));
                }
            }
        }
        for meta in &msg.meta {
            lines.push(Line::from(Span::styled(
                format!("  {meta}"),
                crate::theme::text_muted(),
            )));
        }
        lines.push(Line::from(""));
    }
    if assistant.busy {
        lines.push(Line::from(Span::styled(
            format!("{} thinking…", crate::visuals::spinner_head(tick)),
            crate::theme::text_muted(),
        )));
    }
    // Stick to the bottom unless the user scrolled up
    let viewport = chunks[0].height.saturating_sub(2);
    let max_scroll = (lines.len() as u16).saturating_sub(viewport);
    if assistant.scroll_y == 0 || assistant.scroll_y > max_scroll {
        assistant.scroll_y = max_scroll;
    }
    let transcript = Paragraph::new(lines)
        .block(panel_block("Assistant", true))
        .wrap(Wrap { trim: false })
        .scroll((assistant.scroll_y, 0));
    f.render_widget(transcript, chunks[0]);

    let mut input = assistant.input.clone();
    input.push('▏');
    let input_line = Paragraph::new(Line::from(vec![
        Span::raw("> "),
        Span::styled(input, crate::theme::text_editing_bold()),
    ]))
    .block(panel_block("Message", false));
    f.render_widget(input_line, chunks[1]);
}
