use crate::widgets::form::{
    compute_select_window, validate_text_inline, FieldKind, FieldValue, FormState,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use tui_textarea::TextArea;

/// Modal editor for textarea fields, overlaid on the step form.
pub struct TextAreaOverlay {
    pub field: String,
    pub ta: TextArea<'static>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKeyResult {
    Ignored,
    Handled,
    Changed,
}

fn make_overlay(field: &crate::widgets::form::FormField) -> TextAreaOverlay {
    let mut ta = TextArea::default();
    if let FieldValue::Text(txt) = &field.value {
        if !txt.is_empty() {
            ta.insert_str(txt);
        }
    }
    ta.set_block(
        ratatui::widgets::Block::default()
            .borders(ratatui::widgets::Borders::ALL)
            .title(format!("Editing: {} — Ctrl+S Save • Esc Cancel", field.label)),
    );
    TextAreaOverlay {
        field: field.name.clone(),
        ta,
    }
}

// Bridge our event stream into the crossterm version tui-textarea links.
fn to_rt_key(key: KeyEvent) -> Option<rt_event::KeyEvent> {
    let code = match key.code {
        KeyCode::Char(c) => rt_event::KeyCode::Char(c),
        KeyCode::Enter => rt_event::KeyCode::Enter,
        KeyCode::Backspace => rt_event::KeyCode::Backspace,
        KeyCode::Delete => rt_event::KeyCode::Delete,
        KeyCode::Left => rt_event::KeyCode::Left,
        KeyCode::Right => rt_event::KeyCode::Right,
        KeyCode::Up => rt_event::KeyCode::Up,
        KeyCode::Down => rt_event::KeyCode::Down,
        KeyCode::Home => rt_event::KeyCode::Home,
        KeyCode::End => rt_event::KeyCode::End,
        KeyCode::Tab => rt_event::KeyCode::Tab,
        _ => return None,
    };
    let mut mods = rt_event::KeyModifiers::NONE;
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        mods |= rt_event::KeyModifiers::SHIFT;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        mods |= rt_event::KeyModifiers::CONTROL;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        mods |= rt_event::KeyModifiers::ALT;
    }
    Some(rt_event::KeyEvent::new(code, mods))
}

pub fn render_overlay(f: &mut Frame, area: Rect, overlay: &TextAreaOverlay) {
    let rect = centered_rect(80, 70, area);
    f.render_widget(ratatui::widgets::Clear, rect);
    f.render_widget(&overlay.ta, rect);
}

/// Route one key into the step form. `Changed` means a field value moved and
/// the caller should run the persistence path.
pub fn handle_key(
    form: &mut FormState,
    overlay: &mut Option<TextAreaOverlay>,
    key: KeyEvent,
) -> FormKeyResult {
    // Modal textarea editor swallows everything while open
    if let Some(ov) = overlay {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            let text = ov.ta.lines().join("\n");
            let name = ov.field.clone();
            *overlay = None;
            if let Some(fld) = form.fields.iter_mut().find(|f| f.name == name) {
                fld.value = FieldValue::Text(text);
                validate_text_inline(fld);
            }
            form.editing = false;
            return FormKeyResult::Changed;
        }
        if key.code == KeyCode::Esc {
            *overlay = None;
            form.editing = false;
            return FormKeyResult::Handled;
        }
        if let Some(ev) = to_rt_key(key) {
            let _ = ov.ta.input(ev);
        }
        return FormKeyResult::Handled;
    }

    if form.fields.is_empty() {
        return FormKeyResult::Ignored;
    }
    let sel = form.selected.min(form.fields.len() - 1);
    match key.code {
        KeyCode::Up => {
            if form.editing {
                if let Some(fld) = form.fields.get_mut(sel) {
                    if let FieldKind::Select { cursor, offset, .. } = &mut fld.kind {
                        if *cursor > 0 {
                            *cursor -= 1;
                        }
                        if *cursor < *offset {
                            *offset = *cursor;
                        }
                    }
                }
                FormKeyResult::Handled
            } else if form.selected > 0 {
                form.selected -= 1;
                FormKeyResult::Handled
            } else {
                FormKeyResult::Ignored
            }
        }
        KeyCode::Down => {
            if form.editing {
                if let Some(fld) = form.fields.get_mut(sel) {
                    if let FieldKind::Select {
                        options,
                        cursor,
                        offset,
                        ..
                    } = &mut fld.kind
                    {
                        if *cursor + 1 < options.len() {
                            *cursor += 1;
                        }
                        compute_select_window(cursor, offset);
                    }
                }
                FormKeyResult::Handled
            } else if form.selected + 1 < form.fields.len() {
                form.selected += 1;
                FormKeyResult::Handled
            } else {
                FormKeyResult::Ignored
            }
        }
        KeyCode::Left | KeyCode::Right => {
            if let Some(fld) = form.fields.get_mut(sel) {
                if let FieldKind::Select {
                    options,
                    cursor,
                    selected,
                    ..
                } = &mut fld.kind
                {
                    if form.editing {
                        *selected = *cursor;
                        form.editing = false;
                        return FormKeyResult::Changed;
                    }
                    if options.is_empty() {
                        return FormKeyResult::Handled;
                    }
                    // Quick change while browsing
                    if key.code == KeyCode::Left {
                        *selected = if *selected == 0 {
                            options.len() - 1
                        } else {
                            *selected - 1
                        };
                    } else {
                        *selected = (*selected + 1) % options.len();
                    }
                    *cursor = *selected;
                    return FormKeyResult::Changed;
                }
            }
            FormKeyResult::Ignored
        }
        KeyCode::Enter => {
            // Textarea opens the modal editor; handled before borrowing the
            // field mutably so the overlay can copy the current value.
            let is_textarea = matches!(
                form.fields.get(sel).map(|f| &f.kind),
                Some(FieldKind::TextArea { .. })
            );
            if is_textarea {
                if !form.editing {
                    form.editing = true;
                    if let Some(fld) = form.fields.get(sel) {
                        *overlay = Some(make_overlay(fld));
                    }
                }
                return FormKeyResult::Handled;
            }
            let Some(fld) = form.fields.get_mut(sel) else {
                return FormKeyResult::Ignored;
            };
            match (&mut fld.kind, &mut fld.value) {
                (FieldKind::Checkbox, FieldValue::Bool(b)) => {
                    *b = !*b;
                    FormKeyResult::Changed
                }
                (
                    FieldKind::Select {
                        cursor, selected, ..
                    },
                    _,
                ) => {
                    if form.editing {
                        *selected = *cursor;
                        form.editing = false;
                        FormKeyResult::Changed
                    } else {
                        *cursor = *selected;
                        form.editing = true;
                        FormKeyResult::Handled
                    }
                }
                _ => {
                    form.editing = !form.editing;
                    if !form.editing {
                        validate_text_inline(fld);
                    }
                    FormKeyResult::Handled
                }
            }
        }
        KeyCode::Backspace => {
            if !form.editing {
                return FormKeyResult::Ignored;
            }
            if let Some(fld) = form.fields.get_mut(sel) {
                if let FieldValue::Text(s) = &mut fld.value {
                    if !s.is_empty() {
                        s.pop();
                    }
                    validate_text_inline(fld);
                    return FormKeyResult::Changed;
                }
            }
            FormKeyResult::Handled
        }
        KeyCode::Esc => {
            if form.editing {
                form.editing = false;
                form.message = None;
                FormKeyResult::Handled
            } else {
                FormKeyResult::Ignored
            }
        }
        KeyCode::Char(c) => {
            if form.editing {
                if let Some(fld) = form.fields.get_mut(sel) {
                    match (&mut fld.kind, &mut fld.value) {
                        (FieldKind::Number { .. }, FieldValue::Text(s)) => {
                            if c.is_ascii_digit()
                                || (c == '.' && !s.contains('.'))
                                || (c == '-' && s.is_empty())
                            {
                                s.push(c);
                                validate_text_inline(fld);
                                return FormKeyResult::Changed;
                            }
                            return FormKeyResult::Handled;
                        }
                        (
                            FieldKind::Text | FieldKind::Email | FieldKind::Date,
                            FieldValue::Text(s),
                        ) => {
                            s.push(c);
                            validate_text_inline(fld);
                            return FormKeyResult::Changed;
                        }
                        _ => return FormKeyResult::Handled,
                    }
                }
                FormKeyResult::Handled
            } else if c == ' ' {
                if let Some(fld) = form.fields.get_mut(sel) {
                    if let (FieldKind::Checkbox, FieldValue::Bool(b)) =
                        (&fld.kind, &mut fld.value)
                    {
                        *b = !*b;
                        return FormKeyResult::Changed;
                    }
                }
                FormKeyResult::Ignored
            } else {
                FormKeyResult::Ignored
            }
        }
        _ => FormKeyResult::Ignored,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);
    let h = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(v[1]);
    h[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::form::FormField;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn text_form() -> FormState {
        FormState {
            title: "t".into(),
            fields: vec![
                FormField {
                    name: "client_name".into(),
                    label: "Client".into(),
                    required: true,
                    kind: FieldKind::Text,
                    value: FieldValue::Text(String::new()),
                    error: None,
                    pattern: None,
                },
                FormField {
                    name: "confirm".into(),
                    label: "Confirm".into(),
                    required: false,
                    kind: FieldKind::Checkbox,
                    value: FieldValue::Bool(false),
                    error: None,
                    pattern: None,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn typing_into_text_field_reports_changed() {
        let mut form = text_form();
        let mut overlay = None;
        assert_eq!(
            handle_key(&mut form, &mut overlay, key(KeyCode::Enter)),
            FormKeyResult::Handled
        );
        assert!(form.editing);
        assert_eq!(
            handle_key(&mut form, &mut overlay, key(KeyCode::Char('A'))),
            FormKeyResult::Changed
        );
        assert_eq!(form.fields[0].value, FieldValue::Text("A".into()));
        // Inline validation cleared the required error while typing
        assert!(form.fields[0].error.is_none());
    }

    #[test]
    fn checkbox_toggles_on_enter_and_space() {
        let mut form = text_form();
        form.selected = 1;
        let mut overlay = None;
        assert_eq!(
            handle_key(&mut form, &mut overlay, key(KeyCode::Enter)),
            FormKeyResult::Changed
        );
        assert_eq!(form.fields[1].value, FieldValue::Bool(true));
        assert_eq!(
            handle_key(&mut form, &mut overlay, key(KeyCode::Char(' '))),
            FormKeyResult::Changed
        );
        assert_eq!(form.fields[1].value, FieldValue::Bool(false));
    }

    #[test]
    fn textarea_overlay_commits_with_ctrl_s() {
        let mut form = FormState {
            title: "t".into(),
            fields: vec![FormField {
                name: "purpose".into(),
                label: "Purpose".into(),
                required: false,
                kind: FieldKind::TextArea {
                    edit_lines: 6,
                    offset: 0,
                },
                value: FieldValue::Text(String::new()),
                error: None,
                pattern: None,
            }],
            ..Default::default()
        };
        let mut overlay = None;
        handle_key(&mut form, &mut overlay, key(KeyCode::Enter));
        assert!(overlay.is_some());
        handle_key(&mut form, &mut overlay, key(KeyCode::Char('h')));
        handle_key(&mut form, &mut overlay, key(KeyCode::Char('i')));
        let res = handle_key(
            &mut form,
            &mut overlay,
            KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL),
        );
        assert_eq!(res, FormKeyResult::Changed);
        assert!(overlay.is_none());
        assert_eq!(form.fields[0].value, FieldValue::Text("hi".into()));
    }

    #[test]
    fn escape_cancels_overlay_without_writing() {
        let mut form = FormState {
            title: "t".into(),
            fields: vec![FormField {
                name: "scope".into(),
                label: "Scope".into(),
                required: false,
                kind: FieldKind::TextArea {
                    edit_lines: 6,
                    offset: 0,
                },
                value: FieldValue::Text("original".into()),
                error: None,
                pattern: None,
            }],
            ..Default::default()
        };
        let mut overlay = None;
        handle_key(&mut form, &mut overlay, key(KeyCode::Enter));
        handle_key(&mut form, &mut overlay, key(KeyCode::Char('x')));
        handle_key(&mut form, &mut overlay, key(KeyCode::Esc));
        assert!(overlay.is_none());
        assert_eq!(form.fields[0].value, FieldValue::Text("original".into()));
    }
}
