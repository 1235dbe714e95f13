use crate::model::{FieldDef, FieldType, StepDef};
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Text,
    Email,
    Date,
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    TextArea {
        edit_lines: usize,
        offset: usize,
    },
    Checkbox,
    Select {
        options: Vec<String>,
        values: Vec<String>,
        cursor: usize,
        selected: usize,
        offset: usize,
        // Role whose directory entries fill the options, when remote-sourced
        role_source: Option<String>,
    },
}

pub const OPTIONS_VISIBLE: usize = 8;

#[derive(Clone, Debug)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub kind: FieldKind,
    pub value: FieldValue,
    pub error: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct FormState {
    pub title: String,
    pub fields: Vec<FormField>,
    pub selected: usize,
    pub editing: bool,
    pub message: Option<String>,
}

pub fn field_from_def(def: &FieldDef) -> FormField {
    let kind = match def.field_type {
        FieldType::Text => FieldKind::Text,
        FieldType::Email => FieldKind::Email,
        FieldType::Date => FieldKind::Date,
        FieldType::Number => FieldKind::Number {
            minimum: def.min,
            maximum: def.max,
        },
        FieldType::Textarea => FieldKind::TextArea {
            edit_lines: 6,
            offset: 0,
        },
        FieldType::Checkbox => FieldKind::Checkbox,
        FieldType::Select => FieldKind::Select {
            options: def.options.clone(),
            values: def.options.clone(),
            cursor: 0,
            selected: 0,
            offset: 0,
            role_source: def.options_from_role.clone(),
        },
    };
    let value = match def.field_type {
        FieldType::Checkbox => FieldValue::Bool(false),
        _ => FieldValue::Text(String::new()),
    };
    FormField {
        name: def.name.clone(),
        label: def.label.clone(),
        required: def.required,
        kind,
        value,
        error: None,
        pattern: def.pattern.clone(),
    }
}

pub fn fields_from_step(step: &StepDef) -> Vec<FormField> {
    step.fields.iter().map(field_from_def).collect()
}

/// Replace directory-sourced select options with "Name <email>" entries,
/// keeping a previously selected email selected when it survives.
pub fn apply_role_options(
    fields: &mut [FormField],
    users: &std::collections::BTreeMap<String, Vec<crate::services::api::UserEntry>>,
) {
    for fld in fields.iter_mut() {
        if let FieldKind::Select {
            options,
            values,
            cursor,
            selected,
            offset,
            role_source: Some(role),
        } = &mut fld.kind
        {
            let Some(entries) = users.get(role) else {
                continue;
            };
            if entries.is_empty() {
                continue;
            }
            let prev = values.get(*selected).cloned();
            *options = entries
                .iter()
                .map(|u| format!("{} <{}>", u.name, u.email))
                .collect();
            *values = entries.iter().map(|u| u.email.clone()).collect();
            *selected = prev
                .and_then(|p| values.iter().position(|v| *v == p))
                .unwrap_or(0);
            *cursor = *selected;
            *offset = 0;
        }
    }
}

/// Snapshot value of a field; checkboxes contribute only when checked, like
/// unchecked inputs being skipped on serialization.
pub fn snapshot_value(fld: &FormField) -> Option<String> {
    match (&fld.kind, &fld.value) {
        (FieldKind::Checkbox, FieldValue::Bool(true)) => Some("on".to_string()),
        (FieldKind::Checkbox, _) => None,
        (
            FieldKind::Select {
                values, selected, ..
            },
            _,
        ) => values.get(*selected).cloned().filter(|v| !v.is_empty()),
        (_, FieldValue::Text(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Restore a saved value onto a field.
pub fn restore_value(fld: &mut FormField, saved: &str) {
    match &mut fld.kind {
        FieldKind::Checkbox => {
            fld.value = FieldValue::Bool(saved == "on" || saved == "true");
        }
        FieldKind::Select {
            values,
            cursor,
            selected,
            ..
        } => {
            if let Some(idx) = values.iter().position(|v| v == saved) {
                *selected = idx;
                *cursor = idx;
            }
        }
        _ => {
            fld.value = FieldValue::Text(saved.to_string());
        }
    }
}

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";

fn check_text_constraints(fld: &FormField, raw: &str) -> Option<String> {
    if fld.required && raw.is_empty() {
        return Some("This field is required".into());
    }
    if raw.is_empty() {
        return None;
    }
    match &fld.kind {
        FieldKind::Email => {
            let re = regex::Regex::new(EMAIL_PATTERN).ok()?;
            if !re.is_match(raw) {
                return Some("Please enter a valid email address".into());
            }
        }
        FieldKind::Date => {
            let re = regex::Regex::new(DATE_PATTERN).ok()?;
            if !re.is_match(raw) {
                return Some("Please enter a date as YYYY-MM-DD".into());
            }
        }
        FieldKind::Number { minimum, maximum } => match raw.parse::<f64>() {
            Ok(v) => {
                if let Some(minv) = minimum {
                    if v < *minv {
                        return Some(format!("Must be at least {minv}"));
                    }
                }
                if let Some(maxv) = maximum {
                    if v > *maxv {
                        return Some(format!("Must be at most {maxv}"));
                    }
                }
            }
            Err(_) => return Some("Invalid number".into()),
        },
        _ => {}
    }
    if let Some(pat) = &fld.pattern {
        if let Ok(re) = regex::Regex::new(pat) {
            if !re.is_match(raw) {
                return Some("Please enter a value in the required format".into());
            }
        }
    }
    None
}

/// Validate every field; sets per-field errors and returns overall validity.
pub fn validate_form(form: &mut FormState) -> bool {
    let mut ok = true;
    for fld in &mut form.fields {
        fld.error = None;
        match (&fld.kind, &fld.value) {
            (FieldKind::Checkbox, FieldValue::Bool(b)) => {
                if fld.required && !*b {
                    fld.error = Some("This box must be ticked".into());
                    ok = false;
                }
            }
            (FieldKind::Select { options, .. }, _) => {
                if fld.required && options.is_empty() {
                    fld.error = Some("No options available".into());
                    ok = false;
                }
            }
            (_, FieldValue::Text(s)) => {
                let raw = s.trim().to_string();
                if let Some(err) = check_text_constraints(fld, &raw) {
                    fld.error = Some(err);
                    ok = false;
                }
            }
            _ => {}
        }
    }
    if !ok {
        form.message = Some("Please fix the highlighted errors".into());
    } else {
        form.message = None;
    }
    ok
}

/// Inline feedback while typing.
pub fn validate_text_inline(fld: &mut FormField) {
    if let FieldValue::Text(s) = &fld.value {
        let raw = s.trim().to_string();
        fld.error = check_text_constraints(fld, &raw);
    }
}

/// Keep the select cursor inside its visible window.
pub fn compute_select_window(cursor: &mut usize, offset: &mut usize) {
    if *cursor >= *offset + OPTIONS_VISIBLE {
        *offset = *cursor + 1 - OPTIONS_VISIBLE;
    }
}

pub fn first_invalid(form: &FormState) -> Option<usize> {
    form.fields.iter().position(|f| f.error.is_some())
}

pub fn draw_form(f: &mut Frame, area: Rect, form: &mut FormState, highlight: bool, cursor_on: bool) {
    let mut lines: Vec<Line> = Vec::new();
    for (i, fld) in form.fields.iter().enumerate() {
        let sel = if i == form.selected { '›' } else { ' ' };
        let req = if fld.required { " *" } else { "" };
        let value_style = if i == form.selected {
            if form.editing {
                crate::theme::text_editing_bold()
            } else {
                crate::theme::text_active_bold()
            }
        } else {
            Style::default()
        };
        match &fld.kind {
            FieldKind::Text | FieldKind::Email | FieldKind::Date | FieldKind::Number { .. } => {
                let mut val = match &fld.value {
                    FieldValue::Text(s) => s.clone(),
                    FieldValue::Bool(b) => if *b { "On" } else { "Off" }.into(),
                };
                if form.editing && i == form.selected && cursor_on {
                    val.push('▏');
                }
                lines.push(Line::from(vec![
                    Span::raw(format!("{sel} {}{req}: ", fld.label)),
                    Span::styled(val, value_style),
                ]));
            }
            FieldKind::TextArea { edit_lines, offset } => {
                lines.push(Line::from(vec![Span::raw(format!(
                    "{sel} {}{req}:",
                    fld.label
                ))]));
                let mut text = String::new();
                if let FieldValue::Text(s) = &fld.value {
                    text = s.clone();
                }
                let body_lines: Vec<String> = if text.is_empty() {
                    vec![String::new()]
                } else {
                    text.lines().map(|l| l.to_string()).collect()
                };
                if form.editing && i == form.selected {
                    let total = body_lines.len();
                    let h = *edit_lines;
                    let start = (*offset).min(total);
                    let end = (start + h).min(total);
                    let mut window: Vec<String> = body_lines
                        .iter()
                        .skip(start)
                        .take(end - start)
                        .cloned()
                        .collect();
                    if cursor_on {
                        if let Some(last) = window.last_mut() {
                            last.push('▏');
                        }
                    }
                    for bl in window {
                        lines.push(Line::from(vec![
                            Span::raw("  "),
                            Span::styled(bl, value_style),
                        ]));
                    }
                } else {
                    for bl in body_lines {
                        lines.push(Line::from(vec![
                            Span::raw("  "),
                            Span::styled(bl, value_style),
                        ]));
                    }
                }
            }
            FieldKind::Checkbox => {
                let checked = matches!(fld.value, FieldValue::Bool(true));
                let val = if checked { "[x]" } else { "[ ]" };
                let st = if i == form.selected {
                    crate::theme::text_active_bold()
                } else {
                    Style::default()
                };
                lines.push(Line::from(vec![
                    Span::raw(format!("{sel} {}{req}: ", fld.label)),
                    Span::styled(val.to_string(), st),
                ]));
            }
            FieldKind::Select {
                options,
                cursor,
                selected,
                offset,
                ..
            } => {
                let summary = options
                    .get(*selected)
                    .cloned()
                    .unwrap_or_else(|| "(none)".into());
                lines.push(Line::from(vec![
                    Span::raw(format!("{sel} {}{req}: ", fld.label)),
                    Span::styled(summary, value_style),
                ]));
                if form.editing && i == form.selected {
                    let start = (*offset).min(options.len());
                    let end = (start + OPTIONS_VISIBLE).min(options.len());
                    for (oi, opt) in options.iter().enumerate().take(end).skip(start) {
                        let mark = if oi == *selected { "(•)" } else { "( )" };
                        let cur = if oi == *cursor { '›' } else { ' ' };
                        let st = if oi == *cursor {
                            crate::theme::list_cursor_style()
                        } else {
                            crate::theme::text_muted()
                        };
                        lines.push(Line::from(vec![Span::styled(
                            format!("  {cur} {mark} {opt}"),
                            st,
                        )]));
                    }
                }
            }
        }
        if let Some(err) = &fld.error {
            lines.push(Line::from(Span::styled(
                format!("  ! {err}"),
                crate::theme::text_error(),
            )));
        }
    }
    if let Some(msg) = &form.message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            msg.clone(),
            crate::theme::text_muted(),
        )));
    }
    let title = if form.editing {
        format!("{} — editing", form.title)
    } else {
        form.title.clone()
    };
    let block = panel_block(&title, highlight);
    let p = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_field(name: &str, required: bool, kind: FieldKind, val: &str) -> FormField {
        FormField {
            name: name.into(),
            label: name.into(),
            required,
            kind,
            value: FieldValue::Text(val.into()),
            error: None,
            pattern: None,
        }
    }

    #[test]
    fn required_empty_field_blocks_validation() {
        let mut form = FormState {
            title: "t".into(),
            fields: vec![text_field("client_name", true, FieldKind::Text, "")],
            ..Default::default()
        };
        assert!(!validate_form(&mut form));
        assert_eq!(
            form.fields[0].error.as_deref(),
            Some("This field is required")
        );
        assert_eq!(first_invalid(&form), Some(0));
    }

    #[test]
    fn email_and_date_constraints() {
        let mut form = FormState {
            title: "t".into(),
            fields: vec![
                text_field("approver_email", true, FieldKind::Email, "not-an-email"),
                text_field("date_of_issue", true, FieldKind::Date, "2026-08-06"),
            ],
            ..Default::default()
        };
        assert!(!validate_form(&mut form));
        assert!(form.fields[0]
            .error
            .as_deref()
            .unwrap()
            .contains("valid email"));
        assert!(form.fields[1].error.is_none());
        form.fields[0].value = FieldValue::Text("qa@example.com".into());
        assert!(validate_form(&mut form));
    }

    #[test]
    fn number_bounds_raise_errors() {
        let kind = FieldKind::Number {
            minimum: Some(1.0),
            maximum: Some(16.0),
        };
        let mut form = FormState {
            title: "t".into(),
            fields: vec![text_field("rack", true, kind, "20")],
            ..Default::default()
        };
        assert!(!validate_form(&mut form));
        assert!(form.fields[0]
            .error
            .as_deref()
            .unwrap()
            .contains("at most 16"));
    }

    #[test]
    fn required_checkbox_must_be_ticked() {
        let mut form = FormState {
            title: "t".into(),
            fields: vec![FormField {
                name: "confirm_accurate".into(),
                label: "Confirm".into(),
                required: true,
                kind: FieldKind::Checkbox,
                value: FieldValue::Bool(false),
                error: None,
                pattern: None,
            }],
            ..Default::default()
        };
        assert!(!validate_form(&mut form));
        form.fields[0].value = FieldValue::Bool(true);
        assert!(validate_form(&mut form));
    }

    #[test]
    fn snapshot_skips_unchecked_checkboxes() {
        let mut fld = FormField {
            name: "confirm_accurate".into(),
            label: "Confirm".into(),
            required: false,
            kind: FieldKind::Checkbox,
            value: FieldValue::Bool(false),
            error: None,
            pattern: None,
        };
        assert_eq!(snapshot_value(&fld), None);
        fld.value = FieldValue::Bool(true);
        assert_eq!(snapshot_value(&fld).as_deref(), Some("on"));
    }

    #[test]
    fn restore_select_by_stored_value() {
        let mut fld = FormField {
            name: "reviewed_by_pm".into(),
            label: "PM".into(),
            required: false,
            kind: FieldKind::Select {
                options: vec!["Pat <pat@x>".into(), "Sam <sam@x>".into()],
                values: vec!["pat@x".into(), "sam@x".into()],
                cursor: 0,
                selected: 0,
                offset: 0,
                role_source: None,
            },
            value: FieldValue::Text(String::new()),
            error: None,
            pattern: None,
        };
        restore_value(&mut fld, "sam@x");
        assert_eq!(snapshot_value(&fld).as_deref(), Some("sam@x"));
    }

    #[test]
    fn role_options_fill_and_keep_selection() {
        use crate::services::api::UserEntry;
        let mut fields = vec![FormField {
            name: "reviewed_by_pm".into(),
            label: "PM".into(),
            required: true,
            kind: FieldKind::Select {
                options: vec![],
                values: vec![],
                cursor: 0,
                selected: 0,
                offset: 0,
                role_source: Some("PM".into()),
            },
            value: FieldValue::Text(String::new()),
            error: None,
            pattern: None,
        }];
        let mut users = std::collections::BTreeMap::new();
        users.insert(
            "PM".to_string(),
            vec![
                UserEntry {
                    name: "Pat".into(),
                    email: "pat@example.com".into(),
                },
                UserEntry {
                    name: "Sam".into(),
                    email: "sam@example.com".into(),
                },
            ],
        );
        apply_role_options(&mut fields, &users);
        restore_value(&mut fields[0], "sam@example.com");
        // A second directory refresh keeps the chosen approver
        apply_role_options(&mut fields, &users);
        assert_eq!(
            snapshot_value(&fields[0]).as_deref(),
            Some("sam@example.com")
        );
    }
}
