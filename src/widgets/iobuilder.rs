use crate::report::iobuilder::{IoBuilder, MODBUS_DATA_TYPES};
use crate::services::api::{GeneratedTables, SpecSource};
use crate::widgets::chrome::panel_block;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Modules,
    Ranges,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRemove {
    Module(usize),
    Range(usize),
}

/// View-local state of the I/O builder screen.
#[derive(Debug, Clone)]
pub struct IoView {
    pub section: Section,
    pub field: usize,
    pub list_cursor: usize,
    pub confirm: Option<PendingRemove>,
}

impl Default for IoView {
    fn default() -> Self {
        Self {
            section: Section::Modules,
            field: 0,
            list_cursor: 0,
            confirm: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoAction {
    None,
    Handled,
    Lookup,
    AddModule,
    AddRange,
    RemoveModule(usize),
    RemoveRange(usize),
    Generate,
    Populate,
}

const MODULE_FIELDS: usize = 9;
const MODULE_LOOKUP_BTN: usize = MODULE_FIELDS;
const MODULE_ADD_BTN: usize = MODULE_FIELDS + 1;
const RANGE_FIELDS: usize = 5;
const RANGE_ADD_BTN: usize = RANGE_FIELDS;

const COMPANIES: &[&str] = &["Siemens", "Allen-Bradley", "Schneider", "ABB", "Omron"];

fn module_input_mut(iob: &mut IoBuilder, idx: usize) -> Option<&mut String> {
    match idx {
        1 => Some(&mut iob.model),
        2 => Some(&mut iob.rack_no),
        3 => Some(&mut iob.position),
        4 => Some(&mut iob.starting_sno),
        5 => Some(&mut iob.manual.di),
        6 => Some(&mut iob.manual.do_),
        7 => Some(&mut iob.manual.ai),
        8 => Some(&mut iob.manual.ao),
        _ => None,
    }
}

fn range_input_mut(iob: &mut IoBuilder, idx: usize) -> Option<&mut String> {
    match idx {
        0 => Some(&mut iob.modbus_start),
        1 => Some(&mut iob.modbus_end),
        3 => Some(&mut iob.modbus_description),
        4 => Some(&mut iob.modbus_label),
        _ => None,
    }
}

fn cycle_company(iob: &mut IoBuilder, dir: i32) {
    let cur = COMPANIES
        .iter()
        .position(|c| *c == iob.company)
        .unwrap_or(0);
    let next = if dir >= 0 {
        (cur + 1) % COMPANIES.len()
    } else {
        (cur + COMPANIES.len() - 1) % COMPANIES.len()
    };
    iob.company = COMPANIES[next].to_string();
    // New vendor invalidates the scratch spec
    iob.model.clear();
    iob.scratch = None;
}

pub fn handle_key(view: &mut IoView, iob: &mut IoBuilder, key: KeyEvent) -> IoAction {
    // Confirmation prompt swallows keys until resolved
    if let Some(pending) = view.confirm {
        return match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                view.confirm = None;
                match pending {
                    PendingRemove::Module(i) => IoAction::RemoveModule(i),
                    PendingRemove::Range(i) => IoAction::RemoveRange(i),
                }
            }
            _ => {
                view.confirm = None;
                IoAction::Handled
            }
        };
    }
    match key.code {
        KeyCode::Tab => {
            view.section = match view.section {
                Section::Modules => Section::Ranges,
                Section::Ranges => Section::Summary,
                Section::Summary => Section::Modules,
            };
            view.field = 0;
            view.list_cursor = 0;
            IoAction::Handled
        }
        KeyCode::BackTab => {
            view.section = match view.section {
                Section::Modules => Section::Summary,
                Section::Ranges => Section::Modules,
                Section::Summary => Section::Ranges,
            };
            view.field = 0;
            view.list_cursor = 0;
            IoAction::Handled
        }
        _ => match view.section {
            Section::Modules => handle_modules_key(view, iob, key),
            Section::Ranges => handle_ranges_key(view, iob, key),
            Section::Summary => handle_summary_key(view, iob, key),
        },
    }
}

fn handle_modules_key(view: &mut IoView, iob: &mut IoBuilder, key: KeyEvent) -> IoAction {
    match key.code {
        KeyCode::Up => {
            view.field = view.field.saturating_sub(1);
            IoAction::Handled
        }
        KeyCode::Down => {
            if view.field < MODULE_ADD_BTN {
                view.field += 1;
            }
            IoAction::Handled
        }
        KeyCode::Left => {
            if view.field == 0 {
                cycle_company(iob, -1);
            }
            IoAction::Handled
        }
        KeyCode::Right => {
            if view.field == 0 {
                cycle_company(iob, 1);
            }
            IoAction::Handled
        }
        KeyCode::Enter => match view.field {
            MODULE_LOOKUP_BTN => IoAction::Lookup,
            MODULE_ADD_BTN => IoAction::AddModule,
            0 => {
                cycle_company(iob, 1);
                IoAction::Handled
            }
            _ => {
                view.field = (view.field + 1).min(MODULE_ADD_BTN);
                IoAction::Handled
            }
        },
        KeyCode::Backspace => {
            if let Some(s) = module_input_mut(iob, view.field) {
                s.pop();
            }
            IoAction::Handled
        }
        KeyCode::Char(c) => {
            if let Some(s) = module_input_mut(iob, view.field) {
                // Numeric-only inputs past the model field
                if view.field <= 1 || c.is_ascii_digit() {
                    s.push(c);
                }
            }
            IoAction::Handled
        }
        _ => IoAction::None,
    }
}

fn handle_ranges_key(view: &mut IoView, iob: &mut IoBuilder, key: KeyEvent) -> IoAction {
    match key.code {
        KeyCode::Up => {
            view.field = view.field.saturating_sub(1);
            IoAction::Handled
        }
        KeyCode::Down => {
            if view.field < RANGE_ADD_BTN {
                view.field += 1;
            }
            IoAction::Handled
        }
        KeyCode::Left => {
            if view.field == 2 {
                iob.modbus_type =
                    (iob.modbus_type + MODBUS_DATA_TYPES.len() - 1) % MODBUS_DATA_TYPES.len();
            }
            IoAction::Handled
        }
        KeyCode::Right => {
            if view.field == 2 {
                iob.modbus_type = (iob.modbus_type + 1) % MODBUS_DATA_TYPES.len();
            }
            IoAction::Handled
        }
        KeyCode::Enter => match view.field {
            RANGE_ADD_BTN => IoAction::AddRange,
            _ => {
                view.field = (view.field + 1).min(RANGE_ADD_BTN);
                IoAction::Handled
            }
        },
        KeyCode::Backspace => {
            if let Some(s) = range_input_mut(iob, view.field) {
                s.pop();
            }
            IoAction::Handled
        }
        KeyCode::Char(c) => {
            if let Some(s) = range_input_mut(iob, view.field) {
                // Addresses are numeric; description/label free text
                if view.field >= 3 || c.is_ascii_digit() {
                    s.push(c);
                }
            }
            IoAction::Handled
        }
        _ => IoAction::None,
    }
}

fn handle_summary_key(view: &mut IoView, iob: &mut IoBuilder, key: KeyEvent) -> IoAction {
    let list_len = iob.modules.len() + iob.ranges.len();
    match key.code {
        KeyCode::Up => {
            view.list_cursor = view.list_cursor.saturating_sub(1);
            IoAction::Handled
        }
        KeyCode::Down => {
            if view.list_cursor + 1 < list_len {
                view.list_cursor += 1;
            }
            IoAction::Handled
        }
        KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Delete => {
            if view.list_cursor < iob.modules.len() {
                view.confirm = Some(PendingRemove::Module(view.list_cursor));
            } else if view.list_cursor < list_len {
                view.confirm =
                    Some(PendingRemove::Range(view.list_cursor - iob.modules.len()));
            }
            IoAction::Handled
        }
        KeyCode::Char('g') | KeyCode::Char('G') => IoAction::Generate,
        KeyCode::Char('p') | KeyCode::Char('P') => IoAction::Populate,
        _ => IoAction::None,
    }
}

fn input_line<'a>(label: &str, value: &str, focused: bool) -> Line<'a> {
    let mut v = value.to_string();
    if focused {
        v.push('▏');
    }
    let style = if focused {
        crate::theme::text_editing_bold()
    } else {
        Style::default()
    };
    let sel = if focused { '›' } else { ' ' };
    Line::from(vec![
        Span::raw(format!("{sel} {label}: ")),
        Span::styled(v, style),
    ])
}

fn button_line<'a>(label: &str, focused: bool, enabled: bool) -> Line<'a> {
    let style = if focused {
        crate::theme::list_cursor_style()
    } else if enabled {
        crate::theme::text_active_bold()
    } else {
        crate::theme::text_muted()
    };
    Line::from(Span::styled(format!("  [ {label} ]"), style))
}

fn source_badge(source: SpecSource) -> Span<'static> {
    let color = match source {
        SpecSource::Cached => Color::Yellow,
        SpecSource::Web => Color::Cyan,
        SpecSource::Manual => Color::Magenta,
    };
    Span::styled(
        format!("[{}]", source.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

pub fn draw(
    f: &mut Frame,
    area: Rect,
    view: &IoView,
    iob: &IoBuilder,
    generated: Option<&GeneratedTables>,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);
    draw_modules_panel(f, chunks[0], view, iob);
    draw_ranges_panel(f, chunks[1], view, iob);
    draw_summary_panel(f, chunks[2], view, iob, generated);
}

fn draw_modules_panel(f: &mut Frame, area: Rect, view: &IoView, iob: &IoBuilder) {
    let focused = view.section == Section::Modules;
    let fsel = |i: usize| focused && view.field == i;
    let mut lines: Vec<Line> = Vec::new();
    let company = if iob.company.is_empty() {
        "(choose with ←/→)".to_string()
    } else {
        iob.company.clone()
    };
    lines.push(Line::from(vec![
        Span::raw(format!("{} Company: ", if fsel(0) { '›' } else { ' ' })),
        Span::styled(
            company,
            if fsel(0) {
                crate::theme::text_editing_bold()
            } else {
                Style::default()
            },
        ),
    ]));
    lines.push(input_line("Model", &iob.model, fsel(1)));
    lines.push(input_line("Rack", &iob.rack_no, fsel(2)));
    lines.push(input_line("Position", &iob.position, fsel(3)));
    lines.push(input_line("Starting S.No", &iob.starting_sno, fsel(4)));
    lines.push(Line::from(""));
    if let Some(scratch) = &iob.scratch {
        let mut hdr = vec![Span::raw("Spec "), source_badge(scratch.source)];
        hdr.push(Span::raw(format!(
            "  {}",
            if scratch.spec.description.is_empty() {
                "N/A"
            } else {
                scratch.spec.description.as_str()
            }
        )));
        lines.push(Line::from(hdr));
        lines.push(Line::from(Span::styled(
            format!(
                "  DI {}  DO {}  AI {}  AO {}  total {}",
                scratch.spec.digital_inputs,
                scratch.spec.digital_outputs,
                scratch.spec.analog_inputs,
                scratch.spec.analog_outputs,
                scratch.spec.total().max(scratch.spec.total_channels)
            ),
            crate::theme::text_muted(),
        )));
        if iob.manual_required {
            lines.push(Line::from(Span::styled(
                "  Module not found — enter channel counts below:",
                Style::default().fg(Color::Yellow),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "  Found — adjust the values below if needed:",
                crate::theme::text_success(),
            )));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "No spec looked up yet",
            crate::theme::text_muted(),
        )));
    }
    lines.push(input_line("Manual DI", &iob.manual.di, fsel(5)));
    lines.push(input_line("Manual DO", &iob.manual.do_, fsel(6)));
    lines.push(input_line("Manual AI", &iob.manual.ai, fsel(7)));
    lines.push(input_line("Manual AO", &iob.manual.ao, fsel(8)));
    lines.push(Line::from(""));
    lines.push(button_line("Lookup", fsel(MODULE_LOOKUP_BTN), true));
    lines.push(button_line(
        "Add Module",
        fsel(MODULE_ADD_BTN),
        iob.scratch.is_some(),
    ));
    let block = panel_block("Module", focused);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_ranges_panel(f: &mut Frame, area: Rect, view: &IoView, iob: &IoBuilder) {
    let focused = view.section == Section::Ranges;
    let fsel = |i: usize| focused && view.field == i;
    let mut lines: Vec<Line> = Vec::new();
    lines.push(input_line("Start address", &iob.modbus_start, fsel(0)));
    lines.push(input_line("End address", &iob.modbus_end, fsel(1)));
    let dtype = MODBUS_DATA_TYPES
        .get(iob.modbus_type)
        .copied()
        .unwrap_or("holding");
    lines.push(Line::from(vec![
        Span::raw(format!("{} Data type: ", if fsel(2) { '›' } else { ' ' })),
        Span::styled(
            format!("‹ {dtype} ›"),
            if fsel(2) {
                crate::theme::text_editing_bold()
            } else {
                Style::default()
            },
        ),
    ]));
    lines.push(input_line("Description", &iob.modbus_description, fsel(3)));
    lines.push(input_line("Range label", &iob.modbus_label, fsel(4)));
    lines.push(Line::from(""));
    lines.push(button_line("Add Range", fsel(RANGE_ADD_BTN), true));
    let block = panel_block("Modbus Range", focused);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_summary_panel(
    f: &mut Frame,
    area: Rect,
    view: &IoView,
    iob: &IoBuilder,
    generated: Option<&GeneratedTables>,
) {
    let focused = view.section == Section::Summary;
    let mut lines: Vec<Line> = Vec::new();
    let stats = iob.stats();
    lines.push(Line::from(Span::styled(
        format!(
            "modules {}  (digital {}, analog {}, mixed {})  ranges {}",
            stats.total,
            stats.digital,
            stats.analog,
            stats.mixed,
            iob.ranges.len()
        ),
        crate::theme::text_muted(),
    )));
    lines.push(Line::from(""));
    if iob.modules.is_empty() && iob.ranges.is_empty() {
        lines.push(Line::from(Span::styled(
            "Nothing configured yet — add modules or ranges",
            crate::theme::text_muted(),
        )));
    }
    for (i, m) in iob.modules.iter().enumerate() {
        let here = focused && view.list_cursor == i;
        let style = if here {
            crate::theme::list_cursor_style()
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!(
                "{} {} {}  rack {} pos {}  {}ch",
                if here { '›' } else { ' ' },
                m.company,
                m.model,
                m.rack_no,
                m.module_position,
                m.total_channels()
            ),
            style,
        )));
    }
    for (i, r) in iob.ranges.iter().enumerate() {
        let idx = iob.modules.len() + i;
        let here = focused && view.list_cursor == idx;
        let style = if here {
            crate::theme::list_cursor_style()
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!(
                "{} {}  {}-{}  ({})",
                if here { '›' } else { ' ' },
                r.description,
                r.start_address,
                r.end_address,
                r.data_type
            ),
            style,
        )));
    }
    if let Some(pending) = view.confirm {
        let what = match pending {
            PendingRemove::Module(_) => "module",
            PendingRemove::Range(_) => "Modbus range",
        };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Remove this {what}? Enter/y confirm • any other key cancels"),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(""));
    if let Some(gen) = generated {
        lines.push(Line::from(Span::styled(
            "Last generation:",
            crate::theme::text_active_bold(),
        )));
        let s = &gen.summary;
        lines.push(Line::from(Span::styled(
            format!(
                "  DI {}  DO {}  AI {}  AO {}  MbD {}  MbA {}",
                s.total_digital_inputs,
                s.total_digital_outputs,
                s.total_analog_inputs,
                s.total_analog_outputs,
                s.total_modbus_digital,
                s.total_modbus_analog
            ),
            crate::theme::text_muted(),
        )));
        lines.push(Line::from(Span::styled(
            "  v full preview • p push rows into the report tables",
            crate::theme::text_muted(),
        )));
    }
    lines.push(Line::from(Span::styled(
        if iob.can_generate() {
            "g generate tables • d remove entry"
        } else {
            "configure a module or range to enable generation"
        },
        crate::theme::text_muted(),
    )));
    let block = panel_block("Configured", focused);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn lookup_button_emits_action() {
        let mut view = IoView::default();
        let mut iob = IoBuilder::default();
        view.field = MODULE_LOOKUP_BTN;
        assert_eq!(handle_key(&mut view, &mut iob, key(KeyCode::Enter)), IoAction::Lookup);
    }

    #[test]
    fn typing_fills_model_and_numeric_guard_holds() {
        let mut view = IoView::default();
        let mut iob = IoBuilder::default();
        view.field = 1;
        handle_key(&mut view, &mut iob, key(KeyCode::Char('S')));
        handle_key(&mut view, &mut iob, key(KeyCode::Char('M')));
        assert_eq!(iob.model, "SM");
        view.field = 2; // rack is numeric-only
        handle_key(&mut view, &mut iob, key(KeyCode::Char('x')));
        handle_key(&mut view, &mut iob, key(KeyCode::Char('4')));
        assert_eq!(iob.rack_no, "4");
    }

    #[test]
    fn removal_is_confirmation_gated() {
        let mut view = IoView::default();
        let mut iob = IoBuilder::default();
        iob.ranges.push(crate::report::iobuilder::ModbusRange {
            start_address: 1,
            end_address: 2,
            data_type: "holding".into(),
            description: "r".into(),
            range: String::new(),
        });
        view.section = Section::Summary;
        // 'd' arms the confirmation, nothing removed yet
        assert_eq!(handle_key(&mut view, &mut iob, key(KeyCode::Char('d'))), IoAction::Handled);
        assert!(view.confirm.is_some());
        // Esc cancels
        assert_eq!(handle_key(&mut view, &mut iob, key(KeyCode::Esc)), IoAction::Handled);
        assert!(view.confirm.is_none());
        // Re-arm and confirm
        handle_key(&mut view, &mut iob, key(KeyCode::Char('d')));
        assert_eq!(
            handle_key(&mut view, &mut iob, key(KeyCode::Enter)),
            IoAction::RemoveRange(0)
        );
    }

    #[test]
    fn company_cycles_and_invalidates_scratch() {
        let mut view = IoView::default();
        let mut iob = IoBuilder::default();
        iob.scratch = Some(crate::report::iobuilder::ScratchSpec {
            spec: Default::default(),
            source: SpecSource::Cached,
        });
        handle_key(&mut view, &mut iob, key(KeyCode::Right));
        assert!(!iob.company.is_empty());
        assert!(iob.scratch.is_none());
    }
}
