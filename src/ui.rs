use crate::app::{update, AppMsg, Effect};
use crate::draft::timers::{AutosaveSchedule, Debounce, SERVER_SAVE_DEBOUNCE};
use crate::draft::{
    now_epoch_secs, temporary_submission_id, AutosaveRecord, DraftStore, SnapValue,
};
use crate::model::{validate_report_config, ReportConfig};
use crate::report::assistant::AssistantState;
use crate::report::attachments::AttachmentSlot;
use crate::report::iobuilder::IoBuilder;
use crate::report::rows::TableState;
use crate::report::signature::Signature;
use crate::report::wizard::WizardState;
use crate::services::api::{self, GeneratedTables, UserEntry};
use crate::services::backend;
use crate::widgets::form_widget::TextAreaOverlay;
use crate::widgets::iobuilder::IoView;
use crate::widgets::result_viewer::{ResultViewerWidget, ViewerAction};
use crate::widgets::signature::SignaturePane;

use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

#[derive(Clone, Copy)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    #[default]
    Welcome,
    Wizard,
    IoBuilder,
    Result,
}

/// One focusable pane of the active wizard step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneRef {
    Form,
    Table(String),
    Slot(String),
    Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    ModuleLookup,
    GenerateTables,
    Users,
    TokenRefresh,
    SaveProgress,
    Submit,
    AssistantUpload,
}

pub struct LoadMsg {
    #[allow(dead_code)]
    pub key: String,
    pub kind: LoadKind,
    pub outcome: Result<JsonValue, String>,
}

pub struct ProgressEvent {
    pub text: Option<String>,
    #[allow(dead_code)]
    pub percent: Option<f64>,
    pub done: bool,
    pub result: Option<JsonValue>,
    pub err: Option<String>,
}

pub(crate) struct AppState {
    pub(crate) config: ReportConfig,
    pub(crate) wizard: WizardState,
    pub(crate) tables: BTreeMap<String, TableState>,
    pub(crate) attachments: BTreeMap<String, AttachmentSlot>,
    pub(crate) signature: Signature,
    pub(crate) signature_pane: SignaturePane,
    pub(crate) iob: IoBuilder,
    pub(crate) io_view: IoView,
    pub(crate) assistant: AssistantState,
    pub(crate) users: BTreeMap<String, Vec<UserEntry>>,
    pub(crate) store: DraftStore,
    pub(crate) submission_id: String,
    pub(crate) session_token: Option<String>,
    pub(crate) autosave: AutosaveSchedule,
    pub(crate) server_debounce: Debounce,
    pub(crate) last_token_refresh: Option<Instant>,
    pub(crate) pending_restore: Option<AutosaveRecord>,
    pub(crate) view: View,
    pub(crate) pane: usize,
    pub(crate) overlay: Option<TextAreaOverlay>,
    pub(crate) tick: u64,
    pub(crate) active: bool,
    pub(crate) lookup_busy: bool,
    pub(crate) generate_busy: bool,
    pub(crate) submitting: bool,
    pub(crate) generated: Option<GeneratedTables>,
    pub(crate) result_viewer: Option<ResultViewerWidget>,
    pub(crate) toast: Option<Toast>,
    pub(crate) theme: crate::theme::Theme,
    pub(crate) animations_enabled: bool,
    pub(crate) logo_lines: Vec<String>,
    pub(crate) debug_log: VecDeque<String>,
    pub(crate) show_debug: bool,
    pub(crate) should_quit: bool,
    tx: Option<Sender<LoadMsg>>,
    rx: Option<Receiver<LoadMsg>>,
    p_tx: Option<Sender<ProgressEvent>>,
    p_rx: Option<Receiver<ProgressEvent>>,
}

impl AppState {
    pub fn new(config: ReportConfig) -> Self {
        let now = Instant::now();
        let wizard = WizardState::new(&config);
        let tables: BTreeMap<String, TableState> = config
            .tables
            .iter()
            .map(|t| (t.id.clone(), TableState::new(t.clone())))
            .collect();
        let attachments: BTreeMap<String, AttachmentSlot> = config
            .attachments
            .iter()
            .map(|a| (a.id.clone(), AttachmentSlot::new(&a.id, &a.title)))
            .collect();
        let store = DraftStore::from_env();
        let submission_id = store
            .load_current_id()
            .unwrap_or_else(temporary_submission_id);
        Self {
            config,
            wizard,
            tables,
            attachments,
            signature: Signature::default(),
            signature_pane: SignaturePane::default(),
            iob: IoBuilder::default(),
            io_view: IoView::default(),
            assistant: AssistantState::default(),
            users: BTreeMap::new(),
            store,
            submission_id,
            session_token: None,
            autosave: AutosaveSchedule::new(now),
            server_debounce: Debounce::new(SERVER_SAVE_DEBOUNCE),
            last_token_refresh: None,
            pending_restore: None,
            view: View::Welcome,
            pane: 0,
            overlay: None,
            tick: 0,
            active: true,
            lookup_busy: false,
            generate_busy: false,
            submitting: false,
            generated: None,
            result_viewer: None,
            toast: None,
            theme: crate::theme::Theme::panel_dark(),
            animations_enabled: true,
            logo_lines: Vec::new(),
            debug_log: VecDeque::new(),
            show_debug: false,
            should_quit: false,
            tx: None,
            rx: None,
            p_tx: None,
            p_rx: None,
        }
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }

    pub fn busy(&self) -> bool {
        self.lookup_busy || self.generate_busy || self.submitting || self.assistant.busy
    }

    pub fn busy_text(&self) -> Option<&'static str> {
        if self.submitting {
            Some("Submitting report")
        } else if self.generate_busy {
            Some("Generating I/O tables")
        } else if self.lookup_busy {
            Some("Looking up module")
        } else if self.assistant.busy {
            Some("Assistant is thinking")
        } else {
            None
        }
    }

    pub fn editing(&self) -> bool {
        if self.overlay.is_some() {
            return true;
        }
        if let Some(step) = self.wizard.current_step() {
            if step.form.editing {
                return true;
            }
        }
        self.tables.values().any(|t| t.editing)
    }

    /// Focusable panes of the active step, in display order.
    pub fn panes(&self) -> Vec<PaneRef> {
        let mut out = Vec::new();
        if let Some(step) = self.wizard.current_step() {
            if !step.def.fields.is_empty() {
                out.push(PaneRef::Form);
            }
            for t in &step.def.tables {
                out.push(PaneRef::Table(t.clone()));
            }
            for a in &step.def.attachments {
                out.push(PaneRef::Slot(a.clone()));
            }
            if step.def.signature {
                out.push(PaneRef::Signature);
            }
        }
        if out.is_empty() {
            out.push(PaneRef::Form);
        }
        out
    }

    pub fn current_pane(&self) -> PaneRef {
        let panes = self.panes();
        panes
            .get(self.pane.min(panes.len() - 1))
            .cloned()
            .unwrap_or(PaneRef::Form)
    }

    pub fn focus_reset(&mut self) {
        self.pane = 0;
        self.overlay = None;
    }

    pub fn set_generated(&mut self, gen: GeneratedTables) {
        self.generated = Some(gen);
    }

    pub fn set_generated_preview(&mut self, envelope: JsonValue) {
        self.result_viewer = Some(ResultViewerWidget::new("Generated I/O Tables", envelope));
    }

    pub fn set_submit_result(&mut self, envelope: JsonValue) {
        self.result_viewer = Some(ResultViewerWidget::new("Submission", envelope));
        self.view = View::Result;
    }

    /// Payload for the server-side progress save.
    pub fn progress_payload(&self) -> JsonValue {
        serde_json::json!({
            "submission_id": self.submission_id,
            "current_step": self.wizard.current,
            "fields": self.wizard.snapshot(&self.tables),
        })
    }

    /// Full submission payload: fields plus attachment and signature paths.
    pub fn submission_payload(&self) -> JsonValue {
        let attachments: BTreeMap<String, Vec<String>> = self
            .attachments
            .values()
            .map(|slot| (slot.id.clone(), slot.paths()))
            .collect();
        serde_json::json!({
            "submission_id": self.submission_id,
            "current_step": self.wizard.current,
            "fields": self.wizard.snapshot(&self.tables),
            "attachments": attachments,
            "signature": self.signature.as_saved(),
        })
    }
}

fn config_path() -> Option<PathBuf> {
    let name = "sat-report.yaml";
    if let Ok(dir) = std::env::var("SAT_TUI_CONFIG_DIR") {
        let p = PathBuf::from(dir).join(name);
        if p.exists() {
            return Some(p);
        }
        return None;
    }
    let p = std::env::current_dir().ok()?.join(name);
    if p.exists() {
        Some(p)
    } else {
        None
    }
}

fn load_config() -> Result<ReportConfig> {
    let cfg = match config_path() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            serde_yaml::from_str::<ReportConfig>(&text)
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?
        }
        None => crate::model::default_report_config(),
    };
    validate_report_config(&cfg).map_err(|e| anyhow::anyhow!("invalid report config: {e}"))?;
    Ok(cfg)
}

fn init_logo(state: &mut AppState) {
    let Some(path) = state.config.logo.clone() else {
        return;
    };
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            state.logo_lines = text.lines().map(|l| l.to_string()).collect();
        }
        Err(e) => state.dbg(format!("logo {path}: {e}")),
    }
}

/// Apply the instant snapshot's scalar values on startup; sequences and the
/// wizard position only come back through the explicit recovery prompt.
pub(crate) fn apply_instant_snapshot(state: &mut AppState) {
    let Some(snap) = state.store.load_instant() else {
        return;
    };
    let mut misses = 0usize;
    for (name, value) in &snap {
        if let SnapValue::One(v) = value {
            let mut placed = false;
            for step in &mut state.wizard.steps {
                if let Some(fld) = step.form.fields.iter_mut().find(|f| f.name == *name) {
                    crate::widgets::form::restore_value(fld, v);
                    placed = true;
                    break;
                }
            }
            if !placed {
                misses += 1;
            }
        }
    }
    if misses > 0 {
        state.dbg(format!("instant restore: {misses} unknown field(s)"));
    }
}

pub fn run() -> Result<()> {
    let cfg = load_config()?;
    let mut state = AppState::new(cfg);
    let (tx, rx) = mpsc::channel::<LoadMsg>();
    state.tx = Some(tx);
    state.rx = Some(rx);
    let (p_tx, p_rx) = mpsc::channel::<ProgressEvent>();
    state.p_tx = Some(p_tx);
    state.p_rx = Some(p_rx);

    state.session_token = state.store.load_token();
    if let Err(e) = state.store.save_current_id(&state.submission_id) {
        state.dbg(format!("current id cache: {e}"));
    }
    init_logo(&mut state);
    apply_instant_snapshot(&mut state);
    // Existing autosave record surfaces a non-blocking recovery prompt
    state.pending_restore = state.store.load_autosave(&state.submission_id);

    // Boot effects: user directory + a fresh session token
    let boot = vec![Effect::FetchUsers, Effect::RefreshToken];
    state.last_token_refresh = Some(Instant::now());
    run_effects(&mut state, boot);

    let headless = std::env::var("SAT_TUI_HEADLESS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    if headless {
        return run_headless(state);
    }

    // Setup terminal (interactive)
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res = loop {
        if let Err(e) = terminal.draw(|f| draw(f, &mut state)) {
            break Err(e.into());
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => handle_key(&mut state, key),
                // Terminal focus is the visibility signal: losing it flushes
                // a dirty draft, regaining it refreshes the session token.
                Ok(Event::FocusLost) => {
                    let effs = update(&mut state, AppMsg::Suspended);
                    run_effects(&mut state, effs);
                }
                Ok(Event::FocusGained) => {
                    let effs = update(
                        &mut state,
                        AppMsg::Resumed {
                            now: Instant::now(),
                        },
                    );
                    run_effects(&mut state, effs);
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        pump_messages(&mut state);
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            last_tick = Instant::now();
            on_tick(&mut state);
        }
        if state.should_quit {
            break Ok(());
        }
    };
    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

fn run_headless(mut state: AppState) -> Result<()> {
    let ticks: u64 = std::env::var("SAT_TUI_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    let summary_wanted = std::env::var("SAT_TUI_SMOKE_SUMMARY")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    let backend = ratatui::backend::TestBackend::new(100, 32);
    let mut terminal = Terminal::new(backend)?;
    // Smoke mode goes straight to the wizard
    let effs = update(&mut state, AppMsg::StartWizard);
    run_effects(&mut state, effs);
    for _ in 0..ticks {
        terminal.draw(|f| draw(f, &mut state))?;
        pump_messages(&mut state);
        state.tick = state.tick.wrapping_add(1);
        on_tick(&mut state);
        std::thread::sleep(Duration::from_millis(50));
    }
    if summary_wanted {
        let view = match state.view {
            View::Welcome => "Welcome",
            View::Wizard => "Wizard",
            View::IoBuilder => "IoBuilder",
            View::Result => "Result",
        };
        let summary = serde_json::json!({
            "ok": true,
            "view": view,
            "step": state.wizard.current,
            "steps": state.wizard.step_count(),
            "dirty": state.autosave.is_dirty(),
            "submission_id": state.submission_id,
        });
        println!("{summary}");
    }
    Ok(())
}

fn on_tick(state: &mut AppState) {
    // Toast expiry
    let toast_expired = state
        .toast
        .as_ref()
        .map(|t| state.tick >= t.expires_at_tick)
        .unwrap_or(false);
    if toast_expired {
        state.toast = None;
    }
    let effs = update(
        state,
        AppMsg::Tick {
            now: Instant::now(),
        },
    );
    run_effects(state, effs);
}

fn pump_messages(state: &mut AppState) {
    let mut drained: Vec<LoadMsg> = Vec::new();
    if let Some(rx) = &state.rx {
        while let Ok(msg) = rx.try_recv() {
            drained.push(msg);
        }
    }
    for msg in drained {
        let effs = update(
            state,
            AppMsg::Loaded {
                kind: msg.kind,
                outcome: msg.outcome,
            },
        );
        run_effects(state, effs);
    }
    let mut drained_pev: Vec<ProgressEvent> = Vec::new();
    if let Some(prx) = &state.p_rx {
        while let Ok(ev) = prx.try_recv() {
            drained_pev.push(ev);
        }
    }
    for ev in drained_pev {
        let effs = if ev.done {
            update(
                state,
                AppMsg::StreamDone {
                    result: ev.result,
                    err: ev.err,
                },
            )
        } else {
            update(state, AppMsg::StreamProgress { text: ev.text })
        };
        run_effects(state, effs);
    }
}

fn do_autosave(state: &mut AppState, manual: bool) {
    let now = Instant::now();
    let record = AutosaveRecord {
        timestamp: now_epoch_secs(),
        current_step: state.wizard.current,
        fields: state.wizard.snapshot(&state.tables),
        signature: state.signature.as_saved(),
    };
    let mut log: Vec<String> = Vec::new();
    let saved = state
        .store
        .save_autosave(&state.submission_id, &record, &mut |m| log.push(m));
    for m in log {
        state.dbg(m);
    }
    if saved {
        state.autosave.note_saved(now);
        if manual {
            show_toast(state, "Progress saved!", ToastLevel::Success, 3);
        }
    }
}

fn show_toast(state: &mut AppState, text: impl Into<String>, level: ToastLevel, seconds: u64) {
    state.toast = Some(Toast {
        text: text.into(),
        level,
        // 200 ms ticks
        expires_at_tick: state.tick + seconds * 5,
    });
}

pub(crate) fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::SaveInstant => {
                let snap = state.wizard.snapshot(&state.tables);
                if let Err(e) = state.store.save_instant(&snap) {
                    state.dbg(format!("instant save: {e}"));
                }
            }
            Effect::Autosave { manual } => do_autosave(state, manual),
            Effect::ServerSave => {
                if let Some(tx) = &state.tx {
                    api::spawn_save_progress(
                        &state.progress_payload(),
                        &state.session_token,
                        tx.clone(),
                    );
                }
            }
            Effect::Lookup { company, model } => {
                if let Some(tx) = &state.tx {
                    api::spawn_module_lookup(&company, &model, &state.session_token, tx.clone());
                }
            }
            Effect::Generate { payload } => {
                if let Some(tx) = &state.tx {
                    api::spawn_generate_tables(&payload, &state.session_token, tx.clone());
                }
            }
            Effect::FetchUsers => {
                if let Some(tx) = &state.tx {
                    api::spawn_fetch_users(&state.session_token, tx.clone());
                }
            }
            Effect::RefreshToken => {
                if let Some(tx) = &state.tx {
                    api::spawn_refresh_token(tx.clone());
                }
            }
            Effect::Submit { payload } => {
                if let Some(tx) = &state.tx {
                    api::spawn_submit_report(&payload, &state.session_token, tx.clone());
                }
            }
            Effect::AssistantSend { text } => {
                if let Some(p_tx) = &state.p_tx {
                    let mut cmdline = format!(
                        "${{APP_BIN}} assistant --message {}",
                        backend::quote_arg(&text)
                    );
                    if let Some(t) = &state.session_token {
                        cmdline.push_str(&format!(" --token {}", backend::quote_arg(t)));
                    }
                    backend::spawn_streaming_cmd(cmdline, None, p_tx.clone());
                }
            }
            Effect::AssistantUpload { path } => {
                if let Some(tx) = &state.tx {
                    api::spawn_register_research_doc(&path, &state.session_token, tx.clone());
                }
            }
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => show_toast(state, text, level, seconds),
            Effect::ScrollTop => {
                state.pane = 0;
            }
            Effect::Quit => {
                state.should_quit = true;
            }
        }
    }
}

fn send(state: &mut AppState, msg: AppMsg) {
    let effs = update(state, msg);
    run_effects(state, effs);
}

fn handle_key(state: &mut AppState, key: KeyEvent) {
    // Recovery prompt first: it is non-blocking for rendering but owns the
    // keyboard until answered.
    if state.pending_restore.is_some() {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                send(state, AppMsg::RestoreAccepted)
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                send(state, AppMsg::RestoreDismissed)
            }
            _ => {}
        }
        return;
    }
    // Modal textarea editor
    if state.overlay.is_some() {
        route_form_key(state, key);
        return;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        send(state, AppMsg::QuitRequested);
        return;
    }
    // Assistant panel owns the keyboard while open
    if state.assistant.open {
        use crate::widgets::assistant::AssistantAction;
        match crate::widgets::assistant::handle_key(&mut state.assistant, key) {
            AssistantAction::Send => send(state, AppMsg::AssistantSendRequested),
            AssistantAction::Upload(path) => {
                send(state, AppMsg::AssistantUploadRequested(path))
            }
            AssistantAction::Close => state.assistant.open = false,
            AssistantAction::Handled | AssistantAction::None => {}
        }
        return;
    }
    let text_capture = state.editing()
        || matches!(state.current_pane(), PaneRef::Slot(_) | PaneRef::Signature)
        || (state.view == View::IoBuilder
            && state.io_view.section != crate::widgets::iobuilder::Section::Summary);
    match key.code {
        KeyCode::F(2) => {
            state.view = if state.view == View::IoBuilder {
                View::Wizard
            } else {
                View::IoBuilder
            };
            return;
        }
        KeyCode::F(3) => {
            state.assistant.open = true;
            state.assistant.bootstrap();
            return;
        }
        KeyCode::F(5) => {
            send(state, AppMsg::ManualSaveRequested);
            return;
        }
        KeyCode::F(10) => {
            send(state, AppMsg::SubmitRequested);
            return;
        }
        KeyCode::F(12) => {
            state.show_debug = !state.show_debug;
            return;
        }
        KeyCode::Char('q') if !text_capture && state.view != View::Wizard => {
            send(state, AppMsg::QuitRequested);
            return;
        }
        _ => {}
    }
    match state.view {
        View::Welcome => {
            if key.code == KeyCode::Enter {
                send(state, AppMsg::StartWizard);
            }
        }
        View::Wizard => handle_wizard_key(state, key, text_capture),
        View::IoBuilder => handle_io_key(state, key),
        View::Result => {
            if key.code == KeyCode::Esc {
                state.view = View::Wizard;
                return;
            }
            let action = state
                .result_viewer
                .as_mut()
                .map(|w| w.on_key(key.code))
                .unwrap_or(ViewerAction::None);
            if let ViewerAction::CopyRequested(text) = action {
                match arboard::Clipboard::new().and_then(|mut c| c.set_text(text)) {
                    Ok(()) => show_toast(state, "Copied to clipboard", ToastLevel::Info, 2),
                    Err(e) => state.dbg(format!("clipboard: {e}")),
                }
            }
        }
    }
}

fn handle_wizard_key(state: &mut AppState, key: KeyEvent, text_capture: bool) {
    match key.code {
        KeyCode::PageDown => {
            send(state, AppMsg::NextStep);
            return;
        }
        KeyCode::PageUp => {
            send(state, AppMsg::PrevStep);
            return;
        }
        KeyCode::Tab => {
            let count = state.panes().len();
            state.pane = (state.pane + 1) % count;
            return;
        }
        KeyCode::BackTab => {
            let count = state.panes().len();
            state.pane = (state.pane + count - 1) % count;
            return;
        }
        KeyCode::Char(c @ '0'..='9') if !text_capture => {
            let step = if c == '0' { 10 } else { c as usize - '0' as usize };
            send(state, AppMsg::StepRequested(step));
            return;
        }
        _ => {}
    }
    match state.current_pane() {
        PaneRef::Form => route_form_key(state, key),
        PaneRef::Table(id) => {
            use crate::widgets::rows::RowsKeyResult;
            let Some(table) = state.tables.get_mut(&id) else {
                return;
            };
            match crate::widgets::rows::handle_key(table, key) {
                RowsKeyResult::AddRow => send(state, AppMsg::RowAdded { table: id }),
                RowsKeyResult::RemoveRow(index) => {
                    send(state, AppMsg::RowRemoved { table: id, index })
                }
                RowsKeyResult::Changed => send(state, AppMsg::FieldChanged),
                RowsKeyResult::Handled | RowsKeyResult::Ignored => {}
            }
        }
        PaneRef::Slot(id) => {
            use crate::widgets::attachments::AttachKeyResult;
            let mut log: Vec<String> = Vec::new();
            let result = match state.attachments.get_mut(&id) {
                Some(slot) => {
                    crate::widgets::attachments::handle_key(slot, key, &mut |m| log.push(m))
                }
                None => AttachKeyResult::Ignored,
            };
            for m in log {
                state.dbg(m);
            }
            if result == AttachKeyResult::Changed {
                send(state, AppMsg::AttachmentsChanged);
            }
        }
        PaneRef::Signature => {
            use crate::widgets::signature::SignatureKeyResult;
            let result = crate::widgets::signature::handle_key(
                &mut state.signature_pane,
                &mut state.signature,
                key,
            );
            if result == SignatureKeyResult::Changed {
                send(state, AppMsg::FieldChanged);
            }
        }
    }
}

fn route_form_key(state: &mut AppState, key: KeyEvent) {
    use crate::widgets::form_widget::FormKeyResult;
    let Some(step) = state
        .wizard
        .steps
        .get_mut(state.wizard.current.saturating_sub(1))
    else {
        return;
    };
    let result = crate::widgets::form_widget::handle_key(&mut step.form, &mut state.overlay, key);
    if result == FormKeyResult::Changed {
        send(state, AppMsg::FieldChanged);
    }
}

fn handle_io_key(state: &mut AppState, key: KeyEvent) {
    use crate::widgets::iobuilder::{IoAction, Section};
    if key.code == KeyCode::Esc && state.io_view.confirm.is_none() {
        state.view = View::Wizard;
        return;
    }
    if key.code == KeyCode::Char('v')
        && state.io_view.section == Section::Summary
        && state.io_view.confirm.is_none()
        && state.result_viewer.is_some()
    {
        state.view = View::Result;
        return;
    }
    match crate::widgets::iobuilder::handle_key(&mut state.io_view, &mut state.iob, key) {
        IoAction::Lookup => send(state, AppMsg::LookupRequested),
        IoAction::AddModule => send(state, AppMsg::AddModuleRequested),
        IoAction::AddRange => send(state, AppMsg::AddRangeRequested),
        IoAction::RemoveModule(i) => send(state, AppMsg::RemoveModuleConfirmed(i)),
        IoAction::RemoveRange(i) => send(state, AppMsg::RemoveRangeConfirmed(i)),
        IoAction::Generate => send(state, AppMsg::GenerateRequested),
        IoAction::Populate => send(state, AppMsg::PopulateRequested),
        IoAction::Handled | IoAction::None => {}
    }
}

// ---- drawing --------------------------------------------------------------

fn draw(f: &mut Frame, state: &mut AppState) {
    let size = f.area();
    let debug_h = if state.show_debug { 8 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(debug_h),
            Constraint::Length(1),
        ])
        .split(size);
    crate::widgets::banner::draw_banner(f, chunks[0], state);
    match state.view {
        View::Welcome => draw_welcome(f, chunks[1], state),
        View::Wizard => draw_wizard(f, chunks[1], state),
        View::IoBuilder => {
            crate::widgets::iobuilder::draw(
                f,
                chunks[1],
                &state.io_view,
                &state.iob,
                state.generated.as_ref(),
            );
        }
        View::Result => {
            if let Some(w) = &mut state.result_viewer {
                w.render(f, chunks[1], true);
            }
        }
    }
    if state.show_debug {
        draw_debug(f, chunks[2], state);
    }
    let help = match state.view {
        View::Welcome => "Enter start • q quit",
        View::Wizard => {
            "Tab pane • PgUp/PgDn step • F2 I/O builder • F3 assistant • F5 save • F10 submit"
        }
        View::IoBuilder => "Tab section • Enter activate • Esc back",
        View::Result => "j raw • y copy • Esc back",
    };
    crate::widgets::status_bar::draw_footer(f, chunks[3], state, help);

    // Overlays render above everything in the main area
    if state.assistant.open {
        let panel = right_panel(chunks[1], 46);
        f.render_widget(ratatui::widgets::Clear, panel);
        crate::widgets::assistant::draw(f, panel, &mut state.assistant, state.tick);
    }
    if let Some(ov) = &state.overlay {
        crate::widgets::form_widget::render_overlay(f, chunks[1], ov);
    }
    if state.pending_restore.is_some() {
        draw_restore_prompt(f, chunks[1], state);
    }
}

fn right_panel(area: Rect, width: u16) -> Rect {
    let w = width.min(area.width);
    Rect {
        x: area.x + area.width - w,
        y: area.y,
        width: w,
        height: area.height,
    }
}

fn draw_welcome(f: &mut Frame, area: Rect, state: &AppState) {
    use ratatui::widgets::{Paragraph, Wrap};
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Site Acceptance Test report builder",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Work through the steps, attach evidence, sign off and submit."),
        Line::from("Progress is saved locally as you type and autosaved every 30 seconds."),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to begin",
            crate::theme::text_active_bold(),
        )),
    ];
    let p = Paragraph::new(lines)
        .block(crate::widgets::chrome::panel_block("Welcome", true))
        .wrap(Wrap { trim: false })
        .alignment(Alignment::Center);
    f.render_widget(p, area);
    let _ = state;
}

fn draw_wizard(f: &mut Frame, area: Rect, state: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(area);
    let rail_focused = false;
    crate::widgets::progress::draw_progress_rail(f, chunks[0], state, rail_focused);

    let panes = state.panes();
    let pane_idx = state.pane.min(panes.len() - 1);
    let content = chunks[1];
    // Pane strip + focused pane
    let inner = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(content);
    let mut strip: Vec<Span> = Vec::new();
    for (i, pane) in panes.iter().enumerate() {
        let label = match pane {
            PaneRef::Form => "Fields".to_string(),
            PaneRef::Table(id) => state
                .config
                .table(id)
                .map(|t| t.title.clone())
                .unwrap_or_else(|| id.clone()),
            PaneRef::Slot(id) => state
                .config
                .attachment(id)
                .map(|a| a.title.clone())
                .unwrap_or_else(|| id.clone()),
            PaneRef::Signature => "Signature".to_string(),
        };
        let style = if i == pane_idx {
            crate::theme::list_cursor_style()
        } else {
            crate::theme::text_muted()
        };
        strip.push(Span::styled(format!(" {label} "), style));
        strip.push(Span::raw(" "));
    }
    f.render_widget(
        ratatui::widgets::Paragraph::new(Line::from(strip)),
        inner[0],
    );

    match &panes[pane_idx] {
        PaneRef::Form => {
            if let Some(step) = state
                .wizard
                .steps
                .get_mut(state.wizard.current.saturating_sub(1))
            {
                crate::widgets::form::draw_form(
                    f,
                    inner[1],
                    &mut step.form,
                    true,
                    state.tick % 2 == 0,
                );
            }
        }
        PaneRef::Table(id) => {
            if let Some(table) = state.tables.get(id) {
                crate::widgets::rows::draw_table(f, inner[1], table, true, state.tick);
            }
        }
        PaneRef::Slot(id) => {
            if let Some(slot) = state.attachments.get(id) {
                crate::widgets::attachments::draw_slot(f, inner[1], slot, true);
            }
        }
        PaneRef::Signature => {
            crate::widgets::signature::draw_signature(
                f,
                inner[1],
                &state.signature_pane,
                &state.signature,
                true,
            );
        }
    }
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    use ratatui::widgets::Paragraph;
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .rev()
        .map(|l| Line::from(Span::styled(l.clone(), crate::theme::text_muted())))
        .collect();
    let p = Paragraph::new(lines).block(crate::widgets::chrome::panel_block("Debug", false));
    f.render_widget(p, area);
}

fn draw_restore_prompt(f: &mut Frame, area: Rect, state: &AppState) {
    use ratatui::widgets::{Clear, Paragraph, Wrap};
    let Some(record) = &state.pending_restore else {
        return;
    };
    let w = 60.min(area.width);
    let h = 7.min(area.height);
    let rect = Rect {
        x: area.x + (area.width.saturating_sub(w)) / 2,
        y: area.y + (area.height.saturating_sub(h)) / 2,
        width: w,
        height: h,
    };
    f.render_widget(Clear, rect);
    let fields = record.fields.len();
    let lines = vec![
        Line::from("A saved draft of this report was found."),
        Line::from(Span::styled(
            format!("step {} • {} field(s)", record.current_step, fields),
            crate::theme::text_muted(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Enter/y restore • Esc/n dismiss",
            crate::theme::text_active_bold(),
        )),
    ];
    let p = Paragraph::new(lines)
        .block(crate::widgets::chrome::panel_block("Restore draft?", true))
        .wrap(Wrap { trim: false });
    f.render_widget(p, rect);
}
