use crate::report::wizard::Goto;
use crate::services::api;
use crate::ui::{AppState, LoadKind, ToastLevel, View};
use serde_json::Value as JsonValue;
use std::time::Instant;

#[cfg(test)]
mod tests;

pub enum AppMsg {
    StartWizard,
    StepRequested(usize),
    NextStep,
    PrevStep,
    FieldChanged,
    RowAdded {
        table: String,
    },
    RowRemoved {
        table: String,
        index: usize,
    },
    AttachmentsChanged,
    ManualSaveRequested,
    RestoreAccepted,
    RestoreDismissed,
    LookupRequested,
    AddModuleRequested,
    AddRangeRequested,
    RemoveModuleConfirmed(usize),
    RemoveRangeConfirmed(usize),
    GenerateRequested,
    PopulateRequested,
    SubmitRequested,
    AssistantSendRequested,
    AssistantUploadRequested(String),
    Loaded {
        kind: LoadKind,
        outcome: Result<JsonValue, String>,
    },
    StreamProgress {
        text: Option<String>,
    },
    StreamDone {
        result: Option<JsonValue>,
        err: Option<String>,
    },
    Tick {
        now: Instant,
    },
    Suspended,
    Resumed {
        now: Instant,
    },
    QuitRequested,
}

#[allow(clippy::large_enum_variant)]
pub enum Effect {
    SaveInstant,
    Autosave {
        manual: bool,
    },
    ServerSave,
    Lookup {
        company: String,
        model: String,
    },
    Generate {
        payload: JsonValue,
    },
    FetchUsers,
    RefreshToken,
    Submit {
        payload: JsonValue,
    },
    AssistantSend {
        text: String,
    },
    AssistantUpload {
        path: String,
    },
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
    ScrollTop,
    Quit,
}

const TOKEN_REFRESH_SECS: u64 = 5 * 60;

/// Mapping from generation categories to the live form tables they populate.
pub fn category_table(category: &str) -> Option<&'static str> {
    match category {
        "digital_inputs" => Some("digital_signals"),
        "digital_outputs" => Some("digital_outputs"),
        "analog_inputs" => Some("analogue_inputs"),
        "analog_outputs" => Some("analogue_outputs"),
        "modbus_digital" => Some("modbus_digital"),
        "modbus_analog" => Some("modbus_analogue"),
        _ => None,
    }
}

fn toast(text: impl Into<String>, level: ToastLevel) -> Effect {
    Effect::ShowToast {
        text: text.into(),
        level,
        seconds: 3,
    }
}

fn mark_changed(state: &mut AppState) -> Vec<Effect> {
    state.autosave.mark_dirty();
    state.server_debounce.arm(Instant::now());
    vec![Effect::SaveInstant]
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        StartWizard => {
            state.view = View::Wizard;
        }
        StepRequested(target) => {
            if state.wizard.goto_step(target) == Goto::Moved {
                let key = state
                    .wizard
                    .current_step()
                    .map(|s| crate::nav::keys::step_key(&s.def));
                if let Some(k) = key {
                    state.dbg(format!("entered {k}"));
                }
                state.focus_reset();
                effects.push(Effect::ScrollTop);
                effects.extend(mark_changed(state));
            }
        }
        NextStep => {
            let target = state.wizard.current + 1;
            return update(state, StepRequested(target));
        }
        PrevStep => {
            let target = state.wizard.current.saturating_sub(1).max(1);
            return update(state, StepRequested(target));
        }
        FieldChanged => {
            effects.extend(mark_changed(state));
        }
        RowAdded { table } => {
            // Missing table id degrades to a no-op, like a missing template
            let tick = state.tick;
            match state.tables.get_mut(&table) {
                Some(t) => {
                    t.add_row(tick);
                    let key = crate::nav::keys::table_key(&t.def);
                    state.dbg(format!("row added: {key}"));
                    effects.extend(mark_changed(state));
                }
                None => state.dbg(format!("add row: unknown table '{table}'")),
            }
        }
        RowRemoved { table, index } => {
            let removed = state
                .tables
                .get_mut(&table)
                .map(|t| t.remove_row(index))
                .unwrap_or(false);
            if removed {
                effects.extend(mark_changed(state));
            }
        }
        AttachmentsChanged => {
            effects.extend(mark_changed(state));
        }
        ManualSaveRequested => {
            let now = Instant::now();
            if state.autosave.force(now) {
                effects.push(Effect::Autosave { manual: true });
                effects.push(Effect::ServerSave);
            }
        }
        RestoreAccepted => {
            if let Some(record) = state.pending_restore.take() {
                let tick = state.tick;
                let mut log: Vec<String> = Vec::new();
                state.wizard.apply_restore(
                    &record,
                    &mut state.tables,
                    &mut state.signature,
                    tick,
                    &mut |m| log.push(m),
                );
                for m in log {
                    state.dbg(m);
                }
                state.view = View::Wizard;
                state.focus_reset();
                effects.push(Effect::SaveInstant);
                effects.push(toast(
                    "Form restored from saved progress",
                    ToastLevel::Info,
                ));
            }
        }
        RestoreDismissed => {
            state.pending_restore = None;
        }
        LookupRequested => {
            match state.iob.lookup_inputs_ok() {
                Ok(()) => {
                    state.lookup_busy = true;
                    effects.push(Effect::Lookup {
                        company: state.iob.company.trim().to_string(),
                        model: state.iob.model.trim().to_string(),
                    });
                }
                Err(msg) => effects.push(toast(msg, ToastLevel::Error)),
            }
        }
        AddModuleRequested => match state.iob.add_module() {
            Ok(()) => effects.push(toast("Module added", ToastLevel::Success)),
            Err(msg) => effects.push(toast(msg, ToastLevel::Error)),
        },
        AddRangeRequested => match state.iob.add_range() {
            Ok(()) => effects.push(toast("Modbus range added", ToastLevel::Success)),
            Err(msg) => effects.push(toast(msg, ToastLevel::Error)),
        },
        RemoveModuleConfirmed(index) => {
            if state.iob.remove_module(index) {
                effects.push(toast("Module removed", ToastLevel::Info));
            }
        }
        RemoveRangeConfirmed(index) => {
            if state.iob.remove_range(index) {
                effects.push(toast("Modbus range removed", ToastLevel::Info));
            }
        }
        GenerateRequested => {
            if !state.iob.can_generate() {
                effects.push(toast(
                    "Configure at least one module or Modbus range first",
                    ToastLevel::Error,
                ));
            } else {
                state.generate_busy = true;
                effects.push(Effect::Generate {
                    payload: state.iob.generation_payload(),
                });
            }
        }
        PopulateRequested => {
            let Some(gen) = state.generated.clone() else {
                effects.push(toast("Generate tables first", ToastLevel::Error));
                return effects;
            };
            let tick = state.tick;
            let mut placed_rows = 0usize;
            for (category, records) in &gen.tables {
                let Some(table_id) = category_table(category) else {
                    state.dbg(format!("populate: unknown category '{category}'"));
                    continue;
                };
                let Some(table) = state.tables.get_mut(table_id) else {
                    continue;
                };
                let unplaced = table.populate_from_records(records, tick);
                placed_rows += records.len();
                for tag in unplaced {
                    state.dbg(format!("populate: no field for {tag}"));
                }
            }
            effects.extend(mark_changed(state));
            effects.push(toast(
                format!("Populated {placed_rows} generated rows"),
                ToastLevel::Success,
            ));
        }
        SubmitRequested => {
            if state.submitting {
                return effects;
            }
            // Whole-form gate: walk the wizard forward so the first invalid
            // step traps the position exactly like interactive navigation.
            let total = state.wizard.step_count();
            let start = state.wizard.current;
            state.wizard.current = 1;
            for target in 2..=total {
                if state.wizard.goto_step(target) == Goto::Blocked {
                    state.view = View::Wizard;
                    state.focus_reset();
                    effects.push(toast(
                        "Fix the highlighted fields before submitting",
                        ToastLevel::Error,
                    ));
                    return effects;
                }
            }
            // The last step has no forward move to trigger its validation
            let last_ok = state
                .wizard
                .current_step_mut()
                .map(|step| crate::widgets::form::validate_form(&mut step.form))
                .unwrap_or(true);
            if !last_ok {
                state.view = View::Wizard;
                state.focus_reset();
                effects.push(toast(
                    "Fix the highlighted fields before submitting",
                    ToastLevel::Error,
                ));
                return effects;
            }
            if state.wizard.goto_step(start) == Goto::Blocked {
                // Cannot happen going backward; keep the guard anyway
                state.wizard.current = start;
            }
            state.submitting = true;
            effects.push(Effect::Submit {
                payload: state.submission_payload(),
            });
        }
        AssistantSendRequested => {
            let text = state.assistant.input.trim().to_string();
            if text.is_empty() || state.assistant.busy {
                return effects;
            }
            state.assistant.input.clear();
            state.assistant.push_user(text.clone());
            state.assistant.begin_reply();
            effects.push(Effect::AssistantSend { text });
        }
        AssistantUploadRequested(path) => {
            effects.push(Effect::AssistantUpload { path });
        }
        Loaded { kind, outcome } => {
            effects.extend(on_loaded(state, kind, outcome));
        }
        StreamProgress { text } => {
            if let Some(t) = text {
                state.assistant.stream_chunk(&t);
            }
        }
        StreamDone { result, err } => {
            if let Some(e) = err {
                state.assistant.fail_reply(&e);
                return effects;
            }
            let (text, meta) = match &result {
                Some(v) => {
                    let data = v.get("data").unwrap_or(v);
                    let text = data
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(|s| s.to_string());
                    let meta = data
                        .get("meta")
                        .and_then(|m| m.as_array())
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|x| x.as_str().map(|s| s.to_string()))
                                .collect()
                        })
                        .unwrap_or_default();
                    (text, meta)
                }
                None => (None, Vec::new()),
            };
            state.assistant.finish_reply(text, meta);
        }
        Tick { now } => {
            if state.autosave.on_tick(now, state.active) {
                effects.push(Effect::Autosave { manual: false });
            }
            if state.server_debounce.ready(now) {
                effects.push(Effect::ServerSave);
            }
            let refresh_due = state
                .last_token_refresh
                .map(|t| now.duration_since(t).as_secs() >= TOKEN_REFRESH_SECS)
                .unwrap_or(true);
            if refresh_due {
                state.last_token_refresh = Some(now);
                effects.push(Effect::RefreshToken);
            }
        }
        Suspended => {
            state.active = false;
            let now = Instant::now();
            if state.autosave.flush(now) {
                effects.push(Effect::Autosave { manual: false });
            }
        }
        Resumed { now } => {
            state.active = true;
            state.last_token_refresh = Some(now);
            effects.push(Effect::RefreshToken);
        }
        QuitRequested => {
            let now = Instant::now();
            if state.autosave.flush(now) {
                effects.push(Effect::Autosave { manual: false });
            }
            effects.push(Effect::Quit);
        }
    }
    effects
}

fn on_loaded(
    state: &mut AppState,
    kind: LoadKind,
    outcome: Result<JsonValue, String>,
) -> Vec<Effect> {
    let mut effects: Vec<Effect> = Vec::new();
    match kind {
        LoadKind::ModuleLookup => {
            state.lookup_busy = false;
            let parsed = outcome.and_then(|v| api::parse_module_lookup(&v));
            match parsed {
                Ok((spec, source)) => {
                    state.iob.set_lookup_result(spec, source);
                }
                Err(msg) => {
                    state.iob.set_lookup_failed();
                    effects.push(toast(
                        format!("Module lookup failed: {msg}"),
                        ToastLevel::Error,
                    ));
                }
            }
        }
        LoadKind::GenerateTables => {
            state.generate_busy = false;
            match outcome {
                Ok(v) => match api::parse_generated_tables(&v) {
                    Ok(gen) => {
                        let total: usize = gen.tables.values().map(|t| t.len()).sum();
                        // Full per-category preview stays browsable alongside
                        // the summary counts
                        state.set_generated_preview(v);
                        state.set_generated(gen);
                        effects.push(toast(
                            format!("Generated {total} I/O table rows"),
                            ToastLevel::Success,
                        ));
                    }
                    Err(msg) => {
                        effects
                            .push(toast(format!("Generation failed: {msg}"), ToastLevel::Error));
                    }
                },
                Err(msg) => {
                    effects.push(toast(format!("Generation failed: {msg}"), ToastLevel::Error));
                }
            }
        }
        LoadKind::Users => {
            let parsed = outcome.and_then(|v| api::parse_users_by_role(&v));
            match parsed {
                Ok(users) => {
                    for step in &mut state.wizard.steps {
                        crate::widgets::form::apply_role_options(&mut step.form.fields, &users);
                    }
                    state.users = users;
                    state.dbg(format!(
                        "user directory loaded ({} roles)",
                        state.users.len()
                    ));
                }
                Err(msg) => {
                    state.dbg(format!("user directory: {msg}"));
                    effects.push(toast("Failed to load user list", ToastLevel::Error));
                }
            }
        }
        LoadKind::TokenRefresh => {
            let parsed = outcome.and_then(|v| api::parse_session_token(&v));
            match parsed {
                Ok(token) => {
                    if let Err(e) = state.store.save_token(&token) {
                        state.dbg(format!("token cache: {e}"));
                    }
                    state.session_token = Some(token);
                }
                Err(msg) => state.dbg(format!("token refresh: {msg}")),
            }
        }
        LoadKind::SaveProgress => {
            let parsed = outcome.and_then(|v| api::parse_save_progress(&v));
            match parsed {
                Ok(Some(new_id)) => {
                    if new_id != state.submission_id {
                        state
                            .store
                            .adopt_submission_id(&state.submission_id, &new_id);
                        if let Err(e) = state.store.save_current_id(&new_id) {
                            state.dbg(format!("current id cache: {e}"));
                        }
                        state.dbg(format!(
                            "adopted submission id {new_id} (was {})",
                            state.submission_id
                        ));
                        state.submission_id = new_id;
                    }
                }
                Ok(None) => {}
                Err(msg) => state.dbg(format!("server save: {msg}")),
            }
        }
        LoadKind::Submit => {
            state.submitting = false;
            match outcome {
                Ok(v) => {
                    let ok = v.get("ok").and_then(|b| b.as_bool()).unwrap_or(true);
                    if ok {
                        state.store.delete_autosave(&state.submission_id);
                        state.store.clear_current_id();
                        state.set_submit_result(v);
                        effects.push(toast("Report submitted", ToastLevel::Success));
                    } else {
                        let msg = v
                            .get("error")
                            .and_then(|e| e.as_str())
                            .unwrap_or("submission rejected");
                        effects.push(toast(
                            format!("Submission failed: {msg}"),
                            ToastLevel::Error,
                        ));
                    }
                }
                Err(msg) => {
                    // Transport failure: drafts stay, submit re-enabled
                    effects.push(toast(
                        format!("Submission failed: {msg}"),
                        ToastLevel::Error,
                    ));
                }
            }
        }
        LoadKind::AssistantUpload => match outcome {
            Ok(_) => effects.push(toast(
                "Document registered for research",
                ToastLevel::Success,
            )),
            Err(msg) => effects.push(toast(format!("Upload failed: {msg}"), ToastLevel::Error)),
        },
    }
    effects
}
