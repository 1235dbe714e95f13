use super::*;
use crate::draft::DraftStore;
use crate::model::default_report_config;
use crate::services::api::SpecSource;
use crate::widgets::form::restore_value;
use serde_json::json;

fn test_state() -> AppState {
    let mut state = AppState::new(default_report_config());
    let dir = std::env::temp_dir().join(format!(
        "sat-tui-app-test-{}",
        crate::draft::temporary_submission_id()
    ));
    state.store = DraftStore::at(dir);
    state.view = View::Wizard;
    state
}

fn fill_step_one(state: &mut AppState) {
    for name in [
        "document_title",
        "document_reference",
        "project_reference",
        "client_name",
        "prepared_by",
    ] {
        let fld = state.wizard.steps[0]
            .form
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .unwrap();
        restore_value(fld, "x");
    }
    let date = state.wizard.steps[0]
        .form
        .fields
        .iter_mut()
        .find(|f| f.name == "date_of_issue")
        .unwrap();
    restore_value(date, "2026-08-06");
}

#[test]
fn blocked_step_request_produces_no_effects() {
    let mut st = test_state();
    let effects = update(&mut st, AppMsg::StepRequested(2));
    assert!(effects.is_empty());
    assert_eq!(st.wizard.current, 1);
}

#[test]
fn moved_step_request_saves_and_scrolls() {
    let mut st = test_state();
    fill_step_one(&mut st);
    let effects = update(&mut st, AppMsg::StepRequested(2));
    assert_eq!(st.wizard.current, 2);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::SaveInstant)));
    assert!(effects.iter().any(|e| matches!(e, Effect::ScrollTop)));
    assert!(st.autosave.is_dirty());
}

#[test]
fn row_add_and_remove_trigger_persistence() {
    let mut st = test_state();
    let effects = update(
        &mut st,
        AppMsg::RowAdded {
            table: "related_documents".into(),
        },
    );
    assert_eq!(st.tables["related_documents"].rows.len(), 1);
    assert!(effects.iter().any(|e| matches!(e, Effect::SaveInstant)));

    // Unknown table degrades to a no-op with no save
    let effects = update(
        &mut st,
        AppMsg::RowAdded {
            table: "missing_table".into(),
        },
    );
    assert!(effects.is_empty());

    let effects = update(
        &mut st,
        AppMsg::RowRemoved {
            table: "related_documents".into(),
            index: 0,
        },
    );
    assert!(st.tables["related_documents"].rows.is_empty());
    assert!(effects.iter().any(|e| matches!(e, Effect::SaveInstant)));

    // Removing a nonexistent row produces nothing
    let effects = update(
        &mut st,
        AppMsg::RowRemoved {
            table: "related_documents".into(),
            index: 5,
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn manual_save_respects_min_gap() {
    let mut st = test_state();
    let effects = update(&mut st, AppMsg::ManualSaveRequested);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::Autosave { manual: true })));
    // Record a save now; an immediate second manual request is throttled
    st.autosave.note_saved(std::time::Instant::now());
    let effects = update(&mut st, AppMsg::ManualSaveRequested);
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::Autosave { .. })));
}

#[test]
fn lookup_outcome_fills_scratch_or_opens_manual_path() {
    let mut st = test_state();
    st.iob.company = "Siemens".into();
    st.iob.model = "SM1231".into();
    let env = json!({
        "ok": true,
        "data": {
            "success": true,
            "module": {"description": "8ch AI", "analog_inputs": 8, "total_channels": 8},
            "source": "cached"
        }
    });
    let _ = update(
        &mut st,
        AppMsg::Loaded {
            kind: LoadKind::ModuleLookup,
            outcome: Ok(env),
        },
    );
    let scratch = st.iob.scratch.as_ref().unwrap();
    assert_eq!(scratch.spec.analog_inputs, 8);
    assert_eq!(scratch.source, SpecSource::Cached);
    assert!(!st.iob.manual_required);
    assert_eq!(st.iob.manual.ai, "8");

    let effects = update(
        &mut st,
        AppMsg::Loaded {
            kind: LoadKind::ModuleLookup,
            outcome: Err("connection refused".into()),
        },
    );
    assert!(st.iob.manual_required);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::ShowToast { .. })));
}

#[test]
fn save_progress_adopts_server_assigned_id() {
    let mut st = test_state();
    let old_id = st.submission_id.clone();
    // Seed a record under the temporary id so adoption migrates it
    let record = crate::draft::AutosaveRecord {
        timestamp: 9,
        current_step: 2,
        fields: Default::default(),
        signature: None,
    };
    let mut log = |_m: String| {};
    assert!(st.store.save_autosave(&old_id, &record, &mut log));

    let env = json!({"ok": true, "data": {"submission_id": "SUB-77"}});
    let _ = update(
        &mut st,
        AppMsg::Loaded {
            kind: LoadKind::SaveProgress,
            outcome: Ok(env),
        },
    );
    assert_eq!(st.submission_id, "SUB-77");
    assert!(st.store.load_autosave(&old_id).is_none());
    assert_eq!(st.store.load_autosave("SUB-77").unwrap().timestamp, 9);
    assert_eq!(st.store.load_current_id().as_deref(), Some("SUB-77"));
}

#[test]
fn failed_submit_reenables_the_control() {
    let mut st = test_state();
    st.submitting = true;
    let effects = update(
        &mut st,
        AppMsg::Loaded {
            kind: LoadKind::Submit,
            outcome: Err("connection reset".into()),
        },
    );
    assert!(!st.submitting);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::ShowToast { .. })));
}

#[test]
fn successful_submit_clears_draft_state() {
    let mut st = test_state();
    st.submitting = true;
    let record = crate::draft::AutosaveRecord::default();
    let mut log = |_m: String| {};
    let id = st.submission_id.clone();
    assert!(st.store.save_autosave(&id, &record, &mut log));
    let _ = update(
        &mut st,
        AppMsg::Loaded {
            kind: LoadKind::Submit,
            outcome: Ok(json!({"ok": true, "data": {"report_url": "/reports/77"}})),
        },
    );
    assert!(st.store.load_autosave(&id).is_none());
    assert!(matches!(st.view, View::Result));
}

#[test]
fn populate_fills_mapped_tables_and_logs_strays() {
    let mut st = test_state();
    let mut gen = crate::services::api::GeneratedTables::default();
    gen.tables.insert(
        "digital_inputs".into(),
        vec![
            json!({"sno": 1, "signal_tag": "DI-001", "mystery": "x"})
                .as_object()
                .cloned()
                .unwrap(),
        ],
    );
    gen.tables.insert(
        "unknown_category".into(),
        vec![json!({"a": 1}).as_object().cloned().unwrap()],
    );
    st.generated = Some(gen);
    let effects = update(&mut st, AppMsg::PopulateRequested);
    assert_eq!(st.tables["digital_signals"].rows.len(), 1);
    assert_eq!(
        st.tables["digital_signals"].column_values("signal_tag").unwrap(),
        vec!["DI-001"]
    );
    assert!(effects.iter().any(|e| matches!(e, Effect::SaveInstant)));
    // Both the stray key and the unknown category landed in the debug ring
    assert!(st.debug_log.iter().any(|l| l.contains("mystery")));
    assert!(st
        .debug_log
        .iter()
        .any(|l| l.contains("unknown_category")));
}

#[test]
fn users_payload_fills_role_sourced_selects() {
    let mut st = test_state();
    let env = json!({
        "ok": true,
        "data": {"users": {"PM": [{"name": "Pat", "email": "pat@example.com"}]}}
    });
    let _ = update(
        &mut st,
        AppMsg::Loaded {
            kind: LoadKind::Users,
            outcome: Ok(env),
        },
    );
    let approvals = st
        .wizard
        .steps
        .iter()
        .find(|s| s.def.id == "approvals")
        .unwrap();
    let pm = approvals
        .form
        .fields
        .iter()
        .find(|f| f.name == "reviewed_by_pm")
        .unwrap();
    match &pm.kind {
        crate::widgets::form::FieldKind::Select { options, .. } => {
            assert_eq!(options.len(), 1);
            assert!(options[0].contains("pat@example.com"));
        }
        _ => panic!("expected select"),
    }
}

#[test]
fn assistant_stream_accumulates_then_finishes() {
    let mut st = test_state();
    st.assistant.input = "what failed?".into();
    let effects = update(&mut st, AppMsg::AssistantSendRequested);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::AssistantSend { .. })));
    assert!(st.assistant.busy);
    let _ = update(
        &mut st,
        AppMsg::StreamProgress {
            text: Some("Checking".into()),
        },
    );
    let _ = update(
        &mut st,
        AppMsg::StreamDone {
            result: Some(json!({"data": {"message": "All loop checks passed."}})),
            err: None,
        },
    );
    assert!(!st.assistant.busy);
    assert_eq!(st.assistant.messages.last().unwrap().text, "All loop checks passed.");
}

#[test]
fn restore_prompt_accept_applies_and_dismiss_discards() {
    let mut st = test_state();
    let mut fields = crate::draft::FieldSnapshot::new();
    fields.insert(
        "client_name".into(),
        crate::draft::SnapValue::One("ACME".into()),
    );
    let record = crate::draft::AutosaveRecord {
        timestamp: 1,
        current_step: 3,
        fields,
        signature: None,
    };
    st.pending_restore = Some(record.clone());
    let effects = update(&mut st, AppMsg::RestoreAccepted);
    assert!(st.pending_restore.is_none());
    assert_eq!(st.wizard.current, 3);
    assert!(effects.iter().any(|e| matches!(e, Effect::SaveInstant)));

    // Dismiss leaves the form untouched
    let mut st2 = test_state();
    st2.pending_restore = Some(record);
    let effects = update(&mut st2, AppMsg::RestoreDismissed);
    assert!(st2.pending_restore.is_none());
    assert!(effects.is_empty());
    assert_eq!(st2.wizard.current, 1);
}

#[test]
fn tick_drives_token_refresh_once_per_interval() {
    let mut st = test_state();
    let now = std::time::Instant::now();
    let effects = update(&mut st, AppMsg::Tick { now });
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::RefreshToken)));
    // Immediately after, the refresh is not due again
    let effects = update(&mut st, AppMsg::Tick { now });
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::RefreshToken)));
}

#[test]
fn instant_save_then_reload_restores_scalars() {
    let mut st = test_state();
    let fld = st.wizard.steps[0]
        .form
        .fields
        .iter_mut()
        .find(|f| f.name == "client_name")
        .unwrap();
    restore_value(fld, "ACME Water");
    let snap = st.wizard.snapshot(&st.tables);
    st.store.save_instant(&snap).unwrap();

    // Fresh session over the same store
    let mut st2 = AppState::new(default_report_config());
    st2.store = st.store.clone();
    crate::ui::apply_instant_snapshot(&mut st2);
    let restored = st2.wizard.steps[0]
        .form
        .fields
        .iter()
        .find(|f| f.name == "client_name")
        .unwrap();
    assert_eq!(
        restored.value,
        crate::widgets::form::FieldValue::Text("ACME Water".into())
    );
    // And the reloaded wizard still starts on step 1
    assert_eq!(st2.wizard.current, 1);
}

#[test]
fn category_mapping_covers_generated_tables() {
    assert_eq!(category_table("digital_inputs"), Some("digital_signals"));
    assert_eq!(category_table("modbus_analog"), Some("modbus_analogue"));
    assert_eq!(category_table("bogus"), None);
}

#[test]
fn submit_with_invalid_steps_traps_on_first_invalid() {
    let mut st = test_state();
    st.wizard.current = 1;
    let effects = update(&mut st, AppMsg::SubmitRequested);
    assert!(!st.submitting);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::ShowToast { .. })));
    assert!(matches!(st.view, View::Wizard));
}
