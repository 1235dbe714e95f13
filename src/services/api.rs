use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::thread;

use crate::services::backend::{quote_arg, run_cmdline_to_json};
use crate::ui::{LoadKind, LoadMsg};

/// Channel-count spec returned by the module lookup backend.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ChannelSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub digital_inputs: u32,
    #[serde(default)]
    pub digital_outputs: u32,
    #[serde(default)]
    pub analog_inputs: u32,
    #[serde(default)]
    pub analog_outputs: u32,
    #[serde(default)]
    pub total_channels: u32,
    #[serde(default)]
    pub voltage_range: Option<String>,
    #[serde(default)]
    pub current_range: Option<String>,
}

impl ChannelSpec {
    pub fn total(&self) -> u32 {
        self.digital_inputs + self.digital_outputs + self.analog_inputs + self.analog_outputs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecSource {
    Cached,
    Web,
    Manual,
}

impl SpecSource {
    pub fn parse(s: &str) -> Self {
        match s {
            "web" => SpecSource::Web,
            "manual" => SpecSource::Manual,
            // the backend reports its db hits as "cached" or "database"
            _ => SpecSource::Cached,
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            SpecSource::Cached => "cached",
            SpecSource::Web => "web",
            SpecSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GenerationSummary {
    #[serde(default)]
    pub total_digital_inputs: u64,
    #[serde(default)]
    pub total_digital_outputs: u64,
    #[serde(default)]
    pub total_analog_inputs: u64,
    #[serde(default)]
    pub total_analog_outputs: u64,
    #[serde(default)]
    pub total_modbus_digital: u64,
    #[serde(default)]
    pub total_modbus_analog: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedTables {
    // category -> record list, in backend order
    pub tables: BTreeMap<String, Vec<serde_json::Map<String, JsonValue>>>,
    pub summary: GenerationSummary,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UserEntry {
    pub name: String,
    pub email: String,
}

fn envelope_data(v: &JsonValue) -> Result<&JsonValue, String> {
    let ok = v.get("ok").and_then(|b| b.as_bool()).unwrap_or(true);
    if !ok {
        let msg = v
            .get("error")
            .and_then(|e| e.as_str())
            .or_else(|| {
                v.get("data")
                    .and_then(|d| d.get("error"))
                    .and_then(|e| e.as_str())
            })
            .unwrap_or("backend reported an error");
        return Err(msg.to_string());
    }
    Ok(v.get("data").unwrap_or(v))
}

pub fn parse_module_lookup(v: &JsonValue) -> Result<(ChannelSpec, SpecSource), String> {
    let data = envelope_data(v)?;
    let success = data
        .get("success")
        .and_then(|b| b.as_bool())
        .unwrap_or(true);
    if !success {
        let msg = data
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("module not found");
        return Err(msg.to_string());
    }
    let module = data.get("module").cloned().unwrap_or(JsonValue::Null);
    let spec: ChannelSpec =
        serde_json::from_value(module).map_err(|e| format!("module spec: {e}"))?;
    let source = SpecSource::parse(data.get("source").and_then(|s| s.as_str()).unwrap_or(""));
    Ok((spec, source))
}

pub fn parse_generated_tables(v: &JsonValue) -> Result<GeneratedTables, String> {
    let data = envelope_data(v)?;
    let success = data
        .get("success")
        .and_then(|b| b.as_bool())
        .unwrap_or(true);
    if !success {
        let msg = data
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("generation failed");
        return Err(msg.to_string());
    }
    let mut out = GeneratedTables::default();
    if let Some(tables) = data.get("tables").and_then(|t| t.as_object()) {
        for (category, records) in tables {
            let rows: Vec<serde_json::Map<String, JsonValue>> = records
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|r| r.as_object().cloned())
                        .collect()
                })
                .unwrap_or_default();
            out.tables.insert(category.clone(), rows);
        }
    }
    if let Some(summary) = data.get("summary") {
        out.summary = serde_json::from_value(summary.clone()).unwrap_or_default();
    }
    Ok(out)
}

pub fn parse_users_by_role(v: &JsonValue) -> Result<BTreeMap<String, Vec<UserEntry>>, String> {
    let data = envelope_data(v)?;
    let mut out: BTreeMap<String, Vec<UserEntry>> = BTreeMap::new();
    if let Some(users) = data.get("users").and_then(|u| u.as_object()) {
        for (role, list) in users {
            let entries: Vec<UserEntry> = list
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|u| serde_json::from_value(u.clone()).ok())
                        .collect()
                })
                .unwrap_or_default();
            out.insert(role.clone(), entries);
        }
    }
    Ok(out)
}

pub fn parse_session_token(v: &JsonValue) -> Result<String, String> {
    let data = envelope_data(v)?;
    data.get("token")
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| "token refresh returned no token".to_string())
}

/// save-progress may hand back a newly assigned submission id.
pub fn parse_save_progress(v: &JsonValue) -> Result<Option<String>, String> {
    let data = envelope_data(v)?;
    Ok(data
        .get("submission_id")
        .and_then(|s| s.as_str())
        .map(|s| s.to_string()))
}

fn token_args(token: &Option<String>) -> String {
    match token {
        Some(t) if !t.is_empty() => format!(" --token {}", quote_arg(t)),
        _ => String::new(),
    }
}

fn spawn_call(cmdline: String, key: String, kind: LoadKind, tx: Sender<LoadMsg>) {
    thread::spawn(move || {
        let outcome = run_cmdline_to_json(&cmdline).map_err(|e| format!("{e}"));
        let _ = tx.send(LoadMsg { key, kind, outcome });
    });
}

pub fn spawn_module_lookup(
    company: &str,
    model: &str,
    token: &Option<String>,
    tx: Sender<LoadMsg>,
) {
    let cmdline = format!(
        "${{APP_BIN}} module-lookup --company {} --model {}{}",
        quote_arg(company),
        quote_arg(model),
        token_args(token)
    );
    spawn_call(
        cmdline,
        crate::nav::keys::api_key("module-lookup"),
        LoadKind::ModuleLookup,
        tx,
    );
}

pub fn spawn_generate_tables(payload: &JsonValue, token: &Option<String>, tx: Sender<LoadMsg>) {
    let cmdline = format!(
        "${{APP_BIN}} generate-tables --payload {}{}",
        quote_arg(&payload.to_string()),
        token_args(token)
    );
    spawn_call(
        cmdline,
        crate::nav::keys::api_key("generate-tables"),
        LoadKind::GenerateTables,
        tx,
    );
}

pub fn spawn_fetch_users(token: &Option<String>, tx: Sender<LoadMsg>) {
    let cmdline = format!("${{APP_BIN}} list-users{}", token_args(token));
    spawn_call(
        cmdline,
        crate::nav::keys::api_key("list-users"),
        LoadKind::Users,
        tx,
    );
}

pub fn spawn_refresh_token(tx: Sender<LoadMsg>) {
    let cmdline = "${APP_BIN} refresh-token".to_string();
    spawn_call(
        cmdline,
        crate::nav::keys::api_key("refresh-token"),
        LoadKind::TokenRefresh,
        tx,
    );
}

pub fn spawn_save_progress(payload: &JsonValue, token: &Option<String>, tx: Sender<LoadMsg>) {
    let cmdline = format!(
        "${{APP_BIN}} save-progress --payload {}{}",
        quote_arg(&payload.to_string()),
        token_args(token)
    );
    spawn_call(
        cmdline,
        crate::nav::keys::api_key("save-progress"),
        LoadKind::SaveProgress,
        tx,
    );
}

pub fn spawn_submit_report(payload: &JsonValue, token: &Option<String>, tx: Sender<LoadMsg>) {
    let cmdline = format!(
        "${{APP_BIN}} submit-report --payload {}{}",
        quote_arg(&payload.to_string()),
        token_args(token)
    );
    spawn_call(
        cmdline,
        crate::nav::keys::api_key("submit-report"),
        LoadKind::Submit,
        tx,
    );
}

pub fn spawn_register_research_doc(path: &str, token: &Option<String>, tx: Sender<LoadMsg>) {
    let cmdline = format!(
        "${{APP_BIN}} assistant-upload --file {}{}",
        quote_arg(path),
        token_args(token)
    );
    spawn_call(
        cmdline,
        crate::nav::keys::api_key("assistant-upload"),
        LoadKind::AssistantUpload,
        tx,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn module_lookup_parses_spec_and_source() {
        let env = json!({
            "ok": true,
            "data": {
                "success": true,
                "module": {
                    "description": "16ch DI",
                    "digital_inputs": 16,
                    "total_channels": 16
                },
                "source": "web"
            }
        });
        let (spec, source) = parse_module_lookup(&env).unwrap();
        assert_eq!(spec.digital_inputs, 16);
        assert_eq!(spec.total(), 16);
        assert_eq!(source, SpecSource::Web);
    }

    #[test]
    fn module_lookup_surfaces_backend_error() {
        let env = json!({
            "ok": true,
            "data": {"success": false, "error": "unknown model"}
        });
        let err = parse_module_lookup(&env).unwrap_err();
        assert_eq!(err, "unknown model");
    }

    #[test]
    fn unknown_source_defaults_to_cached() {
        assert_eq!(SpecSource::parse("database"), SpecSource::Cached);
        assert_eq!(SpecSource::parse(""), SpecSource::Cached);
    }

    #[test]
    fn generated_tables_parses_categories_and_summary() {
        let env = json!({
            "ok": true,
            "data": {
                "success": true,
                "tables": {
                    "digital_inputs": [
                        {"sno": 1, "signal_tag": "DI-001"},
                        {"sno": 2, "signal_tag": "DI-002"}
                    ],
                    "modbus_digital": [{"address": 10}]
                },
                "summary": {"total_digital_inputs": 2, "total_modbus_digital": 1}
            }
        });
        let gen = parse_generated_tables(&env).unwrap();
        assert_eq!(gen.tables["digital_inputs"].len(), 2);
        assert_eq!(gen.summary.total_digital_inputs, 2);
        assert_eq!(gen.summary.total_modbus_digital, 1);
    }

    #[test]
    fn users_by_role_groups_entries() {
        let env = json!({
            "ok": true,
            "data": {"users": {
                "PM": [{"name": "Pat", "email": "pat@example.com"}],
                "Automation Manager": []
            }}
        });
        let users = parse_users_by_role(&env).unwrap();
        assert_eq!(users["PM"][0].email, "pat@example.com");
        assert!(users["Automation Manager"].is_empty());
    }

    #[test]
    fn save_progress_yields_assigned_id() {
        let env = json!({"ok": true, "data": {"submission_id": "SUB-42"}});
        assert_eq!(
            parse_save_progress(&env).unwrap().as_deref(),
            Some("SUB-42")
        );
        let env2 = json!({"ok": true, "data": {}});
        assert_eq!(parse_save_progress(&env2).unwrap(), None);
    }

    #[test]
    fn error_envelope_is_an_err() {
        let env = json!({"ok": false, "error": "session expired"});
        assert_eq!(parse_session_token(&env).unwrap_err(), "session expired");
    }
}
