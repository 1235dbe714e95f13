use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod timers;

/// A saved field value: scalar, or the ordered values of one repeatable
/// table column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SnapValue {
    One(String),
    Many(Vec<String>),
}

/// Name -> value mapping over every named, non-file field in the report.
/// Built fresh on each save; never merged.
pub type FieldSnapshot = BTreeMap<String, SnapValue>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutosaveRecord {
    pub timestamp: u64,
    pub current_step: usize,
    pub fields: FieldSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

const INSTANT_FILE: &str = "form_state.json";
const AUTOSAVE_PREFIX: &str = "autosave_";
const TOKEN_FILE: &str = "session_token";
const CURRENT_ID_FILE: &str = "current_submission";

/// On-disk draft store. One fixed file holds the instant snapshot; autosave
/// records get one file per submission id.
#[derive(Debug, Clone)]
pub struct DraftStore {
    root: PathBuf,
}

impl DraftStore {
    pub fn from_env() -> Self {
        let root = std::env::var("SAT_TUI_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(".sat-tui")
            });
        Self { root }
    }

    #[allow(dead_code)]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[allow(dead_code)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("creating draft dir {:?}", self.root))
    }

    fn autosave_path(&self, submission_id: &str) -> PathBuf {
        // Submission ids come from the backend or our own token generator;
        // strip path separators in case either misbehaves.
        let safe: String = submission_id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(format!("{AUTOSAVE_PREFIX}{safe}.json"))
    }

    // ---- instant snapshot ------------------------------------------------

    pub fn save_instant(&self, snapshot: &FieldSnapshot) -> Result<()> {
        self.ensure_root()?;
        let text = serde_json::to_string(snapshot)?;
        std::fs::write(self.root.join(INSTANT_FILE), text)
            .with_context(|| "writing instant snapshot")
    }

    pub fn load_instant(&self) -> Option<FieldSnapshot> {
        let text = std::fs::read_to_string(self.root.join(INSTANT_FILE)).ok()?;
        serde_json::from_str(&text).ok()
    }

    // ---- autosave records ------------------------------------------------

    fn write_autosave(&self, submission_id: &str, record: &AutosaveRecord) -> Result<()> {
        self.ensure_root()?;
        let text = serde_json::to_string(record)?;
        std::fs::write(self.autosave_path(submission_id), text)
            .with_context(|| format!("writing autosave for {submission_id}"))
    }

    /// Save an autosave record, evicting the oldest half of existing records
    /// and retrying once if the first write fails. Returns false when even
    /// the retry failed; the failure is reported through `log` and dropped.
    pub fn save_autosave(
        &self,
        submission_id: &str,
        record: &AutosaveRecord,
        log: &mut dyn FnMut(String),
    ) -> bool {
        match self.write_autosave(submission_id, record) {
            Ok(()) => true,
            Err(first) => {
                log(format!("autosave write failed, evicting old saves: {first}"));
                self.evict_oldest_half(log);
                match self.write_autosave(submission_id, record) {
                    Ok(()) => true,
                    Err(second) => {
                        log(format!("autosave dropped after retry: {second}"));
                        false
                    }
                }
            }
        }
    }

    pub fn load_autosave(&self, submission_id: &str) -> Option<AutosaveRecord> {
        let text = std::fs::read_to_string(self.autosave_path(submission_id)).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn delete_autosave(&self, submission_id: &str) {
        let _ = std::fs::remove_file(self.autosave_path(submission_id));
    }

    /// Re-key the record once the backend assigns a real submission id.
    pub fn adopt_submission_id(&self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        let from = self.autosave_path(old_id);
        let to = self.autosave_path(new_id);
        if from.exists() {
            let _ = std::fs::rename(from, to);
        }
    }

    fn autosave_entries(&self) -> Vec<(PathBuf, u64)> {
        let mut out: Vec<(PathBuf, u64)> = Vec::new();
        let Ok(dir) = std::fs::read_dir(&self.root) else {
            return out;
        };
        for entry in dir.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(AUTOSAVE_PREFIX) || !name.ends_with(".json") {
                continue;
            }
            // Unparseable records count as oldest
            let ts = std::fs::read_to_string(&path)
                .ok()
                .and_then(|text| serde_json::from_str::<AutosaveRecord>(&text).ok())
                .map(|r| r.timestamp)
                .unwrap_or(0);
            out.push((path, ts));
        }
        out
    }

    /// Remove the oldest half (rounded up) of autosave records by timestamp.
    pub fn evict_oldest_half(&self, log: &mut dyn FnMut(String)) {
        let mut entries = self.autosave_entries();
        entries.sort_by_key(|(_, ts)| *ts);
        let remove_count = entries.len().div_ceil(2);
        for (path, _) in entries.into_iter().take(remove_count) {
            if std::fs::remove_file(&path).is_ok() {
                log(format!("evicted old draft {path:?}"));
            }
        }
    }

    // ---- current submission id -------------------------------------------

    /// The submission id the running draft is keyed under; survives restarts
    /// so the recovery prompt can find the matching record.
    pub fn save_current_id(&self, id: &str) -> Result<()> {
        self.ensure_root()?;
        std::fs::write(self.root.join(CURRENT_ID_FILE), id)
            .with_context(|| "writing current submission id")
    }

    pub fn load_current_id(&self) -> Option<String> {
        let t = std::fs::read_to_string(self.root.join(CURRENT_ID_FILE)).ok()?;
        let t = t.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    }

    pub fn clear_current_id(&self) {
        let _ = std::fs::remove_file(self.root.join(CURRENT_ID_FILE));
    }

    // ---- session token ---------------------------------------------------

    pub fn save_token(&self, token: &str) -> Result<()> {
        self.ensure_root()?;
        std::fs::write(self.root.join(TOKEN_FILE), token).with_context(|| "writing session token")
    }

    pub fn load_token(&self) -> Option<String> {
        let t = std::fs::read_to_string(self.root.join(TOKEN_FILE)).ok()?;
        let t = t.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    }
}

/// Locally generated placeholder id used until the backend assigns one.
pub fn temporary_submission_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("draft-{:x}-{:x}", std::process::id(), nanos)
}

pub fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> DraftStore {
        let dir = std::env::temp_dir().join(format!(
            "sat-tui-test-{tag}-{}",
            temporary_submission_id()
        ));
        DraftStore::at(dir)
    }

    fn record(ts: u64) -> AutosaveRecord {
        let mut fields = FieldSnapshot::new();
        fields.insert("client_name".into(), SnapValue::One("ACME Water".into()));
        fields.insert(
            "doc_number".into(),
            SnapValue::Many(vec!["D-1".into(), "D-2".into()]),
        );
        AutosaveRecord {
            timestamp: ts,
            current_step: 3,
            fields,
            signature: None,
        }
    }

    #[test]
    fn instant_snapshot_roundtrips() {
        let store = temp_store("instant");
        let mut snap = FieldSnapshot::new();
        snap.insert("project_reference".into(), SnapValue::One("P-100".into()));
        snap.insert(
            "ip_address".into(),
            SnapValue::Many(vec!["10.0.0.1".into(), "10.0.0.2".into()]),
        );
        store.save_instant(&snap).unwrap();
        let loaded = store.load_instant().unwrap();
        assert_eq!(loaded, snap);
    }

    #[test]
    fn autosave_roundtrips_and_deletes() {
        let store = temp_store("roundtrip");
        let mut log = |_m: String| {};
        assert!(store.save_autosave("draft-abc", &record(10), &mut log));
        let loaded = store.load_autosave("draft-abc").unwrap();
        assert_eq!(loaded.current_step, 3);
        assert_eq!(
            loaded.fields.get("client_name"),
            Some(&SnapValue::One("ACME Water".into()))
        );
        store.delete_autosave("draft-abc");
        assert!(store.load_autosave("draft-abc").is_none());
    }

    #[test]
    fn adopting_server_id_migrates_the_record() {
        let store = temp_store("adopt");
        let mut log = |_m: String| {};
        assert!(store.save_autosave("draft-tmp", &record(5), &mut log));
        store.adopt_submission_id("draft-tmp", "SUB-9");
        assert!(store.load_autosave("draft-tmp").is_none());
        assert_eq!(store.load_autosave("SUB-9").unwrap().timestamp, 5);
    }

    #[test]
    fn eviction_removes_oldest_half_and_unparseable_first() {
        let store = temp_store("evict");
        let mut log = |_m: String| {};
        for (id, ts) in [("a", 100), ("b", 50), ("c", 300), ("d", 200)] {
            assert!(store.save_autosave(id, &record(ts), &mut log));
        }
        // A corrupted record counts as timestamp 0
        std::fs::write(store.root().join("autosave_junk.json"), "{not json").unwrap();
        let mut evicted: Vec<String> = Vec::new();
        store.evict_oldest_half(&mut |m| evicted.push(m));
        // 5 records -> 3 evicted: junk (0), b (50), a (100)
        assert_eq!(evicted.len(), 3);
        assert!(store.load_autosave("a").is_none());
        assert!(store.load_autosave("b").is_none());
        assert!(store.load_autosave("c").is_some());
        assert!(store.load_autosave("d").is_some());
    }

    #[test]
    fn token_persists_between_stores_on_same_root() {
        let store = temp_store("token");
        store.save_token("tok-123").unwrap();
        let other = DraftStore::at(store.root().to_path_buf());
        assert_eq!(other.load_token().as_deref(), Some("tok-123"));
    }

    #[test]
    fn temporary_ids_are_distinct() {
        assert_ne!(temporary_submission_id(), temporary_submission_id());
    }
}
