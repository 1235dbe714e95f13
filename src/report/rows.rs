use crate::model::TableDef;
use serde_json::Value as JsonValue;

/// One row of a repeatable table; values align with the table's columns.
#[derive(Debug, Clone)]
pub struct Row {
    pub values: Vec<String>,
    // Tick the row appeared on, for the one-shot fade-in
    pub born_tick: u64,
}

#[derive(Debug, Clone)]
pub struct TableState {
    pub def: TableDef,
    pub rows: Vec<Row>,
    pub cursor_row: usize,
    pub cursor_col: usize,
    pub editing: bool,
}

impl TableState {
    pub fn new(def: TableDef) -> Self {
        Self {
            def,
            rows: Vec::new(),
            cursor_row: 0,
            cursor_col: 0,
            editing: false,
        }
    }

    pub fn add_row(&mut self, tick: u64) {
        self.rows.push(Row {
            values: vec![String::new(); self.def.columns.len()],
            born_tick: tick,
        });
    }

    /// Remove by position; out-of-range is a no-op.
    pub fn remove_row(&mut self, index: usize) -> bool {
        if index >= self.rows.len() {
            return false;
        }
        self.rows.remove(index);
        if self.cursor_row >= self.rows.len() && self.cursor_row > 0 {
            self.cursor_row -= 1;
        }
        true
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.def.columns.iter().position(|c| c.name == name)
    }

    /// Saved values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<String>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.values.get(idx).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Restore one column, creating rows through the template when the saved
    /// sequence is longer than what currently exists.
    pub fn restore_column(&mut self, name: &str, saved: &[String], tick: u64) {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        while self.rows.len() < saved.len() {
            self.add_row(tick);
        }
        for (ri, val) in saved.iter().enumerate() {
            if let Some(row) = self.rows.get_mut(ri) {
                if let Some(slot) = row.values.get_mut(idx) {
                    *slot = val.clone();
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace the table contents with generated records. The column `key`
    /// is the authoritative mapping; keys the mapping misses fall back to
    /// case/separator permutations of the column display name. Keys that
    /// still match nothing are reported back, never fatal.
    pub fn populate_from_records(
        &mut self,
        records: &[serde_json::Map<String, JsonValue>],
        tick: u64,
    ) -> Vec<String> {
        let mut unplaced: Vec<String> = Vec::new();
        self.rows.clear();
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.editing = false;
        for record in records {
            self.add_row(tick);
            let row_idx = self.rows.len() - 1;
            for (key, value) in record {
                let col = self
                    .def
                    .columns
                    .iter()
                    .position(|c| c.key == *key)
                    .or_else(|| {
                        name_permutations(key)
                            .into_iter()
                            .find_map(|candidate| self.column_index(&candidate))
                    });
                match col {
                    Some(ci) => {
                        if let Some(slot) = self.rows[row_idx].values.get_mut(ci) {
                            *slot = json_scalar(value);
                        }
                    }
                    None => {
                        let tag = format!("{}:{}", self.def.id, key);
                        if !unplaced.contains(&tag) {
                            unplaced.push(tag);
                        }
                    }
                }
            }
        }
        unplaced
    }
}

fn json_scalar(v: &JsonValue) -> String {
    match v {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn title_case(s: &str) -> String {
    s.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
}

/// Candidate field names tried when the static mapping misses a record key.
fn name_permutations(key: &str) -> Vec<String> {
    let spaced = key.replace('_', " ");
    vec![
        key.to_string(),
        capitalize(key),
        key.to_uppercase(),
        spaced.clone(),
        title_case(&spaced),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnDef;
    use serde_json::json;

    fn table(columns: &[(&str, &str)]) -> TableState {
        TableState::new(TableDef {
            id: "t".into(),
            title: "T".into(),
            columns: columns
                .iter()
                .map(|(key, name)| ColumnDef {
                    key: (*key).into(),
                    name: (*name).into(),
                    label: (*name).into(),
                })
                .collect(),
        })
    }

    #[test]
    fn adds_minus_removes_equals_row_count() {
        let mut t = table(&[("a", "a")]);
        for _ in 0..5 {
            t.add_row(0);
        }
        assert!(t.remove_row(0));
        assert!(t.remove_row(2));
        assert_eq!(t.rows.len(), 3);
        // Removing a nonexistent row is a no-op
        assert!(!t.remove_row(99));
        assert_eq!(t.rows.len(), 3);
    }

    #[test]
    fn restore_column_creates_missing_rows() {
        let mut t = table(&[("doc_number", "doc_number"), ("doc_title", "doc_title")]);
        t.add_row(0);
        t.restore_column(
            "doc_number",
            &["D-1".into(), "D-2".into(), "D-3".into()],
            7,
        );
        assert_eq!(t.rows.len(), 3);
        assert_eq!(t.column_values("doc_number").unwrap(), vec!["D-1", "D-2", "D-3"]);
        // The untouched column padded out with empties
        assert_eq!(t.column_values("doc_title").unwrap(), vec!["", "", ""]);
        assert_eq!(t.rows[2].born_tick, 7);
    }

    #[test]
    fn populate_uses_static_mapping_first() {
        let mut t = table(&[
            ("signal_tag", "output_signal_tag"),
            ("result", "output_result"),
        ]);
        let records = vec![
            json!({"signal_tag": "DO-001", "result": "Pass"}),
            json!({"signal_tag": "DO-002", "result": "Fail"}),
        ];
        let records: Vec<_> = records
            .into_iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect();
        let unplaced = t.populate_from_records(&records, 3);
        assert!(unplaced.is_empty());
        assert_eq!(
            t.column_values("output_signal_tag").unwrap(),
            vec!["DO-001", "DO-002"]
        );
        assert_eq!(t.column_values("output_result").unwrap(), vec!["Pass", "Fail"]);
    }

    #[test]
    fn populate_falls_back_to_name_permutations() {
        // Column keys that do not match the record keys, names that do once
        // permuted: "address" -> "Address", "punch_item" -> "Punch Item"
        let mut t = table(&[("x1", "Address"), ("x2", "Punch Item")]);
        let record = json!({"address": 40001, "punch_item": "none"})
            .as_object()
            .cloned()
            .unwrap();
        let unplaced = t.populate_from_records(&[record], 0);
        assert!(unplaced.is_empty());
        assert_eq!(t.column_values("Address").unwrap(), vec!["40001"]);
        assert_eq!(t.column_values("Punch Item").unwrap(), vec!["none"]);
    }

    #[test]
    fn populate_reports_unplaceable_keys_without_failing() {
        let mut t = table(&[("address", "Address")]);
        let record = json!({"address": 1, "mystery_key": "y"})
            .as_object()
            .cloned()
            .unwrap();
        let unplaced = t.populate_from_records(&[record], 0);
        assert_eq!(unplaced, vec!["t:mystery_key"]);
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.column_values("Address").unwrap(), vec!["1"]);
    }

    #[test]
    fn populate_replaces_existing_rows() {
        let mut t = table(&[("a", "a")]);
        t.add_row(0);
        t.add_row(0);
        let record = json!({"a": "fresh"}).as_object().cloned().unwrap();
        t.populate_from_records(&[record], 1);
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.column_values("a").unwrap(), vec!["fresh"]);
    }
}
