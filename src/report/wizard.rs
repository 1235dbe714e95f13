use crate::draft::{AutosaveRecord, FieldSnapshot, SnapValue};
use crate::model::{ReportConfig, StepDef};
use crate::report::rows::TableState;
use crate::report::signature::Signature;
use crate::widgets::form::{
    self, fields_from_step, first_invalid, restore_value, snapshot_value, FormState,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct StepState {
    pub def: StepDef,
    pub form: FormState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goto {
    Moved,
    Blocked,
}

/// The wizard controller: step states plus the 1-based active position.
/// Forward motion is validation-gated, backward motion never validates.
#[derive(Debug, Clone, Default)]
pub struct WizardState {
    pub steps: Vec<StepState>,
    pub current: usize,
}

impl WizardState {
    pub fn new(cfg: &ReportConfig) -> Self {
        let steps = cfg
            .steps
            .iter()
            .map(|def| StepState {
                form: FormState {
                    title: def.title.clone(),
                    fields: fields_from_step(def),
                    ..Default::default()
                },
                def: def.clone(),
            })
            .collect();
        Self { steps, current: 1 }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> Option<&StepState> {
        self.steps.get(self.current.saturating_sub(1))
    }

    pub fn current_step_mut(&mut self) -> Option<&mut StepState> {
        self.steps.get_mut(self.current.saturating_sub(1))
    }

    /// Request a move to `target`. Forward moves run the current step's
    /// validation; a failure marks the fields, parks the selection on the
    /// first invalid one and leaves the position unchanged.
    pub fn goto_step(&mut self, target: usize) -> Goto {
        let target = target.clamp(1, self.step_count().max(1));
        if target > self.current {
            if let Some(step) = self.current_step_mut() {
                if !form::validate_form(&mut step.form) {
                    if let Some(idx) = first_invalid(&step.form) {
                        step.form.selected = idx;
                    }
                    step.form.editing = false;
                    return Goto::Blocked;
                }
            }
        } else if let Some(step) = self.current_step_mut() {
            // Leaving backwards clears any stale error banner
            step.form.message = None;
        }
        self.current = target;
        if let Some(step) = self.current_step_mut() {
            step.form.selected = 0;
            step.form.editing = false;
        }
        Goto::Moved
    }

    /// Serialize every named, non-file field: scalar form fields plus each
    /// non-empty table column as an ordered sequence. Built fresh each call.
    pub fn snapshot(&self, tables: &BTreeMap<String, TableState>) -> FieldSnapshot {
        let mut snap = FieldSnapshot::new();
        for step in &self.steps {
            for fld in &step.form.fields {
                if let Some(v) = snapshot_value(fld) {
                    snap.insert(fld.name.clone(), SnapValue::One(v));
                }
            }
        }
        for table in tables.values() {
            if table.is_empty() {
                continue;
            }
            for col in &table.def.columns {
                if let Some(values) = table.column_values(&col.name) {
                    snap.insert(col.name.clone(), SnapValue::Many(values));
                }
            }
        }
        snap
    }

    /// Apply an accepted autosave record: scalars onto form fields,
    /// sequences onto table columns (creating rows first), then the
    /// signature, then the saved position.
    pub fn apply_restore(
        &mut self,
        record: &AutosaveRecord,
        tables: &mut BTreeMap<String, TableState>,
        signature: &mut Signature,
        tick: u64,
        log: &mut dyn FnMut(String),
    ) {
        for (name, value) in &record.fields {
            match value {
                SnapValue::One(v) => {
                    let mut placed = false;
                    for step in &mut self.steps {
                        if let Some(fld) =
                            step.form.fields.iter_mut().find(|f| f.name == *name)
                        {
                            restore_value(fld, v);
                            placed = true;
                            break;
                        }
                    }
                    if !placed {
                        log(format!("restore: no field named '{name}'"));
                    }
                }
                SnapValue::Many(values) => {
                    let target = tables
                        .values_mut()
                        .find(|t| t.def.columns.iter().any(|c| c.name == *name));
                    match target {
                        Some(table) => table.restore_column(name, values, tick),
                        None => log(format!("restore: no table column named '{name}'")),
                    }
                }
            }
        }
        if let Some(saved) = &record.signature {
            signature.restore(saved, log);
        }
        if record.current_step >= 1 && record.current_step <= self.step_count() {
            self.current = record.current_step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::now_epoch_secs;
    use crate::model::default_report_config;
    use crate::widgets::form::FieldValue;

    fn wizard_and_tables() -> (WizardState, BTreeMap<String, TableState>) {
        let cfg = default_report_config();
        let wizard = WizardState::new(&cfg);
        let tables: BTreeMap<String, TableState> = cfg
            .tables
            .iter()
            .map(|t| (t.id.clone(), TableState::new(t.clone())))
            .collect();
        (wizard, tables)
    }

    fn set_field(wizard: &mut WizardState, step: usize, name: &str, value: &str) {
        let fld = wizard.steps[step - 1]
            .form
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .unwrap();
        restore_value(fld, value);
    }

    #[test]
    fn starts_on_step_one() {
        let (wizard, _) = wizard_and_tables();
        assert_eq!(wizard.current, 1);
    }

    #[test]
    fn forward_blocked_until_required_fields_valid() {
        let (mut wizard, _) = wizard_and_tables();
        assert_eq!(wizard.goto_step(2), Goto::Blocked);
        assert_eq!(wizard.current, 1);
        // Errors were attached and the selection parked on the first
        let step = wizard.current_step().unwrap();
        assert!(step.form.fields[step.form.selected].error.is_some());

        for name in [
            "document_title",
            "document_reference",
            "project_reference",
            "client_name",
            "prepared_by",
        ] {
            set_field(&mut wizard, 1, name, "x");
        }
        set_field(&mut wizard, 1, "date_of_issue", "2026-08-06");
        assert_eq!(wizard.goto_step(2), Goto::Moved);
        assert_eq!(wizard.current, 2);
    }

    #[test]
    fn backward_never_validates() {
        let (mut wizard, _) = wizard_and_tables();
        wizard.current = 5;
        assert_eq!(wizard.goto_step(2), Goto::Moved);
        assert_eq!(wizard.current, 2);
    }

    #[test]
    fn goto_clamps_out_of_range_targets() {
        let (mut wizard, _) = wizard_and_tables();
        wizard.current = 3;
        assert_eq!(wizard.goto_step(0), Goto::Moved);
        assert_eq!(wizard.current, 1);
    }

    #[test]
    fn snapshot_roundtrips_through_restore() {
        let (mut wizard, mut tables) = wizard_and_tables();
        set_field(&mut wizard, 1, "client_name", "ACME Water");
        set_field(&mut wizard, 1, "date_of_issue", "2026-08-06");
        set_field(&mut wizard, 10, "confirm_accurate", "on");
        let docs = tables.get_mut("related_documents").unwrap();
        docs.add_row(0);
        docs.add_row(0);
        docs.restore_column("doc_number", &["D-1".into(), "D-2".into()], 0);

        let snap = wizard.snapshot(&tables);
        assert_eq!(
            snap.get("client_name"),
            Some(&SnapValue::One("ACME Water".into()))
        );
        assert_eq!(snap.get("confirm_accurate"), Some(&SnapValue::One("on".into())));
        assert_eq!(
            snap.get("doc_number"),
            Some(&SnapValue::Many(vec!["D-1".into(), "D-2".into()]))
        );
        // Empty tables stay out of the snapshot entirely
        assert!(!snap.contains_key("pretest_item"));

        // Rebuild from scratch and restore
        let (mut fresh, mut fresh_tables) = wizard_and_tables();
        let record = AutosaveRecord {
            timestamp: now_epoch_secs(),
            current_step: 4,
            fields: snap.clone(),
            signature: None,
        };
        let mut sig = Signature::default();
        let mut log = |_m: String| {};
        fresh.apply_restore(&record, &mut fresh_tables, &mut sig, 1, &mut log);
        assert_eq!(fresh.current, 4);
        assert_eq!(fresh.snapshot(&fresh_tables), snap);
    }

    #[test]
    fn restore_creates_rows_for_longer_sequences() {
        let (mut wizard, mut tables) = wizard_and_tables();
        let mut fields = FieldSnapshot::new();
        fields.insert(
            "doc_number".into(),
            SnapValue::Many(vec!["A".into(), "B".into(), "C".into()]),
        );
        let record = AutosaveRecord {
            timestamp: 1,
            current_step: 1,
            fields,
            signature: None,
        };
        let mut sig = Signature::default();
        let mut log = |_m: String| {};
        wizard.apply_restore(&record, &mut tables, &mut sig, 0, &mut log);
        assert_eq!(tables["related_documents"].rows.len(), 3);
        assert_eq!(
            tables["related_documents"].column_values("doc_number").unwrap(),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn restore_logs_unknown_names_and_keeps_going() {
        let (mut wizard, mut tables) = wizard_and_tables();
        let mut fields = FieldSnapshot::new();
        fields.insert("ghost_field".into(), SnapValue::One("x".into()));
        fields.insert("client_name".into(), SnapValue::One("Still set".into()));
        let record = AutosaveRecord {
            timestamp: 1,
            current_step: 1,
            fields,
            signature: None,
        };
        let mut sig = Signature::default();
        let mut msgs: Vec<String> = Vec::new();
        wizard.apply_restore(&record, &mut tables, &mut sig, 0, &mut |m| msgs.push(m));
        assert_eq!(msgs.len(), 1);
        let fld = wizard.steps[0]
            .form
            .fields
            .iter()
            .find(|f| f.name == "client_name")
            .unwrap();
        assert_eq!(fld.value, FieldValue::Text("Still set".into()));
    }

    #[test]
    fn out_of_range_saved_step_is_ignored() {
        let (mut wizard, mut tables) = wizard_and_tables();
        let record = AutosaveRecord {
            timestamp: 1,
            current_step: 99,
            fields: FieldSnapshot::new(),
            signature: None,
        };
        let mut sig = Signature::default();
        let mut log = |_m: String| {};
        wizard.apply_restore(&record, &mut tables, &mut sig, 0, &mut log);
        assert_eq!(wizard.current, 1);
    }
}
