use crate::model::{StepDef, TableDef};

pub fn step_key(step: &StepDef) -> String {
    format!("step:{}", step.id)
}

pub fn table_key(table: &TableDef) -> String {
    format!("table:{}", table.id)
}

pub fn api_key(call: &str) -> String {
    format!("api:{call}")
}
