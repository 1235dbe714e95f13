use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Date,
    Number,
    Textarea,
    Select,
    Checkbox,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldDef {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    // Regex the value must match (native pattern attribute analog)
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    // Select options filled from the user directory for this role
    #[serde(default)]
    pub options_from_role: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// One column of a repeatable table. `key` is the record key the generation
/// backend emits; `name` is the form field name rows expose. Keeping both here
/// makes this the single source of truth for row creation and for matching
/// generated records back onto rows.
#[derive(Debug, Deserialize, Clone)]
pub struct ColumnDef {
    pub key: String,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableDef {
    pub id: String,
    pub title: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AttachmentSlotDef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StepDef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    // Ids of repeatable tables shown on this step
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub signature: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    pub steps: Vec<StepDef>,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub attachments: Vec<AttachmentSlotDef>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        default_report_config()
    }
}

impl ReportConfig {
    pub fn table(&self, id: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn attachment(&self, id: &str) -> Option<&AttachmentSlotDef> {
        self.attachments.iter().find(|a| a.id == id)
    }
}

pub(crate) fn validate_report_config(cfg: &ReportConfig) -> Result<(), String> {
    use std::collections::HashSet;
    if cfg.steps.is_empty() {
        return Err("report config has no steps".into());
    }
    let mut step_ids = HashSet::new();
    for (i, s) in cfg.steps.iter().enumerate() {
        if !step_ids.insert(&s.id) {
            return Err(format!("duplicate step id: '{}' at index {}", s.id, i));
        }
        let mut names = HashSet::new();
        for f in &s.fields {
            if !names.insert(&f.name) {
                return Err(format!("step '{}' has duplicate field '{}'", s.id, f.name));
            }
            if f.field_type == FieldType::Select
                && f.options.is_empty()
                && f.options_from_role.is_none()
            {
                return Err(format!(
                    "step '{}' select '{}' has no options and no role source",
                    s.id, f.name
                ));
            }
        }
        for t in &s.tables {
            if cfg.table(t).is_none() {
                return Err(format!("step '{}' refers to unknown table '{}'", s.id, t));
            }
        }
        for a in &s.attachments {
            if cfg.attachment(a).is_none() {
                return Err(format!(
                    "step '{}' refers to unknown attachment slot '{}'",
                    s.id, a
                ));
            }
        }
    }
    let mut table_ids = HashSet::new();
    for t in &cfg.tables {
        if !table_ids.insert(&t.id) {
            return Err(format!("duplicate table id: '{}'", t.id));
        }
        if t.columns.is_empty() {
            return Err(format!("table '{}' has no columns", t.id));
        }
        let mut cols = HashSet::new();
        for c in &t.columns {
            if !cols.insert(&c.name) {
                return Err(format!("table '{}' has duplicate column '{}'", t.id, c.name));
            }
        }
    }
    let mut slot_ids = HashSet::new();
    for a in &cfg.attachments {
        if !slot_ids.insert(&a.id) {
            return Err(format!("duplicate attachment slot id: '{}'", a.id));
        }
    }
    Ok(())
}

fn field(name: &str, label: &str, ft: FieldType, required: bool) -> FieldDef {
    FieldDef {
        name: name.into(),
        label: label.into(),
        field_type: ft,
        required,
        ..Default::default()
    }
}

fn signal_columns(prefix: &str) -> Vec<ColumnDef> {
    let named = |key: &str, label: &str| ColumnDef {
        key: key.into(),
        name: if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}_{key}")
        },
        label: label.into(),
    };
    vec![
        named("sno", "S.No"),
        named("rack_no", "Rack"),
        named("module_position", "Pos"),
        named("signal_tag", "Signal Tag"),
        named("signal_description", "Description"),
        named("result", "Result"),
        named("punch_item", "Punch"),
        named("verified_by", "Verified By"),
        named("comment", "Comment"),
    ]
}

/// Built-in layout of the full SAT report. A site can override it with
/// sat-report.yaml in SAT_TUI_CONFIG_DIR; the shipped default covers every
/// step of the paper form.
pub fn default_report_config() -> ReportConfig {
    let review_columns = |prefix: &str| -> Vec<ColumnDef> {
        let named = |key: &str, label: &str| ColumnDef {
            key: key.into(),
            name: format!("{prefix}_{key}"),
            label: label.into(),
        };
        vec![
            named("item", "Item"),
            named("result", "Result"),
            named("comment", "Comment"),
        ]
    };
    let tables = vec![
        TableDef {
            id: "related_documents".into(),
            title: "Related Documents".into(),
            columns: vec![
                ColumnDef {
                    key: "doc_number".into(),
                    name: "doc_number".into(),
                    label: "Document No".into(),
                },
                ColumnDef {
                    key: "doc_title".into(),
                    name: "doc_title".into(),
                    label: "Title".into(),
                },
                ColumnDef {
                    key: "doc_revision".into(),
                    name: "doc_revision".into(),
                    label: "Rev".into(),
                },
            ],
        },
        TableDef {
            id: "pre_approvals".into(),
            title: "Pre-Execution Approvals".into(),
            columns: vec![
                ColumnDef {
                    key: "approver_name".into(),
                    name: "pre_approver_name".into(),
                    label: "Name".into(),
                },
                ColumnDef {
                    key: "approver_role".into(),
                    name: "pre_approver_role".into(),
                    label: "Role".into(),
                },
                ColumnDef {
                    key: "approver_email".into(),
                    name: "pre_approver_email".into(),
                    label: "Email".into(),
                },
            ],
        },
        TableDef {
            id: "post_approvals".into(),
            title: "Post-Execution Approvals".into(),
            columns: vec![
                ColumnDef {
                    key: "approver_name".into(),
                    name: "post_approver_name".into(),
                    label: "Name".into(),
                },
                ColumnDef {
                    key: "approver_role".into(),
                    name: "post_approver_role".into(),
                    label: "Role".into(),
                },
                ColumnDef {
                    key: "approver_email".into(),
                    name: "post_approver_email".into(),
                    label: "Email".into(),
                },
            ],
        },
        TableDef {
            id: "pretest".into(),
            title: "Pre-Test Requirements".into(),
            columns: review_columns("pretest"),
        },
        TableDef {
            id: "key_components".into(),
            title: "Key Components".into(),
            columns: vec![
                ColumnDef {
                    key: "component".into(),
                    name: "component".into(),
                    label: "Component".into(),
                },
                ColumnDef {
                    key: "manufacturer".into(),
                    name: "component_manufacturer".into(),
                    label: "Manufacturer".into(),
                },
                ColumnDef {
                    key: "model".into(),
                    name: "component_model".into(),
                    label: "Model".into(),
                },
                ColumnDef {
                    key: "serial".into(),
                    name: "component_serial".into(),
                    label: "Serial".into(),
                },
            ],
        },
        TableDef {
            id: "ip_records".into(),
            title: "IP Address Records".into(),
            columns: vec![
                ColumnDef {
                    key: "device".into(),
                    name: "ip_device".into(),
                    label: "Device".into(),
                },
                ColumnDef {
                    key: "address".into(),
                    name: "ip_address".into(),
                    label: "IP Address".into(),
                },
                ColumnDef {
                    key: "comment".into(),
                    name: "ip_comment".into(),
                    label: "Comment".into(),
                },
            ],
        },
        TableDef {
            id: "digital_signals".into(),
            title: "Digital Input Signals".into(),
            columns: signal_columns(""),
        },
        TableDef {
            id: "digital_outputs".into(),
            title: "Digital Output Signals".into(),
            columns: signal_columns("output"),
        },
        TableDef {
            id: "analogue_inputs".into(),
            title: "Analogue Input Signals".into(),
            columns: signal_columns("analog"),
        },
        TableDef {
            id: "analogue_outputs".into(),
            title: "Analogue Output Signals".into(),
            columns: signal_columns("analog_output"),
        },
        // Modbus templates predate the naming convention above; their field
        // names are kept verbatim so population exercises the mapping table.
        TableDef {
            id: "modbus_digital".into(),
            title: "Modbus Digital".into(),
            columns: vec![
                ColumnDef {
                    key: "address".into(),
                    name: "Address".into(),
                    label: "Address".into(),
                },
                ColumnDef {
                    key: "description".into(),
                    name: "Description".into(),
                    label: "Description".into(),
                },
                ColumnDef {
                    key: "remarks".into(),
                    name: "Remarks".into(),
                    label: "Remarks".into(),
                },
                ColumnDef {
                    key: "result".into(),
                    name: "Digital_Result".into(),
                    label: "Result".into(),
                },
                ColumnDef {
                    key: "punch_item".into(),
                    name: "Digital_Punch Item".into(),
                    label: "Punch".into(),
                },
                ColumnDef {
                    key: "verified_by".into(),
                    name: "Digital_Verified By".into(),
                    label: "Verified By".into(),
                },
                ColumnDef {
                    key: "comment".into(),
                    name: "Digital_Comment".into(),
                    label: "Comment".into(),
                },
            ],
        },
        TableDef {
            id: "modbus_analogue".into(),
            title: "Modbus Analogue".into(),
            columns: vec![
                ColumnDef {
                    key: "address".into(),
                    name: "Address Analogue".into(),
                    label: "Address".into(),
                },
                ColumnDef {
                    key: "description".into(),
                    name: "Description Analogue".into(),
                    label: "Description".into(),
                },
                ColumnDef {
                    key: "range".into(),
                    name: "Range Analogue".into(),
                    label: "Range".into(),
                },
                ColumnDef {
                    key: "result".into(),
                    name: "Result Analogue".into(),
                    label: "Result".into(),
                },
                ColumnDef {
                    key: "punch_item".into(),
                    name: "Punch Item Analogue".into(),
                    label: "Punch".into(),
                },
                ColumnDef {
                    key: "verified_by".into(),
                    name: "Verified By Analogue".into(),
                    label: "Verified By".into(),
                },
                ColumnDef {
                    key: "comment".into(),
                    name: "Comment Analogue".into(),
                    label: "Comment".into(),
                },
            ],
        },
        TableDef {
            id: "process_test".into(),
            title: "Process Test".into(),
            columns: review_columns("process"),
        },
        TableDef {
            id: "scada_verification".into(),
            title: "SCADA Verification".into(),
            columns: review_columns("scada"),
        },
        TableDef {
            id: "trends_testing".into(),
            title: "Trends Testing".into(),
            columns: review_columns("trends"),
        },
        TableDef {
            id: "alarm_list".into(),
            title: "Alarm List".into(),
            columns: review_columns("alarm"),
        },
    ];

    let attachments = vec![
        AttachmentSlotDef {
            id: "scada_screens".into(),
            title: "SCADA Screenshots".into(),
        },
        AttachmentSlotDef {
            id: "trend_screens".into(),
            title: "Trend Screenshots".into(),
        },
        AttachmentSlotDef {
            id: "alarm_screens".into(),
            title: "Alarm Screenshots".into(),
        },
    ];

    let steps = vec![
        StepDef {
            id: "document-control".into(),
            title: "Document Control".into(),
            fields: vec![
                field("document_title", "Document Title", FieldType::Text, true),
                field("document_reference", "Document Reference", FieldType::Text, true),
                field("project_reference", "Project Reference", FieldType::Text, true),
                field("client_name", "Client", FieldType::Text, true),
                field("revision", "Revision", FieldType::Text, false),
                field("prepared_by", "Prepared By", FieldType::Text, true),
                field("date_of_issue", "Date of Issue", FieldType::Date, true),
            ],
            tables: vec!["related_documents".into()],
            ..Default::default()
        },
        StepDef {
            id: "approvals".into(),
            title: "Approvals".into(),
            fields: vec![
                FieldDef {
                    name: "reviewed_by_tech_lead".into(),
                    label: "Technical Lead".into(),
                    field_type: FieldType::Select,
                    required: true,
                    options_from_role: Some("Automation Manager".into()),
                    ..Default::default()
                },
                FieldDef {
                    name: "reviewed_by_pm".into(),
                    label: "Project Manager".into(),
                    field_type: FieldType::Select,
                    required: true,
                    options_from_role: Some("PM".into()),
                    ..Default::default()
                },
                FieldDef {
                    name: "approver_email".into(),
                    label: "Client Approver Email".into(),
                    field_type: FieldType::Email,
                    required: true,
                    ..Default::default()
                },
            ],
            tables: vec!["pre_approvals".into(), "post_approvals".into()],
            ..Default::default()
        },
        StepDef {
            id: "introduction".into(),
            title: "Introduction & Scope".into(),
            fields: vec![
                field("purpose", "Purpose", FieldType::Textarea, true),
                field("scope", "Scope", FieldType::Textarea, true),
            ],
            ..Default::default()
        },
        StepDef {
            id: "pre-test".into(),
            title: "Pre-Test & Equipment".into(),
            tables: vec![
                "pretest".into(),
                "key_components".into(),
                "ip_records".into(),
            ],
            ..Default::default()
        },
        StepDef {
            id: "digital-io".into(),
            title: "Digital I/O".into(),
            tables: vec!["digital_signals".into(), "digital_outputs".into()],
            ..Default::default()
        },
        StepDef {
            id: "analogue-io".into(),
            title: "Analogue I/O".into(),
            tables: vec!["analogue_inputs".into(), "analogue_outputs".into()],
            ..Default::default()
        },
        StepDef {
            id: "modbus".into(),
            title: "Modbus".into(),
            tables: vec!["modbus_digital".into(), "modbus_analogue".into()],
            ..Default::default()
        },
        StepDef {
            id: "process".into(),
            title: "Process & SCADA".into(),
            tables: vec![
                "process_test".into(),
                "scada_verification".into(),
                "trends_testing".into(),
                "alarm_list".into(),
            ],
            attachments: vec![
                "scada_screens".into(),
                "trend_screens".into(),
                "alarm_screens".into(),
            ],
            ..Default::default()
        },
        StepDef {
            id: "punch-list".into(),
            title: "Punch List & Comments".into(),
            fields: vec![
                field("punch_summary", "Punch Summary", FieldType::Textarea, false),
                field("general_comments", "General Comments", FieldType::Textarea, false),
            ],
            ..Default::default()
        },
        StepDef {
            id: "sign-off".into(),
            title: "Sign-Off".into(),
            fields: vec![
                field("signed_name", "Name", FieldType::Text, true),
                field("signed_company", "Company", FieldType::Text, true),
                field("signed_date", "Date", FieldType::Date, true),
                FieldDef {
                    name: "confirm_accurate".into(),
                    label: "I confirm the recorded results are accurate".into(),
                    field_type: FieldType::Checkbox,
                    required: true,
                    ..Default::default()
                },
            ],
            signature: true,
            ..Default::default()
        },
    ];

    ReportConfig {
        header: Some("SAT Report Builder".into()),
        logo: None,
        steps,
        tables,
        attachments,
    }
}
