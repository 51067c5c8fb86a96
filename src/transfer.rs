//! Backup export and import: all filters and procedures as one JSON document.
//!
//! Conditions are exported without their operator/option sets; those are
//! re-derived from the field registry on import. An import validates the
//! whole document before writing anything, then applies it in a single
//! transaction: procedures are skipped when their case id already exists,
//! filters always get fresh ids.

use std::io::{Read, Write};

use chrono::Local;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{
    get_all_procedures, get_condition_rows, insert_condition_rows, insert_filter_row,
    insert_procedure_or_ignore, list_filters, DatabaseError,
};
use crate::filters::FieldRegistry;
use crate::models::enums::Operator;
use crate::models::{Condition, ConditionError, FilterDraft, Procedure};

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid backup format: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Document shape
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_tag")]
pub enum TaggedCondition {
    #[serde(rename = "TEXT_CONDITION")]
    Text {
        field: String,
        operator: Operator,
        value: String,
    },
    #[serde(rename = "NUMBER_CONDITION")]
    Number {
        field: String,
        operator: Operator,
        value: f64,
    },
    #[serde(rename = "BOOLEAN_CONDITION")]
    Boolean { field: String, value: bool },
    #[serde(rename = "ENUM_CONDITION")]
    Enum { field: String, value: String },
}

impl From<&Condition> for TaggedCondition {
    fn from(condition: &Condition) -> Self {
        match condition {
            Condition::Text(c) => TaggedCondition::Text {
                field: c.field().to_string(),
                operator: c.operator(),
                value: c.value().to_string(),
            },
            Condition::Number(c) => TaggedCondition::Number {
                field: c.field().to_string(),
                operator: c.operator(),
                value: c.value(),
            },
            Condition::Boolean(c) => TaggedCondition::Boolean {
                field: c.field().to_string(),
                value: c.value(),
            },
            Condition::Enum(c) => TaggedCondition::Enum {
                field: c.field().to_string(),
                value: c.value().to_string(),
            },
        }
    }
}

impl TaggedCondition {
    /// Rebuild the full condition, operator/option sets included.
    pub fn to_condition(&self, registry: &FieldRegistry) -> Result<Condition, ConditionError> {
        match self {
            TaggedCondition::Text {
                field,
                operator,
                value,
            } => registry.text(field, *operator, value.clone()),
            TaggedCondition::Number {
                field,
                operator,
                value,
            } => registry.number(field, *operator, *value),
            TaggedCondition::Boolean { field, value } => registry.boolean(field, *value),
            TaggedCondition::Enum { field, value } => registry.enumeration(field, value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupFilter {
    pub name: String,
    pub goal: Option<u32>,
    pub conditions: Vec<TaggedCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub filters: Vec<BackupFilter>,
    pub procedures: Vec<Procedure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub procedures_imported: usize,
    pub procedures_skipped: usize,
    pub filters_imported: usize,
}

// ═══════════════════════════════════════════════════════════
// Export
// ═══════════════════════════════════════════════════════════

/// Snapshot of every filter and procedure. Stored conditions that no
/// longer resolve are left out; a filter left without conditions is
/// left out entirely.
pub fn export_document(
    conn: &Connection,
    registry: &FieldRegistry,
) -> Result<BackupDocument, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let mut filters = Vec::new();
    for filter in list_filters(&tx)? {
        let mut conditions = Vec::new();
        for row in get_condition_rows(&tx, &filter.id)? {
            match registry.rehydrate(&row) {
                Ok(condition) => conditions.push(TaggedCondition::from(&condition)),
                Err(e) => tracing::warn!(filter_id = %filter.id, "Condition left out of backup: {e}"),
            }
        }
        if conditions.is_empty() {
            tracing::warn!(filter_id = %filter.id, "Filter without valid conditions left out of backup");
            continue;
        }
        filters.push(BackupFilter {
            name: filter.name,
            goal: filter.goal,
            conditions,
        });
    }
    let procedures = get_all_procedures(&tx)?;
    tx.commit()?;

    tracing::info!(
        filters = filters.len(),
        procedures = procedures.len(),
        "Exported backup"
    );
    Ok(BackupDocument {
        filters,
        procedures,
    })
}

pub fn write_backup<W: Write>(
    conn: &Connection,
    registry: &FieldRegistry,
    writer: W,
) -> Result<(), TransferError> {
    let document = export_document(conn, registry)?;
    serde_json::to_writer_pretty(writer, &document).map_err(std::io::Error::from)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Import
// ═══════════════════════════════════════════════════════════

pub fn read_backup<R: Read>(reader: R) -> Result<BackupDocument, TransferError> {
    serde_json::from_reader(reader).map_err(|e| {
        if e.is_io() {
            TransferError::Io(e.into())
        } else {
            TransferError::Format(e.to_string())
        }
    })
}

pub fn import_backup<R: Read>(
    conn: &Connection,
    registry: &FieldRegistry,
    reader: R,
) -> Result<ImportSummary, TransferError> {
    let document = read_backup(reader)?;
    import_document(conn, registry, &document)
}

/// Validate the whole document, then write it in one transaction.
pub fn import_document(
    conn: &Connection,
    registry: &FieldRegistry,
    document: &BackupDocument,
) -> Result<ImportSummary, TransferError> {
    let filters = validate_filters(registry, &document.filters)?;
    validate_procedures(&document.procedures)?;

    let mut summary = ImportSummary::default();
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;

    for procedure in &document.procedures {
        if insert_procedure_or_ignore(&tx, procedure)? {
            summary.procedures_imported += 1;
        } else {
            summary.procedures_skipped += 1;
        }
    }

    let now = Local::now().naive_local();
    for (draft, conditions) in &filters {
        let id = Uuid::new_v4();
        insert_filter_row(&tx, &id, draft, now)?;
        insert_condition_rows(&tx, &id, conditions)?;
        summary.filters_imported += 1;
    }

    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        procedures_imported = summary.procedures_imported,
        procedures_skipped = summary.procedures_skipped,
        filters_imported = summary.filters_imported,
        "Imported backup"
    );
    Ok(summary)
}

fn validate_filters(
    registry: &FieldRegistry,
    filters: &[BackupFilter],
) -> Result<Vec<(FilterDraft, Vec<Condition>)>, TransferError> {
    filters
        .iter()
        .enumerate()
        .map(|(i, filter)| {
            if filter.name.trim().is_empty() {
                return Err(TransferError::Format(format!("filter {i} has no name")));
            }
            if filter.conditions.is_empty() {
                return Err(TransferError::Format(format!(
                    "filter {:?} has no conditions",
                    filter.name
                )));
            }
            let conditions = filter
                .conditions
                .iter()
                .map(|c| c.to_condition(registry))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TransferError::Format(format!("filter {:?}: {e}", filter.name)))?;
            Ok((FilterDraft::new(filter.name.trim(), filter.goal), conditions))
        })
        .collect()
}

fn validate_procedures(procedures: &[Procedure]) -> Result<(), TransferError> {
    for p in procedures {
        if p.case_id.trim().is_empty() {
            return Err(TransferError::Format("procedure without case id".into()));
        }
        if !(1..=6).contains(&p.asa_score) {
            return Err(TransferError::Format(format!(
                "procedure {}: ASA score {} outside 1-6",
                p.case_id, p.asa_score
            )));
        }
        if p.age_months > 11 {
            return Err(TransferError::Format(format!(
                "procedure {}: {} age months",
                p.case_id, p.age_months
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::db::{
        create_filter, get_procedure, insert_procedure, list_filters, load_conditions,
        open_memory_database,
    };
    use crate::models::enums::{AirwayManagement, Department};

    fn procedure(case_id: &str) -> Procedure {
        Procedure {
            case_id: case_id.into(),
            age_years: 67,
            age_months: 0,
            date: NaiveDate::from_ymd_opt(2023, 11, 2).unwrap(),
            asa_score: 3,
            airway_management: AirwayManagement::EndotrachealTube,
            department: Department::CardiacSurgery,
            description: "CABG".into(),
            outpatient: false,
            has_specials: true,
            has_regional_anesthesia: false,
            has_local_anesthetics: false,
        }
    }

    fn sample_conditions(registry: &FieldRegistry) -> Vec<Condition> {
        vec![
            registry.text("procedure", Operator::Contains, "CABG").unwrap(),
            registry.number("asa-score", Operator::Gte, 3.0).unwrap(),
            registry.boolean("age", false).unwrap(),
            registry.enumeration("department", "cardiac_surgery").unwrap(),
        ]
    }

    fn backup_bytes(conn: &Connection, registry: &FieldRegistry) -> Vec<u8> {
        let mut buf = Vec::new();
        write_backup(conn, registry, &mut buf).unwrap();
        buf
    }

    #[test]
    fn conditions_survive_a_round_trip() {
        let registry = FieldRegistry::default();
        let source = open_memory_database().unwrap();
        let conditions = sample_conditions(&registry);
        create_filter(&source, &FilterDraft::new("Cardiac", Some(50)), &conditions).unwrap();
        insert_procedure(&source, &procedure("K-1")).unwrap();

        let bytes = backup_bytes(&source, &registry);
        let document = read_backup(bytes.as_slice()).unwrap();
        assert_eq!(document.filters.len(), 1);
        let decoded: Vec<Condition> = document.filters[0]
            .conditions
            .iter()
            .map(|c| c.to_condition(&registry).unwrap())
            .collect();
        assert_eq!(decoded, conditions);

        let target = open_memory_database().unwrap();
        let summary = import_document(&target, &registry, &document).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                procedures_imported: 1,
                procedures_skipped: 0,
                filters_imported: 1,
            }
        );
        let filters = list_filters(&target).unwrap();
        assert_eq!(filters[0].name, "Cardiac");
        assert_eq!(filters[0].goal, Some(50));
        assert_eq!(load_conditions(&target, &registry, &filters[0].id).unwrap(), conditions);
        assert_eq!(get_procedure(&target, "K-1").unwrap().unwrap(), procedure("K-1"));
    }

    #[test]
    fn export_strips_operator_and_option_sets() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        create_filter(&conn, &FilterDraft::new("Cardiac", None), &sample_conditions(&registry))
            .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&backup_bytes(&conn, &registry)).unwrap();
        let conditions = json["filters"][0]["conditions"].as_array().unwrap();
        assert_eq!(conditions[0]["_tag"], "TEXT_CONDITION");
        assert_eq!(conditions[0]["operator"], "contains");
        assert_eq!(conditions[2]["_tag"], "BOOLEAN_CONDITION");
        assert_eq!(conditions[3]["_tag"], "ENUM_CONDITION");
        for c in conditions {
            assert!(c.get("operators").is_none());
            assert!(c.get("options").is_none());
        }
        assert_eq!(json["filters"][0]["goal"], serde_json::Value::Null);
    }

    #[test]
    fn import_skips_conflicting_procedures() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        let existing = procedure("K-1");
        insert_procedure(&conn, &existing).unwrap();

        let mut incoming = procedure("K-1");
        incoming.description = "Valve replacement".into();
        incoming.asa_score = 4;
        let document = BackupDocument {
            filters: vec![],
            procedures: vec![incoming, procedure("K-2")],
        };

        let summary = import_document(&conn, &registry, &document).unwrap();
        assert_eq!(summary.procedures_imported, 1);
        assert_eq!(summary.procedures_skipped, 1);
        assert_eq!(get_procedure(&conn, "K-1").unwrap().unwrap(), existing);
        assert!(get_procedure(&conn, "K-2").unwrap().is_some());
    }

    #[test]
    fn invalid_department_leaves_store_untouched() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        let json = r#"{
            "filters": [
                { "name": "Ok", "goal": null,
                  "conditions": [ { "_tag": "BOOLEAN_CONDITION", "field": "outpatient", "value": true } ] }
            ],
            "procedures": [
                { "caseId": "X-1", "ageYears": 30, "ageMonths": 0, "date": "2024-01-01",
                  "asaScore": 1, "airwayManagement": "face_mask", "department": "cardiology",
                  "procedure": "Stent", "outpatient": true, "hasSpecials": false,
                  "hasRegionalAnesthesia": false, "hasLocalAnesthetics": true }
            ]
        }"#;

        let result = import_backup(&conn, &registry, json.as_bytes());
        assert!(matches!(result, Err(TransferError::Format(_))));
        assert!(list_filters(&conn).unwrap().is_empty());
        assert!(get_all_procedures(&conn).unwrap().is_empty());
    }

    #[test]
    fn unknown_condition_field_aborts_import() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        let document = BackupDocument {
            filters: vec![BackupFilter {
                name: "Stale".into(),
                goal: None,
                conditions: vec![TaggedCondition::Boolean {
                    field: "removed-field".into(),
                    value: true,
                }],
            }],
            procedures: vec![procedure("K-1")],
        };

        let result = import_document(&conn, &registry, &document);
        assert!(matches!(result, Err(TransferError::Format(_))));
        assert!(get_all_procedures(&conn).unwrap().is_empty());
    }

    #[test]
    fn enum_value_outside_options_aborts_import() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        let json = r#"{ "filters": [ { "name": "Bad", "goal": 3, "conditions": [
            { "_tag": "ENUM_CONDITION", "field": "airway-management", "value": "snorkel" } ] } ],
            "procedures": [] }"#;
        assert!(matches!(
            import_backup(&conn, &registry, json.as_bytes()),
            Err(TransferError::Format(_))
        ));
        assert!(list_filters(&conn).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_values_abort_import() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        let mut bad_asa = procedure("K-1");
        bad_asa.asa_score = 9;
        let mut bad_months = procedure("K-2");
        bad_months.age_months = 12;

        for bad in [bad_asa, bad_months] {
            let document = BackupDocument {
                filters: vec![],
                procedures: vec![procedure("K-0"), bad],
            };
            assert!(matches!(
                import_document(&conn, &registry, &document),
                Err(TransferError::Format(_))
            ));
        }
        assert!(get_all_procedures(&conn).unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_a_format_error() {
        assert!(matches!(
            read_backup("{ \"filters\": [".as_bytes()),
            Err(TransferError::Format(_))
        ));
        assert!(matches!(
            read_backup(r#"{ "filters": [], "procedures": [], "extra": 1 }"#.as_bytes()),
            Ok(_)
        ));
        assert!(matches!(
            read_backup(r#"{ "filters": [ { "name": "x", "goal": null, "conditions": [ { "_tag": "DATE_CONDITION", "field": "date" } ] } ], "procedures": [] }"#.as_bytes()),
            Err(TransferError::Format(_))
        ));
    }

    #[test]
    fn filters_get_new_ids_on_every_import() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        let original = create_filter(
            &conn,
            &FilterDraft::new("Cardiac", None),
            &sample_conditions(&registry),
        )
        .unwrap();

        let document = export_document(&conn, &registry).unwrap();
        import_document(&conn, &registry, &document).unwrap();

        let filters = list_filters(&conn).unwrap();
        assert_eq!(filters.len(), 2);
        assert!(filters.iter().filter(|f| f.id == original).count() == 1);
        assert!(filters.iter().all(|f| f.name == "Cardiac"));
    }

    #[test]
    fn file_backup_round_trip() {
        let registry = FieldRegistry::default();
        let conn = open_memory_database().unwrap();
        insert_procedure(&conn, &procedure("K-1")).unwrap();
        create_filter(&conn, &FilterDraft::new("Cardiac", None), &sample_conditions(&registry))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        write_backup(&conn, &registry, std::fs::File::create(&path).unwrap()).unwrap();

        let target = open_memory_database().unwrap();
        let summary =
            import_backup(&target, &registry, std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(summary.filters_imported, 1);
        assert_eq!(summary.procedures_imported, 1);
    }
}
