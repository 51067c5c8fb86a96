use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::filters::Predicate;
use crate::models::enums::*;
use crate::models::*;

const PROCEDURE_COLUMNS: &str = "case_id, age_years, age_months, date, asa_score,
         airway_management, department, description, outpatient, has_specials,
         has_regional_anesthesia, has_local_anesthetics";

const INSERT_PROCEDURE: &str = "INTO procedures (case_id, age_years, age_months, date, asa_score,
         airway_management, department, description, outpatient, has_specials,
         has_regional_anesthesia, has_local_anesthetics)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

pub fn insert_procedure(conn: &Connection, proc: &Procedure) -> Result<(), DatabaseError> {
    let values = procedure_params(proc);
    conn.execute(&format!("INSERT {INSERT_PROCEDURE}"), param_refs(&values).as_slice())?;
    Ok(())
}

/// Insert unless a procedure with the same case id exists.
/// Returns whether a row was written.
pub fn insert_procedure_or_ignore(
    conn: &Connection,
    proc: &Procedure,
) -> Result<bool, DatabaseError> {
    let values = procedure_params(proc);
    let written = conn.execute(
        &format!("INSERT OR IGNORE {INSERT_PROCEDURE}"),
        param_refs(&values).as_slice(),
    )?;
    Ok(written > 0)
}

pub fn update_procedure(conn: &Connection, proc: &Procedure) -> Result<(), DatabaseError> {
    let values = procedure_params(proc);
    let updated = conn.execute(
        "UPDATE procedures SET age_years = ?2, age_months = ?3, date = ?4, asa_score = ?5,
         airway_management = ?6, department = ?7, description = ?8, outpatient = ?9,
         has_specials = ?10, has_regional_anesthesia = ?11, has_local_anesthetics = ?12
         WHERE case_id = ?1",
        param_refs(&values).as_slice(),
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "procedure".into(),
            id: proc.case_id.clone(),
        });
    }
    Ok(())
}

pub fn delete_procedure(conn: &Connection, case_id: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM procedures WHERE case_id = ?1", params![case_id])?;
    Ok(())
}

pub fn get_procedure(conn: &Connection, case_id: &str) -> Result<Option<Procedure>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PROCEDURE_COLUMNS} FROM procedures WHERE case_id = ?1"),
            params![case_id],
            procedure_row_from_rusqlite,
        )
        .optional()?;
    row.map(procedure_from_row).transpose()
}

pub fn get_all_procedures(conn: &Connection) -> Result<Vec<Procedure>, DatabaseError> {
    select_procedures(conn, &Predicate::All)
}

/// Procedures matching a compiled filter predicate, newest first.
pub fn select_procedures(
    conn: &Connection,
    predicate: &Predicate,
) -> Result<Vec<Procedure>, DatabaseError> {
    let sql = format!(
        "SELECT {PROCEDURE_COLUMNS} FROM procedures WHERE {} ORDER BY date DESC, case_id ASC",
        predicate.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(predicate.param_refs().as_slice(), procedure_row_from_rusqlite)?;

    let mut procedures = Vec::new();
    for row in rows {
        procedures.push(procedure_from_row(row?)?);
    }
    Ok(procedures)
}

pub fn count_procedures(conn: &Connection, predicate: &Predicate) -> Result<u64, DatabaseError> {
    if predicate.is_nothing() {
        return Ok(0);
    }
    let sql = format!(
        "SELECT COUNT(*) FROM procedures WHERE {}",
        predicate.where_sql()
    );
    let count: i64 = conn.query_row(&sql, predicate.param_refs().as_slice(), |row| row.get(0))?;
    Ok(count as u64)
}

fn procedure_params(proc: &Procedure) -> Vec<Box<dyn ToSql>> {
    vec![
        Box::new(proc.case_id.clone()),
        Box::new(proc.age_years),
        Box::new(proc.age_months),
        Box::new(proc.date.to_string()),
        Box::new(proc.asa_score),
        Box::new(proc.airway_management.as_str()),
        Box::new(proc.department.as_str()),
        Box::new(proc.description.clone()),
        Box::new(proc.outpatient),
        Box::new(proc.has_specials),
        Box::new(proc.has_regional_anesthesia),
        Box::new(proc.has_local_anesthetics),
    ]
}

fn param_refs(values: &[Box<dyn ToSql>]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v.as_ref()).collect()
}

struct ProcedureRow {
    case_id: String,
    age_years: u32,
    age_months: u32,
    date: String,
    asa_score: u8,
    airway_management: String,
    department: String,
    description: String,
    outpatient: bool,
    has_specials: bool,
    has_regional_anesthesia: bool,
    has_local_anesthetics: bool,
}

fn procedure_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<ProcedureRow> {
    Ok(ProcedureRow {
        case_id: row.get(0)?,
        age_years: row.get(1)?,
        age_months: row.get(2)?,
        date: row.get(3)?,
        asa_score: row.get(4)?,
        airway_management: row.get(5)?,
        department: row.get(6)?,
        description: row.get(7)?,
        outpatient: row.get(8)?,
        has_specials: row.get(9)?,
        has_regional_anesthesia: row.get(10)?,
        has_local_anesthetics: row.get(11)?,
    })
}

fn procedure_from_row(row: ProcedureRow) -> Result<Procedure, DatabaseError> {
    Ok(Procedure {
        date: NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .map_err(|e| DatabaseError::ConstraintViolation(format!("procedure date: {e}")))?,
        airway_management: AirwayManagement::from_str(&row.airway_management)?,
        department: Department::from_str(&row.department)?,
        case_id: row.case_id,
        age_years: row.age_years,
        age_months: row.age_months,
        asa_score: row.asa_score,
        description: row.description,
        outpatient: row.outpatient,
        has_specials: row.has_specials,
        has_regional_anesthesia: row.has_regional_anesthesia,
        has_local_anesthetics: row.has_local_anesthetics,
    })
}
