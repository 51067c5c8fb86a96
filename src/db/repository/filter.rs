use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::filters::{compile, FieldRegistry, Predicate};
use crate::models::*;

use super::procedure::{count_procedures, select_procedures};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn validate_filter(draft: &FilterDraft, conditions: &[Condition]) -> Result<(), DatabaseError> {
    if draft.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "filter name must not be empty".into(),
        ));
    }
    if conditions.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "a filter needs at least one condition".into(),
        ));
    }
    Ok(())
}

/// Create a filter and its conditions in one transaction.
pub fn create_filter(
    conn: &Connection,
    draft: &FilterDraft,
    conditions: &[Condition],
) -> Result<Uuid, DatabaseError> {
    validate_filter(draft, conditions)?;

    let id = Uuid::new_v4();
    let tx = conn.unchecked_transaction()?;
    insert_filter_row(&tx, &id, draft, Local::now().naive_local())?;
    insert_condition_rows(&tx, &id, conditions)?;
    tx.commit()?;

    tracing::info!(filter_id = %id, conditions = conditions.len(), "Created filter");
    Ok(id)
}

/// Replace name, goal and the entire condition set of a filter.
pub fn update_filter(
    conn: &Connection,
    id: &Uuid,
    draft: &FilterDraft,
    conditions: &[Condition],
) -> Result<(), DatabaseError> {
    validate_filter(draft, conditions)?;

    let tx = conn.unchecked_transaction()?;
    let updated = tx.execute(
        "UPDATE filters SET name = ?1, goal = ?2 WHERE id = ?3",
        params![draft.name.trim(), draft.goal, id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "filter".into(),
            id: id.to_string(),
        });
    }
    tx.execute(
        "DELETE FROM filter_conditions WHERE filter_id = ?1",
        params![id.to_string()],
    )?;
    insert_condition_rows(&tx, id, conditions)?;
    tx.commit()?;

    tracing::info!(filter_id = %id, conditions = conditions.len(), "Updated filter");
    Ok(())
}

/// Condition rows go with the filter via ON DELETE CASCADE.
pub fn delete_filter(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM filters WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "filter".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn get_filter(conn: &Connection, id: &Uuid) -> Result<Option<Filter>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, goal, created_at FROM filters WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<u32>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    row.map(filter_from_row).transpose()
}

/// All filters, oldest first.
pub fn list_filters(conn: &Connection) -> Result<Vec<Filter>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, goal, created_at FROM filters ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<u32>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut filters = Vec::new();
    for row in rows {
        filters.push(filter_from_row(row?)?);
    }
    Ok(filters)
}

/// Stored condition rows of a filter, in the order they were entered.
pub fn get_condition_rows(
    conn: &Connection,
    filter_id: &Uuid,
) -> Result<Vec<ConditionRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT kind, field, operator, text_value, number_value, bool_value
         FROM filter_conditions WHERE filter_id = ?1 ORDER BY position ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![filter_id.to_string()], |row| {
        Ok(ConditionRow {
            kind: row.get(0)?,
            field: row.get(1)?,
            operator: row.get(2)?,
            text_value: row.get(3)?,
            number_value: row.get(4)?,
            bool_value: row.get(5)?,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DatabaseError::from)
}

/// Conditions of a filter rebuilt for editing. A stale row fails the
/// whole load so the user sees the problem instead of a silently
/// shortened filter.
pub fn load_conditions(
    conn: &Connection,
    registry: &FieldRegistry,
    filter_id: &Uuid,
) -> Result<Vec<Condition>, DatabaseError> {
    get_condition_rows(conn, filter_id)?
        .iter()
        .map(|row| Condition::from_row(registry, row).map_err(DatabaseError::from))
        .collect()
}

/// Compile the stored conditions of a filter.
pub fn compile_filter(
    conn: &Connection,
    registry: &FieldRegistry,
    filter_id: &Uuid,
) -> Result<Predicate, DatabaseError> {
    let rows = get_condition_rows(conn, filter_id)?;
    Ok(compile(registry, &rows))
}

/// Procedures matched by a stored filter.
///
/// Opens its own transaction, so it must not be called while the
/// connection already holds one; use [`count_matching_in`] or
/// [`compile_filter`] with [`select_procedures`] there instead.
pub fn select_matching(
    conn: &Connection,
    registry: &FieldRegistry,
    filter_id: &Uuid,
) -> Result<Vec<Procedure>, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let predicate = compile_filter(&tx, registry, filter_id)?;
    let procedures = select_procedures(&tx, &predicate)?;
    tx.commit()?;
    Ok(procedures)
}

/// Number of procedures matched by a stored filter. Conditions and
/// records are read in one transaction, so a concurrent edit is seen
/// either entirely or not at all. Same nesting restriction as
/// [`select_matching`].
pub fn match_count(
    conn: &Connection,
    registry: &FieldRegistry,
    filter_id: &Uuid,
) -> Result<u64, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let count = count_matching_in(&tx, registry, filter_id)?;
    tx.commit()?;
    Ok(count)
}

/// [`match_count`] for a caller that already holds a transaction.
pub fn count_matching_in(
    conn: &Connection,
    registry: &FieldRegistry,
    filter_id: &Uuid,
) -> Result<u64, DatabaseError> {
    let predicate = compile_filter(conn, registry, filter_id)?;
    count_procedures(conn, &predicate)
}

pub(crate) fn insert_filter_row(
    conn: &Connection,
    id: &Uuid,
    draft: &FilterDraft,
    created_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO filters (id, name, goal, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            id.to_string(),
            draft.name.trim(),
            draft.goal,
            created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_condition_rows(
    conn: &Connection,
    filter_id: &Uuid,
    conditions: &[Condition],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO filter_conditions
         (filter_id, position, kind, field, operator, text_value, number_value, bool_value)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, condition) in conditions.iter().enumerate() {
        let row = condition.to_row();
        stmt.execute(params![
            filter_id.to_string(),
            position as i64,
            row.kind,
            row.field,
            row.operator,
            row.text_value,
            row.number_value,
            row.bool_value,
        ])?;
    }
    Ok(())
}

fn filter_from_row(
    (id, name, goal, created_at): (String, String, Option<u32>, String),
) -> Result<Filter, DatabaseError> {
    Ok(Filter {
        id: Uuid::parse_str(&id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        name,
        goal,
        created_at: NaiveDateTime::parse_from_str(&created_at, TIMESTAMP_FORMAT)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
    })
}
