use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{count_procedures, get_condition_rows, list_filters, DatabaseError};

use super::compiler::compile;
use super::format::{ConditionFormatter, LabelLookup};
use super::registry::FieldRegistry;

/// One entry of the filter list: what it selects and how far it is from
/// its goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOverview {
    pub id: Uuid,
    pub name: String,
    pub summary: String,
    pub match_count: u64,
    pub goal: Option<u32>,
}

impl FilterOverview {
    /// Share of the goal reached, capped at 1.0. `None` without a goal.
    pub fn progress(&self) -> Option<f64> {
        match self.goal {
            Some(goal) if goal > 0 => Some((self.match_count as f64 / goal as f64).min(1.0)),
            _ => None,
        }
    }
}

/// Summary and count of each filter come from the same condition rows,
/// all read in one transaction.
pub fn filter_overviews(
    conn: &Connection,
    registry: &FieldRegistry,
    labels: &dyn LabelLookup,
) -> Result<Vec<FilterOverview>, DatabaseError> {
    let formatter = ConditionFormatter::new(registry, labels);
    let tx = conn.unchecked_transaction()?;

    let mut overviews = Vec::new();
    for filter in list_filters(&tx)? {
        let rows = get_condition_rows(&tx, &filter.id)?;
        let predicate = compile(registry, &rows);
        overviews.push(FilterOverview {
            summary: formatter.row_summary(&rows),
            match_count: count_procedures(&tx, &predicate)?,
            id: filter.id,
            name: filter.name,
            goal: filter.goal,
        });
    }
    tx.commit()?;
    Ok(overviews)
}
