//! Predicate compiler: stored condition rows to an SQL `WHERE` predicate.
//!
//! Compilation is pure and infallible. Rows that cannot be resolved
//! (unknown field, kind drift, unknown operator, missing value) are logged
//! and skipped so one stale row never disables the rest of a filter.
//!
//! Policy:
//! - no rows at all ⇒ [`Predicate::All`]
//! - rows present but none resolvable ⇒ [`Predicate::Nothing`]
//!
//! Clauses are sorted canonically before conjunction, so the compiled
//! predicate does not depend on the order conditions were added in.

use std::cmp::Ordering;

use rusqlite::types::{ToSql, Value};

use crate::models::condition::{Condition, ConditionRow};
use crate::models::enums::{ConditionKind, Operator};

use super::registry::{FieldRegistry, FieldSource};

/// One SQL comparison with positional `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    sql: String,
    params: Vec<Value>,
}

impl Clause {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Selects every record.
    All,
    /// Selects no record.
    Nothing,
    /// Conjunction of clauses, in canonical order.
    Where(Vec<Clause>),
}

impl Predicate {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Predicate::Nothing)
    }

    pub fn clauses(&self) -> &[Clause] {
        match self {
            Predicate::Where(clauses) => clauses.as_slice(),
            Predicate::All | Predicate::Nothing => &[],
        }
    }

    /// SQL text suitable for `... WHERE {where_sql}`.
    pub fn where_sql(&self) -> String {
        match self {
            Predicate::Nothing => "0".to_string(),
            Predicate::All => "1".to_string(),
            Predicate::Where(clauses) if clauses.is_empty() => "1".to_string(),
            Predicate::Where(clauses) => clauses
                .iter()
                .map(|c| format!("({})", c.sql))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    /// Bound values in placeholder order.
    pub fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.clauses()
            .iter()
            .flat_map(|c| c.params.iter())
            .map(|p| p as &dyn ToSql)
            .collect()
    }
}

/// Renders the predicate with values inlined, for logs and debugging.
impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sql = self.where_sql();
        let mut values = self.clauses().iter().flat_map(|c| c.params.iter());
        for ch in sql.chars() {
            if ch == '?' {
                match values.next() {
                    Some(Value::Null) | None => f.write_str("NULL")?,
                    Some(Value::Integer(i)) => write!(f, "{i}")?,
                    Some(Value::Real(r)) => write!(f, "{r}")?,
                    Some(Value::Text(t)) => write!(f, "'{}'", t.replace('\'', "''"))?,
                    Some(Value::Blob(b)) => write!(f, "<{} bytes>", b.len())?,
                }
            } else {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// Compile stored rows into a single conjunctive predicate.
pub fn compile(registry: &FieldRegistry, rows: &[ConditionRow]) -> Predicate {
    if rows.is_empty() {
        return Predicate::All;
    }

    let mut clauses: Vec<Clause> = rows
        .iter()
        .filter_map(|row| compile_row(registry, row))
        .collect();

    if clauses.is_empty() {
        tracing::warn!(rows = rows.len(), "No filter condition could be resolved");
        return Predicate::Nothing;
    }

    clauses.sort_by(canonical_order);
    let predicate = Predicate::Where(clauses);
    tracing::debug!(%predicate, "Compiled filter predicate");
    predicate
}

/// Compile in-memory conditions, e.g. a form that has not been saved yet.
pub fn compile_conditions(registry: &FieldRegistry, conditions: &[Condition]) -> Predicate {
    let rows: Vec<ConditionRow> = conditions.iter().map(Condition::to_row).collect();
    compile(registry, &rows)
}

fn compile_row(registry: &FieldRegistry, row: &ConditionRow) -> Option<Clause> {
    let descriptor = match registry.describe(&row.field) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(field = %row.field, "Skipping condition: {e}");
            return None;
        }
    };

    if row.kind != descriptor.kind.as_str() {
        tracing::warn!(
            field = %row.field,
            stored = %row.kind,
            expected = %descriptor.kind,
            "Skipping condition with mismatched kind"
        );
        return None;
    }

    let column = match descriptor.source {
        FieldSource::Virtual(hook) => {
            let clause = (hook.compile)(row, registry.config());
            if clause.is_none() {
                tracing::warn!(field = %row.field, "Skipping unresolvable virtual condition");
            }
            return clause;
        }
        FieldSource::Column(column) => column,
    };

    let operator = match row.operator.as_deref() {
        None => Operator::Eq,
        Some(raw) => match Operator::from_stored(raw) {
            Some(op) if descriptor.operators.contains(&op) => op,
            _ => {
                tracing::warn!(field = %row.field, operator = raw, "Skipping condition with illegal operator");
                return None;
            }
        },
    };

    let value = match descriptor.kind {
        ConditionKind::Text | ConditionKind::Enum => row.text_value.clone().map(Value::Text),
        ConditionKind::Number => row.number_value.map(Value::Real),
        ConditionKind::Boolean => row.bool_value.map(|b| Value::Integer(b as i64)),
    };
    let Some(value) = value else {
        tracing::warn!(field = %row.field, "Skipping condition without a value");
        return None;
    };

    let sql = match operator {
        Operator::Eq => format!("{column} = ?"),
        Operator::Contains => format!("instr({column}, ?) > 0"),
        Operator::Gt => format!("{column} > ?"),
        Operator::Gte => format!("{column} >= ?"),
        Operator::Lt => format!("{column} < ?"),
        Operator::Lte => format!("{column} <= ?"),
    };
    Some(Clause::new(sql, vec![value]))
}

fn canonical_order(a: &Clause, b: &Clause) -> Ordering {
    a.sql.cmp(&b.sql).then_with(|| {
        a.params
            .iter()
            .zip(&b.params)
            .map(|(x, y)| value_order(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.params.len().cmp(&b.params.len()))
    })
}

fn value_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Integer(_) => 1,
            Value::Real(_) => 2,
            Value::Text(_) => 3,
            Value::Blob(_) => 4,
        }
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Real(x), Value::Real(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
