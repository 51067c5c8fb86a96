//! Human-readable rendering of conditions and filter summaries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::condition::{Condition, ConditionRow};

use super::registry::{FieldRegistry, FieldSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelNamespace {
    #[serde(rename = "field")]
    Field,
    #[serde(rename = "operator")]
    Operator,
    #[serde(rename = "department-enum")]
    Department,
    #[serde(rename = "airway-enum")]
    Airway,
    #[serde(rename = "specials-enum")]
    Specials,
}

/// Source of display strings. `None` means no translation exists.
pub trait LabelLookup {
    fn label(&self, namespace: LabelNamespace, key: &str) -> Option<String>;

    fn label_or_key(&self, namespace: LabelNamespace, key: &str) -> String {
        self.label(namespace, key).unwrap_or_else(|| key.to_string())
    }
}

/// Renders raw identifiers everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawLabels;

impl LabelLookup for RawLabels {
    fn label(&self, _namespace: LabelNamespace, _key: &str) -> Option<String> {
        None
    }
}

/// Namespace → key → text table, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelCatalog {
    entries: HashMap<LabelNamespace, HashMap<String, String>>,
}

impl LabelCatalog {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn insert(
        &mut self,
        namespace: LabelNamespace,
        key: impl Into<String>,
        label: impl Into<String>,
    ) {
        self.entries
            .entry(namespace)
            .or_default()
            .insert(key.into(), label.into());
    }

    /// Entries of `other` override ours.
    pub fn merge(&mut self, other: LabelCatalog) {
        for (namespace, labels) in other.entries {
            self.entries.entry(namespace).or_default().extend(labels);
        }
    }

    /// Built-in English labels.
    pub fn english() -> Self {
        use LabelNamespace::*;

        let table: &[(LabelNamespace, &[(&str, &str)])] = &[
            (
                Field,
                &[
                    ("case-id", "Case ID"),
                    ("procedure", "Procedure"),
                    ("age", "Age"),
                    ("age-years", "Age (years)"),
                    ("asa-score", "ASA score"),
                    ("airway-management", "Airway management"),
                    ("department", "Department"),
                    ("outpatient", "Outpatient"),
                    ("has-specials", "Special features"),
                    ("has-regional-anesthesia", "Regional anesthesia"),
                    ("has-local-anesthetics", "Local anesthetics"),
                ],
            ),
            (
                Department,
                &[
                    ("general_surgery", "General surgery"),
                    ("orthopedics", "Orthopedics"),
                    ("gynecology", "Gynecology"),
                    ("urology", "Urology"),
                    ("ent", "ENT"),
                    ("neurosurgery", "Neurosurgery"),
                    ("cardiac_surgery", "Cardiac surgery"),
                    ("pediatric_surgery", "Pediatric surgery"),
                    ("ophthalmology", "Ophthalmology"),
                    ("other", "Other"),
                ],
            ),
            (
                Airway,
                &[
                    ("none", "None"),
                    ("face_mask", "Face mask"),
                    ("laryngeal_mask", "Laryngeal mask"),
                    ("endotracheal_tube", "Endotracheal tube"),
                    ("tracheostomy", "Tracheostomy"),
                ],
            ),
            (
                Specials,
                &[
                    ("true", "yes"),
                    ("false", "no"),
                    ("age-under", "younger than {threshold}"),
                    ("age-over", "{threshold} or older"),
                    ("more", "more"),
                    ("no-conditions", "∅"),
                ],
            ),
        ];

        let mut catalog = Self::default();
        for (namespace, labels) in table {
            for (key, label) in labels.iter() {
                catalog.insert(*namespace, *key, *label);
            }
        }
        catalog
    }
}

impl LabelLookup for LabelCatalog {
    fn label(&self, namespace: LabelNamespace, key: &str) -> Option<String> {
        self.entries.get(&namespace)?.get(key).cloned()
    }
}

/// Integral numbers render without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub struct ConditionFormatter<'a> {
    registry: &'a FieldRegistry,
    labels: &'a dyn LabelLookup,
}

impl<'a> ConditionFormatter<'a> {
    pub fn new(registry: &'a FieldRegistry, labels: &'a dyn LabelLookup) -> Self {
        Self { registry, labels }
    }

    pub fn format(&self, condition: &Condition) -> String {
        let descriptor = self.registry.describe(condition.field()).ok();

        if let Some(FieldSource::Virtual(hook)) = descriptor.map(|d| d.source) {
            return (hook.describe)(condition, self.registry.config(), self.labels);
        }

        let field = self
            .labels
            .label_or_key(LabelNamespace::Field, condition.field());
        let operator = condition.operator();
        let symbol = self
            .labels
            .label(LabelNamespace::Operator, operator.as_str())
            .unwrap_or_else(|| operator.symbol().to_string());
        let value_labels = descriptor.and_then(|d| d.value_labels);

        let value = match condition {
            Condition::Text(c) => c.value().to_string(),
            Condition::Number(c) => format_number(c.value()),
            Condition::Boolean(c) => {
                let key = if c.value() { "true" } else { "false" };
                self.labels
                    .label_or_key(value_labels.unwrap_or(LabelNamespace::Specials), key)
            }
            Condition::Enum(c) => match value_labels {
                Some(namespace) => self.labels.label_or_key(namespace, c.value()),
                None => c.value().to_string(),
            },
        };

        format!("{field} {symbol} {value}")
    }

    /// Stored rows that no longer rehydrate render as their raw field name.
    pub fn format_row(&self, row: &ConditionRow) -> String {
        match self.registry.rehydrate(row) {
            Ok(condition) => self.format(&condition),
            Err(e) => {
                tracing::debug!(field = %row.field, "Rendering raw condition: {e}");
                row.field.clone()
            }
        }
    }

    pub fn summary(&self, conditions: &[Condition]) -> String {
        self.summarize(conditions.len(), || conditions.first().map(|c| self.format(c)))
    }

    pub fn row_summary(&self, rows: &[ConditionRow]) -> String {
        self.summarize(rows.len(), || rows.first().map(|r| self.format_row(r)))
    }

    fn summarize(&self, count: usize, first: impl FnOnce() -> Option<String>) -> String {
        let first = match first() {
            Some(text) if count > 0 => text,
            _ => {
                return self
                    .labels
                    .label(LabelNamespace::Specials, "no-conditions")
                    .unwrap_or_else(|| "∅".to_string())
            }
        };
        if count == 1 {
            return first;
        }
        let more = self.labels.label_or_key(LabelNamespace::Specials, "more");
        format!("{first} +{} {more}", count - 1)
    }
}
