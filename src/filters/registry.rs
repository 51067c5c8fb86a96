//! Field registry: the catalog of filterable procedure fields.
//!
//! Each descriptor fixes a field's condition kind, its legal operators,
//! the enum options (if any), and where its value comes from. Stored
//! fields map to a column; virtual fields bring their own compile and
//! describe hooks, so the compiler and formatter never special-case them.

use rusqlite::types::Value;

use crate::config::FilterConfig;
use crate::models::condition::{
    BooleanCondition, Condition, ConditionError, ConditionRow, EnumCondition, NumberCondition,
    TextCondition,
};
use crate::models::enums::{
    AirwayManagement, ConditionKind, Department, Operator, NUMBER_OPERATORS, TEXT_OPERATORS,
};

use super::compiler::Clause;
use super::format::{format_number, LabelLookup, LabelNamespace};

/// Translates a stored row of a virtual field into a clause.
/// `None` means the row cannot be resolved and is skipped.
pub type CompileHook = fn(&ConditionRow, &FilterConfig) -> Option<Clause>;

/// Renders a condition on a virtual field as a complete description.
pub type DescribeHook = fn(&Condition, &FilterConfig, &dyn LabelLookup) -> String;

#[derive(Clone, Copy)]
pub struct VirtualField {
    pub compile: CompileHook,
    pub describe: DescribeHook,
}

impl std::fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VirtualField")
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FieldSource {
    Column(&'static str),
    Virtual(VirtualField),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub field: &'static str,
    pub kind: ConditionKind,
    pub operators: &'static [Operator],
    pub options: Option<&'static [&'static str]>,
    /// Namespace used to label enum and boolean values.
    pub value_labels: Option<LabelNamespace>,
    pub source: FieldSource,
}

impl FieldDescriptor {
    pub fn is_virtual(&self) -> bool {
        matches!(self.source, FieldSource::Virtual(_))
    }

    pub fn column(&self) -> Option<&'static str> {
        match self.source {
            FieldSource::Column(column) => Some(column),
            FieldSource::Virtual(_) => None,
        }
    }
}

const EQ_OPERATORS: &[Operator] = &[Operator::Eq];

const fn text_field(field: &'static str, column: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        field,
        kind: ConditionKind::Text,
        operators: TEXT_OPERATORS,
        options: None,
        value_labels: None,
        source: FieldSource::Column(column),
    }
}

const fn number_field(field: &'static str, column: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        field,
        kind: ConditionKind::Number,
        operators: NUMBER_OPERATORS,
        options: None,
        value_labels: None,
        source: FieldSource::Column(column),
    }
}

const fn boolean_field(field: &'static str, column: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        field,
        kind: ConditionKind::Boolean,
        operators: EQ_OPERATORS,
        options: None,
        value_labels: Some(LabelNamespace::Specials),
        source: FieldSource::Column(column),
    }
}

const fn enum_field(
    field: &'static str,
    column: &'static str,
    options: &'static [&'static str],
    labels: LabelNamespace,
) -> FieldDescriptor {
    FieldDescriptor {
        field,
        kind: ConditionKind::Enum,
        operators: EQ_OPERATORS,
        options: Some(options),
        value_labels: Some(labels),
        source: FieldSource::Column(column),
    }
}

pub const AGE_FIELD: &str = "age";

/// Fractional age in years, from the two stored components.
const AGE_EXPR: &str = "(age_years + age_months / 12.0)";

fn compile_age(row: &ConditionRow, config: &FilterConfig) -> Option<Clause> {
    let younger = row.bool_value?;
    let comparison = if younger { "<" } else { ">=" };
    Some(Clause::new(
        format!("{AGE_EXPR} {comparison} ?"),
        vec![Value::Real(config.age_threshold_years)],
    ))
}

fn describe_age(condition: &Condition, config: &FilterConfig, labels: &dyn LabelLookup) -> String {
    let Condition::Boolean(c) = condition else {
        return labels.label_or_key(LabelNamespace::Field, condition.field());
    };
    let threshold = format_number(config.age_threshold_years);
    let key = if c.value() { "age-under" } else { "age-over" };
    match labels.label(LabelNamespace::Specials, key) {
        Some(template) => template.replace("{threshold}", &threshold),
        None if c.value() => format!("younger than {threshold}"),
        None => format!("{threshold} or older"),
    }
}

/// The procedure fields that can be filtered on, in display order.
pub static PROCEDURE_FIELDS: &[FieldDescriptor] = &[
    text_field("case-id", "case_id"),
    text_field("procedure", "description"),
    FieldDescriptor {
        field: AGE_FIELD,
        kind: ConditionKind::Boolean,
        operators: EQ_OPERATORS,
        options: None,
        value_labels: None,
        source: FieldSource::Virtual(VirtualField {
            compile: compile_age,
            describe: describe_age,
        }),
    },
    number_field("age-years", "age_years"),
    number_field("asa-score", "asa_score"),
    enum_field(
        "airway-management",
        "airway_management",
        AirwayManagement::VALUES,
        LabelNamespace::Airway,
    ),
    enum_field(
        "department",
        "department",
        Department::VALUES,
        LabelNamespace::Department,
    ),
    boolean_field("outpatient", "outpatient"),
    boolean_field("has-specials", "has_specials"),
    boolean_field("has-regional-anesthesia", "has_regional_anesthesia"),
    boolean_field("has-local-anesthetics", "has_local_anesthetics"),
];

/// Lookup over a static field catalog plus the engine configuration.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: &'static [FieldDescriptor],
    config: FilterConfig,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl FieldRegistry {
    pub fn new(config: FilterConfig) -> Self {
        Self::with_fields(PROCEDURE_FIELDS, config)
    }

    /// Procedure fields with the age threshold taken from the environment.
    pub fn from_env() -> Self {
        Self::new(FilterConfig::from_env())
    }

    pub fn with_fields(fields: &'static [FieldDescriptor], config: FilterConfig) -> Self {
        Self { fields, config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    pub fn describe(&self, field: &str) -> Result<&'static FieldDescriptor, ConditionError> {
        self.fields
            .iter()
            .find(|d| d.field == field)
            .ok_or_else(|| ConditionError::UnknownField(field.to_string()))
    }

    /// Zero value of the right kind, for a fresh condition row in a form.
    pub fn default_condition(&self, field: &str) -> Result<Condition, ConditionError> {
        let d = self.describe(field)?;
        let first_op = d.operators.first().copied().unwrap_or(Operator::Eq);
        let condition: Condition = match d.kind {
            ConditionKind::Text => TextCondition::new(d.field, d.operators, first_op, "")?.into(),
            ConditionKind::Number => {
                NumberCondition::new(d.field, d.operators, first_op, 0.0)?.into()
            }
            ConditionKind::Boolean => BooleanCondition::new(d.field, false)?.into(),
            ConditionKind::Enum => {
                let options = d.options.unwrap_or(&[]);
                let first = options.first().copied().unwrap_or_default();
                EnumCondition::new(d.field, options, first)?.into()
            }
        };
        Ok(condition)
    }

    fn expect_kind(
        &self,
        field: &str,
        kind: ConditionKind,
    ) -> Result<&'static FieldDescriptor, ConditionError> {
        let d = self.describe(field)?;
        if d.kind != kind {
            return Err(ConditionError::KindMismatch {
                field: field.to_string(),
                expected: d.kind,
                found: kind.as_str().to_string(),
            });
        }
        Ok(d)
    }

    pub fn text(
        &self,
        field: &str,
        operator: Operator,
        value: impl Into<String>,
    ) -> Result<Condition, ConditionError> {
        let d = self.expect_kind(field, ConditionKind::Text)?;
        Ok(TextCondition::new(d.field, d.operators, operator, value)?.into())
    }

    pub fn number(
        &self,
        field: &str,
        operator: Operator,
        value: f64,
    ) -> Result<Condition, ConditionError> {
        let d = self.expect_kind(field, ConditionKind::Number)?;
        Ok(NumberCondition::new(d.field, d.operators, operator, value)?.into())
    }

    pub fn boolean(&self, field: &str, value: bool) -> Result<Condition, ConditionError> {
        let d = self.expect_kind(field, ConditionKind::Boolean)?;
        Ok(BooleanCondition::new(d.field, value)?.into())
    }

    pub fn enumeration(
        &self,
        field: &str,
        value: impl Into<String>,
    ) -> Result<Condition, ConditionError> {
        let d = self.expect_kind(field, ConditionKind::Enum)?;
        let options = d.options.unwrap_or(&[]);
        Ok(EnumCondition::new(d.field, options, value)?.into())
    }

    /// Rebuild a validated condition from a stored row, e.g. to edit it.
    pub fn rehydrate(&self, row: &ConditionRow) -> Result<Condition, ConditionError> {
        let d = self.describe(&row.field)?;
        if row.kind != d.kind.as_str() {
            return Err(ConditionError::KindMismatch {
                field: row.field.clone(),
                expected: d.kind,
                found: row.kind.clone(),
            });
        }
        let missing = || ConditionError::MissingValue {
            field: row.field.clone(),
        };
        let operator = match row.operator.as_deref() {
            None => Operator::Eq,
            Some(raw) => Operator::from_stored(raw).ok_or_else(|| {
                ConditionError::OperatorNotAllowed {
                    field: row.field.clone(),
                    operator: raw.to_string(),
                }
            })?,
        };
        match d.kind {
            ConditionKind::Text => {
                let value = row.text_value.clone().ok_or_else(missing)?;
                self.text(d.field, operator, value)
            }
            ConditionKind::Number => {
                let value = row.number_value.ok_or_else(missing)?;
                self.number(d.field, operator, value)
            }
            ConditionKind::Boolean => {
                let value = row.bool_value.ok_or_else(missing)?;
                self.boolean(d.field, value)
            }
            ConditionKind::Enum => {
                let value = row.text_value.clone().ok_or_else(missing)?;
                self.enumeration(d.field, value)
            }
        }
    }
}
