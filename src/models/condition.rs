//! Filter conditions: one typed test against a procedure field.
//!
//! `Condition` is a closed sum over the four condition shapes. Every
//! constructor validates its input, so a `Condition` value is always
//! internally consistent (operator within its declared set, enum value
//! within its options). Whether the field exists is the registry's concern.
//!
//! `ConditionRow` is the persisted shape: untrusted, possibly stale, and
//! consumed directly by the predicate compiler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::FieldRegistry;

use super::enums::{ConditionKind, Operator};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Unknown filter field: {0}")]
    UnknownField(String),

    #[error("Condition field must not be empty")]
    EmptyField,

    #[error("Operator {operator} is not allowed for {field}")]
    OperatorNotAllowed { field: String, operator: String },

    #[error("Value {value:?} is not one of the options for {field}")]
    ValueNotInOptions { field: String, value: String },

    #[error("Enum condition for {field} has no options")]
    EmptyOptions { field: String },

    #[error("Number value for {field} must be finite")]
    NonFiniteNumber { field: String },

    #[error("Field {field} takes a {expected} condition, got {found}")]
    KindMismatch {
        field: String,
        expected: ConditionKind,
        found: String,
    },

    #[error("Stored condition for {field} has no value")]
    MissingValue { field: String },
}

impl ConditionError {
    /// True for stale references to a field the registry no longer knows.
    pub fn is_unknown_field(&self) -> bool {
        matches!(self, ConditionError::UnknownField(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Text(TextCondition),
    Number(NumberCondition),
    Boolean(BooleanCondition),
    Enum(EnumCondition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextCondition {
    field: String,
    operator: Operator,
    operators: Vec<Operator>,
    value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberCondition {
    field: String,
    operator: Operator,
    operators: Vec<Operator>,
    value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanCondition {
    field: String,
    value: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumCondition {
    field: String,
    options: Vec<String>,
    value: String,
}

fn checked_field(field: String) -> Result<String, ConditionError> {
    if field.trim().is_empty() {
        return Err(ConditionError::EmptyField);
    }
    Ok(field)
}

fn checked_operators(
    field: &str,
    kind: ConditionKind,
    operators: &[Operator],
    operator: Operator,
) -> Result<Vec<Operator>, ConditionError> {
    let legal = kind.legal_operators();
    if let Some(bad) = operators.iter().find(|op| !legal.contains(op)) {
        return Err(ConditionError::OperatorNotAllowed {
            field: field.to_string(),
            operator: bad.as_str().to_string(),
        });
    }
    if !operators.contains(&operator) {
        return Err(ConditionError::OperatorNotAllowed {
            field: field.to_string(),
            operator: operator.as_str().to_string(),
        });
    }
    Ok(operators.to_vec())
}

impl TextCondition {
    pub fn new(
        field: impl Into<String>,
        operators: &[Operator],
        operator: Operator,
        value: impl Into<String>,
    ) -> Result<Self, ConditionError> {
        let field = checked_field(field.into())?;
        let operators = checked_operators(&field, ConditionKind::Text, operators, operator)?;
        Ok(Self {
            field,
            operator,
            operators,
            value: value.into(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl NumberCondition {
    pub fn new(
        field: impl Into<String>,
        operators: &[Operator],
        operator: Operator,
        value: f64,
    ) -> Result<Self, ConditionError> {
        let field = checked_field(field.into())?;
        let operators = checked_operators(&field, ConditionKind::Number, operators, operator)?;
        if !value.is_finite() {
            return Err(ConditionError::NonFiniteNumber { field });
        }
        Ok(Self {
            field,
            operator,
            operators,
            value,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl BooleanCondition {
    pub fn new(field: impl Into<String>, value: bool) -> Result<Self, ConditionError> {
        Ok(Self {
            field: checked_field(field.into())?,
            value,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> bool {
        self.value
    }
}

impl EnumCondition {
    pub fn new<S: AsRef<str>>(
        field: impl Into<String>,
        options: &[S],
        value: impl Into<String>,
    ) -> Result<Self, ConditionError> {
        let field = checked_field(field.into())?;
        if options.is_empty() {
            return Err(ConditionError::EmptyOptions { field });
        }
        let value = value.into();
        if !options.iter().any(|o| o.as_ref() == value) {
            return Err(ConditionError::ValueNotInOptions { field, value });
        }
        Ok(Self {
            field,
            options: options.iter().map(|o| o.as_ref().to_string()).collect(),
            value,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Condition::Text(c) => c.field(),
            Condition::Number(c) => c.field(),
            Condition::Boolean(c) => c.field(),
            Condition::Enum(c) => c.field(),
        }
    }

    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::Text(_) => ConditionKind::Text,
            Condition::Number(_) => ConditionKind::Number,
            Condition::Boolean(_) => ConditionKind::Boolean,
            Condition::Enum(_) => ConditionKind::Enum,
        }
    }

    /// Boolean and enum conditions always compare with `eq`.
    pub fn operator(&self) -> Operator {
        match self {
            Condition::Text(c) => c.operator(),
            Condition::Number(c) => c.operator(),
            Condition::Boolean(_) | Condition::Enum(_) => Operator::Eq,
        }
    }

    /// Re-hydrate a stored row, e.g. for editing. Unlike compilation, a
    /// stale row is an error here (`UnknownField`, `KindMismatch`, ...).
    pub fn from_row(registry: &FieldRegistry, row: &ConditionRow) -> Result<Self, ConditionError> {
        registry.rehydrate(row)
    }

    pub fn to_row(&self) -> ConditionRow {
        let mut row = ConditionRow {
            kind: self.kind().as_str().to_string(),
            field: self.field().to_string(),
            operator: None,
            text_value: None,
            number_value: None,
            bool_value: None,
        };
        match self {
            Condition::Text(c) => {
                row.operator = Some(c.operator().as_str().to_string());
                row.text_value = Some(c.value().to_string());
            }
            Condition::Number(c) => {
                row.operator = Some(c.operator().as_str().to_string());
                row.number_value = Some(c.value());
            }
            Condition::Boolean(c) => row.bool_value = Some(c.value()),
            Condition::Enum(c) => row.text_value = Some(c.value().to_string()),
        }
        row
    }
}

impl From<TextCondition> for Condition {
    fn from(c: TextCondition) -> Self {
        Condition::Text(c)
    }
}

impl From<NumberCondition> for Condition {
    fn from(c: NumberCondition) -> Self {
        Condition::Number(c)
    }
}

impl From<BooleanCondition> for Condition {
    fn from(c: BooleanCondition) -> Self {
        Condition::Boolean(c)
    }
}

impl From<EnumCondition> for Condition {
    fn from(c: EnumCondition) -> Self {
        Condition::Enum(c)
    }
}

/// A condition as stored in `filter_conditions`.
///
/// Only the value column matching `kind` is populated. Unset `operator`
/// means `eq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRow {
    pub kind: String,
    pub field: String,
    pub operator: Option<String>,
    pub text_value: Option<String>,
    pub number_value: Option<f64>,
    pub bool_value: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{NUMBER_OPERATORS, TEXT_OPERATORS};

    #[test]
    fn enum_value_outside_options_rejected() {
        let err = EnumCondition::new("department", &["ent", "urology"], "cardiology").unwrap_err();
        assert_eq!(
            err,
            ConditionError::ValueNotInOptions {
                field: "department".into(),
                value: "cardiology".into(),
            }
        );
    }

    #[test]
    fn enum_value_inside_options_accepted() {
        let c = EnumCondition::new("department", &["ent", "urology"], "ent").unwrap();
        assert_eq!(c.value(), "ent");
        assert_eq!(c.options(), &["ent".to_string(), "urology".to_string()]);
    }

    #[test]
    fn enum_without_options_rejected() {
        let options: [&str; 0] = [];
        let err = EnumCondition::new("department", &options, "ent").unwrap_err();
        assert!(matches!(err, ConditionError::EmptyOptions { .. }));
    }

    #[test]
    fn empty_field_rejected() {
        assert_eq!(
            BooleanCondition::new("", true).unwrap_err(),
            ConditionError::EmptyField
        );
        assert_eq!(
            TextCondition::new("  ", TEXT_OPERATORS, Operator::Eq, "x").unwrap_err(),
            ConditionError::EmptyField
        );
    }

    #[test]
    fn operator_outside_declared_set_rejected() {
        let err = NumberCondition::new("asa-score", &[Operator::Eq], Operator::Gt, 3.0).unwrap_err();
        assert!(matches!(err, ConditionError::OperatorNotAllowed { .. }));
    }

    #[test]
    fn operator_illegal_for_kind_rejected() {
        let err = TextCondition::new("procedure", &[Operator::Eq, Operator::Gt], Operator::Eq, "x")
            .unwrap_err();
        assert_eq!(
            err,
            ConditionError::OperatorNotAllowed {
                field: "procedure".into(),
                operator: "gt".into(),
            }
        );
    }

    #[test]
    fn non_finite_number_rejected() {
        let err = NumberCondition::new("asa-score", NUMBER_OPERATORS, Operator::Eq, f64::NAN)
            .unwrap_err();
        assert!(matches!(err, ConditionError::NonFiniteNumber { .. }));
    }

    #[test]
    fn implicit_eq_for_boolean_and_enum() {
        let b: Condition = BooleanCondition::new("outpatient", false).unwrap().into();
        let e: Condition = EnumCondition::new("department", &["ent"], "ent").unwrap().into();
        assert_eq!(b.operator(), Operator::Eq);
        assert_eq!(e.operator(), Operator::Eq);
    }

    #[test]
    fn row_carries_only_the_matching_value() {
        let c: Condition = NumberCondition::new("asa-score", NUMBER_OPERATORS, Operator::Gte, 3.0)
            .unwrap()
            .into();
        let row = c.to_row();
        assert_eq!(row.kind, "number");
        assert_eq!(row.operator.as_deref(), Some("gte"));
        assert_eq!(row.number_value, Some(3.0));
        assert!(row.text_value.is_none());
        assert!(row.bool_value.is_none());

        let b: Condition = BooleanCondition::new("outpatient", true).unwrap().into();
        let row = b.to_row();
        assert_eq!(row.kind, "boolean");
        assert!(row.operator.is_none());
        assert_eq!(row.bool_value, Some(true));
    }

    #[test]
    fn from_row_rebuilds_operator_set_and_rejects_stale_fields() {
        let registry = FieldRegistry::default();
        let c: Condition = TextCondition::new("procedure", TEXT_OPERATORS, Operator::Contains, "ectomy")
            .unwrap()
            .into();
        let back = Condition::from_row(&registry, &c.to_row()).unwrap();
        assert_eq!(back, c);
        match back {
            Condition::Text(t) => assert_eq!(t.operators(), TEXT_OPERATORS),
            other => panic!("unexpected {other:?}"),
        }

        let mut stale = c.to_row();
        stale.field = "removed-field".into();
        assert!(Condition::from_row(&registry, &stale)
            .unwrap_err()
            .is_unknown_field());

        let mut drifted = c.to_row();
        drifted.kind = "number".into();
        assert!(matches!(
            Condition::from_row(&registry, &drifted),
            Err(ConditionError::KindMismatch { .. })
        ));
    }

    #[test]
    fn unknown_field_classification() {
        assert!(ConditionError::UnknownField("x".into()).is_unknown_field());
        assert!(!ConditionError::EmptyField.is_unknown_field());
    }
}
