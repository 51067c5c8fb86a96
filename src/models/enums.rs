use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde form, so JSON decoding rejects
/// anything outside the literal set.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];
            pub const VALUES: &'static [&'static str] = &[$($s),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ConditionKind {
    Text => "text",
    Number => "number",
    Boolean => "boolean",
    Enum => "enum",
});

str_enum!(Operator {
    Eq => "eq",
    Contains => "contains",
    Gt => "gt",
    Gte => "gte",
    Lt => "lt",
    Lte => "lte",
});

str_enum!(AirwayManagement {
    None => "none",
    FaceMask => "face_mask",
    LaryngealMask => "laryngeal_mask",
    EndotrachealTube => "endotracheal_tube",
    Tracheostomy => "tracheostomy",
});

str_enum!(Department {
    GeneralSurgery => "general_surgery",
    Orthopedics => "orthopedics",
    Gynecology => "gynecology",
    Urology => "urology",
    Ent => "ent",
    Neurosurgery => "neurosurgery",
    CardiacSurgery => "cardiac_surgery",
    PediatricSurgery => "pediatric_surgery",
    Ophthalmology => "ophthalmology",
    Other => "other",
});

pub const TEXT_OPERATORS: &[Operator] = &[Operator::Eq, Operator::Contains];

pub const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
];

impl ConditionKind {
    /// Operators a condition of this kind may ever carry.
    pub fn legal_operators(&self) -> &'static [Operator] {
        match self {
            ConditionKind::Text => TEXT_OPERATORS,
            ConditionKind::Number => NUMBER_OPERATORS,
            ConditionKind::Boolean | ConditionKind::Enum => &[Operator::Eq],
        }
    }
}

impl Operator {
    /// Parse a stored operator, accepting the short `ct` spelling for contains.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "ct" => Some(Operator::Contains),
            other => other.parse().ok(),
        }
    }

    /// Symbol used in human-readable summaries.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Contains => "∋",
            Operator::Gt => ">",
            Operator::Gte => "≥",
            Operator::Lt => "<",
            Operator::Lte => "≤",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn airway_management_round_trip() {
        for (variant, s) in [
            (AirwayManagement::None, "none"),
            (AirwayManagement::FaceMask, "face_mask"),
            (AirwayManagement::LaryngealMask, "laryngeal_mask"),
            (AirwayManagement::EndotrachealTube, "endotracheal_tube"),
            (AirwayManagement::Tracheostomy, "tracheostomy"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AirwayManagement::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn department_values_match_variants() {
        assert_eq!(Department::ALL.len(), Department::VALUES.len());
        for (variant, s) in Department::ALL.iter().zip(Department::VALUES) {
            assert_eq!(variant.as_str(), *s);
        }
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&Department::GeneralSurgery).unwrap();
        assert_eq!(json, "\"general_surgery\"");
        let parsed: AirwayManagement = serde_json::from_str("\"laryngeal_mask\"").unwrap();
        assert_eq!(parsed, AirwayManagement::LaryngealMask);
        assert!(serde_json::from_str::<Department>("\"cardiology\"").is_err());
    }

    #[test]
    fn contains_accepts_short_spelling() {
        assert_eq!(Operator::from_stored("ct"), Some(Operator::Contains));
        assert_eq!(Operator::from_stored("contains"), Some(Operator::Contains));
        assert_eq!(Operator::from_stored("like"), None);
    }

    #[test]
    fn operator_symbols() {
        let symbols: Vec<&str> = Operator::ALL.iter().map(|op| op.symbol()).collect();
        assert_eq!(symbols, vec!["=", "∋", ">", "≥", "<", "≤"]);
    }

    #[test]
    fn legal_operators_per_kind() {
        assert_eq!(ConditionKind::Text.legal_operators(), TEXT_OPERATORS);
        assert!(!ConditionKind::Number.legal_operators().contains(&Operator::Contains));
        assert_eq!(ConditionKind::Enum.legal_operators(), &[Operator::Eq]);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Department::from_str("invalid").is_err());
        assert!(Operator::from_str("ct").is_err());
        assert!(ConditionKind::from_str("").is_err());
    }
}
