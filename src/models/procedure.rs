use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{AirwayManagement, Department};

/// One logged procedure. `case_id` is the primary identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub case_id: String,
    pub age_years: u32,
    pub age_months: u32,
    pub date: NaiveDate,
    pub asa_score: u8,
    pub airway_management: AirwayManagement,
    pub department: Department,
    #[serde(rename = "procedure")]
    pub description: String,
    pub outpatient: bool,
    pub has_specials: bool,
    pub has_regional_anesthesia: bool,
    pub has_local_anesthetics: bool,
}

impl Procedure {
    /// Age as fractional years, `years + months / 12`.
    pub fn age(&self) -> f64 {
        self.age_years as f64 + self.age_months as f64 / 12.0
    }
}
