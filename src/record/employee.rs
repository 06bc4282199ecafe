//! Employee entity
//!
//! Field constraints are checked here, before any byte reaches the codec.

use std::fmt;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{FlatDbError, Result};

/// Largest accepted primary key
pub const MAX_ID: i32 = 999_999;

/// Byte budget of the name field
pub const MAX_NAME_LEN: usize = 100;

/// Byte budget of the department field
pub const MAX_DEPARTMENT_LEN: usize = 50;

/// Byte budget of the position field
pub const MAX_POSITION_LEN: usize = 50;

/// Largest accepted salary
pub const MAX_SALARY: f32 = 999_999.99;

/// A single employee record
///
/// `deleted` is the logical-deletion flag persisted in the slot; live
/// records handed out by the engine always have it cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i32,
    pub name: String,
    pub department: String,
    pub position: String,
    pub salary: f32,
    pub hire_date: NaiveDate,
    #[serde(default, skip_serializing)]
    pub deleted: bool,
}

impl Employee {
    /// Create a live (not deleted) record. Does not validate.
    pub fn new(
        id: i32,
        name: impl Into<String>,
        department: impl Into<String>,
        position: impl Into<String>,
        salary: f32,
        hire_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            department: department.into(),
            position: position.into(),
            salary,
            hire_date,
            deleted: false,
        }
    }

    /// Validate every field against today's local date
    pub fn validate(&self) -> Result<()> {
        self.validate_as_of(Local::now().date_naive())
    }

    /// Validate every field, treating `today` as the latest allowed hire date
    pub fn validate_as_of(&self, today: NaiveDate) -> Result<()> {
        validate_id(self.id)?;
        validate_name(&self.name)?;
        validate_department(&self.department)?;
        validate_position(&self.position)?;
        validate_salary(self.salary)?;
        validate_hire_date(self.hire_date, today)
    }
}

impl fmt::Display for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Employee{{id={}, name='{}', department='{}', position='{}', salary={:.2}, hireDate={}}}",
            self.id, self.name, self.department, self.position, self.salary, self.hire_date
        )
    }
}

// =============================================================================
// Field Validators
// =============================================================================

pub fn validate_id(id: i32) -> Result<()> {
    if id <= 0 {
        return Err(FlatDbError::validation(
            "id",
            "positive",
            "ID must be positive integer",
        ));
    }
    if id > MAX_ID {
        return Err(FlatDbError::validation(
            "id",
            "max_value",
            format!("ID cannot exceed {}", MAX_ID),
        ));
    }
    Ok(())
}

/// Letters (Latin or Cyrillic), whitespace, hyphens and apostrophes only
pub fn validate_name(name: &str) -> Result<()> {
    require_text("name", name, MAX_NAME_LEN)?;

    let allowed = |c: char| {
        c.is_ascii_alphabetic()
            || matches!(c, 'А'..='я' | 'ё' | 'Ё' | '-' | '\'' | '\u{0B}')
            || c.is_ascii_whitespace()
    };
    if !name.chars().all(allowed) {
        return Err(FlatDbError::validation(
            "name",
            "pattern",
            "Name can only contain letters, spaces, hyphens and apostrophes",
        ));
    }
    Ok(())
}

pub fn validate_department(department: &str) -> Result<()> {
    require_text("department", department, MAX_DEPARTMENT_LEN)
}

pub fn validate_position(position: &str) -> Result<()> {
    require_text("position", position, MAX_POSITION_LEN)
}

pub fn validate_salary(salary: f32) -> Result<()> {
    if !salary.is_finite() {
        return Err(FlatDbError::validation(
            "salary",
            "finite",
            "Salary must be a finite number",
        ));
    }
    if salary < 0.0 {
        return Err(FlatDbError::validation(
            "salary",
            "positive",
            "Salary cannot be negative",
        ));
    }
    if salary > MAX_SALARY {
        return Err(FlatDbError::validation(
            "salary",
            "max_value",
            "Salary cannot exceed 999999.99",
        ));
    }

    // The value must be the f32 nearest to some whole number of cents.
    let cents = (f64::from(salary) * 100.0).round();
    if (cents / 100.0) as f32 != salary {
        return Err(FlatDbError::validation(
            "salary",
            "decimal_places",
            "Salary can have maximum 2 decimal places",
        ));
    }
    Ok(())
}

pub fn validate_hire_date(hire_date: NaiveDate, today: NaiveDate) -> Result<()> {
    if hire_date > today {
        return Err(FlatDbError::validation(
            "hireDate",
            "past_date",
            "Hire date cannot be in the future",
        ));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` hire date
pub fn parse_hire_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        FlatDbError::validation("hireDate", "format", "Invalid date format. Use YYYY-MM-DD")
    })
}

fn require_text(field: &'static str, value: &str, max_bytes: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FlatDbError::validation(
            field,
            "required",
            format!("{} is required", field),
        ));
    }
    if value.len() > max_bytes {
        return Err(FlatDbError::validation(
            field,
            "max_length",
            format!("{} cannot exceed {} bytes", field, max_bytes),
        ));
    }
    Ok(())
}
