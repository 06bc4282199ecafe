//! Record Module
//!
//! The stored entity and its fixed-width binary form.
//!
//! ## Responsibilities
//! - Employee entity and field validation
//! - Encode/decode one record to/from a 256-byte slot
//!
//! ## Slot Layout (256 bytes, big-endian)
//! ```text
//! ┌────────┬────────────┬──────────────┬────────────┬────────────┬──────────────┬─────────┬──────────┐
//! │ Id (4) │ Name (100) │ Dept (50)    │ Pos (50)   │ Salary (4) │ HireDate (8) │ Del (1) │ Pad (39) │
//! └────────┴────────────┴──────────────┴────────────┴────────────┴──────────────┴─────────┴──────────┘
//! ```

mod codec;
mod employee;

pub use codec::{decode, encode, RECORD_SIZE};
pub use employee::{
    parse_hire_date, validate_department, validate_hire_date, validate_id, validate_name,
    validate_position, validate_salary, Employee, MAX_DEPARTMENT_LEN, MAX_ID, MAX_NAME_LEN,
    MAX_POSITION_LEN, MAX_SALARY,
};
