//! Record codec
//!
//! Fixed-width binary form of an [`Employee`]. Strings are UTF-8, space-padded
//! to their byte budget; dates are epoch milliseconds at UTC midnight.

use bytes::{Buf, BufMut, BytesMut};
use chrono::{Datelike, NaiveDate};

use crate::error::{FlatDbError, Result};

use super::employee::{Employee, MAX_DEPARTMENT_LEN, MAX_NAME_LEN, MAX_POSITION_LEN};

/// Size of one record slot in bytes
pub const RECORD_SIZE: usize = 256;

/// Id (4) + Name (100) + Dept (50) + Pos (50) + Salary (4) + HireDate (8) + Deleted (1)
const PAYLOAD_SIZE: usize = 4 + MAX_NAME_LEN + MAX_DEPARTMENT_LEN + MAX_POSITION_LEN + 4 + 8 + 1;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Encode a record into a full slot
pub fn encode(employee: &Employee) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(RECORD_SIZE);

    buf.put_i32(employee.id);
    put_fixed_str(&mut buf, &employee.name, MAX_NAME_LEN);
    put_fixed_str(&mut buf, &employee.department, MAX_DEPARTMENT_LEN);
    put_fixed_str(&mut buf, &employee.position, MAX_POSITION_LEN);
    buf.put_f32(employee.salary);
    buf.put_i64(date_to_epoch_millis(employee.hire_date));
    buf.put_u8(u8::from(employee.deleted));
    buf.put_bytes(0, RECORD_SIZE - PAYLOAD_SIZE);

    buf.to_vec()
}

/// Decode a full slot back into a record
pub fn decode(block: &[u8]) -> Result<Employee> {
    if block.len() != RECORD_SIZE {
        return Err(FlatDbError::corrupt(
            None,
            format!(
                "invalid record size: expected {} bytes, got {}",
                RECORD_SIZE,
                block.len()
            ),
        ));
    }

    let mut buf = block;

    let id = buf.get_i32();
    let name = get_fixed_str(&mut buf, MAX_NAME_LEN, "name")?;
    let department = get_fixed_str(&mut buf, MAX_DEPARTMENT_LEN, "department")?;
    let position = get_fixed_str(&mut buf, MAX_POSITION_LEN, "position")?;
    let salary = buf.get_f32();
    let hire_date = epoch_millis_to_date(buf.get_i64())?;
    let deleted = buf.get_u8() != 0;

    Ok(Employee {
        id,
        name,
        department,
        position,
        salary,
        hire_date,
        deleted,
    })
}

// =============================================================================
// Private Helpers
// =============================================================================

/// Write `value` into exactly `width` bytes, never splitting a UTF-8 sequence
fn put_fixed_str(buf: &mut BytesMut, value: &str, width: usize) {
    let mut end = value.len().min(width);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    buf.put_slice(&value.as_bytes()[..end]);
    buf.put_bytes(b' ', width - end);
}

fn get_fixed_str(buf: &mut &[u8], width: usize, field: &str) -> Result<String> {
    let data: &[u8] = *buf;
    let (raw, rest) = data.split_at(width);
    *buf = rest;

    let trimmed_len = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    std::str::from_utf8(&raw[..trimmed_len])
        .map(str::to_owned)
        .map_err(|e| FlatDbError::corrupt(None, format!("{} is not valid UTF-8: {}", field, e)))
}

fn date_to_epoch_millis(date: NaiveDate) -> i64 {
    (i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE) * MILLIS_PER_DAY
}

fn epoch_millis_to_date(millis: i64) -> Result<NaiveDate> {
    let days = millis.div_euclid(MILLIS_PER_DAY) + UNIX_EPOCH_DAYS_FROM_CE;
    i32::try_from(days)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| FlatDbError::corrupt(None, format!("hire date out of range: {}ms", millis)))
}
