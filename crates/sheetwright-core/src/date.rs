//! Spreadsheet date serial conversion
//!
//! Dates are stored in workbooks as day counts from an epoch, with the time
//! of day as the fractional part. The 1900 system inherits the fictitious
//! 1900-02-29 (serial 60); the 1904 system counts from 1904-01-01.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Largest serial accepted (9999-12-31 in the 1900 system)
pub const MAX_SERIAL: f64 = 2_958_465.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn epoch(date_1904: bool, before_march_1900: bool) -> Option<NaiveDateTime> {
    let date = if date_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if before_march_1900 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    date.and_hms_opt(0, 0, 0)
}

/// Convert a date serial to a date/time
///
/// Returns `None` for negative, non-finite, or out-of-range serials.
pub fn serial_to_datetime(serial: f64, date_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL {
        return None;
    }

    let days = serial.floor();
    let millis = ((serial - days) * MILLIS_PER_DAY).round() as i64;
    let base = epoch(date_1904, days < 61.0)?;

    base.checked_add_signed(Duration::days(days as i64))?
        .checked_add_signed(Duration::milliseconds(millis))
}

/// Convert a date/time to a date serial
pub fn datetime_to_serial(value: NaiveDateTime, date_1904: bool) -> f64 {
    let march_1900 = NaiveDate::from_ymd_opt(1900, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    let before_march = !date_1904 && march_1900.map_or(false, |m| value < m);

    match epoch(date_1904, before_march) {
        Some(base) => {
            let elapsed = value.signed_duration_since(base);
            elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY
        }
        None => 0.0,
    }
}
