//! UTCTime and GeneralizedTime conversion to and from UNIX timestamps.
//!
//! Only the `Z`-terminated forms required by DER are produced; parsing
//! tolerates a missing `Z` and ignores fractional seconds.

use cmskit_types::CryptoError;

const SECS_PER_DAY: i64 = 86_400;
/// Days between 0000-03-01 and 1970-01-01 in the proleptic Gregorian calendar.
const EPOCH_SHIFT: i64 = 719_468;

/// A broken-down UTC date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CivilTime {
    pub fn from_unix(timestamp: i64) -> Self {
        let days = timestamp.div_euclid(SECS_PER_DAY) + EPOCH_SHIFT;
        let secs = timestamp.rem_euclid(SECS_PER_DAY) as u32;

        let era = days.div_euclid(146_097);
        let doe = days.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
        let year = yoe + era * 400 + i64::from(month <= 2);

        CivilTime {
            year,
            month,
            day,
            hour: secs / 3600,
            minute: secs % 3600 / 60,
            second: secs % 60,
        }
    }

    pub fn to_unix(&self) -> Result<i64, CryptoError> {
        if !(1..=12).contains(&self.month)
            || !(1..=31).contains(&self.day)
            || self.hour > 23
            || self.minute > 59
            || self.second > 60
        {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        let (y, m) = if self.month <= 2 {
            (self.year - 1, i64::from(self.month) + 9)
        } else {
            (self.year, i64::from(self.month) - 3)
        };
        let days = 365 * y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400)
            + (153 * m + 2) / 5
            + i64::from(self.day)
            - 1
            - EPOCH_SHIFT;
        Ok(days * SECS_PER_DAY
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second))
    }

    /// RFC 5280 section 4.1.2.5: UTCTime covers 1950 through 2049.
    pub fn fits_utc_time(&self) -> bool {
        (1950..2050).contains(&self.year)
    }

    /// `YYMMDDHHMMSSZ`
    pub fn format_utc(&self) -> String {
        format!(
            "{:02}{:02}{:02}{:02}{:02}{:02}Z",
            self.year.rem_euclid(100),
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        )
    }

    /// `YYYYMMDDHHMMSSZ`
    pub fn format_generalized(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    pub fn parse_utc(text: &str) -> Result<Self, CryptoError> {
        let digits = time_digits(text, 12)?;
        let yy = i64::from(field(digits, 0, 2)?);
        Self::from_fields(if yy < 50 { 2000 + yy } else { 1900 + yy }, &digits[2..])
    }

    pub fn parse_generalized(text: &str) -> Result<Self, CryptoError> {
        let digits = time_digits(text, 14)?;
        Self::from_fields(i64::from(field(digits, 0, 4)?), &digits[4..])
    }

    fn from_fields(year: i64, rest: &str) -> Result<Self, CryptoError> {
        Ok(CivilTime {
            year,
            month: field(rest, 0, 2)?,
            day: field(rest, 2, 2)?,
            hour: field(rest, 4, 2)?,
            minute: field(rest, 6, 2)?,
            second: field(rest, 8, 2)?,
        })
    }
}

fn time_digits(text: &str, min_len: usize) -> Result<&str, CryptoError> {
    let text = text.strip_suffix('Z').unwrap_or(text);
    let text = text.split('.').next().unwrap_or(text);
    if text.len() < min_len || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    Ok(text)
}

fn field(digits: &str, start: usize, len: usize) -> Result<u32, CryptoError> {
    digits
        .get(start..start + len)
        .and_then(|s| s.parse().ok())
        .ok_or(CryptoError::DecodeAsn1Fail)
}
