//! Birth data as entered by the customer, and the coordinates it resolves to.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::defaults::{MAX_BIRTH_YEAR, MIN_BIRTH_YEAR};
use crate::error::InputError;

/// Identity and raw birth fields of one person, exactly as submitted.
///
/// The raw date string is kept because the numeric reducer works on its
/// digits, not on the parsed calendar value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonInput {
    pub name: String,
    /// DD.MM.YYYY
    pub birth_date: String,
    /// HH:MM, 24h
    pub birth_time: String,
    pub birth_place: String,
}

impl PersonInput {
    pub fn new(name: &str, birth_date: &str, birth_time: &str, birth_place: &str) -> Self {
        Self {
            name: name.to_string(),
            birth_date: birth_date.to_string(),
            birth_time: birth_time.to_string(),
            birth_place: birth_place.to_string(),
        }
    }

    /// Parse the date and time fields into a [`BirthMoment`].
    pub fn moment(&self) -> Result<BirthMoment, InputError> {
        BirthMoment::parse(&self.birth_date, &self.birth_time, &self.birth_place)
    }
}

/// Validated birth moment in local wall-clock time of the birth place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthMoment {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl BirthMoment {
    pub fn parse(date: &str, time: &str, place: &str) -> Result<Self, InputError> {
        if place.trim().is_empty() {
            return Err(InputError::EmptyPlace);
        }
        Ok(Self {
            date: parse_birth_date(date)?,
            time: parse_birth_time(time)?,
        })
    }

    pub fn local_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Parse a DD.MM.YYYY date, rejecting impossible calendar days and years
/// outside the supported range.
pub fn parse_birth_date(raw: &str) -> Result<NaiveDate, InputError> {
    let invalid = || InputError::InvalidDateFormat(raw.to_string());

    let parts: Vec<&str> = raw.split('.').collect();
    let well_formed = parts.len() == 3
        && parts[0].len() == 2
        && parts[1].len() == 2
        && parts[2].len() == 4
        && parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err(invalid());
    }

    let date = NaiveDate::parse_from_str(raw, "%d.%m.%Y").map_err(|_| invalid())?;
    if !(MIN_BIRTH_YEAR..=MAX_BIRTH_YEAR).contains(&date.year()) {
        return Err(invalid());
    }
    Ok(date)
}

/// Parse an HH:MM 24h time.
pub fn parse_birth_time(raw: &str) -> Result<NaiveTime, InputError> {
    let invalid = || InputError::InvalidTimeFormat(raw.to_string());

    let (h, m) = raw.split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str| !s.is_empty() && s.len() <= 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || m.len() != 2 || !digits(m) {
        return Err(invalid());
    }

    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Coordinates and timezone resolved for a birth place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone id, e.g. "Europe/Berlin"
    pub timezone: String,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_date() {
        let d = parse_birth_date("15.06.1990").unwrap();
        assert_eq!((d.day(), d.month(), d.year()), (15, 6, 1990));
    }

    #[test]
    fn test_rejects_impossible_day() {
        assert!(parse_birth_date("31.02.1990").is_err());
        assert!(parse_birth_date("29.02.2023").is_err());
        assert!(parse_birth_date("29.02.2024").is_ok());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        for raw in ["1990-06-15", "5.06.1990", "15.6.1990", "15.06.90", "aa.bb.cccc", ""] {
            assert!(parse_birth_date(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_rejects_out_of_range_year() {
        assert!(parse_birth_date("01.01.1850").is_err());
        assert!(parse_birth_date("01.01.2150").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_birth_time("14:30").unwrap(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(parse_birth_time("7:05").unwrap(), NaiveTime::from_hms_opt(7, 5, 0).unwrap());
        assert!(parse_birth_time("24:00").is_err());
        assert!(parse_birth_time("12:60").is_err());
        assert!(parse_birth_time("12-30").is_err());
        assert!(parse_birth_time("12:3").is_err());
    }

    #[test]
    fn test_empty_place_rejected() {
        assert_eq!(
            BirthMoment::parse("15.06.1990", "12:00", "  "),
            Err(InputError::EmptyPlace)
        );
    }
}
