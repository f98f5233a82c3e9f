//! Normalization of raw source records: canonical names and description payloads.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::{CaseInformationFields, NormalizedRecord, PersonDetails, RawDetail, RawRecord};

/// Canonical name used when a record carries no usable name.
pub const UNSPECIFIED_NAME: &str = "ไม่ระบุ";

/// Matched as plain prefixes, first hit wins; `นางสาว` must precede `นาง`.
const HONORIFICS: [&str; 7] = [
    "นาย",
    "นางสาว",
    "นาง",
    "ด.ช.",
    "ด.ญ.",
    "เด็กชาย",
    "เด็กหญิง",
];

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

const BUDDHIST_ERA_OFFSET: i32 = 543;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("no digits found")]
    NoDigits,
    #[error("number out of range")]
    NumberOutOfRange,
    #[error("expected `day month year`")]
    MalformedDate,
    #[error("unknown Thai month name {0:?}")]
    UnknownMonth(String),
    #[error("not a calendar date")]
    InvalidCalendarDate,
    #[error("expected a leading HH:MM")]
    MalformedTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {kind} (raw {raw:?})")]
pub struct FieldError {
    pub field: &'static str,
    pub kind: ParseErrorKind,
    pub raw: String,
}

/// Every field failure of one record, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct NormalizeError {
    pub name: String,
    pub errors: Vec<FieldError>,
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {:?} has {} unparseable field(s)", self.name, self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

/// Strip one leading honorific and collapse whitespace runs.
pub fn canonical_name(display_name: Option<&str>) -> String {
    let Some(name) = display_name else {
        return UNSPECIFIED_NAME.to_string();
    };
    let mut rest = name.trim();
    if let Some(stripped) = HONORIFICS.iter().find_map(|h| rest.strip_prefix(h)) {
        rest = stripped;
    }
    let collapsed = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        UNSPECIFIED_NAME.to_string()
    } else {
        collapsed
    }
}

fn text_or_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn decimal_digit(ch: char) -> Option<u32> {
    match ch {
        '0'..='9' => Some(ch as u32 - '0' as u32),
        '๐'..='๙' => Some(ch as u32 - '๐' as u32),
        _ => None,
    }
}

fn parse_number(text: &str) -> Result<u32, ParseErrorKind> {
    let mut value: u32 = 0;
    let mut seen = false;
    for ch in text.chars() {
        let digit = decimal_digit(ch).ok_or(ParseErrorKind::MalformedDate)?;
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ParseErrorKind::NumberOutOfRange)?;
        seen = true;
    }
    if seen {
        Ok(value)
    } else {
        Err(ParseErrorKind::MalformedDate)
    }
}

/// Age in years from free text such as `"12 ปี"`: every decimal digit, concatenated.
pub fn parse_age(raw: Option<&str>) -> Result<Option<u32>, ParseErrorKind> {
    let Some(text) = text_or_none(raw) else {
        return Ok(None);
    };
    let mut value: u32 = 0;
    let mut seen = false;
    for digit in text.chars().filter_map(decimal_digit) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ParseErrorKind::NumberOutOfRange)?;
        seen = true;
    }
    if seen {
        Ok(Some(value))
    } else {
        Err(ParseErrorKind::NoDigits)
    }
}

/// `D <Thai month> YYYY` in the Buddhist era; trailing tokens are ignored.
pub fn parse_thai_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ParseErrorKind> {
    let Some(text) = text_or_none(raw) else {
        return Ok(None);
    };
    let parts = text.split_whitespace().collect::<Vec<_>>();
    if parts.len() < 3 {
        return Err(ParseErrorKind::MalformedDate);
    }
    let day = parse_number(parts[0])?;
    let month = THAI_MONTHS
        .iter()
        .position(|m| *m == parts[1])
        .map(|idx| idx as u32 + 1)
        .ok_or_else(|| ParseErrorKind::UnknownMonth(parts[1].to_string()))?;
    let year_be = i32::try_from(parse_number(parts[2])?).map_err(|_| ParseErrorKind::NumberOutOfRange)?;
    NaiveDate::from_ymd_opt(year_be - BUDDHIST_ERA_OFFSET, month, day)
        .map(Some)
        .ok_or(ParseErrorKind::InvalidCalendarDate)
}

/// Leading `H:MM` or `HH:MM`; anything after it (such as `น.`) is ignored.
pub fn parse_thai_time(raw: Option<&str>) -> Result<Option<NaiveTime>, ParseErrorKind> {
    let Some(text) = text_or_none(raw) else {
        return Ok(None);
    };
    let (hour_part, rest) = text.split_once(':').ok_or(ParseErrorKind::MalformedTime)?;
    let minute_part = rest.get(..2).ok_or(ParseErrorKind::MalformedTime)?;
    let ascii_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if hour_part.len() > 2 || !ascii_digits(hour_part) || !ascii_digits(minute_part) {
        return Err(ParseErrorKind::MalformedTime);
    }
    let hour = hour_part.parse::<u32>().map_err(|_| ParseErrorKind::MalformedTime)?;
    let minute = minute_part.parse::<u32>().map_err(|_| ParseErrorKind::MalformedTime)?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .map(Some)
        .ok_or(ParseErrorKind::MalformedTime)
}

fn collect_field<T>(
    field: &'static str,
    raw: Option<&str>,
    parsed: Result<Option<T>, ParseErrorKind>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    match parsed {
        Ok(value) => value,
        Err(kind) => {
            errors.push(FieldError {
                field,
                kind,
                raw: raw.unwrap_or_default().to_string(),
            });
            None
        }
    }
}

fn render_person_details(details: &PersonDetails) -> Result<Option<String>, Vec<FieldError>> {
    let mut errors = Vec::new();
    let age_missing = collect_field(
        "age_missing",
        details.age_missing.as_deref(),
        parse_age(details.age_missing.as_deref()),
        &mut errors,
    );
    let age_current = collect_field(
        "age_current",
        details.age_current.as_deref(),
        parse_age(details.age_current.as_deref()),
        &mut errors,
    );
    let missing_date = collect_field(
        "missing_date",
        details.missing_date.as_deref(),
        parse_thai_date(details.missing_date.as_deref()),
        &mut errors,
    );
    let missing_time = collect_field(
        "missing_time",
        details.missing_time.as_deref(),
        parse_thai_time(details.missing_time.as_deref()),
        &mut errors,
    );
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut lines = Vec::new();
    if let Some(v) = text_or_none(details.nationality.as_deref()) {
        lines.push(format!("สัญชาติ: {v}"));
    }
    if let Some(v) = age_missing {
        lines.push(format!("อายุขณะหายตัว: {v} ปี"));
    }
    if let Some(v) = age_current {
        lines.push(format!("อายุปัจจุบัน: {v} ปี"));
    }
    if let Some(v) = text_or_none(details.gender.as_deref()) {
        lines.push(format!("เพศ: {v}"));
    }
    if let Some(v) = missing_date {
        lines.push(format!("วันที่หายตัว: {}", v.format("%Y-%m-%d")));
    }
    if let Some(v) = missing_time {
        lines.push(format!("เวลาที่หายตัว: {}", v.format("%H:%M:%S")));
    }
    if let Some(v) = text_or_none(details.missing_location.as_deref()) {
        lines.push(format!("สถานที่หายตัว: {v}"));
    }
    if let Some(v) = text_or_none(details.inform_location.as_deref()) {
        lines.push(format!("สถานที่แจ้งเหตุ: {v}"));
    }

    Ok(if lines.is_empty() { None } else { Some(lines.join("\n")) })
}

/// Turn a raw source record into its canonical form.
pub fn normalize_record(raw: &RawRecord) -> Result<NormalizedRecord, NormalizeError> {
    let name = canonical_name(raw.display_name.as_deref());
    let description = match &raw.detail {
        None => None,
        Some(RawDetail::Text(text)) => text_or_none(Some(text.as_str())).map(ToString::to_string),
        Some(RawDetail::Person(details)) => render_person_details(details)
            .map_err(|errors| NormalizeError { name: name.clone(), errors })?,
    };

    Ok(NormalizedRecord {
        fields: CaseInformationFields {
            picture: text_or_none(raw.image_url.as_deref()).map(ToString::to_string),
            url: text_or_none(raw.detail_url.as_deref()).map(ToString::to_string),
            description,
        },
        name,
    })
}
