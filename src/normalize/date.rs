//! Lenient date/time parsing.
//!
//! A fixed list of grammars is tried from most to least specific. All
//! grammars that match must agree on the resolved instant; when two
//! interpretations differ (the classic `03/04/2024` day-month swap) the
//! input is rejected as ambiguous rather than silently picking one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// How much of an instant the source text actually specified.
///
/// Ordered from coarsest to finest so precisions can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum DatePrecision {
    /// Calendar date only; resolved to midnight UTC.
    Day,
    /// Date and wall-clock time to the minute.
    Minute,
    /// Date and wall-clock time to the second.
    Second,
    /// Sub-second precision (from RFC 3339 fractional seconds or an epoch
    /// timestamp).
    Millisecond,
}

/// Returned when no supported date grammar matches the input, or when
/// multiple grammars match but disagree on the resolved instant.
#[derive(Debug, Clone, thiserror::Error)]
pub struct UnparseableDateError {
    /// The raw input that failed to parse.
    pub input: String,
    /// True when the failure is a resolution ambiguity: several grammars
    /// parsed the input but produced different instants.
    pub ambiguous: bool,
}

impl std::fmt::Display for UnparseableDateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ambiguous {
            write!(f, "date `{}` is ambiguous across supported formats", self.input)
        } else {
            write!(f, "cannot parse `{}` as a date/time", self.input)
        }
    }
}

/// A successfully parsed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedDate {
    pub instant: DateTime<Utc>,
    pub precision: DatePrecision,
}

/// Parse free-form date/time text into a canonical UTC instant.
///
/// `now` anchors relative phrases (`now`, `today`, `yesterday`, `tomorrow`).
pub(crate) fn parse(text: &str, now: DateTime<Utc>) -> Result<ParsedDate, UnparseableDateError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnparseableDateError {
            input: text.to_string(),
            ambiguous: false,
        });
    }

    if let Some(parsed) = parse_relative(text, now) {
        return Ok(parsed);
    }

    if let Some(parsed) = parse_absolute_datetime(text) {
        return Ok(parsed);
    }

    parse_calendar_date(text)
}

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<ParsedDate> {
    let midnight = |date: NaiveDate| -> Option<ParsedDate> {
        Some(ParsedDate {
            instant: Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?),
            precision: DatePrecision::Day,
        })
    };

    match text.to_ascii_lowercase().as_str() {
        "now" => Some(ParsedDate {
            instant: now,
            precision: DatePrecision::Millisecond,
        }),
        "today" => midnight(now.date_naive()),
        "yesterday" => midnight(now.date_naive().pred_opt()?),
        "tomorrow" => midnight(now.date_naive().succ_opt()?),
        _ => None,
    }
}

/// Grammars that carry a time component. These are unambiguous: the first
/// match wins.
fn parse_absolute_datetime(text: &str) -> Option<ParsedDate> {
    // RFC 3339 with offset, e.g. `2024-05-01T12:30:00+02:00`.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(ParsedDate {
            instant: parsed.with_timezone(&Utc),
            precision: rfc3339_precision(text),
        });
    }

    // ISO date-times without an offset are taken as UTC.
    const NAIVE_FORMATS: &[(&str, DatePrecision)] = &[
        ("%Y-%m-%dT%H:%M:%S%.f", DatePrecision::Millisecond),
        ("%Y-%m-%dT%H:%M:%S", DatePrecision::Second),
        ("%Y-%m-%d %H:%M:%S", DatePrecision::Second),
        ("%Y-%m-%dT%H:%M", DatePrecision::Minute),
        ("%Y-%m-%d %H:%M", DatePrecision::Minute),
    ];
    for (format, precision) in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ParsedDate {
                instant: Utc.from_utc_datetime(&parsed),
                precision: *precision,
            });
        }
    }

    None
}

fn rfc3339_precision(text: &str) -> DatePrecision {
    if text.contains('.') {
        DatePrecision::Millisecond
    } else {
        DatePrecision::Second
    }
}

/// Date-only grammars. Several may match the same input, so every candidate
/// is tried and the results must agree; disagreement is an ambiguity error,
/// never a silent choice.
fn parse_calendar_date(text: &str) -> Result<ParsedDate, UnparseableDateError> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", // ISO
        "%Y/%m/%d",
        "%d.%m.%Y",
        "%m/%d/%Y", // US
        "%d/%m/%Y", // EU
    ];

    let mut candidates: Vec<NaiveDate> = Vec::new();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if !candidates.contains(&date) {
                candidates.push(date);
            }
        }
    }

    match candidates.as_slice() {
        [] => Err(UnparseableDateError {
            input: text.to_string(),
            ambiguous: false,
        }),
        [date] => {
            let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| UnparseableDateError {
                input: text.to_string(),
                ambiguous: false,
            })?;
            Ok(ParsedDate {
                instant: Utc.from_utc_datetime(&midnight),
                precision: DatePrecision::Day,
            })
        }
        _ => Err(UnparseableDateError {
            input: text.to_string(),
            ambiguous: true,
        }),
    }
}
