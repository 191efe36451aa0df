//! Literal conversion between URI text and typed values.
//!
//! Conversion runs in both directions: the binder turns a [`LiteralValue`]
//! into a [`PrimitiveValue`], and URI builders turn a [`PrimitiveValue`]
//! back into query-string literal text. Both directions follow the rules of
//! one [`ProtocolVersion`].

use std::fmt::Write as _;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LiteralValue, PrimitiveKind, PrimitiveValue};

/// Base64url with optional padding, as used by `binary'...'` literals.
const BINARY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Protocol version whose literal formats apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Prefixed literals (`guid'…'`, `datetime'…'`, `X'…'`) and type suffixes.
    V3,
    /// Bare guid/date/time literals, `duration'…'`, base64 `binary'…'`.
    #[default]
    V4,
    V401,
}

impl ProtocolVersion {
    fn is_v3(self) -> bool {
        self == ProtocolVersion::V3
    }
}

/// Stateless converter for one protocol version.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralConverter {
    version: ProtocolVersion,
}

impl LiteralConverter {
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        LiteralConverter { version }
    }

    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Converts a lexical literal into a typed value.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the text is not a valid
    /// value of the kind its form declares, or when the form is not
    /// supported by this protocol version.
    pub fn to_primitive(&self, literal: &LiteralValue) -> Result<PrimitiveValue, String> {
        match literal {
            LiteralValue::Null => Ok(PrimitiveValue::Null),
            LiteralValue::Boolean(b) => Ok(PrimitiveValue::Boolean(*b)),
            LiteralValue::String(s) => Ok(PrimitiveValue::String(s.clone())),
            LiteralValue::Number(text) => self.parse_number(text),
            LiteralValue::Typed { kind, text, prefix } => {
                self.check_form(prefix.as_deref())?;
                self.parse_typed(*kind, text)
            }
            LiteralValue::Enum { type_name, member } => Ok(PrimitiveValue::Enum {
                type_name: type_name.clone(),
                member: member.clone(),
            }),
        }
    }

    /// Parses `text` as a value of `kind`, as found inside a typed literal.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if `text` is not a valid value.
    pub fn parse_typed(&self, kind: PrimitiveKind, text: &str) -> Result<PrimitiveValue, String> {
        let invalid = || format!("'{text}' is not a valid {kind} value");
        match kind {
            PrimitiveKind::Guid => Uuid::parse_str(text)
                .map(PrimitiveValue::Guid)
                .map_err(|_| invalid()),
            PrimitiveKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(PrimitiveValue::Date)
                .map_err(|_| invalid()),
            PrimitiveKind::DateTime => parse_date_time(text)
                .map(PrimitiveValue::DateTime)
                .ok_or_else(invalid),
            PrimitiveKind::DateTimeOffset => parse_date_time_offset(text)
                .map(PrimitiveValue::DateTimeOffset)
                .ok_or_else(invalid),
            PrimitiveKind::TimeOfDay => parse_time_of_day(text)
                .map(PrimitiveValue::TimeOfDay)
                .ok_or_else(invalid),
            PrimitiveKind::Duration => parse_duration(text)
                .map(PrimitiveValue::Duration)
                .ok_or_else(invalid),
            PrimitiveKind::Binary => {
                let bytes = if self.version.is_v3() {
                    decode_hex(text)
                } else {
                    BINARY_ENGINE.decode(text).ok()
                };
                bytes.map(PrimitiveValue::Binary).ok_or_else(invalid)
            }
            PrimitiveKind::String => Ok(PrimitiveValue::String(text.to_string())),
            PrimitiveKind::Boolean => match text {
                "true" => Ok(PrimitiveValue::Boolean(true)),
                "false" => Ok(PrimitiveValue::Boolean(false)),
                _ => Err(invalid()),
            },
            numeric if numeric.is_numeric() => self
                .parse_number(text)?
                .convert_to(numeric)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    fn check_form(&self, prefix: Option<&str>) -> Result<(), String> {
        let prefix = prefix.map(str::to_ascii_lowercase);
        let supported = match (self.version, prefix.as_deref()) {
            // V3 has no bare guid/date/time forms and no duration'...' prefix.
            (ProtocolVersion::V3, None) => false,
            (ProtocolVersion::V3, Some("duration")) => false,
            (ProtocolVersion::V3, Some(_)) => true,
            // V4 dropped Edm.DateTime and Edm.Time.
            (_, Some("datetime" | "time")) => false,
            _ => true,
        };
        if supported {
            Ok(())
        } else {
            Err(format!(
                "literal form {} is not supported by protocol {:?}",
                prefix.map_or_else(|| "bare".to_string(), |p| format!("{p}'...'")),
                self.version
            ))
        }
    }

    fn parse_number(&self, text: &str) -> Result<PrimitiveValue, String> {
        let invalid = || format!("'{text}' is not a valid numeric literal");
        match text {
            "INF" => return Ok(PrimitiveValue::Double(f64::INFINITY)),
            "-INF" => return Ok(PrimitiveValue::Double(f64::NEG_INFINITY)),
            "NaN" => return Ok(PrimitiveValue::Double(f64::NAN)),
            _ => {}
        }

        let (digits, suffix) = split_suffix(text);
        match suffix {
            Some('l') => return digits.parse::<i64>().map(PrimitiveValue::Int64).map_err(|_| invalid()),
            Some('m') => return Decimal::from_str(digits).map(PrimitiveValue::Decimal).map_err(|_| invalid()),
            Some('d') => return digits.parse::<f64>().map(PrimitiveValue::Double).map_err(|_| invalid()),
            Some('f') => return digits.parse::<f32>().map(PrimitiveValue::Single).map_err(|_| invalid()),
            _ => {}
        }

        if digits.contains(['e', 'E']) {
            return digits.parse::<f64>().map(PrimitiveValue::Double).map_err(|_| invalid());
        }
        if digits.contains('.') {
            // Unsuffixed decimal points are doubles in V3 and decimals from V4 on.
            return if self.version.is_v3() {
                digits.parse::<f64>().map(PrimitiveValue::Double).map_err(|_| invalid())
            } else {
                Decimal::from_str(digits).map(PrimitiveValue::Decimal).map_err(|_| invalid())
            };
        }
        if let Ok(v) = digits.parse::<i32>() {
            return Ok(PrimitiveValue::Int32(v));
        }
        if let Ok(v) = digits.parse::<i64>() {
            return Ok(PrimitiveValue::Int64(v));
        }
        if let Ok(v) = Decimal::from_str(digits) {
            return Ok(PrimitiveValue::Decimal(v));
        }
        digits.parse::<f64>().map(PrimitiveValue::Double).map_err(|_| invalid())
    }

    /// Formats a typed value as URI literal text.
    #[must_use]
    pub fn to_uri_literal(&self, value: &PrimitiveValue) -> String {
        let v3 = self.version.is_v3();
        match value {
            PrimitiveValue::Null => "null".to_string(),
            PrimitiveValue::Boolean(b) => b.to_string(),
            PrimitiveValue::Byte(v) => v.to_string(),
            PrimitiveValue::SByte(v) => v.to_string(),
            PrimitiveValue::Int16(v) => v.to_string(),
            PrimitiveValue::Int32(v) => v.to_string(),
            PrimitiveValue::Int64(v) if v3 => format!("{v}L"),
            PrimitiveValue::Int64(v) => v.to_string(),
            PrimitiveValue::Single(v) if v3 => format!("{}f", format_float(f64::from(*v))),
            PrimitiveValue::Single(v) => format_float(f64::from(*v)),
            PrimitiveValue::Double(v) => format_float(*v),
            PrimitiveValue::Decimal(v) if v3 => format!("{v}M"),
            PrimitiveValue::Decimal(v) => v.to_string(),
            PrimitiveValue::String(s) => format!("'{}'", s.replace('\'', "''")),
            PrimitiveValue::Guid(g) if v3 => format!("guid'{g}'"),
            PrimitiveValue::Guid(g) => g.to_string(),
            PrimitiveValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            PrimitiveValue::DateTime(dt) => {
                format!("datetime'{}'", dt.format("%Y-%m-%dT%H:%M:%S%.f"))
            }
            PrimitiveValue::DateTimeOffset(dt) if v3 => {
                format!("datetimeoffset'{}'", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            PrimitiveValue::DateTimeOffset(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            PrimitiveValue::TimeOfDay(t) => t.format("%H:%M:%S%.f").to_string(),
            PrimitiveValue::Duration(d) if v3 => format!("time'{}'", format_duration(*d)),
            PrimitiveValue::Duration(d) => format!("duration'{}'", format_duration(*d)),
            PrimitiveValue::Binary(bytes) if v3 => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    let _ = write!(hex, "{b:02X}");
                }
                format!("X'{hex}'")
            }
            PrimitiveValue::Binary(bytes) => format!("binary'{}'", BINARY_ENGINE.encode(bytes)),
            PrimitiveValue::Enum { type_name, member } => format!("{type_name}'{member}'"),
        }
    }
}

/// Splits a trailing `L`/`M`/`D`/`F` type suffix (lowercased) off numeric text.
fn split_suffix(text: &str) -> (&str, Option<char>) {
    match text.chars().last() {
        Some(c) if matches!(c.to_ascii_lowercase(), 'l' | 'm' | 'd' | 'f') && text.len() > 1 => {
            (&text[..text.len() - 1], Some(c.to_ascii_lowercase()))
        }
        _ => (text, None),
    }
}

/// Formats a double so it re-lexes as a floating-point literal.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-5..1e15).contains(&abs) {
        return format!("{v:e}");
    }
    let text = v.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

fn parse_date_time_offset(text: &str) -> Option<DateTime<chrono::FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    // Seconds are optional in the URI grammar: `2020-01-01T10:00Z`.
    if !text.is_ascii() {
        return None;
    }
    let t = text.find(['T', 't'])?;
    let time = &text[t + 1..];
    if time.len() >= 5 && time.as_bytes().get(5) != Some(&b':') {
        let padded = format!("{}:00{}", &text[..t + 6], &time[5..]);
        return DateTime::parse_from_rfc3339(&padded).ok();
    }
    None
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// Parses an ISO 8601 day-time duration: `[-]P[nD][T[nH][nM][n[.n]S]]`.
fn parse_duration(text: &str) -> Option<TimeDelta> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) if !t.is_empty() => (d, Some(t)),
        Some(_) => return None,
        None => (rest, None),
    };

    let mut total = TimeDelta::zero();
    if !date_part.is_empty() {
        let days = date_part.strip_suffix('D')?.parse::<i64>().ok()?;
        total = total.checked_add(&TimeDelta::try_days(days)?)?;
    }
    if let Some(mut time) = time_part {
        for (unit, seconds_per_unit) in [('H', 3600_i64), ('M', 60)] {
            if let Some(idx) = time.find(unit) {
                let n = time[..idx].parse::<i64>().ok()?;
                total = total.checked_add(&TimeDelta::try_seconds(n.checked_mul(seconds_per_unit)?)?)?;
                time = &time[idx + 1..];
            }
        }
        if !time.is_empty() {
            let secs = time.strip_suffix('S')?;
            let (whole, frac) = secs.split_once('.').unwrap_or((secs, ""));
            if whole.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) || frac.len() > 9 {
                return None;
            }
            total = total.checked_add(&TimeDelta::try_seconds(whole.parse::<i64>().ok()?)?)?;
            if !frac.is_empty() {
                let nanos = format!("{frac:0<9}").parse::<i64>().ok()?;
                total = total.checked_add(&TimeDelta::nanoseconds(nanos))?;
            }
        }
    }
    Some(if negative { -total } else { total })
}

/// Formats a duration in canonical ISO 8601 form, omitting zero components.
fn format_duration(d: TimeDelta) -> String {
    let negative = d < TimeDelta::zero();
    let d = d.abs();
    let days = d.num_days();
    let rem = d - TimeDelta::days(days);
    let hours = rem.num_hours();
    let rem = rem - TimeDelta::hours(hours);
    let minutes = rem.num_minutes();
    let rem = rem - TimeDelta::minutes(minutes);
    let seconds = rem.num_seconds();
    let nanos = (rem - TimeDelta::seconds(seconds)).num_nanoseconds().unwrap_or(0);

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days != 0 {
        let _ = write!(out, "{days}D");
    }
    if hours != 0 || minutes != 0 || seconds != 0 || nanos != 0 || days == 0 {
        out.push('T');
        if hours != 0 {
            let _ = write!(out, "{hours}H");
        }
        if minutes != 0 {
            let _ = write!(out, "{minutes}M");
        }
        if seconds != 0 || nanos != 0 || (hours == 0 && minutes == 0) {
            let _ = write!(out, "{seconds}");
            if nanos != 0 {
                let frac = format!("{nanos:09}");
                let _ = write!(out, ".{}", frac.trim_end_matches('0'));
            }
            out.push('S');
        }
    }
    out
}
