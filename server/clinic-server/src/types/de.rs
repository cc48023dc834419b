//! Lenient deserializers for query strings.
//!
//! Query parameters reach flattened structs as strings, so numeric and
//! boolean fields there accept both `"2"` and `2`.

use serde::de::{self, Deserializer, Visitor};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

struct OptionalFromStr<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for OptionalFromStr<T>
where
    T: FromStr + TryFrom<u64> + TryFrom<i64>,
{
    type Value = Option<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(self)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        T::try_from(v).map(Some).map_err(|_| E::custom("number out of range"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        T::try_from(v).map(Some).map_err(|_| E::custom("number out of range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let v = v.trim();
        if v.is_empty() {
            return Ok(None);
        }
        v.parse::<T>()
            .map(Some)
            .map_err(|_| E::custom(format!("invalid number: {v}")))
    }
}

/// `Option<u32>` / `Option<i64>` from a number, a numeric string or nothing
pub fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + TryFrom<u64> + TryFrom<i64>,
{
    deserializer.deserialize_option(OptionalFromStr(PhantomData))
}

struct OptionalBool;

impl<'de> Visitor<'de> for OptionalBool {
    type Value = Option<bool>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean, 0/1 or true/false")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v != 0))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v != 0))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        match v.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(E::custom(format!("invalid boolean: {other}"))),
        }
    }
}

/// `Option<bool>` accepting `true`, `false`, `1`, `0` and their string forms
pub fn optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(OptionalBool)
}

/// Clock time as `HH:MM` or `HH:MM:SS`
pub fn parse_clock(value: &str) -> Option<chrono::NaiveTime> {
    let value = value.trim();
    chrono::NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// `Option<NaiveTime>` accepting both `09:30` and `09:30:00`
pub fn optional_time<'de, D>(deserializer: D) -> Result<Option<chrono::NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_clock(v)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid time: {v}"))),
    }
}

/// `Option<NaiveDate>` from `YYYY-MM-DD`, with a blank value meaning absent
pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<chrono::NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid date: {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Params {
        #[serde(default, deserialize_with = "optional_number")]
        page: Option<u32>,
        #[serde(default, deserialize_with = "optional_bool")]
        is_read: Option<bool>,
    }

    #[test]
    fn test_strings_and_numbers() {
        let p: Params = serde_json::from_str(r#"{"page":"3","is_read":"1"}"#).unwrap();
        assert_eq!(p.page, Some(3));
        assert_eq!(p.is_read, Some(true));

        let p: Params = serde_json::from_str(r#"{"page":4,"is_read":false}"#).unwrap();
        assert_eq!(p.page, Some(4));
        assert_eq!(p.is_read, Some(false));

        let p: Params = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.page, None);
        assert_eq!(p.is_read, None);
    }

    #[derive(Debug, Deserialize)]
    struct Range {
        #[serde(default, deserialize_with = "optional_date")]
        date_to: Option<chrono::NaiveDate>,
    }

    #[test]
    fn test_dates() {
        let r: Range = serde_json::from_str(r#"{"date_to":" 2024-02-29 "}"#).unwrap();
        assert_eq!(r.date_to, chrono::NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(serde_json::from_str::<Range>(r#"{"date_to":""}"#).unwrap().date_to, None);
        assert_eq!(serde_json::from_str::<Range>("{}").unwrap().date_to, None);
        assert!(serde_json::from_str::<Range>(r#"{"date_to":"2023-02-29"}"#).is_err());
    }

    #[test]
    fn test_clock_formats() {
        assert_eq!(parse_clock("09:30"), chrono::NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_clock("17:05:10"), chrono::NaiveTime::from_hms_opt(17, 5, 10));
        assert_eq!(parse_clock("25:00"), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Params>(r#"{"page":"abc"}"#).is_err());
        assert!(serde_json::from_str::<Params>(r#"{"page":-1}"#).is_err());
        assert!(serde_json::from_str::<Params>(r#"{"is_read":"maybe"}"#).is_err());
    }
}
