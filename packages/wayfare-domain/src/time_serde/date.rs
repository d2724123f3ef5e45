//! Calendar dates as `YYYY-MM-DD`.

use serde::{Deserialize as _, Deserializer, Serializer};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn format(value: Date) -> String {
	value.format(DATE_FORMAT).unwrap_or_else(|_| value.to_string())
}

pub fn parse(raw: &str) -> Option<Date> {
	Date::parse(raw.trim(), DATE_FORMAT).ok()
}

pub fn serialize<S>(value: &Date, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	Date::parse(&raw, DATE_FORMAT).map_err(serde::de::Error::custom)
}
