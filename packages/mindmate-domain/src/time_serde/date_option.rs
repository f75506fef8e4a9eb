//! `YYYY-MM-DD` calendar dates that may be absent.

use serde::{Deserialize as _, Deserializer, Serializer};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(date) => {
			let formatted = date.format(ISO_DATE).map_err(serde::ser::Error::custom)?;

			serializer.serialize_str(&formatted)
		},
		None => serializer.serialize_none(),
	}
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<String>::deserialize(deserializer)?;

	match raw {
		Some(value) => Date::parse(&value, ISO_DATE).map(Some).map_err(serde::de::Error::custom),
		None => Ok(None),
	}
}

/// Lenient variant used on model output: anything that is not a valid date is absent.
pub fn parse_lenient(raw: &str) -> Option<Date> {
	let trimmed = raw.trim();
	// Models often answer with a full timestamp; the date prefix is what matters.
	let candidate = trimmed.get(..10).unwrap_or(trimmed);

	Date::parse(candidate, ISO_DATE).ok()
}
