use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime
};

const NAIVE_FORMATS: [&str; 4] = [
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M",
  "%Y-%m-%dT%H:%M"
];

/// Turns a `datetime-local` value
/// (`2024-05-01T13:30`) into the
/// `2024-05-01 13:30` form the API
/// stores. Empty input stays empty.
#[must_use]
pub fn format_deadline(
  local: &str
) -> String {
  if local.is_empty() {
    return String::new();
  }
  local.replacen('T', " ", 1)
}

/// Parses the timestamp shapes the API
/// emits. Offsets are dropped after
/// conversion to UTC; date-only values
/// mean midnight.
#[must_use]
pub fn parse_timestamp(
  text: &str
) -> Option<NaiveDateTime> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(trimmed)
  {
    return Some(dt.naive_utc());
  }

  for format in NAIVE_FORMATS {
    if let Ok(dt) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return Some(dt);
    }
  }

  // fractional seconds
  if let Some((head, _)) =
    trimmed.split_once('.')
    && let Some(dt) =
      parse_timestamp(head)
  {
    return Some(dt);
  }

  NaiveDate::parse_from_str(
    trimmed, "%Y-%m-%d"
  )
  .ok()
  .and_then(|date| {
    date.and_hms_opt(0, 0, 0)
  })
}

/// Short `YYYY-MM-DD HH:MM` rendering;
/// unparseable input is echoed back.
#[must_use]
pub fn display_timestamp(
  text: &str
) -> String {
  parse_timestamp(text)
    .map(|dt| {
      dt.format("%Y-%m-%d %H:%M")
        .to_string()
    })
    .unwrap_or_else(|| {
      text.trim().to_string()
    })
}
