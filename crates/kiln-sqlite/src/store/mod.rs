//! Table-level stores
//!
//! Each store borrows a connection, usually one with an open transaction,
//! and never manages transactions itself.

pub mod collection;
pub mod link;
pub mod metadata;
pub mod note;

pub use collection::CollectionStore;
pub use link::LinkStore;
pub use metadata::MetadataStore;
pub use note::NoteStore;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{SqliteError, SqliteResult};

/// Dates are stored as fixed-width RFC 3339 strings in UTC, so that
/// comparing them as text compares them chronologically
pub(crate) fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_date(value: &str) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| SqliteError::Serialization(format!("invalid date {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_dates_sort_as_text() {
        let early = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(format_date(&early) < format_date(&late));
        assert_eq!(format_date(&early), "2021-03-04T05:06:07.000000000Z");
    }

    #[test]
    fn test_date_round_trip_keeps_precision() {
        let date = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(parse_date(&format_date(&date)).unwrap(), date);
        assert!(parse_date("yesterday").is_err());
    }
}
