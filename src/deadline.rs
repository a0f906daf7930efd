//! The `submission_deadline` setting: countdown maths, parsing of editor input, persistence,
//! and the change feed the countdown display subscribes to.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

#[cfg(feature = "ssr")]
use std::convert::Infallible;

#[cfg(feature = "ssr")]
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;
#[cfg(feature = "ssr")]
use tokio::sync::broadcast;
#[cfg(feature = "ssr")]
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
#[cfg(feature = "ssr")]
use tracing::{debug, warn};

#[cfg(feature = "ssr")]
use crate::{backend::Backend, get_setting, upsert_setting};

pub const DEADLINE_KEY: &str = "submission_deadline";

/// Time left until the deadline, as the countdown renders it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Countdown {
    Running {
        hours: i64,
        minutes: i64,
        seconds: i64,
    },
    Expired,
}

impl Countdown {
    pub fn until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        if now >= deadline {
            return Countdown::Expired;
        }
        let remaining = (deadline - now).num_seconds();
        Countdown::Running {
            hours: remaining / 3600,
            minutes: (remaining % 3600) / 60,
            seconds: remaining % 60,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Countdown::Expired)
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Running {
                hours,
                minutes,
                seconds,
            } => write!(f, "{hours:02}:{minutes:02}:{seconds:02}"),
            Countdown::Expired => f.write_str("00:00:00"),
        }
    }
}

/// Submissions are accepted until the deadline instant. No deadline means no gate.
pub fn is_open(now: DateTime<Utc>, deadline: Option<DateTime<Utc>>) -> bool {
    deadline.map_or(true, |deadline| now < deadline)
}

/// Parses a stored setting value.
pub fn parse_deadline(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Accepts RFC 3339 or a `datetime-local` value (`YYYY-MM-DDTHH:MM[:SS]`, read as UTC).
pub fn parse_deadline_input(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Some(parsed) = parse_deadline(input) {
        return Ok(parsed);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid deadline: {input:?}"))
}

/// Canonical stored form.
pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Value for a `datetime-local` input.
pub fn to_input_value(deadline: DateTime<Utc>) -> String {
    deadline.format("%Y-%m-%dT%H:%M").to_string()
}

pub fn display_deadline(deadline: DateTime<Utc>) -> String {
    deadline.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Reads the deadline. A value that does not parse is logged and treated as unset.
#[cfg(feature = "ssr")]
pub fn load_deadline(
    conn: &mut SqliteConnection,
) -> Result<Option<DateTime<Utc>>, diesel::result::Error> {
    let Some(value) = get_setting(conn, DEADLINE_KEY)? else {
        return Ok(None);
    };
    let parsed = parse_deadline(&value);
    if parsed.is_none() {
        warn!(%value, "Ignoring unparseable submission deadline");
    }
    Ok(parsed)
}

/// Upserts the deadline and returns the stored value.
#[cfg(feature = "ssr")]
pub fn store_deadline(
    conn: &mut SqliteConnection,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<String, diesel::result::Error> {
    let value = format_deadline(deadline);
    upsert_setting(conn, DEADLINE_KEY, &value, now.naive_utc())?;
    Ok(value)
}

/// Fan-out of deadline writes to connected countdown displays.
#[cfg(feature = "ssr")]
#[derive(Clone, Debug)]
pub struct DeadlineEvents {
    sender: broadcast::Sender<String>,
}

#[cfg(feature = "ssr")]
impl DeadlineEvents {
    pub fn new() -> Self {
        DeadlineEvents {
            sender: broadcast::channel(16).0,
        }
    }

    pub fn publish(&self, value: String) {
        // Err only means nobody is listening right now.
        let listeners = self.sender.send(value).unwrap_or(0);
        debug!(listeners, "Published deadline change");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

#[cfg(feature = "ssr")]
impl Default for DeadlineEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /events/deadline`: server-sent events carrying each new stored deadline value.
#[cfg(feature = "ssr")]
pub async fn deadline_events_handler(
    State(backend): State<Backend>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(backend.deadline_events.subscribe())
        .filter_map(|message| message.ok())
        .map(|value| Ok(Event::default().data(value)));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_countdown_running() {
        let countdown = Countdown::until(at(10, 0, 0), at(12, 30, 15));
        assert_eq!(
            countdown,
            Countdown::Running {
                hours: 2,
                minutes: 30,
                seconds: 15
            }
        );
        assert_eq!(countdown.to_string(), "02:30:15");
    }

    #[test]
    fn test_countdown_hours_exceed_a_day() {
        let countdown = Countdown::until(at(0, 0, 0), at(0, 0, 0) + Duration::hours(50));
        assert_eq!(countdown.to_string(), "50:00:00");
    }

    #[test]
    fn test_countdown_expired_holds_zero() {
        assert_eq!(Countdown::until(at(12, 0, 0), at(12, 0, 0)), Countdown::Expired);
        let later = Countdown::until(at(13, 0, 0), at(12, 0, 0));
        assert!(later.is_expired());
        assert_eq!(later.to_string(), "00:00:00");
    }

    #[test]
    fn test_is_open() {
        assert!(is_open(at(10, 0, 0), None));
        assert!(is_open(at(10, 0, 0), Some(at(10, 0, 1))));
        assert!(!is_open(at(10, 0, 0), Some(at(10, 0, 0))));
        assert!(!is_open(at(11, 0, 0), Some(at(10, 0, 0))));
    }

    #[test]
    fn test_parse_deadline_input() {
        assert_eq!(parse_deadline_input("2025-03-01T12:30"), Ok(at(12, 30, 0)));
        assert_eq!(parse_deadline_input("2025-03-01T12:30:05"), Ok(at(12, 30, 5)));
        assert_eq!(
            parse_deadline_input("2025-03-01T14:30:00+02:00"),
            Ok(at(12, 30, 0))
        );
        assert!(parse_deadline_input("tomorrow").is_err());
    }

    #[test]
    fn test_format_round_trips_through_parse() {
        let stored = format_deadline(at(12, 30, 0));
        assert_eq!(stored, "2025-03-01T12:30:00Z");
        assert_eq!(parse_deadline(&stored), Some(at(12, 30, 0)));
        assert_eq!(to_input_value(at(12, 30, 0)), "2025-03-01T12:30");
    }
}
