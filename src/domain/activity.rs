use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::{LedgerError, LedgerResult};

pub type ActivityId = i64;

/// Verification status of a logged activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityStatus {
    /// Submitted, waiting for a verifier
    Pending,
    /// Accepted by a verifier; releases locked credits
    Verified,
    /// Refused by a verifier
    Rejected,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Pending => "PENDING",
            ActivityStatus::Verified => "VERIFIED",
            ActivityStatus::Rejected => "REJECTED",
        }
    }

    /// VERIFIED and REJECTED are final; no transition leaves them
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActivityStatus::Pending)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ActivityStatus::Pending),
            "VERIFIED" => Ok(ActivityStatus::Verified),
            "REJECTED" => Ok(ActivityStatus::Rejected),
            other => Err(LedgerError::invalid(format!("unknown activity status '{other}'"))),
        }
    }
}

/// Time spent on an activity, as entered by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DurationParts")]
pub struct ActivityDuration {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

/// Unchecked wire form; minutes and seconds are range-checked on conversion
#[derive(Deserialize)]
struct DurationParts {
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl TryFrom<DurationParts> for ActivityDuration {
    type Error = LedgerError;

    fn try_from(parts: DurationParts) -> LedgerResult<Self> {
        Self::new(parts.hours, parts.minutes, parts.seconds)
    }
}

impl ActivityDuration {
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> LedgerResult<Self> {
        if minutes >= 60 {
            return Err(LedgerError::invalid(format!("minutes out of range: {minutes}")));
        }
        if seconds >= 60 {
            return Err(LedgerError::invalid(format!("seconds out of range: {seconds}")));
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
        })
    }

    /// Fractional hours: `h + m/60 + s/3600`
    pub fn as_hours(&self) -> f64 {
        f64::from(self.hours) + f64::from(self.minutes) / 60.0 + f64::from(self.seconds) / 3600.0
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    /// Rebuild a duration from a stored second count
    pub fn from_total_seconds(total: u64) -> LedgerResult<Self> {
        let hours = u32::try_from(total / 3600)
            .map_err(|_| LedgerError::invalid(format!("duration too long: {total}s")))?;
        Ok(Self {
            hours,
            minutes: ((total % 3600) / 60) as u32,
            seconds: (total % 60) as u32,
        })
    }
}

impl std::fmt::Display for ActivityDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Parses `H:MM:SS` or `MM:SS`
impl FromStr for ActivityDuration {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let parse = |part: &str| -> LedgerResult<u32> {
            part.trim()
                .parse::<u32>()
                .map_err(|_| LedgerError::invalid(format!("malformed duration '{s}'")))
        };

        match parts.as_slice() {
            [h, m, sec] => Self::new(parse(h)?, parse(m)?, parse(sec)?),
            [m, sec] => Self::new(0, parse(m)?, parse(sec)?),
            _ => Err(LedgerError::invalid(format!(
                "malformed duration '{s}', expected H:MM:SS"
            ))),
        }
    }
}

/// A logged activity awaiting or past verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub user_id: UserId,
    /// Activity-type tag, lowercased (e.g. "coding", "cycling")
    pub kind: String,
    pub duration: ActivityDuration,
    pub status: ActivityStatus,
    pub description: Option<String>,
    /// Milliseconds since epoch
    pub created_at: i64,
}

/// Input for submitting a new activity
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: UserId,
    pub kind: String,
    pub duration: ActivityDuration,
    pub description: Option<String>,
}

impl NewActivity {
    pub fn new(user_id: UserId, kind: &str, duration: ActivityDuration) -> Self {
        Self {
            user_id,
            kind: normalize_kind(kind),
            duration,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Tags are compared case-insensitively
pub fn normalize_kind(kind: &str) -> String {
    kind.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_as_hours() {
        let d = ActivityDuration::new(1, 30, 0).unwrap();
        assert!((d.as_hours() - 1.5).abs() < 1e-12);

        let d = ActivityDuration::new(0, 0, 36).unwrap();
        assert!((d.as_hours() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_duration_parse() {
        assert_eq!(
            "2:05:09".parse::<ActivityDuration>().unwrap(),
            ActivityDuration::new(2, 5, 9).unwrap()
        );
        assert_eq!(
            "45:00".parse::<ActivityDuration>().unwrap(),
            ActivityDuration::new(0, 45, 0).unwrap()
        );
        assert!("1:75:00".parse::<ActivityDuration>().is_err());
        assert!("1:00:60".parse::<ActivityDuration>().is_err());
        assert!("one hour".parse::<ActivityDuration>().is_err());
        assert!("-1:00:00".parse::<ActivityDuration>().is_err());
    }

    #[test]
    fn test_duration_deserialize_checks_ranges() {
        let ok: ActivityDuration =
            serde_json::from_str(r#"{"hours":1,"minutes":59,"seconds":59}"#).unwrap();
        assert_eq!(ok, ActivityDuration::new(1, 59, 59).unwrap());

        assert!(serde_json::from_str::<ActivityDuration>(r#"{"hours":1,"minutes":75,"seconds":0}"#).is_err());
        assert!(serde_json::from_str::<ActivityDuration>(r#"{"hours":0,"minutes":0,"seconds":60}"#).is_err());
    }

    #[test]
    fn test_duration_seconds_roundtrip() {
        let d = ActivityDuration::new(3, 7, 41).unwrap();
        assert_eq!(ActivityDuration::from_total_seconds(d.total_seconds()).unwrap(), d);
        assert_eq!(d.to_string(), "3:07:41");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ActivityStatus::Pending.is_terminal());
        assert!(ActivityStatus::Verified.is_terminal());
        assert!(ActivityStatus::Rejected.is_terminal());
        assert_eq!("verified".parse::<ActivityStatus>().unwrap(), ActivityStatus::Verified);
    }

    #[test]
    fn test_kind_normalized() {
        let a = NewActivity::new(1, "  Coding ", ActivityDuration::default());
        assert_eq!(a.kind, "coding");
    }
}
