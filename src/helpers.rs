//! Formatting helpers backing the template filters.

use chrono::NaiveDateTime;

/// Human readable age of `value` relative to `now`, e.g. `"3 hours ago"`.
///
/// Only the largest non-zero unit is reported. Months are 30 days and years
/// 365 days. Returns `"just now"` for zero or negative ages.
pub fn timesince(value: NaiveDateTime, now: NaiveDateTime) -> String {
    let diff = now - value;
    let days = diff.num_days();
    let seconds = (diff - chrono::Duration::days(days)).num_seconds();

    let periods = [
        (days / 365, "year", "years"),
        (days / 30, "month", "months"),
        (days / 7, "week", "weeks"),
        (days, "day", "days"),
        (seconds / 3600, "hour", "hours"),
        (seconds / 60, "minute", "minutes"),
        (seconds, "second", "seconds"),
    ];

    for (period, singular, plural) in periods {
        if period > 0 {
            let unit = if period == 1 { singular } else { plural };
            return format!("{period} {unit} ago");
        }
    }

    "just now".to_string()
}

/// Label for the `floor`-th reply of a topic.
pub fn floorsign(floor: i64) -> String {
    match floor {
        1 => "Sofa".to_string(),
        2 => "Bench".to_string(),
        3 => "Floor".to_string(),
        n => format!("#{n}"),
    }
}

/// Events that change a member's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointEvent {
    Register = 1,
    DailyLogin = 2,
    NewTopic = 3,
    Reply = 4,
    TopicRemoved = 5,
}

impl PointEvent {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Register),
            2 => Some(Self::DailyLogin),
            3 => Some(Self::NewTopic),
            4 => Some(Self::Reply),
            5 => Some(Self::TopicRemoved),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Register => "Register",
            Self::DailyLogin => "Daily login",
            Self::NewTopic => "New topic",
            Self::Reply => "Reply",
            Self::TopicRemoved => "Topic removed",
        }
    }
}

/// Description of a point event code.
pub fn pointevent(code: i64) -> &'static str {
    PointEvent::from_code(code).map_or("Unknown event", PointEvent::describe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_timesince_units() {
        let now = at(12, 0, 0);

        assert_eq!(timesince(now, now), "just now");
        assert_eq!(timesince(now - Duration::seconds(1), now), "1 second ago");
        assert_eq!(timesince(now - Duration::seconds(59), now), "59 seconds ago");
        assert_eq!(timesince(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(timesince(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(timesince(now - Duration::days(1), now), "1 day ago");
        assert_eq!(timesince(now - Duration::days(14), now), "2 weeks ago");
        assert_eq!(timesince(now - Duration::days(65), now), "2 months ago");
        assert_eq!(timesince(now - Duration::days(800), now), "2 years ago");
    }

    #[test]
    fn test_timesince_reports_largest_unit_only() {
        let now = at(12, 0, 0);
        let value = now - Duration::days(3) - Duration::hours(4);
        assert_eq!(timesince(value, now), "3 days ago");
    }

    #[test]
    fn test_timesince_future_is_just_now() {
        let now = at(12, 0, 0);
        assert_eq!(timesince(now + Duration::minutes(5), now), "just now");
    }

    #[test]
    fn test_floorsign() {
        assert_eq!(floorsign(1), "Sofa");
        assert_eq!(floorsign(2), "Bench");
        assert_eq!(floorsign(3), "Floor");
        assert_eq!(floorsign(4), "#4");
        assert_eq!(floorsign(120), "#120");
    }

    #[test]
    fn test_pointevent() {
        assert_eq!(pointevent(1), "Register");
        assert_eq!(pointevent(4), "Reply");
        assert_eq!(pointevent(5), "Topic removed");
        assert_eq!(pointevent(0), "Unknown event");
        assert_eq!(pointevent(42), "Unknown event");
    }
}
