use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Timezone the CRM operators work in; "today" is always computed here.
pub const CIVIL_TIMEZONE: Tz = chrono_tz::America::Argentina::Buenos_Aires;

static ABSOLUTE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("static date pattern"));

static RELATIVE_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*([a-zñáéíóú]+)").expect("static relative pattern")
});

/// A calendar day in the civil timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CivilDate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl CivilDate {
    /// Builds a date, rejecting impossible calendar days.
    pub fn new(day: u32, month: u32, year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from_naive)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self {
            day: date.day(),
            month: date.month(),
            year: date.year(),
        }
    }

    /// Civil "today" for an instant, seen from `tz`.
    pub fn today_in(now: DateTime<Utc>, tz: Tz) -> Self {
        Self::from_naive(now.with_timezone(&tz).date_naive())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeUnit {
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl RelativeUnit {
    /// Accepts the Spanish labels the inbox renders as well as English ones.
    fn from_word(word: &str) -> Option<Self> {
        let word = word.to_lowercase();
        if word.starts_with("minut") {
            Some(Self::Minute)
        } else if word.starts_with("hora") || word.starts_with("hour") {
            Some(Self::Hour)
        } else if word.starts_with("día") || word.starts_with("dia") || word.starts_with("day")
        {
            Some(Self::Day)
        } else if word.starts_with("mes") || word.starts_with("month") {
            Some(Self::Month)
        } else if word.starts_with("año") || word.starts_with("ano") || word.starts_with("year")
        {
            Some(Self::Year)
        } else {
            None
        }
    }

    /// `None` when the span does not fit a `Duration`.
    fn span(self, amount: u32) -> Option<Duration> {
        let amount = i64::from(amount);
        match self {
            RelativeUnit::Minute => Duration::try_minutes(amount),
            RelativeUnit::Hour => Duration::try_hours(amount),
            RelativeUnit::Day => Duration::try_days(amount),
            RelativeUnit::Month => Duration::try_days(amount.checked_mul(30)?),
            RelativeUnit::Year => Duration::try_days(amount.checked_mul(365)?),
        }
    }

    fn is_same_day(self) -> bool {
        matches!(self, RelativeUnit::Minute | RelativeUnit::Hour)
    }
}

/// Parses "16 minutos", "hace 2 horas", "3 days ago" into an amount and unit.
pub fn parse_relative(label: &str) -> Option<(u32, RelativeUnit)> {
    RELATIVE_AMOUNT.captures_iter(label).find_map(|caps| {
        let amount = caps.get(1)?.as_str().parse().ok()?;
        let unit = RelativeUnit::from_word(caps.get(2)?.as_str())?;
        Some((amount, unit))
    })
}

/// Extracts the `D/M/YYYY` date embedded in an absolute timestamp label.
pub fn parse_absolute_date(label: &str) -> Option<CivilDate> {
    let caps = ABSOLUTE_DATE.captures(label)?;
    let day = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let year = caps.get(3)?.as_str().parse().ok()?;
    CivilDate::new(day, month, year)
}

/// Wall-clock `HH:MM` at which a message was sent, derived from its relative label.
pub fn derive_clock(relative_label: &str, now: DateTime<Tz>) -> Option<String> {
    let (amount, unit) = parse_relative(relative_label)?;
    let sent = now.checked_sub_signed(unit.span(amount)?)?;
    Some(sent.format("%H:%M").to_string())
}

/// Timestamp labels attached to one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub absolute_label: String,
    pub relative_label: Option<String>,
    pub derived_clock: Option<String>,
}

impl TimeInfo {
    pub fn new(absolute_label: impl Into<String>, relative_label: Option<String>) -> Self {
        Self {
            absolute_label: absolute_label.into(),
            relative_label,
            derived_clock: None,
        }
    }

    /// Builds a `TimeInfo` and derives its clock from the observation instant.
    pub fn observed(
        absolute_label: impl Into<String>,
        relative_label: Option<String>,
        now: DateTime<Tz>,
    ) -> Self {
        let derived_clock = relative_label
            .as_deref()
            .and_then(|label| derive_clock(label, now));
        Self {
            absolute_label: absolute_label.into(),
            relative_label,
            derived_clock,
        }
    }

    pub fn absolute_date(&self) -> Option<CivilDate> {
        parse_absolute_date(&self.absolute_label)
    }

    /// An explicit date decides on its own; otherwise a minute or hour
    /// relative label (in either label) means the message is from today.
    pub fn is_today(&self, today: CivilDate) -> bool {
        if let Some(date) = self.absolute_date() {
            return date == today;
        }
        let same_day = |label: &str| {
            parse_relative(label).is_some_and(|(_, unit)| unit.is_same_day())
        };
        same_day(&self.absolute_label) || self.relative_label.as_deref().is_some_and(same_day)
    }
}
