//! US economic release calendar
//!
//! Fixed release rules evaluated in America/New_York local time, and the
//! loop that wakes the bot at each release.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use tokio::sync::watch;

/// How far ahead `next_after` searches; every week has a claims release
const SEARCH_DAYS: i64 = 14;
/// Longest window `upcoming` lists
pub const MAX_WINDOW_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReleaseEvent {
    Adp,
    Nfp,
    Cpi,
    Pce,
    IsmManufacturing,
    IsmServices,
    Claims,
    Fomc,
}

impl ReleaseEvent {
    pub const ALL: [ReleaseEvent; 8] = [
        ReleaseEvent::Adp,
        ReleaseEvent::Nfp,
        ReleaseEvent::Cpi,
        ReleaseEvent::Pce,
        ReleaseEvent::IsmManufacturing,
        ReleaseEvent::IsmServices,
        ReleaseEvent::Claims,
        ReleaseEvent::Fomc,
    ];

    /// Event code stored in the prediction log
    pub fn code(&self) -> &'static str {
        match self {
            ReleaseEvent::Adp => "ADP",
            ReleaseEvent::Nfp => "NFP",
            ReleaseEvent::Cpi => "CPI",
            ReleaseEvent::Pce => "PCE",
            ReleaseEvent::IsmManufacturing => "ISM_MFG",
            ReleaseEvent::IsmServices => "ISM_SERVICES",
            ReleaseEvent::Claims => "CLAIMS",
            ReleaseEvent::Fomc => "FOMC",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReleaseEvent::Adp => "ADP Employment Change",
            ReleaseEvent::Nfp => "Nonfarm Payrolls",
            ReleaseEvent::Cpi => "Consumer Price Index",
            ReleaseEvent::Pce => "PCE Price Index",
            ReleaseEvent::IsmManufacturing => "ISM Manufacturing PMI",
            ReleaseEvent::IsmServices => "ISM Services PMI",
            ReleaseEvent::Claims => "Initial Jobless Claims",
            ReleaseEvent::Fomc => "FOMC Rate Decision",
        }
    }

    /// Indicators published together with this release
    pub fn indicators(&self) -> &'static [&'static str] {
        match self {
            ReleaseEvent::Adp => &["ADP"],
            ReleaseEvent::Nfp => &["NFP", "UNEMPLOYMENT", "AHE"],
            ReleaseEvent::Cpi => &["CPI", "CORE_CPI"],
            ReleaseEvent::Pce => &["PCE", "CORE_PCE"],
            ReleaseEvent::IsmManufacturing => &["ISM_MFG"],
            ReleaseEvent::IsmServices => &["ISM_SERVICES"],
            ReleaseEvent::Claims => &["CLAIMS"],
            ReleaseEvent::Fomc => &["FOMC"],
        }
    }

    /// Checked every business day; only scored when the release is dated
    /// that same day
    pub fn same_day_only(&self) -> bool {
        matches!(self, ReleaseEvent::Fomc)
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Local (New York) release time
    pub fn local_time(&self) -> NaiveTime {
        let (h, m) = match self {
            ReleaseEvent::Adp => (8, 15),
            ReleaseEvent::IsmManufacturing | ReleaseEvent::IsmServices => (10, 0),
            ReleaseEvent::Fomc => (14, 0),
            _ => (8, 30),
        };
        NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Whether the release falls on `date` (New York calendar date)
    pub fn fires_on(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday();
        let day = date.day();
        match self {
            ReleaseEvent::Adp => weekday == Weekday::Wed,
            ReleaseEvent::Nfp => weekday == Weekday::Fri && day <= 7,
            ReleaseEvent::Cpi => (10..=16).contains(&day) && is_business_day(date),
            ReleaseEvent::Pce => day >= 25 && is_business_day(date),
            ReleaseEvent::IsmManufacturing => business_day_of_month(date) == Some(1),
            ReleaseEvent::IsmServices => business_day_of_month(date) == Some(3),
            ReleaseEvent::Claims => weekday == Weekday::Thu,
            ReleaseEvent::Fomc => is_business_day(date),
        }
    }
}

impl fmt::Display for ReleaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_us_holiday(date)
}

/// US federal holidays (with weekend observance) plus Good Friday
pub fn is_us_holiday(date: NaiveDate) -> bool {
    let year = date.year();

    let fixed = [(1, 1), (6, 19), (7, 4), (11, 11), (12, 25)]
        .into_iter()
        .filter_map(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .chain(NaiveDate::from_ymd_opt(year + 1, 1, 1))
        .map(observed);

    let floating = [
        (1, Weekday::Mon, 3),
        (2, Weekday::Mon, 3),
        (9, Weekday::Mon, 1),
        (10, Weekday::Mon, 2),
        (11, Weekday::Thu, 4),
    ]
    .into_iter()
    .filter_map(|(m, wd, n)| NaiveDate::from_weekday_of_month_opt(year, m, wd, n));

    let memorial = NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 5)
        .or_else(|| NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 4));
    let good_friday = easter_sunday(year).and_then(|d| d.checked_sub_signed(Duration::days(2)));

    fixed
        .chain(floating)
        .chain(memorial)
        .chain(good_friday)
        .any(|holiday| holiday == date)
}

/// Saturday holidays are observed on Friday, Sunday ones on Monday
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Gregorian Easter (anonymous algorithm)
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// 1-based index of `date` among the month's business days, `None` otherwise
fn business_day_of_month(date: NaiveDate) -> Option<u32> {
    if !is_business_day(date) {
        return None;
    }
    let count = (1..=date.day())
        .filter_map(|d| date.with_day(d))
        .filter(|d| is_business_day(*d))
        .count();
    u32::try_from(count).ok()
}

/// One firing of a release rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRelease {
    pub event: ReleaseEvent,
    pub at: DateTime<Tz>,
}

impl ScheduledRelease {
    pub fn at_utc(&self) -> DateTime<Utc> {
        self.at.with_timezone(&Utc)
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseSchedule {
    tz: Tz,
    events: Vec<ReleaseEvent>,
}

impl Default for ReleaseSchedule {
    fn default() -> Self {
        Self::new(ReleaseEvent::ALL.to_vec())
    }
}

impl ReleaseSchedule {
    pub fn new(events: Vec<ReleaseEvent>) -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            events,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Releases on a New York calendar date, ordered by time
    pub fn releases_on(&self, date: NaiveDate) -> Vec<ScheduledRelease> {
        let mut releases: Vec<ScheduledRelease> = self
            .events
            .iter()
            .filter(|e| e.fires_on(date))
            .filter_map(|e| {
                date.and_time(e.local_time())
                    .and_local_timezone(self.tz)
                    .earliest()
                    .map(|at| ScheduledRelease { event: *e, at })
            })
            .collect();
        releases.sort_by_key(|r| (r.at, r.event.code()));
        releases
    }

    /// First release strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<ScheduledRelease> {
        let start = now.with_timezone(&self.tz).date_naive();
        (0..=SEARCH_DAYS)
            .filter_map(|offset| start.checked_add_signed(Duration::days(offset)))
            .flat_map(|date| self.releases_on(date))
            .find(|r| r.at_utc() > now)
    }

    /// Releases in `(after, until]`, in firing order
    pub fn due_between(&self, after: DateTime<Utc>, until: DateTime<Utc>) -> Vec<ScheduledRelease> {
        if until <= after {
            return Vec::new();
        }
        let first = after.with_timezone(&self.tz).date_naive();
        let last = until.with_timezone(&self.tz).date_naive();
        first
            .iter_days()
            .take_while(|date| *date <= last)
            .flat_map(|date| self.releases_on(date))
            .filter(|r| r.at_utc() > after && r.at_utc() <= until)
            .collect()
    }

    /// Releases in `(now, now + days]`, `days` capped at a year
    pub fn upcoming(&self, now: DateTime<Utc>, days: i64) -> Vec<ScheduledRelease> {
        let days = days.clamp(0, MAX_WINDOW_DAYS);
        let end = now + Duration::days(days);
        let start = now.with_timezone(&self.tz).date_naive();
        (0..=days + 1)
            .filter_map(|offset| start.checked_add_signed(Duration::days(offset)))
            .flat_map(|date| self.releases_on(date))
            .filter(|r| r.at_utc() > now && r.at_utc() <= end)
            .collect()
    }

    /// Sleep until each release and hand it to `on_release`, until shutdown.
    ///
    /// Every release in `(last_fired, now]` is handed over after waking, so
    /// releases sharing a slot, or falling due while an earlier one was
    /// being processed, all fire.
    pub async fn run<F, Fut>(&self, mut shutdown: watch::Receiver<bool>, mut on_release: F)
    where
        F: FnMut(ScheduledRelease) -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!("[Scheduler] Started ({} release rules, {})", self.events.len(), self.tz);
        let mut last_fired = Utc::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let Some(next) = self.next_after(last_fired) else {
                tracing::warn!("[Scheduler] No upcoming release found, stopping");
                break;
            };
            let wait = (next.at_utc() - Utc::now()).to_std().unwrap_or_default();
            tracing::info!(
                "[Scheduler] Next release: {} at {}",
                next.event,
                next.at.format("%Y-%m-%d %H:%M %Z")
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }

            let now = Utc::now();
            let due = self.due_between(last_fired, now);
            last_fired = now;
            for release in due {
                tracing::info!("[Scheduler] Processing {}", release.event);
                on_release(release).await;
            }
        }

        tracing::info!("[Scheduler] Stopped");
    }
}
