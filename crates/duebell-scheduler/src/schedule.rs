use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Result, SchedulerError};

/// How far past a nonexistent local time (DST spring-forward gap) we look
/// for the first valid instant.
const MAX_GAP_MINUTES: i64 = 180;

/// Configured time of day + zone in which every reminder goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    time: NaiveTime,
    tz: Tz,
}

impl SendWindow {
    pub fn new(time: NaiveTime, tz: Tz) -> Self {
        Self { time, tz }
    }

    /// Parse `HH:MM` (24-hour) and an IANA zone name.
    pub fn parse(send_time: &str, timezone: &str) -> Result<Self> {
        let time = NaiveTime::parse_from_str(send_time.trim(), "%H:%M")
            .map_err(|e| SchedulerError::InvalidSendTime(format!("{send_time:?}: {e}")))?;
        let tz: Tz = timezone
            .trim()
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(timezone.to_string()))?;
        Ok(Self { time, tz })
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Send instant for a reminder about `due`.
    ///
    /// Built as civil time in the configured zone, so the wall clock reads the
    /// configured time on that date whatever the offset is that day and
    /// whatever the server's own zone is.
    ///
    /// - Ambiguous local times (DST fall-back) resolve to the earlier instant.
    /// - Nonexistent local times (DST spring-forward) move to the first valid
    ///   minute after the gap.
    pub fn scheduled_for(&self, due: NaiveDate) -> Result<DateTime<Utc>> {
        let local = due.and_time(self.time);
        resolve_local(&self.tz, local)
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or(SchedulerError::UnresolvableLocalTime {
                date: due,
                time: self.time,
                tz: self.tz.name().to_string(),
            })
    }
}

fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return Some(dt);
    }
    (1..=MAX_GAP_MINUTES).find_map(|m| {
        tz.from_local_datetime(&(local + Duration::minutes(m)))
            .earliest()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn costa_rica_nine_am() {
        let w = SendWindow::parse("09:00", "America/Costa_Rica").unwrap();
        let at = w.scheduled_for(d(2026, 2, 10)).unwrap();
        assert_eq!(at, utc("2026-02-10T09:00:00-06:00"));
        assert_eq!(
            at.with_timezone(&FixedOffset::west_opt(6 * 3600).unwrap())
                .to_rfc3339(),
            "2026-02-10T09:00:00-06:00"
        );
    }

    #[test]
    fn wall_clock_is_stable_across_dst_change() {
        // Europe/Madrid moves from +01:00 to +02:00 on 2026-03-29.
        let w = SendWindow::parse("09:00", "Europe/Madrid").unwrap();
        assert_eq!(
            w.scheduled_for(d(2026, 3, 28)).unwrap(),
            utc("2026-03-28T08:00:00Z")
        );
        assert_eq!(
            w.scheduled_for(d(2026, 3, 30)).unwrap(),
            utc("2026-03-30T07:00:00Z")
        );
        for due in [d(2026, 3, 28), d(2026, 3, 29), d(2026, 3, 30)] {
            let local = w.scheduled_for(due).unwrap().with_timezone(&w.timezone());
            assert_eq!(local.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
            assert_eq!(local.date_naive(), due);
        }
    }

    #[test]
    fn spring_forward_gap_moves_to_first_valid_minute() {
        // 02:30 does not exist in New York on 2026-03-08; clocks jump to 03:00 EDT.
        let w = SendWindow::parse("02:30", "America/New_York").unwrap();
        assert_eq!(
            w.scheduled_for(d(2026, 3, 8)).unwrap(),
            utc("2026-03-08T03:00:00-04:00")
        );
    }

    #[test]
    fn fall_back_overlap_takes_earlier_instant() {
        // 01:30 happens twice in New York on 2026-11-01; the first is EDT.
        let w = SendWindow::parse("01:30", "America/New_York").unwrap();
        assert_eq!(
            w.scheduled_for(d(2026, 11, 1)).unwrap(),
            utc("2026-11-01T01:30:00-04:00")
        );
    }

    #[test]
    fn skipped_calendar_day_is_an_error() {
        // Samoa jumped from 2011-12-29 to 2011-12-31.
        let w = SendWindow::parse("09:00", "Pacific/Apia").unwrap();
        assert!(matches!(
            w.scheduled_for(d(2011, 12, 30)),
            Err(SchedulerError::UnresolvableLocalTime { .. })
        ));
    }

    #[test]
    fn utc_window_is_plain() {
        let w = SendWindow::parse("23:59", "UTC").unwrap();
        assert_eq!(
            w.scheduled_for(d(2026, 12, 31)).unwrap(),
            utc("2026-12-31T23:59:00Z")
        );
    }

    #[test]
    fn bad_send_time_rejected() {
        for bad in ["25:00", "9am", "", "12:60"] {
            assert!(
                matches!(
                    SendWindow::parse(bad, "UTC"),
                    Err(SchedulerError::InvalidSendTime(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn bad_timezone_rejected() {
        assert!(matches!(
            SendWindow::parse("09:00", "Mars/Olympus_Mons"),
            Err(SchedulerError::InvalidTimezone(_))
        ));
    }
}
