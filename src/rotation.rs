use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

const OPENS_SUNDAY_AT: u32 = 17 * 60;
const CLOSES_THURSDAY_AFTER: u32 = 21 * 60 + 50;

/// Weekly window in which members may switch clubs: Sunday 17:00 through
/// Thursday 21:50, both minutes inclusive, read on one fixed server offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationWindow {
    offset: FixedOffset,
}

impl RotationWindow {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        let local = self.local_time(at);
        let minute_of_day = local.hour() * 60 + local.minute();
        match local.weekday() {
            Weekday::Sun => minute_of_day >= OPENS_SUNDAY_AT,
            Weekday::Mon | Weekday::Tue | Weekday::Wed => true,
            Weekday::Thu => minute_of_day <= CLOSES_THURSDAY_AFTER,
            Weekday::Fri | Weekday::Sat => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2024-01-04 is a Thursday, 2024-01-07 a Sunday.
    fn utc(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, s).unwrap()
    }

    fn window() -> RotationWindow {
        RotationWindow::new(FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn thursday_closes_after_twenty_one_fifty() {
        assert!(window().is_open(utc(4, 21, 50, 0)));
        assert!(window().is_open(utc(4, 21, 50, 59)));
        assert!(!window().is_open(utc(4, 21, 51, 0)));
    }

    #[test]
    fn sunday_opens_at_seventeen() {
        assert!(!window().is_open(utc(7, 16, 59, 59)));
        assert!(window().is_open(utc(7, 17, 0, 0)));
    }

    #[test]
    fn weekend_is_closed_and_midweek_is_open() {
        assert!(!window().is_open(utc(5, 9, 0, 0)));
        assert!(!window().is_open(utc(6, 23, 59, 0)));
        assert!(window().is_open(utc(1, 0, 0, 0)));
        assert!(window().is_open(utc(3, 23, 59, 0)));
    }

    #[test]
    fn window_is_read_on_the_server_offset() {
        let east8 = RotationWindow::new(FixedOffset::east_opt(8 * 3600).unwrap());
        // 13:50 UTC Thursday is 21:50 at +08:00
        assert!(east8.is_open(utc(4, 13, 50, 0)));
        assert!(!east8.is_open(utc(4, 13, 51, 0)));
        // 09:00 UTC Sunday is 17:00 at +08:00
        assert!(east8.is_open(utc(7, 9, 0, 0)));
        assert!(!east8.is_open(utc(7, 8, 59, 0)));
    }
}
