use std::time::Duration;

/// Allowed send times: a minute-of-day range on a weekday mask.
///
/// The range is half-open (`start..end`). Day indices are 0 = Monday
/// through 6 = Sunday, matching `chrono::Weekday::num_days_from_monday`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingWindow {
    pub start_minute: u16,
    pub end_minute: u16,
    pub days: [bool; 7],
}

impl WorkingWindow {
    /// A window that never closes. Used when no window is configured.
    pub fn always_open() -> Self {
        WorkingWindow {
            start_minute: 0,
            end_minute: MINUTES_PER_DAY,
            days: [true; 7],
        }
    }

    /// True if any configured day has a non-empty open range.
    pub fn ever_opens(&self) -> bool {
        self.start_minute < self.end_minute && self.days.iter().any(|open| *open)
    }

    pub fn is_open(&self, weekday: usize, minute_of_day: u16) -> bool {
        self.days.get(weekday).copied().unwrap_or(false)
            && (self.start_minute..self.end_minute).contains(&minute_of_day)
    }

    /// Minutes until the window next opens, 0 when already open.
    /// Returns `None` when the window never opens.
    pub fn minutes_until_open(&self, weekday: usize, minute_of_day: u16) -> Option<u32> {
        if !self.ever_opens() {
            return None;
        }
        if self.is_open(weekday, minute_of_day) {
            return Some(0);
        }
        // Walk forward a week at most; ever_opens guarantees a hit.
        let mut day = weekday % 7;
        let mut minute = minute_of_day;
        let mut elapsed: u32 = 0;
        for _ in 0..=7 {
            if self.days[day] && minute < self.start_minute {
                return Some(elapsed + u32::from(self.start_minute - minute));
            }
            elapsed += u32::from(MINUTES_PER_DAY - minute);
            minute = 0;
            day = (day + 1) % 7;
            if self.days[day] {
                return Some(elapsed + u32::from(self.start_minute));
            }
        }
        None
    }
}

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Retry behavior for a single contact's send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per contact, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per further attempt.
    pub base_backoff: Duration,
    /// Extra multiplier applied when the failure was a rate limit.
    pub rate_limit_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_secs(5),
            rate_limit_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Backoff after a failed attempt numbered from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << doublings)
    }

    /// Backoff after a rate-limited attempt.
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        self.backoff(attempt)
            .saturating_mul(self.rate_limit_multiplier.max(1))
    }
}

/// Per-identity daily send allowance. A limit of 0 means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyQuota {
    limit: u32,
    sent: u32,
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        DailyQuota { limit, sent: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit != 0 && self.sent >= self.limit
    }

    /// Counts one delivered message against the quota.
    pub fn record_send(&mut self) {
        self.sent = self.sent.saturating_add(1);
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn remaining(&self) -> Option<u32> {
        (self.limit != 0).then(|| self.limit.saturating_sub(self.sent))
    }
}
