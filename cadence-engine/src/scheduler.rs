//! Daily tick: a single recurring job owned by the process composition
//! root, with an injected clock. No process-wide singleton.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use cadence_core::{PlannerError, next_local_tick};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fires once per day at a fixed local time (default 00:05). The job runs
/// inline on the tick; a tick that lands while the previous run still holds
/// its planning key is skipped, never queued alongside.
pub struct DailyTick<K: Clock> {
    clock: K,
    tz: Tz,
    hour: u32,
    minute: u32,
}

impl<K: Clock> DailyTick<K> {
    pub fn new(clock: K, tz: Tz) -> Self {
        Self {
            clock,
            tz,
            hour: 0,
            minute: 5,
        }
    }

    pub fn at(mut self, hour: u32, minute: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self
    }

    pub fn next_tick(&self) -> Result<DateTime<Utc>> {
        next_local_tick(self.tz, self.hour, self.minute, self.clock.now_utc())
    }

    /// Run the tick loop forever. `job` is the registered regeneration
    /// closure; its failures are logged and the old plan stays in place.
    pub async fn run<F>(&self, mut job: F) -> Result<()>
    where
        F: FnMut() -> Result<(), PlannerError>,
    {
        loop {
            let next = self.next_tick()?;
            let wait = (next - self.clock.now_utc())
                .to_std()
                .unwrap_or_default();
            info!(next = %next, "daily tick scheduled");
            tokio::time::sleep(wait).await;

            match job() {
                Ok(()) => info!("daily tick regeneration complete"),
                Err(PlannerError::AlreadyRunning(key)) => {
                    warn!(key = %key, "previous regeneration still running; tick skipped");
                }
                Err(e) => error!(error = %e, "daily tick regeneration failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn chicago() -> Tz {
        "America/Chicago".parse().unwrap()
    }

    #[test]
    fn test_default_tick_is_0005_local() {
        // 12:00 UTC Jan 10 = 06:00 local; next 00:05 local is Jan 11.
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap());
        let tick = DailyTick::new(clock, chicago());
        assert_eq!(
            tick.next_tick().unwrap().to_rfc3339(),
            "2026-01-11T06:05:00+00:00"
        );
    }

    #[test]
    fn test_custom_tick_time() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap());
        let tick = DailyTick::new(clock, chicago()).at(9, 30);
        // 09:30 local today is 15:30 UTC, still ahead of 12:00 UTC.
        assert_eq!(
            tick.next_tick().unwrap().to_rfc3339(),
            "2026-01-10T15:30:00+00:00"
        );
    }
}
