//! Time utilities: timezone-aware planning day and daily tick computation.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// The planning day for `now_utc` in an IANA tz like "America/Chicago".
pub fn local_today(tz: Tz, now_utc: DateTime<Utc>) -> NaiveDate {
    now_utc.with_timezone(&tz).date_naive()
}

/// Next occurrence of `hour:minute` local time strictly after `now_utc`,
/// returned in UTC. Skips forward over DST gaps.
pub fn next_local_tick(
    tz: Tz,
    hour: u32,
    minute: u32,
    now_utc: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let local_now = now_utc.with_timezone(&tz);
    let today = local_now.date_naive();

    for offset in 0..3 {
        let day = today + Duration::days(offset);
        let Some(naive) = day.and_hms_opt(hour, minute, 0) else {
            anyhow::bail!("invalid tick time {hour:02}:{minute:02}");
        };
        if let Some(local) = tz.from_local_datetime(&naive).earliest() {
            let utc = local.with_timezone(&Utc);
            if utc > now_utc {
                return Ok(utc);
            }
        }
    }

    anyhow::bail!("no valid tick within 3 days for {hour:02}:{minute:02} {tz}")
}
