use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

use crate::app::App;
use crate::pipeline::CompanySelection;

/// Next instant strictly after `now` at `hour`:00 local time.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32, tz: &FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(tz);
    let today = local.date_naive();
    let candidate = at_local_hour(today, hour, tz);
    if candidate > now {
        candidate
    } else {
        at_local_hour(today + chrono::Duration::days(1), hour, tz)
    }
}

/// Next instant strictly after `now` that falls on `weekday` at `hour`:00 local time.
pub fn next_weekly_run(
    now: DateTime<Utc>,
    weekday: Weekday,
    hour: u32,
    tz: &FixedOffset,
) -> DateTime<Utc> {
    let today = now.with_timezone(tz).date_naive();
    let ahead = (7 + weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let candidate = at_local_hour(today + chrono::Duration::days(ahead), hour, tz);
    if candidate > now {
        candidate
    } else {
        candidate + chrono::Duration::days(7)
    }
}

fn at_local_hour(day: NaiveDate, hour: u32, tz: &FixedOffset) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let naive = day.and_time(time) - chrono::Duration::seconds(tz.local_minus_utc() as i64);
    Utc.from_utc_datetime(&naive)
}

async fn sleep_until(at: DateTime<Utc>) {
    let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    tokio::time::sleep(wait).await;
}

/// Run collection, daily and weekly jobs until the process is stopped.
/// A failed job is logged and the loop waits for its next slot.
pub async fn run(app: &App) {
    let config = app.config();
    let tz = app.timezone();
    tracing::info!(
        interval_minutes = config.collection_interval_minutes,
        daily_hour = config.daily_report_hour,
        weekly_hour = config.weekly_report_hour,
        "Scheduler started"
    );

    let collection = async {
        let period = Duration::from_secs(u64::from(config.collection_interval_minutes.max(1)) * 60);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match app.collect(CompanySelection::All).await {
                Ok(summary) => tracing::info!(
                    run_id = %summary.run_id,
                    articles = summary.articles_produced,
                    "Scheduled collection finished"
                ),
                Err(e) => tracing::error!(error = %e, "Scheduled collection failed"),
            }
        }
    };

    let daily = async {
        loop {
            let at = next_daily_run(Utc::now(), config.daily_report_hour, &tz);
            tracing::debug!(at = %at, "Next daily report");
            sleep_until(at).await;
            let yesterday = Utc::now().with_timezone(&tz).date_naive() - chrono::Duration::days(1);
            if let Err(e) = app.send_daily(yesterday).await {
                tracing::error!(error = %e, day = %yesterday, "Scheduled daily report failed");
            }
        }
    };

    let weekly = async {
        loop {
            let at = next_weekly_run(Utc::now(), Weekday::Sun, config.weekly_report_hour, &tz);
            tracing::debug!(at = %at, "Next weekly report");
            sleep_until(at).await;
            // Any day of the previous Sunday-Saturday week selects that week.
            let last_week = Utc::now().with_timezone(&tz).date_naive() - chrono::Duration::days(1);
            if let Err(e) = app.send_weekly(last_week).await {
                tracing::error!(error = %e, week_of = %last_week, "Scheduled weekly report failed");
            }
        }
    };

    tokio::join!(collection, daily, weekly);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn daily_run_later_today() {
        // 07:30 local
        let next = next_daily_run(utc("2026-05-12T22:30:00Z"), 9, &kst());
        assert_eq!(next, utc("2026-05-13T00:00:00Z"));
    }

    #[test]
    fn daily_run_rolls_to_tomorrow_once_passed() {
        // exactly 09:00 local is not "after now"
        let next = next_daily_run(utc("2026-05-13T00:00:00Z"), 9, &kst());
        assert_eq!(next, utc("2026-05-14T00:00:00Z"));
    }

    #[test]
    fn weekly_run_targets_coming_sunday() {
        // Wednesday 2026-05-13 local
        let next = next_weekly_run(utc("2026-05-13T03:00:00Z"), Weekday::Sun, 10, &kst());
        assert_eq!(next, utc("2026-05-17T01:00:00Z"));
    }

    #[test]
    fn weekly_run_on_sunday_after_the_hour_waits_a_week() {
        // Sunday 2026-05-17 at 11:00 local
        let next = next_weekly_run(utc("2026-05-17T02:00:00Z"), Weekday::Sun, 10, &kst());
        assert_eq!(next, utc("2026-05-24T01:00:00Z"));

        // Same Sunday at 09:00 local still fires today
        let next = next_weekly_run(utc("2026-05-17T00:00:00Z"), Weekday::Sun, 10, &kst());
        assert_eq!(next, utc("2026-05-17T01:00:00Z"));
    }
}
