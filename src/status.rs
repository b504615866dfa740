use std::time::{Duration, Instant};

use poise::serenity_prelude::{self as serenity, Activity};
use tracing::debug;

pub(crate) const STATUS_INTERVAL: Duration = Duration::from_secs(45);

/// Formats an uptime as `DD:HH:MM.SS`.
pub(crate) fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    format!("{:02}:{:02}:{:02}.{:02}", days, hours, minutes, seconds)
}

pub(crate) fn status_text(prefix: &str, uptime: Duration) -> String {
    format!("{}help for {}", prefix, format_uptime(uptime))
}

pub(crate) async fn refresh(ctx: &serenity::Context, prefix: &str, started: Instant) {
    let text = status_text(prefix, started.elapsed());
    debug!("Setting presence to {:?}", text);
    ctx.set_activity(Activity::playing(text)).await;
}

/// Keeps the presence string current for as long as the process lives.
pub(crate) fn spawn_refresher(ctx: serenity::Context, prefix: String, started: Instant) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATUS_INTERVAL);
        loop {
            ticker.tick().await;
            refresh(&ctx, &prefix, started).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_uptime() {
        assert_eq!(format_uptime(Duration::ZERO), "00:00:00.00");
    }

    #[test]
    fn every_field_is_padded() {
        let uptime = Duration::from_secs(86_400 + 2 * 3_600 + 3 * 60 + 4);

        assert_eq!(format_uptime(uptime), "01:02:03.04");
    }

    #[test]
    fn sub_second_part_is_dropped() {
        assert_eq!(format_uptime(Duration::from_millis(59_999)), "00:00:00.59");
    }

    #[test]
    fn days_grow_past_two_digits() {
        let uptime = Duration::from_secs(123 * 86_400 + 23 * 3_600 + 59 * 60 + 59);

        assert_eq!(format_uptime(uptime), "123:23:59.59");
    }

    #[test]
    fn status_mentions_help_command() {
        assert_eq!(
            status_text("m!", Duration::from_secs(61)),
            "m!help for 00:00:01.01"
        );
    }
}
