use std::time::Duration;

use tracing::{info, instrument};

#[instrument]
pub fn display_elapsed_time(duration: Duration) {
    info!("{}", elapsed_message(duration));
}

pub fn elapsed_message(duration: Duration) -> String {
    format!("Crawl ended after {}", format_elapsed(duration))
}

pub fn format_elapsed(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms >= 60000 {
        let mins = total_ms / 60000;
        let secs = (total_ms % 60000) / 1000;
        let ms_remaining = total_ms % 1000;

        if ms_remaining > 0 {
            format!("{}m {}s {}ms", mins, secs, ms_remaining)
        } else {
            format!("{}m {}s", mins, secs)
        }
    } else if total_ms >= 1000 {
        let secs = total_ms / 1000;
        let ms_remaining = total_ms % 1000;

        if ms_remaining > 0 {
            format!("{}s {}ms", secs, ms_remaining)
        } else {
            format!("{}s", secs)
        }
    } else {
        format!("{}ms", total_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(3000)), "3s");
        assert_eq!(format_elapsed(Duration::from_millis(3042)), "3s 42ms");
        assert_eq!(format_elapsed(Duration::from_millis(125_000)), "2m 5s");
        assert_eq!(format_elapsed(Duration::from_millis(125_007)), "2m 5s 7ms");
    }

    #[test]
    fn elapsed_message_does_not_claim_success() {
        let message = elapsed_message(Duration::from_millis(1500));
        assert_eq!(message, "Crawl ended after 1s 500ms");
        assert!(!message.contains("Finished"));
    }
}
