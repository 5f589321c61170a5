//! Rendering schedules back into the issue template.

use chrono::{DateTime, Timelike, Utc};

use super::ParsedSchedule;

/// Link to a timezone converter page for `start`, e.g.
/// `https://savvytime.com/converter/utc/jan-16-2025/2pm`.
pub fn converter_link(start: DateTime<Utc>) -> String {
    let (is_pm, hour12) = start.hour12();
    let suffix = if is_pm { "pm" } else { "am" };
    let clock = if start.minute() == 0 {
        format!("{}{}", hour12, suffix)
    } else {
        format!("{}-{:02}{}", hour12, start.minute(), suffix)
    };

    format!(
        "https://savvytime.com/converter/utc/{}/{}",
        start.format("%b-%-d-%Y").to_string().to_lowercase(),
        clock
    )
}

impl ParsedSchedule {
    /// Render the schedule as the lines an issue author is asked to write.
    pub fn to_issue_snippet(&self) -> String {
        format!(
            "- [{}]({})\n- Duration in minutes\n- {}",
            self.start_time.format("%b %-d, %Y, %H:%M UTC"),
            converter_link(self.start_time),
            self.duration_minutes
        )
    }
}
