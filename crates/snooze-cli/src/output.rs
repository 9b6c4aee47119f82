use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use snooze_core::action::ScheduledAction;
use snooze_core::presets::day_name;
use snooze_core::recurrence::{RecurrenceKind, RecurrenceRule};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

// ---------------------------------------------------------------------------
// Human formatting
// ---------------------------------------------------------------------------

/// `Fri 2024-06-07 09:00` in the local zone.
pub fn format_wake(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => format_local(&dt),
        None => format!("@{ms}"),
    }
}

pub fn format_local(dt: &DateTime<Local>) -> String {
    dt.format("%a %Y-%m-%d %H:%M").to_string()
}

/// `in 2h 5m`, `in 3d 4h`, or `overdue 10m`.
pub fn time_left(wake_ms: i64, now_ms: i64) -> String {
    let delta = wake_ms - now_ms;
    let span = compact_span(delta.unsigned_abs() / 1000);
    if delta < 0 {
        format!("overdue {span}")
    } else {
        format!("in {span}")
    }
}

fn compact_span(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    match (days, hours, minutes) {
        (0, 0, 0) => "<1m".to_string(),
        (0, 0, m) => format!("{m}m"),
        (0, h, m) => format!("{h}h {m}m"),
        (d, h, _) => format!("{d}d {h}h"),
    }
}

pub fn describe_rule(rule: &RecurrenceRule) -> String {
    let days = |days: &[u8]| {
        days.iter()
            .map(|d| &day_name(*d)[..3])
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut text = match rule.kind {
        RecurrenceKind::Daily => format!("daily at {}", rule.time),
        RecurrenceKind::Weekdays => format!("weekdays at {}", rule.time),
        RecurrenceKind::Weekly | RecurrenceKind::Custom => {
            format!("{} on {} at {}", rule.kind, days(&rule.days_of_week), rule.time)
        }
        RecurrenceKind::Monthly => format!(
            "monthly on day {} at {}",
            rule.day_of_month.unwrap_or(1),
            rule.time
        ),
        RecurrenceKind::Unknown => "unknown rule".to_string(),
    };
    if let Some(end) = rule.end_date {
        text.push_str(&format!(" until {}", format_wake(end)));
    }
    text
}

pub fn describe_repeat(action: &ScheduledAction) -> String {
    action
        .rule()
        .map(describe_rule)
        .unwrap_or_else(|| "once".to_string())
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_left_formats_spans() {
        assert_eq!(time_left(90 * 60_000, 0), "in 1h 30m");
        assert_eq!(time_left(0, 10 * 60_000), "overdue 10m");
        assert_eq!(time_left(3 * 86_400_000 + 7_200_000, 0), "in 3d 2h");
        assert_eq!(time_left(500, 0), "in <1m");
    }

    #[test]
    fn describes_rules() {
        let weekly = RecurrenceRule::new(RecurrenceKind::Weekly, "09:00").with_days([1, 3]);
        assert_eq!(describe_rule(&weekly), "weekly on Mon, Wed at 09:00");

        let monthly = RecurrenceRule::new(RecurrenceKind::Monthly, "08:15").with_day_of_month(31);
        assert_eq!(describe_rule(&monthly), "monthly on day 31 at 08:15");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("héllo wörld", 5), "héll…");
        assert_eq!(truncate("short", 10), "short");
    }
}
