//! Parsing of user-supplied times, durations, and day lists.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Parse an absolute time.
///
/// Accepted forms:
/// - RFC 3339 (`2024-06-07T09:00:00+02:00`)
/// - `YYYY-MM-DD HH:MM` or `YYYY-MM-DDTHH:MM`, local time
/// - `YYYY-MM-DD`, local midnight
/// - `HH:MM`, today, or tomorrow if that time has already passed
pub fn parse_at(input: &str, now: &DateTime<Local>) -> anyhow::Result<DateTime<Local>> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Local));
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local(naive, input);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local(date.and_time(NaiveTime::MIN), input);
    }
    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        let today = local(now.date_naive().and_time(time), input)?;
        if today > *now {
            return Ok(today);
        }
        let tomorrow = now
            .date_naive()
            .succ_opt()
            .ok_or_else(|| anyhow!("date out of range"))?;
        return local(tomorrow.and_time(time), input);
    }
    bail!("cannot parse '{input}' as a time (try 'YYYY-MM-DD HH:MM', 'HH:MM', or RFC 3339)")
}

/// End of a recurrence: a bare date means "through the end of that day".
pub fn parse_until(input: &str, now: &DateTime<Local>) -> anyhow::Result<DateTime<Local>> {
    if let Ok(date) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        let next = date
            .succ_opt()
            .ok_or_else(|| anyhow!("date out of range"))?;
        return local(next.and_time(NaiveTime::MIN), input);
    }
    parse_at(input, now)
}

fn local(naive: NaiveDateTime, input: &str) -> anyhow::Result<DateTime<Local>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("'{input}' does not exist in the local time zone"))
}

/// Parse a relative duration such as `90m`, `2h30m`, `1d`, or `45s`.
pub fn parse_duration(input: &str) -> anyhow::Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: i64 = digits
            .parse()
            .with_context(|| format!("invalid duration '{input}'"))?;
        digits.clear();
        let part = match c {
            'w' => Duration::try_weeks(n),
            'd' => Duration::try_days(n),
            'h' => Duration::try_hours(n),
            'm' => Duration::try_minutes(n),
            's' => Duration::try_seconds(n),
            other => bail!("unknown unit '{other}' in duration '{input}' (use w, d, h, m, s)"),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| anyhow!("duration '{input}' is out of range"))?;
    }
    if !digits.is_empty() {
        bail!("duration '{input}' is missing a unit (e.g. '{digits}m')");
    }
    Ok(total)
}

/// Parse weekday names or indices (0 = Sunday) into sorted indices.
pub fn parse_days(items: &[String]) -> anyhow::Result<Vec<u8>> {
    let mut days = Vec::new();
    for item in items {
        let item = item.trim().to_ascii_lowercase();
        if item.is_empty() {
            continue;
        }
        let day = match item.as_str() {
            "sun" | "sunday" => 0,
            "mon" | "monday" => 1,
            "tue" | "tues" | "tuesday" => 2,
            "wed" | "wednesday" => 3,
            "thu" | "thur" | "thurs" | "thursday" => 4,
            "fri" | "friday" => 5,
            "sat" | "saturday" => 6,
            other => match other.parse::<u8>() {
                Ok(n) if n <= 6 => n,
                _ => bail!("unknown day '{other}' (use mon..sun or 0-6, 0 = Sunday)"),
            },
        };
        days.push(day);
    }
    days.sort_unstable();
    days.dedup();
    Ok(days)
}
