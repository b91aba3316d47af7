//! Progress extraction from the encoder's diagnostic stream.
//!
//! ffmpeg prints the input duration once (`Duration: 00:01:30.45, start: ...`)
//! and then periodic status lines such as
//! `frame=  240 fps= 48 q=28.0 size=    1024kB time=00:00:10.00 bitrate= 838.9kbits/s speed=2.01x`.

use std::time::Duration;

use super::types::ProgressInfo;

/// Stateful parser fed one diagnostic line at a time.
#[derive(Debug, Default)]
pub struct ProgressParser {
    duration: Option<Duration>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Returns a sample for every `time=` line seen after the duration is known.
    pub fn feed(&mut self, line: &str) -> Option<ProgressInfo> {
        if self.duration.is_none() && line.contains("Duration:") {
            self.duration = parse_duration(line).filter(|d| !d.is_zero());
        }

        let duration = self.duration?;
        if !line.contains("time=") {
            return None;
        }

        let current = parse_current_time(line).filter(|c| !c.is_zero())?;
        let percentage = (current.as_secs_f64() / duration.as_secs_f64() * 100.0).min(100.0);

        Some(ProgressInfo {
            percentage,
            duration,
            current,
            speed: token_value(line, "speed="),
            bitrate: token_value(line, "bitrate="),
        })
    }
}

/// Extracts the value of `Duration: HH:MM:SS.xx,` from a line.
pub fn parse_duration(line: &str) -> Option<Duration> {
    let (_, rest) = line.split_once("Duration:")?;
    let value = rest.split(',').next()?.trim();
    parse_time_string(value)
}

/// Extracts the value of `time=HH:MM:SS.xx` from a line.
pub fn parse_current_time(line: &str) -> Option<Duration> {
    let value = token_value(line, "time=");
    parse_time_string(&value)
}

fn token_value(line: &str, token: &str) -> String {
    match line.split_once(token) {
        Some((_, rest)) => rest
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    }
}

/// Parses `HH:MM:SS[.fraction]`. The fraction is read as milliseconds,
/// padded or truncated to three digits.
pub fn parse_time_string(value: &str) -> Option<Duration> {
    let mut parts = value.split(':');
    let (hours, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let hours: u64 = hours.trim().parse().ok()?;
    let minutes: u64 = minutes.trim().parse().ok()?;

    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };
    let seconds: u64 = whole.trim().parse().ok()?;

    let millis = match fraction {
        Some(fraction) => {
            let mut digits: String = fraction.chars().take(3).collect();
            while digits.len() < 3 {
                digits.push('0');
            }
            digits.parse::<u64>().ok()?
        }
        None => 0,
    };

    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    Some(Duration::from_secs(total) + Duration::from_millis(millis))
}

/// Formats as `HH:MM:SS.mmm`, the inverse of [`parse_time_string`].
pub fn format_time_string(value: Duration) -> String {
    let total = value.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        value.subsec_millis()
    )
}
