//! Finish-time codec.
//!
//! Race times travel as human-entered strings (`MM:SS.mmm` or `HH:MM:SS.mmm`)
//! and are compared as integer millisecond counts. Unparsable input is kept
//! verbatim for display but never takes part in ranking.

/// Result of parsing a finish-time string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTime {
    /// Canonical zero-padded rendering, or the trimmed original when unparsable.
    pub formatted: String,
    /// Total milliseconds, `None` when the input could not be parsed.
    pub milliseconds: Option<i64>,
}

impl ParsedTime {
    fn unparsed(raw: &str) -> Self {
        Self {
            formatted: raw.to_string(),
            milliseconds: None,
        }
    }
}

/// Render a millisecond count as `MM:SS.mmm`, or `HH:MM:SS.mmm` once the
/// duration reaches an hour. Negative input yields an empty string.
pub fn format_finish_time(milliseconds: i64) -> String {
    if milliseconds < 0 {
        return String::new();
    }
    let hours = milliseconds / 3_600_000;
    let minutes = (milliseconds % 3_600_000) / 60_000;
    let seconds = (milliseconds % 60_000) / 1_000;
    let millis = milliseconds % 1_000;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    } else {
        format!("{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// Parse a finish-time string.
///
/// Two colon-separated segments are read as minutes:seconds, three as
/// hours:minutes:seconds; the seconds segment may carry a fractional
/// millisecond part (`.5` means 500 ms). Anything else comes back with
/// `milliseconds: None` and the trimmed original preserved in `formatted`.
pub fn parse_finish_time(input: &str) -> ParsedTime {
    let cleaned = input.trim();
    if cleaned.is_empty() {
        return ParsedTime {
            formatted: String::new(),
            milliseconds: None,
        };
    }

    let parts: Vec<&str> = cleaned.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return ParsedTime::unparsed(cleaned);
    }

    let (hours_str, minutes_str, seconds_part) = if parts.len() == 3 {
        (parts[0], parts[1], parts[2])
    } else {
        ("0", parts[0], parts[1])
    };

    let (seconds_str, millis_str) = match seconds_part.split_once('.') {
        Some((secs, millis)) => (secs, millis),
        None => (seconds_part, "0"),
    };
    // Right-pad to three digits then truncate, so ".5" reads as 500 ms.
    let mut millis_digits = format!("{millis_str:0<3}");
    millis_digits.truncate(3);

    let components = [
        parse_component(hours_str),
        parse_component(minutes_str),
        parse_component(seconds_str),
        parse_component(&millis_digits),
    ];
    let [Some(hours), Some(minutes), Some(seconds), Some(millis)] = components else {
        return ParsedTime::unparsed(cleaned);
    };

    // Checked arithmetic: absurdly large components are unparsable, not a wrap
    let total = hours
        .checked_mul(3_600_000)
        .and_then(|h| minutes.checked_mul(60_000).and_then(|m| h.checked_add(m)))
        .and_then(|hm| seconds.checked_mul(1_000).and_then(|s| hm.checked_add(s)))
        .and_then(|hms| hms.checked_add(millis));
    let Some(total) = total else {
        return ParsedTime::unparsed(cleaned);
    };
    ParsedTime {
        formatted: format_finish_time(total),
        milliseconds: Some(total),
    }
}

fn parse_component(raw: &str) -> Option<i64> {
    let value = raw.parse::<i64>().ok()?;
    (value >= 0).then_some(value)
}
