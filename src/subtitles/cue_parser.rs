//! Best-effort parser for WebVTT-style cue documents.

use log::warn;

/// One timed subtitle fragment. `end > start` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Parses a cue document into cues in document order.
///
/// The header is everything before the first `-->` line. Each cue is a
/// `start --> end [settings]` line followed by non-blank text lines. Malformed
/// timing lines and cues without text are skipped and logged.
pub fn parse_cues(document: &str) -> Vec<SubtitleCue> {
    let document = document.replace('\r', "");
    let lines: Vec<&str> = document.lines().collect();
    let mut cues = Vec::new();
    let mut index = lines
        .iter()
        .position(|line| line.contains("-->"))
        .unwrap_or(lines.len());

    while index < lines.len() {
        let line = lines[index].trim();
        index += 1;
        if !line.contains("-->") {
            continue;
        }

        let mut text_lines = Vec::new();
        while index < lines.len() && !lines[index].trim().is_empty() {
            text_lines.push(lines[index].trim());
            index += 1;
        }

        let Some((start, end)) = parse_timing_line(line) else {
            warn!("SubtitleParser: skipping malformed timing line '{}'", line);
            continue;
        };
        if end <= start {
            warn!(
                "SubtitleParser: skipping cue with end {:.3} not after start {:.3}",
                end, start
            );
            continue;
        }
        if text_lines.is_empty() {
            warn!("SubtitleParser: skipping cue at {:.3} without text", start);
            continue;
        }
        cues.push(SubtitleCue {
            start,
            end,
            text: text_lines.join("\n"),
        });
    }
    cues
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    // Cue settings such as `align:start` follow the end timestamp.
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// Converts `HH:MM:SS.mmm` or `MM:SS.mmm` to seconds. A comma is accepted as
/// the fraction separator.
pub fn parse_timestamp(timestamp: &str) -> Option<f64> {
    let timestamp = timestamp.replace(',', ".");
    let parts: Vec<&str> = timestamp.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [hours, minutes, seconds] => (parse_whole(hours)?, parse_whole(minutes)?, *seconds),
        [minutes, seconds] => (0, parse_whole(minutes)?, *seconds),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    let seconds: f64 = seconds.parse().ok()?;
    if !seconds.is_finite() || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

fn parse_whole(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Text of the cue active at `time`, or an empty string.
///
/// A cue covers `[start, end)`. When no cue covers `time` that way, a cue
/// ending exactly at `time` is used, so a shared boundary belongs to the
/// later cue while the final cue still shows at its own end.
pub fn active_cue_at(cues: &[SubtitleCue], time: f64) -> &str {
    if !time.is_finite() {
        return "";
    }
    cues.iter()
        .find(|cue| cue.start <= time && time < cue.end)
        .or_else(|| cues.iter().find(|cue| cue.end == time))
        .map_or("", |cue| cue.text.as_str())
}
