//! SubRip (`.srt`) and WebVTT (`.vtt`) cue parsing.
//!
//! # Format
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:02,500
//! 今日はいい天気ですね
//! ```
//!
//! Blocks are separated by blank lines. Multi-line cue text is joined with a
//! single space. Blocks without a valid timing line are skipped.

use crate::types::Cue;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_string_lossy().to_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }
}

/// Parse subtitle content into timed cues.
///
/// Both formats share the block layout; only the millisecond separator and
/// the VTT header differ, and both are accepted either way.
pub fn parse(content: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            push_block(&block, &mut cues);
            block.clear();
        } else {
            block.push(line);
        }
    }
    push_block(&block, &mut cues);

    cues
}

fn push_block(block: &[&str], cues: &mut Vec<Cue>) {
    let Some(timing_idx) = block.iter().position(|l| l.contains("-->")) else {
        return;
    };
    let Some((start, end)) = parse_timing(block[timing_idx]) else {
        return;
    };
    let text = block[timing_idx + 1..]
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        return;
    }
    cues.push(Cue::timed(text, start, end));
}

fn parse_timing(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    // VTT cue settings may follow the end timestamp.
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// `hh:mm:ss,mmm`, `hh:mm:ss.mmm` or `mm:ss.mmm` to seconds.
fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.replace(',', ".");
    let parts: Vec<&str> = s.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, sec] => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?, *sec),
        [m, sec] => (0, m.parse::<u32>().ok()?, *sec),
        _ => return None,
    };
    let seconds: f64 = seconds.parse().ok()?;
    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}
