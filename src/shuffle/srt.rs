use anyhow::{Context, Result, bail};

use super::time::Timestamp;

#[derive(Debug, Clone)]
pub struct SrtCue {
    pub start: Timestamp,
    pub end: Timestamp,
    pub text: String,
}

pub fn parse_srt(input: &str) -> Result<Vec<SrtCue>> {
    let mut cues = Vec::new();
    let mut lines = input.trim_start_matches('\u{feff}').lines().peekable();

    while let Some(line) = lines.next() {
        let index_line = line.trim();
        if index_line.is_empty() {
            continue;
        }

        // Some exporters omit the index line entirely
        let times = if index_line.contains("-->") {
            index_line
        } else {
            lines
                .next()
                .map(str::trim)
                .context("SRT cue is missing a timestamp line")?
        };

        let (start_raw, end_raw) = times
            .split_once("-->")
            .map(|(a, b)| (a.trim(), b.trim()))
            .context("SRT cue timestamp line must contain '-->'")?;

        let start = parse_timestamp(start_raw)
            .with_context(|| format!("Failed to parse SRT start timestamp '{start_raw}'"))?;
        let end = parse_timestamp(end_raw)
            .with_context(|| format!("Failed to parse SRT end timestamp '{end_raw}'"))?;

        if end < start {
            bail!("SRT cue ends before it starts: {start_raw} --> {end_raw}");
        }

        let mut text_lines = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() {
                break;
            }
            if let Some(text) = lines.next() {
                text_lines.push(text.trim().to_string());
            }
        }

        cues.push(SrtCue {
            start,
            end,
            text: text_lines.join(" "),
        });
    }

    cues.sort_by_key(|cue| cue.start);
    Ok(cues)
}

/// `HH:MM:SS,mmm`, rounded to the nearest centisecond.
fn parse_timestamp(value: &str) -> Result<Timestamp> {
    let cleaned = value.trim().replace(',', ".");
    let (time_part, fractional_part) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), "0"));

    let mut hms = time_part.split(':');
    let hours = hms
        .next()
        .context("Timestamp missing hours")?
        .parse::<u64>()
        .context("Invalid hours in timestamp")?;
    let minutes = hms
        .next()
        .context("Timestamp missing minutes")?
        .parse::<u64>()
        .context("Invalid minutes in timestamp")?;
    let seconds = hms
        .next()
        .context("Timestamp missing seconds")?
        .parse::<u64>()
        .context("Invalid seconds in timestamp")?;

    if hms.next().is_some() {
        bail!("Timestamp has more than three components: {value}");
    }

    let mut millis_str = fractional_part.to_string();
    if millis_str.len() < 3 {
        millis_str.push_str(&"0".repeat(3 - millis_str.len()));
    }
    let millis = millis_str
        .chars()
        .take(3)
        .collect::<String>()
        .parse::<u64>()
        .context("Invalid millisecond component in timestamp")?;

    let total_seconds = hours * 3600 + minutes * 60 + seconds;
    Ok(Timestamp::from_centis(total_seconds * 100 + (millis + 5) / 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_srt() {
        let input = "1\n00:00:01,000 --> 00:00:03,500\nHello world!\n\n\
                     2\n00:00:04,000 --> 00:00:05,000\nNext line\n";
        let cues = parse_srt(input).expect("parse srt");
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello world!");
        assert_eq!(cues[0].end, Timestamp::from_centis(350));
        assert_eq!(cues[1].start, Timestamp::from_secs(4));
    }

    #[test]
    fn rounds_milliseconds_to_centis() {
        let input = "1\n00:01:02,345 --> 00:01:02,994\n♪\n";
        let cues = parse_srt(input).unwrap();
        assert_eq!(cues[0].start.to_string(), "62.35");
        assert_eq!(cues[0].end.to_string(), "62.99");
    }

    #[test]
    fn tolerates_missing_index_and_multiline_text() {
        let input = "00:00:00,500 --> 00:00:01,000\nfirst\nsecond\n";
        let cues = parse_srt(input).unwrap();
        assert_eq!(cues[0].text, "first second");
    }

    #[test]
    fn rejects_inverted_cue() {
        let input = "1\n00:00:05,000 --> 00:00:04,000\nbackwards\n";
        assert!(parse_srt(input).is_err());
    }
}
