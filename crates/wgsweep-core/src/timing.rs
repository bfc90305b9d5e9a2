//! Timing extraction from benchmark program output.
//!
//! All knowledge of how a program reports its runtime lives in
//! [`TimingFormat`]; nothing else in the crate looks at stdout contents.

use serde::{Deserialize, Serialize};

/// How a timing value is located in a program's stdout.
///
/// In TOML: `timing = "last-number"` or `timing = { tagged = "TIME_S=" }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingFormat {
    /// The last token that parses as a finite, non-negative number.
    #[default]
    LastNumber,
    /// The value after the given prefix on the last line that starts with it.
    Tagged(String),
}

impl TimingFormat {
    /// Extract the timing in seconds, or `None` when the output carries none.
    pub fn parse(&self, stdout: &str) -> Option<f64> {
        match self {
            Self::LastNumber => stdout.split(is_token_separator).rev().find_map(parse_seconds),
            Self::Tagged(prefix) => stdout
                .lines()
                .rev()
                .find_map(|line| line.trim_start().strip_prefix(prefix.as_str()))
                .and_then(|rest| parse_seconds(rest.trim())),
        }
    }
}

fn is_token_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | ':' | '=' | '(' | ')' | '[' | ']' | '"' | '\'')
}

fn parse_seconds(token: &str) -> Option<f64> {
    let value: f64 = token.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_number_plain() {
        assert_eq!(TimingFormat::LastNumber.parse("0.125\n"), Some(0.125));
    }

    #[test]
    fn test_last_number_picks_last_token() {
        let out = "Device 0: 1024 compute units\nelapsed time (s): 0.0031\n";
        assert_eq!(TimingFormat::LastNumber.parse(out), Some(0.0031));
    }

    #[test]
    fn test_last_number_skips_trailing_words() {
        let out = "kernel took 2.5e-3 seconds\ndone";
        assert_eq!(TimingFormat::LastNumber.parse(out), Some(2.5e-3));
    }

    #[test]
    fn test_last_number_handles_punctuation() {
        assert_eq!(TimingFormat::LastNumber.parse("time=0.75;"), Some(0.75));
        assert_eq!(TimingFormat::LastNumber.parse("[run] (1.5)"), Some(1.5));
    }

    #[test]
    fn test_last_number_rejects_non_finite_and_negative() {
        assert_eq!(TimingFormat::LastNumber.parse("NaN inf -1.0"), None);
        assert_eq!(TimingFormat::LastNumber.parse("0.5 -1.0"), Some(0.5));
    }

    #[test]
    fn test_last_number_empty_output() {
        assert_eq!(TimingFormat::LastNumber.parse(""), None);
        assert_eq!(TimingFormat::LastNumber.parse("no numbers here"), None);
    }

    #[test]
    fn test_tagged_uses_last_tagged_line() {
        let fmt = TimingFormat::Tagged("TIME_S=".to_string());
        let out = "TIME_S=1.0\nwarmup\nTIME_S=0.25\n42\n";
        assert_eq!(fmt.parse(out), Some(0.25));
    }

    #[test]
    fn test_tagged_is_strict() {
        let fmt = TimingFormat::Tagged("TIME_S=".to_string());
        assert_eq!(fmt.parse("elapsed 0.5\n"), None);
        assert_eq!(fmt.parse("TIME_S=fast\n"), None);
    }

    #[test]
    fn test_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            timing: TimingFormat,
        }
        let w: Wrapper = toml::from_str(r#"timing = "last-number""#).unwrap();
        assert_eq!(w.timing, TimingFormat::LastNumber);
        let w: Wrapper = toml::from_str(r#"timing = { tagged = "T=" }"#).unwrap();
        assert_eq!(w.timing, TimingFormat::Tagged("T=".to_string()));
    }
}
