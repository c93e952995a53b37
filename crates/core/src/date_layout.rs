use crate::config::Placement;
use crate::error::RenamerError;
use chrono::{DateTime, Datelike, TimeZone, Timelike};

const SUFFIX_MARKER: &str = "suffix";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutPart {
    Literal(String),
    Token(DateToken),
}

/// A date format such as `Y-M-D_hms`, where `Y M D h m s f` are calendar
/// fields and every other character is copied through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLayout {
    parts: Vec<LayoutPart>,
}

impl DateLayout {
    pub fn parse(input: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();

        for ch in input.chars() {
            match token_for(ch) {
                Some(token) => {
                    if !literal.is_empty() {
                        parts.push(LayoutPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(LayoutPart::Token(token));
                }
                None => literal.push(ch),
            }
        }

        if !literal.is_empty() {
            parts.push(LayoutPart::Literal(literal));
        }

        Self { parts }
    }

    pub fn parts(&self) -> &[LayoutPart] {
        &self.parts
    }

    pub fn render<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> String {
        let mut output = String::new();
        for part in &self.parts {
            match part {
                LayoutPart::Literal(s) => output.push_str(s),
                LayoutPart::Token(token) => {
                    let value = match token {
                        DateToken::Year => format!("{:04}", time.year()),
                        DateToken::Month => format!("{:02}", time.month()),
                        DateToken::Day => format!("{:02}", time.day()),
                        DateToken::Hour => format!("{:02}", time.hour()),
                        DateToken::Minute => format!("{:02}", time.minute()),
                        DateToken::Second => format!("{:02}", time.second()),
                        // leap-second nanos roll past 999ms
                        DateToken::Millisecond => {
                            format!("{:03}", (time.nanosecond() / 1_000_000).min(999))
                        }
                    };
                    output.push_str(&value);
                }
            }
        }
        output
    }
}

/// The `--created-date` value: a layout plus where the rendered date goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateStamp {
    pub layout: DateLayout,
    pub placement: Placement,
}

impl DateStamp {
    /// `suffixY-M-D` appends the date, anything else prepends it.
    pub fn parse(value: &str) -> Result<Option<Self>, RenamerError> {
        if value.is_empty() {
            return Ok(None);
        }

        let (placement, layout) = match value.strip_prefix(SUFFIX_MARKER) {
            Some(rest) => (Placement::Suffix, rest),
            None => (Placement::Prefix, value),
        };
        if layout.is_empty() {
            return Err(RenamerError::EmptyDateLayout);
        }

        Ok(Some(Self {
            layout: DateLayout::parse(layout),
            placement,
        }))
    }
}

fn token_for(ch: char) -> Option<DateToken> {
    match ch {
        'Y' => Some(DateToken::Year),
        'M' => Some(DateToken::Month),
        'D' => Some(DateToken::Day),
        'h' => Some(DateToken::Hour),
        'm' => Some(DateToken::Minute),
        's' => Some(DateToken::Second),
        'f' => Some(DateToken::Millisecond),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn reference_time() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2006, 1, 2)
            .and_then(|d| d.and_hms_milli_opt(15, 4, 5, 0))
            .expect("valid reference time")
            .and_utc()
    }

    #[test]
    fn renders_reference_layouts() {
        let cases = [
            ("Y-M-D", "2006-01-02"),
            ("Y-M-D h:m:s", "2006-01-02 15:04:05"),
            ("YMD_hms", "20060102_150405"),
            ("YMD_hms.f", "20060102_150405.000"),
        ];
        for (layout, expected) in cases {
            assert_eq!(
                DateLayout::parse(layout).render(&reference_time()),
                expected,
                "layout {layout}"
            );
        }
    }

    #[test]
    fn unknown_characters_pass_through() {
        let layout = DateLayout::parse("at Y!");
        assert_eq!(
            layout.parts(),
            &[
                LayoutPart::Literal("at ".to_string()),
                LayoutPart::Token(DateToken::Year),
                LayoutPart::Literal("!".to_string()),
            ]
        );
        assert_eq!(layout.render(&reference_time()), "at 2006!");
    }

    #[test]
    fn milliseconds_are_zero_padded() {
        let time = NaiveDate::from_ymd_opt(2024, 12, 31)
            .and_then(|d| d.and_hms_milli_opt(23, 59, 58, 7))
            .expect("valid time")
            .and_utc();
        assert_eq!(DateLayout::parse("s.f").render(&time), "58.007");
    }

    #[test]
    fn stamp_placement_follows_suffix_marker() {
        let prefix = DateStamp::parse("Y-M-D").expect("parse").expect("some");
        assert_eq!(prefix.placement, Placement::Prefix);

        let suffix = DateStamp::parse("suffixYMD").expect("parse").expect("some");
        assert_eq!(suffix.placement, Placement::Suffix);
        assert_eq!(suffix.layout, DateLayout::parse("YMD"));

        assert!(DateStamp::parse("").expect("empty is allowed").is_none());
        assert!(matches!(
            DateStamp::parse("suffix"),
            Err(RenamerError::EmptyDateLayout)
        ));
    }
}
