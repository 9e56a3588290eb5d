//! Engine configuration and locale-aware number formatting

use chrono::{Datelike, Timelike};

use crate::functions::date::datetime_from_serial;
use crate::value::format_number;

/// Default limit on nested formula-cell evaluation
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Options fixed when a [`FormulaEngine`](crate::FormulaEngine) is built
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// How many formula cells may be on the evaluation stack at once
    pub max_depth: usize,
    pub locale: Locale,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            locale: Locale::default(),
        }
    }
}

/// Separators and date conventions used by `TEXT`, `FIXED` and number display
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Locale {
    pub decimal_separator: char,
    pub thousands_separator: char,
    /// Pattern used by `TEXT(x, "General Date")`-style callers and the CLI
    pub date_format: String,
    /// Count serials from 1904-01-01 instead of 1900-01-01
    pub date_1904: bool,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            thousands_separator: ',',
            date_format: "yyyy-mm-dd".to_string(),
            date_1904: false,
        }
    }
}

impl Locale {
    /// Round to `decimals` places (negative rounds left of the point) with optional grouping
    pub fn format_fixed(&self, value: f64, decimals: i32, grouping: bool) -> String {
        let factor = 10f64.powi(decimals);
        let scaled = value * factor;
        let rounded = if scaled.is_finite() { scaled.round() / factor } else { value };
        let places = decimals.max(0) as usize;
        let text = format!("{:.*}", places, rounded.abs());
        let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, ""));

        let mut out = String::new();
        if rounded < 0.0 {
            out.push('-');
        }
        if grouping {
            out.push_str(&self.group(int_part));
        } else {
            out.push_str(int_part);
        }
        if !frac_part.is_empty() {
            out.push(self.decimal_separator);
            out.push_str(frac_part);
        }
        out
    }

    fn group(&self, digits: &str) -> String {
        let len = digits.len();
        let mut out = String::with_capacity(len + len / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                out.push(self.thousands_separator);
            }
            out.push(ch);
        }
        out
    }

    /// Render `value` with a spreadsheet number format such as `0.00`,
    /// `#,##0`, `0%`, `0.00E+00` or a date pattern like `yyyy-mm-dd hh:mm`
    ///
    /// Returns `None` when a date pattern is applied to a serial outside the
    /// supported calendar.
    pub fn format_pattern(&self, value: f64, pattern: &str, date_1904: bool) -> Option<String> {
        if pattern.is_empty() || pattern.eq_ignore_ascii_case("General") {
            return Some(format_number(value));
        }
        if is_date_pattern(pattern) {
            return self.format_date(value, pattern, date_1904);
        }
        Some(self.format_numeric(value, pattern))
    }

    fn format_numeric(&self, value: f64, pattern: &str) -> String {
        let exponent_at = pattern.find(|c| c == 'E' || c == 'e').unwrap_or(pattern.len());
        let first = pattern[..exponent_at].find(|c| matches!(c, '0' | '#' | '.'));
        let last = pattern[..exponent_at].rfind(|c| matches!(c, '0' | '#' | '.' | ','));
        let (prefix, body, suffix) = match (first, last) {
            (Some(first), Some(last)) if first <= last => {
                (&pattern[..first], &pattern[first..=last], &pattern[last + 1..])
            }
            _ => return pattern.to_string(),
        };

        let value = if suffix.contains('%') { value * 100.0 } else { value };
        let decimals = body
            .split_once('.')
            .map_or(0, |(_, frac)| frac.chars().filter(|c| matches!(c, '0' | '#')).count());

        let upper = suffix.to_ascii_uppercase();
        if upper.starts_with("E+") || upper.starts_with("E-") {
            let exponent_digits = suffix[2..].chars().take_while(|c| *c == '0').count();
            let formatted = format!("{:.*E}", decimals, value);
            let (mantissa, exponent) = formatted.split_once('E').unwrap_or((&formatted, "0"));
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            let mantissa = mantissa.replace('.', &self.decimal_separator.to_string());
            return format!(
                "{}{}E{}{:0width$}{}",
                prefix,
                mantissa,
                sign,
                exponent.abs(),
                &suffix[2 + exponent_digits..],
                width = exponent_digits.max(1)
            );
        }

        let rendered = self.format_fixed(value, decimals as i32, body.contains(','));
        format!("{}{}{}", prefix, rendered, suffix)
    }

    fn format_date(&self, serial: f64, pattern: &str, date_1904: bool) -> Option<String> {
        let dt = datetime_from_serial(serial, date_1904)?;
        let lower = pattern.to_ascii_lowercase();
        let chars: Vec<char> = lower.chars().collect();
        let has_ampm = lower.contains("am/pm");
        let mut out = String::new();
        let mut i = 0;
        let mut last_was_hour = false;

        while i < chars.len() {
            let c = chars[i];
            if lower[byte_index(&chars, i)..].starts_with("am/pm") {
                out.push_str(if dt.hour() < 12 { "AM" } else { "PM" });
                i += 5;
                continue;
            }
            let run = chars[i..].iter().take_while(|&&x| x == c).count();
            match c {
                'y' => {
                    if run <= 2 {
                        out.push_str(&format!("{:02}", dt.year() % 100));
                    } else {
                        out.push_str(&format!("{:04}", dt.year()));
                    }
                }
                'm' => {
                    let next_is_seconds = chars[i + run..]
                        .iter()
                        .find(|x| x.is_alphabetic())
                        .map_or(false, |x| *x == 's');
                    if (last_was_hour || next_is_seconds) && run <= 2 {
                        out.push_str(&pad(dt.minute(), run));
                    } else {
                        match run {
                            1 | 2 => out.push_str(&pad(dt.month(), run)),
                            3 => out.push_str(&dt.format("%b").to_string()),
                            _ => out.push_str(&dt.format("%B").to_string()),
                        }
                    }
                }
                'd' => match run {
                    1 | 2 => out.push_str(&pad(dt.day(), run)),
                    3 => out.push_str(&dt.format("%a").to_string()),
                    _ => out.push_str(&dt.format("%A").to_string()),
                },
                'h' => {
                    let hour = if has_ampm {
                        match dt.hour() % 12 {
                            0 => 12,
                            h => h,
                        }
                    } else {
                        dt.hour()
                    };
                    out.push_str(&pad(hour, run));
                }
                's' => out.push_str(&pad(dt.second(), run)),
                '"' => {
                    let literal: String =
                        chars[i + 1..].iter().take_while(|&&x| x != '"').collect();
                    i += literal.chars().count() + 2;
                    out.push_str(&literal);
                    continue;
                }
                _ => {
                    let original = pattern.chars().nth(i).unwrap_or(c);
                    for _ in 0..run {
                        out.push(original);
                    }
                }
            }
            if c.is_alphabetic() {
                last_was_hour = c == 'h';
            }
            i += run;
        }
        Some(out)
    }
}

fn pad(n: u32, width: usize) -> String {
    if width >= 2 {
        format!("{:02}", n)
    } else {
        n.to_string()
    }
}

fn byte_index(chars: &[char], char_index: usize) -> usize {
    chars[..char_index].iter().map(|c| c.len_utf8()).sum()
}

fn is_date_pattern(pattern: &str) -> bool {
    let mut in_quotes = false;
    pattern.chars().any(|c| {
        if c == '"' {
            in_quotes = !in_quotes;
        }
        !in_quotes && matches!(c.to_ascii_lowercase(), 'y' | 'd' | 'h' | 's' | 'm')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_fixed() {
        let locale = Locale::default();
        assert_eq!(locale.format_fixed(1234.567, 2, true), "1,234.57");
        assert_eq!(locale.format_fixed(1234.567, 0, false), "1235");
        assert_eq!(locale.format_fixed(-1234567.0, 1, true), "-1,234,567.0");
        assert_eq!(locale.format_fixed(1250.0, -2, true), "1,300");
        assert!(!locale.format_fixed(1e300, 127, false).contains("inf"));

        let german = Locale {
            decimal_separator: ',',
            thousands_separator: '.',
            ..Locale::default()
        };
        assert_eq!(german.format_fixed(1234.5, 2, true), "1.234,50");
    }

    #[test]
    fn test_numeric_patterns() {
        let locale = Locale::default();
        let fmt = |v: f64, p: &str| locale.format_pattern(v, p, false).unwrap();
        assert_eq!(fmt(3.14159, "0.00"), "3.14");
        assert_eq!(fmt(1234567.0, "#,##0"), "1,234,567");
        assert_eq!(fmt(0.256, "0.0%"), "25.6%");
        assert_eq!(fmt(12345.0, "0.00E+00"), "1.23E+04");
        assert_eq!(fmt(5.0, "$0.00"), "$5.00");
        assert_eq!(fmt(2.5, "General"), "2.5");
    }

    #[test]
    fn test_date_patterns() {
        let locale = Locale::default();
        let fmt = |v: f64, p: &str| locale.format_pattern(v, p, false).unwrap();
        // 45292 is 2024-01-01
        assert_eq!(fmt(45292.0, "yyyy-mm-dd"), "2024-01-01");
        assert_eq!(fmt(45292.75, "dd/mm/yy hh:mm"), "01/01/24 18:00");
        assert_eq!(fmt(45292.75, "h:mm AM/PM"), "6:00 PM");
        assert_eq!(fmt(45292.0, "mmm d, yyyy"), "Jan 1, 2024");
    }
}
