//! Pattern classification of period expressions.
//!
//! A [`PatternClassifier`] runs raw header or row-header text through the
//! ordered rule banks of its locales. The first rule whose pattern matches
//! decides the [`PeriodFormat`]; fragments are read from the named capture
//! groups of that pattern. Text no rule recognises is [`Classification::Unparsed`].

use crate::format::{PeriodFormat, PeriodType};
use crate::locale::{DutchRules, EnglishRules};
use crate::utils::expand_two_digit_year;
use crate::wrapper::Fragments;
use log::debug;
use regex::{Captures, Regex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    English,
    Dutch,
}

impl Locale {
    pub fn rules(&self) -> Box<dyn LocaleRules> {
        match self {
            Locale::English => Box::new(EnglishRules),
            Locale::Dutch => Box::new(DutchRules),
        }
    }
}

/// One entry of a rule bank: a recogniser and the format it stands for.
pub struct PatternRule {
    pub format: PeriodFormat,
    pub pattern: Regex,
}

impl PatternRule {
    /// Compiles a rule. Rule banks are fixed at build time, so an invalid
    /// pattern is a programming error.
    pub fn new(format: PeriodFormat, pattern: &str) -> Self {
        Self {
            format,
            pattern: Regex::new(pattern).expect("valid period pattern"),
        }
    }
}

/// Locale-specific recognisers.
///
/// The rule list is evaluated top to bottom and must be ordered from the
/// most specific format to the least specific one.
pub trait LocaleRules: Send + Sync {
    fn locale(&self) -> Locale;

    fn rules(&self) -> &'static [PatternRule];

    /// Month number (1-12) for a month name or abbreviation.
    fn month_number(&self, name: &str) -> Option<u32>;

    /// Number for a spelled-out count or ordinal ("six", "eerste").
    fn number_word(&self, word: &str) -> Option<u32>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodMatch {
    pub format: PeriodFormat,
    pub fragments: Fragments,
    pub locale: Locale,
}

impl PeriodMatch {
    pub fn period_type(&self) -> PeriodType {
        self.format.period_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Parsed(PeriodMatch),
    Unparsed,
}

impl Classification {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Classification::Parsed(_))
    }

    pub fn into_match(self) -> Option<PeriodMatch> {
        match self {
            Classification::Parsed(m) => Some(m),
            Classification::Unparsed => None,
        }
    }
}

pub struct PatternClassifier {
    locales: Vec<Box<dyn LocaleRules>>,
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::for_locales(&[Locale::English, Locale::Dutch])
    }
}

impl PatternClassifier {
    pub fn new(locales: Vec<Box<dyn LocaleRules>>) -> Self {
        Self { locales }
    }

    pub fn for_locales(locales: &[Locale]) -> Self {
        Self::new(locales.iter().map(Locale::rules).collect())
    }

    pub fn classify(&self, text: &str) -> Classification {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Classification::Unparsed;
        }

        for rules in &self.locales {
            for rule in rules.rules() {
                let Some(caps) = rule.pattern.captures(&normalized) else {
                    continue;
                };
                // First matching rule decides; a failed extraction does not
                // fall through to less specific rules.
                return match extract_fragments(&caps, rule.format, rules.as_ref()) {
                    Some(fragments) => Classification::Parsed(PeriodMatch {
                        format: rule.format,
                        fragments,
                        locale: rules.locale(),
                    }),
                    None => {
                        debug!(
                            "'{}' matched '{}' but its fragments could not be read",
                            normalized,
                            rule.format.tag()
                        );
                        Classification::Unparsed
                    }
                };
            }
        }

        Classification::Unparsed
    }
}

/// Collapses whitespace (including non-breaking spaces) and strips footnote
/// markers and trailing colons.
pub fn normalize_text(text: &str) -> String {
    let collapsed = text
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_end_matches(['*', ':'])
        .trim()
        .replace(['\u{2013}', '\u{2014}'], "-")
}

fn extract_fragments(
    caps: &Captures,
    format: PeriodFormat,
    rules: &dyn LocaleRules,
) -> Option<Fragments> {
    let number = |name: &str| -> Option<Option<u32>> {
        match caps.name(name) {
            None => Some(None),
            Some(m) => {
                let raw = m.as_str();
                let value = raw.parse::<u32>().ok().or_else(|| rules.number_word(raw))?;
                Some(Some(value))
            }
        }
    };
    let month = |name: &str| -> Option<Option<u32>> {
        match caps.name(name) {
            None => Some(None),
            Some(m) => {
                let raw = m.as_str().trim_end_matches('.');
                let value = raw.parse::<u32>().ok().or_else(|| rules.month_number(raw))?;
                (1..=12).contains(&value).then_some(Some(value))
            }
        }
    };

    let mut fragments = Fragments::default();

    if let Some(year) = number("year")? {
        fragments.year = year as i32;
    } else if let Some(yy) = number("yy")? {
        fragments.year = expand_two_digit_year(yy as i32);
    }
    if let Some(year_start) = number("year_start")? {
        fragments.year_start = year_start as i32;
    }
    if let Some(m) = month("month")? {
        fragments.month = m;
    }
    if let Some(m) = month("month_start")? {
        fragments.month_start = m;
    }
    if let Some(day) = number("day")? {
        fragments.day = day;
    }
    if let Some(day) = number("day_start")? {
        fragments.day_start = day;
    }
    if let Some(quarter) = number("quarter")? {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        fragments.quarter = quarter;
    }

    match format {
        PeriodFormat::HalfYyyy | PeriodFormat::HalfYearYyyy | PeriodFormat::Half => {
            let half = number("half")?.unwrap_or(1);
            let (start, end) = match half {
                1 => (1, 6),
                2 => (7, 12),
                _ => return None,
            };
            fragments.month_start = start;
            fragments.month = end;
        }
        PeriodFormat::MonthsEndedYyyy | PeriodFormat::MonthsEnded => {
            let months = number("months")?.unwrap_or(12);
            if !(1..=12).contains(&months) || fragments.month == 0 {
                return None;
            }
            fragments.month_start = (fragments.month as i32 - months as i32).rem_euclid(12) as u32 + 1;
        }
        PeriodFormat::YearOnYear | PeriodFormat::YearRange => {
            // "2018 vs 2019" and "2019 vs 2018" describe the same span, as do
            // "2017 - 2019" and "2019 - 2017"
            let (low, high) = if fragments.year_start <= fragments.year {
                (fragments.year_start, fragments.year)
            } else {
                (fragments.year, fragments.year_start)
            };
            fragments.year_start = low;
            fragments.year = high;
        }
        _ => {}
    }

    if fragments.day > 31 || fragments.day_start > 31 {
        return None;
    }

    Some(fragments)
}
