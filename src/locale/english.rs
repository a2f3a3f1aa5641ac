use crate::classifier::{Locale, LocaleRules, PatternRule};
use crate::format::PeriodFormat;
use std::sync::OnceLock;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const FULL: &str =
    "(?:January|February|March|April|May|June|July|August|September|October|November|December)";
const ABBR: &str = "(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec)";
const TO: &str = "(?:to|through|until|-)";
const AS_OF: &str = "(?:(?:As (?:of|at)|At|Balance at) )?";
const COUNT: &str = "(?:Three|three|Six|six|Nine|nine|Twelve|twelve|\\d{1,2})";

/// English recognisers. Month names are matched case-sensitively.
pub struct EnglishRules;

impl LocaleRules for EnglishRules {
    fn locale(&self) -> Locale {
        Locale::English
    }

    fn rules(&self) -> &'static [PatternRule] {
        static RULES: OnceLock<Vec<PatternRule>> = OnceLock::new();
        RULES.get_or_init(build_rules)
    }

    fn month_number(&self, name: &str) -> Option<u32> {
        if name == "Sept" {
            return Some(9);
        }
        MONTHS
            .iter()
            .position(|full| *full == name || (name.len() == 3 && full.starts_with(name)))
            .map(|idx| idx as u32 + 1)
    }

    fn number_word(&self, word: &str) -> Option<u32> {
        match word.to_ascii_lowercase().as_str() {
            "one" | "first" => Some(1),
            "two" | "second" => Some(2),
            "three" => Some(3),
            "six" => Some(6),
            "nine" => Some(9),
            "twelve" => Some(12),
            _ => None,
        }
    }
}

fn build_rules() -> Vec<PatternRule> {
    use PeriodFormat::*;

    vec![
        PatternRule::new(
            MonthDayRangeYyyy,
            &format!(
                r"^(?:From )?(?P<month_start>{FULL}) (?P<day_start>\d{{1,2}}),?(?: (?P<year_start>\d{{4}}),?)? {TO} (?P<month>{FULL}) (?P<day>\d{{1,2}}),? (?P<year>\d{{4}})$"
            ),
        ),
        PatternRule::new(
            MonthRangeYyyy,
            &format!(r"^(?P<month_start>{FULL}) {TO} (?P<month>{FULL}),? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            ShortMonthRangeYyyy,
            &format!(
                r"^(?P<month_start>{ABBR})\.? ?- ?(?P<month>{ABBR})\.?,? (?P<year>\d{{4}})$"
            ),
        ),
        PatternRule::new(
            MonthDayRange,
            &format!(
                r"^(?:From )?(?P<month_start>{FULL}) (?P<day_start>\d{{1,2}}) {TO} (?P<month>{FULL}) (?P<day>\d{{1,2}})$"
            ),
        ),
        PatternRule::new(
            MonthRange,
            &format!(r"^(?P<month_start>{FULL}) {TO} (?P<month>{FULL})$"),
        ),
        PatternRule::new(
            ShortMonthRange,
            &format!(r"^(?P<month_start>{ABBR})\.? ?- ?(?P<month>{ABBR})\.?$"),
        ),
        PatternRule::new(
            MonthsEndedYyyy,
            &format!(
                r"^(?:(?P<months>{COUNT})(?: months|-month period) (?:ended|ending)|(?:Year|Fiscal year) ended) (?P<month>{FULL}) (?P<day>\d{{1,2}}),? (?P<year>\d{{4}})$"
            ),
        ),
        PatternRule::new(
            MonthsEnded,
            &format!(
                r"^(?:(?P<months>{COUNT})(?: months|-month period) (?:ended|ending)|(?:Year|Fiscal year) ended) (?P<month>{FULL}) (?P<day>\d{{1,2}})$"
            ),
        ),
        PatternRule::new(YtdYyyy, r"^(?:YTD|Year to date|Year-to-date) ?(?P<year>\d{4})$"),
        PatternRule::new(Ytd, r"^(?:YTD|Year to date|Year-to-date)$"),
        PatternRule::new(HalfYyyy, r"^H(?P<half>[12]) ?(?P<year>\d{4})$"),
        PatternRule::new(
            HalfYearYyyy,
            r"^(?:(?P<half>First|Second) half(?: of)?|HY|Half-year|Half year) ?(?P<year>\d{4})$",
        ),
        PatternRule::new(Half, r"^H(?P<half>[12])$"),
        PatternRule::new(
            YearOnYear,
            r"^(?P<year>\d{4}) (?:vs\.?|versus|compared to) (?P<year_start>\d{4})$",
        ),
        PatternRule::new(YearRange, r"^(?P<year_start>\d{4}) ?- ?(?P<year>\d{4})$"),
        PatternRule::new(QYyyy, r"^Q(?P<quarter>[1-4]) ?(?P<year>\d{4})$"),
        PatternRule::new(QApostropheYy, r"^Q(?P<quarter>[1-4]) ?'(?P<yy>\d{2})$"),
        PatternRule::new(YyyyQ, r"^(?P<year>\d{4})[ -]?Q(?P<quarter>[1-4])$"),
        PatternRule::new(
            NthQuarterYyyy,
            r"^(?P<quarter>[1-4])(?:st|nd|rd|th) [Qq]uarter(?: of)?,? (?P<year>\d{4})$",
        ),
        PatternRule::new(Q, r"^Q(?P<quarter>[1-4])$"),
        PatternRule::new(NthQuarter, r"^(?P<quarter>[1-4])(?:st|nd|rd|th) [Qq]uarter$"),
        PatternRule::new(
            MmmmDYyyy,
            &format!(r"^{AS_OF}(?P<month>{FULL}) (?P<day>\d{{1,2}}),? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            MmmDotDYyyy,
            &format!(r"^{AS_OF}(?P<month>{ABBR})\.? (?P<day>\d{{1,2}}),? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            DMmmmYyyy,
            &format!(r"^{AS_OF}(?P<day>\d{{1,2}}) (?P<month>{FULL}),? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            IsoDate,
            r"^(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})$",
        ),
        PatternRule::new(
            UsNumericDate,
            r"^(?P<month>\d{1,2})/(?P<day>\d{1,2})/(?P<year>\d{4})$",
        ),
        PatternRule::new(
            MmmmYyyy,
            &format!(r"^(?P<month>{FULL}),? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            MmmYyyy,
            &format!(r"^(?P<month>{ABBR})\.? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            MmmmD,
            &format!(r"^{AS_OF}(?P<month>{FULL}) (?P<day>\d{{1,2}})$"),
        ),
        PatternRule::new(
            MmmDotD,
            &format!(r"^{AS_OF}(?P<month>{ABBR})\.? (?P<day>\d{{1,2}})$"),
        ),
        PatternRule::new(FyYyyy, r"^(?:FY|Fiscal year|Fiscal) ?(?P<year>\d{4})$"),
        PatternRule::new(FyYy, r"^FY ?'?(?P<yy>\d{2})$"),
        PatternRule::new(ApostropheYy, r"^'(?P<yy>\d{2})$"),
        PatternRule::new(Yyyy, r"^(?P<year>\d{4})$"),
    ]
}
