use crate::classifier::{Locale, LocaleRules, PatternRule};
use crate::format::PeriodFormat;
use std::sync::OnceLock;

const MONTHS: [&str; 12] = [
    "januari",
    "februari",
    "maart",
    "april",
    "mei",
    "juni",
    "juli",
    "augustus",
    "september",
    "oktober",
    "november",
    "december",
];

const ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mrt", "apr", "mei", "jun", "jul", "aug", "sep", "okt", "nov", "dec",
];

// Dutch month names are lower case; a capital is accepted at the start of a cell.
const FULL: &str = "(?:[Jj]anuari|[Ff]ebruari|[Mm]aart|[Aa]pril|[Mm]ei|[Jj]uni|[Jj]uli|[Aa]ugustus|[Ss]eptember|[Oo]ktober|[Nn]ovember|[Dd]ecember)";
const ABBR: &str = "(?:[Jj]an|[Ff]eb|[Mm]rt|[Aa]pr|[Mm]ei|[Jj]un|[Jj]ul|[Aa]ug|[Ss]ept|[Ss]ep|[Oo]kt|[Nn]ov|[Dd]ec)";
const TOT: &str = "(?:t/m|tot en met|tot|-)";

pub struct DutchRules;

impl LocaleRules for DutchRules {
    fn locale(&self) -> Locale {
        Locale::Dutch
    }

    fn rules(&self) -> &'static [PatternRule] {
        static RULES: OnceLock<Vec<PatternRule>> = OnceLock::new();
        RULES.get_or_init(build_rules)
    }

    fn month_number(&self, name: &str) -> Option<u32> {
        let lower = name.to_lowercase();
        if lower == "sept" {
            return Some(9);
        }
        MONTHS
            .iter()
            .position(|m| *m == lower)
            .or_else(|| ABBREVIATIONS.iter().position(|m| *m == lower))
            .map(|idx| idx as u32 + 1)
    }

    fn number_word(&self, word: &str) -> Option<u32> {
        match word.to_lowercase().as_str() {
            "eerste" => Some(1),
            "tweede" => Some(2),
            "drie" => Some(3),
            "zes" => Some(6),
            "negen" => Some(9),
            "twaalf" => Some(12),
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
                r"^(?P<day_start>\d{{1,2}}) (?P<month_start>{FULL}) {TOT} (?P<day>\d{{1,2}}) (?P<month>{FULL}) (?P<year>\d{{4}})$"
            ),
        ),
        PatternRule::new(
            MonthRangeYyyy,
            &format!(r"^(?P<month_start>{FULL}) {TOT} (?P<month>{FULL}) (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            ShortMonthRangeYyyy,
            &format!(r"^(?P<month_start>{ABBR})\.? ?- ?(?P<month>{ABBR})\.? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            MonthRange,
            &format!(r"^(?P<month_start>{FULL}) {TOT} (?P<month>{FULL})$"),
        ),
        PatternRule::new(
            HalfYearYyyy,
            r"^(?:(?P<half>[Ee]erste|[Tt]weede) )?[Hh]alfjaar (?P<year>\d{4})$",
        ),
        PatternRule::new(QYyyy, r"^(?:K|Kw|kw)(?P<quarter>[1-4]) (?P<year>\d{4})$"),
        PatternRule::new(
            NthQuarterYyyy,
            r"^(?P<quarter>[1-4])e kwartaal (?P<year>\d{4})$",
        ),
        PatternRule::new(NthQuarter, r"^(?P<quarter>[1-4])e kwartaal$"),
        PatternRule::new(
            DMmmmYyyy,
            &format!(r"^(?:[Pp]er )?(?P<day>\d{{1,2}}) (?P<month>{FULL}) (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            EuNumericDate,
            r"^(?P<day>\d{1,2})-(?P<month>\d{1,2})-(?P<year>\d{4})$",
        ),
        PatternRule::new(
            MmmmYyyy,
            &format!(r"^(?P<month>{FULL}) (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(
            MmmYyyy,
            &format!(r"^(?P<month>{ABBR})\.? (?P<year>\d{{4}})$"),
        ),
        PatternRule::new(FyYyyy, r"^[Bb]oekjaar (?P<year>\d{4})$"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_lookup() {
        let rules = DutchRules;
        assert_eq!(rules.month_number("maart"), Some(3));
        assert_eq!(rules.month_number("Mrt"), Some(3));
        assert_eq!(rules.month_number("okt"), Some(10));
        assert_eq!(rules.month_number("March"), None);
    }

    #[test]
    fn test_rule_bank_compiles() {
        assert_eq!(DutchRules.rules().len(), 13);
    }
}
