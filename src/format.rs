use crate::error::{Result, ShiftError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broad category of a period expression, as carried by the `dateperiodtype`
/// attribute of a date marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Year,
    FullQuarter,
    ShortQuarter,
    WrittenDate,
    LongPeriod,
    RunningPeriod,
    Ytd,
    HalfYear,
    YearOnYear,
}

impl PeriodType {
    pub const ALL: [PeriodType; 9] = [
        PeriodType::Year,
        PeriodType::FullQuarter,
        PeriodType::ShortQuarter,
        PeriodType::WrittenDate,
        PeriodType::LongPeriod,
        PeriodType::RunningPeriod,
        PeriodType::Ytd,
        PeriodType::HalfYear,
        PeriodType::YearOnYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Year => "year",
            PeriodType::FullQuarter => "fullquarter",
            PeriodType::ShortQuarter => "shortquarter",
            PeriodType::WrittenDate => "writtendate",
            PeriodType::LongPeriod => "longperiod",
            PeriodType::RunningPeriod => "runningperiod",
            PeriodType::Ytd => "ytd",
            PeriodType::HalfYear => "halfyear",
            PeriodType::YearOnYear => "yearonyear",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        PeriodType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| ShiftError::UnknownPeriodType(s.to_string()))
    }
}

/// Every period format the classifier can recognise.
///
/// Each variant has a fixed tag (the value of the `dateformat` attribute)
/// and belongs to exactly one [`PeriodType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodFormat {
    // year
    Yyyy,
    FyYyyy,
    FyYy,
    ApostropheYy,
    YearRange,
    // quarters
    QYyyy,
    QApostropheYy,
    YyyyQ,
    NthQuarterYyyy,
    Q,
    NthQuarter,
    // written dates
    MmmmDYyyy,
    MmmDotDYyyy,
    DMmmmYyyy,
    IsoDate,
    UsNumericDate,
    EuNumericDate,
    MmmmYyyy,
    MmmYyyy,
    MmmmD,
    MmmDotD,
    // long periods
    MonthDayRangeYyyy,
    MonthRangeYyyy,
    ShortMonthRangeYyyy,
    MonthDayRange,
    MonthRange,
    ShortMonthRange,
    // running periods
    MonthsEndedYyyy,
    MonthsEnded,
    // year to date
    YtdYyyy,
    Ytd,
    // half years
    HalfYyyy,
    HalfYearYyyy,
    Half,
    // year on year
    YearOnYear,
}

impl PeriodFormat {
    pub const ALL: [PeriodFormat; 35] = [
        PeriodFormat::Yyyy,
        PeriodFormat::FyYyyy,
        PeriodFormat::FyYy,
        PeriodFormat::ApostropheYy,
        PeriodFormat::YearRange,
        PeriodFormat::QYyyy,
        PeriodFormat::QApostropheYy,
        PeriodFormat::YyyyQ,
        PeriodFormat::NthQuarterYyyy,
        PeriodFormat::Q,
        PeriodFormat::NthQuarter,
        PeriodFormat::MmmmDYyyy,
        PeriodFormat::MmmDotDYyyy,
        PeriodFormat::DMmmmYyyy,
        PeriodFormat::IsoDate,
        PeriodFormat::UsNumericDate,
        PeriodFormat::EuNumericDate,
        PeriodFormat::MmmmYyyy,
        PeriodFormat::MmmYyyy,
        PeriodFormat::MmmmD,
        PeriodFormat::MmmDotD,
        PeriodFormat::MonthDayRangeYyyy,
        PeriodFormat::MonthRangeYyyy,
        PeriodFormat::ShortMonthRangeYyyy,
        PeriodFormat::MonthDayRange,
        PeriodFormat::MonthRange,
        PeriodFormat::ShortMonthRange,
        PeriodFormat::MonthsEndedYyyy,
        PeriodFormat::MonthsEnded,
        PeriodFormat::YtdYyyy,
        PeriodFormat::Ytd,
        PeriodFormat::HalfYyyy,
        PeriodFormat::HalfYearYyyy,
        PeriodFormat::Half,
        PeriodFormat::YearOnYear,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            PeriodFormat::Yyyy => "yyyy",
            PeriodFormat::FyYyyy => "fy yyyy",
            PeriodFormat::FyYy => "FYyy",
            PeriodFormat::ApostropheYy => "'yy",
            PeriodFormat::YearRange => "yyyystart - yyyyend",
            PeriodFormat::QYyyy => "Q yyyy",
            PeriodFormat::QApostropheYy => "Q 'yy",
            PeriodFormat::YyyyQ => "yyyy Q",
            PeriodFormat::NthQuarterYyyy => "Nth quarter yyyy",
            PeriodFormat::Q => "Q",
            PeriodFormat::NthQuarter => "Nth quarter",
            PeriodFormat::MmmmDYyyy => "MMMM d, yyyy",
            PeriodFormat::MmmDotDYyyy => "MMM. d, yyyy",
            PeriodFormat::DMmmmYyyy => "d MMMM yyyy",
            PeriodFormat::IsoDate => "yyyy-MM-dd",
            PeriodFormat::UsNumericDate => "MM/dd/yyyy",
            PeriodFormat::EuNumericDate => "dd-MM-yyyy",
            PeriodFormat::MmmmYyyy => "MMMM yyyy",
            PeriodFormat::MmmYyyy => "MMM yyyy",
            PeriodFormat::MmmmD => "MMMM d",
            PeriodFormat::MmmDotD => "MMM. d",
            PeriodFormat::MonthDayRangeYyyy => "MMMMdstart to MMMMdend yyyy",
            PeriodFormat::MonthRangeYyyy => "MMMMstart to MMMMend yyyy",
            PeriodFormat::ShortMonthRangeYyyy => "MMMstart-MMMend yyyy",
            PeriodFormat::MonthDayRange => "MMMMdstart to MMMMdend",
            PeriodFormat::MonthRange => "MMMMstart to MMMMend",
            PeriodFormat::ShortMonthRange => "MMMstart-MMMend",
            PeriodFormat::MonthsEndedYyyy => "n months ended MMMM d, yyyy",
            PeriodFormat::MonthsEnded => "n months ended MMMM d",
            PeriodFormat::YtdYyyy => "YTD yyyy",
            PeriodFormat::Ytd => "YTD",
            PeriodFormat::HalfYyyy => "Hh yyyy",
            PeriodFormat::HalfYearYyyy => "HY yyyy",
            PeriodFormat::Half => "Hh",
            PeriodFormat::YearOnYear => "yyyy vs yyyystart",
        }
    }

    pub fn period_type(&self) -> PeriodType {
        match self {
            PeriodFormat::Yyyy
            | PeriodFormat::FyYyyy
            | PeriodFormat::FyYy
            | PeriodFormat::ApostropheYy
            | PeriodFormat::YearRange => PeriodType::Year,
            PeriodFormat::QYyyy
            | PeriodFormat::QApostropheYy
            | PeriodFormat::YyyyQ
            | PeriodFormat::NthQuarterYyyy => PeriodType::FullQuarter,
            PeriodFormat::Q | PeriodFormat::NthQuarter => PeriodType::ShortQuarter,
            PeriodFormat::MmmmDYyyy
            | PeriodFormat::MmmDotDYyyy
            | PeriodFormat::DMmmmYyyy
            | PeriodFormat::IsoDate
            | PeriodFormat::UsNumericDate
            | PeriodFormat::EuNumericDate
            | PeriodFormat::MmmmYyyy
            | PeriodFormat::MmmYyyy
            | PeriodFormat::MmmmD
            | PeriodFormat::MmmDotD => PeriodType::WrittenDate,
            PeriodFormat::MonthDayRangeYyyy
            | PeriodFormat::MonthRangeYyyy
            | PeriodFormat::ShortMonthRangeYyyy
            | PeriodFormat::MonthDayRange
            | PeriodFormat::MonthRange
            | PeriodFormat::ShortMonthRange => PeriodType::LongPeriod,
            PeriodFormat::MonthsEndedYyyy | PeriodFormat::MonthsEnded => {
                PeriodType::RunningPeriod
            }
            PeriodFormat::YtdYyyy | PeriodFormat::Ytd => PeriodType::Ytd,
            PeriodFormat::HalfYyyy | PeriodFormat::HalfYearYyyy | PeriodFormat::Half => {
                PeriodType::HalfYear
            }
            PeriodFormat::YearOnYear => PeriodType::YearOnYear,
        }
    }

    /// Whether the format spells out its own year.
    pub fn has_year(&self) -> bool {
        !matches!(
            self,
            PeriodFormat::Q
                | PeriodFormat::NthQuarter
                | PeriodFormat::MmmmD
                | PeriodFormat::MmmDotD
                | PeriodFormat::MonthDayRange
                | PeriodFormat::MonthRange
                | PeriodFormat::ShortMonthRange
                | PeriodFormat::MonthsEnded
                | PeriodFormat::Ytd
                | PeriodFormat::Half
        )
    }
}

impl fmt::Display for PeriodFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PeriodFormat {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        PeriodFormat::ALL
            .into_iter()
            .find(|f| f.tag() == needle)
            .ok_or_else(|| ShiftError::UnknownFormatTag(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_unique() {
        let mut tags: Vec<&str> = PeriodFormat::ALL.iter().map(|f| f.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), PeriodFormat::ALL.len());
    }

    #[test]
    fn test_format_tag_lookup() {
        assert_eq!(
            "MMM. d, yyyy".parse::<PeriodFormat>().unwrap(),
            PeriodFormat::MmmDotDYyyy
        );
        assert_eq!("Q yyyy".parse::<PeriodFormat>().unwrap(), PeriodFormat::QYyyy);
        assert!("dd.MM.yy".parse::<PeriodFormat>().is_err());
    }

    #[test]
    fn test_period_type_lookup() {
        assert_eq!(
            "fullquarter".parse::<PeriodType>().unwrap(),
            PeriodType::FullQuarter
        );
        assert_eq!(
            "WrittenDate".parse::<PeriodType>().unwrap(),
            PeriodType::WrittenDate
        );
        assert!("decade".parse::<PeriodType>().is_err());
    }

    #[test]
    fn test_yearless_formats() {
        assert!(PeriodFormat::QYyyy.has_year());
        assert!(!PeriodFormat::Q.has_year());
        assert!(!PeriodFormat::MonthRange.has_year());
        assert_eq!(PeriodFormat::Q.period_type(), PeriodType::ShortQuarter);
    }
}
