//! Period resolution: turns a [`DateWrapper`] into absolute start and end
//! instants for a given [`FiscalPeriod`].
//!
//! Dispatch is on the wrapper's format, which fixes its period type. Some
//! formats look at the wrapper's context to fill in what they lack, e.g. a
//! bare `Q2` takes its year from a sibling `2019` marker. When neither the
//! marker nor its context carries a year, the year is taken from the fiscal
//! period and the fallback is recorded on the result.

use crate::error::{Result, ShiftError};
use crate::fiscal::{FiscalPeriod, ProjectType};
use crate::format::{PeriodFormat, PeriodType};
use crate::report::SourceLocation;
use crate::utils::{
    days_in_month, end_of_day, first_day_of_month, fiscal_year_end, fiscal_year_of,
    fiscal_year_start, quarter_end, quarter_of_month, quarter_start, safe_ymd, start_of_day,
};
use crate::wrapper::{DateWrapper, Fragments};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Set when a missing year had to be assumed.
    pub fallback: Option<String>,
}

impl ResolvedPeriod {
    pub fn days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start_of_day(start),
            end: end_of_day(end),
            fallback: None,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }
}

pub fn resolve_period(
    wrapper: &DateWrapper,
    fiscal: &FiscalPeriod,
    location: &SourceLocation,
) -> Result<ResolvedPeriod> {
    let unsupported = || ShiftError::UnsupportedFormat {
        period_type: wrapper
            .period_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "none".to_string()),
        format: wrapper
            .format
            .map(|f| f.to_string())
            .unwrap_or_else(|| "none".to_string()),
        table_id: location.table_id.clone(),
        article_id: location.article_id.clone(),
    };

    let (Some(period_type), Some(format)) = (wrapper.period_type, wrapper.format) else {
        return Err(unsupported());
    };
    if format.period_type() != period_type {
        return Err(unsupported());
    }

    let mut resolver = Resolver::new(wrapper, fiscal);
    let mut period = match format {
        PeriodFormat::Yyyy
        | PeriodFormat::FyYyyy
        | PeriodFormat::FyYy
        | PeriodFormat::ApostropheYy => resolver.year()?,
        PeriodFormat::YearRange | PeriodFormat::YearOnYear => resolver.year_span()?,
        PeriodFormat::QYyyy
        | PeriodFormat::QApostropheYy
        | PeriodFormat::YyyyQ
        | PeriodFormat::NthQuarterYyyy
        | PeriodFormat::Q
        | PeriodFormat::NthQuarter => resolver.quarter()?,
        PeriodFormat::MmmmDYyyy
        | PeriodFormat::MmmDotDYyyy
        | PeriodFormat::DMmmmYyyy
        | PeriodFormat::IsoDate
        | PeriodFormat::UsNumericDate
        | PeriodFormat::EuNumericDate
        | PeriodFormat::MmmmYyyy
        | PeriodFormat::MmmYyyy
        | PeriodFormat::MmmmD
        | PeriodFormat::MmmDotD => resolver.written_date()?,
        PeriodFormat::MonthDayRangeYyyy
        | PeriodFormat::MonthRangeYyyy
        | PeriodFormat::ShortMonthRangeYyyy
        | PeriodFormat::MonthDayRange
        | PeriodFormat::MonthRange
        | PeriodFormat::ShortMonthRange
        | PeriodFormat::MonthsEndedYyyy
        | PeriodFormat::MonthsEnded
        | PeriodFormat::HalfYyyy
        | PeriodFormat::HalfYearYyyy
        | PeriodFormat::Half => resolver.month_range()?,
        PeriodFormat::YtdYyyy | PeriodFormat::Ytd => resolver.year_to_date()?,
    };

    if period.start >= period.end {
        return Err(ShiftError::DateError(format!(
            "{} resolved to {} .. {}, start is not before end",
            wrapper.describe(),
            period.start,
            period.end
        )));
    }
    period.fallback = resolver.fallback;
    Ok(period)
}

struct Resolver<'a> {
    wrapper: &'a DateWrapper,
    fiscal: &'a FiscalPeriod,
    fragments: Fragments,
    context: Option<(&'a DateWrapper, Fragments)>,
    fallback: Option<String>,
}

impl<'a> Resolver<'a> {
    fn new(wrapper: &'a DateWrapper, fiscal: &'a FiscalPeriod) -> Self {
        Self {
            wrapper,
            fiscal,
            fragments: wrapper.anchored_fragments(fiscal.year),
            context: wrapper
                .context()
                .filter(|ctx| ctx.is_parsed())
                .map(|ctx| (ctx, ctx.anchored_fragments(fiscal.year))),
            fallback: None,
        }
    }

    fn offset(&self) -> u32 {
        self.fiscal.fiscal_year_offset
    }

    fn missing(&self, field: &'static str) -> ShiftError {
        ShiftError::MissingFragment {
            field,
            text: self.wrapper.text.clone(),
        }
    }

    fn require(&self, value: u32, field: &'static str) -> Result<u32> {
        if value == 0 {
            Err(self.missing(field))
        } else {
            Ok(value)
        }
    }

    fn context_year(&self) -> Option<i32> {
        self.context
            .map(|(_, fragments)| fragments.year)
            .filter(|year| *year != 0)
    }

    /// Year of the marker, else of its context, else the year that places
    /// `month`/`day` inside the fiscal year of the reporting period.
    fn year_for(&mut self, month: u32, day: u32) -> Result<i32> {
        if self.fragments.has_year() {
            return Ok(self.fragments.year);
        }
        if let Some(year) = self.context_year() {
            return Ok(year);
        }
        let fy_end = self.fiscal.fiscal_year_end()?;
        let mut year = fy_end.year();
        if safe_ymd(year, month, day.max(1))? > fy_end {
            year -= 1;
        }
        self.fallback = Some(format!(
            "{} has no year in marker or context; assumed {}",
            self.wrapper.describe(),
            year
        ));
        Ok(year)
    }

    fn full_fiscal_year(&self, year: i32) -> Result<ResolvedPeriod> {
        Ok(ResolvedPeriod::days(
            fiscal_year_start(year, self.offset())?,
            fiscal_year_end(year, self.offset())?,
        ))
    }

    /// Start of a period ending on `end` when the marker only names its end.
    fn default_start(&self, end: NaiveDate) -> Result<NaiveDate> {
        match self.fiscal.project_type {
            ProjectType::Monthly => first_day_of_month(end.year(), end.month()),
            ProjectType::Quarterly => {
                first_day_of_month(end.year(), quarter_of_month(end.month()) * 3 - 2)
            }
            ProjectType::Annual | ProjectType::Unknown => {
                fiscal_year_start(fiscal_year_of(end, self.offset()), self.offset())
            }
        }
    }

    /// `month`/`day` of the reporting period end within fiscal year `year`.
    fn period_end_in(&self, year: i32) -> Result<NaiveDate> {
        let fy_end = fiscal_year_end(year, self.offset())?;
        let anchor = self.fiscal.period_end;
        let end = safe_ymd(fy_end.year(), anchor.month(), anchor.day())?;
        if end > fy_end {
            safe_ymd(fy_end.year() - 1, anchor.month(), anchor.day())
        } else {
            Ok(end)
        }
    }

    fn year_to_date_in(&self, year: i32) -> Result<ResolvedPeriod> {
        Ok(ResolvedPeriod::days(
            fiscal_year_start(year, self.offset())?,
            self.period_end_in(year)?,
        ))
    }

    fn range(&self, fragments: Fragments, end_year: i32) -> Result<ResolvedPeriod> {
        let month_start = self.require(fragments.month_start, "start month")?;
        let month = self.require(fragments.month, "month")?;
        let day_start = fragments.day_start.max(1);
        let day = if fragments.day == 0 {
            days_in_month(end_year, month)
        } else {
            fragments.day
        };

        let start_year = if fragments.year_start != 0 {
            fragments.year_start
        } else if (month_start, day_start) > (month, day) {
            // "November to February" crosses a year boundary
            end_year - 1
        } else {
            end_year
        };

        Ok(ResolvedPeriod::days(
            safe_ymd(start_year, month_start, day_start)?,
            safe_ymd(end_year, month, day)?,
        ))
    }

    fn instant(&self, year: i32, month: u32, day: u32) -> Result<ResolvedPeriod> {
        let day = if day == 0 {
            days_in_month(year, month)
        } else {
            day
        };
        let end = safe_ymd(year, month, day)?;
        Ok(ResolvedPeriod::days(self.default_start(end)?, end))
    }

    fn year(&mut self) -> Result<ResolvedPeriod> {
        if !self.fragments.has_year() {
            return Err(self.missing("year"));
        }
        let year = self.fragments.year;

        if let Some((ctx, ctx_fragments)) = self.context {
            match (ctx.period_type, ctx.format) {
                (Some(PeriodType::Year), _) => return self.full_fiscal_year(year),
                (Some(PeriodType::ShortQuarter), _) => {
                    let quarter = self.require(ctx_fragments.quarter, "quarter")?;
                    return Ok(ResolvedPeriod {
                        start: quarter_start(year, quarter)?,
                        end: quarter_end(year, quarter)?,
                        fallback: None,
                    });
                }
                (
                    Some(PeriodType::LongPeriod | PeriodType::RunningPeriod | PeriodType::HalfYear),
                    Some(format),
                ) if !format.has_year() => return self.range(ctx_fragments, year),
                (Some(PeriodType::WrittenDate), Some(format)) if !format.has_year() => {
                    let month = self.require(ctx_fragments.month, "month")?;
                    return self.instant(year, month, ctx_fragments.day);
                }
                (Some(PeriodType::Ytd), Some(PeriodFormat::Ytd)) => {
                    return self.year_to_date_in(year)
                }
                _ => {}
            }
        }

        match self.fiscal.project_type {
            ProjectType::Annual | ProjectType::Unknown => self.full_fiscal_year(year),
            ProjectType::Quarterly | ProjectType::Monthly => self.year_to_date_in(year),
        }
    }

    fn year_span(&self) -> Result<ResolvedPeriod> {
        if !self.fragments.has_year() {
            return Err(self.missing("year"));
        }
        if self.fragments.year_start == 0 {
            return Err(self.missing("start year"));
        }
        let low = self.fragments.year_start.min(self.fragments.year);
        let high = self.fragments.year_start.max(self.fragments.year);
        Ok(ResolvedPeriod::days(safe_ymd(low, 1, 1)?, safe_ymd(high, 12, 31)?))
    }

    fn quarter(&mut self) -> Result<ResolvedPeriod> {
        let quarter = self.require(self.fragments.quarter, "quarter")?;
        let year = self.year_for(quarter * 3, 1)?;
        Ok(ResolvedPeriod {
            start: quarter_start(year, quarter)?,
            end: quarter_end(year, quarter)?,
            fallback: None,
        })
    }

    fn written_date(&mut self) -> Result<ResolvedPeriod> {
        let month = self.require(self.fragments.month, "month")?;
        let day = self.fragments.day;
        let year = self.year_for(month, day)?;
        self.instant(year, month, day)
    }

    fn month_range(&mut self) -> Result<ResolvedPeriod> {
        let month = self.require(self.fragments.month, "month")?;
        let day = self.fragments.day;
        let year = self.year_for(month, day)?;
        self.range(self.fragments, year)
    }

    fn year_to_date(&mut self) -> Result<ResolvedPeriod> {
        if self.fragments.has_year() {
            return self.year_to_date_in(self.fragments.year);
        }
        let year = self
            .context_year()
            .unwrap_or_else(|| self.fiscal.fiscal_year());
        self.year_to_date_in(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PatternClassifier;
    use crate::wrapper::DateAttributes;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn wrapper(text: &str) -> DateWrapper {
        DateWrapper::from_text(text, &PatternClassifier::default())
    }

    fn resolve(text: &str, literal: &str) -> ResolvedPeriod {
        let fiscal = FiscalPeriod::parse(literal, 0).unwrap();
        resolve_period(&wrapper(text), &fiscal, &SourceLocation::default()).unwrap()
    }

    fn span(period: &ResolvedPeriod) -> (NaiveDate, NaiveDate) {
        (period.start_date(), period.end_date())
    }

    #[test]
    fn test_full_quarter() {
        let period = resolve("Q1 2019", "ar19");
        assert_eq!(period.start, start_of_day(date(2019, 1, 1)));
        assert_eq!(
            period.end,
            date(2019, 3, 31).and_hms_opt(23, 59, 59).unwrap()
        );
        assert!(period.fallback.is_none());
    }

    #[test]
    fn test_month_range_without_year_uses_fiscal_year() {
        let period = resolve("January to June", "ar21");
        assert_eq!(span(&period), (date(2021, 1, 1), date(2021, 6, 30)));
        assert!(period.fallback.is_some());
    }

    #[test]
    fn test_month_range_crossing_year_end() {
        let period = resolve("November to February", "ar21");
        assert_eq!(span(&period), (date(2020, 11, 1), date(2021, 2, 28)));
    }

    #[test]
    fn test_month_day_range_with_year() {
        let period = resolve("January 1 to June 30, 2019", "q219");
        assert_eq!(span(&period), (date(2019, 1, 1), date(2019, 6, 30)));
    }

    #[test]
    fn test_running_period() {
        let period = resolve("Nine months ended September 30, 2019", "q319");
        assert_eq!(span(&period), (date(2019, 1, 1), date(2019, 9, 30)));
    }

    #[test]
    fn test_year_per_project_type() {
        let annual = resolve("2019", "ar19");
        assert_eq!(span(&annual), (date(2019, 1, 1), date(2019, 12, 31)));

        let quarterly = resolve("2018", "q219");
        assert_eq!(span(&quarterly), (date(2018, 1, 1), date(2018, 6, 30)));
    }

    #[test]
    fn test_year_with_offset_fiscal_year() {
        let fiscal = FiscalPeriod::parse("ar20", 6).unwrap();
        let period = resolve_period(&wrapper("FY 2020"), &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&period), (date(2019, 7, 1), date(2020, 6, 30)));
    }

    #[test]
    fn test_year_refined_by_quarter_context() {
        let fiscal = FiscalPeriod::parse("ar19", 0).unwrap();
        let year = wrapper("2019").with_context(Arc::new(wrapper("Q2")));
        let period = resolve_period(&year, &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&period), (date(2019, 4, 1), date(2019, 6, 30)));
    }

    #[test]
    fn test_year_refined_by_running_period_context() {
        let fiscal = FiscalPeriod::parse("q219", 0).unwrap();
        let year = wrapper("2018").with_context(Arc::new(wrapper("Six months ended June 30")));
        let period = resolve_period(&year, &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&period), (date(2018, 1, 1), date(2018, 6, 30)));
    }

    #[test]
    fn test_year_refined_by_written_date_context() {
        let fiscal = FiscalPeriod::parse("ar19", 0).unwrap();
        let year = wrapper("2018").with_context(Arc::new(wrapper("December 31")));
        let period = resolve_period(&year, &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&period), (date(2018, 1, 1), date(2018, 12, 31)));
    }

    #[test]
    fn test_short_quarter_takes_year_from_context() {
        let fiscal = FiscalPeriod::parse("ar19", 0).unwrap();
        let quarter = wrapper("Q3").with_context(Arc::new(wrapper("2018")));
        let period = resolve_period(&quarter, &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&period), (date(2018, 7, 1), date(2018, 9, 30)));
        assert!(period.fallback.is_none());

        let bare = resolve_period(&wrapper("Q3"), &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&bare), (date(2019, 7, 1), date(2019, 9, 30)));
        assert!(bare.fallback.is_some());
    }

    #[test]
    fn test_written_date_start_per_project_type() {
        let annual = resolve("Dec. 31, 2018", "ar19");
        assert_eq!(span(&annual), (date(2018, 1, 1), date(2018, 12, 31)));

        let quarterly = resolve("June 30, 2019", "q219");
        assert_eq!(span(&quarterly), (date(2019, 4, 1), date(2019, 6, 30)));

        let monthly = resolve("May 31, 2024", "mr0524");
        assert_eq!(span(&monthly), (date(2024, 5, 1), date(2024, 5, 31)));

        let month_only = resolve("March 2019", "ar19");
        assert_eq!(month_only.end_date(), date(2019, 3, 31));
    }

    #[test]
    fn test_written_date_without_year_uses_target_year() {
        let period = resolve("Dec 31", "ar20");
        assert_eq!(period.end_date(), date(2020, 12, 31));
        assert!(period.fallback.is_some());
    }

    #[test]
    fn test_leap_day_in_non_leap_year() {
        let fiscal = FiscalPeriod::parse("ar21", 0).unwrap();
        let attrs = DateAttributes {
            text: "February 29, 2020".to_string(),
            period_type: Some("writtendate".to_string()),
            format: Some("MMMM d, yyyy".to_string()),
            flexible: Some(true),
            offset: Some(0),
            ..Default::default()
        };
        let leap = DateWrapper::from_attributes(&attrs, &PatternClassifier::default()).unwrap();
        let period = resolve_period(&leap, &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(period.end_date(), date(2021, 2, 28));
    }

    #[test]
    fn test_ytd_and_half_year() {
        let ytd = resolve("YTD", "q319");
        assert_eq!(span(&ytd), (date(2019, 1, 1), date(2019, 9, 30)));

        let ytd_2018 = resolve("YTD 2018", "q319");
        assert_eq!(span(&ytd_2018), (date(2018, 1, 1), date(2018, 9, 30)));

        let half = resolve("H2 2019", "ar19");
        assert_eq!(span(&half), (date(2019, 7, 1), date(2019, 12, 31)));
    }

    #[test]
    fn test_year_spans() {
        let range = resolve("2017 - 2019", "ar19");
        assert_eq!(span(&range), (date(2017, 1, 1), date(2019, 12, 31)));

        let yoy = resolve("2019 vs 2018", "ar19");
        assert_eq!(span(&yoy), (date(2018, 1, 1), date(2019, 12, 31)));

        let descending = resolve("2019 - 2017", "ar19");
        assert_eq!(span(&descending), (date(2017, 1, 1), date(2019, 12, 31)));

        let attrs = DateAttributes {
            text: "2019-2017".to_string(),
            period_type: Some("year".to_string()),
            format: Some("yyyystart - yyyyend".to_string()),
            year: Some(2017),
            start_year: Some(2019),
            ..Default::default()
        };
        let reversed = DateWrapper::from_attributes(&attrs, &PatternClassifier::default()).unwrap();
        let fiscal = FiscalPeriod::parse("ar19", 0).unwrap();
        let period = resolve_period(&reversed, &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&period), (date(2017, 1, 1), date(2019, 12, 31)));
    }

    #[test]
    fn test_flexible_marker_moves_with_target_year() {
        let fiscal = FiscalPeriod::parse("ar20", 0).unwrap();
        let moved = wrapper("2018").anchor_to(2019);
        let period = resolve_period(&moved, &fiscal, &SourceLocation::default()).unwrap();
        assert_eq!(span(&period), (date(2019, 1, 1), date(2019, 12, 31)));
    }

    #[test]
    fn test_unsupported_combination_carries_location() {
        let fiscal = FiscalPeriod::parse("ar19", 0).unwrap();
        let mut broken = wrapper("2019");
        broken.period_type = Some(PeriodType::FullQuarter);
        let location = SourceLocation::table(Some("t7".to_string()), Some("a2".to_string()));
        match resolve_period(&broken, &fiscal, &location) {
            Err(ShiftError::UnsupportedFormat {
                table_id,
                article_id,
                ..
            }) => {
                assert_eq!(table_id.as_deref(), Some("t7"));
                assert_eq!(article_id.as_deref(), Some("a2"));
            }
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }

        let text_only = DateWrapper::text_only("Revenue");
        assert!(matches!(
            resolve_period(&text_only, &fiscal, &SourceLocation::default()),
            Err(ShiftError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_every_format_resolves_to_a_forward_span() {
        let classifier = PatternClassifier::default();
        let samples = [
            "2019", "FY 2019", "FY19", "'19", "2017 - 2019", "Q1 2019", "Q2 '19", "2019 Q3",
            "4th quarter 2019", "Q2", "2nd quarter", "January 31, 2019", "Jan. 31, 2019",
            "31 January 2019", "2019-01-31", "01/31/2019", "31-01-2019", "January 2019",
            "Jan 2019", "January 31", "Jan. 31", "January 1 to June 30, 2019",
            "January to June 2019", "Jan-Jun 2019", "January 1 to June 30", "January to June",
            "Jan-Jun", "Six months ended June 30, 2019", "Six months ended June 30",
            "YTD 2019", "YTD", "H1 2019", "HY 2019", "H2", "2019 vs 2018",
        ];
        let mut seen = std::collections::HashSet::new();
        for literal in ["ar19", "q219", "mr0519"] {
            let fiscal = FiscalPeriod::parse(literal, 0).unwrap();
            for text in samples {
                let w = DateWrapper::from_text(text, &classifier);
                seen.insert(w.format.unwrap());
                let period = resolve_period(&w, &fiscal, &SourceLocation::default())
                    .unwrap_or_else(|e| panic!("{} under {}: {}", text, literal, e));
                assert!(period.start < period.end, "{} under {}", text, literal);
            }
        }
        assert_eq!(seen.len(), PeriodFormat::ALL.len());
    }
}
