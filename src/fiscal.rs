use crate::config::ShiftConfig;
use crate::error::{Result, ShiftError};
use crate::utils::{
    expand_two_digit_year, first_day_of_month, fiscal_year_end, fiscal_year_end_month,
    fiscal_year_of, fiscal_year_start, last_day_of_month, quarter_of_month,
    validate_fiscal_year_offset,
};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Annual,
    Quarterly,
    Monthly,
    Unknown,
}

/// The reporting period a document reflects, as absolute dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiscalPeriod {
    pub reporting_period: String,
    pub project_type: ProjectType,
    /// Fiscal year label for annual reports, calendar year otherwise.
    pub year: i32,
    /// 1-4 for quarterly reports, 0 otherwise.
    pub quarter: u32,
    /// 1-12 for monthly reports, 0 otherwise.
    pub month: u32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub fiscal_year_offset: u32,
}

fn literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<kind>[mqa])(?P<index>r|\d{1,2})(?P<yy>\d{2})$")
            .expect("valid reporting period pattern")
    })
}

fn monthly_long_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^mr(?P<month>\d{2})(?P<yy>\d{2})$").expect("valid monthly period pattern")
    })
}

impl FiscalPeriod {
    /// Parses a reporting-period literal (`q119`, `ar23`, `mr0424`) or an
    /// ISO date (`2019-03-31`).
    pub fn parse(literal: &str, fiscal_year_offset: u32) -> Result<Self> {
        validate_fiscal_year_offset(fiscal_year_offset)?;
        let literal = literal.trim();
        let invalid = || ShiftError::InvalidReportingPeriod(literal.to_string());

        let period = if let Some(caps) = monthly_long_pattern().captures(literal) {
            let month: u32 = caps["month"].parse().map_err(|_| invalid())?;
            let year = expand_two_digit_year(caps["yy"].parse().map_err(|_| invalid())?);
            Self::monthly(literal, year, month, fiscal_year_offset)?
        } else if let Some(caps) = literal_pattern().captures(literal) {
            let year = expand_two_digit_year(caps["yy"].parse().map_err(|_| invalid())?);
            let index = &caps["index"];
            match &caps["kind"] {
                "a" => Self::annual(literal, year, fiscal_year_offset)?,
                "q" => {
                    let quarter: u32 = index.parse().map_err(|_| invalid())?;
                    Self::quarterly(literal, year, quarter, fiscal_year_offset)?
                }
                "m" => {
                    let month: u32 = index.parse().map_err(|_| invalid())?;
                    Self::monthly(literal, year, month, fiscal_year_offset)?
                }
                _ => return Err(invalid()),
            }
        } else if let Ok(date) = NaiveDate::parse_from_str(literal, "%Y-%m-%d") {
            Self::from_date(literal, date, fiscal_year_offset)?
        } else {
            return Err(invalid());
        };

        if period.period_start >= period.period_end {
            return Err(ShiftError::InvalidReportingPeriod(format!(
                "{} (start {} is not before end {})",
                literal, period.period_start, period.period_end
            )));
        }
        Ok(period)
    }

    /// Looks up the reporting period configured for a project.
    pub fn for_project(project_id: &str, config: &ShiftConfig) -> Result<Self> {
        let literal = config
            .projects
            .get(project_id)
            .ok_or_else(|| ShiftError::UnknownProject(project_id.to_string()))?;
        Self::parse(literal, config.fiscal_year_offset_months)
    }

    fn annual(literal: &str, year: i32, offset: u32) -> Result<Self> {
        Ok(Self {
            reporting_period: literal.to_string(),
            project_type: ProjectType::Annual,
            year,
            quarter: 0,
            month: 0,
            period_start: fiscal_year_start(year, offset)?,
            period_end: fiscal_year_end(year, offset)?,
            fiscal_year_offset: offset,
        })
    }

    fn quarterly(literal: &str, year: i32, quarter: u32, offset: u32) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(ShiftError::InvalidReportingPeriod(literal.to_string()));
        }
        Ok(Self {
            reporting_period: literal.to_string(),
            project_type: ProjectType::Quarterly,
            year,
            quarter,
            month: 0,
            period_start: first_day_of_month(year, quarter * 3 - 2)?,
            period_end: last_day_of_month(year, quarter * 3)?,
            fiscal_year_offset: offset,
        })
    }

    fn monthly(literal: &str, year: i32, month: u32, offset: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ShiftError::InvalidReportingPeriod(literal.to_string()));
        }
        Ok(Self {
            reporting_period: literal.to_string(),
            project_type: ProjectType::Monthly,
            year,
            quarter: 0,
            month,
            period_start: first_day_of_month(year, month)?,
            period_end: last_day_of_month(year, month)?,
            fiscal_year_offset: offset,
        })
    }

    fn from_date(literal: &str, date: NaiveDate, offset: u32) -> Result<Self> {
        let is_month_end = last_day_of_month(date.year(), date.month())? == date;
        let fiscal_year = fiscal_year_of(date, offset);

        if is_month_end && date.month() == fiscal_year_end_month(offset) {
            let mut period = Self::annual(literal, fiscal_year, offset)?;
            period.period_end = date;
            return Ok(period);
        }
        if is_month_end && date.month() % 3 == 0 {
            return Self::quarterly(literal, date.year(), quarter_of_month(date.month()), offset);
        }
        if is_month_end {
            return Self::monthly(literal, date.year(), date.month(), offset);
        }

        Ok(Self {
            reporting_period: literal.to_string(),
            project_type: ProjectType::Unknown,
            year: fiscal_year,
            quarter: 0,
            month: 0,
            period_start: fiscal_year_start(fiscal_year, offset)?,
            period_end: date,
            fiscal_year_offset: offset,
        })
    }

    /// Label of the fiscal year containing the period end.
    pub fn fiscal_year(&self) -> i32 {
        fiscal_year_of(self.period_end, self.fiscal_year_offset)
    }

    pub fn fiscal_year_start(&self) -> Result<NaiveDate> {
        fiscal_year_start(self.fiscal_year(), self.fiscal_year_offset)
    }

    pub fn fiscal_year_end(&self) -> Result<NaiveDate> {
        fiscal_year_end(self.fiscal_year(), self.fiscal_year_offset)
    }
}
