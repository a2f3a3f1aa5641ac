use crate::classifier::{Classification, PatternClassifier, PeriodMatch};
use crate::error::Result;
use crate::fiscal::FiscalPeriod;
use crate::format::{PeriodFormat, PeriodType};
use crate::report::SourceLocation;
use crate::resolve::{resolve_period, ResolvedPeriod};
use crate::utils::quarter_of_month;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw date fragments of a period expression. Zero means "not present".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragments {
    pub day: u32,
    pub month: u32,
    pub quarter: u32,
    pub year: i32,
    pub day_start: u32,
    pub month_start: u32,
    pub year_start: i32,
}

impl Fragments {
    pub fn has_year(&self) -> bool {
        self.year != 0
    }

    /// Fills every absent fragment from `other`.
    pub fn or(self, other: Fragments) -> Fragments {
        fn pick<T: PartialEq + Default>(a: T, b: T) -> T {
            if a == T::default() {
                b
            } else {
                a
            }
        }
        Fragments {
            day: pick(self.day, other.day),
            month: pick(self.month, other.month),
            quarter: pick(self.quarter, other.quarter),
            year: pick(self.year, other.year),
            day_start: pick(self.day_start, other.day_start),
            month_start: pick(self.month_start, other.month_start),
            year_start: pick(self.year_start, other.year_start),
        }
    }
}

/// Attributes of a date marker element as written in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateAttributes {
    pub text: String,
    pub period_type: Option<String>,
    pub format: Option<String>,
    pub flexible: Option<bool>,
    pub offset: Option<i32>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub start_day: Option<u32>,
    pub start_month: Option<u32>,
    pub start_year: Option<i32>,
}

impl DateAttributes {
    pub fn is_date_typed(&self) -> bool {
        self.period_type.is_some() || self.format.is_some()
    }

    fn fragments(&self) -> Fragments {
        Fragments {
            day: self.day.unwrap_or(0),
            month: self.month.unwrap_or(0),
            quarter: 0,
            year: self.year.unwrap_or(0),
            day_start: self.start_day.unwrap_or(0),
            month_start: self.start_month.unwrap_or(0),
            year_start: self.start_year.unwrap_or(0),
        }
    }
}

/// A period marker found in document content.
///
/// `period_type` and `format` are kept apart because markers written by
/// hand can pair them inconsistently; such pairs are rejected when the
/// wrapper is resolved. A wrapper with neither is the text-only variant.
#[derive(Debug, Clone, PartialEq)]
pub struct DateWrapper {
    pub text: String,
    pub period_type: Option<PeriodType>,
    pub format: Option<PeriodFormat>,
    pub flexible: bool,
    /// Year distance to the reporting year the marker was written for.
    pub offset: Option<i32>,
    pub fragments: Fragments,
    context: Option<Arc<DateWrapper>>,
    resolved: Option<ResolvedPeriod>,
}

impl DateWrapper {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            period_type: None,
            format: None,
            flexible: false,
            offset: None,
            fragments: Fragments::default(),
            context: None,
            resolved: None,
        }
    }

    pub fn from_match(text: impl Into<String>, period: PeriodMatch) -> Self {
        Self {
            text: text.into(),
            period_type: Some(period.period_type()),
            format: Some(period.format),
            flexible: true,
            offset: None,
            fragments: period.fragments,
            context: None,
            resolved: None,
        }
    }

    /// Classifies plain text; unrecognised text yields the text-only variant.
    pub fn from_text(text: &str, classifier: &PatternClassifier) -> Self {
        match classifier.classify(text) {
            Classification::Parsed(period) => Self::from_match(text.trim(), period),
            Classification::Unparsed => Self::text_only(text.trim()),
        }
    }

    /// Builds a wrapper from marker attributes. Fragments missing from the
    /// attributes are recovered by classifying the marker text when it has
    /// the same format.
    pub fn from_attributes(attrs: &DateAttributes, classifier: &PatternClassifier) -> Result<Self> {
        let format = attrs
            .format
            .as_deref()
            .map(str::parse::<PeriodFormat>)
            .transpose()?;
        let period_type = match attrs.period_type.as_deref() {
            Some(raw) => Some(raw.parse::<PeriodType>()?),
            None => format.map(|f| f.period_type()),
        };

        let classified = classifier.classify(&attrs.text).into_match();
        let (format, mut fragments) = match (format, classified) {
            (Some(f), Some(m)) if m.format == f => (Some(f), attrs.fragments().or(m.fragments)),
            (None, Some(m)) if period_type.is_none() || period_type == Some(m.period_type()) => {
                (Some(m.format), attrs.fragments().or(m.fragments))
            }
            (f, _) => (f, attrs.fragments()),
        };

        if fragments.quarter == 0 && fragments.month != 0 {
            if let Some(PeriodType::FullQuarter | PeriodType::ShortQuarter) = period_type {
                fragments.quarter = quarter_of_month(fragments.month);
            }
        }

        Ok(Self {
            text: attrs.text.trim().to_string(),
            period_type,
            format,
            flexible: attrs.flexible.unwrap_or(true),
            offset: attrs.offset,
            fragments,
            context: None,
            resolved: None,
        })
    }

    /// Attaches the single disambiguating context.
    pub fn with_context(mut self, context: Arc<DateWrapper>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn context(&self) -> Option<&DateWrapper> {
        self.context.as_deref()
    }

    pub fn is_parsed(&self) -> bool {
        self.period_type.is_some()
    }

    /// Derives the year offset of a flexible marker relative to the
    /// reporting year the document currently reflects.
    pub fn anchor_to(mut self, base_year: i32) -> Self {
        if self.flexible && self.offset.is_none() && self.fragments.has_year() {
            self.offset = Some(self.fragments.year - base_year);
        }
        if let Some(ctx) = self.context.take() {
            let anchored = Arc::unwrap_or_clone(ctx).anchor_to(base_year);
            self.context = Some(Arc::new(anchored));
        }
        self
    }

    /// Fragments as they apply to a reporting year: flexible markers with a
    /// known offset move with the reporting year, fixed ones keep theirs.
    pub fn anchored_fragments(&self, reporting_year: i32) -> Fragments {
        let mut fragments = self.fragments;
        if let (true, Some(offset), true) = (self.flexible, self.offset, fragments.has_year()) {
            let delta = reporting_year + offset - fragments.year;
            fragments.year += delta;
            if fragments.year_start != 0 {
                fragments.year_start += delta;
            }
        }
        fragments
    }

    /// Resolves the wrapper and remembers the result.
    pub fn resolve(
        &mut self,
        fiscal: &FiscalPeriod,
        location: &SourceLocation,
    ) -> Result<ResolvedPeriod> {
        let period = resolve_period(self, fiscal, location)?;
        self.resolved = Some(period.clone());
        Ok(period)
    }

    pub fn resolved(&self) -> Option<&ResolvedPeriod> {
        self.resolved.as_ref()
    }

    pub fn describe(&self) -> String {
        match (self.period_type, self.format) {
            (Some(t), Some(f)) => format!("'{}' ({} / {})", self.text, t, f),
            (Some(t), None) => format!("'{}' ({})", self.text, t),
            _ => format!("'{}' (text)", self.text),
        }
    }
}
