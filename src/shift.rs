//! The period shift engine.
//!
//! A run reads the document, fetches the stored period of every fact in one
//! batched call, computes each fact's period in the target reporting period
//! and writes accepted changes back one fact at a time. Failures that concern
//! a single fact are logged and the run continues; only an unparsable
//! reporting period or a failed read ends the run early.

use crate::classifier::PatternClassifier;
use crate::config::ShiftConfig;
use crate::document::{Document, ProcessingInstruction};
use crate::error::Result;
use crate::fiscal::FiscalPeriod;
use crate::period::{FactPeriod, ParsedFactPeriod};
use crate::report::{Diagnostics, ShiftCounts, ShiftReport, SourceLocation};
use crate::store::{MappingCluster, MappingStore};
use crate::table::{FactAssignment, TableContextResolver};
use crate::utils::{day_before, safe_ymd, same_day_and_month, shift_years};
use chrono::{Datelike, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const HIDDEN: &str = "hidden";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShiftStrategy {
    /// Move every date by its relation to the base period.
    #[default]
    BaseRelative,
    /// Take each fact's period from the table markers that govern it.
    TableContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftRequest {
    pub project_id: String,
    /// HTML of the report.
    pub document: String,
    /// Reporting period the document reflects now.
    pub base: String,
    /// Reporting period to shift to.
    pub target: String,
    #[serde(default)]
    pub strategy: ShiftStrategy,
}

/// Moves one date from the base reporting period onto the target one.
pub fn shift_date(
    date: NaiveDate,
    base: &FiscalPeriod,
    target: &FiscalPeriod,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<NaiveDate> {
    let years = target.year - base.year;

    if date == base.period_start {
        return Ok(target.period_start);
    }
    if date == base.period_end {
        return Ok(target.period_end);
    }
    if (date.month(), date.day()) == (1, 1) || (date.month(), date.day()) == (12, 31) {
        return shift_years(date, years);
    }
    if same_day_and_month(date, base.period_start) {
        return safe_ymd(
            date.year() + years,
            target.period_start.month(),
            target.period_start.day(),
        );
    }
    if same_day_and_month(date, base.period_end) {
        return safe_ymd(
            date.year() + years,
            target.period_end.month(),
            target.period_end.day(),
        );
    }
    if date == day_before(base.period_start)? {
        return day_before(target.period_start);
    }

    diagnostics.debug(
        location,
        format!(
            "{} has no relation to the base period {}; shifting its year only",
            date, base.reporting_period
        ),
    );
    shift_years(date, years)
}

pub fn shift_base_relative(
    period: &FactPeriod,
    base: &FiscalPeriod,
    target: &FiscalPeriod,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<FactPeriod> {
    period.try_map(|date| shift_date(date, base, target, location, diagnostics))
}

/// Moves a period read off the base document onto the target reporting
/// period. A period with the shape of the base period in another year (a
/// prior-year comparative) keeps its year distance to the target period;
/// any other period moves date by date.
pub fn shift_period(
    period: &FactPeriod,
    base: &FiscalPeriod,
    target: &FiscalPeriod,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<FactPeriod> {
    if let FactPeriod::Duration { start, end } = *period {
        let years = end.year() - base.period_end.year();
        if same_day_and_month(start, base.period_start)
            && same_day_and_month(end, base.period_end)
            && start.year() - base.period_start.year() == years
        {
            return Ok(FactPeriod::Duration {
                start: shift_years(target.period_start, years)?,
                end: shift_years(target.period_end, years)?,
            });
        }
    }
    shift_base_relative(period, base, target, location, diagnostics)
}

/// Why a computed period cannot be stored as is.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    NotForward,
    BeyondTarget(String),
}

fn check_period(
    period: &FactPeriod,
    target: &FiscalPeriod,
    instruction: Option<ProcessingInstruction>,
) -> std::result::Result<(), Rejection> {
    if let FactPeriod::Duration { start, end } = period {
        if start >= end {
            return Err(Rejection::NotForward);
        }
    }
    if instruction == Some(ProcessingInstruction::AllowFuturePeriods) {
        return Ok(());
    }

    let limit = target.period_end;
    let message = match *period {
        FactPeriod::Instant(date) if date > limit => {
            Some(format!("date {} lies beyond the target period end {}", date, limit))
        }
        FactPeriod::Duration { start, end } if start > limit && end > limit => Some(format!(
            "start {} and end {} both lie beyond the target period end {}",
            start, end, limit
        )),
        FactPeriod::Duration { start, .. } if start > limit => Some(format!(
            "start {} lies beyond the target period end {}",
            start, limit
        )),
        FactPeriod::Duration { end, .. } if end > limit => Some(format!(
            "end {} lies beyond the target period end {}",
            end, limit
        )),
        _ => None,
    };
    match message {
        Some(message) => Err(Rejection::BeyondTarget(message)),
        None => Ok(()),
    }
}

pub struct PeriodShifter<'a> {
    store: &'a dyn MappingStore,
    config: &'a ShiftConfig,
    classifier: PatternClassifier,
}

impl<'a> PeriodShifter<'a> {
    pub fn new(store: &'a dyn MappingStore, config: &'a ShiftConfig) -> Self {
        Self {
            store,
            config,
            classifier: config.classifier(),
        }
    }

    /// Runs one shift. Always returns a report; `success` is false only when
    /// the run could not get past reading its inputs.
    pub async fn shift(&self, request: &ShiftRequest) -> ShiftReport {
        let mut diagnostics = Diagnostics::new();
        let mut counts = ShiftCounts::default();
        let run = SourceLocation::default();

        info!(
            "Shifting project {} from {} to {} ({:?})",
            request.project_id, request.base, request.target, request.strategy
        );

        let offset = self.config.fiscal_year_offset_months;
        let periods = FiscalPeriod::parse(&request.base, offset)
            .and_then(|base| Ok((base, FiscalPeriod::parse(&request.target, offset)?)));
        let (base, target) = match periods {
            Ok(periods) => periods,
            Err(e) => {
                diagnostics.error(&run, e.to_string());
                return ShiftReport::new(false, "Reporting period could not be parsed", counts, diagnostics);
            }
        };

        let document = Document::parse_html(&request.document);
        let fact_ids = document.unique_fact_ids();
        counts.found = document.facts.len();
        counts.unique = fact_ids.len();
        if fact_ids.is_empty() {
            diagnostics.warn(&run, "document contains no fact markers");
            return ShiftReport::new(true, "No facts to shift", counts, diagnostics);
        }

        let clusters = match self.store.fetch_clusters(&request.project_id, &fact_ids).await {
            Ok(clusters) => clusters,
            Err(e) => {
                diagnostics.error(&run, format!("reading mapping data failed: {}", e));
                return ShiftReport::new(false, "Mapping data could not be read", counts, diagnostics);
            }
        };
        let clusters: HashMap<String, MappingCluster> = clusters
            .into_iter()
            .map(|cluster| (cluster.fact_id.clone(), cluster))
            .collect();

        let mut assignments = match request.strategy {
            ShiftStrategy::TableContext => self.table_assignments(&document, base.year, &mut diagnostics),
            ShiftStrategy::BaseRelative => HashMap::new(),
        };

        for fact_id in &fact_ids {
            let Some(fact) = document.fact(fact_id) else {
                continue;
            };
            let location = SourceLocation {
                fact_id: Some(fact.fact_id.clone()),
                table_id: fact.table_id.clone(),
                article_id: fact.article_id.clone(),
            };

            let Some(cluster) = clusters.get(fact_id) else {
                diagnostics.warn(&location, "no mapping cluster found; skipped");
                continue;
            };
            let Some(entry) = cluster.internal() else {
                diagnostics.warn(&location, "mapping cluster has no internal entry; skipped");
                continue;
            };
            counts.investigated += 1;

            let Some(raw) = entry.period.as_deref() else {
                diagnostics.warn(&location, "internal entry has no period; skipped");
                continue;
            };
            let existing = match ParsedFactPeriod::parse(raw, entry.is_absolute) {
                Ok(existing) => existing,
                Err(e) => {
                    diagnostics.error(&location, e.to_string());
                    counts.rejected += 1;
                    continue;
                }
            };
            if existing.is_absolute {
                diagnostics.debug(&location, format!("fixed period {} kept", existing.period));
                counts.unchanged += 1;
                continue;
            }

            let computed = match request.strategy {
                ShiftStrategy::BaseRelative => {
                    shift_base_relative(&existing.period, &base, &target, &location, &mut diagnostics)
                }
                ShiftStrategy::TableContext => match assignments.get_mut(fact_id) {
                    Some(assignment) => {
                        assignment.resolve(&base, &target, &existing.period, &mut diagnostics)
                    }
                    None => {
                        diagnostics.warn(&location, "no table date marker governs this fact; skipped");
                        continue;
                    }
                },
            };
            let period = match computed {
                Ok(period) => period,
                Err(e) => {
                    diagnostics.error(&location, e.to_string());
                    counts.rejected += 1;
                    continue;
                }
            };

            if period == existing.period {
                diagnostics.debug(&location, format!("period {} already current", period));
                counts.unchanged += 1;
                continue;
            }

            let mut hide = false;
            match check_period(&period, &target, fact.instruction) {
                Ok(()) => {}
                Err(Rejection::NotForward) => {
                    diagnostics.error(
                        &location,
                        format!(
                            "shift of {} to {} rejected: start is not before end",
                            existing.period, period
                        ),
                    );
                    counts.rejected += 1;
                    continue;
                }
                Err(Rejection::BeyondTarget(message))
                    if fact.instruction == Some(ProcessingInstruction::HideFutureElements) =>
                {
                    diagnostics.warn(&location, format!("{}; element hidden", message));
                    hide = true;
                }
                Err(Rejection::BeyondTarget(message)) => {
                    diagnostics.error(
                        &location,
                        format!(
                            "shift of {} to {} rejected: {}",
                            existing.period, period, message
                        ),
                    );
                    counts.rejected += 1;
                    continue;
                }
            }

            let update = updated_cluster(cluster, &request.project_id, &period, hide);
            match self.store.update_cluster(&request.project_id, &update).await {
                Ok(()) => {
                    diagnostics.debug(&location, format!("{} -> {}", existing.period, period));
                    counts.shifted += 1;
                }
                Err(e) => {
                    diagnostics.error(&location, format!("writing {} failed: {}", period, e));
                    counts.failed_writes += 1;
                }
            }
        }

        let message = format!(
            "Shifted {} of {} facts ({} unchanged, {} rejected, {} failed writes)",
            counts.shifted, counts.investigated, counts.unchanged, counts.rejected, counts.failed_writes
        );
        info!("{}", message);
        ShiftReport::new(true, message, counts, diagnostics)
    }

    fn table_assignments(
        &self,
        document: &Document,
        base_year: i32,
        diagnostics: &mut Diagnostics,
    ) -> HashMap<String, FactAssignment> {
        let resolver = TableContextResolver::new(&self.classifier, base_year);
        let mut assignments = HashMap::new();
        for table in &document.tables {
            for assignment in resolver.assign(table, diagnostics) {
                assignments
                    .entry(assignment.fact.fact_id.clone())
                    .or_insert(assignment);
            }
        }
        assignments
    }
}

fn updated_cluster(
    cluster: &MappingCluster,
    project_id: &str,
    period: &FactPeriod,
    hide: bool,
) -> MappingCluster {
    let mut update = cluster.for_update(project_id);
    if let Some(entry) = update.internal_mut() {
        entry.period = Some(period.to_string());
        if hide {
            entry.display_option = Some(HIDDEN.to_string());
        }
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn shift(raw: &str, base: &str, target: &str) -> String {
        let base = FiscalPeriod::parse(base, 0).unwrap();
        let target = FiscalPeriod::parse(target, 0).unwrap();
        let period: FactPeriod = raw.parse().unwrap();
        shift_base_relative(
            &period,
            &base,
            &target,
            &SourceLocation::default(),
            &mut Diagnostics::new(),
        )
        .unwrap()
        .to_string()
    }

    #[test]
    fn test_exact_base_bounds_map_to_target_bounds() {
        assert_eq!(shift("20190101_20191231", "ar19", "ar20"), "20200101_20201231");
        assert_eq!(shift("20190101_20190331", "q119", "q219"), "20190401_20190630");
    }

    #[test]
    fn test_year_boundaries_shift_year_only() {
        // YTD: Jan 1 keeps its day, the base end moves to the target end
        assert_eq!(shift("20190101_20190930", "q319", "q419"), "20190101_20191231");
        assert_eq!(shift("20181231", "q319", "q320"), "20191231");
    }

    #[test]
    fn test_day_and_month_of_base_bounds() {
        // prior-year comparative of the base quarter
        assert_eq!(shift("20180401_20180630", "q219", "q319"), "20180701_20180930");
    }

    #[test]
    fn test_day_before_base_start() {
        assert_eq!(shift("20190331", "q219", "q319"), "20190630");
    }

    #[test]
    fn test_unrelated_dates_keep_day_and_month() {
        let base = FiscalPeriod::parse("ar19", 0).unwrap();
        let target = FiscalPeriod::parse("ar20", 0).unwrap();
        let mut diagnostics = Diagnostics::new();
        let moved = shift_date(
            date(2019, 5, 17),
            &base,
            &target,
            &SourceLocation::default(),
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(moved, date(2020, 5, 17));
        assert_eq!(diagnostics.entries().len(), 1);
    }

    fn carry(raw: &str, base: &str, target: &str) -> String {
        let base = FiscalPeriod::parse(base, 0).unwrap();
        let target = FiscalPeriod::parse(target, 0).unwrap();
        let period: FactPeriod = raw.parse().unwrap();
        shift_period(
            &period,
            &base,
            &target,
            &SourceLocation::default(),
            &mut Diagnostics::new(),
        )
        .unwrap()
        .to_string()
    }

    #[test]
    fn test_comparative_periods_keep_their_year_distance() {
        // Q4 2018 next to Q4 2019 becomes Q1 2019 next to Q1 2020
        assert_eq!(carry("20191001_20191231", "q419", "q120"), "20200101_20200331");
        assert_eq!(carry("20181001_20181231", "q419", "q120"), "20190101_20190331");
        assert_eq!(carry("20180101_20181231", "ar19", "ar20"), "20190101_20191231");
        // anything else falls back to the date rules
        assert_eq!(carry("20190101_20190331", "ar19", "ar20"), "20200101_20200331");
        assert_eq!(carry("20191231", "q419", "q120"), "20200331");
    }

    #[test]
    fn test_leap_day_shift_falls_back() {
        assert_eq!(shift("20200229", "ar20", "ar21"), "20210228");
    }

    #[test]
    fn test_check_period_bounds() {
        let target = FiscalPeriod::parse("ar20", 0).unwrap();
        let beyond: FactPeriod = "20211231".parse().unwrap();
        assert!(matches!(
            check_period(&beyond, &target, None),
            Err(Rejection::BeyondTarget(_))
        ));
        assert!(check_period(&beyond, &target, Some(ProcessingInstruction::AllowFuturePeriods)).is_ok());

        let end_only: FactPeriod = "20200101_20210131".parse().unwrap();
        match check_period(&end_only, &target, None) {
            Err(Rejection::BeyondTarget(message)) => assert!(message.starts_with("end ")),
            other => panic!("unexpected {:?}", other),
        }
        let both: FactPeriod = "20210101_20211231".parse().unwrap();
        match check_period(&both, &target, None) {
            Err(Rejection::BeyondTarget(message)) => assert!(message.contains("both")),
            other => panic!("unexpected {:?}", other),
        }

        let backwards = FactPeriod::Duration {
            start: date(2020, 6, 30),
            end: date(2020, 1, 1),
        };
        assert_eq!(
            check_period(&backwards, &target, Some(ProcessingInstruction::AllowFuturePeriods)),
            Err(Rejection::NotForward)
        );
    }

    #[test]
    fn test_request_strategy_defaults_to_base_relative() {
        let request: ShiftRequest = serde_json::from_str(
            r#"{"project_id": "acme", "document": "", "base": "ar19", "target": "ar20"}"#,
        )
        .unwrap();
        assert_eq!(request.strategy, ShiftStrategy::BaseRelative);

        let request: ShiftRequest = serde_json::from_str(
            r#"{"project_id": "acme", "document": "", "base": "ar19", "target": "ar20", "strategy": "table-context"}"#,
        )
        .unwrap();
        assert_eq!(request.strategy, ShiftStrategy::TableContext);
    }
}
