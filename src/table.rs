//! Table model and the table context resolver.
//!
//! A report table carries its period information either in the header
//! (one marker per column, possibly split over two rows such as a year
//! spanning its quarters) or in the body (rows whose only content is a
//! date marker and which govern the rows below them). The resolver works
//! out which [`DateWrapper`] governs each fact cell.

use crate::classifier::PatternClassifier;
use crate::document::{FactContext, ProcessingInstruction};
use crate::error::Result;
use crate::fiscal::FiscalPeriod;
use crate::period::FactPeriod;
use crate::report::{Diagnostics, SourceLocation};
use crate::resolve::ResolvedPeriod;
use crate::shift::shift_period;
use crate::utils::{
    first_day_of_month, fiscal_year_end, fiscal_year_of, fiscal_year_start, quarter_of_month,
};
use crate::wrapper::{DateAttributes, DateWrapper};
use chrono::Datelike;
use log::debug;
use std::sync::Arc;

/// Largest `colspan` browsers honour.
pub const MAX_COLSPAN: usize = 1000;
/// Largest `rowspan` browsers honour.
pub const MAX_ROWSPAN: usize = 65534;

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub text: String,
    pub colspan: usize,
    pub rowspan: usize,
    /// `th` rather than `td`.
    pub header: bool,
    pub marker: Option<DateAttributes>,
    pub facts: Vec<FactContext>,
}

impl TableCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            colspan: 1,
            rowspan: 1,
            header: false,
            marker: None,
            facts: Vec::new(),
        }
    }

    pub fn colspan(&self) -> usize {
        self.colspan.clamp(1, MAX_COLSPAN)
    }

    pub fn rowspan(&self) -> usize {
        self.rowspan.clamp(1, MAX_ROWSPAN)
    }

    pub fn has_marker(&self) -> bool {
        self.marker
            .as_ref()
            .is_some_and(DateAttributes::is_date_typed)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    pub instruction: Option<ProcessingInstruction>,
}

impl TableRow {
    pub fn is_header_only(&self) -> bool {
        !self.cells.is_empty() && self.cells.iter().all(|cell| cell.header)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub id: Option<String>,
    pub article_id: Option<String>,
    pub header: Vec<TableRow>,
    pub body: Vec<TableRow>,
}

impl Table {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::table(self.id.clone(), self.article_id.clone())
    }
}

/// One grid position of a normalized header.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderSlot {
    Cell(TableCell),
    /// Covered by a row-spanning cell from a row above.
    Placeholder,
}

impl HeaderSlot {
    pub fn cell(&self) -> Option<&TableCell> {
        match self {
            HeaderSlot::Cell(cell) => Some(cell),
            HeaderSlot::Placeholder => None,
        }
    }
}

/// Expands merged header cells into a rectangular-ish grid: a cell with
/// `colspan = n` becomes `n` clones, and every row covered by a `rowspan`
/// gets a placeholder at that column.
pub fn normalize_header(rows: &[TableRow]) -> Vec<Vec<HeaderSlot>> {
    // rows still covered per column by a rowspan from above
    let mut covered: Vec<usize> = Vec::new();
    let mut grid = Vec::with_capacity(rows.len());

    for row in rows {
        let mut slots = Vec::new();
        let mut col = 0;

        for cell in &row.cells {
            while covered.get(col).copied().unwrap_or(0) > 0 {
                covered[col] -= 1;
                slots.push(HeaderSlot::Placeholder);
                col += 1;
            }
            for _ in 0..cell.colspan() {
                if covered.len() <= col {
                    covered.resize(col + 1, 0);
                }
                covered[col] = cell.rowspan() - 1;
                slots.push(HeaderSlot::Cell(TableCell {
                    colspan: 1,
                    rowspan: 1,
                    ..cell.clone()
                }));
                col += 1;
            }
        }

        if let Some(last) = covered.iter().rposition(|rows| *rows > 0) {
            for rows in covered.iter_mut().take(last + 1).skip(col) {
                *rows = rows.saturating_sub(1);
                slots.push(HeaderSlot::Placeholder);
            }
        }

        grid.push(slots);
    }

    grid
}

/// Starting column of every body cell. Columns still covered by a
/// `rowspan` from a row above are skipped.
pub fn body_columns(rows: &[TableRow]) -> Vec<Vec<usize>> {
    // rows still covered per column, the current row included
    let mut covered: Vec<usize> = Vec::new();

    rows.iter()
        .map(|row| {
            let mut starts = Vec::with_capacity(row.cells.len());
            let mut col = 0;
            for cell in &row.cells {
                while covered.get(col).copied().unwrap_or(0) > 0 {
                    col += 1;
                }
                starts.push(col);
                let span = cell.colspan();
                if covered.len() < col + span {
                    covered.resize(col + span, 0);
                }
                for rows in &mut covered[col..col + span] {
                    *rows = cell.rowspan();
                }
                col += span;
            }
            for rows in covered.iter_mut() {
                *rows = rows.saturating_sub(1);
            }
            starts
        })
        .collect()
}

/// The marker(s) governing one fact.
#[derive(Debug, Clone, PartialEq)]
pub enum Governing {
    Single(DateWrapper),
    /// Balance comparison: from the start of `current` to the end of `next`.
    Comparison {
        current: DateWrapper,
        next: DateWrapper,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactAssignment {
    pub fact: FactContext,
    pub location: SourceLocation,
    pub governing: Governing,
}

impl FactAssignment {
    /// Resolves the governing markers as written for the `base` period,
    /// carries them onto `target` and shapes the result after the fact's
    /// instruction and its existing period kind.
    pub fn resolve(
        &mut self,
        base: &FiscalPeriod,
        target: &FiscalPeriod,
        existing: &FactPeriod,
        diagnostics: &mut Diagnostics,
    ) -> Result<FactPeriod> {
        let location = &self.location;
        let resolved = match &mut self.governing {
            Governing::Single(wrapper) => {
                carry_forward(wrapper, base, target, location, diagnostics)?
            }
            Governing::Comparison { current, next } => {
                let from = carry_forward(current, base, target, location, diagnostics)?;
                let to = carry_forward(next, base, target, location, diagnostics)?;
                ResolvedPeriod {
                    start: from.start,
                    end: to.end,
                    fallback: from.fallback.or(to.fallback),
                }
            }
        };

        if let Some(note) = &resolved.fallback {
            diagnostics.warn(location, note.clone());
        }

        let comparison = matches!(self.governing, Governing::Comparison { .. });
        to_fact_period(
            &resolved,
            self.fact.instruction,
            existing.is_instant() && !comparison,
            target,
        )
    }
}

/// Period of a marker in the target reporting period. Fixed markers keep
/// the period they name.
fn carry_forward(
    wrapper: &mut DateWrapper,
    base: &FiscalPeriod,
    target: &FiscalPeriod,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<ResolvedPeriod> {
    let resolved = wrapper.resolve(base, location)?;
    if !wrapper.flexible {
        return Ok(resolved);
    }
    let written = FactPeriod::Duration {
        start: resolved.start_date(),
        end: resolved.end_date(),
    };
    let moved = shift_period(&written, base, target, location, diagnostics)?;
    Ok(ResolvedPeriod {
        fallback: resolved.fallback,
        ..ResolvedPeriod::days(moved.start(), moved.end())
    })
}

/// Turns a resolved period into a stored fact period. Stick instructions
/// replace it with a calendar anchor and always yield an instant.
pub fn to_fact_period(
    resolved: &ResolvedPeriod,
    instruction: Option<ProcessingInstruction>,
    instant: bool,
    fiscal: &FiscalPeriod,
) -> Result<FactPeriod> {
    let offset = fiscal.fiscal_year_offset;
    let end = resolved.end_date();

    Ok(match instruction {
        Some(ProcessingInstruction::StickToPeriodStart) => {
            FactPeriod::Instant(resolved.start_date())
        }
        Some(ProcessingInstruction::StickToQuarterStart) => FactPeriod::Instant(
            first_day_of_month(end.year(), quarter_of_month(end.month()) * 3 - 2)?,
        ),
        Some(ProcessingInstruction::StickToYearStart) => {
            FactPeriod::Instant(fiscal_year_start(fiscal_year_of(end, offset), offset)?)
        }
        Some(ProcessingInstruction::StickToYearEnd) => {
            FactPeriod::Instant(fiscal_year_end(fiscal_year_of(end, offset), offset)?)
        }
        _ if instant => FactPeriod::Instant(end),
        _ => FactPeriod::Duration {
            start: resolved.start_date(),
            end,
        },
    })
}

pub struct TableContextResolver<'a> {
    classifier: &'a PatternClassifier,
    /// Reporting year the document reflects; flexible markers are anchored to it.
    base_year: i32,
}

impl<'a> TableContextResolver<'a> {
    pub fn new(classifier: &'a PatternClassifier, base_year: i32) -> Self {
        Self {
            classifier,
            base_year,
        }
    }

    fn wrapper_for(
        &self,
        cell: &TableCell,
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
    ) -> DateWrapper {
        match &cell.marker {
            Some(attrs) if attrs.is_date_typed() => {
                match DateWrapper::from_attributes(attrs, self.classifier) {
                    Ok(wrapper) => wrapper,
                    Err(e) => {
                        diagnostics.warn(
                            location,
                            format!("date marker '{}' ignored: {}", attrs.text, e),
                        );
                        DateWrapper::from_text(&cell.text, self.classifier)
                    }
                }
            }
            _ => DateWrapper::from_text(&cell.text, self.classifier),
        }
    }

    /// One wrapper per header column. Columns without a marker get the
    /// text-only variant.
    pub fn column_wrappers(&self, table: &Table, diagnostics: &mut Diagnostics) -> Vec<DateWrapper> {
        let location = table.location();
        let grid = normalize_header(&table.header);

        let rows: Vec<Vec<Option<(DateWrapper, bool)>>> = grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|slot| {
                        slot.cell().map(|cell| {
                            (self.wrapper_for(cell, &location, diagnostics), cell.has_marker())
                        })
                    })
                    .collect()
            })
            .collect();

        let parsed_rows: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().flatten().any(|(w, _)| w.is_parsed()))
            .map(|(idx, _)| idx)
            .collect();
        let Some(&lower) = parsed_rows.last() else {
            return Vec::new();
        };

        let explicit = |idx: usize| rows[idx].iter().flatten().any(|(_, marked)| *marked);
        let upper = lower.checked_sub(1).filter(|idx| parsed_rows.contains(idx));
        let (primary, context) = match upper {
            // the upper row holds the real markers and the lower one is
            // only recognisable text
            Some(upper) if explicit(upper) && !explicit(lower) => (upper, Some(lower)),
            Some(upper) => (lower, Some(upper)),
            None => (lower, None),
        };
        debug!(
            "table {}: header row {} is primary, context row {:?}",
            location.table_id.as_deref().unwrap_or("-"),
            primary,
            context
        );

        let at = |row: usize, col: usize| -> Option<&DateWrapper> {
            rows[row].get(col).and_then(Option::as_ref).map(|(w, _)| w)
        };
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);

        (0..width)
            .map(|col| {
                let main = at(primary, col).filter(|w| w.is_parsed());
                let ctx = context
                    .and_then(|row| at(row, col))
                    .filter(|w| w.is_parsed());
                let wrapper = match (main, ctx) {
                    (Some(main), Some(ctx)) => main.clone().with_context(Arc::new(ctx.clone())),
                    (Some(main), None) => main.clone(),
                    (None, Some(ctx)) => ctx.clone(),
                    (None, None) => at(primary, col)
                        .cloned()
                        .unwrap_or_else(|| DateWrapper::text_only("")),
                };
                wrapper.anchor_to(self.base_year)
            })
            .collect()
    }

    fn row_marker(
        &self,
        row: &TableRow,
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
    ) -> Option<DateWrapper> {
        row.cells
            .iter()
            .filter(|cell| cell.has_marker() || cell.header)
            .map(|cell| self.wrapper_for(cell, location, diagnostics))
            .find(DateWrapper::is_parsed)
            .map(|wrapper| wrapper.anchor_to(self.base_year))
    }

    fn row_header(
        &self,
        cell: &TableCell,
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
    ) -> Option<DateWrapper> {
        if !(cell.header || cell.has_marker()) {
            return None;
        }
        Some(self.wrapper_for(cell, location, diagnostics))
            .filter(DateWrapper::is_parsed)
            .map(|wrapper| wrapper.anchor_to(self.base_year))
    }

    fn combine(&self, row: Option<&DateWrapper>, column: Option<&DateWrapper>) -> Option<DateWrapper> {
        match (row, column) {
            (Some(row), Some(column)) => Some(
                row.clone()
                    .with_context(Arc::new(column.clone()))
                    .anchor_to(self.base_year),
            ),
            (Some(row), None) => Some(row.clone()),
            (None, Some(column)) => Some(column.clone()),
            (None, None) => None,
        }
    }

    /// Assigns the governing marker(s) to every fact in the table body.
    pub fn assign(&self, table: &Table, diagnostics: &mut Diagnostics) -> Vec<FactAssignment> {
        let columns = self.column_wrappers(table, diagnostics);
        if columns.iter().any(DateWrapper::is_parsed) {
            self.assign_by_column(table, &columns, diagnostics)
        } else {
            self.assign_by_marker_rows(table, diagnostics)
        }
    }

    fn assign_by_column(
        &self,
        table: &Table,
        columns: &[DateWrapper],
        diagnostics: &mut Diagnostics,
    ) -> Vec<FactAssignment> {
        let location = table.location();
        let column_at = |col: usize| columns.get(col).filter(|w| w.is_parsed());
        let mut assignments = Vec::new();

        let layout = body_columns(&table.body);
        // row header spanning down: rows it still covers and its marker
        let mut label: Option<(usize, Option<DateWrapper>)> = None;

        for (row, starts) in table.body.iter().zip(&layout) {
            let row_wrapper = match (row.cells.first(), starts.first()) {
                (Some(cell), Some(0)) => {
                    let wrapper = self.row_header(cell, &location, diagnostics);
                    label = (cell.rowspan() > 1).then(|| (cell.rowspan() - 1, wrapper.clone()));
                    wrapper
                }
                _ => match &mut label {
                    Some((rows, wrapper)) if *rows > 0 => {
                        *rows -= 1;
                        wrapper.clone()
                    }
                    _ => None,
                },
            };

            for (cell, &column) in row.cells.iter().zip(starts) {
                for fact in &cell.facts {
                    let fact = with_row_instruction(fact, row);
                    let fact_location = location.with_fact(&fact.fact_id);

                    if column >= columns.len() && row_wrapper.is_none() {
                        diagnostics.warn(
                            &fact_location,
                            format!(
                                "column {} lies beyond the {} header columns; left unshifted",
                                column,
                                columns.len()
                            ),
                        );
                        continue;
                    }
                    let Some(current) = self.combine(row_wrapper.as_ref(), column_at(column))
                    else {
                        diagnostics.warn(
                            &fact_location,
                            format!("no date marker governs column {}; left unshifted", column),
                        );
                        continue;
                    };

                    let governing = if fact.instruction
                        == Some(ProcessingInstruction::BalanceComparison)
                    {
                        match column_at(column + 1)
                            .and_then(|next| self.combine(row_wrapper.as_ref(), Some(next)))
                        {
                            Some(next) => Governing::Comparison { current, next },
                            None => {
                                diagnostics.warn(
                                    &fact_location,
                                    "balance comparison has no next date marker; left unshifted",
                                );
                                continue;
                            }
                        }
                    } else {
                        Governing::Single(current)
                    };

                    assignments.push(FactAssignment {
                        fact,
                        location: fact_location,
                        governing,
                    });
                }
            }
        }

        assignments
    }

    fn assign_by_marker_rows(
        &self,
        table: &Table,
        diagnostics: &mut Diagnostics,
    ) -> Vec<FactAssignment> {
        let location = table.location();
        let markers: Vec<Option<DateWrapper>> = table
            .body
            .iter()
            .map(|row| self.row_marker(row, &location, diagnostics))
            .collect();
        let wrappers: Vec<&DateWrapper> = markers.iter().flatten().collect();

        if wrappers.is_empty() {
            diagnostics.warn(&location, "table has no date markers; skipped");
            return Vec::new();
        }

        let mut assignments = Vec::new();
        let mut seen: usize = 0;
        for (row, marker) in table.body.iter().zip(&markers) {
            if marker.is_some() {
                seen += 1;
            }
            for fact in row.cells.iter().flat_map(|cell| &cell.facts) {
                let fact = with_row_instruction(fact, row);
                let fact_location = location.with_fact(&fact.fact_id);

                let Some(current) = seen.checked_sub(1).and_then(|n| wrappers.get(n)) else {
                    diagnostics.warn(
                        &fact_location,
                        "fact precedes every date marker row; left unshifted",
                    );
                    continue;
                };

                let governing = if fact.instruction == Some(ProcessingInstruction::BalanceComparison)
                {
                    match wrappers.get(seen) {
                        Some(next) => Governing::Comparison {
                            current: (*current).clone(),
                            next: (*next).clone(),
                        },
                        None => {
                            diagnostics.warn(
                                &fact_location,
                                "balance comparison has no next date marker; left unshifted",
                            );
                            continue;
                        }
                    }
                } else {
                    Governing::Single((*current).clone())
                };

                assignments.push(FactAssignment {
                    fact,
                    location: fact_location,
                    governing,
                });
            }
        }

        assignments
    }
}

fn with_row_instruction(fact: &FactContext, row: &TableRow) -> FactContext {
    let mut fact = fact.clone();
    if fact.instruction.is_none() {
        fact.instruction = row.instruction;
    }
    fact
}
