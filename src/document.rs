//! Reading facts, tables and date markers out of an HTML report.

use crate::error::ShiftError;
use crate::table::{Table, TableCell, TableRow, MAX_COLSPAN, MAX_ROWSPAN};
use crate::wrapper::DateAttributes;
use log::debug;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static FACT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[fact-id]").expect("valid fact selector"));
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid table selector"));
static MARKER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[dateperiodtype], [dateformat]").expect("valid marker selector")
});

/// Per-fact shifting policy, from the `processing-instruction` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingInstruction {
    AllowFuturePeriods,
    HideFutureElements,
    BalanceComparison,
    StickToPeriodStart,
    StickToQuarterStart,
    StickToYearStart,
    StickToYearEnd,
}

impl ProcessingInstruction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingInstruction::AllowFuturePeriods => "allowfutureperiods",
            ProcessingInstruction::HideFutureElements => "hide-future-elements",
            ProcessingInstruction::BalanceComparison => "balancecomparison",
            ProcessingInstruction::StickToPeriodStart => "sticktoperiodstart",
            ProcessingInstruction::StickToQuarterStart => "sticktoquarterstart",
            ProcessingInstruction::StickToYearStart => "sticktoyearstart",
            ProcessingInstruction::StickToYearEnd => "sticktoyearend",
        }
    }

    pub fn is_stick(&self) -> bool {
        matches!(
            self,
            ProcessingInstruction::StickToPeriodStart
                | ProcessingInstruction::StickToQuarterStart
                | ProcessingInstruction::StickToYearStart
                | ProcessingInstruction::StickToYearEnd
        )
    }
}

impl fmt::Display for ProcessingInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingInstruction {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allowfutureperiods" => Ok(ProcessingInstruction::AllowFuturePeriods),
            "hide-future-elements" => Ok(ProcessingInstruction::HideFutureElements),
            "balancecomparison" => Ok(ProcessingInstruction::BalanceComparison),
            "sticktoperiodstart" => Ok(ProcessingInstruction::StickToPeriodStart),
            "sticktoquarterstart" => Ok(ProcessingInstruction::StickToQuarterStart),
            "sticktoyearstart" => Ok(ProcessingInstruction::StickToYearStart),
            "sticktoyearend" => Ok(ProcessingInstruction::StickToYearEnd),
            other => Err(ShiftError::InvalidConfig(format!(
                "unknown processing instruction '{}'",
                other
            ))),
        }
    }
}

/// A fact marker and where it sits in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactContext {
    pub fact_id: String,
    pub table_id: Option<String>,
    pub article_id: Option<String>,
    pub instruction: Option<ProcessingInstruction>,
}

impl FactContext {
    pub fn new(fact_id: impl Into<String>) -> Self {
        Self {
            fact_id: fact_id.into(),
            table_id: None,
            article_id: None,
            instruction: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Every fact marker in document order, duplicates included.
    pub facts: Vec<FactContext>,
    pub tables: Vec<Table>,
}

impl Document {
    pub fn parse_html(html: &str) -> Self {
        let doc = Html::parse_document(html);
        let facts = doc.select(&FACT_SELECTOR).map(fact_context).collect();
        let tables = doc.select(&TABLE_SELECTOR).map(parse_table).collect();
        Self { facts, tables }
    }

    pub fn unique_fact_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.facts
            .iter()
            .filter(|fact| seen.insert(fact.fact_id.as_str()))
            .map(|fact| fact.fact_id.clone())
            .collect()
    }

    /// First occurrence of a fact.
    pub fn fact(&self, fact_id: &str) -> Option<&FactContext> {
        self.facts.iter().find(|fact| fact.fact_id == fact_id)
    }
}

fn collect_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn enclosing<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == name)
}

fn article_id(element: ElementRef) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find_map(|ancestor| {
            let value = ancestor.value();
            value
                .attr("data-article-id")
                .or_else(|| (value.name() == "article").then(|| value.attr("id")).flatten())
        })
        .map(str::to_string)
}

fn instruction_attr(element: ElementRef) -> Option<ProcessingInstruction> {
    let raw = element.value().attr("processing-instruction")?;
    match raw.parse() {
        Ok(instruction) => Some(instruction),
        Err(_) => {
            debug!("ignoring unknown processing instruction '{}'", raw);
            None
        }
    }
}

fn fact_context(element: ElementRef) -> FactContext {
    let row = enclosing(element, "tr");
    FactContext {
        fact_id: element
            .value()
            .attr("fact-id")
            .unwrap_or_default()
            .trim()
            .to_string(),
        table_id: enclosing(element, "table")
            .and_then(|table| table.value().attr("id"))
            .map(str::to_string),
        article_id: article_id(element),
        instruction: instruction_attr(element).or_else(|| row.and_then(instruction_attr)),
    }
}

fn date_attributes(element: ElementRef) -> DateAttributes {
    let value = element.value();
    let text = |name: &str| value.attr(name).map(|v| v.trim().to_string());
    let number = |name: &str| value.attr(name).and_then(|v| v.trim().parse::<u32>().ok());
    let signed = |name: &str| value.attr(name).and_then(|v| v.trim().parse::<i32>().ok());

    DateAttributes {
        text: collect_text(element),
        period_type: text("dateperiodtype"),
        format: text("dateformat"),
        flexible: value
            .attr("dateflexible")
            .map(|v| v.trim().eq_ignore_ascii_case("true")),
        offset: signed("dateoffset"),
        day: number("dateday"),
        month: number("datemonth"),
        year: signed("dateyear"),
        start_day: number("datestartday"),
        start_month: number("datestartmonth"),
        start_year: signed("datestartyear"),
    }
}

/// Span attribute clamped to `1..=max`; browsers cap spans the same way.
fn span_attr(element: ElementRef, name: &str, max: usize) -> usize {
    element
        .value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max)
}

fn parse_cell(cell: ElementRef) -> TableCell {
    let is_marker = |e: &ElementRef| {
        e.value().attr("dateperiodtype").is_some() || e.value().attr("dateformat").is_some()
    };
    let marker = if is_marker(&cell) {
        Some(cell)
    } else {
        cell.select(&MARKER_SELECTOR).next()
    };

    let own_fact = cell.value().attr("fact-id").is_some().then_some(cell);
    let facts = own_fact
        .into_iter()
        .chain(cell.select(&FACT_SELECTOR))
        .map(fact_context)
        .collect();

    TableCell {
        text: collect_text(cell),
        colspan: span_attr(cell, "colspan", MAX_COLSPAN),
        rowspan: span_attr(cell, "rowspan", MAX_ROWSPAN),
        header: cell.value().name() == "th",
        marker: marker.map(date_attributes),
        facts,
    }
}

fn parse_row(row: ElementRef) -> TableRow {
    TableRow {
        cells: row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "td" | "th"))
            .map(parse_cell)
            .collect(),
        instruction: instruction_attr(row),
    }
}

fn rows_of<'a>(section: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    section
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|row| row.value().name() == "tr")
}

fn parse_table(table: ElementRef) -> Table {
    let mut header = Vec::new();
    let mut body = Vec::new();
    for section in table.children().filter_map(ElementRef::wrap) {
        match section.value().name() {
            "thead" => header.extend(rows_of(section).map(parse_row)),
            "tbody" | "tfoot" => body.extend(rows_of(section).map(parse_row)),
            "tr" => body.push(parse_row(section)),
            _ => {}
        }
    }

    if header.is_empty() {
        let leading = body.iter().take_while(|row| row.is_header_only()).count();
        header = body.drain(..leading).collect();
    }

    Table {
        id: table.value().attr("id").map(str::to_string),
        article_id: article_id(table),
        header,
        body,
    }
}
