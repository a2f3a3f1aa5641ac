use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use period_shift::*;

struct FailingStore {
    fail_reads: bool,
    inner: InMemoryMappingStore,
}

#[async_trait]
impl MappingStore for FailingStore {
    async fn fetch_clusters(
        &self,
        project_id: &str,
        fact_ids: &[String],
    ) -> Result<Vec<MappingCluster>> {
        if self.fail_reads {
            return Err(ShiftError::Store("connection refused".to_string()));
        }
        self.inner.fetch_clusters(project_id, fact_ids).await
    }

    async fn update_cluster(&self, _project_id: &str, _cluster: &MappingCluster) -> Result<()> {
        Err(ShiftError::Store("write rejected".to_string()))
    }
}

fn store_with(facts: &[(&str, &str)]) -> InMemoryMappingStore {
    let store = InMemoryMappingStore::new();
    for (fact_id, period) in facts {
        store
            .insert("acme", MappingCluster::new(*fact_id, vec![MappingEntry::internal(*period)]))
            .unwrap();
    }
    store
}

fn request(document: &str, base: &str, target: &str) -> ShiftRequest {
    ShiftRequest {
        project_id: "acme".to_string(),
        document: document.to_string(),
        base: base.to_string(),
        target: target.to_string(),
        strategy: ShiftStrategy::BaseRelative,
    }
}

fn stored_period(store: &InMemoryMappingStore, fact_id: &str) -> String {
    store
        .get("acme", fact_id)
        .unwrap()
        .unwrap()
        .internal()
        .unwrap()
        .period
        .clone()
        .unwrap()
}

#[tokio::test]
async fn test_annual_report_rolls_forward() {
    let store = store_with(&[
        ("f1", "20190101_20191231"),
        ("f2", "20181231"),
        ("f3", "20180101_20181231"),
    ]);
    let config = ShiftConfig::default();
    let html = r#"
        <p>Revenue <span fact-id="f1">100</span></p>
        <p>Opening cash <span fact-id="f2">7</span></p>
        <p>Prior year revenue <span fact-id="f3">90</span> and again <span fact-id="f1">100</span></p>
    "#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "ar19", "ar20"))
        .await;

    assert!(report.success, "{}", report.message);
    assert_eq!(report.counts.found, 4);
    assert_eq!(report.counts.unique, 3);
    assert_eq!(report.counts.shifted, 3);
    assert!(report.errors.is_empty());

    assert_eq!(stored_period(&store, "f1"), "20200101_20201231");
    assert_eq!(stored_period(&store, "f2"), "20191231");
    assert_eq!(stored_period(&store, "f3"), "20190101_20191231");

    let written = &store.writes().unwrap()[0];
    assert_eq!(written.project_id.as_deref(), Some("acme"));
}

#[tokio::test]
async fn test_quarter_to_quarter_keeps_ytd_and_comparatives() {
    let store = store_with(&[
        ("qtd", "20190401_20190630"),
        ("ytd", "20190101_20190630"),
        ("prior", "20180401_20180630"),
    ]);
    let config = ShiftConfig::default();
    let html = r#"<div><span fact-id="qtd">1</span><span fact-id="ytd">2</span><span fact-id="prior">3</span></div>"#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "q219", "q319"))
        .await;

    assert_eq!(report.counts.shifted, 3);
    assert_eq!(stored_period(&store, "qtd"), "20190701_20190930");
    assert_eq!(stored_period(&store, "ytd"), "20190101_20190930");
    assert_eq!(stored_period(&store, "prior"), "20180701_20180930");
}

#[tokio::test]
async fn test_period_beyond_target_is_rejected() {
    let store = store_with(&[("f1", "20191231")]);
    let config = ShiftConfig::default();
    let html = r#"<article id="notes"><span fact-id="f1">5</span></article>"#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "ar18", "ar20"))
        .await;

    assert!(report.success);
    assert_eq!(report.counts.rejected, 1);
    assert_eq!(report.counts.shifted, 0);
    assert!(store.writes().unwrap().is_empty());
    assert_eq!(stored_period(&store, "f1"), "20191231");

    let error = &report.errors[0];
    assert_eq!(error.location.fact_id.as_deref(), Some("f1"));
    assert_eq!(error.location.article_id.as_deref(), Some("notes"));
    assert!(error.message.contains("20211231"));
}

#[tokio::test]
async fn test_allow_future_periods_skips_bounds_check() {
    let store = store_with(&[("f1", "20191231")]);
    let config = ShiftConfig::default();
    let html = r#"<span fact-id="f1" processing-instruction="allowfutureperiods">5</span>"#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "ar18", "ar20"))
        .await;

    assert_eq!(report.counts.shifted, 1);
    assert_eq!(stored_period(&store, "f1"), "20211231");
}

#[tokio::test]
async fn test_hide_future_elements_marks_entry_hidden() {
    let store = store_with(&[("f1", "20191231")]);
    let config = ShiftConfig::default();
    let html = r#"<table id="t1"><tr processing-instruction="hide-future-elements"><td fact-id="f1">5</td></tr></table>"#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "ar18", "ar20"))
        .await;

    assert_eq!(report.counts.shifted, 1);
    assert_eq!(report.warnings.len(), 1);
    let cluster = store.get("acme", "f1").unwrap().unwrap();
    let entry = cluster.internal().unwrap();
    assert_eq!(entry.period.as_deref(), Some("20211231"));
    assert_eq!(entry.display_option.as_deref(), Some("hidden"));
}

#[tokio::test]
async fn test_shift_to_same_period_writes_nothing() {
    let store = store_with(&[("f1", "20200101_20201231"), ("f2", "20201231")]);
    let config = ShiftConfig::default();
    let html = r#"<span fact-id="f1">1</span><span fact-id="f2">2</span>"#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "ar20", "ar20"))
        .await;

    assert!(report.success);
    assert_eq!(report.counts.unchanged, 2);
    assert!(store.writes().unwrap().is_empty());
}

#[tokio::test]
async fn test_absolute_and_unmapped_facts_are_left_alone() {
    let store = store_with(&[("f1", "20190101_20191231")]);
    let mut fixed = MappingEntry::internal("20150630");
    fixed.is_absolute = true;
    store
        .insert("acme", MappingCluster::new("fixed", vec![fixed]))
        .unwrap();
    let config = ShiftConfig::default();
    let html = r#"<span fact-id="f1">1</span><span fact-id="fixed">2</span><span fact-id="ghost">3</span>"#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "ar19", "ar20"))
        .await;

    assert_eq!(report.counts.shifted, 1);
    assert_eq!(report.counts.unchanged, 1);
    assert_eq!(report.counts.investigated, 2);
    assert_eq!(stored_period(&store, "fixed"), "20150630");
    assert!(report
        .warnings
        .iter()
        .any(|w| w.location.fact_id.as_deref() == Some("ghost")));
}

#[tokio::test]
async fn test_table_context_strategy_reads_header_markers() {
    let store = store_with(&[
        ("q1", "20190101_20190331"),
        ("q2", "20190401_20190630"),
        ("bal", "20191231"),
    ]);
    let config = ShiftConfig::default();
    let html = r#"
        <article id="a1">
          <table id="results">
            <thead>
              <tr><th></th><th colspan="2"><span dateperiodtype="year" dateformat="yyyy" dateyear="2019">2019</span></th></tr>
              <tr><th></th><th>Q1</th><th>Q2</th></tr>
            </thead>
            <tbody>
              <tr><td>Revenue</td><td><span fact-id="q1">10</span></td><td><span fact-id="q2">11</span></td></tr>
            </tbody>
          </table>
          <table id="balance">
            <tr><th>Balance</th><th>December 31, 2019</th></tr>
            <tr><td>Cash</td><td fact-id="bal">4</td></tr>
          </table>
        </article>
    "#;
    let mut req = request(html, "ar19", "ar20");
    req.strategy = ShiftStrategy::TableContext;

    let report = PeriodShifter::new(&store, &config).shift(&req).await;

    assert!(report.success, "{}", report.message);
    assert_eq!(report.counts.shifted, 3);
    assert_eq!(stored_period(&store, "q1"), "20200101_20200331");
    assert_eq!(stored_period(&store, "q2"), "20200401_20200630");
    assert_eq!(stored_period(&store, "bal"), "20201231");
}

fn table_request(html: &str, base: &str, target: &str) -> ShiftRequest {
    ShiftRequest {
        strategy: ShiftStrategy::TableContext,
        ..request(html, base, target)
    }
}

#[tokio::test]
async fn test_table_context_rolls_quarters_over_year_end() {
    let store = store_with(&[
        ("cur", "20191001_20191231"),
        ("prior", "20181001_20181231"),
        ("bal", "20191231"),
    ]);
    let config = ShiftConfig::default();
    let html = r#"
        <table id="quarters">
          <thead><tr><th></th><th>Q4 2019</th><th>Q4 2018</th><th>December 31, 2019</th></tr></thead>
          <tbody><tr><td>Revenue</td>
            <td fact-id="cur">10</td><td fact-id="prior">9</td><td fact-id="bal">4</td></tr></tbody>
        </table>
    "#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&table_request(html, "q419", "q120"))
        .await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.counts.shifted, 3);
    assert_eq!(stored_period(&store, "cur"), "20200101_20200331");
    assert_eq!(stored_period(&store, "prior"), "20190101_20190331");
    assert_eq!(stored_period(&store, "bal"), "20200331");
}

#[tokio::test]
async fn test_table_context_applies_stick_and_comparison_instructions() {
    let store = store_with(&[
        ("open", "20190101"),
        ("close", "20191231"),
        ("move", "20190101_20191231"),
    ]);
    let config = ShiftConfig::default();
    let html = r#"
        <table id="equity">
          <tr><th></th><th>2019</th><th>2018</th></tr>
          <tr processing-instruction="sticktoyearstart"><td>Opening</td><td fact-id="open">1</td><td></td></tr>
          <tr processing-instruction="sticktoyearend"><td>Closing</td><td fact-id="close">1</td><td></td></tr>
        </table>
        <table id="movement">
          <tr><th></th><th>January 1, 2019</th><th>December 31, 2019</th></tr>
          <tr><td>Change</td><td fact-id="move" processing-instruction="balancecomparison">1</td><td></td></tr>
        </table>
    "#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&table_request(html, "ar19", "ar20"))
        .await;

    assert_eq!(report.counts.shifted, 3, "{:?}", report.errors);
    assert_eq!(stored_period(&store, "open"), "20200101");
    assert_eq!(stored_period(&store, "close"), "20201231");
    assert_eq!(stored_period(&store, "move"), "20200101_20201231");
}

#[tokio::test]
async fn test_unsupported_marker_is_reported_with_its_table() {
    let store = store_with(&[("u1", "20190101_20191231")]);
    let config = ShiftConfig::default();
    let html = r#"
        <article id="notes">
          <table id="broken">
            <tr><th></th><th><span dateperiodtype="fullquarter" dateformat="yyyy">2019</span></th></tr>
            <tr><td>Cash</td><td fact-id="u1">1</td></tr>
          </table>
        </article>
    "#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&table_request(html, "ar19", "ar20"))
        .await;

    assert!(report.success);
    assert_eq!(report.counts.rejected, 1);
    assert!(store.writes().unwrap().is_empty());
    let error = &report.errors[0];
    assert_eq!(error.location.fact_id.as_deref(), Some("u1"));
    assert_eq!(error.location.table_id.as_deref(), Some("broken"));
    assert!(error.message.contains("Unsupported period format"));
}

#[tokio::test]
async fn test_failed_read_ends_the_run() {
    let store = FailingStore {
        fail_reads: true,
        inner: InMemoryMappingStore::new(),
    };
    let config = ShiftConfig::default();

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(r#"<span fact-id="f1">1</span>"#, "ar19", "ar20"))
        .await;

    assert!(!report.success);
    assert_eq!(report.counts.found, 1);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_failed_write_is_counted_and_run_continues() {
    let store = FailingStore {
        fail_reads: false,
        inner: store_with(&[("f1", "20190101_20191231"), ("f2", "20191231")]),
    };
    let config = ShiftConfig::default();
    let html = r#"<span fact-id="f1">1</span><span fact-id="f2">2</span>"#;

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(html, "ar19", "ar20"))
        .await;

    assert!(report.success);
    assert_eq!(report.counts.failed_writes, 2);
    assert_eq!(report.counts.shifted, 0);
    assert_eq!(report.errors.len(), 2);
}

#[tokio::test]
async fn test_invalid_reporting_period_fails_the_run() {
    let store = store_with(&[("f1", "20190101_20191231")]);
    let config = ShiftConfig::default();

    let report = PeriodShifter::new(&store, &config)
        .shift(&request(r#"<span fact-id="f1">1</span>"#, "ar19", "xx20"))
        .await;

    assert!(!report.success);
    assert!(store.writes().unwrap().is_empty());

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"].as_array().unwrap().len(), 1);
}

#[test]
fn test_classify_and_resolve_quarter() {
    let classifier = PatternClassifier::default();
    let Classification::Parsed(period) = classifier.classify("Q1 2019") else {
        panic!("Q1 2019 should be recognised");
    };
    assert_eq!(period.format, PeriodFormat::QYyyy);
    assert_eq!(period.period_type(), PeriodType::FullQuarter);

    let wrapper = DateWrapper::from_match("Q1 2019", period);
    let fiscal = FiscalPeriod::parse("q219", 0).unwrap();
    let resolved = resolve_period(&wrapper, &fiscal, &SourceLocation::default()).unwrap();
    assert_eq!(
        resolved.start_date(),
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()
    );
    assert_eq!(
        resolved.end_date(),
        NaiveDate::from_ymd_opt(2019, 3, 31).unwrap()
    );
    assert!(resolved.fallback.is_none());
}

#[test]
fn test_quarters_are_contiguous() {
    let classifier = PatternClassifier::default();
    let fiscal = FiscalPeriod::parse("ar19", 0).unwrap();

    let quarters: Vec<ResolvedPeriod> = (1..=4)
        .map(|q| {
            let wrapper = DateWrapper::from_text(&format!("Q{} 2019", q), &classifier);
            resolve_period(&wrapper, &fiscal, &SourceLocation::default()).unwrap()
        })
        .collect();

    assert_eq!(quarters[0].start_date(), fiscal.period_start);
    assert_eq!(quarters[3].end_date(), fiscal.period_end);
    for pair in quarters.windows(2) {
        assert_eq!(pair[0].end + Duration::seconds(1), pair[1].start);
    }
}

#[test]
fn test_config_schema_is_valid_json() {
    let schema = ShiftConfig::schema_as_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
    assert!(parsed["properties"]["fiscal_year_offset_months"].is_object());
}
