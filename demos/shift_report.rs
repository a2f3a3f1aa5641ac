use anyhow::Result;
use period_shift::*;

const REPORT: &str = r#"
<article id="income-statement">
  <table id="results">
    <thead>
      <tr><th></th><th>Q2 2019</th><th>Q2 2018</th><th>Six months ended June 30, 2019</th></tr>
    </thead>
    <tbody>
      <tr><td>Revenue</td>
          <td><span fact-id="rev-q">120</span></td>
          <td><span fact-id="rev-q-prior">101</span></td>
          <td><span fact-id="rev-ytd">230</span></td></tr>
      <tr processing-instruction="sticktoyearstart"><td>Opening equity</td>
          <td><span fact-id="equity-open">900</span></td><td></td><td></td></tr>
    </tbody>
  </table>
</article>
"#;

fn seeded_store() -> Result<InMemoryMappingStore> {
    let store = InMemoryMappingStore::new();
    for (fact_id, period) in [
        ("rev-q", "20190401_20190630"),
        ("rev-q-prior", "20180401_20180630"),
        ("rev-ytd", "20190101_20190630"),
        ("equity-open", "20190101"),
    ] {
        store.insert("demo", MappingCluster::new(fact_id, vec![MappingEntry::internal(period)]))?;
    }
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("📅 Period Shift Demo\n");
    println!("Rolls a Q2 2019 income statement forward to Q3 2019.\n");

    let config = ShiftConfig::from_json_str(r#"{"fiscal_year_offset_months": 0}"#)?;

    for strategy in [ShiftStrategy::BaseRelative, ShiftStrategy::TableContext] {
        let store = seeded_store()?;
        let report = PeriodShifter::new(&store, &config)
            .shift(&ShiftRequest {
                project_id: "demo".to_string(),
                document: REPORT.to_string(),
                base: "q219".to_string(),
                target: "q319".to_string(),
                strategy,
            })
            .await;

        println!("--- {:?} ---", strategy);
        println!("{}", report.message);
        for write in store.writes()? {
            if let Some(entry) = write.internal() {
                println!("  {:<12} -> {}", write.fact_id, entry.period.as_deref().unwrap_or("-"));
            }
        }
        println!();
    }

    println!("✅ Report of a run whose periods are already current:\n");
    let store = seeded_store()?;
    let last = PeriodShifter::new(&store, &config)
        .shift(&ShiftRequest {
            project_id: "demo".to_string(),
            document: REPORT.to_string(),
            base: "q219".to_string(),
            target: "q219".to_string(),
            strategy: ShiftStrategy::BaseRelative,
        })
        .await;
    println!("{}", last.to_json()?);

    Ok(())
}
