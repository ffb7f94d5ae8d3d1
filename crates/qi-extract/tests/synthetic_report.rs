//! End-to-end extraction over a full synthetic report document: every
//! table role present, plus decorative tables that must be ignored.

use chrono::{TimeZone, Utc};
use qi_core::ReportRef;
use qi_extract::assemble_report;

const REPORT_HTML: &str = r#"
<html>
<head><title>AG2-548 Impact Study</title></head>
<body>
  <table>
    <tr><th>Navigation</th></tr>
    <tr><td>Back to queue</td></tr>
  </table>

  <table>
    <thead>
      <tr><th>Description</th><th>Cost</th></tr>
      <tr><th></th><th>Allocated</th></tr>
    </thead>
    <tbody>
      <tr><td>Transmission Owner Interconnection Facilities (TOIF)</td><td>$2,000,000</td></tr>
      <tr><td>Stand Alone Network Upgrades</td><td>$1,000,000</td></tr>
      <tr><td>Network Upgrades</td><td>$4,500,000</td></tr>
      <tr><td>Steady State Reliability Upgrades</td><td>$2,500,000</td></tr>
      <tr><td>Total Costs</td><td>$10,000,000 (See Note 1)</td></tr>
    </tbody>
  </table>

  <table>
    <tr><th>RD1 Received</th><th>RD2 due at Decision Point</th></tr>
    <tr><td>$500,000</td><td>$750,000</td></tr>
  </table>

  <table>
    <tr><th>TO</th><th>RTEP ID</th><th>Title</th><th>Allocated Cost</th><th>Total Cost</th></tr>
    <tr><td>UTIL-A</td><td>RTEP-001 / UTIL-A</td><td>Rebuild 138kV corridor</td><td>$5,000,000</td><td>$5,000,000</td></tr>
    <tr><td>UTIL-B</td><td>RTEP-002 / UTIL-B</td><td>Substation expansion</td><td>$0</td><td>$9,000,000</td></tr>
    <tr><td>Grand Total</td><td></td><td></td><td>$5,000,000</td><td>$14,000,000</td></tr>
  </table>

  <table>
    <tr><th>Project</th><th>MW Impact</th><th>Percent Allocation</th><th>Allocated Cost</th></tr>
    <tr><td>AG2-548</td><td>20.2 MW</td><td>32.7%</td><td>$5,000,000</td></tr>
    <tr><td>AH1-665</td><td>3.0 MW</td><td>0%</td><td>$0</td></tr>
  </table>

  <table>
    <tr><th>Study Area</th><th>Facility Description</th><th>Contingency Name</th><th>Contingency Type</th><th>Loading %</th><th>Rating MVA</th><th>MVA to Mitigate</th></tr>
    <tr><td>Area 1</td><td>Line A-B 138kV</td><td>N-1 Gen Out</td><td>Single</td><td>121.47 %</td><td>250</td><td>53.7</td></tr>
  </table>

  <table>
    <tr><th>Bus #</th><th>Bus Name</th><th>Type</th><th>MW Contribution</th></tr>
    <tr><td>100234</td><td>AG2-548 GEN</td><td>Wind</td><td>14.25</td></tr>
    <tr><td>200100</td><td>KAMMER</td><td>Bus</td><td>7.00</td></tr>
  </table>
</body>
</html>
"#;

fn reference() -> ReportRef {
    ReportRef {
        project_id: "AG2-548".to_string(),
        cluster: "TC2".to_string(),
        phase: "PHASE_1".to_string(),
        report_url: "https://example.test/AG2-548_imp_PHASE_1.htm".to_string(),
    }
}

#[test]
fn full_report_extracts_every_section() {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap();
    let report = assemble_report(REPORT_HTML, &reference(), at);

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);

    assert_eq!(report.cost_summary.total_cost, 10_000_000.0);
    assert_eq!(report.cost_summary.toif_cost, 2_000_000.0);
    assert_eq!(report.cost_summary.stand_alone_cost, 1_000_000.0);
    assert_eq!(report.cost_summary.network_upgrade_cost, 4_500_000.0);
    assert_eq!(report.cost_summary.system_reliability_cost, 2_500_000.0);

    assert_eq!(report.readiness.rd1_amount, 500_000.0);
    assert_eq!(report.readiness.rd2_amount, 750_000.0);

    assert_eq!(report.upgrades.len(), 2);
    assert_eq!(report.upgrades[0].rtep_id, "RTEP-001");
    assert_eq!(report.upgrades[0].to_id, "UTIL-A");
    assert_eq!(report.upgrades[0].allocated_cost, 5_000_000.0);
    assert_eq!(report.upgrades[1].allocated_cost, 0.0);
    assert_eq!(report.upgrades[1].total_cost, 9_000_000.0);

    assert_eq!(report.allocations.len(), 1);
    assert_eq!(report.allocations[0].project_id, "AG2-548");
    assert_eq!(report.allocations[0].mw_impact, 20.2);

    assert_eq!(report.facility_overloads.len(), 1);
    assert_eq!(report.facility_overloads[0].loading_pct, 121.47);

    assert_eq!(report.mw_contributions.len(), 1);
    assert_eq!(report.mw_contributions[0].project_id, "AG2-548");
    assert_eq!(report.mw_contributions[0].mw_contribution, 14.25);
}
