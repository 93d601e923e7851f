//! The `expenses summary` command: scalar metrics and per-category chart data.

use crate::commands::auth::session_api;
use crate::commands::{plural, Out};
use crate::context::AppContext;
use crate::pipeline::{ChartSlice, Summary};
use crate::store::ExpenseStore;
use crate::Result;
use serde::Serialize;

const BAR_WIDTH: f64 = 30.0;

/// Summary metrics and chart data of the unfiltered collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub summary: Summary,
    pub slices: Vec<ChartSlice>,
}

/// Loads the collection and summarizes it. Table filters never apply here.
pub async fn summary(ctx: &AppContext) -> Result<Out<SummaryReport>> {
    let api = session_api(ctx)?;
    let mut store = ExpenseStore::default();
    store.load(api.as_ref()).await?.into_result()?;

    let views = store.views();
    let report = SummaryReport {
        summary: views.summary,
        slices: views.totals.chart(),
    };
    Ok(Out::new(render(&report), report))
}

fn render(report: &SummaryReport) -> String {
    let summary = &report.summary;
    let mut text = format!(
        "Total {} across {}, average {}",
        summary.total,
        plural(summary.count, "expense", "expenses"),
        summary.average
    );
    let width = report
        .slices
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0);
    for slice in &report.slices {
        let filled = (slice.share.clamp(0.0, 1.0) * BAR_WIDTH).round() as usize;
        text.push_str(&format!(
            "\n{:<width$}  {:>12}  {:>5.1}%  {}",
            slice.name,
            slice.value.to_string(),
            slice.share * 100.0,
            "#".repeat(filled),
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestApiState;
    use crate::model::{Amount, Expense};
    use crate::test::TestEnv;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn exp(id: &str, amount: &str, category: &str) -> Expense {
        let date = Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap();
        Expense::new(id, id, Amount::from_str(amount).unwrap(), category, date)
    }

    #[tokio::test]
    async fn test_summary() {
        let env = TestEnv::logged_in().await;
        env.set_state(TestApiState {
            expenses: vec![
                exp("a", "5", "Food"),
                exp("b", "2", "Transport"),
                exp("c", "15", "Food"),
                exp("d", "18", "Home"),
            ],
            ..TestApiState::default()
        });
        let out = summary(&env.context().await).await.unwrap();
        let report = out.structure().unwrap();
        assert_eq!(report.summary.count, 4);
        assert_eq!(report.summary.total, Amount::from_str("40").unwrap());
        assert_eq!(report.summary.average, Amount::from_str("10").unwrap());

        let names: Vec<&str> = report.slices.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Food", "Transport", "Home"]);
        assert_eq!(report.slices[0].share, 0.5);

        let lines: Vec<&str> = out.message().lines().collect();
        assert_eq!(lines[0], "Total $40.00 across 4 expenses, average $10.00");
        assert!(lines[1].starts_with("Food"));
        assert!(lines[1].ends_with(&"#".repeat(15)));
        assert_eq!(lines[2], "Transport         $2.00    5.0%  ##");
    }

    #[tokio::test]
    async fn test_summary_of_nothing() {
        let env = TestEnv::logged_in().await;
        env.set_state(TestApiState::default());
        let out = summary(&env.context().await).await.unwrap();
        assert_eq!(out.message(), "Total $0.00 across 0 expenses, average $0.00");
        assert!(out.structure().unwrap().slices.is_empty());
    }
}
