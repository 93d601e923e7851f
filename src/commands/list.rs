//! The `expenses list` command: fetch, filter, sort and render.

use crate::commands::auth::session_api;
use crate::commands::{plural, OutputFormat, Out, Rows};
use crate::context::AppContext;
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::Expense;
use crate::pipeline::{DayZone, FilterConfig};
use crate::store::ExpenseStore;
use crate::Result;
use anyhow::Context;

const HEADERS: [&str; 5] = ["ID", "Date", "Title", "Category", "Amount"];

/// Loads the collection and renders the filtered, sorted list in `format`.
pub async fn list(
    ctx: &AppContext,
    filters: FilterConfig,
    format: OutputFormat,
) -> Result<Out<Rows>> {
    let api = session_api(ctx)?;
    let mut store = ExpenseStore::new(filters);
    let total = store.load(api.as_ref()).await?.into_result()?;

    let zone = store.filters().zone();
    let shown = &store.views().list;
    let rows = match format {
        OutputFormat::Json => Rows::Json(
            serde_json::to_value(shown)
                .context("Unable to serialize expenses")
                .pub_result(ErrorType::Io)?,
        ),
        OutputFormat::Table => Rows::Table(to_table(shown, zone)),
        OutputFormat::Csv => Rows::Csv(to_csv(shown, zone).pub_result(ErrorType::Io)?),
    };

    let message = if store.filters().is_empty() {
        format!("Showing {}", plural(total, "expense", "expenses"))
    } else {
        format!(
            "Showing {} of {}",
            shown.len(),
            plural(total, "expense", "expenses")
        )
    };
    Ok(Out::new(message, rows))
}

fn cells(expense: &Expense, zone: DayZone) -> [String; 5] {
    [
        expense.id().to_string(),
        zone.day_of(expense.date()).format("%Y-%m-%d").to_string(),
        expense.title().to_string(),
        expense.category().to_string(),
        expense.amount().to_string(),
    ]
}

/// Renders a markdown table.
fn to_table(expenses: &[Expense], zone: DayZone) -> String {
    let mut out = format!("| {} |\n", HEADERS.join(" | "));
    out.push_str(&format!("|{}\n", " --- |".repeat(HEADERS.len())));
    for expense in expenses {
        let row: Vec<String> = cells(expense, zone)
            .iter()
            .map(|cell| cell.replace('|', "\\|"))
            .collect();
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

fn to_csv(expenses: &[Expense], zone: DayZone) -> Res<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;
    for expense in expenses {
        writer.write_record(cells(expense, zone))?;
    }
    let bytes = writer.into_inner().context("Unable to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestApiState;
    use crate::model::Amount;
    use crate::pipeline::SortKey;
    use crate::test::TestEnv;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::str::FromStr;

    fn exp(id: &str, title: &str, amount: &str, category: &str, day: u32) -> Expense {
        let date = Utc.with_ymd_and_hms(2025, 10, day, 9, 0, 0).unwrap();
        Expense::new(id, title, Amount::from_str(amount).unwrap(), category, date)
    }

    async fn env() -> TestEnv {
        let env = TestEnv::logged_in().await;
        env.set_state(TestApiState {
            expenses: vec![
                exp("1", "Coffee", "5", "Food", 1),
                exp("2", "Bus", "2", "Transport", 2),
                exp("3", "Lunch, late", "15", "Food", 3),
            ],
            ..TestApiState::default()
        });
        env
    }

    #[tokio::test]
    async fn test_list_table() {
        let env = env().await;
        let ctx = env.context().await;
        let out = list(&ctx, FilterConfig::new(), OutputFormat::Table)
            .await
            .unwrap();
        assert_eq!(out.message(), "Showing 3 expenses");
        let Some(Rows::Table(table)) = out.structure() else {
            panic!("expected a table");
        };
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| ID | Date | Title | Category | Amount |");
        assert_eq!(lines[2], "| 1 | 2025-10-01 | Coffee | Food | $5.00 |");
        assert_eq!(lines.len(), 5);
    }

    #[tokio::test]
    async fn test_list_filtered_csv() {
        let env = env().await;
        let ctx = env.context().await;
        let filters = FilterConfig::new()
            .with_category("Food")
            .with_sort(SortKey::AmountDesc);
        let out = list(&ctx, filters, OutputFormat::Csv).await.unwrap();
        assert_eq!(out.message(), "Showing 2 of 3 expenses");
        let Some(Rows::Csv(csv)) = out.structure() else {
            panic!("expected csv");
        };
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "ID,Date,Title,Category,Amount");
        assert_eq!(lines[1], "3,2025-10-03,\"Lunch, late\",Food,$15.00");
        assert_eq!(lines[2], "1,2025-10-01,Coffee,Food,$5.00");
    }

    #[tokio::test]
    async fn test_list_json_by_date() {
        let env = env().await;
        let ctx = env.context().await;
        let filters = FilterConfig::new()
            .with_start(NaiveDate::from_ymd_opt(2025, 10, 2).unwrap())
            .with_end(NaiveDate::from_ymd_opt(2025, 10, 2).unwrap());
        let out = list(&ctx, filters, OutputFormat::Json).await.unwrap();
        let Some(Rows::Json(json)) = out.structure() else {
            panic!("expected json");
        };
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["_id"], "2");
        assert_eq!(json[0]["amount"], 2.0);
    }

    #[tokio::test]
    async fn test_list_date_column_uses_the_zone() {
        let env = env().await;
        let ctx = env.context().await;
        // 09:00 UTC on Oct 1 is still Sep 30 at UTC-10
        let hawaii = chrono::FixedOffset::west_opt(10 * 3600).unwrap();
        let filters = FilterConfig::new().with_zone(DayZone::Fixed(hawaii));
        let out = list(&ctx, filters, OutputFormat::Csv).await.unwrap();
        let Some(Rows::Csv(csv)) = out.structure() else {
            panic!("expected csv");
        };
        assert_eq!(csv.lines().nth(1), Some("1,2025-09-30,Coffee,Food,$5.00"));
    }

    #[tokio::test]
    async fn test_list_remote_failure() {
        let env = env().await;
        env.api().fail_next(crate::api::ApiError::status(500, None));
        let err = list(&env.context().await, FilterConfig::new(), OutputFormat::Table)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Remote);
        assert_eq!(err.to_string(), "Failed to load expenses");
    }
}
