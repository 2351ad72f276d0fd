//! Static dashboard page
//!
//! Renders the enriched table plus the territory/account rollups into a
//! single self-contained HTML page: summary cards, the latest week's
//! territory attainment table and account display intensity, plus links to
//! recent recap artifacts.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::recap;
use polars::prelude::*;
use std::cmp::Ordering;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TerritoryRow {
    pub market: String,
    pub goal: i64,
    pub sales: i64,
    pub displays: i64,
    pub voids: i64,
    /// None when the bucket's summed goal is zero
    pub pct_attained: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct AccountRow {
    pub market: String,
    pub account: String,
    pub displays_per_1k_goal: f64,
}

#[derive(Debug, Clone)]
pub struct DashboardData {
    pub last_update: String,
    pub markets_tracked: usize,
    pub accounts_tracked: usize,
    pub latest_year: i64,
    pub latest_week: i64,
    /// Latest-week territory rows, best attainment first
    pub territory: Vec<TerritoryRow>,
    pub accounts: Vec<AccountRow>,
}

/// Most recent (year, week): maximum week number, then the maximum year
/// among rows sharing that week.
fn latest_bucket(summary: &DataFrame) -> Result<(i64, i64)> {
    let df = summary
        .clone()
        .lazy()
        .with_columns([
            col("week").cast(DataType::Int64),
            col("year").cast(DataType::Int64),
        ])
        .collect()?;
    let week = df
        .column("week")?
        .i64()?
        .max()
        .ok_or_else(|| PipelineError::EmptyInput("territory summary has no rows".to_string()))?;
    let year = df
        .lazy()
        .filter(col("week").eq(lit(week)))
        .select([col("year").max()])
        .collect()?
        .column("year")?
        .i64()?
        .get(0)
        .ok_or_else(|| PipelineError::EmptyInput("territory summary has no rows".to_string()))?;
    Ok((year, week))
}

fn bucket_rows(summary: &DataFrame, year: i64, week: i64) -> Result<DataFrame> {
    let out = summary
        .clone()
        .lazy()
        .with_columns([
            col("week").cast(DataType::Int64),
            col("year").cast(DataType::Int64),
        ])
        .filter(col("year").eq(lit(year)).and(col("week").eq(lit(week))))
        .collect()?;
    Ok(out)
}

/// Assemble the dashboard model from the three upstream tables.
pub fn build(
    processed: &DataFrame,
    territory: &DataFrame,
    account: &DataFrame,
) -> Result<DashboardData> {
    let last_update = processed
        .clone()
        .lazy()
        .select([col("date").max()])
        .collect()?
        .column("date")?
        .str()?
        .get(0)
        .ok_or_else(|| PipelineError::EmptyInput("enriched table has no rows".to_string()))?
        .to_string();

    let markets_tracked = processed.column("market")?.n_unique()?;
    let accounts_tracked = processed.column("account")?.n_unique()?;

    let (latest_year, latest_week) = latest_bucket(territory)?;

    let terr = bucket_rows(territory, latest_year, latest_week)?;
    let market_col = terr.column("market")?.str()?;
    let goal_col = terr.column("goal")?.i64()?;
    let sales_col = terr.column("sales")?.i64()?;
    let displays_col = terr.column("displays")?.i64()?;
    let voids_col = terr.column("voids")?.i64()?;
    let pct_col = terr.column("pct_attained")?.f64()?;

    let mut territory_rows = Vec::with_capacity(terr.height());
    for i in 0..terr.height() {
        let (Some(market), Some(goal), Some(sales), Some(displays), Some(voids)) = (
            market_col.get(i),
            goal_col.get(i),
            sales_col.get(i),
            displays_col.get(i),
            voids_col.get(i),
        ) else {
            continue;
        };
        territory_rows.push(TerritoryRow {
            market: market.to_string(),
            goal,
            sales,
            displays,
            voids,
            pct_attained: pct_col.get(i),
        });
    }
    territory_rows.sort_by(|a, b| {
        b.pct_attained
            .partial_cmp(&a.pct_attained)
            .unwrap_or(Ordering::Equal)
    });

    let acc = bucket_rows(account, latest_year, latest_week)?;
    let market_col = acc.column("market")?.str()?;
    let account_col = acc.column("account")?.str()?;
    let goal_col = acc.column("goal")?.i64()?;
    let displays_col = acc.column("displays")?.i64()?;

    let mut account_rows = Vec::with_capacity(acc.height());
    for i in 0..acc.height() {
        let (Some(market), Some(account), Some(goal), Some(displays)) = (
            market_col.get(i),
            account_col.get(i),
            goal_col.get(i),
            displays_col.get(i),
        ) else {
            continue;
        };
        account_rows.push(AccountRow {
            market: market.to_string(),
            account: account.to_string(),
            displays_per_1k_goal: displays as f64 / goal.max(1) as f64 * 1000.0,
        });
    }
    account_rows.sort_by(|a, b| {
        b.displays_per_1k_goal
            .partial_cmp(&a.displays_per_1k_goal)
            .unwrap_or(Ordering::Equal)
    });

    Ok(DashboardData {
        last_update,
        markets_tracked,
        accounts_tracked,
        latest_year,
        latest_week,
        territory: territory_rows,
        accounts: account_rows,
    })
}

fn card(label: &str, value: &str) -> String {
    format!(
        r#"<div class="card"><div class="label">{label}</div><div class="value">{value}</div></div>"#
    )
}

fn render_html(data: &DashboardData, recaps: &[String]) -> String {
    let total_displays: i64 = data.territory.iter().map(|r| r.displays).sum();
    let cards = [
        card("Last Update", &data.last_update),
        card("Markets Tracked", &data.markets_tracked.to_string()),
        card("Accounts", &data.accounts_tracked.to_string()),
        card("Total Displays (Latest Week)", &total_displays.to_string()),
    ]
    .join("\n");

    let mut territory_rows = String::new();
    for row in &data.territory {
        let pct = row
            .pct_attained
            .map(|p| format!("{:.0}%", p * 100.0))
            .unwrap_or_else(|| "&ndash;".to_string());
        territory_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            row.market, pct, row.goal, row.sales, row.displays, row.voids,
        ));
    }

    let mut account_rows = String::new();
    for row in &data.accounts {
        account_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td></tr>\n",
            row.market, row.account, row.displays_per_1k_goal,
        ));
    }

    let recap_links: String = recaps
        .iter()
        .take(8)
        .map(|name| format!("<li><a href=\"weekly_recaps/{name}\">{name}</a></li>"))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>CPWS Sales Dashboard (Simulated)</title>
<style>
body {{ font-family: Helvetica, Arial, sans-serif; margin: 40px; color: #111; }}
h1 {{ font-size: 24px; }}
h2 {{ font-size: 17px; margin-top: 32px; }}
.cards {{ display: flex; gap: 16px; flex-wrap: wrap; margin-bottom: 20px; }}
.card {{ flex: 1; min-width: 220px; background: #f6f8fa; padding: 16px; border-radius: 8px; }}
.card .label {{ font-size: 12px; color: #555; }}
.card .value {{ font-size: 22px; font-weight: 700; }}
table {{ border-collapse: collapse; }}
td, th {{ padding: 4px 14px; border-bottom: 1px solid #ddd; text-align: left; }}
footer {{ margin-top: 40px; font-size: 11px; color: #888; }}
</style>
</head>
<body>
<h1>CPWS Sales Dashboard (Simulated)</h1>
<div class="cards">
{cards}
</div>
<h2>Territory % Attained - Week {week} ({year})</h2>
<table>
<tr><th>Market</th><th>% Attained</th><th>Goal</th><th>Sales</th><th>Displays</th><th>Voids</th></tr>
{territory_rows}</table>
<h2>Display Intensity (per 1,000 Goal) - Latest Week</h2>
<table>
<tr><th>Market</th><th>Account</th><th>Displays / 1k Goal</th></tr>
{account_rows}</table>
<h2>Weekly Recaps</h2>
<ul>{recap_links}</ul>
<footer>Simulated data for demo</footer>
</body>
</html>
"#,
        week = data.latest_week,
        year = data.latest_year,
    )
}

/// Run the dashboard stage: read the output tables, write docs/index.html.
pub fn run(cfg: &PipelineConfig) -> Result<PathBuf> {
    let inputs = [
        (cfg.processed_path(), "process"),
        (cfg.territory_summary_path(), "process"),
        (cfg.account_summary_path(), "process"),
    ];
    for (path, stage) in &inputs {
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                path: path.display().to_string(),
                stage: stage.to_string(),
            });
        }
    }

    let read = |path: &PathBuf| -> Result<DataFrame> {
        Ok(LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()?
            .collect()?)
    };
    let processed = read(&cfg.processed_path())?;
    let territory = read(&cfg.territory_summary_path())?;
    let account = read(&cfg.account_summary_path())?;

    let data = build(&processed, &territory, &account)?;
    let recaps = recap::list_artifacts(cfg)?;

    cfg.ensure_dirs()?;
    let path = cfg.dashboard_path();
    fs::write(&path, render_html(&data, &recaps))?;
    info!(path = %path.display(), "wrote dashboard page");

    Ok(path)
}
