//! Weekly recap
//!
//! Recomputes a week-over-week comparison from the enriched table for the
//! most recent (year, week) bucket and renders a printable recap page into
//! the weekly_recaps directory.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use itertools::Itertools;
use polars::prelude::*;
use std::cmp::Ordering;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Per-market summary for the recap week
#[derive(Debug, Clone)]
pub struct RecapRow {
    pub market: String,
    pub goal: i64,
    pub sales: i64,
    pub displays: i64,
    pub voids: i64,
    /// sales / goal, with a zero goal substituted by 1 in the denominator
    pub pct_attained: f64,
    /// Prior-week sales; 0 when the market had no prior-week rows
    pub sales_prev: i64,
    pub wow_change: i64,
}

#[derive(Debug, Clone)]
pub struct WeeklyRecap {
    pub year: i32,
    pub week: i32,
    pub markets: Vec<RecapRow>,
}

impl WeeklyRecap {
    pub fn artifact_name(&self) -> String {
        format!("recap_{}-W{:02}.html", self.year, self.week)
    }

    /// Markets sorted by attainment, best first
    pub fn by_attainment(&self) -> Vec<&RecapRow> {
        let mut rows: Vec<&RecapRow> = self.markets.iter().collect();
        rows.sort_by(|a, b| {
            b.pct_attained
                .partial_cmp(&a.pct_attained)
                .unwrap_or(Ordering::Equal)
        });
        rows
    }

    /// Top markets by week-over-week sales change
    pub fn top_wins(&self, n: usize) -> Vec<&RecapRow> {
        let mut rows: Vec<&RecapRow> = self.markets.iter().collect();
        rows.sort_by(|a, b| b.wow_change.cmp(&a.wow_change));
        rows.truncate(n);
        rows
    }

    /// Bottom markets by attainment ratio
    pub fn top_risks(&self, n: usize) -> Vec<&RecapRow> {
        let mut rows: Vec<&RecapRow> = self.markets.iter().collect();
        rows.sort_by(|a, b| {
            a.pct_attained
                .partial_cmp(&b.pct_attained)
                .unwrap_or(Ordering::Equal)
        });
        rows.truncate(n);
        rows
    }
}

/// Select the most recent bucket and compare it against (week - 1, same year).
pub fn build_recap(processed: &DataFrame) -> Result<WeeklyRecap> {
    // Week/year dtypes differ between the in-memory table (i32) and a CSV
    // round-trip (i64); normalize before touching them
    let df = processed
        .clone()
        .lazy()
        .with_columns([
            col("week").cast(DataType::Int64),
            col("year").cast(DataType::Int64),
        ])
        .collect()?;

    let latest_week = df
        .column("week")?
        .i64()?
        .max()
        .ok_or_else(|| PipelineError::EmptyInput("enriched table has no rows".to_string()))?;
    let latest_year = df
        .clone()
        .lazy()
        .filter(col("week").eq(lit(latest_week)))
        .select([col("year").max()])
        .collect()?
        .column("year")?
        .i64()?
        .get(0)
        .ok_or_else(|| PipelineError::EmptyInput("enriched table has no rows".to_string()))?;

    let current = df
        .clone()
        .lazy()
        .filter(
            col("year")
                .eq(lit(latest_year))
                .and(col("week").eq(lit(latest_week))),
        )
        .group_by([col("market")])
        .agg([
            col("goal").sum().alias("goal"),
            col("sales_volume").sum().alias("sales"),
            col("displays").sum().alias("displays"),
            col("voids").sum().alias("voids"),
        ]);

    let prev = df
        .lazy()
        .filter(
            col("year")
                .eq(lit(latest_year))
                .and(col("week").eq(lit(latest_week - 1))),
        )
        .group_by([col("market")])
        .agg([col("sales_volume").sum().alias("sales_prev")]);

    let joined = current
        .join(prev, [col("market")], [col("market")], JoinArgs::new(JoinType::Left))
        .with_columns([col("sales_prev").fill_null(lit(0i64))])
        .collect()?;

    let markets_col = joined.column("market")?.str()?;
    let goal_col = joined.column("goal")?.i64()?;
    let sales_col = joined.column("sales")?.i64()?;
    let displays_col = joined.column("displays")?.i64()?;
    let voids_col = joined.column("voids")?.i64()?;
    let prev_col = joined.column("sales_prev")?.i64()?;

    let mut markets = Vec::with_capacity(joined.height());
    for i in 0..joined.height() {
        let (Some(market), Some(goal), Some(sales), Some(displays), Some(voids), Some(prev)) = (
            markets_col.get(i),
            goal_col.get(i),
            sales_col.get(i),
            displays_col.get(i),
            voids_col.get(i),
            prev_col.get(i),
        ) else {
            continue;
        };
        markets.push(RecapRow {
            market: market.to_string(),
            goal,
            sales,
            displays,
            voids,
            pct_attained: sales as f64 / goal.max(1) as f64,
            sales_prev: prev,
            wow_change: sales - prev,
        });
    }

    Ok(WeeklyRecap {
        year: latest_year as i32,
        week: latest_week as i32,
        markets,
    })
}

fn render_html(recap: &WeeklyRecap) -> String {
    let mut summary_rows = String::new();
    for row in recap.by_attainment() {
        summary_rows.push_str(&format!(
            "<tr><td>{}</td><td>{:.0}%</td><td>{}</td><td>{}</td></tr>\n",
            row.market,
            row.pct_attained * 100.0,
            row.displays,
            row.voids,
        ));
    }

    let wins: String = recap
        .top_wins(5)
        .iter()
        .map(|r| format!("<li>{}: {:+} units vs LW</li>", r.market, r.wow_change))
        .collect();
    let risks: String = recap
        .top_risks(5)
        .iter()
        .map(|r| format!("<li>{}: {:.0}% attained</li>", r.market, r.pct_attained * 100.0))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>CPWS Weekly Recap - Week {week}, {year}</title>
<style>
body {{ font-family: Helvetica, Arial, sans-serif; margin: 40px; color: #111; }}
h1 {{ font-size: 22px; }}
h2 {{ font-size: 16px; margin-top: 28px; }}
table {{ border-collapse: collapse; }}
td, th {{ padding: 4px 14px; border-bottom: 1px solid #ddd; text-align: left; }}
footer {{ margin-top: 40px; font-size: 11px; color: #888; }}
@media print {{ body {{ margin: 0.75in; }} }}
</style>
</head>
<body>
<h1>CPWS Weekly Recap (Simulated)</h1>
<p>Week {week}, {year}</p>
<h2>Market Summary</h2>
<table>
<tr><th>Market</th><th>% Attained</th><th>Displays</th><th>Voids</th></tr>
{summary_rows}</table>
<h2>Top Wins (WoW Sales Change)</h2>
<ul>{wins}</ul>
<h2>Top Risks (Lowest % Attained)</h2>
<ul>{risks}</ul>
<footer>Auto-generated &middot; Simulated data for demo</footer>
</body>
</html>
"#,
        week = recap.week,
        year = recap.year,
    )
}

/// Recap artifact filenames, newest first
pub fn list_artifacts(cfg: &PipelineConfig) -> Result<Vec<String>> {
    let dir = cfg.recaps_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let names = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("recap_") && name.ends_with(".html"))
        .sorted()
        .rev()
        .collect();
    Ok(names)
}

/// Run the recap stage: read the enriched table, write the recap page.
pub fn run(cfg: &PipelineConfig) -> Result<PathBuf> {
    let processed_path = cfg.processed_path();
    if !processed_path.exists() {
        return Err(PipelineError::MissingInput {
            path: processed_path.display().to_string(),
            stage: "process".to_string(),
        });
    }

    let processed = LazyCsvReader::new(&processed_path)
        .with_has_header(true)
        .finish()?
        .collect()?;

    let recap = build_recap(&processed)?;
    cfg.ensure_dirs()?;
    let path = cfg.recaps_dir().join(recap.artifact_name());
    fs::write(&path, render_html(&recap))?;
    info!(path = %path.display(), markets = recap.markets.len(), "wrote weekly recap");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed_fixture(rows: Vec<(&str, i64, i64, i64, i64, i64, i64)>) -> DataFrame {
        // (market, year, week, goal, sales, displays, voids)
        let markets: Vec<String> = rows.iter().map(|r| r.0.to_string()).collect();
        let years: Vec<i64> = rows.iter().map(|r| r.1).collect();
        let weeks: Vec<i64> = rows.iter().map(|r| r.2).collect();
        let goals: Vec<i64> = rows.iter().map(|r| r.3).collect();
        let sales: Vec<i64> = rows.iter().map(|r| r.4).collect();
        let displays: Vec<i64> = rows.iter().map(|r| r.5).collect();
        let voids: Vec<i64> = rows.iter().map(|r| r.6).collect();
        df![
            "market" => markets,
            "year" => years,
            "week" => weeks,
            "goal" => goals,
            "sales_volume" => sales,
            "displays" => displays,
            "voids" => voids,
        ]
        .unwrap()
    }

    #[test]
    fn test_week_over_week_change() {
        let df = processed_fixture(vec![
            ("Dallas", 2025, 1, 120, 100, 1, 0),
            ("Dallas", 2025, 2, 120, 140, 2, 1),
        ]);
        let recap = build_recap(&df).unwrap();

        assert_eq!(recap.year, 2025);
        assert_eq!(recap.week, 2);
        assert_eq!(recap.markets.len(), 1);
        let dallas = &recap.markets[0];
        assert_eq!(dallas.sales_prev, 100);
        assert_eq!(dallas.wow_change, 40);
    }

    #[test]
    fn test_market_without_prior_week() {
        let df = processed_fixture(vec![
            ("Dallas", 2025, 1, 120, 100, 1, 0),
            ("Dallas", 2025, 2, 120, 140, 2, 1),
            ("Austin", 2025, 2, 80, 60, 0, 0),
        ]);
        let recap = build_recap(&df).unwrap();

        let austin = recap
            .markets
            .iter()
            .find(|r| r.market == "Austin")
            .unwrap();
        assert_eq!(austin.sales_prev, 0);
        assert_eq!(austin.wow_change, 60);
    }

    #[test]
    fn test_zero_goal_denominator_substituted() {
        let df = processed_fixture(vec![("Dallas", 2025, 2, 0, 5, 0, 0)]);
        let recap = build_recap(&df).unwrap();
        assert!((recap.markets[0].pct_attained - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_latest_bucket_by_max_week_then_year() {
        // Max week number wins, then max year among rows sharing that week
        let df = processed_fixture(vec![
            ("Dallas", 2024, 52, 100, 90, 0, 0),
            ("Dallas", 2025, 10, 100, 95, 0, 0),
        ]);
        let recap = build_recap(&df).unwrap();
        assert_eq!(recap.week, 52);
        assert_eq!(recap.year, 2024);
    }

    #[test]
    fn test_wins_and_risks_ordering() {
        let df = processed_fixture(vec![
            ("Dallas", 2025, 1, 100, 100, 0, 0),
            ("Austin", 2025, 1, 100, 50, 0, 0),
            ("Houston", 2025, 1, 100, 80, 0, 0),
            ("Dallas", 2025, 2, 100, 90, 0, 0),  // wow -10
            ("Austin", 2025, 2, 100, 110, 0, 0), // wow +60
            ("Houston", 2025, 2, 100, 95, 0, 0), // wow +15
        ]);
        let recap = build_recap(&df).unwrap();

        let wins = recap.top_wins(2);
        assert_eq!(wins[0].market, "Austin");
        assert_eq!(wins[1].market, "Houston");

        let risks = recap.top_risks(1);
        assert_eq!(risks[0].market, "Dallas");
    }

    #[test]
    fn test_empty_table_rejected() {
        let df = processed_fixture(vec![]);
        assert!(build_recap(&df).is_err());
    }

    #[test]
    fn test_artifact_name_zero_padded() {
        let recap = WeeklyRecap {
            year: 2025,
            week: 7,
            markets: vec![],
        };
        assert_eq!(recap.artifact_name(), "recap_2025-W07.html");
    }
}
