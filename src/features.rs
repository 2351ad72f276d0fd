//! Feature Deriver
//!
//! Reads the full history table and produces the enriched row-level table:
//! one output row per input row, with attainment, gap-to-goal, display-uplift
//! estimates and an ISO (year, week) bucket added.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use tracing::info;

/// Column order of the enriched table
const OUTPUT_COLUMNS: [&str; 17] = [
    "date",
    "market",
    "account",
    "brand",
    "category",
    "rep",
    "goal",
    "sales_volume",
    "displays",
    "pods",
    "voids",
    "gap_to_goal",
    "pct_attained",
    "expected_no_display",
    "uplift_estimate",
    "week",
    "year",
];

fn lift_lookup(cfg: &PipelineConfig) -> Result<DataFrame> {
    let accounts: Vec<String> = cfg
        .account_lift_rates
        .iter()
        .map(|(a, _)| a.clone())
        .collect();
    let rates: Vec<f64> = cfg.account_lift_rates.iter().map(|(_, r)| *r).collect();
    let df = df![
        "account" => accounts,
        "lift_rate" => rates,
    ]?;
    Ok(df)
}

/// Compute the derived fields for every row of the history table.
///
/// pct_attained is left null (undefined) for zero goals rather than forced to
/// zero; expected_no_display stays defined since its denominator is at least 1.
pub fn derive_features(df: &DataFrame, cfg: &PipelineConfig) -> Result<DataFrame> {
    let trimmed: Vec<Expr> = ["market", "account", "brand", "category", "rep"]
        .iter()
        .map(|c| col(*c).str().strip_chars(lit(NULL)).alias(*c))
        .collect();

    let enriched = df
        .clone()
        .lazy()
        .with_columns(trimmed)
        .join(
            lift_lookup(cfg)?.lazy(),
            [col("account")],
            [col("account")],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            // Accounts outside the lookup get the default lift rate
            col("lift_rate").fill_null(lit(cfg.default_lift_rate)),
            col("date")
                .str()
                .to_date(StrptimeOptions::default())
                .alias("__date"),
            (col("goal") - col("sales_volume")).alias("gap_to_goal"),
            when(col("goal").gt(lit(0)))
                .then(
                    col("sales_volume").cast(DataType::Float64)
                        / col("goal").cast(DataType::Float64),
                )
                .otherwise(lit(NULL))
                .alias("pct_attained"),
        ])
        .with_columns([(col("sales_volume").cast(DataType::Float64)
            / (lit(1.0) + col("lift_rate") * col("displays").cast(DataType::Float64)))
        .round(0)
        .alias("expected_no_display")])
        .with_columns([
            when(
                (col("sales_volume").cast(DataType::Float64) - col("expected_no_display"))
                    .gt(lit(0.0)),
            )
            .then(col("sales_volume").cast(DataType::Float64) - col("expected_no_display"))
            .otherwise(lit(0.0))
            .alias("uplift_estimate"),
            // ISO-8601 week numbering: boundary weeks follow their Thursday's year
            col("__date").dt().week().cast(DataType::Int32).alias("week"),
            col("__date")
                .dt()
                .iso_year()
                .cast(DataType::Int32)
                .alias("year"),
        ])
        .select([cols(OUTPUT_COLUMNS.to_vec())])
        .collect()?;

    Ok(enriched)
}

/// Run the derive stage: read the history table, write the enriched table.
pub fn run(cfg: &PipelineConfig) -> Result<DataFrame> {
    cfg.ensure_dirs()?;

    let history_path = cfg.history_path();
    if !history_path.exists() {
        return Err(PipelineError::MissingInput {
            path: history_path.display().to_string(),
            stage: "generate".to_string(),
        });
    }

    let history = LazyCsvReader::new(&history_path)
        .with_has_header(true)
        .finish()?
        .collect()?;

    let mut enriched = derive_features(&history, cfg)?;

    let mut file = File::create(cfg.processed_path())?;
    CsvWriter::new(&mut file).finish(&mut enriched)?;
    info!(rows = enriched.height(), "wrote enriched table");

    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_row(
        date: &str,
        account: &str,
        goal: i64,
        sales: i64,
        displays: i64,
    ) -> DataFrame {
        df![
            "date" => [date],
            "market" => ["Dallas"],
            "account" => [account],
            "brand" => ["Lone Star Vodka"],
            "category" => ["Spirits"],
            "rep" => ["Alex Carter"],
            "goal" => [goal],
            "sales_volume" => [sales],
            "displays" => [displays],
            "pods" => [12i64],
            "voids" => [0i64],
        ]
        .unwrap()
    }

    #[test]
    fn test_derived_fields() {
        let cfg = PipelineConfig::default();
        // Kroger lift rate is 0.10, so two displays give a 1.2 baseline divisor
        let raw = raw_row("2025-03-03", "Kroger", 100, 120, 2);
        let enriched = derive_features(&raw, &cfg).unwrap();

        assert_eq!(
            enriched.column("gap_to_goal").unwrap().i64().unwrap().get(0),
            Some(-20)
        );
        let pct = enriched
            .column("pct_attained")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .unwrap();
        assert!((pct - 1.2).abs() < 1e-9);
        assert_eq!(
            enriched
                .column("expected_no_display")
                .unwrap()
                .f64()
                .unwrap()
                .get(0),
            Some(100.0)
        );
        assert_eq!(
            enriched
                .column("uplift_estimate")
                .unwrap()
                .f64()
                .unwrap()
                .get(0),
            Some(20.0)
        );
    }

    #[test]
    fn test_zero_goal_is_undefined_not_zero() {
        let cfg = PipelineConfig::default();
        let raw = raw_row("2025-03-03", "Kroger", 0, 50, 1);
        let enriched = derive_features(&raw, &cfg).unwrap();

        // pct_attained must be null, not 0.0
        assert!(enriched
            .column("pct_attained")
            .unwrap()
            .f64()
            .unwrap()
            .get(0)
            .is_none());
        // expected_no_display stays numerically defined: 50 / 1.1
        assert_eq!(
            enriched
                .column("expected_no_display")
                .unwrap()
                .f64()
                .unwrap()
                .get(0),
            Some(45.0)
        );
    }

    #[test]
    fn test_unknown_account_gets_default_lift() {
        let cfg = PipelineConfig::default();
        let raw = raw_row("2025-03-03", "Corner Bodega", 100, 107, 1);
        let enriched = derive_features(&raw, &cfg).unwrap();

        // Default rate 0.07: expected = 107 / 1.07 = 100
        assert_eq!(
            enriched
                .column("expected_no_display")
                .unwrap()
                .f64()
                .unwrap()
                .get(0),
            Some(100.0)
        );
        assert_eq!(
            enriched
                .column("uplift_estimate")
                .unwrap()
                .f64()
                .unwrap()
                .get(0),
            Some(7.0)
        );
    }

    #[test]
    fn test_iso_week_year_boundary() {
        let cfg = PipelineConfig::default();
        // 2024-12-30 is a Monday; its week's Thursday falls in 2025,
        // so the bucket is ISO week 1 of ISO year 2025
        let raw = raw_row("2024-12-30", "Kroger", 100, 100, 0);
        let enriched = derive_features(&raw, &cfg).unwrap();

        assert_eq!(
            enriched.column("week").unwrap().i32().unwrap().get(0),
            Some(1)
        );
        assert_eq!(
            enriched.column("year").unwrap().i32().unwrap().get(0),
            Some(2025)
        );
    }

    #[test]
    fn test_mid_year_week_assignment() {
        let cfg = PipelineConfig::default();
        let raw = raw_row("2025-01-06", "Kroger", 100, 100, 0);
        let enriched = derive_features(&raw, &cfg).unwrap();

        assert_eq!(
            enriched.column("week").unwrap().i32().unwrap().get(0),
            Some(2)
        );
        assert_eq!(
            enriched.column("year").unwrap().i32().unwrap().get(0),
            Some(2025)
        );
    }
}
