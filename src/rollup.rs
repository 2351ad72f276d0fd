//! Rollup Aggregator
//!
//! Groups the enriched table into the three summary tables (territory,
//! account, rep). gap_to_goal and pct_attained are recomputed from the summed
//! totals rather than averaged per row, so pct_attained is volume-weighted
//! and many small low-goal rows cannot skew it.
//!
//! No output ordering is guaranteed; consumers sort before display.

use crate::config::PipelineConfig;
use crate::error::Result;
use polars::prelude::*;
use std::fs::File;
use tracing::info;

fn rollup(df: &DataFrame, keys: &[&str]) -> Result<DataFrame> {
    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let out = df
        .clone()
        .lazy()
        .group_by(key_exprs)
        .agg([
            col("goal").sum().alias("goal"),
            col("sales_volume").sum().alias("sales"),
            col("displays").sum().alias("displays"),
            col("pods").sum().alias("pods"),
            col("voids").sum().alias("voids"),
            col("uplift_estimate").sum().alias("uplift"),
        ])
        .with_columns([
            (col("goal") - col("sales")).alias("gap_to_goal"),
            when(col("goal").gt(lit(0)))
                .then(col("sales").cast(DataType::Float64) / col("goal").cast(DataType::Float64))
                .otherwise(lit(NULL))
                .alias("pct_attained"),
        ])
        .collect()?;
    Ok(out)
}

/// One row per (year, week, market)
pub fn territory_summary(enriched: &DataFrame) -> Result<DataFrame> {
    rollup(enriched, &["year", "week", "market"])
}

/// One row per (year, week, market, account)
pub fn account_summary(enriched: &DataFrame) -> Result<DataFrame> {
    rollup(enriched, &["year", "week", "market", "account"])
}

/// One row per (rep, market, account), summed across the entire history
pub fn rep_scorecards(enriched: &DataFrame) -> Result<DataFrame> {
    rollup(enriched, &["rep", "market", "account"])
}

/// Write all three rollup tables to the outputs directory.
pub fn write_all(cfg: &PipelineConfig, enriched: &DataFrame) -> Result<()> {
    let tables = [
        (cfg.territory_summary_path(), territory_summary(enriched)?),
        (cfg.account_summary_path(), account_summary(enriched)?),
        (cfg.rep_scorecards_path(), rep_scorecards(enriched)?),
    ];

    for (path, mut table) in tables {
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).finish(&mut table)?;
        info!(path = %path.display(), rows = table.height(), "wrote rollup");
    }

    Ok(())
}
