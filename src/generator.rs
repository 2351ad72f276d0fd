//! Synthetic Record Generator
//!
//! Produces one transaction record per (market, account, brand, rep)
//! combination per day, with goal and sales figures drawn from a parametric
//! model plus noise. Writes a per-day snapshot file and merges the rows into
//! the append-only history table, deduplicated on the natural key.

use crate::config::{PipelineConfig, NATURAL_KEY};
use crate::error::{PipelineError, Result};
use chrono::{Duration, NaiveDate, Utc};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Poisson, StandardNormal};
use std::fs::File;
use tracing::info;

const GOAL_SIGMA: f64 = 15.0;
const MIN_GOAL: i64 = 20;
const DISPLAY_LAMBDA: f64 = 1.0;
const VOID_LAMBDA: f64 = 1.0;
const POD_MEAN: f64 = 12.0;
const POD_SIGMA: f64 = 3.0;
const ACCOUNT_FACTOR_STEP: f64 = 0.05;
const MARKET_FACTOR_STEP: f64 = 0.07;
const DISPLAY_LIFT: f64 = 0.10;
const VOID_PENALTY_STEP: f64 = 0.03;
const MAX_VOID_PENALTY: f64 = 0.40;
const NOISE_MEAN: f64 = 0.95;
const NOISE_SIGMA: f64 = 0.10;

/// Parameters for one generation run
#[derive(Debug, Clone)]
pub struct GeneratorParams {
    /// Number of days to generate (backwards from today unless `start` is set)
    pub days: usize,

    /// Optional explicit start date; generation goes forward `days` days from it
    pub start: Option<NaiveDate>,

    /// Overwrite existing daily snapshots and replace those days' history rows
    pub force: bool,

    /// RNG seed, so repeated runs over identical inputs reproduce identical output
    pub seed: u64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            days: 1,
            start: None,
            force: false,
            seed: 42,
        }
    }
}

impl GeneratorParams {
    /// Calendar dates this run targets
    pub fn target_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let days = self.days.max(1) as i64;
        match self.start {
            Some(start) => (0..days).map(|i| start + Duration::days(i)).collect(),
            None => (0..days).map(|i| today - Duration::days(i)).rev().collect(),
        }
    }
}

/// Outcome of a generation run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Dates whose snapshots were written this run
    pub generated: Vec<String>,
    /// Dates skipped because a snapshot already existed
    pub skipped: Vec<String>,
    /// Total rows in the history table after the merge
    pub history_rows: usize,
}

/// Draws synthetic transaction records. Owns its RNG so repeated calls in one
/// process do not affect each other's sequences.
pub struct RecordGenerator<'a> {
    cfg: &'a PipelineConfig,
    rng: StdRng,
    display_dist: Poisson<f64>,
    void_dist: Poisson<f64>,
}

impl<'a> RecordGenerator<'a> {
    pub fn new(cfg: &'a PipelineConfig, seed: u64) -> Result<Self> {
        if cfg.markets.is_empty()
            || cfg.accounts.is_empty()
            || cfg.brands.is_empty()
            || cfg.reps.is_empty()
            || cfg.categories.is_empty()
        {
            return Err(PipelineError::Config(
                "markets, accounts, brands, reps and categories must all be non-empty".to_string(),
            ));
        }

        let display_dist =
            Poisson::new(DISPLAY_LAMBDA).map_err(|e| PipelineError::Config(e.to_string()))?;
        let void_dist =
            Poisson::new(VOID_LAMBDA).map_err(|e| PipelineError::Config(e.to_string()))?;

        Ok(Self {
            cfg,
            rng: StdRng::seed_from_u64(seed),
            display_dist,
            void_dist,
        })
    }

    fn std_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Generate one day's records: one row per (market, account, brand, rep)
    pub fn generate_day(&mut self, date: NaiveDate) -> Result<DataFrame> {
        let n = self.cfg.rows_per_day();
        let iso = date.to_string();

        let mut dates: Vec<String> = Vec::with_capacity(n);
        let mut markets: Vec<String> = Vec::with_capacity(n);
        let mut accounts: Vec<String> = Vec::with_capacity(n);
        let mut brands: Vec<String> = Vec::with_capacity(n);
        let mut categories: Vec<String> = Vec::with_capacity(n);
        let mut reps: Vec<String> = Vec::with_capacity(n);
        let mut goals: Vec<i64> = Vec::with_capacity(n);
        let mut sales: Vec<i64> = Vec::with_capacity(n);
        let mut displays_col: Vec<i64> = Vec::with_capacity(n);
        let mut pods_col: Vec<i64> = Vec::with_capacity(n);
        let mut voids_col: Vec<i64> = Vec::with_capacity(n);

        for (mi, market) in self.cfg.markets.iter().enumerate() {
            let market_factor = 1.0 + mi as f64 * MARKET_FACTOR_STEP;
            for (ai, account) in self.cfg.accounts.iter().enumerate() {
                let account_factor = 1.0 + ai as f64 * ACCOUNT_FACTOR_STEP;
                for brand in &self.cfg.brands {
                    for rep in &self.cfg.reps {
                        let ci = self.rng.gen_range(0..self.cfg.categories.len());
                        let category = self.cfg.categories[ci].clone();

                        let mean =
                            self.cfg.base_goal_for(&category) * account_factor * market_factor;
                        let goal =
                            ((mean + GOAL_SIGMA * self.std_normal()).round() as i64).max(MIN_GOAL);

                        let displays = self.rng.sample(self.display_dist) as i64;
                        let pods = ((POD_MEAN + POD_SIGMA * self.std_normal()).round() as i64)
                            .max(1);
                        let voids = self.rng.sample(self.void_dist) as i64;

                        let lift = 1.0 + DISPLAY_LIFT * displays as f64;
                        let void_penalty =
                            1.0 - (voids as f64 * VOID_PENALTY_STEP).min(MAX_VOID_PENALTY);
                        let noise = NOISE_MEAN + NOISE_SIGMA * self.std_normal();
                        let volume =
                            (goal as f64 * lift * void_penalty * noise).max(0.0).floor() as i64;

                        dates.push(iso.clone());
                        markets.push(market.clone());
                        accounts.push(account.clone());
                        brands.push(brand.clone());
                        categories.push(category);
                        reps.push(rep.clone());
                        goals.push(goal);
                        sales.push(volume);
                        displays_col.push(displays);
                        pods_col.push(pods);
                        voids_col.push(voids);
                    }
                }
            }
        }

        let df = df![
            "date" => dates,
            "market" => markets,
            "account" => accounts,
            "brand" => brands,
            "category" => categories,
            "rep" => reps,
            "goal" => goals,
            "sales_volume" => sales,
            "displays" => displays_col,
            "pods" => pods_col,
            "voids" => voids_col,
        ]?;

        Ok(df)
    }
}

/// Run a full generation pass: per-day snapshots plus the history merge.
pub fn run(cfg: &PipelineConfig, params: &GeneratorParams) -> Result<GenerationReport> {
    cfg.ensure_dirs()?;

    let today = Utc::now().date_naive();
    let dates = params.target_dates(today);
    let mut generator = RecordGenerator::new(cfg, params.seed)?;

    let mut new_days: Vec<DataFrame> = Vec::new();
    let mut generated: Vec<String> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();

    for date in &dates {
        let iso = date.to_string();
        let daily_path = cfg.daily_path(&iso);
        if daily_path.exists() && !params.force {
            info!(date = %iso, "daily snapshot exists, skipping");
            skipped.push(iso);
            continue;
        }

        let mut df = generator.generate_day(*date)?;
        let mut file = File::create(&daily_path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        info!(date = %iso, rows = df.height(), "wrote daily snapshot");

        generated.push(iso);
        new_days.push(df);
    }

    let history_rows = merge_history(cfg, new_days, params.force)?;
    info!(history_rows, "history table updated");

    Ok(GenerationReport {
        generated,
        skipped,
        history_rows,
    })
}

/// Union the new days into the history table, deduplicated on the natural key.
/// Existing rows win unless `force` is set, in which case the fresh draws
/// replace exactly the regenerated dates' rows.
fn merge_history(cfg: &PipelineConfig, new_days: Vec<DataFrame>, force: bool) -> Result<usize> {
    let history_path = cfg.history_path();

    let mut combined: Option<DataFrame> = if history_path.exists() {
        Some(
            LazyCsvReader::new(&history_path)
                .with_has_header(true)
                .finish()?
                .collect()?,
        )
    } else {
        None
    };

    for day in new_days {
        combined = Some(match combined {
            Some(acc) => acc.vstack(&day)?,
            None => day,
        });
    }

    let Some(combined) = combined else {
        // Nothing skipped, nothing generated: no history to write
        return Ok(0);
    };

    let keep = if force {
        UniqueKeepStrategy::Last
    } else {
        UniqueKeepStrategy::First
    };
    let key: Vec<String> = NATURAL_KEY.iter().map(|s| s.to_string()).collect();
    let mut deduped = combined.unique_stable(Some(&key), keep, None)?;

    let mut file = File::create(&history_path)?;
    CsvWriter::new(&mut file).finish(&mut deduped)?;

    Ok(deduped.height())
}
