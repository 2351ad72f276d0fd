//! Pipeline configuration: directory layout and the market/account/brand/rep
//! enumerations every stage draws from.
//!
//! All of this used to be ambient module state in the scripts this replaces.
//! Passing an explicit config lets tests substitute a small fixture universe
//! and a temp directory without touching globals.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Columns that uniquely identify a transaction record in the history table.
/// Category is excluded: it is an attribute of the row, not part of its identity.
pub const NATURAL_KEY: [&str; 5] = ["date", "market", "account", "brand", "rep"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root for raw/, processed/ and outputs/ subdirectories
    pub data_dir: PathBuf,

    /// Root for the dashboard page and weekly_recaps/
    pub docs_dir: PathBuf,

    pub markets: Vec<String>,
    pub accounts: Vec<String>,
    pub brands: Vec<String>,
    pub reps: Vec<String>,
    pub categories: Vec<String>,

    /// (account, display lift-rate) pairs used by the uplift estimate.
    /// Accounts not listed fall back to `default_lift_rate`.
    pub account_lift_rates: Vec<(String, f64)>,
    pub default_lift_rate: f64,

    /// (category, base goal) pairs for the goal model.
    pub category_base_goals: Vec<(String, f64)>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            docs_dir: PathBuf::from("docs"),
            markets: vec![
                "Dallas".to_string(),
                "Austin".to_string(),
                "San Antonio".to_string(),
                "Houston".to_string(),
            ],
            accounts: vec![
                "Tom Thumb".to_string(),
                "Kroger".to_string(),
                "Central Market".to_string(),
                "Whole Foods".to_string(),
                "Market Street".to_string(),
            ],
            brands: vec![
                "Estate Ridge Cabernet".to_string(),
                "Lone Star Vodka".to_string(),
                "Hill Country IPA".to_string(),
                "Gulf Tequila".to_string(),
                "Prairie Pinot Grigio".to_string(),
            ],
            reps: vec![
                "Alex Carter".to_string(),
                "Jordan Lee".to_string(),
                "Taylor Morgan".to_string(),
                "Sam Nguyen".to_string(),
                "Riley Brooks".to_string(),
                "Casey Diaz".to_string(),
                "Jamie Patel".to_string(),
                "Drew Kim".to_string(),
            ],
            categories: vec![
                "Wine".to_string(),
                "Spirits".to_string(),
                "Beer".to_string(),
            ],
            account_lift_rates: vec![
                ("Tom Thumb".to_string(), 0.08),
                ("Kroger".to_string(), 0.10),
                ("Central Market".to_string(), 0.07),
                ("Whole Foods".to_string(), 0.06),
                ("Market Street".to_string(), 0.09),
            ],
            default_lift_rate: 0.07,
            category_base_goals: vec![
                ("Wine".to_string(), 120.0),
                ("Spirits".to_string(), 100.0),
                ("Beer".to_string(), 150.0),
            ],
        }
    }
}

impl PipelineConfig {
    /// Load config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.data_dir.join("outputs")
    }

    pub fn recaps_dir(&self) -> PathBuf {
        self.docs_dir.join("weekly_recaps")
    }

    pub fn daily_path(&self, date: &str) -> PathBuf {
        self.raw_dir().join(format!("daily_{date}.csv"))
    }

    pub fn history_path(&self) -> PathBuf {
        self.raw_dir().join("raw_history.csv")
    }

    pub fn processed_path(&self) -> PathBuf {
        self.processed_dir().join("processed.csv")
    }

    pub fn territory_summary_path(&self) -> PathBuf {
        self.outputs_dir().join("territory_summary.csv")
    }

    pub fn account_summary_path(&self) -> PathBuf {
        self.outputs_dir().join("account_summary.csv")
    }

    pub fn rep_scorecards_path(&self) -> PathBuf {
        self.outputs_dir().join("rep_scorecards.csv")
    }

    pub fn dashboard_path(&self) -> PathBuf {
        self.docs_dir.join("index.html")
    }

    /// Create the whole directory layout if it does not exist yet
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.raw_dir(),
            self.processed_dir(),
            self.outputs_dir(),
            self.docs_dir.clone(),
            self.recaps_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Records generated per day: one per (market, account, brand, rep) combination
    pub fn rows_per_day(&self) -> usize {
        self.markets.len() * self.accounts.len() * self.brands.len() * self.reps.len()
    }

    /// Display lift-rate for an account; unknown accounts get the default
    /// rather than an error so the lookup stays open to new accounts.
    pub fn lift_rate_for(&self, account: &str) -> f64 {
        self.account_lift_rates
            .iter()
            .find(|(a, _)| a == account)
            .map(|(_, rate)| *rate)
            .unwrap_or(self.default_lift_rate)
    }

    /// Base goal for a category; unknown categories fall back to 100
    pub fn base_goal_for(&self, category: &str) -> f64 {
        self.category_base_goals
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, goal)| *goal)
            .unwrap_or(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_universe_size() {
        let cfg = PipelineConfig::default();
        // 4 markets x 5 accounts x 5 brands x 8 reps
        assert_eq!(cfg.rows_per_day(), 800);
    }

    #[test]
    fn test_lift_rate_lookup() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.lift_rate_for("Kroger"), 0.10);
        assert_eq!(cfg.lift_rate_for("Whole Foods"), 0.06);
        // Unknown accounts must not fail, they get the default rate
        assert_eq!(cfg.lift_rate_for("Corner Bodega"), 0.07);
    }

    #[test]
    fn test_base_goal_lookup() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.base_goal_for("Beer"), 150.0);
        assert_eq!(cfg.base_goal_for("Cider"), 100.0);
    }

    #[test]
    fn test_config_roundtrip() {
        let cfg = PipelineConfig::default();
        let path = std::env::temp_dir().join("cpws_config_roundtrip.json");
        cfg.save(&path).unwrap();
        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.markets, cfg.markets);
        assert_eq!(loaded.default_lift_rate, cfg.default_lift_rate);
        std::fs::remove_file(&path).ok();
    }
}
