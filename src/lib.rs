pub mod config;
pub mod dashboard;
pub mod error;
pub mod features;
pub mod generator;
pub mod recap;
pub mod rollup;
