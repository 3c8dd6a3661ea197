pub mod bench;
pub mod build;
pub mod metrics;
pub mod run;
