pub mod config;
pub mod run_job;
