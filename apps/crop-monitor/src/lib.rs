pub mod cli;
pub mod config;
pub mod dashboard;
pub mod fields;
pub mod panels;
pub mod recommend;
pub mod report;
pub mod stats;
pub mod store;
