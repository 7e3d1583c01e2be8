pub mod aggregator;
pub mod batch;
pub mod config;
pub mod matcher;
pub mod ocr;
