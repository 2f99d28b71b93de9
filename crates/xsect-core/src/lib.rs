pub mod batch;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod export;
pub mod extract;
pub mod launcher;
pub mod pipeline;
pub mod report;
pub mod reshape;
pub mod session;
