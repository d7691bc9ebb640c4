//! Infrastructure layer - store, ingestion and search implementations

pub mod ingestion;
pub mod knowledge_base;
pub mod logging;
pub mod metrics;
pub mod search;
pub mod services;
pub mod storage;
