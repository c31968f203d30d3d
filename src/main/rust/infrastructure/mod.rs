pub mod alerts;
pub mod gateway;
pub mod metrics;
