pub mod config;
pub mod csv_export;
pub mod envelope;
pub mod error;
pub mod exchange_rate;
pub mod handlers;
pub mod nbp;
pub mod rate_limit;
pub mod server;
pub mod validation;
