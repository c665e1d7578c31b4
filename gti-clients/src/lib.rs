//! GTI Clients: vendor services behind blocking, typed APIs.
//!
//! This crate builds on `gti-core` to provide:
//! - Brokers: Interactive Brokers (Client Portal gateway) and Alpaca
//! - SQL stores: Redshift and MySQL returning polars frames
//! - AWS: signed S3 object access and DynamoDB tables
//! - OpenAI text generation
//! - FRED and BLS economic series
//! - S3-backed frame loading

pub mod aws;
pub mod broker;
pub mod data_loader;
pub mod genai;
pub mod http;
pub mod macro_data;
pub mod sql;

pub use aws::{AwsError, DynamoDbClient, S3Client};
pub use broker::{Alpaca, BrokerError, IbClient};
pub use data_loader::{DataLoader, LoadError};
pub use genai::{GenAi, GenAiError};
pub use http::HttpError;
pub use macro_data::{Bls, Fred, MacroDataError};
pub use sql::{MySql, Redshift, SqlError, SqlStore};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: clients can move to worker threads.
    #[allow(dead_code)]
    fn assert_send() {
        fn require_send<T: Send>() {}

        require_send::<S3Client>();
        require_send::<DynamoDbClient>();
        require_send::<IbClient>();
        require_send::<Alpaca>();
        require_send::<GenAi>();
        require_send::<Redshift>();
        require_send::<MySql>();
    }
}
