// jsonflood - Library root, shared by the binaries and the integration tests

pub mod config;
pub mod engine;
pub mod error;
pub mod mock_server;
pub mod report;
pub mod schema;
pub mod stats;
