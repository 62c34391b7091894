pub mod connection;
pub mod ingest;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool};
pub use ingest::{ingest_catalog_csv, IngestError, IngestReport};
