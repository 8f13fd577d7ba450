//! synth-persistence
//!
//! Postgres implementation of the core `RecordStore`, built on Diesel with an
//! r2d2 pool and embedded migrations.
//!
//! Modules:
//! - `pg`: the store, connection providers and pool builders.
//! - `migrations`: embedded migration runner.
//! - `config`: connection settings from the environment / `.env`.
//! - `schema`: Diesel table declarations.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, store_from_env, ConnectionProvider, PgPool, PgRecordStore,
             PoolProvider};
