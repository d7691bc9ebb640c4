//! Storage infrastructure - connection pooling, migrations and backend selection

mod factory;
pub mod migrations;
mod postgres;

pub use factory::{StorageType, StoreFactory};
pub use migrations::{knowledge_migrations, Migration, PostgresMigrator};
pub use postgres::{connect_pool, PostgresConfig};
