//! Vector store for FoodFinder
//!
//! The text index and the image index live in SurrealDB tables; this
//! crate owns the connection, the schema and the nearest-neighbour queries.

pub mod error;
pub mod repository;
pub mod schema;

pub use error::{DbError, Result};
pub use repository::{IndexKind, IndexStats, IndexTable, Neighbor, Repository};

use std::path::Path;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

/// Database connection type
pub type DbConnection = Surreal<Db>;

/// File name of the store inside the index directory
pub const STORE_FILE: &str = "foodfinder.db";

/// Open the persistent store inside `index_dir`
pub async fn init_persistent(index_dir: impl AsRef<Path>) -> Result<DbConnection> {
    let index_dir = index_dir.as_ref();
    std::fs::create_dir_all(index_dir)
        .map_err(|e| DbError::Connection(format!("{}: {}", index_dir.display(), e)))?;
    let path = index_dir.join(STORE_FILE);
    let db = Surreal::new::<RocksDb>(path.as_path()).await?;
    setup_database(&db).await?;
    Ok(db)
}

/// Initialize database in-memory (for testing)
pub async fn init_memory() -> Result<DbConnection> {
    let db = Surreal::new::<Mem>(()).await?;
    setup_database(&db).await?;
    Ok(db)
}

/// Setup database namespace, database, and schema
async fn setup_database(db: &DbConnection) -> Result<()> {
    db.use_ns("foodfinder").use_db("indexes").await?;
    schema::initialize_schema(db).await?;
    Ok(())
}
