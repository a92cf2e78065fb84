//! SurrealDB schema definitions

use crate::{DbConnection, DbError, Result};
use tracing::info;

/// Text embedding dimension (all-mpnet-base-v2)
pub const TEXT_DIMENSION: usize = 768;

/// Image embedding dimension (CLIP ViT-B/32)
pub const IMAGE_DIMENSION: usize = 512;

/// Initialize the database schema
pub async fn initialize_schema(db: &DbConnection) -> Result<()> {
    info!("Initializing index schema...");

    db.query(SCHEMA_DEFINITION)
        .await?
        .check()
        .map_err(|e| DbError::SchemaInit(e.to_string()))?;

    info!("Schema initialized successfully");
    Ok(())
}

const SCHEMA_DEFINITION: &str = r#"
-- ============================================
-- TEXT INDEX (one row per restaurant)
-- ============================================

DEFINE TABLE IF NOT EXISTS text_index SCHEMALESS;
DEFINE FIELD IF NOT EXISTS embedding ON text_index TYPE array<float>;
DEFINE FIELD IF NOT EXISTS metadata ON text_index TYPE object;

DEFINE INDEX IF NOT EXISTS idx_text_embedding ON text_index FIELDS embedding
    HNSW DIMENSION 768 DIST EUCLIDEAN;

-- ============================================
-- IMAGE INDEX (one row per photo)
-- ============================================

DEFINE TABLE IF NOT EXISTS image_index SCHEMALESS;
DEFINE FIELD IF NOT EXISTS embedding ON image_index TYPE array<float>;
DEFINE FIELD IF NOT EXISTS metadata ON image_index TYPE object;

DEFINE INDEX IF NOT EXISTS idx_image_embedding ON image_index FIELDS embedding
    HNSW DIMENSION 512 DIST EUCLIDEAN;
"#;

#[cfg(test)]
mod tests {
    use crate::init_memory;

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = init_memory().await.expect("Failed to init db");

        let text: Vec<serde_json::Value> = db.select("text_index").await.unwrap();
        assert!(text.is_empty());

        let images: Vec<serde_json::Value> = db.select("image_index").await.unwrap();
        assert!(images.is_empty());
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = init_memory().await.expect("Failed to init db");
        super::initialize_schema(&db).await.expect("Second initialization failed");
    }
}
