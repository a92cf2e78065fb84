//! Repository pattern for index operations

use crate::schema::{IMAGE_DIMENSION, TEXT_DIMENSION};
use crate::{DbConnection, DbError, Result};
use foodfinder_core::{ImageMetadata, TextMetadata};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Rows per INSERT statement when loading an index
const INSERT_BATCH: usize = 256;

/// Candidate list size for HNSW queries
const HNSW_EF: usize = 40;

/// The two nearest-neighbour indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTable {
    Text,
    Image,
}

impl IndexTable {
    pub fn name(self) -> &'static str {
        match self {
            IndexTable::Text => "text_index",
            IndexTable::Image => "image_index",
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            IndexTable::Text => TEXT_DIMENSION,
            IndexTable::Image => IMAGE_DIMENSION,
        }
    }
}

/// How nearest neighbours are looked up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexKind {
    /// Exact scan over every vector
    #[default]
    Flat,
    /// Approximate lookup through the HNSW index
    Hnsw,
}

/// A search hit: stored metadata plus squared Euclidean distance
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<M> {
    pub metadata: M,
    pub distance: f32,
}

/// Row counts of both indices
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub text_count: usize,
    pub image_count: usize,
}

#[derive(Serialize)]
struct IndexRow<M> {
    id: String,
    metadata: M,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct RawHit<M> {
    metadata: M,
    distance: f32,
}

#[derive(Deserialize)]
struct CountRow {
    count: usize,
}

#[derive(Deserialize)]
struct MetadataRow<M> {
    metadata: M,
}

/// Repository for all index operations
#[derive(Clone)]
pub struct Repository {
    db: DbConnection,
    kind: IndexKind,
}

impl Repository {
    /// Create a new repository using exact search
    pub fn new(db: DbConnection) -> Self {
        Self {
            db,
            kind: IndexKind::Flat,
        }
    }

    /// Builder: choose the lookup strategy
    pub fn with_kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    // ==========================================
    // WRITE OPERATIONS
    // ==========================================

    /// Add restaurant vectors to the text index
    #[instrument(skip(self, embeddings, metadata))]
    pub async fn add_text_entries(
        &self,
        embeddings: Vec<Vec<f32>>,
        metadata: Vec<TextMetadata>,
    ) -> Result<usize> {
        let keys = metadata.iter().map(|m| m.id.clone()).collect();
        self.add_entries(IndexTable::Text, embeddings, keys, metadata).await
    }

    /// Add photo vectors to the image index
    #[instrument(skip(self, embeddings, metadata))]
    pub async fn add_image_entries(
        &self,
        embeddings: Vec<Vec<f32>>,
        metadata: Vec<ImageMetadata>,
    ) -> Result<usize> {
        let keys = metadata.iter().map(|m| m.photo_id.clone()).collect();
        self.add_entries(IndexTable::Image, embeddings, keys, metadata).await
    }

    async fn add_entries<M>(
        &self,
        table: IndexTable,
        embeddings: Vec<Vec<f32>>,
        keys: Vec<String>,
        metadata: Vec<M>,
    ) -> Result<usize>
    where
        M: Serialize + Send + Sync + 'static,
    {
        if embeddings.len() != metadata.len() {
            return Err(DbError::LengthMismatch {
                embeddings: embeddings.len(),
                metadata: metadata.len(),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != table.dimension()) {
            return Err(DbError::DimensionMismatch {
                table: table.name(),
                expected: table.dimension(),
                actual: bad.len(),
            });
        }

        let added = embeddings.len();
        let mut rows: Vec<IndexRow<M>> = keys
            .into_iter()
            .zip(metadata)
            .zip(embeddings)
            .map(|((id, metadata), embedding)| IndexRow {
                id,
                metadata,
                embedding,
            })
            .collect();

        // All batches commit together or not at all
        let mut batches = Vec::new();
        while !rows.is_empty() {
            let rest = rows.split_off(rows.len().min(INSERT_BATCH));
            batches.push(std::mem::replace(&mut rows, rest));
        }

        let mut statement = String::from("BEGIN TRANSACTION;\n");
        for i in 0..batches.len() {
            statement.push_str(&format!("INSERT INTO {} $rows{};\n", table.name(), i));
        }
        statement.push_str("COMMIT TRANSACTION;");

        debug!(
            "Inserting {} rows into {} in {} batches",
            added,
            table.name(),
            batches.len()
        );
        let mut query = self.db.query(statement);
        for (i, batch) in batches.into_iter().enumerate() {
            query = query.bind((format!("rows{}", i), batch));
        }
        query.await?.check()?;

        let total = self.count(table).await?;
        info!("Added {} vectors. Total: {}", added, total);
        Ok(added)
    }

    /// Replace the metadata of one restaurant without touching its vector
    #[instrument(skip(self, metadata))]
    pub async fn update_text_metadata(&self, metadata: TextMetadata) -> Result<bool> {
        let key = metadata.id.clone();
        self.update_metadata(IndexTable::Text, key, metadata).await
    }

    /// Replace the metadata of one photo without touching its vector
    #[instrument(skip(self, metadata))]
    pub async fn update_image_metadata(&self, metadata: ImageMetadata) -> Result<bool> {
        let key = metadata.photo_id.clone();
        self.update_metadata(IndexTable::Image, key, metadata).await
    }

    async fn update_metadata<M>(&self, table: IndexTable, key: String, metadata: M) -> Result<bool>
    where
        M: Serialize + Send + Sync + 'static,
    {
        let updated: Vec<MetadataRow<serde_json::Value>> = self
            .db
            .query("UPDATE type::thing($table, $key) SET metadata = $metadata RETURN metadata")
            .bind(("table", table.name()))
            .bind(("key", key))
            .bind(("metadata", metadata))
            .await?
            .take(0)?;

        Ok(!updated.is_empty())
    }

    /// Remove every row of an index
    #[instrument(skip(self))]
    pub async fn clear(&self, table: IndexTable) -> Result<()> {
        self.db
            .query(format!("DELETE {}", table.name()))
            .await?
            .check()?;
        info!("Cleared {}", table.name());
        Ok(())
    }

    pub async fn clear_text(&self) -> Result<()> {
        self.clear(IndexTable::Text).await
    }

    pub async fn clear_image(&self) -> Result<()> {
        self.clear(IndexTable::Image).await
    }

    // ==========================================
    // SEARCH OPERATIONS
    // ==========================================

    /// Nearest restaurants to a text embedding
    #[instrument(skip(self, embedding))]
    pub async fn search_text(
        &self,
        embedding: Vec<f32>,
        k: usize,
    ) -> Result<Vec<Neighbor<TextMetadata>>> {
        self.search(IndexTable::Text, embedding, k).await
    }

    /// Nearest photos to an image embedding
    #[instrument(skip(self, embedding))]
    pub async fn search_image(
        &self,
        embedding: Vec<f32>,
        k: usize,
    ) -> Result<Vec<Neighbor<ImageMetadata>>> {
        self.search(IndexTable::Image, embedding, k).await
    }

    async fn search<M>(
        &self,
        table: IndexTable,
        embedding: Vec<f32>,
        k: usize,
    ) -> Result<Vec<Neighbor<M>>>
    where
        M: DeserializeOwned,
    {
        if embedding.len() != table.dimension() {
            return Err(DbError::DimensionMismatch {
                table: table.name(),
                expected: table.dimension(),
                actual: embedding.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let statement = match self.kind {
            IndexKind::Flat => format!(
                r#"
                SELECT
                    metadata,
                    vector::distance::euclidean(embedding, $embedding) AS distance
                FROM {table}
                ORDER BY distance ASC
                LIMIT $limit
                "#,
                table = table.name()
            ),
            IndexKind::Hnsw => format!(
                r#"
                SELECT
                    metadata,
                    vector::distance::knn() AS distance
                FROM {table}
                WHERE embedding <|{k},{ef}|> $embedding
                ORDER BY distance ASC
                LIMIT $limit
                "#,
                table = table.name(),
                k = k,
                ef = HNSW_EF.max(k)
            ),
        };

        let hits: Vec<RawHit<M>> = self
            .db
            .query(statement)
            .bind(("embedding", embedding))
            .bind(("limit", k))
            .await?
            .take(0)?;

        debug!("{} returned {} hits", table.name(), hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| Neighbor {
                metadata: hit.metadata,
                distance: hit.distance * hit.distance,
            })
            .collect())
    }

    // ==========================================
    // STATS
    // ==========================================

    /// Number of vectors in an index
    #[instrument(skip(self))]
    pub async fn count(&self, table: IndexTable) -> Result<usize> {
        let rows: Vec<CountRow> = self
            .db
            .query(format!("SELECT count() FROM {} GROUP ALL", table.name()))
            .await?
            .take(0)?;

        Ok(rows.first().map(|row| row.count).unwrap_or(0))
    }

    pub async fn count_text(&self) -> Result<usize> {
        self.count(IndexTable::Text).await
    }

    pub async fn count_image(&self) -> Result<usize> {
        self.count(IndexTable::Image).await
    }

    /// Whether an index holds any vectors
    pub async fn is_built(&self, table: IndexTable) -> Result<bool> {
        Ok(self.count(table).await? > 0)
    }

    /// Row counts of both indices
    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            text_count: self.count(IndexTable::Text).await?,
            image_count: self.count(IndexTable::Image).await?,
        })
    }

    /// First stored text metadata entry, for inspection
    pub async fn sample_text_metadata(&self) -> Result<Option<TextMetadata>> {
        self.sample_metadata(IndexTable::Text).await
    }

    /// First stored image metadata entry, for inspection
    pub async fn sample_image_metadata(&self) -> Result<Option<ImageMetadata>> {
        self.sample_metadata(IndexTable::Image).await
    }

    async fn sample_metadata<M: DeserializeOwned>(&self, table: IndexTable) -> Result<Option<M>> {
        let rows: Vec<MetadataRow<M>> = self
            .db
            .query(format!("SELECT metadata FROM {} LIMIT 1", table.name()))
            .await?
            .take(0)?;

        Ok(rows.into_iter().next().map(|row| row.metadata))
    }
}
