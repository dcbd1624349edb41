
use super::{DISTANCE_COLUMN, ID_COLUMN, TEXT_COLUMN, TITLE_COLUMN, VECTOR_COLUMN};
use crate::corpus::IngestionRecord;
use crate::database::{RecordSearch, RecordSink, StoredHit};
use crate::{LoaderError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Vector database store using LanceDB for ingestion and similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

impl VectorStore {
    /// Connect to the configured store and make sure the records table exists
    ///
    /// # Arguments
    /// * `config` - Application configuration containing store settings
    ///
    /// # Returns
    /// * `Result<Self, LoaderError>` - New VectorStore instance or error
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, LoaderError> {
        let uri = Self::resolve_uri(config)?;
        debug!("Connecting to LanceDB at: {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: config.store.table_name.clone(),
            vector_dimension: config.store.dimension as usize,
        };
        store.ensure_table().await?;

        info!(
            "Vector store ready (table {}, {} dimensions)",
            store.table_name, store.vector_dimension
        );
        Ok(store)
    }

    /// Explicit store URI, or a local directory below the config base dir
    fn resolve_uri(config: &Config) -> Result<String, LoaderError> {
        if let Some(uri) = &config.store.uri {
            return Ok(uri.clone());
        }

        let db_path = config.vector_database_path();
        std::fs::create_dir_all(&db_path).map_err(|e| {
            LoaderError::Database(format!("Failed to create vector database directory: {}", e))
        })?;
        Ok(format!("file://{}", db_path.display()))
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    /// Create the records table if missing, or check the dimension of an existing one
    async fn ensure_table(&self) -> Result<(), LoaderError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != self.vector_dimension {
                return Err(LoaderError::Database(format!(
                    "Table {} stores {}-dimensional vectors but {} are configured",
                    self.table_name, existing, self.vector_dimension
                )));
            }
            debug!("Table {} already exists", self.table_name);
            return Ok(());
        }

        self.connection
            .create_empty_table(&self.table_name, self.create_schema())
            .execute()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to create table: {}", e)))?;

        info!(
            "Created table {} with {} dimensions",
            self.table_name, self.vector_dimension
        );
        Ok(())
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, LoaderError> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == VECTOR_COLUMN {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(LoaderError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(ID_COLUMN, DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
            Field::new(TITLE_COLUMN, DataType::Utf8, false),
            Field::new(TEXT_COLUMN, DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<Table, LoaderError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to open table: {}", e)))
    }

    /// Store a batch of records in a single write
    ///
    /// # Arguments
    /// * `records` - Records to store; every vector must match the table dimension
    ///
    /// # Returns
    /// * `Result<(), LoaderError>` - Success or error
    #[inline]
    pub async fn store_records(&self, records: &[IngestionRecord]) -> Result<(), LoaderError> {
        if records.is_empty() {
            debug!("No records to store");
            return Ok(());
        }

        let record_batch = self.create_record_batch(records)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to insert records: {}", e)))?;

        debug!("Stored {} records", records.len());
        Ok(())
    }

    /// Create a RecordBatch from ingestion records
    fn create_record_batch(&self, records: &[IngestionRecord]) -> Result<RecordBatch, LoaderError> {
        let len = records.len();
        let vector_dim = self.vector_dimension;

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut titles = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);

        for record in records {
            if record.vector.len() != vector_dim {
                return Err(LoaderError::Database(format!(
                    "Record {} has {} dimensions, expected {}",
                    record.id,
                    record.vector.len(),
                    vector_dim
                )));
            }
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            titles.push(record.title.as_str());
            texts.push(record.text.as_str());
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| LoaderError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(texts)),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| LoaderError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the records closest to `query_vector` by cosine distance
    ///
    /// # Arguments
    /// * `query_vector` - The query vector to search for
    /// * `limit` - Maximum number of results to return
    ///
    /// # Returns
    /// * `Result<Vec<StoredHit>, LoaderError>` - Hits ordered by similarity
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoredHit>, LoaderError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let mut results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| LoaderError::Database(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(parse_search_batch(&batch)?);
        }

        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }

    /// Fetch stored records, optionally restricted by a SQL filter
    ///
    /// # Arguments
    /// * `filter` - Optional predicate such as `vector_id LIKE 'sfcqna%'`
    /// * `limit` - Maximum number of rows to return
    #[inline]
    pub async fn query_records(
        &self,
        filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<IngestionRecord>, LoaderError> {
        let mut query = self.open_table().await?.query().limit(limit);
        if let Some(filter) = filter {
            query = query.only_if(filter);
        }

        let mut results = query
            .execute()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to execute query: {}", e)))?;

        let mut records = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to read result stream: {}", e)))?
        {
            records.extend(parse_record_batch(&batch)?);
        }
        Ok(records)
    }

    /// Count stored rows, optionally restricted by a SQL filter
    #[inline]
    pub async fn count_records(&self, filter: Option<&str>) -> Result<u64, LoaderError> {
        let count = self
            .open_table()
            .await?
            .count_rows(filter.map(str::to_string))
            .await
            .map_err(|e| LoaderError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

#[async_trait]
impl RecordSink for VectorStore {
    #[inline]
    async fn insert_batch(&self, records: &[IngestionRecord]) -> crate::Result<()> {
        self.store_records(records).await
    }
}

#[async_trait]
impl RecordSearch for VectorStore {
    #[inline]
    async fn search(&self, vector: &[f32], limit: usize) -> crate::Result<Vec<StoredHit>> {
        self.search_similar(vector, limit).await
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, LoaderError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| LoaderError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| LoaderError::Database(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<StoredHit>, LoaderError> {
    let ids = string_column(batch, ID_COLUMN)?;
    let titles = string_column(batch, TITLE_COLUMN)?;
    let texts = string_column(batch, TEXT_COLUMN)?;
    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let hits = (0..batch.num_rows())
        .map(|row| {
            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
            StoredHit {
                vector_id: ids.value(row).to_string(),
                title: titles.value(row).to_string(),
                vector_text: texts.value(row).to_string(),
                // Convert cosine distance to similarity score (higher is better)
                score: 1.0 - distance,
            }
        })
        .collect();

    Ok(hits)
}

/// Parse a batch of full rows back into records
fn parse_record_batch(batch: &RecordBatch) -> Result<Vec<IngestionRecord>, LoaderError> {
    let ids = string_column(batch, ID_COLUMN)?;
    let titles = string_column(batch, TITLE_COLUMN)?;
    let texts = string_column(batch, TEXT_COLUMN)?;
    let vectors = batch
        .column_by_name(VECTOR_COLUMN)
        .ok_or_else(|| LoaderError::Database("Missing vector column".to_string()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| LoaderError::Database("Invalid vector column type".to_string()))?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let values = vectors.value(row);
        let vector = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| LoaderError::Database("Invalid vector item type".to_string()))?
            .values()
            .to_vec();

        records.push(IngestionRecord {
            id: ids.value(row).to_string(),
            title: titles.value(row).to_string(),
            vector,
            text: texts.value(row).to_string(),
        });
    }
    Ok(records)
}
