// LanceDB vector database module
// Stores ingestion records and answers similarity searches

pub mod vector_store;

pub use vector_store::VectorStore;

/// Column holding the record id
pub const ID_COLUMN: &str = "vector_id";
/// Column holding the embedding
pub const VECTOR_COLUMN: &str = "vector";
pub const TITLE_COLUMN: &str = "title";
pub const TEXT_COLUMN: &str = "vector_text";
/// Distance column LanceDB appends to search results
pub const DISTANCE_COLUMN: &str = "_distance";
