// Embeddings module
// Turns query text into vectors through an Ollama server

pub mod ollama;

pub use ollama::{ModelInfo, OllamaClient};

/// Blocking text embedder
///
/// Implementations may perform network I/O; async callers should run them on
/// a blocking thread.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}
