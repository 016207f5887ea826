//! Vector index and retrieval

mod index;
mod retriever;

pub use index::{cosine_similarity, VectorIndex};
pub use retriever::Retriever;
