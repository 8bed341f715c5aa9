//! Chunked posting store and the indexing/query pipeline
//!
//! Documents move through three stages:
//! - pending: fragments tokenized since the last batch commit
//! - open chunk: committed documents, postings kept decoded
//! - sealed chunks: full chunks, postings encoded, deletes in a bitmap
//!
//! A chunk is sealed once it holds `chunk_capacity` live documents; the
//! documents that filled it are reported through a chunk-completed
//! notification.

mod buffer;
mod index;
mod pending;
mod postings;
mod sealed;
mod types;

pub use buffer::OpenChunk;
pub use index::{ChunkHandler, TextIndex};
pub use postings::{decode_postings, decode_vbyte, encode_postings, encode_vbyte};
pub use sealed::SealedChunk;
pub use types::{ChunkCompleted, ChunkId, DocInfo, DocSlot, DocumentId, Entry, InstanceOffset, Posting};
