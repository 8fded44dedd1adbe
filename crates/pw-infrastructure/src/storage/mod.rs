//! Storage layer for atomic file operations.

mod document_storage;

pub use document_storage::{DocumentStorage, StorageError, StorageFormat};
