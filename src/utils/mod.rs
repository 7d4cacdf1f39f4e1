//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    discover_extracts, discover_partitions, extract_directory, load_matrix, matrix_path, partition_key,
    save_matrix, write_ids, write_submission, MATRIX_EXTENSION, SUBMISSION_HEADER,
};
