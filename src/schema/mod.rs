//! Schema loading and compilation.
//!
//! A schema document is read once from disk, compiled into a
//! [`GeneratorNode`] tree and wrapped in an [`InstanceGenerator`]. The
//! document itself is not consulted again after compilation.

pub mod compiler;
pub mod formats;
pub mod generator;
pub mod node;

use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::SchemaError;

pub use compiler::{compile, compile_with_rng, MAX_DEPTH};
pub use generator::InstanceGenerator;
pub use node::{GeneratorNode, MAX_DEPTH_SENTINEL};

/// Read and parse a schema file.
///
/// A missing file and malformed JSON are reported as distinct
/// [`SchemaError`] variants.
pub fn load_schema(path: impl AsRef<Path>) -> Result<Value, SchemaError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => SchemaError::NotFound {
            path: path.to_path_buf(),
        },
        _ => SchemaError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    serde_json::from_str(&contents).map_err(|source| SchemaError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
