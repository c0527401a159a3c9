//! Shareable handle over a compiled generator tree.

use rand::Rng;
use serde_json::Value;
use std::sync::Arc;

use super::compiler;
use super::node::GeneratorNode;
use crate::error::SchemaError;

/// Produces random instances conforming to the schema it was compiled from.
///
/// Cloning is cheap (the tree sits behind an [`Arc`]) and the tree is never
/// mutated after compilation, so one generator can serve any number of
/// concurrent workers. Randomness comes from the caller: either the
/// thread-local RNG via [`generate`](Self::generate) or a worker-owned RNG via
/// [`generate_with`](Self::generate_with).
#[derive(Debug, Clone)]
pub struct InstanceGenerator {
    root: Arc<GeneratorNode>,
}

impl InstanceGenerator {
    /// Compile `schema` once and wrap the result.
    pub fn from_schema(schema: &Value) -> Result<Self, SchemaError> {
        Ok(Self::new(compiler::compile(schema)?))
    }

    pub fn new(root: GeneratorNode) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// Generate one instance using the thread-local RNG.
    pub fn generate(&self) -> Value {
        self.root.generate(&mut rand::thread_rng())
    }

    /// Generate one instance using `rng`.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        self.root.generate(rng)
    }

    pub fn root(&self) -> &GeneratorNode {
        &self.root
    }
}
