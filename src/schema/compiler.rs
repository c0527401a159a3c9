//! Schema compiler.
//!
//! Walks a JSON-Schema-like document once and produces a [`GeneratorNode`]
//! tree. All interpretation cost (keyword lookup, defaults, `$ref`
//! resolution, bound normalisation) is paid here so that generation only
//! draws random numbers.
//!
//! Resolution order at every node:
//! 1. non-empty `enum` → uniform choice
//! 2. non-null `default` → constant
//! 3. `$ref` → the referenced fragment, compiled at the same depth
//! 4. `type` dispatch
//!
//! Nodes deeper than [`MAX_DEPTH`] become a constant sentinel string, which
//! bounds self-referencing schemas.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};

use super::node::GeneratorNode;
use crate::error::SchemaError;

/// Recursion ceiling; nodes at a greater depth compile to the sentinel
pub const MAX_DEPTH: usize = 5;

const DEFAULT_MIN_ITEMS: usize = 1;
const DEFAULT_EXTRA_ITEMS: usize = 2;
/// Largest accepted `minItems` / `maxItems`
pub const MAX_ITEMS: usize = 100_000;
const DEFAULT_MINIMUM: i64 = 0;
const DEFAULT_MAXIMUM: i64 = 100;
const STRING_PLACEHOLDER: &str = "string_placeholder";
const FIXED_DATE: &str = "2024-05-20";
const FIXED_URI: &str = "https://api.example.com/resource/123";

/// Compile `schema` using the thread-local RNG for compile-time choices.
pub fn compile(schema: &Value) -> Result<GeneratorNode, SchemaError> {
    compile_with_rng(schema, &mut rand::thread_rng())
}

/// Compile `schema`, drawing compile-time choices (`type` lists) from `rng`.
pub fn compile_with_rng<R: Rng + ?Sized>(
    schema: &Value,
    rng: &mut R,
) -> Result<GeneratorNode, SchemaError> {
    let mut compiler = SchemaCompiler { root: schema, rng };
    let node = compiler.compile_node(schema, 0, "#")?;
    tracing::debug!("Schema compiled");
    Ok(node)
}

struct SchemaCompiler<'a, R: ?Sized> {
    root: &'a Value,
    rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> SchemaCompiler<'a, R> {
    fn compile_node(
        &mut self,
        node: &'a Value,
        depth: usize,
        path: &str,
    ) -> Result<GeneratorNode, SchemaError> {
        if depth > MAX_DEPTH {
            return Ok(GeneratorNode::sentinel());
        }

        let mut node = node;
        let mut path = path.to_string();
        let mut followed: Vec<&'a str> = Vec::new();

        loop {
            let schema = node
                .as_object()
                .ok_or_else(|| SchemaError::structure(&path, "schema must be an object"))?;

            if let Some(values) = schema.get("enum") {
                let values = values
                    .as_array()
                    .ok_or_else(|| SchemaError::structure(&path, "`enum` must be an array"))?;
                if !values.is_empty() {
                    return Ok(GeneratorNode::Choice(values.clone()));
                }
            }

            if let Some(default) = schema.get("default") {
                if !default.is_null() {
                    return Ok(GeneratorNode::Constant(default.clone()));
                }
            }

            match schema.get("$ref") {
                Some(reference) => {
                    let reference = reference
                        .as_str()
                        .ok_or_else(|| SchemaError::structure(&path, "`$ref` must be a string"))?;
                    if followed.contains(&reference) {
                        return Err(SchemaError::structure(
                            &path,
                            format!("circular `$ref` chain through '{reference}'"),
                        ));
                    }
                    followed.push(reference);
                    node = self.resolve(reference, &path)?;
                    path = reference.to_string();
                }
                None => return self.compile_type(schema, depth, &path),
            }
        }
    }

    fn resolve(&self, reference: &str, path: &str) -> Result<&'a Value, SchemaError> {
        let target = match reference {
            "#" => Some(self.root),
            r if r.starts_with("#/") => self.root.pointer(&r[1..]),
            _ => None,
        };
        target.ok_or_else(|| SchemaError::UnresolvedRef {
            path: path.to_string(),
            reference: reference.to_string(),
        })
    }

    fn compile_type(
        &mut self,
        schema: &'a Map<String, Value>,
        depth: usize,
        path: &str,
    ) -> Result<GeneratorNode, SchemaError> {
        match schema.get("type") {
            None => Ok(GeneratorNode::Null),
            Some(Value::String(ty)) => self.compile_as(schema, ty, depth, path),
            Some(Value::Array(candidates)) => {
                let names = candidates
                    .iter()
                    .map(|c| {
                        c.as_str().ok_or_else(|| {
                            SchemaError::structure(path, "`type` entries must be strings")
                        })
                    })
                    .collect::<Result<Vec<&str>, _>>()?;

                // The alternative is fixed for the lifetime of the compiled tree
                match names.choose(&mut *self.rng) {
                    Some(ty) => self.compile_as(schema, ty, depth, path),
                    None => Ok(GeneratorNode::Null),
                }
            }
            Some(_) => Err(SchemaError::structure(
                path,
                "`type` must be a string or an array of strings",
            )),
        }
    }

    fn compile_as(
        &mut self,
        schema: &'a Map<String, Value>,
        ty: &str,
        depth: usize,
        path: &str,
    ) -> Result<GeneratorNode, SchemaError> {
        match ty {
            "object" => self.compile_object(schema, depth, path),
            "array" => self.compile_array(schema, depth, path),
            "string" => Ok(compile_string(schema)),
            "integer" => compile_integer(schema, path),
            "number" => compile_number(schema, path),
            "boolean" => Ok(GeneratorNode::Boolean),
            "null" => Ok(GeneratorNode::Null),
            other => {
                tracing::debug!(path = %path, ty = %other, "Unrecognized schema type, emitting null");
                Ok(GeneratorNode::Null)
            }
        }
    }

    fn compile_object(
        &mut self,
        schema: &'a Map<String, Value>,
        depth: usize,
        path: &str,
    ) -> Result<GeneratorNode, SchemaError> {
        let required_names: Vec<&str> = match schema.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str().ok_or_else(|| {
                        SchemaError::structure(path, "`required` entries must be strings")
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(SchemaError::structure(
                    path,
                    "`required` must be an array of strings",
                ))
            }
        };

        let properties = match schema.get("properties") {
            None => None,
            Some(Value::Object(properties)) => Some(properties),
            Some(_) => {
                return Err(SchemaError::structure(
                    path,
                    "`properties` must be an object",
                ))
            }
        };

        let mut required = Vec::new();
        let mut optional = Vec::new();
        for (name, property) in properties.into_iter().flatten() {
            let child_path = format!("{path}/properties/{name}");
            let child = self.compile_node(property, depth + 1, &child_path)?;
            if required_names.contains(&name.as_str()) {
                required.push((name.clone(), child));
            } else {
                optional.push((name.clone(), child));
            }
        }

        Ok(GeneratorNode::Object { required, optional })
    }

    fn compile_array(
        &mut self,
        schema: &'a Map<String, Value>,
        depth: usize,
        path: &str,
    ) -> Result<GeneratorNode, SchemaError> {
        let item = match schema.get("items") {
            Some(items) => self.compile_node(items, depth + 1, &format!("{path}/items"))?,
            None if depth + 1 > MAX_DEPTH => GeneratorNode::sentinel(),
            None => GeneratorNode::Null,
        };

        let mut min_items = read_count(schema, "minItems", path)?.unwrap_or(DEFAULT_MIN_ITEMS);
        let mut max_items = read_count(schema, "maxItems", path)?
            .unwrap_or(min_items.saturating_add(DEFAULT_EXTRA_ITEMS));
        if min_items > max_items {
            tracing::warn!(
                path = %path,
                min_items,
                max_items,
                "minItems exceeds maxItems, swapping bounds"
            );
            std::mem::swap(&mut min_items, &mut max_items);
        }

        Ok(GeneratorNode::Array {
            item: Box::new(item),
            min_items,
            max_items,
        })
    }
}

fn compile_string(schema: &Map<String, Value>) -> GeneratorNode {
    match schema.get("format").and_then(Value::as_str) {
        Some("uuid") => GeneratorNode::Uuid,
        Some("email") => GeneratorNode::Email,
        Some("date-time") => GeneratorNode::DateTime,
        Some("date") => GeneratorNode::Constant(Value::from(FIXED_DATE)),
        Some("uri") => GeneratorNode::Constant(Value::from(FIXED_URI)),
        _ => {
            let title = schema
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(STRING_PLACEHOLDER)
                .replace(' ', "_")
                .to_lowercase();
            GeneratorNode::Constant(Value::String(title))
        }
    }
}

/// Integer range is `[ceil(minimum), floor(maximum)]`. Inverted bounds are
/// swapped; a range holding no integer at all is rejected.
fn compile_integer(schema: &Map<String, Value>, path: &str) -> Result<GeneratorNode, SchemaError> {
    let min = read_integer_bound(schema, "minimum", path)?
        .unwrap_or(IntegerBound::exact(DEFAULT_MINIMUM as i128));
    let max = read_integer_bound(schema, "maximum", path)?
        .unwrap_or(IntegerBound::exact(DEFAULT_MAXIMUM as i128));

    if min.ceil <= max.floor {
        return Ok(GeneratorNode::Integer {
            min: min.ceil,
            max: max.floor,
        });
    }
    if max.ceil <= min.floor {
        tracing::warn!(path = %path, "minimum exceeds maximum, swapping bounds");
        return Ok(GeneratorNode::Integer {
            min: max.ceil,
            max: min.floor,
        });
    }
    Err(SchemaError::structure(
        path,
        "no integer lies between `minimum` and `maximum`",
    ))
}

fn compile_number(schema: &Map<String, Value>, path: &str) -> Result<GeneratorNode, SchemaError> {
    let mut min = read_number_bound(schema, "minimum", path)?.unwrap_or(DEFAULT_MINIMUM as f64);
    let mut max = read_number_bound(schema, "maximum", path)?.unwrap_or(DEFAULT_MAXIMUM as f64);
    if min > max {
        tracing::warn!(path = %path, min, max, "minimum exceeds maximum, swapping bounds");
        std::mem::swap(&mut min, &mut max);
    }
    Ok(GeneratorNode::Number { min, max })
}

/// Non-negative integer keyword such as `minItems`.
fn read_count(
    schema: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<usize>, SchemaError> {
    match schema.get(key) {
        None => Ok(None),
        Some(value) => {
            let count = value
                .as_u64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| {
                    SchemaError::structure(path, format!("`{key}` must be a non-negative integer"))
                })?;
            if count > MAX_ITEMS {
                return Err(SchemaError::structure(
                    path,
                    format!("`{key}` must not exceed {MAX_ITEMS}, got {count}"),
                ));
            }
            Ok(Some(count))
        }
    }
}

/// A numeric bound rounded both ways, each clamped to `[i64::MIN, u64::MAX]`.
/// Both sides are equal for integral bounds.
#[derive(Debug, Clone, Copy)]
struct IntegerBound {
    ceil: i128,
    floor: i128,
}

impl IntegerBound {
    fn exact(value: i128) -> Self {
        let value = value.clamp(i64::MIN as i128, u64::MAX as i128);
        Self {
            ceil: value,
            floor: value,
        }
    }

    fn fractional(value: f64) -> Self {
        let clamp = |v: f64| (v as i128).clamp(i64::MIN as i128, u64::MAX as i128);
        Self {
            ceil: clamp(value.ceil()),
            floor: clamp(value.floor()),
        }
    }
}

fn read_integer_bound(
    schema: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<IntegerBound>, SchemaError> {
    let Some(value) = schema.get(key) else {
        return Ok(None);
    };
    let bound = if let Some(v) = value.as_i64() {
        IntegerBound::exact(v as i128)
    } else if let Some(v) = value.as_u64() {
        IntegerBound::exact(v as i128)
    } else if let Some(v) = value.as_f64() {
        IntegerBound::fractional(v)
    } else {
        return Err(SchemaError::structure(
            path,
            format!("`{key}` must be a number"),
        ));
    };
    Ok(Some(bound))
}

fn read_number_bound(
    schema: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<f64>, SchemaError> {
    match schema.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| SchemaError::structure(path, format!("`{key}` must be a number"))),
    }
}
