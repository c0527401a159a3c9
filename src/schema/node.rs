//! Compiled generator tree.
//!
//! Every [`GeneratorNode`] is the pre-interpreted counterpart of one schema
//! fragment. All keyword lookups, defaulting and bound checks happen in the
//! compiler; `generate` only draws random numbers and builds values.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};

use super::formats;

/// String emitted in place of any fragment below the recursion ceiling
pub const MAX_DEPTH_SENTINEL: &str = "MAX_DEPTH_REACHED";

/// Upper bound on optional object keys added per instance
pub const MAX_OPTIONAL_KEYS: usize = 2;

/// One compiled schema fragment
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorNode {
    /// Always the same value (`default`, constant formats, titles, sentinel)
    Constant(Value),
    /// Uniform pick from a non-empty `enum`
    Choice(Vec<Value>),
    Object {
        required: Vec<(String, GeneratorNode)>,
        optional: Vec<(String, GeneratorNode)>,
    },
    /// Homogeneous array; length uniform in `[min_items, max_items]`
    Array {
        item: Box<GeneratorNode>,
        min_items: usize,
        max_items: usize,
    },
    Uuid,
    Email,
    /// 50/50 per call between the plain and extended timestamp layouts
    DateTime,
    Integer {
        min: i128,
        max: i128,
    },
    /// Uniform real rounded to two decimals
    Number {
        min: f64,
        max: f64,
    },
    Boolean,
    Null,
}

impl GeneratorNode {
    /// Produce one value from this node using `rng`.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            GeneratorNode::Constant(value) => value.clone(),

            GeneratorNode::Choice(values) => values.choose(rng).cloned().unwrap_or(Value::Null),

            GeneratorNode::Object { required, optional } => {
                let mut result = Map::new();
                for (name, node) in required {
                    result.insert(name.clone(), node.generate(rng));
                }

                let upper = optional.len().min(MAX_OPTIONAL_KEYS);
                let count = rng.gen_range(0..=upper);
                if count > 0 {
                    for (name, node) in optional.choose_multiple(rng, count) {
                        result.insert(name.clone(), node.generate(rng));
                    }
                }
                Value::Object(result)
            }

            GeneratorNode::Array {
                item,
                min_items,
                max_items,
            } => {
                let len = rng.gen_range(*min_items..=*max_items);
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(item.generate(rng));
                }
                Value::Array(items)
            }

            GeneratorNode::Uuid => Value::String(formats::uuid_v4(rng)),

            GeneratorNode::Email => Value::String(formats::email(rng)),

            GeneratorNode::DateTime => {
                let value = if rng.gen_bool(0.5) {
                    formats::datetime(rng)
                } else {
                    formats::datetime_extended(rng)
                };
                Value::String(value)
            }

            GeneratorNode::Integer { min, max } => integer_value(rng.gen_range(*min..=*max)),

            GeneratorNode::Number { min, max } => Value::from(number_value(rng, *min, *max)),

            GeneratorNode::Boolean => Value::Bool(rng.gen()),

            GeneratorNode::Null => Value::Null,
        }
    }

    /// Constant sentinel node used at the recursion ceiling.
    pub fn sentinel() -> Self {
        GeneratorNode::Constant(Value::String(MAX_DEPTH_SENTINEL.to_string()))
    }
}

/// Integer bounds are clamped to `[i64::MIN, u64::MAX]` at compile time, so
/// every drawn value fits one of the two JSON integer representations.
fn integer_value(value: i128) -> Value {
    if let Ok(v) = i64::try_from(value) {
        Value::from(v)
    } else if let Ok(v) = u64::try_from(value) {
        Value::from(v)
    } else {
        Value::Null
    }
}

/// Uniform real in `[min, max]` rounded to two decimals. The rounded value
/// is nudged to the nearest two-decimal value inside the range; if none
/// exists the unrounded draw is kept.
fn number_value<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    // Convex combination: finite for any finite bounds, unlike `max - min`
    let t: f64 = rng.gen();
    let raw = (min * (1.0 - t) + max * t).clamp(min, max);

    let rounded = round2(raw, f64::round);
    if rounded < min {
        let up = round2(min, f64::ceil);
        if up <= max {
            return up;
        }
        raw
    } else if rounded > max {
        let down = round2(max, f64::floor);
        if down >= min {
            return down;
        }
        raw
    } else {
        rounded
    }
}

/// Two-decimal rounding with the given rule; values too large to scale are
/// already integral and returned unchanged.
fn round2(value: f64, rule: fn(f64) -> f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        rule(scaled) / 100.0
    } else {
        value
    }
}
