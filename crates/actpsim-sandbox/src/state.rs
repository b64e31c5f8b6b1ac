//! Persistent-state conversion across the VM boundary.
//!
//! rhai's size caps bound element counts per collection, not nesting, so
//! a script can build a deeply self-nested `ctx.state` that would
//! recurse unboundedly during serde conversion. `inspect` walks the
//! value first with a hard depth bound (the walk's own recursion is
//! limited by that bound) and also surfaces non-finite floats, which
//! JSON cannot represent.

use rhai::{Array, Dynamic, Map};
use serde_json::Value;

/// Maximum nesting depth of a returned persistent state
pub const MAX_STATE_DEPTH: usize = 32;

/// Outcome of the pre-conversion walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCheck {
    Pass,
    TooDeep,
    NonFinite,
}

/// Convert the stored persistent state into the VM representation.
///
/// The main side only ever stores plain objects; anything else (including
/// absent state) starts the run as an empty map.
pub fn to_vm(persistent_state: &Value) -> Dynamic {
    match persistent_state {
        Value::Object(_) => rhai::serde::to_dynamic(persistent_state)
            .unwrap_or_else(|_| Dynamic::from(Map::new())),
        _ => Dynamic::from(Map::new()),
    }
}

/// Read `ctx.state` back out of the VM as JSON.
pub fn from_vm(state: &Dynamic) -> Result<Value, String> {
    rhai::serde::from_dynamic::<Value>(state)
        .map_err(|err| format!("ctx.state could not be serialized: {}", err))
}

/// Classify a value before conversion. `remaining` is how many more
/// levels of nesting are allowed below this one.
pub fn inspect(value: &Dynamic, remaining: usize) -> StateCheck {
    if value.is_float() {
        let finite = value.as_float().map(f64::is_finite).unwrap_or(true);
        return if finite {
            StateCheck::Pass
        } else {
            StateCheck::NonFinite
        };
    }

    if value.is_map() {
        if remaining == 0 {
            return StateCheck::TooDeep;
        }
        if let Some(map) = value.read_lock::<Map>() {
            for child in map.values() {
                let check = inspect(child, remaining - 1);
                if check != StateCheck::Pass {
                    return check;
                }
            }
        }
        return StateCheck::Pass;
    }

    if value.is_array() {
        if remaining == 0 {
            return StateCheck::TooDeep;
        }
        if let Some(array) = value.read_lock::<Array>() {
            for child in array.iter() {
                let check = inspect(child, remaining - 1);
                if check != StateCheck::Pass {
                    return check;
                }
            }
        }
        return StateCheck::Pass;
    }

    StateCheck::Pass
}
