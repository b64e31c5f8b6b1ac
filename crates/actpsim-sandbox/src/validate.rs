//! Strict validation of `ctx` call arguments.
//!
//! Messages mirror the production contract; the `ValidationError` prefix
//! is what classifies the resulting script error as `validation` rather
//! than `runtime`.

use rhai::{Dynamic, EvalAltResult, Map, Position};

use actpsim_types::{Micro, TxState};

pub type ValidateResult<T> = std::result::Result<T, Box<EvalAltResult>>;

pub fn validation_error<T>(message: String) -> ValidateResult<T> {
    Err(Box::new(EvalAltResult::ErrorRuntime(
        message.into(),
        Position::NONE,
    )))
}

pub fn require_string(map: &Map, key: &str) -> ValidateResult<String> {
    match map.get(key) {
        Some(value) if value.is_string() => {
            let s = value.clone().into_string().expect("checked string");
            if s.is_empty() {
                validation_error(format!(
                    "ValidationError for {}: must be a non-empty string",
                    key
                ))
            } else {
                Ok(s)
            }
        }
        _ => validation_error(format!(
            "ValidationError for {}: must be a non-empty string",
            key
        )),
    }
}

pub fn optional_string(map: &Map, key: &str) -> ValidateResult<Option<String>> {
    match map.get(key) {
        None => Ok(None),
        Some(_) => require_string(map, key).map(Some),
    }
}

pub fn require_amount(map: &Map, key: &str) -> ValidateResult<Micro> {
    let value = match map.get(key) {
        Some(value) if value.is_int() => value.as_int().expect("checked int"),
        _ => {
            return validation_error(format!(
                "ValidationError for {}: must be an integer (micro-USDC)",
                key
            ))
        }
    };
    if value <= 0 {
        return validation_error(format!(
            "ValidationError for {}: must be a positive integer (micro-USDC)",
            key
        ));
    }
    Ok(value)
}

pub fn optional_duration(map: &Map, key: &str) -> ValidateResult<Option<u64>> {
    let value = match map.get(key) {
        None => return Ok(None),
        Some(value) if value.is_int() => value.as_int().expect("checked int"),
        Some(_) => {
            return validation_error(format!(
                "ValidationError for {}: must be a positive integer (milliseconds)",
                key
            ))
        }
    };
    if value <= 0 {
        return validation_error(format!(
            "ValidationError for {}: must be a positive integer (milliseconds)",
            key
        ));
    }
    Ok(Some(value as u64))
}

pub fn require_tx_id(value: &str, key: &str) -> ValidateResult<String> {
    if value.is_empty() {
        validation_error(format!(
            "ValidationError for {}: must be a non-empty string",
            key
        ))
    } else {
        Ok(value.to_string())
    }
}

pub fn require_state(value: &str) -> ValidateResult<TxState> {
    value.parse::<TxState>().or_else(|_| {
        let all: Vec<&str> = TxState::ALL.iter().map(|s| s.as_str()).collect();
        validation_error(format!(
            "ValidationError for newState: must be one of {}",
            all.join(", ")
        ))
    })
}

/// Arbitrary log arguments stringify; structured values render as JSON.
pub fn stringify(value: &Dynamic) -> String {
    if value.is_string() {
        value.clone().into_string().expect("checked string")
    } else {
        value.to_string()
    }
}
