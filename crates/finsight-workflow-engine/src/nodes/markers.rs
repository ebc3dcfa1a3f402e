//! Built-in `start` and `end` marker executors.
//!
//! Markers exist for graph well-formedness only. A `start` node forwards
//! its input unchanged so downstream nodes can consume the initial seed; an
//! `end` node produces nothing and the run loop never writes an output for
//! it.

use serde_json::Value;

use crate::types::NodeError;

pub fn run_start(input: Value) -> Result<Value, NodeError> {
    Ok(input)
}

pub fn run_end(_input: Value) -> Result<Value, NodeError> {
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_forwards_input() {
        let input = json!({"ticker": "ACME"});
        assert_eq!(run_start(input.clone()).unwrap(), input);
    }

    #[test]
    fn end_produces_nothing() {
        assert_eq!(run_end(json!({"report": "done"})).unwrap(), Value::Null);
    }
}
