//! Call scripts: an ordered list of kernel calls.
//!
//! ```json
//! [
//!   { "functionName": "shapes.solid.createBox", "inputs": { "width": 10, "length": 10, "height": 10 } },
//!   { "functionName": "shapes.solid.getVolume", "inputs": { "shape": "$0" } }
//! ]
//! ```
//!
//! A string input of the form `$N` is replaced by the result of step `N`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use vcad_worker_protocol::KernelKind;

/// One call in a script.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub function_name: String,
    #[serde(default)]
    pub inputs: Value,
    /// Kernel to send the call to; the first selected kernel when absent.
    #[serde(default)]
    pub kernel: Option<KernelKind>,
}

pub fn load(path: &Path) -> Result<Vec<Step>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid script {}", path.display()))
}

pub fn parse(text: &str) -> Result<Vec<Step>> {
    Ok(serde_json::from_str(text)?)
}

/// Replace `$N` references in `inputs` with earlier results.
pub fn resolve(inputs: &Value, results: &[Value]) -> Result<Value> {
    Ok(match inputs {
        Value::String(text) => match text.strip_prefix('$').map(str::parse::<usize>) {
            Some(Ok(index)) => match results.get(index) {
                Some(result) => result.clone(),
                None => bail!("reference {text} points past the {} completed steps", results.len()),
            },
            _ => inputs.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve(item, results))
                .collect::<Result<_>>()?,
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| Ok((key.clone(), resolve(value, results)?)))
                .collect::<Result<_>>()?,
        ),
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_steps() {
        let steps = parse(
            r#"[
                {"functionName": "shapes.solid.createBox", "inputs": {"width": 1}},
                {"functionName": "shapes.solid.getVolume", "kernel": "manifold"}
            ]"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].function_name, "shapes.solid.createBox");
        assert_eq!(steps[0].kernel, None);
        assert_eq!(steps[1].inputs, Value::Null);
        assert_eq!(steps[1].kernel, Some(KernelKind::Manifold));
    }

    #[test]
    fn test_resolve_nested_references() {
        let results = vec![json!({"type": "occ-shape", "id": 0})];
        let resolved = resolve(
            &json!({"shape": "$0", "offset": [1, "$x"], "label": "plain"}),
            &results,
        )
        .unwrap();
        assert_eq!(
            resolved,
            json!({"shape": {"type": "occ-shape", "id": 0}, "offset": [1, "$x"], "label": "plain"})
        );
    }

    #[test]
    fn test_resolve_forward_reference_fails() {
        assert!(resolve(&json!("$3"), &[]).is_err());
    }
}
