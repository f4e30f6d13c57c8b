//! Edge-condition evaluation.
//!
//! Two condition shapes are accepted, both evaluated against the source
//! node's output:
//!
//! - legacy: `{"type": "json_contains", "field": "a.b", "value": "x"}` —
//!   dot-path lookup followed by stringified equality;
//! - rule-based: `{"rules": [{"field", "operator", "value"}], "logic": "AND"}`
//!   with operators `eq`, `neq`, `contains`, `gt`, `lt`, `exists`.
//!
//! An absent, null, or empty-object condition is unconditional (`true`).
//! A condition that matches neither shape fails closed to `false`.

use serde::Deserialize;
use serde_json::Value;

/// Evaluate an edge condition against a node's output.
pub fn evaluate(condition: Option<&Value>, output: &Value) -> bool {
    let cond = match condition {
        None | Some(Value::Null) => return true,
        Some(c) => c,
    };
    if cond.as_object().is_some_and(|m| m.is_empty()) {
        return true;
    }
    match ConditionSpec::deserialize(cond) {
        Ok(parsed) => parsed.eval(output),
        Err(err) => {
            tracing::warn!(condition = %cond, %err, "unparseable edge condition, treating as false");
            false
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConditionSpec {
    Legacy {
        #[serde(rename = "type")]
        _kind: LegacyKind,
        field: String,
        #[serde(default)]
        value: Value,
    },
    Rules {
        rules: Vec<Rule>,
        #[serde(default)]
        logic: Logic,
    },
}

#[derive(Debug, Deserialize)]
enum LegacyKind {
    #[serde(rename = "json_contains")]
    JsonContains,
}

#[derive(Debug, Deserialize)]
struct Rule {
    field: String,
    operator: Operator,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operator {
    Eq,
    Neq,
    Contains,
    Gt,
    Lt,
    Exists,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum Logic {
    #[default]
    And,
    Or,
}

impl ConditionSpec {
    fn eval(&self, output: &Value) -> bool {
        match self {
            Self::Legacy { field, value, .. } => {
                let actual = resolve_path(output, field);
                stringify(actual.unwrap_or(&Value::Null)) == stringify(value)
            }
            Self::Rules { rules, logic } => match logic {
                Logic::And => rules.iter().all(|r| r.eval(output)),
                Logic::Or => rules.iter().any(|r| r.eval(output)),
            },
        }
    }
}

impl Rule {
    fn eval(&self, output: &Value) -> bool {
        let actual = resolve_path(output, &self.field);
        match self.operator {
            Operator::Exists => actual.is_some_and(|v| !v.is_null()),
            Operator::Eq => loose_eq(actual.unwrap_or(&Value::Null), &self.value),
            Operator::Neq => !loose_eq(actual.unwrap_or(&Value::Null), &self.value),
            Operator::Contains => contains(actual.unwrap_or(&Value::Null), &self.value),
            Operator::Gt => numeric_cmp(actual, &self.value).is_some_and(|o| o.is_gt()),
            Operator::Lt => numeric_cmp(actual, &self.value).is_some_and(|o| o.is_lt()),
        }
    }
}

/// Dot-notation traversal. Missing segments return `None`, which callers
/// treat as null.
fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equality with numeric coercion so `1` matches `1.0`.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_str()),
            other => s.contains(&other.to_string()),
        },
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        _ => false,
    }
}

/// Coerce both sides to f64, failing closed (`None`) when either side
/// cannot be read as a number.
fn numeric_cmp(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let a = as_number(actual?)?;
    let b = as_number(expected)?;
    a.partial_cmp(&b)
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
