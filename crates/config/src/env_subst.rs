//! `${VAR}` / `${VAR:default}` environment placeholder expansion.
//!
//! Substitution runs after the config file has been parsed, recursing
//! through every string, array, and map in the value tree so it works the
//! same regardless of source format (YAML, TOML, JSON).

use serde_json::Value;

/// Replace `${VAR}` / `${VAR:default}` placeholders in a single string.
///
/// Unresolvable variables with no default are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Recursively expand placeholders through every string leaf of a JSON value tree.
pub fn substitute_value(value: &mut Value) {
    substitute_value_with(value, |name| std::env::var(name).ok());
}

fn substitute_value_with(value: &mut Value, lookup: impl Fn(&str) -> Option<String> + Copy) {
    match value {
        Value::String(s) => {
            *s = substitute_env_with(s, lookup);
        }
        Value::Array(items) => {
            for item in items {
                substitute_value_with(item, lookup);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value_with(v, lookup);
            }
        }
        _ => {}
    }
}

/// Replace placeholders using a custom lookup function, supporting
/// `${VAR}` and `${VAR:default}` forms. Separated from [`substitute_env`]
/// so tests don't need to mutate the process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut body = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                body.push(c);
            }
            if !closed {
                result.push_str("${");
                result.push_str(&body);
                continue;
            }
            let (var_name, default) = match body.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (body.as_str(), None),
            };
            if var_name.is_empty() {
                result.push_str("${");
                result.push_str(&body);
                result.push('}');
                continue;
            }
            match lookup(var_name) {
                Some(val) => result.push_str(&val),
                None => match default {
                    Some(default) => result.push_str(default),
                    None => {
                        result.push_str("${");
                        result.push_str(var_name);
                        result.push('}');
                    }
                },
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        let lookup = |name: &str| match name {
            "MOLTIS_TEST_VAR" => Some("hello".to_string()),
            _ => None,
        };
        assert_eq!(
            substitute_env_with("key=${MOLTIS_TEST_VAR}", lookup),
            "key=hello"
        );
    }

    #[test]
    fn leaves_unknown_var_without_default() {
        let lookup = |_: &str| None;
        assert_eq!(
            substitute_env_with("${MOLTIS_NONEXISTENT_XYZ}", lookup),
            "${MOLTIS_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn falls_back_to_default_value() {
        let lookup = |_: &str| None;
        assert_eq!(
            substitute_env_with("${MOLTIS_PORT:8080}", lookup),
            "8080"
        );
    }

    #[test]
    fn known_var_wins_over_default() {
        let lookup = |name: &str| (name == "MOLTIS_PORT").then(|| "9090".to_string());
        assert_eq!(
            substitute_env_with("${MOLTIS_PORT:8080}", lookup),
            "9090"
        );
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }

    #[test]
    fn recurses_through_arrays_and_maps() {
        let lookup = |name: &str| (name == "HOST").then(|| "upstream.local".to_string());
        let mut value = serde_json::json!({
            "addresses": ["${HOST}:9000", "${OTHER:fallback}:9001"],
            "nested": {"name": "${HOST}"}
        });
        substitute_value_with(&mut value, lookup);
        assert_eq!(value["addresses"][0], "upstream.local:9000");
        assert_eq!(value["addresses"][1], "fallback:9001");
        assert_eq!(value["nested"]["name"], "upstream.local");
    }
}
