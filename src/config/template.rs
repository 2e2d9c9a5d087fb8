//! Environment variable templates in config files.
//!
//! Supports:
//! - `{{ must_env "VAR" }}` - value of VAR, error if unset
//! - `{{ env "VAR" }}` - value of VAR, empty if unset
//! - `{{ env "VAR" "default" }}` - value of VAR, or default if unset or empty

use regex::Regex;
use std::env;
use std::sync::LazyLock;

static TEMPLATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        \{\{\s*
            (must_env|env)          # function (group 1)
            \s+"([^"]*)"            # variable name (group 2)
            (?:\s+"([^"]*)")?       # optional default (group 3)
        \s*\}\}
        "#,
    )
    .expect("Invalid template pattern")
});

/// Expand templates in `input`.
///
/// All missing variables are collected so they can be reported at once.
pub fn expand(input: &str) -> Result<String, Vec<String>> {
    let mut errors = Vec::new();

    let text = TEMPLATE_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let name = &caps[2];
            let value = env::var(name).ok();
            match &caps[1] {
                "must_env" => match value {
                    Some(value) => value,
                    None => {
                        errors.push(format!("environment variable {name} is not defined"));
                        caps[0].to_string()
                    }
                },
                _ => match (value, caps.get(3)) {
                    (Some(value), Some(default)) if value.is_empty() => default.as_str().to_string(),
                    (Some(value), _) => value,
                    (None, Some(default)) => default.as_str().to_string(),
                    (None, None) => String::new(),
                },
            }
        })
        .into_owned();

    if errors.is_empty() {
        Ok(text)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names so they can run in parallel.

    #[test]
    fn test_must_env() {
        env::set_var("RIN_TEMPLATE_TEST_MUST", "SSS");
        let text = expand(r#"secret: '{{ must_env "RIN_TEMPLATE_TEST_MUST" }}'"#).unwrap();
        assert_eq!(text, "secret: 'SSS'");
    }

    #[test]
    fn test_must_env_missing() {
        env::remove_var("RIN_TEMPLATE_TEST_MISSING_A");
        env::remove_var("RIN_TEMPLATE_TEST_MISSING_B");
        let errors = expand(
            r#"a: {{ must_env "RIN_TEMPLATE_TEST_MISSING_A" }}
b: {{must_env "RIN_TEMPLATE_TEST_MISSING_B"}}"#,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("RIN_TEMPLATE_TEST_MISSING_A"));
        assert!(errors[1].contains("RIN_TEMPLATE_TEST_MISSING_B"));
    }

    #[test]
    fn test_env_with_default() {
        env::remove_var("RIN_TEMPLATE_TEST_UNSET");
        let text = expand(r#"region: {{ env "RIN_TEMPLATE_TEST_UNSET" "ap-northeast-1" }}"#).unwrap();
        assert_eq!(text, "region: ap-northeast-1");

        env::set_var("RIN_TEMPLATE_TEST_EMPTY", "");
        let text = expand(r#"region: {{ env "RIN_TEMPLATE_TEST_EMPTY" "us-east-1" }}"#).unwrap();
        assert_eq!(text, "region: us-east-1");
    }

    #[test]
    fn test_env_without_default() {
        env::remove_var("RIN_TEMPLATE_TEST_NONE");
        let text = expand(r#"user: "{{ env "RIN_TEMPLATE_TEST_NONE" }}""#).unwrap();
        assert_eq!(text, r#"user: """#);
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "sql_option: \"JSON 'auto' GZIP\"\nkey_regexp: ^test/(s\\d+)/";
        assert_eq!(expand(text).unwrap(), text);
    }
}
