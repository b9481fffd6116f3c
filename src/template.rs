//! Command materialization.
//!
//! Turns a declarative command template plus caller-supplied parameters
//! into a literal shell command, without ever inlining a parameter value
//! into the command text. Each parameter is bound to a uniquely-named
//! environment variable (`OPSGATE_VAR_<n>`); the rendered command refers
//! to `$OPSGATE_VAR_<n>` and the value travels only through the child
//! process environment. The shell cannot reinterpret a value as command
//! syntax, so `;`, `&&`, backticks and subshells in values are inert.
//!
//! Values remain subject to normal word-splitting and glob expansion
//! unless the template author quotes the substitution (`"{{.x}}"`). That
//! is a deliberate trade-off: structural injection is prevented, spacing
//! semantics stay under the template author's control.
//!
//! The substitution syntax is closed: `{{.name}}` and nothing else. This
//! is not a general templating engine and must never become one.

use std::collections::BTreeMap;

/// Prefix for the environment-variable indirections.
///
/// The names are namespaced and always set explicitly on the child, so a
/// parameter whose name happens to collide with an inherited variable
/// still resolves to the caller-supplied value.
pub const ENV_PREFIX: &str = "OPSGATE_VAR_";

/// Template errors.
///
/// `Malformed` is a configuration error: the template text itself is
/// broken and the config should be rejected at load time.
/// `UnknownParameter` is a rendering error: the template refers to a
/// parameter that was not bound. Unknown references never silently render
/// as empty strings.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("malformed command template at byte {position}: {detail}")]
    Malformed { position: usize, detail: String },

    #[error("template references unknown parameter '{name}'")]
    UnknownParameter { name: String },
}

/// A materialized command, ready for execution.
#[derive(Debug, Clone)]
pub struct Materialized {
    /// The rendered command string. Contains `$OPSGATE_VAR_<n>`
    /// references, never parameter values.
    pub command: String,
    /// Environment bindings the executor must set on the child process.
    pub env: Vec<(String, String)>,
}

/// Render `template` with the given parameter bindings.
///
/// Parameters are assigned indirection names in sorted-key order, so the
/// rendered command is deterministic for a given template and parameter
/// set.
pub fn materialize(
    template: &str,
    params: &BTreeMap<String, String>,
) -> Result<Materialized, TemplateError> {
    // Sorted-key order gives each parameter a stable index.
    let mut env_names: BTreeMap<&str, String> = BTreeMap::new();
    let mut env = Vec::with_capacity(params.len());
    for (idx, (name, value)) in params.iter().enumerate() {
        let env_name = format!("{}{}", ENV_PREFIX, idx);
        env.push((env_name.clone(), value.clone()));
        env_names.insert(name.as_str(), env_name);
    }

    let mut command = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        command.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        let close = after_open.find("}}").ok_or(TemplateError::Malformed {
            position: offset + open,
            detail: "unterminated '{{'".to_string(),
        })?;
        let reference = &after_open[..close];

        let name = reference.strip_prefix('.').ok_or_else(|| TemplateError::Malformed {
            position: offset + open,
            detail: format!("expected '{{{{.name}}}}', found '{{{{{}}}}}'", reference),
        })?;
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(TemplateError::Malformed {
                position: offset + open,
                detail: format!("invalid parameter reference '{}'", reference),
            });
        }

        let env_name = env_names
            .get(name)
            .ok_or_else(|| TemplateError::UnknownParameter { name: name.to_string() })?;
        command.push('$');
        command.push_str(env_name);

        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    command.push_str(rest);

    Ok(Materialized { command, env })
}

/// Validate a template against its declared parameter names without
/// producing a command. Used at configuration load time so that broken
/// templates are fatal before the gateway starts serving.
pub fn validate(template: &str, declared: &[String]) -> Result<(), TemplateError> {
    let params: BTreeMap<String, String> = declared
        .iter()
        .map(|name| (name.clone(), String::new()))
        .collect();
    materialize(template, &params).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_basic_substitution() {
        let params = bind(&[("name", "World")]);
        let m = materialize("echo Hello {{.name}}", &params).unwrap();

        assert_eq!(m.command, "echo Hello $OPSGATE_VAR_0");
        assert_eq!(m.env, vec![("OPSGATE_VAR_0".to_string(), "World".to_string())]);
    }

    #[test]
    fn test_value_never_inlined() {
        let params = bind(&[("v", "; touch /tmp/pwned")]);
        let m = materialize("echo {{.v}}", &params).unwrap();

        // The dangerous value lives only in the env bindings.
        assert!(!m.command.contains("touch"));
        assert_eq!(m.env[0].1, "; touch /tmp/pwned");
    }

    #[test]
    fn test_quoted_substitution_preserved() {
        let params = bind(&[("text", "a b")]);
        let m = materialize(r#"printf '%s\n' "{{.text}}""#, &params).unwrap();

        assert_eq!(m.command, r#"printf '%s\n' "$OPSGATE_VAR_0""#);
    }

    #[test]
    fn test_multiple_parameters_sorted_order() {
        let params = bind(&[("zeta", "z"), ("alpha", "a")]);
        let m = materialize("{{.zeta}} {{.alpha}}", &params).unwrap();

        // alpha sorts first and takes index 0.
        assert_eq!(m.command, "$OPSGATE_VAR_1 $OPSGATE_VAR_0");
        assert_eq!(m.env[0], ("OPSGATE_VAR_0".to_string(), "a".to_string()));
        assert_eq!(m.env[1], ("OPSGATE_VAR_1".to_string(), "z".to_string()));
    }

    #[test]
    fn test_repeated_reference() {
        let params = bind(&[("x", "v")]);
        let m = materialize("{{.x}} {{.x}}", &params).unwrap();
        assert_eq!(m.command, "$OPSGATE_VAR_0 $OPSGATE_VAR_0");
    }

    #[test]
    fn test_unterminated_brace_is_malformed() {
        let err = materialize("echo {{.missing_end", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { .. }));
    }

    #[test]
    fn test_missing_dot_is_malformed() {
        let err = materialize("echo {{name}}", &bind(&[("name", "v")])).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { .. }));
    }

    #[test]
    fn test_empty_reference_is_malformed() {
        let err = materialize("echo {{.}}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { .. }));
    }

    #[test]
    fn test_unknown_parameter_is_rendering_error() {
        let err = materialize("echo {{.nope}}", &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownParameter { name: "nope".to_string() }
        );
    }

    #[test]
    fn test_no_substitutions_passthrough() {
        let m = materialize("uptime", &BTreeMap::new()).unwrap();
        assert_eq!(m.command, "uptime");
        assert!(m.env.is_empty());
    }

    #[test]
    fn test_hostile_parameter_name_stays_out_of_command() {
        // Parameter names never appear in the rendered command either;
        // only the numbered indirection does.
        let params = bind(&[("bad-name; touch /tmp/x", "safe value")]);
        let m = materialize("echo {{.bad-name; touch /tmp/x}}", &params);

        // Whitespace in the reference makes it malformed rather than a
        // vector for injection.
        assert!(matches!(m, Err(TemplateError::Malformed { .. })));
    }

    #[test]
    fn test_validate_accepts_declared() {
        assert!(validate("echo {{.a}} {{.b}}", &["a".into(), "b".into()]).is_ok());
    }

    #[test]
    fn test_validate_rejects_undeclared() {
        let err = validate("echo {{.c}}", &["a".into()]).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownParameter { .. }));
    }
}
