//! Load an [`Info`] from its YAML input model, spec §6: `${VAR}`/`$VAR`
//! expansion against a caller-supplied environment map, `SOURCE_DATE_EPOCH`
//! defaulting, and dropping dependency-list entries that expand empty.

use std::collections::HashMap;

use super::Info;
use crate::error::{ConfigError, PkgResult};

/// Parse a YAML document into an [`Info`], after expanding `${VAR}`/`$VAR`
/// references against `env` and applying environment-derived defaults.
///
/// `env` is a plain map rather than `std::env::vars()` so that loading
/// remains deterministic and so the CLI-layer collaborator (out of scope
/// here, spec §1) can choose what the process environment means.
pub fn load_info(yaml: &str, env: &HashMap<String, String>) -> PkgResult<Info> {
    let expanded = expand_vars(yaml, env);
    let mut info: Info = serde_yml::from_str(&expanded).map_err(ConfigError::Yaml)?;
    drop_empty_dependencies(&mut info.overridable.depends, env);
    drop_empty_dependencies(&mut info.overridable.recommends, env);
    drop_empty_dependencies(&mut info.overridable.suggests, env);
    drop_empty_dependencies(&mut info.overridable.conflicts, env);
    drop_empty_dependencies(&mut info.overridable.provides, env);
    drop_empty_dependencies(&mut info.overridable.replaces, env);
    info = info.with_defaults(env);
    Ok(info)
}

/// Remove list entries that are empty once whitespace is trimmed — the
/// result of a dependency entry that was *entirely* an env-var reference
/// which expanded to the empty string (spec §6: "empty expansions in
/// dependency lists cause the entry to be dropped").
fn drop_empty_dependencies(list: &mut Vec<String>, _env: &HashMap<String, String>) {
    list.retain(|entry| !entry.trim().is_empty());
}

/// Expand `${VAR}` and `$VAR` references in `text` against `env`.
/// References to variables absent from `env` expand to the empty string,
/// mirroring shell behaviour under `set -u`-less expansion.
pub fn expand_vars(text: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'{' {
                if let Some(end) = text[i + 2..].find('}') {
                    let name = &text[i + 2..i + 2 + end];
                    out.push_str(env.get(name).map(String::as_str).unwrap_or(""));
                    i += 2 + end + 1;
                    continue;
                }
            } else if is_ident_start(bytes[i + 1]) {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                let name = &text[start..end];
                out.push_str(env.get(name).map(String::as_str).unwrap_or(""));
                i = end;
                continue;
            }
        }
        // Copy one (possibly multi-byte) char verbatim.
        let ch_len = text[i..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_braced_and_bare_vars() {
        let mut env = HashMap::new();
        env.insert("FOO".to_string(), "bar".to_string());
        assert_eq!(expand_vars("${FOO}-baz", &env), "bar-baz");
        assert_eq!(expand_vars("$FOO-baz", &env), "bar-baz");
    }

    #[test]
    fn unknown_var_expands_empty() {
        let env = HashMap::new();
        assert_eq!(expand_vars("pre-${MISSING}-post", &env), "pre--post");
    }

    #[test]
    fn drops_entries_that_expand_empty() {
        let mut list = vec!["foo".to_string(), "".to_string(), "  ".to_string()];
        drop_empty_dependencies(&mut list, &HashMap::new());
        assert_eq!(list, vec!["foo".to_string()]);
    }

    #[test]
    fn loads_minimal_info() {
        let yaml = r#"
name: foo
arch: amd64
version: 1.0.0
contents:
  - source: ./fake
    destination: /usr/bin/fake
"#;
        let env = HashMap::new();
        let info = load_info(yaml, &env).unwrap();
        assert_eq!(info.name, "foo");
        assert_eq!(info.overridable.contents.len(), 1);
        assert_eq!(info.umask, 0o002);
        assert_eq!(info.platform, "linux");
    }

    #[test]
    fn source_date_epoch_fills_mtime() {
        let yaml = "name: foo\narch: amd64\nversion: 1.0.0\n";
        let mut env = HashMap::new();
        env.insert("SOURCE_DATE_EPOCH".to_string(), "1700000000".to_string());
        let info = load_info(yaml, &env).unwrap();
        assert_eq!(info.mtime, Some(1700000000));
    }
}
