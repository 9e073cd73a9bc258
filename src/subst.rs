//! Minimal `%(key)s`-style named substitution, shared by [`crate::cmdlist`]'s
//! `tmpl_vals` and the QA engine's answer-template rendering.
//!
//! This deliberately does not pull in a templating crate: the grammar is a
//! single substitution form lifted directly from the engine this crate is
//! modeled on, and is no richer than `str::replace` needs to be.

use std::collections::HashMap;

/// Replace every `%(key)s` occurrence in `template` with `values[key]`.
/// Keys with no entry in `values` are left untouched.
pub fn percent_format(template: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("%(") {
        let Some(close_rel) = rest[start..].find(")s") else {
            out.push_str(rest);
            return out;
        };
        let close = start + close_rel;
        let key = &rest[start + 2..close];
        out.push_str(&rest[..start]);
        match values.get(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..close + 2]),
        }
        rest = &rest[close + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_key() {
        let mut vals = HashMap::new();
        vals.insert("x".to_string(), "world".to_string());
        assert_eq!(percent_format("hello %(x)s", &vals), "hello world");
    }

    #[test]
    fn leaves_unknown_key_untouched() {
        let vals = HashMap::new();
        assert_eq!(percent_format("hello %(x)s", &vals), "hello %(x)s");
    }

    #[test]
    fn multiple_substitutions() {
        let mut vals = HashMap::new();
        vals.insert("a".to_string(), "1".to_string());
        vals.insert("b".to_string(), "2".to_string());
        assert_eq!(percent_format("%(a)s-%(b)s", &vals), "1-2");
    }

    #[test]
    fn no_placeholders_is_passthrough() {
        let vals = HashMap::new();
        assert_eq!(percent_format("plain text", &vals), "plain text");
    }
}
