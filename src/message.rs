//! Message templates
//!
//! Placeholders are `{{name}}` where `name` is a detail key such as
//! `value`, `property`, `path`, `error` or `description`. Unknown
//! placeholders render as an empty string.

use std::collections::BTreeMap;

/// Render `template` against `detail`
pub fn render(template: &str, detail: &BTreeMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                if let Some(value) = detail.get(name) {
                    output.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated; keep the text as written
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_placeholders() {
        let d = detail(&[("value", "http://x"), ("error", "must match the pattern '^https://.*'")]);
        assert_eq!(
            render("Server URL {{value}} {{error}}.", &d),
            "Server URL http://x must match the pattern '^https://.*'."
        );
    }

    #[test]
    fn test_unknown_placeholder_is_empty() {
        assert_eq!(render("a{{nope}}b", &BTreeMap::new()), "ab");
        assert_eq!(render("{{ property }} is bad", &detail(&[("property", "x")])), "x is bad");
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(render("no placeholders", &BTreeMap::new()), "no placeholders");
        assert_eq!(render("open {{ only", &BTreeMap::new()), "open {{ only");
        assert_eq!(render("", &BTreeMap::new()), "");
    }
}
