//! Prompt template rendering

/// Substitute `{key}` placeholders in `template` with the given values.
///
/// Unknown placeholders are left untouched so literal braces in templates
/// (JSON examples, for instance) survive rendering. Substituted values are
/// never scanned again.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replacement = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match replacement {
            Some((value, end)) => {
                result.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                result.push('{');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let template = "Hello {name}, you are {age} years old.";
        let vars = [("name", "Alice"), ("age", "30")];
        assert_eq!(render(template, &vars), "Hello Alice, you are 30 years old.");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let template = r#"{"points": [{"description": "...", "score": 1}]} {context_data}"#;
        let rendered = render(template, &[("context_data", "rows")]);
        assert!(rendered.starts_with(r#"{"points": "#));
        assert!(rendered.ends_with("rows"));
    }

    #[test]
    fn test_render_does_not_expand_inside_values() {
        let rendered = render(
            "{context_data} / {report_data}",
            &[("context_data", "{report_data}"), ("report_data", "points")],
        );
        assert_eq!(rendered, "{report_data} / points");
    }

    #[test]
    fn test_render_empty_value() {
        assert_eq!(render("a{x}b", &[("x", "")]), "ab");
    }
}
