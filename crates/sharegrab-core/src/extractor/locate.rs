//! Finding the payload text inside a response body.

use regex::Regex;
use scraper::{Html, Selector};

use super::{Locator, RuleError};

#[derive(Debug, Clone)]
pub(crate) enum CompiledLocator {
    ScriptVariable {
        marker: String,
        pattern: Regex,
        strip: Vec<String>,
    },
    ScriptNode {
        selector: Selector,
        prefix: String,
    },
    Body,
}

impl CompiledLocator {
    pub(crate) fn compile(locator: &Locator) -> Result<Self, RuleError> {
        Ok(match locator {
            Locator::ScriptVariable {
                marker,
                terminator,
                strip,
            } => CompiledLocator::ScriptVariable {
                marker: marker.clone(),
                pattern: Regex::new(&format!(
                    "(?s){}(.*?){}",
                    regex::escape(marker),
                    regex::escape(terminator)
                ))?,
                strip: strip.clone(),
            },
            Locator::ScriptNode { selector, prefix } => CompiledLocator::ScriptNode {
                selector: Selector::parse(selector)
                    .map_err(|e| RuleError::Selector(format!("{selector:?}: {e:?}")))?,
                prefix: prefix.clone(),
            },
            Locator::Body => CompiledLocator::Body,
        })
    }

    /// Payload text within `body`, or a description of what was missing.
    pub(crate) fn locate<'b>(&self, body: &'b str) -> Result<std::borrow::Cow<'b, str>, String> {
        match self {
            CompiledLocator::ScriptVariable {
                marker,
                pattern,
                strip,
            } => {
                let captured = pattern
                    .captures(body)
                    .and_then(|c| c.get(1))
                    .ok_or_else(|| format!("marker {marker:?} not found"))?
                    .as_str();
                Ok(strip_suffixes(captured, strip).into())
            }
            CompiledLocator::ScriptNode { selector, prefix } => {
                let document = Html::parse_document(body);
                document
                    .select(selector)
                    .map(|node| node.text().collect::<String>())
                    .find_map(|text| {
                        text.trim_start()
                            .strip_prefix(prefix.as_str())
                            .map(str::to_string)
                    })
                    .map(Into::into)
                    .ok_or_else(|| format!("no script node starting with {prefix:?}"))
            }
            CompiledLocator::Body => Ok(body.into()),
        }
    }
}

fn strip_suffixes<'a>(mut text: &'a str, suffixes: &[String]) -> &'a str {
    text = text.trim_end();
    for suffix in suffixes {
        if let Some(rest) = text.strip_suffix(suffix.as_str()) {
            text = rest.trim_end();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(marker: &str, strip: &[&str]) -> CompiledLocator {
        CompiledLocator::compile(&Locator::ScriptVariable {
            marker: marker.to_string(),
            terminator: "</script>".to_string(),
            strip: strip.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn script_variable_captures_up_to_terminator() {
        let loc = variable("window.__playinfo__=", &[]);
        let html = "<script>window.__playinfo__={\"a\":1}</script><script>x</script>";
        assert_eq!(loc.locate(html).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn script_variable_marker_is_literal() {
        // The `.` and `$` in markers must not act as regex metacharacters.
        let loc = variable("window.INIT_STATE = ", &[]);
        assert!(loc.locate("<script>windowXINIT_STATE = {}</script>").is_err());
        assert!(loc.locate("<script>window.INIT_STATE = {}</script>").is_ok());
    }

    #[test]
    fn script_variable_strips_declared_suffix() {
        let suffix = ";(function(){var s;}());";
        let loc = variable("window.__APOLLO_STATE__=", &[suffix]);
        let html = format!("<script>window.__APOLLO_STATE__={{\"k\":2}}{suffix}</script>");
        assert_eq!(loc.locate(&html).unwrap(), "{\"k\":2}");
    }

    #[test]
    fn missing_marker_is_reported() {
        let loc = variable("window.__DATA__=", &[]);
        let err = loc.locate("<html></html>").unwrap_err();
        assert!(err.contains("window.__DATA__="), "{err}");
    }

    #[test]
    fn script_node_selects_by_prefix() {
        let loc = CompiledLocator::compile(&Locator::ScriptNode {
            selector: "script".to_string(),
            prefix: "window.__INITIAL_STATE__=".to_string(),
        })
        .unwrap();
        let html = r#"<html><head><script>var a = 1;</script>
            <script> window.__INITIAL_STATE__={"note":{}}</script></head></html>"#;
        assert_eq!(loc.locate(html).unwrap(), r#"{"note":{}}"#);
        assert!(loc.locate("<script>var b;</script>").is_err());
    }

    #[test]
    fn bad_selector_is_a_rule_error() {
        let err = CompiledLocator::compile(&Locator::ScriptNode {
            selector: "script[".to_string(),
            prefix: String::new(),
        })
        .unwrap_err();
        assert!(matches!(err, RuleError::Selector(_)));
    }
}
