//! Declarative extraction: response body → `MediaDescriptor`.
//!
//! A rule set names where the payload lives (`Locator`), where the title is
//! (`TitleRule`) and which JSON paths hold media URLs (`ItemRule`). Rules are
//! plain serde types so generic sites can be described in `config.toml`; an
//! `Extractor` is the compiled, validated form.
//!
//! When a path resolves to an array the rule must declare how to choose from
//! it (`Selection`). Nothing is guessed.

mod json;
mod locate;

pub use json::{parse_payload, JsonPath};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::AdapterError;
use crate::model::{MediaDescriptor, MediaItem, MediaKind, RawResponse};
use locate::CompiledLocator;

/// Where the JSON payload sits in the response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Locator {
    /// `marker` … `terminator` inside the raw HTML, minus declared suffixes.
    ScriptVariable {
        marker: String,
        #[serde(default = "default_terminator")]
        terminator: String,
        #[serde(default)]
        strip: Vec<String>,
    },
    /// First node matching a CSS selector whose text starts with `prefix`.
    ScriptNode {
        #[serde(default = "default_selector")]
        selector: String,
        prefix: String,
    },
    /// The body itself is the payload (API responses).
    Body,
}

fn default_terminator() -> String {
    "</script>".to_string()
}

fn default_selector() -> String {
    "script".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TitleRule {
    /// String at a path in the payload.
    Json { path: String },
    /// First capture group of a regex over the raw body.
    Pattern { regex: String },
}

/// How to choose among array elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    First,
    Last,
    /// Element with the largest numeric value at this field.
    MaxBy(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replace {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRule {
    #[serde(default)]
    pub kind: MediaKind,
    pub path: String,
    #[serde(default)]
    pub select: Option<Selection>,
    /// Path of the URL inside each selected element; the element itself when unset.
    #[serde(default)]
    pub url_field: Option<String>,
    pub extension: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub replace: Option<Replace>,
    /// Skip silently when the path is absent.
    #[serde(default)]
    pub optional: bool,
}

impl ItemRule {
    pub fn new(kind: MediaKind, path: &str, extension: &str) -> Self {
        Self {
            kind,
            path: path.to_string(),
            select: None,
            url_field: None,
            extension: extension.to_string(),
            prefix: None,
            replace: None,
            optional: false,
        }
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.select = Some(selection);
        self
    }

    pub fn url_field(mut self, field: &str) -> Self {
        self.url_field = Some(field.to_string());
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn replace(mut self, from: &str, to: &str) -> Self {
        self.replace = Some(Replace {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRules {
    pub locator: Locator,
    #[serde(default)]
    pub title: Option<TitleRule>,
    pub items: Vec<ItemRule>,
}

/// Invalid rule definitions, caught when an extractor is built.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid selector {0}")]
    Selector(String),
    #[error("invalid path: {0}")]
    Path(String),
    #[error("rule set has no item rules")]
    NoItems,
}

#[derive(Debug, Clone)]
enum CompiledTitle {
    Json(JsonPath),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
struct CompiledItem {
    rule: ItemRule,
    path: JsonPath,
    url_field: Option<JsonPath>,
}

/// A compiled `Locator` on its own, for adapters that walk the payload
/// themselves before applying rules.
#[derive(Debug, Clone)]
pub struct PayloadLocator(CompiledLocator);

impl PayloadLocator {
    pub fn new(locator: &Locator) -> Result<Self, RuleError> {
        Ok(Self(CompiledLocator::compile(locator)?))
    }

    /// Locates and parses the JSON payload in `body`.
    pub fn payload(&self, body: &str) -> Result<Value, AdapterError> {
        let text = self.0.locate(body).map_err(AdapterError::ParseFailure)?;
        parse_payload(&text).map_err(AdapterError::ParseFailure)
    }
}

/// Compiled `ExtractionRules`.
#[derive(Debug, Clone)]
pub struct Extractor {
    locator: PayloadLocator,
    title: Option<CompiledTitle>,
    items: Vec<CompiledItem>,
}

impl Extractor {
    pub fn new(rules: &ExtractionRules) -> Result<Self, RuleError> {
        if rules.items.is_empty() {
            return Err(RuleError::NoItems);
        }
        let locator = PayloadLocator::new(&rules.locator)?;
        let title = match &rules.title {
            Some(TitleRule::Json { path }) => {
                Some(CompiledTitle::Json(JsonPath::parse(path).map_err(RuleError::Path)?))
            }
            Some(TitleRule::Pattern { regex }) => Some(CompiledTitle::Pattern(Regex::new(regex)?)),
            None => None,
        };
        let items = rules
            .items
            .iter()
            .map(|rule| {
                Ok(CompiledItem {
                    path: JsonPath::parse(&rule.path).map_err(RuleError::Path)?,
                    url_field: rule
                        .url_field
                        .as_deref()
                        .map(JsonPath::parse)
                        .transpose()
                        .map_err(RuleError::Path)?,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        Ok(Self {
            locator,
            title,
            items,
        })
    }

    /// Locates and parses the JSON payload of `raw`.
    pub fn payload(&self, raw: &RawResponse) -> Result<Value, AdapterError> {
        self.locator.payload(&raw.body)
    }

    /// Applies the title and item rules to an already parsed payload.
    pub fn describe(
        &self,
        payload: &Value,
        raw: &RawResponse,
    ) -> Result<MediaDescriptor, AdapterError> {
        let id = raw.resource_id.as_str();
        let title = self
            .title(payload, &raw.body, id)
            .unwrap_or_else(|| id.to_string());

        let mut items = Vec::new();
        for item in &self.items {
            items.extend(item.apply(payload, id)?);
        }
        MediaDescriptor::new(&title, items)
    }

    pub fn extract(&self, raw: &RawResponse) -> Result<MediaDescriptor, AdapterError> {
        let payload = self.payload(raw)?;
        self.describe(&payload, raw)
    }

    fn title(&self, payload: &Value, body: &str, id: &str) -> Option<String> {
        let title = match self.title.as_ref()? {
            CompiledTitle::Json(path) => path.lookup(payload, id)?.as_str()?.to_string(),
            CompiledTitle::Pattern(re) => {
                let caps = re.captures(body)?;
                decode_entities(caps.get(1).or_else(|| caps.get(0))?.as_str())
            }
        };
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    }
}

impl CompiledItem {
    fn apply(&self, payload: &Value, id: &str) -> Result<Vec<MediaItem>, AdapterError> {
        let missing = |what: String| {
            if self.rule.optional {
                Ok(Vec::new())
            } else {
                Err(AdapterError::ParseFailure(what))
            }
        };

        let Some(found) = self.path.lookup(payload, id).filter(|v| !v.is_null()) else {
            return missing(format!("path {} not found", self.path));
        };
        let selected = select(found, self.rule.select.as_ref(), &self.path)?;
        if selected.is_empty() {
            let unranked = found.as_array().is_some_and(|a| !a.is_empty());
            return missing(match &self.rule.select {
                Some(Selection::MaxBy(field)) if unranked => {
                    format!("no element of {} has a numeric {field:?} for max_by", self.path)
                }
                _ => format!("path {} holds an empty array", self.path),
            });
        }

        let mut items = Vec::with_capacity(selected.len());
        for element in selected {
            let url = match &self.url_field {
                Some(field) => field.lookup(element, id),
                None => Some(element),
            }
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty());
            let Some(url) = url else {
                let location = match &self.url_field {
                    Some(field) => format!("{}.{}", self.path, field),
                    None => self.path.to_string(),
                };
                return missing(format!("no URL string at {location}"));
            };
            items.push(MediaItem::new(
                self.rule.kind,
                self.finish_url(url),
                &self.rule.extension,
            ));
        }
        Ok(items)
    }

    /// Replacement, then prefix, then protocol-relative fix-up.
    fn finish_url(&self, url: &str) -> String {
        let mut url = match &self.rule.replace {
            Some(r) => url.replace(&r.from, &r.to),
            None => url.to_string(),
        };
        if let Some(prefix) = &self.rule.prefix {
            url = format!("{prefix}{url}");
        }
        if let Some(rest) = url.strip_prefix("//") {
            url = format!("https://{rest}");
        }
        url
    }
}

fn select<'v>(
    value: &'v Value,
    selection: Option<&Selection>,
    path: &JsonPath,
) -> Result<Vec<&'v Value>, AdapterError> {
    let Value::Array(elements) = value else {
        return Ok(vec![value]);
    };
    let Some(selection) = selection else {
        return Err(AdapterError::ParseFailure(format!(
            "{path} is an array of {} but no selection policy is declared",
            elements.len()
        )));
    };
    Ok(match selection {
        Selection::First => elements.first().into_iter().collect(),
        Selection::Last => elements.last().into_iter().collect(),
        Selection::All => elements.iter().collect(),
        Selection::MaxBy(field) => elements
            .iter()
            .filter_map(|e| numeric(e.get(field.as_str())?).map(|n| (n, e)))
            .fold(None::<(f64, &Value)>, |best, (n, e)| match best {
                Some((b, _)) if b >= n => best,
                _ => Some((n, e)),
            })
            .map(|(_, e)| e)
            .into_iter()
            .collect(),
    })
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
