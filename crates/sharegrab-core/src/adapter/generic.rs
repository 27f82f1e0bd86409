//! Adapter built from a `[[sites]]` config entry.

use std::time::Duration;

use regex::Regex;

use crate::config::SiteConfig;
use crate::context::FetchContext;
use crate::error::AdapterError;
use crate::extractor::{Extractor, RuleError};
use crate::http::HttpClient;
use crate::model::{MediaDescriptor, RawResponse};
use crate::resolver::ResolveSpec;

use super::{AdapterOptions, PlatformAdapter};

pub struct GenericAdapter {
    name: String,
    url_pattern: Regex,
    spec: ResolveSpec,
    headers: Vec<(String, String)>,
    options: AdapterOptions,
    extractor: Extractor,
}

impl GenericAdapter {
    pub fn from_config(site: &SiteConfig, options: &AdapterOptions) -> Result<Self, RuleError> {
        let id_rule = site.id_rule.compile()?;
        Ok(Self {
            name: site.name.clone(),
            url_pattern: Regex::new(&site.url_pattern)?,
            spec: ResolveSpec::new(site.resolve_method, id_rule)
                .max_redirects(options.max_redirects),
            headers: site
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            options: options.clone(),
            extractor: Extractor::new(&site.rules)?,
        })
    }
}

impl PlatformAdapter for GenericAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, url: &str) -> bool {
        self.url_pattern.is_match(url.trim())
    }

    fn resolve_spec(&self) -> &ResolveSpec {
        &self.spec
    }

    fn timeout(&self) -> Duration {
        self.options.timeout
    }

    fn build_context(
        &self,
        _http: &dyn HttpClient,
        _url: &str,
    ) -> Result<FetchContext, AdapterError> {
        Ok(FetchContext::builder()
            .header("User-Agent", self.options.user_agent.as_str())
            .headers(self.headers.iter().cloned())
            .timeout(self.options.timeout)
            .build())
    }

    fn extract(&self, raw: &RawResponse) -> Result<MediaDescriptor, AdapterError> {
        self.extractor.extract(raw)
    }
}
