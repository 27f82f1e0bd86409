//! bilibili: DASH streams from the `window.__playinfo__` blob of the video page.

use std::time::Duration;

use crate::context::FetchContext;
use crate::error::AdapterError;
use crate::extractor::{
    ExtractionRules, Extractor, ItemRule, Locator, RuleError, Selection, TitleRule,
};
use crate::http::{HttpClient, Method};
use crate::model::{MediaDescriptor, MediaKind, RawResponse};
use crate::resolver::{IdRule, ResolveSpec, Resolution};

use super::{fetch_page, host_matches, AdapterOptions, PlatformAdapter};

const DOMAINS: &[&str] = &["bilibili.com", "b23.tv"];
const REFERER: &str = "https://www.bilibili.com/";

pub struct BilibiliAdapter {
    options: AdapterOptions,
    spec: ResolveSpec,
    extractor: Extractor,
}

impl BilibiliAdapter {
    pub fn new(options: AdapterOptions) -> Result<Self, RuleError> {
        let spec = ResolveSpec::new(Method::Get, IdRule::pattern(r"/video/(BV[0-9A-Za-z]+)")?)
            .max_redirects(options.max_redirects);
        // Streams are listed in ascending quality; take the last of each.
        let rules = ExtractionRules {
            locator: Locator::ScriptVariable {
                marker: "window.__playinfo__=".to_string(),
                terminator: "</script>".to_string(),
                strip: Vec::new(),
            },
            title: Some(TitleRule::Pattern {
                regex: r#"title="(.*?)""#.to_string(),
            }),
            items: vec![
                ItemRule::new(MediaKind::Video, "data.dash.video", "mp4")
                    .select(Selection::Last)
                    .url_field("baseUrl"),
                ItemRule::new(MediaKind::Audio, "data.dash.audio", "m4a")
                    .select(Selection::Last)
                    .url_field("baseUrl")
                    .optional(),
            ],
        };
        Ok(Self {
            options,
            spec,
            extractor: Extractor::new(&rules)?,
        })
    }
}

impl PlatformAdapter for BilibiliAdapter {
    fn name(&self) -> &str {
        "bilibili"
    }

    fn matches(&self, url: &str) -> bool {
        host_matches(url, DOMAINS)
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
        Ok(self.options.context(REFERER).build())
    }

    fn fetch_resource(
        &self,
        http: &dyn HttpClient,
        context: &FetchContext,
        resolution: &Resolution,
    ) -> Result<RawResponse, AdapterError> {
        // Redirects from b23.tv land on `/video/BV…/?share_source=…`; the page
        // is only served without the slash before the query.
        let url = resolution.final_url.replace("/?", "?");
        fetch_page(http, context, &url, &resolution.resource_id)
    }

    fn extract(&self, raw: &RawResponse) -> Result<MediaDescriptor, AdapterError> {
        self.extractor.extract(raw)
    }
}
