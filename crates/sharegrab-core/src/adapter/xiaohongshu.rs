//! xiaohongshu: note state from the `window.__INITIAL_STATE__` script node.
//!
//! Video notes yield one video from the CDN key; image notes yield every
//! image of the note.

use std::time::Duration;

use serde_json::Value;

use crate::context::FetchContext;
use crate::error::AdapterError;
use crate::extractor::{
    ExtractionRules, Extractor, ItemRule, JsonPath, Locator, PayloadLocator, RuleError, Selection,
    TitleRule,
};
use crate::http::{HttpClient, Method};
use crate::model::{MediaDescriptor, MediaKind, RawResponse};
use crate::resolver::{IdRule, ResolveSpec};

use super::{host_matches, AdapterOptions, PlatformAdapter};

const DOMAINS: &[&str] = &["xiaohongshu.com", "xhslink.com"];
const REFERER: &str = "https://www.xiaohongshu.com/";
const VIDEO_CDN: &str = "https://sns-video-bd.xhscdn.com/";
const NOTE_PATH: &str = "note.noteDetailMap[-1].note";

pub struct XiaohongshuAdapter {
    options: AdapterOptions,
    spec: ResolveSpec,
    state: PayloadLocator,
    note: JsonPath,
    video: Extractor,
    images: Extractor,
}

impl XiaohongshuAdapter {
    pub fn new(options: AdapterOptions) -> Result<Self, RuleError> {
        let spec = ResolveSpec::new(
            Method::Get,
            IdRule::pattern(r"(?:explore|item)/([0-9a-zA-Z]+)")?,
        )
        .max_redirects(options.max_redirects);

        let title = Some(TitleRule::Json {
            path: "title".to_string(),
        });
        let video = ExtractionRules {
            locator: Locator::Body,
            title: title.clone(),
            items: vec![
                ItemRule::new(MediaKind::Video, "video.consumer.originVideoKey", "mp4")
                    .prefix(VIDEO_CDN),
            ],
        };
        let images = ExtractionRules {
            locator: Locator::Body,
            title,
            items: vec![ItemRule::new(MediaKind::Image, "imageList", "jpg")
                .select(Selection::All)
                .url_field("urlDefault")],
        };

        Ok(Self {
            options,
            spec,
            state: PayloadLocator::new(&Locator::ScriptNode {
                selector: "script".to_string(),
                prefix: "window.__INITIAL_STATE__=".to_string(),
            })?,
            note: JsonPath::parse(NOTE_PATH).map_err(RuleError::Path)?,
            video: Extractor::new(&video)?,
            images: Extractor::new(&images)?,
        })
    }
}

impl PlatformAdapter for XiaohongshuAdapter {
    fn name(&self) -> &str {
        "xiaohongshu"
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

    fn extract(&self, raw: &RawResponse) -> Result<MediaDescriptor, AdapterError> {
        let state = self.state.payload(&raw.body)?;
        let note = self
            .note
            .lookup(&state, raw.resource_id.as_str())
            .filter(|n| n.is_object())
            .ok_or_else(|| AdapterError::ParseFailure(format!("path {NOTE_PATH} not found")))?;
        match note.get("type").and_then(Value::as_str) {
            Some("video") => self.video.describe(note, raw),
            _ => self.images.describe(note, raw),
        }
    }
}
