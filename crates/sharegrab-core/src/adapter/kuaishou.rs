//! kuaishou: Apollo state of the web page, or the INIT_STATE of the app page.
//!
//! Share links redirect either to `www.kuaishou.com/short-video/<id>` (web)
//! or to a `chenzhongtech` page carrying `photoId=<id>` (app).

use std::time::Duration;

use serde_json::Value;

use crate::context::FetchContext;
use crate::error::AdapterError;
use crate::extractor::{
    ExtractionRules, Extractor, ItemRule, Locator, PayloadLocator, RuleError, Selection, TitleRule,
};
use crate::http::{HttpClient, Method};
use crate::model::{MediaDescriptor, MediaKind, RawResponse};
use crate::resolver::{IdRule, ResolveSpec};

use super::{host_matches, AdapterOptions, PlatformAdapter};

const DOMAINS: &[&str] = &["kuaishou.com", "kuaishou.cn", "chenzhongtech.com", "chenzhongtech.cn"];
const REFERER: &str = "https://www.kuaishou.cn/new-reco";
const WEB_MARKER: &str = "window.__APOLLO_STATE__=";
const APP_MARKER: &str = "window.INIT_STATE = ";
/// The state scripts remove themselves after running.
const SELF_REMOVING_SCRIPT: &str = ";(function(){var s;(s=document.currentScript||document.scripts[document.scripts.length-1]).parentNode.removeChild(s);}());";

pub struct KuaishouAdapter {
    options: AdapterOptions,
    spec: ResolveSpec,
    web: Extractor,
    app: PayloadLocator,
    app_photo: Extractor,
}

impl KuaishouAdapter {
    pub fn new(options: AdapterOptions) -> Result<Self, RuleError> {
        let id_rule = IdRule::AnyOf(vec![
            IdRule::QueryParam("photoId".to_string()),
            IdRule::pattern(r"/short-video/([^/?#]+)")?,
        ]);
        let spec = ResolveSpec::new(Method::Get, id_rule).max_redirects(options.max_redirects);

        let state = |marker: &str| Locator::ScriptVariable {
            marker: marker.to_string(),
            terminator: "</script>".to_string(),
            strip: vec![SELF_REMOVING_SCRIPT.to_string()],
        };
        let web = ExtractionRules {
            locator: state(WEB_MARKER),
            title: Some(TitleRule::Json {
                path: "defaultClient.VisionVideoDetailPhoto:{id}.caption".to_string(),
            }),
            items: vec![ItemRule::new(
                MediaKind::Video,
                "defaultClient.VisionVideoDetailPhoto:{id}.photoUrl",
                "mp4",
            )],
        };
        // The app state keys its entries by opaque hashes; `find_photo` picks
        // the photo object and these rules run against it.
        let app_photo = ExtractionRules {
            locator: Locator::Body,
            title: Some(TitleRule::Json {
                path: "caption".to_string(),
            }),
            items: vec![ItemRule::new(MediaKind::Video, "mainMvUrls", "mp4")
                .select(Selection::First)
                .url_field("url")],
        };

        Ok(Self {
            options,
            spec,
            web: Extractor::new(&web)?,
            app: PayloadLocator::new(&state(APP_MARKER))?,
            app_photo: Extractor::new(&app_photo)?,
        })
    }

    fn extract_app(&self, raw: &RawResponse) -> Result<MediaDescriptor, AdapterError> {
        let state = self.app.payload(&raw.body)?;
        let photo = find_photo(&state, raw.resource_id.as_str()).ok_or_else(|| {
            AdapterError::ParseFailure(format!("no photo {} in INIT_STATE", raw.resource_id))
        })?;
        self.app_photo.describe(photo, raw)
    }
}

/// Depth-first search for a `"photo"` object, preferring one whose `photoId`
/// matches `id`.
fn find_photo<'v>(state: &'v Value, id: &str) -> Option<&'v Value> {
    let mut candidates = Vec::new();
    collect_photos(state, &mut candidates);
    candidates
        .iter()
        .find(|p| p.get("photoId").and_then(Value::as_str) == Some(id))
        .or_else(|| candidates.first())
        .copied()
}

fn collect_photos<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "photo" && child.is_object() {
                    out.push(child);
                } else {
                    collect_photos(child, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_photos(v, out)),
        _ => {}
    }
}

impl PlatformAdapter for KuaishouAdapter {
    fn name(&self) -> &str {
        "kuaishou"
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
        if raw.body.contains(WEB_MARKER) {
            self.web.extract(raw)
        } else if raw.body.contains(APP_MARKER) {
            self.extract_app(raw)
        } else {
            Err(AdapterError::ParseFailure(format!(
                "neither {WEB_MARKER:?} nor {APP_MARKER:?} found"
            )))
        }
    }
}
