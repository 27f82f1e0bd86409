//! wallpaperscraft: full-size image URL built from the page id and the
//! resolution key of its download link.

use std::time::Duration;

use regex::Regex;

use crate::context::FetchContext;
use crate::error::AdapterError;
use crate::extractor::RuleError;
use crate::http::{HttpClient, Method};
use crate::model::{MediaDescriptor, MediaItem, MediaKind, RawResponse};
use crate::resolver::{IdRule, ResolveSpec};

use super::{host_matches, AdapterOptions, PlatformAdapter};

const DOMAINS: &[&str] = &["wallpaperscraft.ru", "wallpaperscraft.com"];
const REFERER: &str = "https://wallpaperscraft.ru/";
const IMAGE_BASE: &str = "https://images.wallpaperscraft.ru/image/single/";

pub struct WallpaperAdapter {
    options: AdapterOptions,
    spec: ResolveSpec,
    download_link: Regex,
}

impl WallpaperAdapter {
    pub fn new(options: AdapterOptions) -> Result<Self, RuleError> {
        Ok(Self {
            spec: ResolveSpec::new(Method::Get, IdRule::PathSegment(-1))
                .max_redirects(options.max_redirects),
            download_link: Regex::new(r#"<a href="/download/(.*?)""#)?,
            options,
        })
    }
}

impl PlatformAdapter for WallpaperAdapter {
    fn name(&self) -> &str {
        "wallpaper"
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
        let link = self
            .download_link
            .captures(&raw.body)
            .and_then(|c| c.get(1))
            .ok_or_else(|| AdapterError::ParseFailure("no /download/ link on page".to_string()))?
            .as_str();
        // `/download/<slug>/<resolution>`: the key is the last segment.
        let key = link
            .rsplit('/')
            .find(|s| !s.is_empty())
            .ok_or_else(|| AdapterError::ParseFailure(format!("empty download link {link:?}")))?;
        let name = format!("{}_{}", raw.resource_id, key);
        let url = format!("{IMAGE_BASE}{name}.jpg");
        MediaDescriptor::new(&name, vec![MediaItem::new(MediaKind::Image, url, "jpg")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceId;

    #[test]
    fn builds_image_url_from_download_link() {
        let adapter = WallpaperAdapter::new(AdapterOptions::default()).unwrap();
        let id = adapter
            .resolve_spec()
            .id_rule
            .extract("https://wallpaperscraft.ru/wallpaper/girl_anime_art_157230")
            .unwrap();
        assert_eq!(id.as_str(), "girl_anime_art_157230");

        let html = r#"<div class="wallpaper__download">
<a href="/download/girl_anime_art_157230/1920x1080" class="gui-button">Download</a></div>"#;
        let raw = RawResponse::from_body(
            "https://wallpaperscraft.ru/wallpaper/girl_anime_art_157230",
            id,
            html,
        );
        let d = adapter.extract(&raw).unwrap();
        assert_eq!(d.title(), "girl_anime_art_157230_1920x1080");
        assert_eq!(
            d.items()[0].source_url,
            "https://images.wallpaperscraft.ru/image/single/girl_anime_art_157230_1920x1080.jpg"
        );
        assert_eq!(d.items()[0].kind, MediaKind::Image);
    }

    #[test]
    fn page_without_download_link_is_parse_failure() {
        let adapter = WallpaperAdapter::new(AdapterOptions::default()).unwrap();
        let raw = RawResponse::from_body(
            "https://wallpaperscraft.ru/wallpaper/x_1",
            ResourceId::new("x_1").unwrap(),
            "<html>catalog</html>",
        );
        assert!(matches!(adapter.extract(&raw), Err(AdapterError::ParseFailure(_))));
    }
}
