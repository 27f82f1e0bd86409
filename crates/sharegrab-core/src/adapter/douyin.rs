//! douyin: aweme detail API.
//!
//! The detail endpoint wants an `msToken` (random), a `ttwid` cookie minted
//! by the bytedance register endpoint, and an `a_bogus` signature over the
//! query string. The signature comes from the injected `Signer`.

use std::time::Duration;

use rand::Rng;
use url::form_urlencoded;

use crate::context::FetchContext;
use crate::error::AdapterError;
use crate::extractor::{
    ExtractionRules, Extractor, ItemRule, Locator, RuleError, Selection, TitleRule,
};
use crate::http::{HttpClient, HttpRequest, Method};
use crate::model::{MediaDescriptor, MediaKind, RawResponse};
use crate::resolver::{IdRule, ResolveSpec, Resolution};

use super::{host_matches, AdapterOptions, PlatformAdapter};

const DOMAINS: &[&str] = &["douyin.com", "iesdouyin.com"];
const REFERER: &str = "https://www.douyin.com/";
pub const DETAIL_ENDPOINT: &str = "https://www.douyin.com/aweme/v1/web/aweme/detail/";
pub const TTWID_ENDPOINT: &str = "https://ttwid.bytedance.com/ttwid/union/register/";
const TTWID_REQUEST: &str = r#"{"region":"cn","aid":1768,"needFid":false,"service":"www.ixigua.com","migrate_info":{"ticket":"","source":"node"},"cbUrlProtocol":"https","union":true}"#;

const MS_TOKEN_LEN: usize = 120;
// Alphabet as the web client uses it (note the doubled `G`/`g`, no `J`/`j`).
const MS_TOKEN_CHARS: &[u8] = b"ABCDEFGHIGKLMNOPQRSTUVWXYZabcdefghigklmnopqrstuvwxyz0123456789=";

/// Fixed client parameters sent with every detail request, in order.
const DETAIL_PARAMS: &[(&str, &str)] = &[
    ("aid", "6383"),
    ("version_code", "190500"),
    ("version_name", "19.5.0"),
    ("device_platform", "android"),
    ("os_version", "6"),
    ("update_version_code", "1704000"),
    ("pc_client_type", "1"),
];

pub struct DouyinAdapter {
    options: AdapterOptions,
    spec: ResolveSpec,
    extractor: Extractor,
    detail_endpoint: String,
    ttwid_endpoint: String,
}

impl DouyinAdapter {
    pub fn new(options: AdapterOptions) -> Result<Self, RuleError> {
        // Share links only redirect to the canonical page on HEAD/GET; HEAD
        // avoids downloading the page.
        let spec = ResolveSpec::new(Method::Head, IdRule::pattern(r"/video/(\d+)")?)
            .max_redirects(options.max_redirects);
        let rules = ExtractionRules {
            locator: Locator::Body,
            title: Some(TitleRule::Json {
                path: "aweme_detail.desc".to_string(),
            }),
            items: vec![ItemRule::new(
                MediaKind::Video,
                "aweme_detail.video.play_addr.url_list",
                "mp4",
            )
            .select(Selection::First)
            .replace("playwm", "play")],
        };
        Ok(Self {
            options,
            spec,
            extractor: Extractor::new(&rules)?,
            detail_endpoint: DETAIL_ENDPOINT.to_string(),
            ttwid_endpoint: TTWID_ENDPOINT.to_string(),
        })
    }

    /// Points the adapter at other endpoints (local fixtures).
    pub fn with_endpoints(mut self, detail: &str, ttwid: &str) -> Self {
        self.detail_endpoint = detail.to_string();
        self.ttwid_endpoint = ttwid.to_string();
        self
    }

    fn mint_ttwid(&self, http: &dyn HttpClient) -> Result<String, AdapterError> {
        let request = HttpRequest::post(self.ttwid_endpoint.as_str(), TTWID_REQUEST)
            .header("Content-Type", "application/json")
            .header("User-Agent", self.options.user_agent.as_str())
            .timeout(self.options.timeout);
        let response = http
            .send(&request)
            .map_err(|e| AdapterError::AuthFailure(format!("ttwid endpoint unreachable: {e}")))?;
        if !response.is_success() {
            return Err(AdapterError::AuthFailure(format!(
                "ttwid endpoint answered HTTP {}",
                response.status
            )));
        }
        response
            .set_cookies()
            .into_iter()
            .find(|(name, value)| name == "ttwid" && !value.is_empty())
            .map(|(_, value)| value)
            .ok_or_else(|| {
                AdapterError::AuthFailure("ttwid endpoint set no ttwid cookie".to_string())
            })
    }
}

pub fn ms_token() -> String {
    let mut rng = rand::thread_rng();
    (0..MS_TOKEN_LEN)
        .map(|_| MS_TOKEN_CHARS[rng.gen_range(0..MS_TOKEN_CHARS.len())] as char)
        .collect()
}

impl PlatformAdapter for DouyinAdapter {
    fn name(&self) -> &str {
        "douyin"
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
        http: &dyn HttpClient,
        _url: &str,
    ) -> Result<FetchContext, AdapterError> {
        if self.options.signer.is_none() {
            return Err(AdapterError::AuthFailure(
                "detail requests need an a_bogus signature; configure [signer]".to_string(),
            ));
        }
        let ms_token = ms_token();
        let ttwid = self.mint_ttwid(http)?;
        tracing::debug!("minted douyin ttwid cookie");
        Ok(self
            .options
            .context(REFERER)
            .cookie("msToken", ms_token.as_str())
            .cookie("ttwid", ttwid)
            .token("msToken", ms_token)
            .build())
    }

    fn fetch_resource(
        &self,
        http: &dyn HttpClient,
        context: &FetchContext,
        resolution: &Resolution,
    ) -> Result<RawResponse, AdapterError> {
        let ms_token = context
            .token("msToken")
            .ok_or_else(|| AdapterError::AuthFailure("context carries no msToken".to_string()))?;
        let signer = self
            .options
            .signer
            .as_ref()
            .ok_or_else(|| AdapterError::AuthFailure("no signer configured".to_string()))?;

        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("aweme_id", resolution.resource_id.as_str());
        query.extend_pairs(DETAIL_PARAMS.iter().copied());
        query.append_pair("msToken", ms_token);
        let unsigned = query.finish();

        let a_bogus = signer
            .sign(&unsigned)
            .map_err(|e| AdapterError::AuthFailure(format!("signer failed: {e:#}")))?;
        let signed: String = form_urlencoded::Serializer::for_suffix(unsigned.clone(), 0)
            .append_pair("a_bogus", &a_bogus)
            .finish();
        let url = format!("{}?{}", self.detail_endpoint, signed);

        let response = http
            .send(&context.get(&url))
            .map_err(|e| AdapterError::UpstreamError(format!("detail request failed: {e}")))?;
        if !response.is_success() {
            return Err(AdapterError::UpstreamError(format!(
                "detail endpoint answered HTTP {}",
                response.status
            )));
        }
        // A rejected signature or token comes back as 200 with an empty body.
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Err(AdapterError::AuthFailure(
                "detail endpoint returned an empty body (signature or token rejected)".to_string(),
            ));
        }
        Ok(RawResponse::from_http(response, resolution.resource_id.clone()))
    }

    fn extract(&self, raw: &RawResponse) -> Result<MediaDescriptor, AdapterError> {
        self.extractor.extract(raw)
    }
}
