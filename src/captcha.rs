use std::borrow::Cow;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;

pub const BASE_URL: &str = "https://check1.fsrar.ru/";
const SUBMIT_PATH: &str = "MobileApi/transportwb";

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to retrieve website: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("captcha data not found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Hidden form values and image of the portal's captcha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    pub captcha_id: String,
    pub instance_id: String,
    pub image_url: Url,
}

#[derive(Debug, Clone)]
pub struct WaybillQuery {
    /// Waybill (TTN) number.
    pub ttn: String,
    /// FSRAR id of the receiving company.
    pub receiver: String,
}

#[derive(Serialize)]
struct WaybillForm<'a> {
    id: &'a str,
    owner_id: &'a str,
    owner_receiver: &'a str,
    #[serde(rename = "CaptchaId")]
    captcha_id: &'a str,
    #[serde(rename = "InstanceId")]
    instance_id: &'a str,
    #[serde(rename = "UserInput")]
    user_input: &'a str,
}

lazy_static! {
    static ref INPUT_SELECTOR: Selector = Selector::parse("input").unwrap();
    static ref IMG_SELECTOR: Selector = Selector::parse("img").unwrap();
    static ref CAPTCHA_REGEX: Regex = Regex::new("(?i)captcha").unwrap();
    static ref INSTANCE_REGEX: Regex = Regex::new("(?i)instance").unwrap();
}

type AttrTest<'t> = (&'static str, &'t dyn Fn(&str) -> bool);

/// The portal keeps changing its markup, so elements are looked up through
/// increasingly loose attribute matches.
fn find_by_attr<'a>(elements: &[ElementRef<'a>], candidates: &[AttrTest]) -> Option<ElementRef<'a>> {
    candidates.iter().find_map(|(attr, test)| {
        elements
            .iter()
            .copied()
            .find(|e| e.value().attr(attr).is_some_and(|v| test(v)))
    })
}

fn find_input_value(
    inputs: &[ElementRef],
    exact: &str,
    loose: &Regex,
) -> Result<String, Error> {
    let is_exact = |v: &str| v == exact;
    let is_loose = |v: &str| loose.is_match(v);
    let candidates: [AttrTest; 4] = [
        ("name", &is_exact),
        ("id", &is_exact),
        ("name", &is_loose),
        ("id", &is_loose),
    ];
    let input = find_by_attr(inputs, &candidates)
        .ok_or_else(|| Error::NotFound(format!("input {exact}").into()))?;

    input
        .value()
        .attr("value")
        .map(str::to_owned)
        .ok_or_else(|| Error::NotFound(format!("value of {exact}").into()))
}

pub fn parse_challenge(html: &str, base: &Url) -> Result<CaptchaChallenge, Error> {
    let document = Html::parse_document(html);

    for error in &document.errors {
        log::debug!("Parser error: {error}");
    }

    let inputs: Vec<_> = document.select(&INPUT_SELECTOR).collect();
    let captcha_id = find_input_value(&inputs, "CaptchaId", &CAPTCHA_REGEX)?;
    let instance_id = find_input_value(&inputs, "InstanceId", &INSTANCE_REGEX)?;

    let images: Vec<_> = document.select(&IMG_SELECTOR).collect();
    let is_captcha = |v: &str| CAPTCHA_REGEX.is_match(v);
    let candidates: [AttrTest; 2] = [("id", &is_captcha), ("class", &is_captcha)];
    let src = find_by_attr(&images, &candidates)
        .ok_or(Error::NotFound("captcha image".into()))?
        .value()
        .attr("src")
        .ok_or(Error::NotFound("captcha image source".into()))?;
    let image_url = base
        .join(src)
        .map_err(|_| Error::NotFound("valid captcha image source".into()))?;

    Ok(CaptchaChallenge {
        captcha_id,
        instance_id,
        image_url,
    })
}

/// Client with the cookie jar the portal ties the captcha to.
///
/// The portal's certificate chain is not trusted by default stores.
pub fn client() -> Result<reqwest::Client, Error> {
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(15))
        .build()?;
    Ok(client)
}

pub async fn fetch_challenge(client: &reqwest::Client, base: &Url) -> Result<CaptchaChallenge, Error> {
    log::info!("Get captcha from {base}");
    let html = client
        .get(base.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let challenge = parse_challenge(&html, base)?;
    log::info!(
        "Got CaptchaId={} InstanceId={}",
        challenge.captcha_id,
        challenge.instance_id
    );
    Ok(challenge)
}

pub async fn fetch_image(
    client: &reqwest::Client,
    challenge: &CaptchaChallenge,
) -> Result<Vec<u8>, Error> {
    log::debug!("Fetch captcha image {}", challenge.image_url);
    let bytes = client
        .get(challenge.image_url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(bytes.to_vec())
}

pub async fn submit(
    client: &reqwest::Client,
    base: &Url,
    challenge: &CaptchaChallenge,
    query: &WaybillQuery,
    user_input: &str,
) -> Result<serde_json::Value, Error> {
    let url = base
        .join(SUBMIT_PATH)
        .map_err(|e| Error::InvalidResponse(format!("bad base url {base}: {e}")))?;
    let form = WaybillForm {
        id: &query.ttn,
        owner_id: "",
        owner_receiver: &query.receiver,
        captcha_id: &challenge.captcha_id,
        instance_id: &challenge.instance_id,
        user_input,
    };

    log::info!("Check waybill {} for receiver {}", query.ttn, query.receiver);
    let response = client
        .post(url)
        .form(&form)
        .header("X-Requested-With", "XMLHttpRequest")
        .header(USER_AGENT, "Mozilla/5.0")
        .header(REFERER, base.as_str())
        .send()
        .await?
        .error_for_status()?;
    log::debug!("Response status={}", response.status());

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        log::warn!("Response is not JSON: {e}");
        Error::InvalidResponse(text)
    })
}
