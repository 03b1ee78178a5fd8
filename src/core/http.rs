use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};

const APP_USER_AGENT: &str = concat!("archive-access/", env!("CARGO_PKG_VERSION"));

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers
}

pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers())
        .build()
}

pub fn build_blocking_client() -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers())
        .build()
}
