//! Shared HTTP client construction policy for sources and document fetches.
//!
//! Every client built here refuses to follow redirects: SDS vendors answer
//! unauthenticated or throttled requests with a redirect to a login or
//! captcha page, so a redirect is reported to the caller as a plain 3xx
//! status and treated as failure.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Proxy, Response, StatusCode};
use tracing::{debug, warn};

use super::AdapterError;

/// Browser User-Agent sent with every request. Several vendors reject
/// requests that do not look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Builds a no-redirect client for `source_name`.
///
/// `cookie_store` enables a per-client cookie jar for sources whose lookup
/// spans several requests in one session.
///
/// # Errors
///
/// Returns [`AdapterError::Client`] when client construction fails.
pub fn build_http_client(
    source_name: &str,
    timeout: Duration,
    cookie_store: bool,
) -> Result<Client, AdapterError> {
    match try_build_client(timeout, cookie_store, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; env-proxy fallback keeps constructors panic-free.
            warn!(
                source = source_name,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(timeout, cookie_store, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(AdapterError::client(
                    source_name,
                    "client construction panicked while loading proxy settings",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(AdapterError::client(source_name, error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => {
            Err(AdapterError::client(source_name, error.to_string()))
        }
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    timeout: Duration,
    cookie_store: bool,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(timeout, cookie_store);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(timeout: Duration, cookie_store: bool) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .redirect(Policy::none())
        .user_agent(BROWSER_USER_AGENT)
        .cookie_store(cookie_store)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = first_env_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = first_env_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn first_env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Sends a lookup request and returns the response only when it is a plain
/// `200 OK`.
///
/// Redirects and error statuses mean "this source has nothing for us" and
/// come back as `Ok(None)`; only transport faults are errors.
///
/// # Errors
///
/// Returns [`AdapterError::Transport`] when the request cannot be sent.
pub async fn send_lookup(
    source_name: &str,
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<Option<Response>, AdapterError> {
    let response = request
        .send()
        .await
        .map_err(|e| AdapterError::transport(source_name, url, e))?;

    let status = response.status();
    if status == StatusCode::OK {
        return Ok(Some(response));
    }
    if status.is_redirection() {
        debug!(source = source_name, %url, status = status.as_u16(), "lookup redirected; treating as miss");
    } else {
        debug!(source = source_name, %url, status = status.as_u16(), "lookup returned non-200 status");
    }
    Ok(None)
}

/// Like [`send_lookup`] but reads the body as text.
///
/// # Errors
///
/// Returns [`AdapterError::Transport`] when sending or reading fails.
pub async fn fetch_lookup_text(
    source_name: &str,
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<Option<String>, AdapterError> {
    let Some(response) = send_lookup(source_name, request, url).await? else {
        return Ok(None);
    };
    response
        .text()
        .await
        .map(Some)
        .map_err(|e| AdapterError::transport(source_name, url, e))
}
