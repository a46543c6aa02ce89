use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{RemoteError, RemoteFailure};
use crate::settings::RemoteSettings;

pub(crate) fn build_client(settings: &RemoteSettings) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|err| RemoteError::new(RemoteFailure::Network, err.to_string()))
}

/// Joins `path` onto a base URL and appends query pairs.
pub(crate) fn endpoint(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, RemoteError> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    let mut url = Url::parse(&joined)
        .map_err(|err| RemoteError::new(RemoteFailure::InvalidUrl, err.to_string()))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

pub(crate) fn json_request(
    builder: reqwest::RequestBuilder,
    body: &impl serde::Serialize,
) -> Result<reqwest::RequestBuilder, RemoteError> {
    let payload = serde_json::to_vec(body)
        .map_err(|err| RemoteError::new(RemoteFailure::Decode, err.to_string()))?;
    Ok(builder.header(CONTENT_TYPE, "application/json").body(payload))
}

/// Sends the request and decodes a JSON body from a 2xx response.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, RemoteError> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::new(
            RemoteFailure::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| RemoteError::new(RemoteFailure::Decode, err.to_string()))
}

/// Sends the request and only checks for a 2xx status.
pub(crate) async fn send_expect_success(request: reqwest::RequestBuilder) -> Result<(), RemoteError> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(RemoteError::new(
            RemoteFailure::HttpStatus(status.as_u16()),
            status.to_string(),
        ))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::new(RemoteFailure::Timeout, err.to_string());
    }
    RemoteError::new(RemoteFailure::Network, err.to_string())
}
