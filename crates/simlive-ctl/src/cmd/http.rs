//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Decode a daemon response, turning `{"error","message"}` bodies into
/// errors.
async fn read_json<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => bail!("{} ({}): {}", body.error, status.as_u16(), body.message),
            Err(_) => bail!("request failed ({}): {}", status.as_u16(), text),
        }
    }
    resp.json::<T>().await.context("failed to parse response")
}

async fn send(req: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
    req.send()
        .await
        .with_context(|| format!("failed to connect to simlived at {} — is it running?", url))
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    read_json(send(reqwest::Client::new().get(url), url).await?).await
}

pub async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    read_json(send(reqwest::Client::new().post(url), url).await?).await
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    read_json(send(reqwest::Client::new().post(url).json(body), url).await?).await
}

pub async fn post_multipart<R>(url: &str, form: reqwest::multipart::Form) -> Result<R>
where
    R: for<'de> Deserialize<'de>,
{
    read_json(send(reqwest::Client::new().post(url).multipart(form), url).await?).await
}

pub async fn delete_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    read_json(send(reqwest::Client::new().delete(url), url).await?).await
}
