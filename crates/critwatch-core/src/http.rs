//! Blocking HTTP plumbing shared by the tracker, board and health clients.

use crate::error::{CritwatchError, Result};
use reqwest::blocking::{Client, Response};
use std::time::Duration;

/// Build a client whose every request is bounded by `timeout`.
pub(crate) fn client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("critwatch/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Turn a non-2xx response into `CritwatchError::Api`.
pub(crate) fn ensure_success(service: &'static str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(CritwatchError::Api {
        service,
        status: status.as_u16(),
        url: resp.url().to_string(),
    })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
