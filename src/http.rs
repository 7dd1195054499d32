// src/http.rs

//! Blocking HTTP client shared by catalog sync and artifact downloads
//!
//! Connection failures and interrupted bodies are retried with a linear
//! back-off. A non-success status is final.

use crate::error::{Error, Result};
use reqwest::blocking::{Client, Response};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for HTTP requests (30 seconds)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a failed request
pub const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds, multiplied by the attempt number
pub const RETRY_DELAY_MS: u64 = 1000;

/// Result of one request attempt
enum Attempt {
    /// Transient failure
    Retry(String),
    /// Permanent failure
    Fail(Error),
}

type AttemptResult<T> = std::result::Result<T, Attempt>;

/// HTTP client with retry support
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Override the attempt count and base back-off
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// GET `url` and return the body as text
    pub fn get_text(&self, url: &str) -> Result<String> {
        retry(url, self.max_retries, self.retry_delay, || {
            self.send(url)?
                .text()
                .map_err(|e| Attempt::Retry(format!("Failed to read body: {}", e)))
        })
    }

    /// GET `url` into the file `dest`
    ///
    /// `dest` is recreated on every attempt and deleted when an attempt
    /// fails part-way.
    pub fn download(&self, url: &str, dest: &Path) -> Result<()> {
        retry(url, self.max_retries, self.retry_delay, || {
            let mut response = self.send(url)?;
            let mut file = File::create(dest).map_err(|e| {
                Attempt::Fail(Error::Transport(format!(
                    "Failed to create {}: {}",
                    dest.display(),
                    e
                )))
            })?;

            io::copy(&mut response, &mut file).map_err(|e| {
                let _ = fs::remove_file(dest);
                Attempt::Retry(e.to_string())
            })?;
            debug!("Downloaded {} to {}", url, dest.display());
            Ok(())
        })
    }

    fn send(&self, url: &str) -> AttemptResult<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Attempt::Retry(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Attempt::Fail(Error::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                url
            ))));
        }
        Ok(response)
    }
}

fn retry<T>(
    url: &str,
    max_retries: u32,
    delay: Duration,
    mut op: impl FnMut() -> AttemptResult<T>,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(Attempt::Fail(e)) => return Err(e),
            Err(Attempt::Retry(reason)) => {
                if attempt >= max_retries {
                    return Err(Error::Transport(format!(
                        "Failed to fetch {} after {} attempts: {}",
                        url, attempt, reason
                    )));
                }
                warn!("Attempt {} for {} failed: {}, retrying...", attempt, url, reason);
                thread::sleep(delay * attempt);
            }
        }
    }
}
