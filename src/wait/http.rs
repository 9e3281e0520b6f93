use super::{Deadline, HTTP_RETRY_DELAY};
use crate::domain::{HttpAttempt, HttpMethod, HttpWait};
use crate::error::{HookError, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Block until the HTTP condition described by `wait` holds.
///
/// Returns the body of the last response. Without a continuation the wait
/// ends on the first 2xx response; with one, the continuation alone decides.
pub fn http(wait: &HttpWait) -> Result<String> {
    let client = Client::builder()
        .build()
        .map_err(|e| HookError::RequestFailed {
            target: wait.url.clone(),
            reason: e.to_string(),
        })?;

    let target = format!("{} {}", wait.method, wait.url);
    info!("Waiting for {target} (timeout {})", wait.timeout);

    let deadline = Deadline::new(wait.timeout);
    let mut count = 0u32;

    loop {
        let attempt = request(&client, wait, &deadline);
        debug!(
            "{target} attempt {count}: status {:?} error {:?}",
            attempt.status, attempt.error
        );

        let delay = match &wait.continuation {
            Some(continuation) => continuation(&attempt, count),
            None if attempt.is_success() => None,
            None => Some(HTTP_RETRY_DELAY),
        };
        count = count.saturating_add(1);

        match delay {
            None => return Ok(attempt.body),
            Some(d) if d.is_zero() => return Ok(attempt.body),
            Some(d) => {
                if deadline.expired() {
                    return Err(expired(&target, wait, attempt));
                }
                thread::sleep(deadline.cap(d));
                if deadline.expired() {
                    return Err(expired(&target, wait, attempt));
                }
            }
        }
    }
}

fn expired(target: &str, wait: &HttpWait, last: HttpAttempt) -> HookError {
    match last.error {
        Some(reason) => HookError::RequestFailed {
            target: target.to_string(),
            reason,
        },
        None => HookError::WaitTimeout {
            target: target.to_string(),
            timeout: wait.timeout,
        },
    }
}

fn request(client: &Client, wait: &HttpWait, deadline: &Deadline) -> HttpAttempt {
    let builder = match wait.method {
        HttpMethod::Get => client.get(&wait.url),
        HttpMethod::Put => client.put(&wait.url),
        HttpMethod::Post => client.post(&wait.url),
        HttpMethod::Delete => client.delete(&wait.url),
    };

    let mut builder = builder
        .timeout(deadline.cap(REQUEST_TIMEOUT).max(Duration::from_millis(1)))
        .header(CONTENT_TYPE, wait.content_type.as_str());
    if let Some(body) = &wait.body {
        builder = builder.body(body.clone());
    }

    match builder.send() {
        Ok(response) => {
            let status = response.status().as_u16();
            match response.text() {
                Ok(body) => HttpAttempt {
                    status: Some(status),
                    body,
                    error: None,
                },
                Err(e) => HttpAttempt {
                    status: Some(status),
                    body: String::new(),
                    error: Some(e.to_string()),
                },
            }
        }
        Err(e) => HttpAttempt {
            status: None,
            body: String::new(),
            error: Some(e.to_string()),
        },
    }
}
