//! Blocking ARM REST client
//!
//! Implements [`ResourceClient`] over `ureq`: `GET/PUT/PATCH/DELETE
//! {endpoint}{id}?api-version=...` with a bearer token. Asynchronous
//! operations are followed through the `Azure-AsyncOperation` header, the
//! `Location` header, or the resource's own `provisioningState`.

use crate::model::{self, flatten, unflatten};
use declarative::{
    ClientError, ClientResult, Operation, PollStatus, Poller, ResourceClient, Target, WriteOptions,
};
use serde_json::Value;
use std::time::Duration;

/// Poll interval when the API does not send `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Public Azure cloud management endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const USER_AGENT: &str = concat!("armsync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Put,
    Patch,
    Delete,
}

/// What the client keeps from an HTTP response
#[derive(Debug, Clone, Default, PartialEq)]
struct RawResponse {
    status: u16,
    async_operation: Option<String>,
    location: Option<String>,
    retry_after: Option<Duration>,
    body: Option<Value>,
}

impl RawResponse {
    fn interval(&self) -> Duration {
        self.retry_after.unwrap_or(DEFAULT_RETRY_AFTER)
    }
}

/// ARM REST client.
///
/// Cheap to clone; pollers hold their own copy.
#[derive(Clone)]
pub struct RestClient {
    agent: ureq::Agent,
    endpoint: String,
    token: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client for `endpoint` authenticating with a bearer `token`.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn resource_url(&self, target: &Target) -> String {
        format!("{}{}?api-version={}", self.endpoint, target.id, target.api_version)
    }

    fn call(&self, method: Method, url: &str, body: Option<&Value>, if_match: Option<&str>) -> ClientResult<RawResponse> {
        log::debug!("{method:?} {url}");
        let auth = format!("Bearer {}", self.token);
        let empty = Value::Object(serde_json::Map::new());
        let body = body.unwrap_or(&empty);

        let result = match method {
            Method::Get => self
                .agent
                .get(url)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .call(),
            Method::Delete => conditional(self.agent.delete(url), if_match)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .call(),
            Method::Put => conditional(self.agent.put(url), if_match)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .send_json(body),
            Method::Patch => conditional(self.agent.patch(url), if_match)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .send_json(body),
        };

        let mut response = result.map_err(|e| ClientError::Transport(e.to_string()))?;
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let async_operation = header("Azure-AsyncOperation");
        let location = header("Location");
        let retry_after = header("Retry-After").as_deref().and_then(parse_retry_after);
        let status = response.status().as_u16();

        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        log::debug!("{method:?} {url} -> {status}");
        let body = parse_body(status, &text)?;
        check_status(RawResponse {
            status,
            async_operation,
            location,
            retry_after,
            body,
        })
    }

    /// Turn a mutation response into a completed or pending operation
    fn into_operation(&self, raw: RawResponse, target: &Target, reread: bool) -> Operation {
        let interval = raw.interval();
        if let Some(url) = raw.async_operation {
            return Operation::Pending(Box::new(AsyncOperationPoller {
                client: self.clone(),
                target: target.clone(),
                url,
                interval,
                reread,
            }));
        }
        if raw.status == 202 {
            if let Some(url) = raw.location {
                return Operation::Pending(Box::new(LocationPoller {
                    client: self.clone(),
                    target: target.clone(),
                    url,
                    interval,
                    reread,
                }));
            }
            return Operation::Completed(None);
        }
        if let Some(state) = raw.body.as_ref().and_then(model::provisioning_state)
            && !model::is_terminal_state(state)
        {
            return Operation::Pending(Box::new(ProvisioningPoller {
                client: self.clone(),
                target: target.clone(),
                interval,
            }));
        }
        Operation::Completed(raw.body.map(flatten))
    }
}

impl ResourceClient for RestClient {
    fn get(&self, target: &Target) -> ClientResult<Value> {
        let raw = self.call(Method::Get, &self.resource_url(target), None, None)?;
        resource_body(raw)
    }

    fn create_or_update(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        let wire = unflatten(body.clone());
        let raw = self.call(Method::Put, &self.resource_url(target), Some(&wire), options.if_match.as_deref())?;
        Ok(self.into_operation(raw, target, true))
    }

    fn patch(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        let wire = unflatten(body.clone());
        let raw = self.call(Method::Patch, &self.resource_url(target), Some(&wire), options.if_match.as_deref())?;
        Ok(self.into_operation(raw, target, true))
    }

    fn delete(&self, target: &Target, options: &WriteOptions) -> ClientResult<Operation> {
        match self.call(Method::Delete, &self.resource_url(target), None, options.if_match.as_deref()) {
            Ok(raw) => Ok(self.into_operation(raw, target, false)),
            // Already gone
            Err(ClientError::NotFound) => Ok(Operation::Completed(None)),
            Err(e) => Err(e),
        }
    }
}

fn conditional<B>(request: ureq::RequestBuilder<B>, if_match: Option<&str>) -> ureq::RequestBuilder<B> {
    match if_match {
        Some(etag) => request.header("If-Match", etag),
        None => request,
    }
}

/// Map non-success statuses to client errors
fn check_status(raw: RawResponse) -> ClientResult<RawResponse> {
    match raw.status {
        200..=299 => Ok(raw),
        404 => Err(ClientError::NotFound),
        status => {
            let (code, message) = parse_error_body(raw.body.as_ref());
            Err(ClientError::Api {
                status,
                code,
                message: message.unwrap_or_else(|| format!("HTTP {status}")),
            })
        }
    }
}

/// Decode a response body.
///
/// Success responses must carry JSON or nothing. Error bodies that are not
/// JSON (gateway pages) are dropped; the status alone describes the error.
fn parse_body(status: u16, text: &str) -> ClientResult<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(text) {
        Ok(value) => Ok(Some(value)),
        Err(_) if !(200..=299).contains(&status) => Ok(None),
        Err(e) => Err(ClientError::Transport(format!(
            "invalid JSON in HTTP {status} response: {e}"
        ))),
    }
}

/// The flattened resource from a successful read
fn resource_body(raw: RawResponse) -> ClientResult<Value> {
    match raw.body {
        Some(body @ Value::Object(_)) => Ok(flatten(body)),
        Some(other) => Err(ClientError::Transport(format!(
            "expected a resource object in HTTP {} response, got {other}",
            raw.status
        ))),
        None => Err(ClientError::Transport(format!(
            "empty body in HTTP {} response to a resource read",
            raw.status
        ))),
    }
}

/// Extract `(code, message)` from an ARM error body
fn parse_error_body(body: Option<&Value>) -> (Option<String>, Option<String>) {
    let Some(error) = body.and_then(|b| b.get("error")) else {
        return (None, None);
    };
    let text = |key: &str| error.get(key).and_then(Value::as_str).map(str::to_string);
    (text("code"), text("message"))
}

/// `Retry-After` in delta-seconds; HTTP dates are ignored
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Follows an `Azure-AsyncOperation` status resource
struct AsyncOperationPoller {
    client: RestClient,
    target: Target,
    url: String,
    interval: Duration,
    /// Read the resource once the operation succeeds
    reread: bool,
}

impl Poller for AsyncOperationPoller {
    fn poll(&mut self) -> ClientResult<PollStatus> {
        let raw = self.client.call(Method::Get, &self.url, None, None)?;
        self.interval = raw.interval();
        let body = raw.body.unwrap_or(Value::Null);
        let status = body.get("status").and_then(Value::as_str).unwrap_or("InProgress");

        match status.to_ascii_lowercase().as_str() {
            "succeeded" if self.reread => Ok(PollStatus::Succeeded(Some(self.client.get(&self.target)?))),
            "succeeded" => Ok(PollStatus::Succeeded(None)),
            "failed" | "canceled" | "cancelled" => {
                let (code, message) = parse_error_body(Some(&body));
                let message = match (code, message) {
                    (Some(code), Some(message)) => format!("{code}: {message}"),
                    (None, Some(message)) => message,
                    (Some(code), None) => code,
                    (None, None) => format!("operation {status}"),
                };
                Ok(PollStatus::Failed(message))
            }
            _ => Ok(PollStatus::InProgress),
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Follows a `Location` header until it stops answering 202
struct LocationPoller {
    client: RestClient,
    target: Target,
    url: String,
    interval: Duration,
    reread: bool,
}

impl Poller for LocationPoller {
    fn poll(&mut self) -> ClientResult<PollStatus> {
        let raw = self.client.call(Method::Get, &self.url, None, None)?;
        self.interval = raw.interval();
        match (raw.status, raw.body) {
            (202, _) => Ok(PollStatus::InProgress),
            (_, Some(body)) => Ok(PollStatus::Succeeded(Some(flatten(body)))),
            (_, None) if self.reread => Ok(PollStatus::Succeeded(Some(self.client.get(&self.target)?))),
            (_, None) => Ok(PollStatus::Succeeded(None)),
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Re-reads the resource until its provisioning state is terminal
struct ProvisioningPoller {
    client: RestClient,
    target: Target,
    interval: Duration,
}

impl Poller for ProvisioningPoller {
    fn poll(&mut self) -> ClientResult<PollStatus> {
        let document = self.client.get(&self.target)?;
        match model::provisioning_state(&document) {
            Some(state) if state.eq_ignore_ascii_case("succeeded") => Ok(PollStatus::Succeeded(Some(document))),
            Some(state) if model::is_terminal_state(state) => {
                Ok(PollStatus::Failed(format!("provisioning state {state}")))
            }
            None => Ok(PollStatus::Succeeded(Some(document))),
            Some(_) => Ok(PollStatus::InProgress),
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}
