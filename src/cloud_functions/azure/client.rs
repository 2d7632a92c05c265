use super::credential::{AccessToken, TokenCredential, MANAGEMENT_SCOPE};
use super::poller::{self, Deadline, OperationStatus, PollOptions, PollTarget};
use crate::cloud_functions::{HttpRequest, HttpResponse, Transport};
use crate::error::Result;
use chrono::{Duration, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::thread;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Minimal Azure Resource Manager client: authenticated calls plus
/// waiting on long-running operations.
pub struct ArmClient {
    transport: Box<dyn Transport>,
    credential: Box<dyn TokenCredential>,
    subscription_id: String,
    endpoint: String,
    poll: PollOptions,
    token: RefCell<Option<AccessToken>>,
}

impl ArmClient {
    pub fn new(transport: Box<dyn Transport>, credential: Box<dyn TokenCredential>, subscription_id: &str, poll: PollOptions) -> Self {
        Self {
            transport,
            credential,
            subscription_id: subscription_id.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll,
            token: RefCell::new(None),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Cached token, refreshed when it is about to expire
    fn bearer(&self) -> Result<String> {
        let mut cached = self.token.borrow_mut();
        if let Some(token) = cached.as_ref() {
            if !token.expires_within(Duration::minutes(5), Utc::now()) {
                return Ok(token.token.clone());
            }
        }
        let token = self.credential.get_token(MANAGEMENT_SCOPE)?;
        let ret = token.token.clone();
        *cached = Some(token);
        Ok(ret)
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    /// Sends and returns whatever came back, error statuses included
    fn send(&self, method: Method, url: &str, body: Option<serde_json::Value>) -> Result<HttpResponse> {
        debug_with_time!("{} {}", method, url);
        let request = HttpRequest {
            method,
            url: url.to_string(),
            bearer: Some(self.bearer()?),
            body,
            form: None,
        };
        let response = self.transport.send(&request)?;
        debug_with_time!("-> {}", response.status);
        Ok(response)
    }

    fn call(&self, method: Method, url: &str, body: Option<serde_json::Value>) -> Result<HttpResponse> {
        let response = self.send(method, url, body)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(poller::arm_error(&response))
        }
    }

    fn delay(&self, response: &HttpResponse) -> std::time::Duration {
        poller::retry_after(response).unwrap_or(self.poll.interval)
    }

    pub fn get<R: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<R> {
        let response = self.call(Method::GET, &self.url(path, api_version), None)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// PUT the resource, then block until ARM reports the operation done
    /// and return the resource as it now exists
    pub fn create_or_update<B: Serialize, R: DeserializeOwned>(&self, path: &str, api_version: &str, body: &B) -> Result<R> {
        let url = self.url(path, api_version);
        let initial = self.call(Method::PUT, &url, Some(serde_json::to_value(body)?))?;

        if let Some(target) = poller::poll_target(&initial) {
            self.wait(target, &initial, path)?;
            let done = self.call(Method::GET, &url, None)?;
            return Ok(serde_json::from_str(&done.body)?);
        }

        let deadline = Deadline::start(self.poll.timeout);
        let mut current = initial;
        loop {
            match poller::provisioning_state(&current.body)? {
                OperationStatus::Succeeded => return Ok(serde_json::from_str(&current.body)?),
                OperationStatus::InProgress => {
                    deadline.check(path)?;
                    thread::sleep(self.delay(&current));
                    current = self.call(Method::GET, &url, None)?;
                }
                failed => return Err(poller::operation_failed(path, failed, None)),
            }
        }
    }

    /// Returns false when there was nothing to delete
    pub fn delete(&self, path: &str, api_version: &str) -> Result<bool> {
        let response = self.send(Method::DELETE, &self.url(path, api_version), None)?;
        if response.status == 404 {
            return Ok(false);
        }
        if !response.is_success() {
            return Err(poller::arm_error(&response));
        }
        if let Some(target) = poller::poll_target(&response) {
            self.wait(target, &response, path)?;
        }
        Ok(true)
    }

    fn wait(&self, target: PollTarget, initial: &HttpResponse, what: &str) -> Result<()> {
        let deadline = Deadline::start(self.poll.timeout);
        let mut delay = self.delay(initial);
        loop {
            deadline.check(what)?;
            thread::sleep(delay);
            match &target {
                PollTarget::AsyncOperation(url) => {
                    let response = self.call(Method::GET, url, None)?;
                    match poller::parse_operation_status(&response.body)? {
                        (OperationStatus::Succeeded, _) => return Ok(()),
                        (OperationStatus::InProgress, _) => delay = self.delay(&response),
                        (failed, detail) => return Err(poller::operation_failed(what, failed, detail)),
                    }
                }
                PollTarget::Location(url) => {
                    let response = self.call(Method::GET, url, None)?;
                    if response.status != 202 {
                        return Ok(());
                    }
                    delay = self.delay(&response);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_functions::testing::{ScriptedTransport, StaticCredential};
    use crate::error::Error;
    use serde_json::{json, Value};
    use std::time::Duration as StdDuration;

    fn client(transport: &ScriptedTransport) -> ArmClient {
        let poll = PollOptions { interval: StdDuration::from_millis(0), timeout: StdDuration::from_secs(30) };
        ArmClient::new(Box::new(transport.clone()), Box::new(StaticCredential::new("tok")), "sub", poll)
    }

    #[test]
    fn get_parses_body_and_sends_token() {
        let transport = ScriptedTransport::new();
        transport.push(200, &[], r#"{"name":"rg","location":"eastus"}"#);
        let value: Value = client(&transport).get("/subscriptions/sub/resourcegroups/rg", "2021-04-01").unwrap();
        assert_eq!(value["name"], "rg");

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(sent[0].url, "https://management.azure.com/subscriptions/sub/resourcegroups/rg?api-version=2021-04-01");
        assert_eq!(sent[0].bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn error_status_becomes_arm_error() {
        let transport = ScriptedTransport::new();
        transport.push(403, &[], r#"{"error":{"code":"AuthorizationFailed","message":"no access"}}"#);
        let err = client(&transport).get::<Value>("/x", "1").unwrap_err();
        match err {
            Error::Arm { status, code, .. } => {
                assert_eq!(status, 403);
                assert_eq!(code, "AuthorizationFailed");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn put_already_succeeded_needs_no_polling() {
        let transport = ScriptedTransport::new();
        transport.push(200, &[], r#"{"id":"/rg","properties":{"provisioningState":"Succeeded"}}"#);
        let value: Value = client(&transport).create_or_update("/rg", "1", &json!({"location": "eastus"})).unwrap();
        assert_eq!(value["id"], "/rg");
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::PUT);
        assert_eq!(sent[0].body, Some(json!({"location": "eastus"})));
    }

    #[test]
    fn put_follows_async_operation() {
        let transport = ScriptedTransport::new();
        transport.push(201, &[("Azure-AsyncOperation", "https://op/1")], r#"{"properties":{"provisioningState":"Updating"}}"#);
        transport.push(200, &[], r#"{"status":"InProgress"}"#);
        transport.push(200, &[], r#"{"status":"Succeeded"}"#);
        transport.push(200, &[], r#"{"id":"/ip","properties":{"provisioningState":"Succeeded","ipAddress":"1.2.3.4"}}"#);

        let value: Value = client(&transport).create_or_update("/ip", "1", &json!({})).unwrap();
        assert_eq!(value["properties"]["ipAddress"], "1.2.3.4");

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec![
            "https://management.azure.com/ip?api-version=1",
            "https://op/1",
            "https://op/1",
            "https://management.azure.com/ip?api-version=1",
        ]);
    }

    #[test]
    fn failed_operation_carries_detail() {
        let transport = ScriptedTransport::new();
        transport.push(201, &[("Azure-AsyncOperation", "https://op/1")], "{}");
        transport.push(200, &[], r#"{"status":"Failed","error":{"code":"SkuNotAvailable","message":"pick another size"}}"#);

        match client(&transport).create_or_update::<_, Value>("/vm", "1", &json!({})).unwrap_err() {
            Error::OperationFailed { resource, status, code, message } => {
                assert_eq!(resource, "/vm");
                assert_eq!(status, "Failed");
                assert_eq!(code, "SkuNotAvailable");
                assert_eq!(message, "pick another size");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn put_without_headers_polls_provisioning_state() {
        let transport = ScriptedTransport::new();
        transport.push(201, &[], r#"{"properties":{"provisioningState":"Creating"}}"#);
        transport.push(200, &[], r#"{"properties":{"provisioningState":"Updating"}}"#);
        transport.push(200, &[], r#"{"name":"vnet","properties":{"provisioningState":"Succeeded"}}"#);
        let value: Value = client(&transport).create_or_update("/vnet", "1", &json!({})).unwrap();
        assert_eq!(value["name"], "vnet");
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn failed_provisioning_state() {
        let transport = ScriptedTransport::new();
        transport.push(200, &[], r#"{"properties":{"provisioningState":"Failed"}}"#);
        let err = client(&transport).create_or_update::<_, Value>("/nic", "1", &json!({})).unwrap_err();
        assert!(err.to_string().contains("/nic"));
    }

    #[test]
    fn delete_polls_location_until_done() {
        let transport = ScriptedTransport::new();
        transport.push(202, &[("Location", "https://loc/1"), ("Retry-After", "0")], "");
        transport.push(202, &[("Retry-After", "0")], "");
        transport.push(200, &[], "");
        assert!(client(&transport).delete("/rg", "1").unwrap());
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(transport.requests()[0].method, Method::DELETE);
    }

    #[test]
    fn delete_missing_is_not_an_error() {
        let transport = ScriptedTransport::new();
        transport.push(404, &[], r#"{"error":{"code":"ResourceGroupNotFound","message":"gone"}}"#);
        assert!(!client(&transport).delete("/rg", "1").unwrap());
    }

    #[test]
    fn polling_times_out() {
        let transport = ScriptedTransport::new();
        transport.push(201, &[], r#"{"properties":{"provisioningState":"Creating"}}"#);
        let poll = PollOptions { interval: StdDuration::from_millis(0), timeout: StdDuration::from_secs(0) };
        let client = ArmClient::new(Box::new(transport.clone()), Box::new(StaticCredential::new("tok")), "sub", poll);
        match client.create_or_update::<_, Value>("/slow", "1", &json!({})).unwrap_err() {
            Error::Timeout(what) => assert_eq!(what, "/slow"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn token_is_reused() {
        let transport = ScriptedTransport::new();
        transport.push(200, &[], "{}");
        transport.push(200, &[], "{}");
        let credential = StaticCredential::new("tok");
        let calls = credential.calls();
        let client = ArmClient::new(Box::new(transport.clone()), Box::new(credential), "sub", PollOptions::default());
        let _: Value = client.get("/a", "1").unwrap();
        let _: Value = client.get("/b", "1").unwrap();
        assert_eq!(calls.get(), 1);
    }
}
