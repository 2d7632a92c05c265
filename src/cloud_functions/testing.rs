// Test doubles for the transport and credential seams.
use super::azure::credential::{AccessToken, TokenCredential};
use super::{HttpRequest, HttpResponse, Transport};
use crate::error::{Error, Result};
use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

pub struct StaticCredential {
    token: String,
    calls: Rc<Cell<usize>>,
}

impl StaticCredential {
    pub fn new(token: &str) -> Self {
        Self { token: token.to_string(), calls: Rc::new(Cell::new(0)) }
    }

    pub fn calls(&self) -> Rc<Cell<usize>> {
        self.calls.clone()
    }
}

impl TokenCredential for StaticCredential {
    fn name(&self) -> &'static str {
        "static"
    }

    fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        self.calls.set(self.calls.get() + 1);
        Ok(AccessToken { token: self.token.clone(), expires_on: Utc::now() + Duration::hours(1) })
    }
}

fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.to_string())).collect(),
        body: body.to_string(),
    }
}

/// Replays canned responses in order and records what was sent
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Rc<RefCell<VecDeque<HttpResponse>>>,
    requests: Rc<RefCell<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: u16, headers: &[(&str, &str)], body: &str) {
        self.responses.borrow_mut().push_back(response(status, headers, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request.clone());
        self.responses.borrow_mut().pop_front()
            .ok_or_else(|| Error::Exec(format!("no scripted response left for {} {}", request.method, request.url)))
    }
}

/// In-memory resource manager: PUT stores, GET reads back, DELETE removes
/// everything below the path. Every write completes synchronously.
#[derive(Clone, Default)]
pub struct FakeArm {
    resources: Rc<RefCell<BTreeMap<String, Value>>>,
    requests: Rc<RefCell<Vec<HttpRequest>>>,
    failing: Rc<RefCell<Option<String>>>,
}

impl FakeArm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any PUT whose path contains `fragment` is rejected with a 400
    pub fn fail_puts_matching(&self, fragment: &str) {
        *self.failing.borrow_mut() = Some(fragment.to_string());
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    /// `(method, path)` of every request, in order
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.requests().into_iter().map(|r| (r.method, path_of(&r.url))).collect()
    }

    pub fn stored(&self, path: &str) -> Option<Value> {
        self.resources.borrow().get(&path.to_ascii_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.resources.borrow().len()
    }

    fn put(&self, path: &str, body: &Value) -> HttpResponse {
        let mut stored = body.clone();
        stored["id"] = json!(path);
        stored["name"] = json!(path.rsplit('/').next().unwrap_or_default());
        if !stored["properties"].is_object() {
            stored["properties"] = json!({});
        }
        stored["properties"]["provisioningState"] = json!("Succeeded");

        if path.contains("/publicIPAddresses/") && stored["properties"]["publicIPAllocationMethod"] == "Static" {
            stored["properties"]["ipAddress"] = json!("20.1.2.3");
        }
        if path.contains("/virtualNetworks/") && !path.contains("/subnets/") {
            let subnets = stored["properties"]["subnets"].as_array().cloned().unwrap_or_default();
            let mut with_ids = Vec::new();
            for mut subnet in subnets {
                let subnet_path = format!("{}/subnets/{}", path, subnet["name"].as_str().unwrap_or_default());
                subnet["id"] = json!(subnet_path);
                subnet["properties"]["provisioningState"] = json!("Succeeded");
                self.resources.borrow_mut().insert(subnet_path.to_ascii_lowercase(), subnet.clone());
                with_ids.push(subnet);
            }
            stored["properties"]["subnets"] = json!(with_ids);
        }
        let existed = self.resources.borrow_mut().insert(path.to_ascii_lowercase(), stored.clone()).is_some();
        response(if existed { 200 } else { 201 }, &[], &stored.to_string())
    }

    fn delete(&self, path: &str) -> HttpResponse {
        let prefix = path.to_ascii_lowercase();
        let mut resources = self.resources.borrow_mut();
        let doomed: Vec<String> = resources.keys().filter(|k| *k == &prefix || k.starts_with(&format!("{}/", prefix))).cloned().collect();
        if doomed.is_empty() {
            return response(404, &[], r#"{"error":{"code":"ResourceNotFound","message":"not found"}}"#);
        }
        for key in doomed {
            resources.remove(&key);
        }
        response(200, &[], "")
    }
}

fn path_of(url: &str) -> String {
    let without_host = match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => url,
    };
    without_host.split('?').next().unwrap_or_default().to_string()
}

impl Transport for FakeArm {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request.clone());
        let path = path_of(&request.url);

        if request.bearer.is_none() {
            return Ok(response(401, &[], r#"{"error":{"code":"AuthenticationFailed","message":"no token"}}"#));
        }
        let response = match request.method {
            Method::PUT => {
                let rejected = self.failing.borrow().as_ref().map(|f| path.contains(f.as_str())).unwrap_or(false);
                if rejected {
                    response(400, &[], r#"{"error":{"code":"InvalidParameter","message":"rejected by test"}}"#)
                } else {
                    self.put(&path, request.body.as_ref().unwrap_or(&Value::Null))
                }
            }
            Method::GET => match self.stored(&path) {
                Some(v) => response(200, &[], &v.to_string()),
                None => response(404, &[], r#"{"error":{"code":"ResourceNotFound","message":"not found"}}"#),
            },
            Method::DELETE => self.delete(&path),
            _ => response(405, &[], ""),
        };
        Ok(response)
    }
}

#[test]
fn path_of_strips_host_and_query() {
    assert_eq!(path_of("https://management.azure.com/subscriptions/s?api-version=1"), "/subscriptions/s");
    assert_eq!(path_of("/a/b"), "/a/b");
}
