// Credential chain for Azure Resource Manager.
// Service principal from the environment first, then whatever `az login` left behind.
use crate::cloud_functions::{HttpRequest, ReqwestTransport, Transport};
use crate::error::{Error, Result};
use crate::shell_tools;
use reqwest::Method;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_on - margin <= now
    }
}

pub trait TokenCredential {
    /// Short label used in error messages
    fn name(&self) -> &'static str;

    fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// `scope` minus the `/.default` suffix, which is what v1 style endpoints want
fn scope_to_resource(scope: &str) -> String {
    let resource = scope.trim_end_matches("/.default");
    format!("{}/", resource.trim_end_matches('/'))
}

// =========== Service principal ===========

pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    transport: Box<dyn Transport>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl ClientSecretCredential {
    pub fn new(tenant_id: &str, client_id: &str, client_secret: &str, transport: Box<dyn Transport>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            transport,
        }
    }

    /// Built only when tenant, client id and secret are all present
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
        where F: Fn(&str) -> Option<String> {

        let var = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        match (var("AZURE_TENANT_ID"), var("AZURE_CLIENT_ID"), var("AZURE_CLIENT_SECRET")) {
            (Some(tenant), Some(client), Some(secret)) => {
                Ok(Some(Self::new(&tenant, &client, &secret, Box::new(ReqwestTransport::new()?))))
            }
            _ => Ok(None),
        }
    }
}

pub(crate) fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<AccessToken> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| Error::Auth(format!("unexpected token response: {}", e)))?;
    Ok(AccessToken {
        token: parsed.access_token,
        expires_on: now + Duration::seconds(parsed.expires_in as i64),
    })
}

impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "client secret"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let url = format!("{}/{}/oauth2/v2.0/token", AUTHORITY_HOST, self.tenant_id);
        let form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];
        let request = HttpRequest {
            method: Method::POST,
            url,
            bearer: None,
            body: None,
            form: Some(form.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
        };
        let response = self.transport.send(&request)?;
        if !response.is_success() {
            return Err(Error::Auth(format!("token endpoint returned {}: {}", response.status, response.body.trim())));
        }
        parse_token_response(&response.body, Utc::now())
    }
}

// ================ Azure CLI ==============

pub struct AzureCliCredential {
    binary: String,
    shell: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    /// Only present in newer CLI versions, epoch seconds
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl AzureCliCredential {
    pub fn new(binary: &str, shell: &str) -> Self {
        Self {
            binary: binary.to_string(),
            shell: shell.to_string(),
        }
    }
}

pub(crate) fn parse_cli_token(stdout: &str) -> Result<AccessToken> {
    let parsed: CliToken = serde_json::from_str(stdout.trim())
        .map_err(|e| Error::Auth(format!("could not parse az output: {}", e)))?;

    let expires_on = match (parsed.expires_on_epoch, parsed.expires_on) {
        (Some(epoch), _) => Utc.timestamp_opt(epoch, 0).single()
            .ok_or_else(|| Error::Auth(format!("invalid expires_on {}", epoch)))?,
        (None, Some(local)) => {
            // Older CLIs print local wall-clock time without an offset
            let naive = NaiveDateTime::parse_from_str(&local, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| Error::Auth(format!("invalid expiresOn '{}': {}", local, e)))?;
            Local.from_local_datetime(&naive).earliest()
                .ok_or_else(|| Error::Auth(format!("expiresOn '{}' does not exist in local time", local)))?
                .with_timezone(&Utc)
        }
        (None, None) => return Err(Error::Auth("az output has no expiry".to_string())),
    };
    Ok(AccessToken { token: parsed.access_token, expires_on })
}

impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure cli"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        if !shell_tools::check_command_exist(&self.binary) {
            return Err(Error::Auth(format!("'{}' is not installed", self.binary)));
        }
        let command = format!("{} account get-access-token --resource {} --output json", self.binary, scope_to_resource(scope));
        let result = shell_tools::run_command(&command, &self.shell);
        if result.not_found() {
            return Err(Error::Exec(result.describe_failure()));
        }
        if result.non_zero_exit() {
            return Err(Error::Auth(format!("{} (did you run \"az login\"?)", result.describe_failure())));
        }
        parse_cli_token(result.stdout())
    }
}

// ================= Chain =================

pub struct DefaultCredential {
    chain: Vec<Box<dyn TokenCredential>>,
}

impl DefaultCredential {
    pub fn new(chain: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { chain }
    }

    pub fn from_lookup<F>(lookup: F, cli_binary: &str, shell: &str) -> Result<Self>
        where F: Fn(&str) -> Option<String> {

        let mut chain: Vec<Box<dyn TokenCredential>> = Vec::new();
        if let Some(sp) = ClientSecretCredential::from_lookup(lookup)? {
            chain.push(Box::new(sp));
        }
        chain.push(Box::new(AzureCliCredential::new(cli_binary, shell)));
        Ok(Self::new(chain))
    }
}

impl TokenCredential for DefaultCredential {
    fn name(&self) -> &'static str {
        "default chain"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut failures = Vec::with_capacity(self.chain.len());
        for credential in &self.chain {
            match credential.get_token(scope) {
                Ok(token) => {
                    debug_with_time!("Authenticated with {} credential", credential.name());
                    return Ok(token);
                }
                Err(e) => failures.push(format!("{}: {}", credential.name(), e)),
            }
        }
        Err(Error::Auth(format!("no credential could get a token ({})", failures.join("; "))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_functions::testing::{ScriptedTransport, StaticCredential};

    struct Failing;

    impl TokenCredential for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn get_token(&self, _scope: &str) -> Result<AccessToken> {
            Err(Error::Auth("nope".to_string()))
        }
    }

    #[test]
    fn resource_from_scope() {
        assert_eq!(scope_to_resource(MANAGEMENT_SCOPE), "https://management.azure.com/");
    }

    #[test]
    fn token_response_expiry() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = parse_token_response(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"abc"}"#, now).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expires_on.timestamp(), 1_700_003_599);
    }

    #[test]
    fn bad_token_response_is_auth_error() {
        match parse_token_response(r#"{"error":"invalid_client"}"#, Utc::now()) {
            Err(Error::Auth(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cli_token_prefers_epoch() {
        let out = r#"{"accessToken":"tok","expiresOn":"2023-11-14 22:13:20.000000","expires_on":1700000000,"tokenType":"Bearer"}"#;
        let token = parse_cli_token(out).unwrap();
        assert_eq!(token.token, "tok");
        assert_eq!(token.expires_on.timestamp(), 1_700_000_000);
    }

    #[test]
    fn cli_token_local_time() {
        let out = r#"{"accessToken":"tok","expiresOn":"2030-01-02 03:04:05.123456"}"#;
        let token = parse_cli_token(out).unwrap();
        let local = token.expires_on.with_timezone(&Local);
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2030-01-02 03:04:05");
    }

    #[test]
    fn cli_token_without_expiry() {
        assert!(parse_cli_token(r#"{"accessToken":"tok"}"#).is_err());
    }

    #[test]
    fn expiry_margin() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let token = AccessToken { token: "t".to_string(), expires_on: Utc.timestamp_opt(1_200, 0).unwrap() };
        assert!(token.expires_within(Duration::seconds(300), now));
        assert!(!token.expires_within(Duration::seconds(100), now));
    }

    #[test]
    fn service_principal_needs_all_three() {
        let partial = |k: &str| match k {
            "AZURE_TENANT_ID" => Some("t".to_string()),
            "AZURE_CLIENT_ID" => Some("c".to_string()),
            _ => None,
        };
        assert!(ClientSecretCredential::from_lookup(partial).unwrap().is_none());

        let full = |k: &str| Some(format!("{}-value", k));
        assert!(ClientSecretCredential::from_lookup(full).unwrap().is_some());
    }

    #[test]
    fn client_secret_posts_form_to_tenant() {
        let transport = ScriptedTransport::new();
        transport.push(200, &[], r#"{"token_type":"Bearer","expires_in":3600,"access_token":"sp-token"}"#);
        let credential = ClientSecretCredential::new("my-tenant", "my-client", "s3cret", Box::new(transport.clone()));

        let token = credential.get_token(MANAGEMENT_SCOPE).unwrap();
        assert_eq!(token.token, "sp-token");
        assert!(token.expires_on > Utc::now());

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].url, "https://login.microsoftonline.com/my-tenant/oauth2/v2.0/token");
        assert_eq!(sent[0].bearer, None);
        assert_eq!(sent[0].body, None);
        let form = sent[0].form.clone().unwrap();
        let field = |k: &str| form.iter().find(|(name, _)| name == k).map(|(_, v)| v.clone());
        assert_eq!(field("grant_type").as_deref(), Some("client_credentials"));
        assert_eq!(field("client_id").as_deref(), Some("my-client"));
        assert_eq!(field("client_secret").as_deref(), Some("s3cret"));
        assert_eq!(field("scope").as_deref(), Some(MANAGEMENT_SCOPE));
    }

    #[test]
    fn client_secret_rejected_is_auth_error() {
        let transport = ScriptedTransport::new();
        transport.push(401, &[], r#"{"error":"invalid_client","error_description":"bad secret"}"#);
        let credential = ClientSecretCredential::new("t", "c", "wrong", Box::new(transport));

        match credential.get_token(MANAGEMENT_SCOPE) {
            Err(Error::Auth(msg)) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("invalid_client"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn chain_falls_through_and_reports() {
        let chain = DefaultCredential::new(vec![Box::new(Failing), Box::new(StaticCredential::new("good"))]);
        assert_eq!(chain.get_token(MANAGEMENT_SCOPE).unwrap().token, "good");

        let chain = DefaultCredential::new(vec![Box::new(Failing)]);
        let err = chain.get_token(MANAGEMENT_SCOPE).unwrap_err().to_string();
        assert!(err.contains("failing: authentication: nope"));
    }
}
