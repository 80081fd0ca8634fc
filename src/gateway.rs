//! Sole component issuing outbound calls to the databotics backend. Injects
//! the bearer credential, decodes responses, normalizes failures, and owns
//! the one cross-cutting rule of the client: a 401 on any authenticated call
//! clears the credential store and fires the sign-out hook before the caller
//! sees the error. Login/register are exempt since there is no credential to
//! clear at that point.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use tracing::warn;

use crate::api::{
    AnalyzeRequest, AnalyzeResponse, AuthResponse, CleanOptions, GenerateSqlRequest,
    GenerateSqlResponse, ProfileResponse, QueryResponse, UploadResponse, ValidateResponse,
};
use crate::credentials::CredentialStore;
use crate::error::{ClientError, ClientResult};

type SignoutHook = Arc<dyn Fn() + Send + Sync>;

pub struct Gateway {
    base: Url,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    on_signout: RwLock<Option<SignoutHook>>,
}

impl Gateway {
    pub fn new(base: &str, credentials: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        use anyhow::Context;
        let base = Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client, credentials, on_signout: RwLock::new(None) })
    }

    /// Navigation side effect for forced sign-outs. The hook runs in
    /// addition to whatever error handling the interrupted caller does.
    pub fn set_signout_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_signout.write() = Some(Arc::new(hook));
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base.join(path).map_err(|e| ClientError::parse(e.to_string()))
    }

    fn file_form(bytes: Vec<u8>, filename: &str) -> Form {
        Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()))
    }

    /// Attach the credential (when present) and apply the unauthorized
    /// interceptor before any decoding.
    async fn send_authed(&self, rb: reqwest::RequestBuilder) -> ClientResult<reqwest::Response> {
        let rb = match self.credentials.get() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        };
        let resp = rb.send().await?;
        self.intercept(resp).await
    }

    async fn intercept(&self, resp: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("backend rejected credential; forcing sign-out");
            self.credentials.clear();
            let hook = self.on_signout.read().clone();
            if let Some(hook) = hook {
                hook();
            }
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::request(status.as_u16(), body));
        }
        Ok(resp)
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<()> {
        let resp = self
            .client
            .post(self.endpoint("/auth/login")?)
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::auth("Invalid username or password"));
        }
        let auth: AuthResponse = resp.json().await?;
        self.credentials.set(&auth.access_token);
        Ok(())
    }

    pub async fn register(&self, username: &str, password: &str) -> ClientResult<()> {
        let resp = self
            .client
            .post(self.endpoint("/auth/register")?)
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await?;
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() { "Registration failed".to_string() } else { body };
            return Err(ClientError::auth(message));
        }
        let auth: AuthResponse = resp.json().await?;
        self.credentials.set(&auth.access_token);
        Ok(())
    }

    pub async fn upload(&self, bytes: Vec<u8>, filename: &str) -> ClientResult<UploadResponse> {
        let rb = self
            .client
            .post(self.endpoint("/upload")?)
            .multipart(Self::file_form(bytes, filename));
        let resp = self.send_authed(rb).await?;
        Ok(resp.json().await?)
    }

    pub async fn profile_by_session(&self, session_id: &str) -> ClientResult<ProfileResponse> {
        let rb = self.client.post(self.endpoint(&format!("/profile/{}", session_id))?);
        let resp = self.send_authed(rb).await?;
        Ok(resp.json().await?)
    }

    /// Alternate profiling path operating directly on the raw bytes, no
    /// session involved.
    pub async fn profile_by_file(&self, bytes: Vec<u8>, filename: &str) -> ClientResult<ProfileResponse> {
        let rb = self
            .client
            .post(self.endpoint("/profile")?)
            .multipart(Self::file_form(bytes, filename));
        let resp = self.send_authed(rb).await?;
        Ok(resp.json().await?)
    }

    pub async fn validate(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        rules_path: Option<&str>,
    ) -> ClientResult<ValidateResponse> {
        let mut rb = self
            .client
            .post(self.endpoint("/validate")?)
            .multipart(Self::file_form(bytes, filename));
        if let Some(rules) = rules_path {
            rb = rb.query(&[("rules_path", rules)]);
        }
        let resp = self.send_authed(rb).await?;
        Ok(resp.json().await?)
    }

    /// SQL travels as a query parameter per the wire contract; reqwest
    /// percent-encodes it. Long statements may hit server URL limits.
    pub async fn query(&self, bytes: Vec<u8>, filename: &str, sql: &str) -> ClientResult<QueryResponse> {
        let rb = self
            .client
            .post(self.endpoint("/query")?)
            .query(&[("sql", sql)])
            .multipart(Self::file_form(bytes, filename));
        let resp = self.send_authed(rb).await?;
        Ok(resp.json().await?)
    }

    /// Returns the transformed file verbatim; the response is declared
    /// binary and is never decoded.
    pub async fn clean(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        options: &CleanOptions,
    ) -> ClientResult<Vec<u8>> {
        let mut params: Vec<(&str, String)> = vec![
            ("trim_strings", options.trim_strings.to_string()),
            ("drop_duplicates", options.drop_duplicates.to_string()),
        ];
        if let Some(case) = &options.normalize_case {
            params.push(("normalize_case", case.clone()));
        }
        let rb = self
            .client
            .post(self.endpoint("/clean")?)
            .query(&params)
            .multipart(Self::file_form(bytes, filename));
        let resp = self.send_authed(rb).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn analyze(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        request: &AnalyzeRequest,
    ) -> ClientResult<AnalyzeResponse> {
        let mut params: Vec<(&str, String)> = vec![
            ("timestamp_col", request.timestamp_col.clone()),
            ("metric_col", request.metric_col.clone()),
        ];
        if let Some(method) = &request.method {
            params.push(("method", method.clone()));
        }
        if !request.dimension_cols.is_empty() {
            params.push(("dimension_cols", request.dimension_cols.join(",")));
        }
        let rb = self
            .client
            .post(self.endpoint("/analyze")?)
            .query(&params)
            .multipart(Self::file_form(bytes, filename));
        let resp = self.send_authed(rb).await?;
        Ok(resp.json().await?)
    }

    pub async fn generate_sql(&self, request: &GenerateSqlRequest) -> ClientResult<GenerateSqlResponse> {
        let rb = self.client.post(self.endpoint("/generate_sql")?).json(request);
        let resp = self.send_authed(rb).await?;
        Ok(resp.json().await?)
    }
}
