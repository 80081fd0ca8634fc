//! Screen/command orchestration: ties the gateway, the workflow state and
//! the route guard together. Each command is the terminal analog of one
//! screen in the web client; it catches its own errors and never takes the
//! REPL down with it. A forced sign-out (401 anywhere) lands the user on the
//! login screen regardless of what command was running.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::api::{
    AnalyzeRequest, AnalyzeResponse, CleanOptions, GenerateSqlRequest, GenerateSqlResponse,
    ProfileResponse, QueryResponse, ValidateResponse,
};
use crate::credentials::CredentialStore;
use crate::error::{ClientError, ClientResult};
use crate::gateway::Gateway;
use crate::routes::{self, Route, RouteDecision};
use crate::state::{FileHandle, WorkflowState};

pub struct Workbench {
    gateway: Arc<Gateway>,
    state: Arc<WorkflowState>,
    credentials: Arc<dyn CredentialStore>,
    current: Arc<RwLock<Option<Route>>>,
}

impl Workbench {
    pub fn new(
        gateway: Arc<Gateway>,
        state: Arc<WorkflowState>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let current: Arc<RwLock<Option<Route>>> = Arc::new(RwLock::new(None));
        let nav = current.clone();
        // The gateway has already cleared the credential when this fires;
        // the guard would redirect anywhere protected, so go straight to
        // the login screen.
        gateway.set_signout_hook(move || {
            *nav.write() = Some(Route::Login);
        });
        Self { gateway, state, credentials, current }
    }

    /// Run hydration, then take the first navigation decision. Nothing
    /// renders before this completes.
    pub fn start(&self) -> Option<Route> {
        self.state.hydrate();
        self.navigate(routes::LANDING)
    }

    /// Apply the guard to a navigation request, following redirects until a
    /// screen is allowed. Returns None only while hydration is pending.
    pub fn navigate(&self, target: Route) -> Option<Route> {
        let mut route = target;
        loop {
            match routes::decide(route, self.credentials.is_authenticated(), self.state.is_ready()) {
                RouteDecision::Defer => return *self.current.read(),
                RouteDecision::Allow => {
                    *self.current.write() = Some(route);
                    return Some(route);
                }
                RouteDecision::RedirectLanding => route = routes::LANDING,
                RouteDecision::RedirectLogin => route = Route::Login,
            }
        }
    }

    pub fn current_route(&self) -> Option<Route> {
        *self.current.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_authenticated()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Route> {
        self.gateway.login(username, password).await?;
        info!("logged in as {}", username);
        Ok(self.navigate(routes::LANDING).unwrap_or(Route::Login))
    }

    pub async fn register(&self, username: &str, password: &str) -> ClientResult<Route> {
        self.gateway.register(username, password).await?;
        info!("registered {}", username);
        Ok(self.navigate(routes::LANDING).unwrap_or(Route::Login))
    }

    pub fn logout(&self) -> Option<Route> {
        self.credentials.clear();
        self.navigate(Route::Login)
    }

    /// The upload flow: stash the file handle (invalidating anything scoped
    /// to the previous file), establish a server session, then fetch the
    /// session-scoped profile. Results that resolve after another upload
    /// superseded this one are dropped.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> ClientResult<Route> {
        self.state.set_uploaded_file(Some(FileHandle {
            filename: filename.to_string(),
            bytes: bytes.clone(),
        }));
        let generation = self.state.generation();

        let session = self.gateway.upload(bytes, filename).await?;
        if self.state.generation() != generation {
            return Ok(self.current_route().unwrap_or(Route::Upload));
        }
        self.state.set_session_id(Some(session.session_id.clone()));
        info!("established session {} for {}", session.session_id, session.filename);

        let profile = self.gateway.profile_by_session(&session.session_id).await?;
        if !self.state.set_profile_if_current(generation, profile) {
            return Ok(self.current_route().unwrap_or(Route::Upload));
        }
        Ok(self.navigate(Route::Profile).unwrap_or(Route::Upload))
    }

    /// Show the stored profile, refetching by session id when the in-memory
    /// copy is gone (e.g. it was cleared server-side but the session
    /// survives), or profiling the raw bytes when no session exists.
    pub async fn profile(&self) -> ClientResult<ProfileResponse> {
        if let Some(profile) = self.state.profile() {
            return Ok(profile);
        }
        if let Some(session_id) = self.state.session_id() {
            let profile = self.gateway.profile_by_session(&session_id).await?;
            self.state.set_profile(Some(profile.clone()));
            return Ok(profile);
        }
        let file = self.require_file()?;
        let profile = self.gateway.profile_by_file(file.bytes, &file.filename).await?;
        self.state.set_profile(Some(profile.clone()));
        Ok(profile)
    }

    pub async fn validate(&self, rules_path: Option<&str>) -> ClientResult<ValidateResponse> {
        let file = self.require_file()?;
        let generation = self.state.generation();
        let result = self.gateway.validate(file.bytes, &file.filename, rules_path).await?;
        if self.state.generation() == generation {
            self.state.set_validation(Some(result.clone()));
        }
        Ok(result)
    }

    pub async fn query(&self, sql: &str) -> ClientResult<QueryResponse> {
        let file = self.require_file()?;
        self.gateway.query(file.bytes, &file.filename, sql).await
    }

    pub async fn clean(&self, options: &CleanOptions) -> ClientResult<Vec<u8>> {
        let file = self.require_file()?;
        self.gateway.clean(file.bytes, &file.filename, options).await
    }

    pub async fn analyze(&self, request: &AnalyzeRequest) -> ClientResult<AnalyzeResponse> {
        let file = self.require_file()?;
        self.gateway.analyze(file.bytes, &file.filename, request).await
    }

    /// Build the NL-to-SQL request from the stored profile: the schema is
    /// the column name -> type map and the sample rows ride along. Works
    /// after a restart since it needs no raw bytes.
    pub async fn generate_sql(&self, question: &str) -> ClientResult<GenerateSqlResponse> {
        let profile = self.state.profile().ok_or(ClientError::FileRequired)?;
        let schema: BTreeMap<String, String> = profile
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.dtype.clone()))
            .collect();
        let request = GenerateSqlRequest {
            question: question.to_string(),
            table: "loaded_table".to_string(),
            schema,
            sample_rows: if profile.sample_rows.is_empty() {
                None
            } else {
                Some(profile.sample_rows.clone())
            },
        };
        self.gateway.generate_sql(&request).await
    }

    fn require_file(&self) -> ClientResult<FileHandle> {
        self.state.uploaded_file().ok_or(ClientError::FileRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::persist::MemoryStateStore;

    fn workbench(authenticated: bool) -> Workbench {
        let credentials = Arc::new(MemoryCredentialStore::new());
        if authenticated {
            credentials.set("token");
        }
        let state = Arc::new(WorkflowState::new(Arc::new(MemoryStateStore::new())));
        let gateway = Arc::new(Gateway::new("http://127.0.0.1:1", credentials.clone()).unwrap());
        Workbench::new(gateway, state, credentials)
    }

    #[test]
    fn no_route_renders_before_hydration() {
        let wb = workbench(true);
        assert_eq!(wb.navigate(Route::Profile), None);
        assert_eq!(wb.current_route(), None);
    }

    #[test]
    fn start_lands_anonymous_users_on_login() {
        let wb = workbench(false);
        assert_eq!(wb.start(), Some(Route::Login));
    }

    #[test]
    fn start_lands_authenticated_users_on_upload() {
        let wb = workbench(true);
        assert_eq!(wb.start(), Some(routes::LANDING));
    }

    #[test]
    fn authenticated_user_cannot_sit_on_login() {
        let wb = workbench(true);
        wb.start();
        assert_eq!(wb.navigate(Route::Login), Some(routes::LANDING));
    }

    #[tokio::test]
    async fn file_scoped_commands_fail_without_bytes() {
        let wb = workbench(true);
        wb.start();
        assert_eq!(wb.query("SELECT 1").await.unwrap_err(), ClientError::FileRequired);
        assert_eq!(wb.validate(None).await.unwrap_err(), ClientError::FileRequired);
        assert_eq!(
            wb.clean(&CleanOptions::default()).await.unwrap_err(),
            ClientError::FileRequired
        );
        assert_eq!(wb.generate_sql("top rows").await.unwrap_err(), ClientError::FileRequired);
    }

    #[test]
    fn logout_returns_to_login() {
        let wb = workbench(true);
        wb.start();
        assert_eq!(wb.logout(), Some(Route::Login));
        assert!(!wb.is_authenticated());
    }
}
