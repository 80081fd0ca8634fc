//! Navigation model and the pure guard decision. The guard never renders a
//! protected screen before hydration completes, and re-evaluates whenever
//! authentication state changes (including a forced sign-out mid-command).

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Upload,
    Profile,
    Validate,
    Query,
    Clean,
    Anomaly,
    AiAssist,
}

/// Where an authenticated user lands by default.
pub const LANDING: Route = Route::Upload;

impl Route {
    /// Login and register are reachable while anonymous; everything else is
    /// gated on a credential.
    pub fn is_public(self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Upload => "/upload",
            Route::Profile => "/profile",
            Route::Validate => "/validate",
            Route::Query => "/query",
            Route::Clean => "/clean",
            Route::Anomaly => "/anomaly",
            Route::AiAssist => "/ai-assist",
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Hydration has not completed; render nothing and decide nothing.
    Defer,
    Allow,
    /// Authenticated user on login/register: send to the landing screen.
    RedirectLanding,
    /// Anonymous user on a protected screen.
    RedirectLogin,
}

pub fn decide(route: Route, authenticated: bool, hydrated: bool) -> RouteDecision {
    if !hydrated {
        return RouteDecision::Defer;
    }
    if route.is_public() && authenticated {
        return RouteDecision::RedirectLanding;
    }
    if !route.is_public() && !authenticated {
        return RouteDecision::RedirectLogin;
    }
    RouteDecision::Allow
}
