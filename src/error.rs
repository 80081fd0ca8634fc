//! Client-side error model shared by the gateway, the state layer and the
//! workbench commands. Each variant maps one failure mode of the backend
//! conversation; the workbench renders these locally and never lets them
//! tear down the REPL.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Bad credentials at login/register. User-correctable; never triggers
    /// the global sign-out.
    Auth { message: String },
    /// The backend rejected an authenticated call (401). The gateway has
    /// already cleared the credential and fired the sign-out hook by the
    /// time the caller sees this.
    Unauthorized,
    /// Any other non-2xx response. `message` is the response body text, or a
    /// generic status line when the body was empty.
    Request { status: u16, message: String },
    /// A file-scoped operation was invoked with no uploaded file in memory
    /// (e.g. after a restart restored the profile but not the bytes).
    FileRequired,
    /// Persisted state or a response body failed to decode.
    Parse { message: String },
    /// Transport-level failure; no response was received.
    Network { message: String },
}

impl ClientError {
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        ClientError::Auth { message: msg.into() }
    }

    pub fn request(status: u16, body: String) -> Self {
        let message = if body.trim().is_empty() {
            format!("request failed with status {}", status)
        } else {
            body
        };
        ClientError::Request { status, message }
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        ClientError::Parse { message: msg.into() }
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        ClientError::Network { message: msg.into() }
    }

    /// True when the error means the session credential is gone and the user
    /// must sign in again.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Auth { message } => write!(f, "{}", message),
            ClientError::Unauthorized => write!(f, "session expired; please log in again"),
            ClientError::Request { message, .. } => write!(f, "{}", message),
            ClientError::FileRequired => {
                write!(f, "no file uploaded; upload a CSV or XLSX file before running this workflow")
            }
            ClientError::Parse { message } => write!(f, "decode error: {}", message),
            ClientError::Network { message } => write!(f, "network error: {}", message),
        }
    }
}

impl std::error::Error for ClientError {}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::parse(err.to_string())
        } else {
            ClientError::network(err.to_string())
        }
    }
}
