use canarytail_protocol::CanaryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("http error{}: {message}", status_suffix(.status))]
    Http { status: Option<u16>, message: String },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("malformed response: {0}")]
    Payload(String),

    #[error("block not found: {0}")]
    NotFound(String),

    #[error("no nodes available")]
    NoNodes,

    #[error("invalid block hash: {0}")]
    InvalidHash(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        NetError::Payload(err.to_string())
    }
}

impl From<reqwest::Error> for NetError {
    fn from(err: reqwest::Error) -> Self {
        NetError::Http {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" {s}")).unwrap_or_default()
}

/// Oracle failures are terminal for the validation that triggered them.
impl From<NetError> for CanaryError {
    fn from(err: NetError) -> Self {
        CanaryError::Oracle(err.to_string())
    }
}
