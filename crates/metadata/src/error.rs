use foundation::ids::EntityKey;

/// Why a metadata fetch failed.
///
/// Cloneable so a single failed fetch can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    NotFound { key: EntityKey },
    Status { key: EntityKey, code: u16 },
    Network(String),
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::NotFound { key } => write!(f, "no directory entry for {key}"),
            FetchError::Status { key, code } => {
                write!(f, "directory request for {key} failed with status {code}")
            }
            FetchError::Network(msg) => write!(f, "directory request failed: {msg}"),
            FetchError::Decode(msg) => write!(f, "directory payload could not be decoded: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
