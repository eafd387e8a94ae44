#[derive(Debug)]
pub enum EngineError {
    /// Order ledger query failed; the cache was left untouched.
    Ledger(String),
    /// Persisting the cache snapshot failed; the in-memory entry was left
    /// untouched.
    Store(String),
    /// A cached range string could not be parsed back into dates.
    UnparseableRange(String),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Ledger(e) => write!(f, "order ledger error: {e}"),
            EngineError::Store(e) => write!(f, "cache store error: {e}"),
            EngineError::UnparseableRange(s) => write!(f, "unparseable cached range: {s:?}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Store(e.to_string())
    }
}
