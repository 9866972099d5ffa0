// =============================================================================
// Fetch errors for Binance Futures REST calls
// =============================================================================

/// Why a single exchange call failed. No call is retried.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Connection, TLS, or body read failure.
    Transport(String),
    /// The call did not finish within its deadline.
    Timeout { after_ms: u64 },
    /// Non-2xx response that did not carry an exchange error object.
    Status { status: u16, body: String },
    /// The exchange answered with `{"code": .., "msg": ..}` instead of data.
    Exchange { code: i64, msg: String },
    /// The body did not have the expected shape.
    Parse(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Timeout { after_ms } => write!(f, "timed out after {after_ms} ms"),
            Self::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Exchange { code, msg } => write!(f, "Binance API error {code}: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Detect the `{code, msg}` error object Binance returns in place of data.
///
/// Only a JSON object with a non-zero integer `code` counts; arrays and
/// regular payloads pass through.
pub fn check_exchange_error(body: &serde_json::Value) -> Result<(), FetchError> {
    let Some(code) = body.get("code").and_then(serde_json::Value::as_i64) else {
        return Ok(());
    };
    if code == 0 {
        return Ok(());
    }

    let msg = body["msg"].as_str().unwrap_or_default().to_string();
    Err(FetchError::Exchange { code, msg })
}
