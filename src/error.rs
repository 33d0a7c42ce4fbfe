use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabkitError {
    /// Network-level failure: timeout, DNS, connection refused.
    #[error("GitLab request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx HTTP response with the platform's extracted error message.
    #[error("GitLab API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 200 but the GraphQL response body carried an `errors` array.
    #[error("GitLab GraphQL error: {errors}")]
    GraphQl { errors: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LabkitError>;
