use crate::validator::FieldError;

/// Failures raised by a [`crate::blockchain::ChainGateway`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Failed to decode RPC payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("RPC response for \"{0}\" is missing a result")]
    MissingResult(String),

    #[error("No transaction signer is configured for this connection")]
    SignerUnavailable,

    #[error("Signer failure: {0}")]
    Signer(String),

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Every failure the adapter surfaces to its callers.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Validation errors: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Chain \"{0}\" is not implemented yet!")]
    UnsupportedChain(String),

    #[error("Cannot find post \"@{author}/{permlink}\" to add comment to it.")]
    ParentNotFound { author: String, permlink: String },

    #[error("Post \"@{author}/{permlink}\" was not found at \"{chain}\" chain.")]
    ContentNotFound {
        chain: String,
        author: String,
        permlink: String,
    },

    #[error("Failed to parse post url \"{0}\"")]
    InvalidUrl(String),

    #[error("Account \"{account}\" was not found at \"{chain}\" chain.")]
    AccountNotFound { chain: String, account: String },

    #[error("Received WIF and username \"{account}\" do not match at \"{chain}\" chain.")]
    CredentialMismatch { chain: String, account: String },

    #[error("Broadcast to \"{chain}\" failed: {source}")]
    Broadcast {
        chain: String,
        #[source]
        source: GatewayError,
    },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// Field errors of a rejected request, empty for every other kind.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    serde_json::to_string(errors).unwrap_or_else(|_| format!("{errors:?}"))
}

pub type AdapterResult<T> = Result<T, AdapterError>;
