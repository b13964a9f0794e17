use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{0} bits per sample is not supported")]
    UnsupportedBitDepth(u32),

    #[error("channel select {select} is out of range for {channels} channel(s)")]
    ChannelSelectOutOfRange { select: usize, channels: usize },

    #[error("no quiet-profiles.json found")]
    ProfilesNotFound,

    #[error("`{0}` was not found on this system")]
    MissingTool(String),

    #[error("credential frame truncated: need {needed} bytes, payload has {have}")]
    TruncatedFrame { needed: usize, have: usize },

    #[error("credential frame field is not valid UTF-8")]
    FrameEncoding(#[from] std::str::Utf8Error),

    #[error("failed to run `{tool}`: {source}")]
    CommandSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{tool}` exited with {status}")]
    CommandFailed {
        tool: String,
        status: std::process::ExitStatus,
    },

    #[error("failed to connect to Wi-Fi network {0:?}")]
    ConnectFailed(String),

    #[error("no IPv4 address assigned on interface {0}")]
    NoIpAddress(String),

    #[error("failed to encode result message")]
    ResultEncoding(#[from] serde_json::Error),

    #[error("ciphertext is not valid base64")]
    CiphertextEncoding(#[from] base64::DecodeError),

    #[error("result publish failed after {0} attempts")]
    PublishExhausted(usize),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
