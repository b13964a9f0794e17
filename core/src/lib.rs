//! Acoustic Wi-Fi provisioning library
//!
//! Receives Wi-Fi credentials as an ultrasonic transmission, applies them via
//! the system connection manager, and reports the assigned address back over
//! an encrypted, channel-addressed MQTT message.

pub mod cipher;
pub mod decoder;
pub mod error;
pub mod external;
pub mod frame;
pub mod queue;
pub mod session;

pub use decoder::{DecoderConfig, Modem, ModemConfig, StopHandle, StreamDecoder};
pub use error::{ProvisionError, Result};
pub use frame::CredentialFrame;
pub use queue::{AudioFrame, FrameQueue};
pub use session::{ProvisioningSession, SessionState};

// Audio configuration
pub const SAMPLE_RATE: u32 = 48_000;
pub const MODEM_PROFILE: &str = "wave";
pub const PROFILES_FILE_NAME: &str = "quiet-profiles.json";
pub const SYSTEM_PROFILES_PATH: &str = "/usr/local/share/quiet/quiet-profiles.json";

// Status codes broadcast on the fixed status topic. An observer can follow
// coarse progress without decrypting the per-channel result message.
pub const STATUS_CONNECTING: u8 = 2;
pub const STATUS_CONNECTED: u8 = 3;
pub const STATUS_DONE: u8 = 4;

// Result publishes are best-effort with a bounded number of attempts.
pub const PUBLISH_ATTEMPTS: usize = 3;

// Broker defaults
pub const STATUS_TOPIC: &str = "/voicen/hey_wifi";
pub const RESULT_TOPIC_PREFIX: &str = "/voicen/hey_wifi";
pub const DEFAULT_BROKER_HOST: &str = "q.voicen.io";
pub const DEFAULT_BROKER_USER: &str = "mqtt";
pub const DEFAULT_BROKER_PASSWORD: &str = "mqtt";
pub const DEFAULT_WIRELESS_INTERFACE: &str = "wlan0";
