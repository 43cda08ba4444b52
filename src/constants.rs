//! # Bridge Constants
//!
//! Defaults for every optional configuration key plus the fixed names the bridge
//! exchanges with the process engine.

/// Prefix prepended to message descriptor names when they are delivered as signals
pub const MESSAGE_SIGNAL_PREFIX: &str = "Message-";

/// Node implementation marker that forces outbound publication of a thrown signal
pub const BROKER_NODE_IMPLEMENTATION: &str = "##kafka";

/// Prefix for environment variable overrides (`TASKER_BRIDGE_CONSUMER__GROUP_ID`)
pub const ENV_PREFIX: &str = "TASKER_BRIDGE";

/// Base name of the optional configuration file inside the config directory
pub const CONFIG_FILE_STEM: &str = "event-bridge";

pub mod defaults {
    pub const BOOTSTRAP_SERVERS: &str = "localhost:9092";
    pub const GROUP_ID: &str = "jbpm-consumer";
    pub const POLL_INTERVAL_MS: u64 = 10_000;
    pub const MAX_NOTIFY_THREADS: usize = 10;
    pub const MAX_BLOCK_MS: u64 = 2_000;
    pub const CLOSE_TIMEOUT_SECS: u64 = 30;
    /// Pause after a failed poll
    pub const POLL_ERROR_BACKOFF_MS: u64 = 500;
}

/// Record headers carrying the identity a delivery runs as
pub mod headers {
    pub const USER: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const ASSERTION: &str = "assertion";
}

pub mod envelope {
    pub const SPEC_VERSION: &str = "1.0";
    pub const JSON_CONTENT_TYPE: &str = "application/json";
    pub const SOURCE_PREFIX: &str = "/process";
}

pub mod codecs {
    /// Provider name of the default CloudEvents JSON envelope codec
    pub const CLOUD_EVENTS_JSON: &str = "cloudevents-json";
    /// Provider name of the envelope-less JSON codec
    pub const RAW_JSON: &str = "raw-json";
}
