//! UECS-CCM greenhouse protocol bridge
//!
//! Bridges the UDP-multicast, XML-based UECS-CCM protocol (greenhouse
//! sensor telemetry and actuator control) to a structured query/command
//! interface:
//!
//! - [`protocol`]: stateless packet codec with type-suffix normalization
//! - [`cache`]: concurrent latest-value cache plus node liveness registry
//! - [`receiver`]: cancellable background multicast drain loop
//! - [`sender`]: safety-guarded command sender (allowlist, rate limit,
//!   duration-bounded auto-OFF)
//! - [`service`]: the facade consumed by boundary layers
//! - [`http_api`]: thin HTTP/JSON routes over the facade

pub mod cache;
pub mod config;
pub mod error;
pub mod http_api;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod service;

pub use cache::SensorCache;
pub use config::BridgeConfig;
pub use error::{CcmError, Result};
pub use receiver::CcmReceiver;
pub use sender::{CcmSender, SafetyLimits};
pub use service::BridgeService;
