//! MQTT Authorization Agent
//!
//! Access control for an external MQTT broker. The broker keeps the
//! transport, sessions and QoS; this crate answers three questions for it:
//!
//! - **Connect**: are these credentials valid? On success the client id is
//!   bound to the authenticated user.
//! - **Subscribe**: may the user bound to this client id subscribe to this filter?
//! - **Publish**: may the user bound to this client id publish to this topic?
//!
//! Each user owns an ordered list of allow policies. A policy names a topic
//! pattern (exact, unanchored regex, or MQTT wildcard filter) and grants
//! subscribe and/or publish. Anything no policy grants is denied.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "port": 1883,
//!   "users": [
//!     {
//!       "username": "alice",
//!       "password": "secret",
//!       "policies": [
//!         { "topic": "home/#", "useRegex": false, "allowSubscription": true, "allowPublish": false },
//!         { "topic": "^sensors/", "useRegex": true, "allowSubscription": true, "allowPublish": true }
//!       ]
//!     }
//!   ]
//! }
//! ```

pub mod acl;
pub mod agent;
pub mod auth;
pub mod config;
pub mod mqtt;
pub mod server;
pub mod session;

// Re-export main types
pub use agent::{AgentOptions, AuthzAgent, ConnectDecision};
pub use config::AuthzConfig;
pub use session::{SessionRegistry, SessionStore};
