//! # Redkit Testing
//!
//! Test doubles for code built on redkit.
//!
//! - **[MockConnection]**: a scripted multiplexed connection that records every
//!   command with its placement flag, so tests can assert on exact arguments
//!   and on the absence of network calls.
//! - **[RecordingObserver]**: an event observer that keeps every lifecycle
//!   event it receives.
//!
//! ## Usage
//!
//! ```rust
//! use redkit_testing::MockConnection;
//! use redis::Value;
//!
//! let mock = MockConnection::new().with_reply(Value::Int(1));
//! assert_eq!(mock.command_count(), 0);
//! ```

pub mod mock_connection;
pub mod recording_observer;

pub use mock_connection::{MockConnection, RecordedCommand};
pub use recording_observer::RecordingObserver;
