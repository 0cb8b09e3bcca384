//! Client for the Total Connect Comfort / Evohome cloud heating service.
//!
//! Authenticates an account, discovers its locations and devices, reads
//! their temperature state, and issues mode/setpoint/schedule commands
//! that are polled to completion through the service's task protocol. Both
//! API generations are supported via [`ApiProfile`].

mod client;
mod error;
mod logger;
mod protocol;
pub mod schedule;
mod session;
mod types;

pub use client::{Command, EvoClient, EvoClientBuilder};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{ApiProfile, DEFAULT_APP_ID, TASK_SUCCEEDED};
pub use types::*;
