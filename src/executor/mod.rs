//! Streaming client for the sandbox executor.
//!
//! One [`Forwarder::forward`] call is one session: a single POST whose body is
//! relayed line by line as [`Frame`]s, ending in exactly one terminal frame.

mod decode;
mod error;
mod framing;
pub mod forwarder;

pub use error::ForwardError;
pub use forwarder::{Forwarder, Frame, FrameStream};
