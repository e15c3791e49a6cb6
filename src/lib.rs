// Copyright 2016 Pierre-Étienne Meunier
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Client side of the SSH-2 user authentication protocol (RFC 4252), layered
//! over an already-established SSH transport (RFC 4253).
//!
//! This crate drives the `ssh-userauth` request/response dialogue: banners,
//! partial-success chaining, the password change sub-dialogue, the
//! publickey probe-then-sign two-phase request, and the
//! keyboard-interactive prompt loop. It does not implement the transport
//! itself (version exchange, key exchange, ciphers, rekeying) nor any
//! connection-layer channel multiplexing; those are consumed through the
//! [`TransportPort`] trait, which callers implement on top of their own
//! transport.
//!
//! ```no_run
//! use secrecy::SecretString;
//! use ssh_userauth::{Driver, TransportPort};
//! use ssh_userauth::methods::Password;
//!
//! # async fn run(transport: Box<dyn TransportPort>) -> Result<(), ssh_userauth::Error> {
//! let mut driver = Driver::new(transport).await?;
//!
//! let methods = driver.list_methods("alice", "ssh-connection").await?;
//! if methods.iter().any(|m| m == "password") {
//!     let password = SecretString::from("hunter2".to_string());
//!     let method = Box::new(Password::new("alice", "ssh-connection", password));
//!     let outcome = driver.authenticate(method).await?;
//!     println!("{outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod codec;
mod msg;

pub mod banner;
pub mod driver;
pub mod method;
pub mod methods;
pub mod transport;

pub use banner::BannerSink;
pub use codec::DecodeError;
pub use driver::{Driver, Outcome};
pub use method::{Method, MethodHandle, ReadSignal};
pub use transport::{DisconnectCode, TransportPort};

/// Errors that can terminate an authentication attempt.
///
/// `MethodUnsupported` and a locally-chosen `Cancelled` are deliberately
/// absent here: the former is surfaced as [`Outcome::Failed`], and the
/// latter as [`Outcome::Cancelled`]. Neither is a failure of the protocol
/// driver itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An unexpected message code, a truncated payload, or an out-of-range
    /// field. The driver always disconnects the transport before
    /// propagating this.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The transport signalled EOF or a fatal error.
    #[error("transport closed")]
    TransportClosed,

    /// The `ssh-userauth` service was refused at startup.
    #[error("ssh-userauth service was rejected by the peer")]
    ServiceRejected,
}

impl From<codec::DecodeError> for Error {
    fn from(e: codec::DecodeError) -> Self {
        Error::ProtocolViolation(e.to_string())
    }
}
