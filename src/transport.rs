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
//! The interface the driver consumes from the SSH transport layer
//! (RFC 4253). Everything here is implemented elsewhere: version exchange,
//! key exchange, cipher/MAC pipelines and rekeying are out of scope for
//! this crate.

use crate::Error;

/// RFC 4253 §11.1 disconnect reason codes relevant to authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCode {
    ProtocolError = 2,
    ServiceNotAvailable = 7,
    AuthCancelledByUser = 13,
    NoMoreAuthMethodsAvailable = 14,
}

/// Abstract handle onto an already-established, encrypted SSH transport.
///
/// The driver is the sole consumer of this trait during authentication: it
/// never parallelises calls into it, and never issues a new request before
/// consuming the prior response (see the crate-level invariants).
#[async_trait::async_trait]
pub trait TransportPort: Send {
    /// Send `SSH_MSG_SERVICE_REQUEST` for `name` and block for
    /// `SSH_MSG_SERVICE_ACCEPT`. Fails with [`Error::ServiceRejected`] on
    /// mismatch or refusal.
    async fn start_service(&mut self, name: &str) -> Result<(), Error>;

    /// Return the next decrypted application payload (length-stripped,
    /// MAC-verified). Blocks until one is available.
    async fn next_message(&mut self) -> Result<Vec<u8>, Error>;

    /// Enqueue a payload for sending. `high_priority` hints that this
    /// message should be scheduled ahead of non-auth traffic.
    async fn send_message(&mut self, payload: &[u8], high_priority: bool) -> Result<(), Error>;

    /// The key-exchange hash from the first KEX; stable for the life of
    /// the connection, used as the signature-binding nonce in publickey
    /// authentication.
    fn session_identifier(&self) -> &[u8];

    /// Signal that user authentication succeeded, so the transport may
    /// release any buffered connection-layer messages.
    fn mark_authenticated(&mut self);

    /// Tear the transport down with an SSH `DISCONNECT`.
    async fn disconnect(&mut self, code: DisconnectCode, reason: &str);
}
