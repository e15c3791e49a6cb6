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
//! RFC 4252 §7, `"publickey"`: a probe with `has-signature = FALSE` to
//! let the server reject unusable keys before anything is signed, then a
//! signed request over the session-bound blob on success.

use cryptovec::CryptoVec;

use crate::codec::WireWrite;
use crate::driver::Outcome;
use crate::method::{Method, MethodHandle, ReadSignal};
use crate::msg;
use crate::Error;

/// Produces a signature over an arbitrary byte string with one key.
///
/// Implementors own the private key material; this crate never sees it,
/// only the resulting signature blob.
#[async_trait::async_trait]
pub trait Signer: Send {
    /// The public key algorithm name, e.g. `"ssh-ed25519"`.
    fn algorithm(&self) -> &str;

    /// The encoded public key blob (RFC 4253 §6.6 format for `algorithm`).
    fn public_key_blob(&self) -> &[u8];

    /// Sign `data` and return the raw signature blob (algorithm name plus
    /// signature, RFC 4253 §6.6 format), or `None` to abandon the attempt
    /// without contacting the server again.
    async fn sign(&mut self, data: &[u8]) -> Option<Vec<u8>>;
}

/// Build the exact byte string a `publickey` signature is computed over,
/// per RFC 4252 §7:
///
/// ```text
/// string    session identifier
/// byte      SSH_MSG_USERAUTH_REQUEST
/// string    user name
/// string    service name
/// string    "publickey"
/// boolean   TRUE
/// string    public key algorithm name
/// string    public key blob
/// ```
///
/// Returned as a [`CryptoVec`] since it is signed in place and never
/// needs to leave this module.
pub fn signed_blob(
    session_id: &[u8],
    username: &str,
    service: &str,
    algorithm: &str,
    key_blob: &[u8],
) -> CryptoVec {
    let mut buf = CryptoVec::new();
    buf.write_string(session_id);
    buf.write_byte(msg::USERAUTH_REQUEST);
    buf.write_string(username.as_bytes());
    buf.write_string(service.as_bytes());
    buf.write_string(b"publickey");
    buf.write_bool(true);
    buf.write_string(algorithm.as_bytes());
    buf.write_string(key_blob);
    buf
}

pub struct Publickey<S: Signer> {
    username: String,
    service: String,
    signer: S,
}

impl<S: Signer> Publickey<S> {
    pub fn new(username: impl Into<String>, service: impl Into<String>, signer: S) -> Self {
        Publickey {
            username: username.into(),
            service: service.into(),
            signer,
        }
    }
}

#[async_trait::async_trait]
impl<S: Signer> Method for Publickey<S> {
    fn name(&self) -> &'static str {
        "publickey"
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn service(&self) -> &str {
        &self.service
    }

    async fn run(&mut self, handle: &mut MethodHandle<'_>) -> Result<Option<Outcome>, Error> {
        let algorithm = self.signer.algorithm().to_string();
        let key_blob = self.signer.public_key_blob().to_vec();

        let mut probe = Vec::new();
        probe.write_bool(false);
        probe.write_string(algorithm.as_bytes());
        probe.write_string(&key_blob);
        handle.send_request(&probe).await?;

        match handle.read_message().await? {
            ReadSignal::Terminal(outcome) => return Ok(Some(outcome)),
            ReadSignal::Message(buf) if buf.first() == Some(&msg::USERAUTH_PK_OK) => {}
            ReadSignal::Message(buf) => {
                return Err(Error::ProtocolViolation(format!(
                    "unexpected message code {} answering a publickey probe",
                    buf.first().copied().unwrap_or(0)
                )))
            }
        }

        let to_sign = signed_blob(
            handle.session_identifier(),
            &self.username,
            &self.service,
            &algorithm,
            &key_blob,
        );

        let Some(signature) = self.signer.sign(&to_sign).await else {
            return Ok(Some(Outcome::Cancelled));
        };

        let mut signed = Vec::new();
        signed.write_bool(true);
        signed.write_string(algorithm.as_bytes());
        signed.write_string(&key_blob);
        signed.write_string(&signature);
        handle.send_request(&signed).await?;

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::MockTransport;
    use crate::driver::Driver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSigner {
        calls: Arc<AtomicUsize>,
        refuse: bool,
    }

    #[async_trait::async_trait]
    impl Signer for CountingSigner {
        fn algorithm(&self) -> &str {
            "ssh-ed25519"
        }

        fn public_key_blob(&self) -> &[u8] {
            b"fake-key-blob"
        }

        async fn sign(&mut self, _data: &[u8]) -> Option<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                None
            } else {
                Some(b"fake-signature".to_vec())
            }
        }
    }

    fn pk_ok_message() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_byte(msg::USERAUTH_PK_OK);
        buf.write_string(b"ssh-ed25519");
        buf.write_string(b"fake-key-blob");
        buf
    }

    fn failure_message() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_byte(msg::USERAUTH_FAILURE);
        buf.write_name_list(std::iter::empty::<&str>());
        buf.write_bool(false);
        buf
    }

    fn success_message() -> Vec<u8> {
        vec![msg::USERAUTH_SUCCESS]
    }

    #[tokio::test]
    async fn s4_probe_rejected_never_signs() {
        let transport = MockTransport::new(b"sid").push(failure_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let signer = CountingSigner {
            calls: calls.clone(),
            refuse: false,
        };
        let method = Publickey::new("alice", "ssh-connection", signer);
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Failed {
                methods: Vec::new(),
                partial: false
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn s5_probe_accepted_signs_exactly_once_and_succeeds() {
        let transport = MockTransport::new(b"sid")
            .push(pk_ok_message())
            .push(success_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let signer = CountingSigner {
            calls: calls.clone(),
            refuse: false,
        };
        let method = Publickey::new("alice", "ssh-connection", signer);
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn signer_declining_to_sign_cancels_locally() {
        let transport = MockTransport::new(b"sid").push(pk_ok_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let signer = CountingSigner {
            calls: calls.clone(),
            refuse: true,
        };
        let method = Publickey::new("alice", "ssh-connection", signer);
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn signed_blob_matches_rfc4252_section7_layout() {
        let blob = signed_blob(b"sid", "alice", "ssh-connection", "ssh-ed25519", b"key");
        let mut expected = Vec::new();
        expected.write_string(b"sid");
        expected.write_byte(msg::USERAUTH_REQUEST);
        expected.write_string(b"alice");
        expected.write_string(b"ssh-connection");
        expected.write_string(b"publickey");
        expected.write_bool(true);
        expected.write_string(b"ssh-ed25519");
        expected.write_string(b"key");
        assert_eq!(&blob[..], &expected[..]);
    }
}
