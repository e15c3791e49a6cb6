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
//! RFC 4252 §8, `"password"`, including the `SSH_MSG_USERAUTH_PASSWD_CHANGEREQ`
//! sub-dialogue.

use secrecy::{ExposeSecret, SecretString};

use crate::codec::{Reader, WireWrite};
use crate::driver::Outcome;
use crate::method::{Method, MethodHandle, ReadSignal};
use crate::msg;
use crate::Error;

/// Authenticate with a plain password, answering at most one
/// `PASSWD_CHANGEREQ` round if `new_password` is set.
///
/// The password (and any new password) are held in [`SecretString`] so
/// they are zeroed on drop; they are only exposed for the instant it
/// takes to push their bytes onto the outgoing payload.
pub struct Password {
    username: String,
    service: String,
    password: SecretString,
    new_password: Option<SecretString>,
}

impl Password {
    pub fn new(username: impl Into<String>, service: impl Into<String>, password: SecretString) -> Self {
        Password {
            username: username.into(),
            service: service.into(),
            password,
            new_password: None,
        }
    }

    /// Supply a replacement password to offer if the server responds
    /// with `PASSWD_CHANGEREQ`. Without one, a change request is
    /// reported back as [`Outcome::Cancelled`] rather than retried blindly.
    pub fn with_new_password(mut self, new_password: SecretString) -> Self {
        self.new_password = Some(new_password);
        self
    }
}

#[async_trait::async_trait]
impl Method for Password {
    fn name(&self) -> &'static str {
        "password"
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn service(&self) -> &str {
        &self.service
    }

    async fn run(&mut self, handle: &mut MethodHandle<'_>) -> Result<Option<Outcome>, Error> {
        send_password_request(handle, self.password.expose_secret(), None).await?;

        match handle.read_message().await? {
            ReadSignal::Terminal(outcome) => Ok(Some(outcome)),
            ReadSignal::Message(buf) if buf.first() == Some(&msg::USERAUTH_PASSWD_CHANGEREQ) => {
                let mut r = Reader::new(&buf[1..]);
                let prompt = r.read_utf8()?.to_string();
                let language = r.read_utf8()?.to_string();
                log::debug!("server requested a password change ({language}): {prompt}");

                let Some(new_password) = self.new_password.as_ref() else {
                    return Ok(Some(Outcome::Cancelled));
                };

                send_password_request(
                    handle,
                    self.password.expose_secret(),
                    Some(new_password.expose_secret()),
                )
                .await?;

                Ok(None)
            }
            ReadSignal::Message(buf) => Err(Error::ProtocolViolation(format!(
                "unexpected message code {} answering a password request",
                buf.first().copied().unwrap_or(0)
            ))),
        }
    }
}

/// Encode and send one `password` request. `new_password`, when set,
/// marks `change-password-flag=true` and appends the replacement
/// password to the same request rather than a follow-up one.
async fn send_password_request(
    handle: &mut MethodHandle<'_>,
    password: &str,
    new_password: Option<&str>,
) -> Result<(), Error> {
    let mut data = Vec::new();
    data.write_bool(new_password.is_some());
    data.write_string(password.as_bytes());
    if let Some(new_password) = new_password {
        data.write_string(new_password.as_bytes());
    }
    handle.send_request(&data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::MockTransport;
    use crate::driver::Driver;

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

    fn changereq_message() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_byte(msg::USERAUTH_PASSWD_CHANGEREQ);
        buf.write_string(b"please pick a new password");
        buf.write_string(b"en");
        buf
    }

    #[tokio::test]
    async fn s2_password_success() {
        let transport = MockTransport::new(b"sid").push(success_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let method = Password::new("alice", "ssh-connection", SecretString::from("hunter2".to_string()));
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Complete);
    }

    #[tokio::test]
    async fn password_rejected_without_partial_success() {
        let transport = MockTransport::new(b"sid").push(failure_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let method = Password::new("alice", "ssh-connection", SecretString::from("wrong".to_string()));
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Failed {
                methods: Vec::new(),
                partial: false
            }
        );
    }

    #[tokio::test]
    async fn s3_password_change_request_honoured() {
        let transport = MockTransport::new(b"sid")
            .push(changereq_message())
            .push(success_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let method = Password::new("alice", "ssh-connection", SecretString::from("old".to_string()))
            .with_new_password(SecretString::from("new".to_string()));
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Complete);
    }

    #[tokio::test]
    async fn password_change_without_replacement_cancels_locally() {
        let transport = MockTransport::new(b"sid").push(changereq_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let method = Password::new("alice", "ssh-connection", SecretString::from("old".to_string()));
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
    }
}
