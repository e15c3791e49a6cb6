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
//! RFC 4256, `"keyboard-interactive"`: a loop of
//! `SSH_MSG_USERAUTH_INFO_REQUEST`/`INFO_RESPONSE` rounds, each answered
//! by a caller-supplied prompt callback, until the server answers with
//! `SUCCESS` or `FAILURE`.

use secrecy::{ExposeSecret, SecretString};

use crate::codec::{Reader, WireWrite};
use crate::driver::Outcome;
use crate::method::{Method, MethodHandle, ReadSignal};
use crate::msg;
use crate::Error;

/// One prompt out of an `INFO_REQUEST`.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    pub echo: bool,
}

/// Answers the prompts of one `INFO_REQUEST` round.
///
/// Implementors may show `name`/`instruction` once per round and collect
/// one response per entry in `prompts`, in order. Returning `None`
/// abandons the method locally (e.g. the user closed the dialogue),
/// surfaced to the driver as [`Outcome::Cancelled`].
#[async_trait::async_trait]
pub trait PromptCallback: Send {
    async fn respond(
        &mut self,
        name: &str,
        instruction: &str,
        prompts: &[Prompt],
    ) -> Option<Vec<SecretString>>;
}

pub struct KeyboardInteractive<C: PromptCallback> {
    username: String,
    service: String,
    submethods: Vec<String>,
    callback: C,
}

impl<C: PromptCallback> KeyboardInteractive<C> {
    pub fn new(username: impl Into<String>, service: impl Into<String>, callback: C) -> Self {
        KeyboardInteractive {
            username: username.into(),
            service: service.into(),
            submethods: Vec::new(),
            callback,
        }
    }

    /// Restrict the server to a preferred subset of its own
    /// sub-methods (RFC 4256 §3.1's `submethods` field). Empty by
    /// default, which lets the server choose freely.
    pub fn with_submethods(mut self, submethods: Vec<String>) -> Self {
        self.submethods = submethods;
        self
    }
}

#[async_trait::async_trait]
impl<C: PromptCallback> Method for KeyboardInteractive<C> {
    fn name(&self) -> &'static str {
        "keyboard-interactive"
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn service(&self) -> &str {
        &self.service
    }

    async fn run(&mut self, handle: &mut MethodHandle<'_>) -> Result<Option<Outcome>, Error> {
        let mut data = Vec::new();
        data.write_string(b""); // language tag, deprecated and left empty
        data.write_name_list(self.submethods.iter().map(String::as_str));
        handle.send_request(&data).await?;

        loop {
            match handle.read_message().await? {
                ReadSignal::Terminal(outcome) => return Ok(Some(outcome)),
                ReadSignal::Message(buf) if buf.first() == Some(&msg::USERAUTH_INFO_REQUEST) => {
                    let mut r = Reader::new(&buf[1..]);
                    let name = r.read_utf8()?.to_string();
                    let instruction = r.read_utf8()?.to_string();
                    let _language = r.read_utf8()?;
                    let count = r.read_u32()?;
                    // Each prompt is at least a 4-byte string length prefix
                    // plus an echo flag; reject a count the remaining buffer
                    // could not possibly hold before trusting it as a
                    // capacity hint.
                    if count as usize > r.remaining().len() / 5 {
                        return Err(Error::ProtocolViolation(format!(
                            "info request claims {count} prompts, which cannot fit in the remaining {} bytes",
                            r.remaining().len()
                        )));
                    }
                    let mut prompts = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        let text = r.read_utf8()?.to_string();
                        let echo = r.read_bool()?;
                        prompts.push(Prompt { text, echo });
                    }

                    let Some(responses) = self.callback.respond(&name, &instruction, &prompts).await else {
                        return Ok(Some(Outcome::Cancelled));
                    };

                    let mut response_data = Vec::new();
                    response_data.write_u32(responses.len() as u32);
                    for response in &responses {
                        response_data.write_string(response.expose_secret().as_bytes());
                    }
                    // INFO_RESPONSE is not wrapped in a USERAUTH_REQUEST tuple.
                    handle.send_raw(msg::USERAUTH_INFO_RESPONSE, &response_data).await?;
                }
                ReadSignal::Message(buf) => {
                    return Err(Error::ProtocolViolation(format!(
                        "unexpected message code {} during keyboard-interactive",
                        buf.first().copied().unwrap_or(0)
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::MockTransport;
    use crate::driver::Driver;

    struct FixedAnswers(Vec<Vec<&'static str>>);

    #[async_trait::async_trait]
    impl PromptCallback for FixedAnswers {
        async fn respond(
            &mut self,
            _name: &str,
            _instruction: &str,
            prompts: &[Prompt],
        ) -> Option<Vec<SecretString>> {
            let round = self.0.remove(0);
            assert_eq!(round.len(), prompts.len());
            Some(round.into_iter().map(|s| SecretString::from(s.to_string())).collect())
        }
    }

    fn info_request(name: &str, instruction: &str, prompts: &[(&str, bool)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_byte(msg::USERAUTH_INFO_REQUEST);
        buf.write_string(name.as_bytes());
        buf.write_string(instruction.as_bytes());
        buf.write_string(b"");
        buf.write_u32(prompts.len() as u32);
        for (text, echo) in prompts {
            buf.write_string(text.as_bytes());
            buf.write_bool(*echo);
        }
        buf
    }

    fn success_message() -> Vec<u8> {
        vec![msg::USERAUTH_SUCCESS]
    }

    #[tokio::test]
    async fn single_round_info_request_response_loop() {
        let transport = MockTransport::new(b"sid")
            .push(info_request("", "Password: ", &[("Password:", false)]))
            .push(success_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let callback = FixedAnswers(vec![vec!["hunter2"]]);
        let method = KeyboardInteractive::new("alice", "ssh-connection", callback);
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Complete);
    }

    #[tokio::test]
    async fn multi_round_info_request_response_loop() {
        let transport = MockTransport::new(b"sid")
            .push(info_request("", "", &[("Password:", false)]))
            .push(info_request("", "", &[("OTP:", false)]))
            .push(success_message());
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let callback = FixedAnswers(vec![vec!["hunter2"], vec!["123456"]]);
        let method = KeyboardInteractive::new("alice", "ssh-connection", callback);
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Complete);
    }

    #[tokio::test]
    async fn oversized_prompt_count_is_a_protocol_violation() {
        let mut buf = Vec::new();
        buf.write_byte(msg::USERAUTH_INFO_REQUEST);
        buf.write_string(b"");
        buf.write_string(b"");
        buf.write_string(b"");
        buf.write_u32(u32::MAX); // claims billions of prompts in a tiny payload

        let transport = MockTransport::new(b"sid").push(buf);
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let callback = FixedAnswers(vec![]);
        let method = KeyboardInteractive::new("alice", "ssh-connection", callback);
        let err = driver.authenticate(Box::new(method)).await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    struct AlwaysCancel;

    #[async_trait::async_trait]
    impl PromptCallback for AlwaysCancel {
        async fn respond(
            &mut self,
            _name: &str,
            _instruction: &str,
            _prompts: &[Prompt],
        ) -> Option<Vec<SecretString>> {
            None
        }
    }

    #[tokio::test]
    async fn declining_a_prompt_cancels_locally_without_a_response() {
        let transport =
            MockTransport::new(b"sid").push(info_request("", "", &[("Password:", false)]));
        let mut driver = Driver::new(Box::new(transport)).await.unwrap();

        let method = KeyboardInteractive::new("alice", "ssh-connection", AlwaysCancel);
        let outcome = driver.authenticate(Box::new(method)).await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
    }
}
