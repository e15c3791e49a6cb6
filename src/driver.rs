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
//! The authentication state machine: the one component that reads from
//! the transport port during the `ssh-userauth` phase.

use crate::banner::BannerSink;
use crate::codec::{Reader, WireWrite};
use crate::method::{Method, MethodHandle, ReadSignal};
use crate::msg;
use crate::transport::{DisconnectCode, TransportPort};
use crate::Error;

/// The result of an authentication attempt, or of the `none` probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server accepted the attempt.
    Complete,
    /// The server rejected the attempt outright. `partial` is always
    /// `false` here; a partial success is surfaced as
    /// [`Outcome::FurtherRequired`] instead.
    Failed { methods: Vec<String>, partial: bool },
    /// The attempt just made *did* contribute (a `FAILURE` with the
    /// partial-success bit set); the caller may continue with one of
    /// `methods`.
    FurtherRequired { methods: Vec<String> },
    /// The method abandoned the attempt locally, without involving the
    /// server (e.g. a dismissed prompt).
    Cancelled,
    /// Initial/neutral state before any request has been made.
    Ready,
}

/// Drives the `SSH_MSG_USERAUTH_*` dialogue over a [`TransportPort`].
///
/// The driver is the sole reader of inbound auth-range messages; methods
/// never touch the transport directly, only through the
/// [`MethodHandle`] lent to them for the span of one `run` call.
pub struct Driver {
    transport: Box<dyn TransportPort>,
    banner_sink: Option<Box<dyn BannerSink>>,
    state: Outcome,
    session_id: Vec<u8>,
    authenticated: bool,
}

impl Driver {
    /// Start the `ssh-userauth` service over `transport` and capture the
    /// session identifier. Fails with [`Error::ServiceRejected`] if the
    /// peer refuses the service.
    pub async fn new(mut transport: Box<dyn TransportPort>) -> Result<Self, Error> {
        transport.start_service("ssh-userauth").await?;
        let session_id = transport.session_identifier().to_vec();
        Ok(Driver {
            transport,
            banner_sink: None,
            state: Outcome::Failed {
                methods: Vec::new(),
                partial: false,
            },
            session_id,
            authenticated: false,
        })
    }

    /// Register a sink for `SSH_MSG_USERAUTH_BANNER` text. Replaces any
    /// previously-registered sink.
    pub fn set_banner_sink(&mut self, sink: Box<dyn BannerSink>) {
        self.banner_sink = Some(sink);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn session_identifier(&self) -> &[u8] {
        &self.session_id
    }

    /// Send the `"none"` probe and return the methods the server allows.
    /// If the server grants an empty-auth `SUCCESS` instead, the driver
    /// marks itself authenticated and returns an empty list.
    pub async fn list_methods(
        &mut self,
        username: &str,
        service: &str,
    ) -> Result<Vec<String>, Error> {
        if self.authenticated {
            return Ok(Vec::new());
        }

        self.send_request(username, service, "none", &[]).await?;
        match self.read_message().await? {
            ReadSignal::Terminal(Outcome::Complete) => {
                log::debug!("none probe accepted, empty auth allowed");
                Ok(Vec::new())
            }
            ReadSignal::Terminal(Outcome::Failed { methods, .. }) => {
                log::debug!("methods offered by server: {methods:?}");
                Ok(methods)
            }
            ReadSignal::Terminal(Outcome::FurtherRequired { methods }) => Ok(methods),
            ReadSignal::Terminal(other) => {
                self.protocol_violation("unexpected outcome for the none probe")
                    .await;
                log::error!("none probe produced an impossible outcome: {other:?}");
                Err(Error::ProtocolViolation(
                    "unexpected outcome for the none probe".into(),
                ))
            }
            ReadSignal::Message(buf) => {
                self.protocol_violation("unexpected message code answering the none probe")
                    .await;
                Err(Error::ProtocolViolation(format!(
                    "unexpected message code {} answering the none probe",
                    buf.first().copied().unwrap_or(0)
                )))
            }
        }
    }

    /// Run one authentication method to completion.
    ///
    /// Once [`Self::is_authenticated`] is true, this is an idempotent
    /// no-op that returns [`Outcome::Complete`] without touching the
    /// transport.
    pub async fn authenticate(&mut self, mut method: Box<dyn Method>) -> Result<Outcome, Error> {
        if self.authenticated {
            return Ok(Outcome::Complete);
        }

        let username = method.username().to_string();
        let service = method.service().to_string();
        let method_name = method.name();
        log::debug!("authenticate: method `{method_name}`");

        let run_result = {
            let mut handle = MethodHandle::new(self, username, service, method_name);
            method.run(&mut handle).await
        };

        let outcome = match run_result {
            Ok(Some(outcome)) => outcome,
            Ok(None) => match self.read_message().await? {
                ReadSignal::Terminal(outcome) => outcome,
                ReadSignal::Message(buf) => {
                    self.protocol_violation("unexpected message after method completion")
                        .await;
                    return Err(Error::ProtocolViolation(format!(
                        "unexpected message code {} after method `{}` completed",
                        buf.first().copied().unwrap_or(0),
                        method_name
                    )));
                }
            },
            Err(e @ Error::ProtocolViolation(_)) => {
                self.protocol_violation("method reported a protocol violation")
                    .await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        log::debug!("method `{method_name}` finished: {outcome:?}");
        self.state = outcome.clone();
        Ok(outcome)
    }

    pub(crate) async fn send_request(
        &mut self,
        username: &str,
        service: &str,
        method_name: &str,
        method_data: &[u8],
    ) -> Result<(), Error> {
        log::debug!("sending userauth request, method `{method_name}`");
        let mut payload = Vec::new();
        payload.write_byte(msg::USERAUTH_REQUEST);
        payload.write_string(username.as_bytes());
        payload.write_string(service.as_bytes());
        payload.write_string(method_name.as_bytes());
        payload.extend_from_slice(method_data);
        self.transport.send_message(&payload, false).await
    }

    pub(crate) async fn send_raw(&mut self, code: u8, data: &[u8]) -> Result<(), Error> {
        log::debug!("sending raw userauth message, code {code}");
        let mut payload = Vec::new();
        payload.write_byte(code);
        payload.extend_from_slice(data);
        self.transport.send_message(&payload, false).await
    }

    /// Pump `next_message` until a non-banner payload arrives, absorbing
    /// banners into the sink as they pass through. `SUCCESS`/`FAILURE`
    /// are raised as a [`ReadSignal::Terminal`] rather than returned as
    /// bytes, so the caller never has to special-case them.
    ///
    /// Any `ProtocolViolation` raised while decoding (a truncated
    /// `FAILURE` name-list, bad UTF-8 in a banner, an empty payload) is
    /// disconnected here, at the one place all such errors funnel
    /// through, rather than leaving it to each call site.
    pub(crate) async fn read_message(&mut self) -> Result<ReadSignal, Error> {
        match self.read_message_inner().await {
            Ok(signal) => Ok(signal),
            Err(e @ Error::ProtocolViolation(_)) => {
                self.protocol_violation("malformed message").await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn read_message_inner(&mut self) -> Result<ReadSignal, Error> {
        loop {
            let buf = self.transport.next_message().await?;
            let code = *buf.first().ok_or_else(|| {
                Error::ProtocolViolation("empty message payload".into())
            })?;

            match code {
                msg::USERAUTH_BANNER => {
                    let mut r = Reader::new(&buf[1..]);
                    let text = r.read_utf8()?;
                    let language = r.read_utf8()?;
                    log::debug!("userauth_banner ({language})");
                    if let Some(sink) = self.banner_sink.as_mut() {
                        sink.display_banner(text, language);
                    }
                    continue;
                }
                msg::USERAUTH_SUCCESS => {
                    log::debug!("userauth_success");
                    if !self.authenticated {
                        self.authenticated = true;
                        self.transport.mark_authenticated();
                    }
                    return Ok(ReadSignal::Terminal(Outcome::Complete));
                }
                msg::USERAUTH_FAILURE => {
                    let mut r = Reader::new(&buf[1..]);
                    let methods = r.read_name_list()?;
                    let partial = r.read_bool()?;
                    log::debug!("userauth_failure, partial={partial}");
                    let outcome = if partial {
                        Outcome::FurtherRequired { methods }
                    } else {
                        Outcome::Failed {
                            methods,
                            partial: false,
                        }
                    };
                    return Ok(ReadSignal::Terminal(outcome));
                }
                _ => {
                    log::debug!("method-specific message, code {code}");
                    return Ok(ReadSignal::Message(buf));
                }
            }
        }
    }

    async fn protocol_violation(&mut self, reason: &str) {
        log::debug!("protocol violation: {reason}");
        self.transport
            .disconnect(DisconnectCode::ProtocolError, reason)
            .await;
    }
}
