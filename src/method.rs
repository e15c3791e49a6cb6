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
//! The contract each authentication method implements, and the handle the
//! driver lends it for the duration of a single [`Driver::authenticate`]
//! call.
//!
//! [`Driver::authenticate`]: crate::driver::Driver::authenticate

use crate::driver::{Driver, Outcome};
use crate::Error;

/// What [`MethodHandle::read_message`] produced: either a method-specific
/// payload to keep decoding, or a terminal outcome (`SUCCESS`/`FAILURE`)
/// that short-circuits the method's own control flow. This is the
/// "raise an outcome instead of unwinding a call stack" strategy: the
/// method matches on the result and returns immediately on `Terminal`.
#[derive(Debug)]
pub enum ReadSignal {
    Message(Vec<u8>),
    Terminal(Outcome),
}

/// One authentication mechanism (`password`, `publickey`,
/// `keyboard-interactive`, ...).
///
/// A method may locally cancel by returning `Ok(Some(Outcome::Cancelled))`
/// without ever reading a response — for example when a UI prompt is
/// dismissed. Returning `Ok(None)` tells the driver "I've sent everything
/// I need to; read the final response yourself", which is the common case
/// for a method whose last request is unconditionally terminal.
#[async_trait::async_trait]
pub trait Method: Send {
    /// The wire name of this method, e.g. `"password"`.
    fn name(&self) -> &'static str;

    fn username(&self) -> &str;

    fn service(&self) -> &str;

    async fn run(&mut self, handle: &mut MethodHandle<'_>) -> Result<Option<Outcome>, Error>;
}

/// Borrowed, scoped access to the driver for the duration of one method's
/// `run`. Modeled as a borrow rather than shared ownership so the
/// exclusive-use invariant (only the driver reads the transport) is
/// enforced by the type system, not by convention.
pub struct MethodHandle<'a> {
    pub(crate) driver: &'a mut Driver,
    pub(crate) username: String,
    pub(crate) service: String,
    pub(crate) method_name: &'static str,
}

impl<'a> MethodHandle<'a> {
    pub(crate) fn new(
        driver: &'a mut Driver,
        username: String,
        service: String,
        method_name: &'static str,
    ) -> Self {
        MethodHandle {
            driver,
            username,
            service,
            method_name,
        }
    }

    /// Format and send `SSH_MSG_USERAUTH_REQUEST` with this method's name
    /// and the given `method_data`.
    pub async fn send_request(&mut self, method_data: &[u8]) -> Result<(), Error> {
        self.driver
            .send_request(&self.username, &self.service, self.method_name, method_data)
            .await
    }

    /// Send a raw payload with an explicit message code, bypassing the
    /// `SSH_MSG_USERAUTH_REQUEST` framing. Used by `keyboard-interactive`
    /// for `SSH_MSG_USERAUTH_INFO_RESPONSE`, which is not itself a
    /// user-auth request.
    pub async fn send_raw(&mut self, code: u8, data: &[u8]) -> Result<(), Error> {
        self.driver.send_raw(code, data).await
    }

    /// Read the next non-banner payload, or the terminal outcome if one
    /// arrived first.
    pub async fn read_message(&mut self) -> Result<ReadSignal, Error> {
        self.driver.read_message().await
    }

    pub fn session_identifier(&self) -> &[u8] {
        self.driver.session_identifier()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}
