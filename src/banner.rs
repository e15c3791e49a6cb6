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
//! Delivery of `SSH_MSG_USERAUTH_BANNER` text to the caller.

/// Receives banner text from the server. Invoked synchronously on the
/// driver's read loop, so a user can be shown the banner before the next
/// prompt; if no sink is registered the text is silently discarded rather
/// than written to standard output, keeping the library silent by default.
pub trait BannerSink: Send {
    fn display_banner(&mut self, text: &str, language: &str);
}

impl<F: FnMut(&str, &str) + Send> BannerSink for F {
    fn display_banner(&mut self, text: &str, language: &str) {
        self(text, language)
    }
}
