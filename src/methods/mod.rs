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
//! The built-in `"none"`, `"password"`, `"publickey"` and
//! `"keyboard-interactive"` methods from RFC 4252 §5, §8, §7 and §3.2.

mod keyboard_interactive;
mod password;
mod publickey;

pub use keyboard_interactive::{KeyboardInteractive, Prompt, PromptCallback};
pub use password::Password;
pub use publickey::{signed_blob, Publickey, Signer};
