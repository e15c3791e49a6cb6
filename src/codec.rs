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
//! SSH binary packet fields: strings, booleans, 32-bit integers and
//! name-lists, as defined in RFC 4251 §5. Every method composes its
//! `method_data` on top of these primitives, so a single implementation
//! here keeps framing consistent across `password`, `publickey` and
//! `keyboard-interactive`.

use byteorder::{BigEndian, ByteOrder};
use cryptovec::CryptoVec;

/// Push SSH-encoded fields onto a growable byte buffer.
///
/// Implemented for both `Vec<u8>` (plain payloads) and [`CryptoVec`]
/// (payloads carrying secret material, which must be zeroed on drop).
pub trait WireWrite {
    fn write_byte(&mut self, v: u8);
    fn write_bool(&mut self, v: bool);
    fn write_u32(&mut self, v: u32);
    fn write_string(&mut self, s: &[u8]);
    fn write_mpint(&mut self, s: &[u8]);
    fn write_name_list<'a, I: IntoIterator<Item = &'a str>>(&mut self, names: I);
}

impl WireWrite for Vec<u8> {
    fn write_byte(&mut self, v: u8) {
        self.push(v);
    }

    fn write_bool(&mut self, v: bool) {
        self.push(v as u8);
    }

    fn write_u32(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, v);
        self.extend_from_slice(&buf);
    }

    fn write_string(&mut self, s: &[u8]) {
        self.write_u32(s.len() as u32);
        self.extend_from_slice(s);
    }

    fn write_mpint(&mut self, s: &[u8]) {
        let mut i = 0;
        while i < s.len() && s[i] == 0 {
            i += 1;
        }
        if i == s.len() {
            self.write_u32(0);
            return;
        }
        if s[i] & 0x80 != 0 {
            self.write_u32((s.len() - i + 1) as u32);
            self.push(0);
        } else {
            self.write_u32((s.len() - i) as u32);
        }
        self.extend_from_slice(&s[i..]);
    }

    fn write_name_list<'a, I: IntoIterator<Item = &'a str>>(&mut self, names: I) {
        let start = self.len();
        self.write_u32(0);
        let mut first = true;
        for name in names {
            if !first {
                self.push(b',');
            } else {
                first = false;
            }
            self.extend_from_slice(name.as_bytes());
        }
        let len = (self.len() - start - 4) as u32;
        BigEndian::write_u32(&mut self[start..start + 4], len);
    }
}

impl WireWrite for CryptoVec {
    fn write_byte(&mut self, v: u8) {
        self.push(v);
    }

    fn write_bool(&mut self, v: bool) {
        self.push(v as u8);
    }

    fn write_u32(&mut self, v: u32) {
        self.push_u32_be(v);
    }

    fn write_string(&mut self, s: &[u8]) {
        self.push_u32_be(s.len() as u32);
        self.extend(s);
    }

    fn write_mpint(&mut self, s: &[u8]) {
        let mut i = 0;
        while i < s.len() && s[i] == 0 {
            i += 1;
        }
        if i == s.len() {
            self.push_u32_be(0);
            return;
        }
        if s[i] & 0x80 != 0 {
            self.push_u32_be((s.len() - i + 1) as u32);
            self.push(0);
        } else {
            self.push_u32_be((s.len() - i) as u32);
        }
        self.extend(&s[i..]);
    }

    fn write_name_list<'a, I: IntoIterator<Item = &'a str>>(&mut self, names: I) {
        let start = self.len();
        self.push_u32_be(0);
        let mut first = true;
        for name in names {
            if !first {
                self.push(b',');
            } else {
                first = false;
            }
            self.extend(name.as_bytes());
        }
        let len = (self.len() - start - 4) as u32;
        BigEndian::write_u32(&mut self[start..start + 4], len);
    }
}

/// Errors produced while decoding a field out of a packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated payload")]
    Truncated,
    #[error("invalid utf-8 in string field")]
    BadUtf8,
    #[error("length prefix overflows the buffer")]
    LengthOverflow,
}

/// A bounds-checked cursor over a decrypted payload.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self.buf.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        if self.pos + 4 > self.buf.len() {
            return Err(DecodeError::Truncated);
        }
        let v = BigEndian::read_u32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_string(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_u32()? as usize;
        let end = self.pos.checked_add(len).ok_or(DecodeError::LengthOverflow)?;
        if end > self.buf.len() {
            return Err(DecodeError::Truncated);
        }
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    pub fn read_utf8(&mut self) -> Result<&'a str, DecodeError> {
        std::str::from_utf8(self.read_string()?).map_err(|_| DecodeError::BadUtf8)
    }

    pub fn read_mpint(&mut self) -> Result<&'a [u8], DecodeError> {
        self.read_string()
    }

    /// Read a comma-separated name-list; an empty string decodes to an
    /// empty list.
    pub fn read_name_list(&mut self) -> Result<Vec<String>, DecodeError> {
        let s = self.read_utf8()?;
        if s.is_empty() {
            return Ok(Vec::new());
        }
        Ok(s.split(',').map(str::to_string).collect())
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}
