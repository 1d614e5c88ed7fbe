// Copyright 2025 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Byte framing of requests and responses.
//!
//! Every message starts with a fixed-size little-endian header. A request header is followed by the key (PUT, GET,
//! EVICT) and the value (PUT only). A response header is followed by the value only for a successful GET.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Error, Result};

/// Request code on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCode {
    /// Insert or overwrite an entry.
    Put,
    /// Look up an entry.
    Get,
    /// Remove an entry.
    Evict,
    /// Remove all entries.
    Clear,
    /// Any code the server does not recognize.
    Unknown(u8),
}

impl RequestCode {
    const PUT: u8 = 0x01;
    const GET: u8 = 0x02;
    const EVICT: u8 = 0x04;
    const CLEAR: u8 = 0x08;

    /// Whether the request carries a key payload.
    pub fn has_key(&self) -> bool {
        matches!(self, Self::Put | Self::Get | Self::Evict)
    }

    /// Whether the request carries a value payload.
    pub fn has_value(&self) -> bool {
        matches!(self, Self::Put)
    }
}

impl From<u8> for RequestCode {
    fn from(code: u8) -> Self {
        match code {
            Self::PUT => Self::Put,
            Self::GET => Self::Get,
            Self::EVICT => Self::Evict,
            Self::CLEAR => Self::Clear,
            code => Self::Unknown(code),
        }
    }
}

impl From<RequestCode> for u8 {
    fn from(code: RequestCode) -> Self {
        match code {
            RequestCode::Put => RequestCode::PUT,
            RequestCode::Get => RequestCode::GET,
            RequestCode::Evict => RequestCode::EVICT,
            RequestCode::Clear => RequestCode::CLEAR,
            RequestCode::Unknown(code) => code,
        }
    }
}

/// Response code on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// The request succeeded.
    Ok,
    /// The request code is not recognized.
    Unsupported,
    /// The request is malformed or could not be applied.
    BadRequest,
    /// The requested key is absent.
    NotFound,
}

impl ResponseCode {
    const OK: u32 = 200;
    const UNSUPPORTED: u32 = 220;
    const BAD_REQUEST: u32 = 400;
    const NOT_FOUND: u32 = 404;
}

impl TryFrom<u32> for ResponseCode {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            Self::OK => Ok(Self::Ok),
            Self::UNSUPPORTED => Ok(Self::Unsupported),
            Self::BAD_REQUEST => Ok(Self::BadRequest),
            Self::NOT_FOUND => Ok(Self::NotFound),
            code => Err(Error::Protocol(format!("unknown response code: {code}"))),
        }
    }
}

impl From<ResponseCode> for u32 {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::Ok => ResponseCode::OK,
            ResponseCode::Unsupported => ResponseCode::UNSUPPORTED,
            ResponseCode::BadRequest => ResponseCode::BAD_REQUEST,
            ResponseCode::NotFound => ResponseCode::NOT_FOUND,
        }
    }
}

/// Fixed-size request header.
///
/// # Format
///
/// ```plain
/// | code (1B) | key size (4B) | value size (4B) |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Request code.
    pub code: RequestCode,
    /// Key payload size in bytes.
    pub key_size: u32,
    /// Value payload size in bytes.
    pub value_size: u32,
}

impl RequestHeader {
    /// Serialized header size in bytes.
    pub const fn serialized_len() -> usize {
        1 + 4 + 4
    }

    /// Encode the header into `buf`.
    pub fn write(&self, mut buf: impl BufMut) {
        buf.put_u8(self.code.into());
        buf.put_u32_le(self.key_size);
        buf.put_u32_le(self.value_size);
    }

    /// Decode a header from `buf`, which must hold at least [`RequestHeader::serialized_len`] bytes.
    pub fn read(mut buf: impl Buf) -> Self {
        let code = RequestCode::from(buf.get_u8());
        let key_size = buf.get_u32_le();
        let value_size = buf.get_u32_le();
        Self {
            code,
            key_size,
            value_size,
        }
    }

    /// Read exactly one header from `reader`.
    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut buf = [0; Self::serialized_len()];
        reader.read_exact(&mut buf)?;
        Ok(Self::read(&buf[..]))
    }
}

/// Fixed-size response header.
///
/// # Format
///
/// ```plain
/// | code (4B) | value size (4B) |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Response code.
    pub code: ResponseCode,
    /// Value size in bytes.
    pub value_size: u32,
}

impl ResponseHeader {
    /// Serialized header size in bytes.
    pub const fn serialized_len() -> usize {
        4 + 4
    }

    /// Encode the header into `buf`.
    pub fn write(&self, mut buf: impl BufMut) {
        buf.put_u32_le(self.code.into());
        buf.put_u32_le(self.value_size);
    }

    /// Decode a header from `buf`, which must hold at least [`ResponseHeader::serialized_len`] bytes.
    pub fn read(mut buf: impl Buf) -> Result<Self> {
        let code = ResponseCode::try_from(buf.get_u32_le())?;
        let value_size = buf.get_u32_le();
        Ok(Self { code, value_size })
    }

    /// Encode the header followed by `payload` into a new buffer.
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::serialized_len() + payload.len());
        self.write(&mut buf);
        buf.put_slice(payload);
        buf
    }

    /// Write the header followed by `payload` to `writer`.
    pub fn write_to(&self, writer: &mut impl Write, payload: &[u8]) -> Result<()> {
        writer.write_all(&self.encode(payload))?;
        Ok(())
    }
}

/// Read a `size` bytes payload from `reader`.
pub fn read_payload(reader: &mut impl Read, size: u32) -> Result<Bytes> {
    let mut buf = vec![0; size as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf.into())
}

/// Write a whole request to `writer`. Payloads the code does not carry are ignored.
pub fn write_request(writer: &mut impl Write, code: RequestCode, key: &[u8], value: &[u8]) -> Result<()> {
    let key = if code.has_key() { key } else { &[] };
    let value = if code.has_value() { value } else { &[] };
    let header = RequestHeader {
        code,
        key_size: key.len() as u32,
        value_size: value.len() as u32,
    };
    let mut buf = Vec::with_capacity(RequestHeader::serialized_len() + key.len() + value.len());
    header.write(&mut buf);
    buf.put_slice(key);
    buf.put_slice(value);
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

/// Read a whole response from `reader`.
///
/// The value is only present on the wire for a successful GET, so the caller tells whether to expect it.
pub fn read_response(reader: &mut impl Read, with_value: bool) -> Result<(ResponseHeader, Bytes)> {
    let mut buf = [0; ResponseHeader::serialized_len()];
    reader.read_exact(&mut buf)?;
    let header = ResponseHeader::read(&buf[..])?;
    let value = if with_value && header.code == ResponseCode::Ok {
        read_payload(reader, header.value_size)?
    } else {
        Bytes::new()
    };
    Ok((header, value))
}
