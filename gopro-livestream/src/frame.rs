//! Length-prefixed command framing.
//!
//! Every message exchanged over the command characteristics is laid out as
//!
//! ```text
//! [len] [feature_id] [action_id] [payload ...]
//! ```
//!
//! where `len` counts the bytes that follow it. Responses carry a status byte
//! right after the action id; `0x00` means success.
//!
//! BLE notifications may split one frame over several chunks or coalesce
//! several frames into one chunk, so decoding is incremental.

use crate::Error;

/// Feature id and action id.
const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    feature_id: u8,
    action_id: u8,
    payload: Vec<u8>,
}

impl Command {
    pub fn new(feature_id: u8, action_id: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            feature_id,
            action_id,
            payload: payload.into(),
        }
    }

    pub fn feature_id(&self) -> u8 {
        self.feature_id
    }

    pub fn action_id(&self) -> u8 {
        self.action_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serializes the command into a single frame.
    ///
    /// Fails with [`Error::Encoding`] when the frame would not fit the
    /// single-byte length prefix. Nothing is ever truncated.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let len = HEADER_LEN + self.payload.len();
        let prefix = u8::try_from(len).map_err(|_| Error::Encoding { len })?;

        let mut frame = Vec::with_capacity(1 + len);
        frame.push(prefix);
        frame.push(self.feature_id);
        frame.push(self.action_id);
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error(u8),
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0 => Status::Success,
            code => Status::Error(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub feature_id: u8,
    pub action_id: u8,
    pub status: Status,
    pub data: Vec<u8>,
}

impl ResponseFrame {
    /// Parses a frame body, i.e. everything after the length prefix.
    fn parse(body: &[u8]) -> Option<Self> {
        match body {
            [feature_id, action_id, status, data @ ..] => Some(Self {
                feature_id: *feature_id,
                action_id: *action_id,
                status: Status::from(*status),
                data: data.to_vec(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete frame. `remainder` holds whatever followed it and has to be
    /// fed into the next call.
    Frame {
        frame: ResponseFrame,
        remainder: Vec<u8>,
    },
    /// A complete frame whose body cannot hold feature, action and status.
    Malformed { len: usize, remainder: Vec<u8> },
    Incomplete,
}

/// Appends `chunk` to `buffer` and splits off the first frame if it is
/// complete.
///
/// On `Frame` and `Malformed` the frame bytes are consumed and `buffer` is
/// left empty; the bytes after the frame are handed back as `remainder`. On
/// `Incomplete` everything stays in `buffer`.
pub fn decode_chunk(buffer: &mut Vec<u8>, chunk: &[u8]) -> DecodeResult {
    buffer.extend_from_slice(chunk);

    let Some(&len) = buffer.first() else {
        return DecodeResult::Incomplete;
    };
    let end = 1 + usize::from(len);
    if buffer.len() < end {
        return DecodeResult::Incomplete;
    }

    let remainder = buffer.split_off(end);
    let frame = std::mem::take(buffer);

    match ResponseFrame::parse(&frame[1..]) {
        Some(frame) => DecodeResult::Frame { frame, remainder },
        None => DecodeResult::Malformed {
            len: usize::from(len),
            remainder,
        },
    }
}

/// Stateful wrapper around [`decode_chunk`] that carries the remainder from
/// one notification to the next.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one inbound chunk and returns every frame it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<ResponseFrame, Error>> {
        let mut frames = Vec::new();
        let mut chunk = chunk;

        loop {
            match decode_chunk(&mut self.buffer, chunk) {
                DecodeResult::Incomplete => break,
                DecodeResult::Frame { frame, remainder } => {
                    frames.push(Ok(frame));
                    self.buffer = remainder;
                }
                DecodeResult::Malformed { len, remainder } => {
                    frames.push(Err(Error::MalformedFrame { len }));
                    self.buffer = remainder;
                }
            }
            chunk = &[];
        }

        frames
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Colon separated hex, the way frames show up in logs.
pub(crate) fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
