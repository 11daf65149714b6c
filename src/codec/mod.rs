//! Framed binary wire codec for the pest control protocol.
//!
//! Every message is `type(1) | length(4, BE) | body | checksum(1)`, where
//! `length` is the total frame length and `checksum` is chosen so the
//! unsigned byte sum of the whole frame is `0 mod 256`.

use std::marker::PhantomData;
use std::ops::ControlFlow;

use bytes::{Buf, BufMut, BytesMut};

pub mod packets;

pub use packets::{Packet, PacketCodec};

/// Largest frame this codec will ever buffer, to bound memory use against a
/// hostile or buggy peer declaring an enormous `length`.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid frame")]
    InvalidFrame,
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    FrameTooLarge(usize, usize),
    #[error("unknown packet type 0x{0:02x}")]
    UnknownPacket(u8),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A decoder for one message's body, operating on the full raw frame bytes
/// (type, length, body and checksum all included; the decoder re-derives its
/// own field offsets, matching how each packet's `write_packet` builds its
/// own frame).
pub(crate) trait RawPacketDecoder {
    type Decoded<'a>;

    fn decode(data: &[u8]) -> Self::Decoded<'_>;
}

/// A frame that has already passed structural validation (type, length,
/// per-field bounds, checksum), paired with the typed decoder that knows how
/// to interpret its body.
pub(crate) struct RawPacket<D> {
    data: BytesMut,
    _decoder: PhantomData<D>,
}

impl<D: RawPacketDecoder> RawPacket<D> {
    pub(crate) fn decode(&self) -> D::Decoded<'_> {
        D::decode(&self.data)
    }
}

/// Validates a frame incrementally, field by field, advancing a cursor over
/// the buffered bytes. Each `validate_*` call both checks that enough bytes
/// are currently buffered for that field and advances past it; a caller
/// strings together the calls matching its message's body shape, ending with
/// [`Validator::validate_checksum`], which also verifies no bytes were left
/// unconsumed before the trailing checksum byte.
pub(crate) struct Validator<'a> {
    src: &'a mut BytesMut,
    length: usize,
    cursor: usize,
    max_frame_len: usize,
}

type Step<T = ()> = ControlFlow<Result<Option<Packet>, Error>, T>;

impl<'a> Validator<'a> {
    pub(crate) fn new(src: &'a mut BytesMut, max_frame_len: usize) -> Self {
        Self {
            src,
            length: 0,
            cursor: 0,
            max_frame_len,
        }
    }

    pub(crate) fn validate_type(&mut self) -> Step {
        if self.src.is_empty() {
            return ControlFlow::Break(Ok(None));
        }
        self.cursor = 1;
        ControlFlow::Continue(())
    }

    pub(crate) fn validate_length(&mut self) -> Step {
        if self.src.len() < 5 {
            return ControlFlow::Break(Ok(None));
        }

        let length = u32::from_be_bytes(self.src[1..5].try_into().unwrap()) as usize;

        if length < 6 {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }

        if length > self.max_frame_len {
            return ControlFlow::Break(Err(Error::FrameTooLarge(length, self.max_frame_len)));
        }

        if self.src.len() < length {
            return ControlFlow::Break(Ok(None));
        }

        self.length = length;
        self.cursor = 5;
        ControlFlow::Continue(())
    }

    /// Bytes remaining between the cursor and the trailing checksum byte.
    fn remaining(&self) -> usize {
        (self.length - 1).saturating_sub(self.cursor)
    }

    pub(crate) fn validate_u8(&mut self) -> Step {
        if self.remaining() < 1 {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }
        self.cursor += 1;
        ControlFlow::Continue(())
    }

    pub(crate) fn validate_u32(&mut self) -> Step {
        if self.remaining() < 4 {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }
        self.cursor += 4;
        ControlFlow::Continue(())
    }

    pub(crate) fn validate_str(&mut self) -> Step {
        if self.remaining() < 4 {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }
        let len_offset = self.cursor;
        let str_len =
            u32::from_be_bytes(self.src[len_offset..len_offset + 4].try_into().unwrap()) as usize;
        self.cursor += 4;

        if self.remaining() < str_len {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }
        self.cursor += str_len;
        ControlFlow::Continue(())
    }

    /// Validates `count: u32` followed by `count` repetitions of one field,
    /// described by `element`, which should call the matching `validate_*`
    /// methods for that element's shape and propagate any `Break`.
    pub(crate) fn validate_array(
        &mut self,
        mut element: impl FnMut(&mut Self) -> Step,
    ) -> Step {
        if self.remaining() < 4 {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }
        let count_offset = self.cursor;
        let count =
            u32::from_be_bytes(self.src[count_offset..count_offset + 4].try_into().unwrap());
        self.cursor += 4;

        for _ in 0..count {
            match element(self) {
                ControlFlow::Continue(()) => {}
                ControlFlow::Break(b) => return ControlFlow::Break(b),
            }
        }

        ControlFlow::Continue(())
    }

    pub(crate) fn validate_checksum(&mut self) -> Step {
        if self.cursor != self.length - 1 {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }

        let sum = self.src[..self.length]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b));

        if sum != 0 {
            return ControlFlow::Break(Err(Error::InvalidFrame));
        }

        ControlFlow::Continue(())
    }

    pub(crate) fn raw_packet<D>(self) -> Result<RawPacket<D>, Error> {
        let data = self.src.split_to(self.length);
        Ok(RawPacket {
            data,
            _decoder: PhantomData,
        })
    }
}

/// Cursor-based reader for a validated frame's typed fields. `Validator` has
/// already proven the bytes are present; `Parser` just extracts them.
pub(crate) struct Parser<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    pub(crate) fn read_u8(&mut self) -> u8 {
        let v = self.data[self.cursor];
        self.cursor += 1;
        v
    }

    pub(crate) fn read_u32(&mut self) -> u32 {
        let v = u32::from_be_bytes(self.data[self.cursor..self.cursor + 4].try_into().unwrap());
        self.cursor += 4;
        v
    }

    pub(crate) fn read_str(&mut self) -> String {
        let len = self.read_u32() as usize;
        let s = String::from_utf8_lossy(&self.data[self.cursor..self.cursor + len]).into_owned();
        self.cursor += len;
        s
    }

    pub(crate) fn read_array<T>(&mut self, mut element: impl FnMut(&mut Self) -> T) -> Vec<T> {
        let count = self.read_u32();
        (0..count).map(|_| element(self)).collect()
    }
}

/// Accumulates an outgoing message body, then wraps it in the frame header
/// (type, length) and trailing checksum on [`Writer::finalize`].
pub(crate) struct Writer {
    msg_type: u8,
    body: BytesMut,
}

impl Writer {
    pub(crate) fn new(msg_type: u8) -> Self {
        Self {
            msg_type,
            body: BytesMut::new(),
        }
    }

    pub(crate) fn write_u8(&mut self, v: u8) -> &mut Self {
        self.body.put_u8(v);
        self
    }

    pub(crate) fn write_u32(&mut self, v: u32) -> &mut Self {
        self.body.put_u32(v);
        self
    }

    pub(crate) fn write_str(&mut self, v: &str) -> &mut Self {
        // A single field can't exceed the frame length limit, which is
        // itself bounded well under u32::MAX (see DEFAULT_MAX_FRAME_LEN).
        #[allow(clippy::cast_possible_truncation)]
        self.body.put_u32(v.len() as u32);
        self.body.put_slice(v.as_bytes());
        self
    }

    pub(crate) fn write_array<T>(&mut self, items: &[T], mut element: impl FnMut(&mut Self, &T)) -> &mut Self {
        // Same bound as write_str: an array body can't outgrow the frame
        // length limit.
        #[allow(clippy::cast_possible_truncation)]
        self.body.put_u32(items.len() as u32);
        for item in items {
            element(self, item);
        }
        self
    }

    pub(crate) fn finalize(self) -> Vec<u8> {
        let total_len = 1 + 4 + self.body.len() + 1;

        let mut frame = BytesMut::with_capacity(total_len);
        frame.put_u8(self.msg_type);
        // total_len is the body length (already bounded under u32::MAX) plus
        // a fixed 6-byte header/trailer.
        #[allow(clippy::cast_possible_truncation)]
        frame.put_u32(total_len as u32);
        frame.put_slice(&self.body);

        let checksum = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)).wrapping_neg();
        frame.put_u8(checksum);

        frame.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_sums_to_zero() {
        let frame = Writer::new(0x52).finalize();
        let sum = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(sum, 0);
    }

    #[test]
    fn length_rejects_short_declared_length() {
        let mut buf = BytesMut::from(&[0x52u8, 0x00, 0x00, 0x00, 0x05, 0x00][..]);
        let mut validator = Validator::new(&mut buf, DEFAULT_MAX_FRAME_LEN);
        assert!(validator.validate_type().is_continue());
        let result = validator.validate_length();
        assert!(matches!(result, ControlFlow::Break(Err(Error::InvalidFrame))));
    }

    #[test]
    fn length_rejects_oversized_frame() {
        let mut buf = BytesMut::from(&[0x52u8, 0x00, 0x10, 0x00, 0x00][..]);
        let mut validator = Validator::new(&mut buf, DEFAULT_MAX_FRAME_LEN);
        assert!(validator.validate_type().is_continue());
        let result = validator.validate_length();
        assert!(matches!(
            result,
            ControlFlow::Break(Err(Error::FrameTooLarge(_, _)))
        ));
    }
}
