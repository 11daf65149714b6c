use std::ops::ControlFlow;

use bytes::BytesMut;

use crate::codec::{packets, Error, Parser, RawPacketDecoder, Validator, Writer};

#[derive(Debug, PartialEq)]
pub struct Packet;

impl Packet {
    pub(crate) fn write_packet(&self) -> Vec<u8> {
        Writer::new(0x52).finalize()
    }

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq)]
pub struct PacketDecoder;

impl RawPacketDecoder for PacketDecoder {
    type Decoded<'a> = Packet;

    fn decode(data: &[u8]) -> Self::Decoded<'_> {
        let mut parser = Parser::new(data);

        parser.read_u8();
        parser.read_u32();

        Packet::new()
    }
}

pub(crate) fn read_packet(
    src: &mut BytesMut,
    max_frame_len: usize,
) -> Result<Option<packets::Packet>, Error> {
    let mut validator = Validator::new(src, max_frame_len);

    if let ControlFlow::Break(b) = validator.validate_type() {
        return b;
    }

    if let ControlFlow::Break(b) = validator.validate_length() {
        return b;
    }

    if let ControlFlow::Break(b) = validator.validate_checksum() {
        return b;
    }

    let raw_packet = validator.raw_packet::<PacketDecoder>()?;

    Ok(Some(raw_packet.decode().into()))
}
