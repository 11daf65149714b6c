use std::ops::ControlFlow;

use bytes::BytesMut;

use crate::codec::{packets, Error, Parser, RawPacketDecoder, Validator, Writer};

/// The protocol name every `Hello` must carry.
pub const PROTOCOL: &str = "pestcontrol";

/// The only protocol version this coordinator speaks.
pub const VERSION: u32 = 1;

#[derive(Debug, PartialEq)]
pub struct Packet {
    pub protocol: String,
    pub version: u32,
}

impl Packet {
    pub(crate) fn write_packet(&self) -> Vec<u8> {
        let mut writer = Writer::new(0x50);

        writer.write_str(&self.protocol);
        writer.write_u32(self.version);

        writer.finalize()
    }

    #[must_use]
    pub fn new(protocol: impl Into<String>, version: u32) -> Self {
        Self {
            protocol: protocol.into(),
            version,
        }
    }

    /// The `Hello(pestcontrol, 1)` both sides of this protocol must send.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(PROTOCOL, VERSION)
    }

    /// Whether this is the one handshake both peers are required to agree
    /// on; anything else is an `AuthorityProtocolError`/inbound `Error`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.protocol == PROTOCOL && self.version == VERSION
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
        let protocol = parser.read_str();
        let version = parser.read_u32();

        Packet::new(protocol, version)
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

    if let ControlFlow::Break(b) = validator.validate_str() {
        return b;
    }

    if let ControlFlow::Break(b) = validator.validate_u32() {
        return b;
    }

    if let ControlFlow::Break(b) = validator.validate_checksum() {
        return b;
    }

    let raw_packet = validator.raw_packet::<PacketDecoder>()?;

    Ok(Some(raw_packet.decode().into()))
}

#[cfg(test)]
mod tests {
    use futures::{SinkExt, TryStreamExt};

    use tokio_util::codec::{FramedRead, FramedWrite};

    use crate::codec::packets::PacketCodec;
    use crate::tests::init_tracing_subscriber;

    use super::*;

    const DATA: &[u8] = &[
        0x50, 0x00, 0x00, 0x00, 0x19, 0x00, 0x00, 0x00, 0x0b, 0x70, 0x65, 0x73, 0x74, 0x63, 0x6f,
        0x6e, 0x74, 0x72, 0x6f, 0x6c, 0x00, 0x00, 0x00, 0x01, 0xce,
    ];

    #[tokio::test]
    async fn test_read() {
        init_tracing_subscriber();

        let mut reader = FramedRead::new(DATA, PacketCodec::new());

        let packets::Packet::Hello(raw_packet) = reader.try_next().await.unwrap().unwrap() else {
            panic!("invalid packet");
        };

        assert_eq!(Packet::standard(), raw_packet);
    }

    #[tokio::test]
    async fn test_write() {
        init_tracing_subscriber();

        let mut buffer = vec![];
        {
            let mut writer = FramedWrite::new(&mut buffer, PacketCodec::new());

            writer.send(Packet::standard().into()).await.unwrap();
        }

        assert_eq!(DATA, buffer);
    }

    #[test]
    fn rejects_wrong_protocol() {
        assert!(!Packet::new("wrong", 1).is_valid());
    }

    #[test]
    fn rejects_wrong_version() {
        assert!(!Packet::new(PROTOCOL, 2).is_valid());
    }
}
