use std::ops::ControlFlow;

use bytes::BytesMut;

use crate::codec::{packets, Error, Parser, RawPacketDecoder, Validator, Writer};
use crate::policy::Action;

#[derive(Debug, PartialEq)]
pub struct Packet {
    pub species: String,
    pub action: Action,
}

impl Packet {
    pub(crate) fn write_packet(&self) -> Vec<u8> {
        let mut writer = Writer::new(0x55);

        writer.write_str(&self.species);
        writer.write_u8(self.action.to_byte());

        writer.finalize()
    }

    #[must_use]
    pub fn new(species: impl Into<String>, action: Action) -> Self {
        Self {
            species: species.into(),
            action,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct PacketDecoder;

impl RawPacketDecoder for PacketDecoder {
    type Decoded<'a> = Result<Packet, Error>;

    fn decode(data: &[u8]) -> Self::Decoded<'_> {
        let mut parser = Parser::new(data);

        parser.read_u8();
        parser.read_u32();
        let species = parser.read_str();
        let action_byte = parser.read_u8();
        let action = Action::from_byte(action_byte).ok_or(Error::InvalidFrame)?;

        Ok(Packet::new(species, action))
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

    if let ControlFlow::Break(b) = validator.validate_u8() {
        return b;
    }

    if let ControlFlow::Break(b) = validator.validate_checksum() {
        return b;
    }

    let raw_packet = validator.raw_packet::<PacketDecoder>()?;

    Ok(Some(raw_packet.decode()?.into()))
}

#[cfg(test)]
mod tests {
    use futures::{SinkExt, TryStreamExt};

    use tokio_util::codec::{FramedRead, FramedWrite};

    use crate::codec::packets::PacketCodec;
    use crate::tests::init_tracing_subscriber;

    use super::*;

    const DATA: &[u8] = &[
        0x55, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00, 0x03, 0x64, 0x6f, 0x67, 0x90, 0xd0,
    ];

    #[tokio::test]
    async fn test_read() {
        init_tracing_subscriber();

        let mut reader = FramedRead::new(DATA, PacketCodec::new());

        let packets::Packet::CreatePolicy(raw_packet) = reader.try_next().await.unwrap().unwrap()
        else {
            panic!("invalid packet");
        };

        assert_eq!(Packet::new("dog", Action::Cull), raw_packet);
    }

    #[tokio::test]
    async fn test_write() {
        init_tracing_subscriber();

        let mut buffer = vec![];
        {
            let mut writer = FramedWrite::new(&mut buffer, PacketCodec::new());

            writer
                .send(Packet::new("dog", Action::Cull).into())
                .await
                .unwrap();
        }

        assert_eq!(DATA, buffer);
    }

    #[tokio::test]
    async fn test_rejects_invalid_action_byte() {
        init_tracing_subscriber();

        let mut data = BytesMut::from(DATA);
        data[12] = 0x01;
        let last = data.len() - 1;
        data[last] = 0;
        let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        data[last] = sum.wrapping_neg();

        let mut reader = FramedRead::new(&data[..], PacketCodec::new());
        assert!(reader.try_next().await.is_err());
    }
}
