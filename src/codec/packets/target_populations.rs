use std::ops::ControlFlow;

use bytes::BytesMut;

use crate::codec::{packets, Error, Parser, RawPacketDecoder, Validator, Writer};

#[derive(Debug, Clone, PartialEq)]
pub struct TargetBand {
    pub species: String,
    pub min: u32,
    pub max: u32,
}

impl TargetBand {
    #[must_use]
    pub fn new(species: impl Into<String>, min: u32, max: u32) -> Self {
        Self {
            species: species.into(),
            min,
            max,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Packet {
    pub site: u32,
    pub targets: Vec<TargetBand>,
}

impl Packet {
    pub(crate) fn write_packet(&self) -> Vec<u8> {
        let mut writer = Writer::new(0x54);

        writer.write_u32(self.site);
        writer.write_array(&self.targets, |writer, target| {
            writer
                .write_str(&target.species)
                .write_u32(target.min)
                .write_u32(target.max);
        });

        writer.finalize()
    }

    #[must_use]
    pub fn new(site: u32, targets: Vec<TargetBand>) -> Self {
        Self { site, targets }
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
        let site = parser.read_u32();
        let targets = parser.read_array(|parser| {
            let species = parser.read_str();
            let min = parser.read_u32();
            let max = parser.read_u32();
            TargetBand::new(species, min, max)
        });

        Packet::new(site, targets)
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

    if let ControlFlow::Break(b) = validator.validate_u32() {
        return b;
    }

    if let ControlFlow::Break(b) = validator.validate_array(|v| {
        if let ControlFlow::Break(b) = v.validate_str() {
            return ControlFlow::Break(b);
        }
        if let ControlFlow::Break(b) = v.validate_u32() {
            return ControlFlow::Break(b);
        }
        v.validate_u32()
    }) {
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

    #[tokio::test]
    async fn test_empty_targets_round_trips() {
        init_tracing_subscriber();

        let data = [
            0x54, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x9d,
        ]
        .as_slice();

        let mut reader = FramedRead::new(data, PacketCodec::new());
        let packets::Packet::TargetPopulations(raw_packet) =
            reader.try_next().await.unwrap().unwrap()
        else {
            panic!("invalid packet");
        };
        assert_eq!(Packet::new(1, vec![]), raw_packet);
    }

    #[tokio::test]
    async fn test_round_trip_with_targets() {
        init_tracing_subscriber();

        let packet = Packet::new(
            42,
            vec![
                TargetBand::new("rat", 0, 5),
                TargetBand::new("hawk", 1, 3),
            ],
        );

        let mut buffer = vec![];
        {
            let mut writer = FramedWrite::new(&mut buffer, PacketCodec::new());
            writer.send(packet.into()).await.unwrap();
        }

        let mut reader = FramedRead::new(buffer.as_slice(), PacketCodec::new());
        let packets::Packet::TargetPopulations(decoded) =
            reader.try_next().await.unwrap().unwrap()
        else {
            panic!("invalid packet");
        };

        assert_eq!(
            Packet::new(
                42,
                vec![TargetBand::new("rat", 0, 5), TargetBand::new("hawk", 1, 3)]
            ),
            decoded
        );
    }
}
