use std::ops::ControlFlow;

use bytes::BytesMut;

use crate::codec::{packets, Error, Parser, RawPacketDecoder, Validator, Writer};

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub species: String,
    pub count: u32,
}

impl Observation {
    #[must_use]
    pub fn new(species: impl Into<String>, count: u32) -> Self {
        Self {
            species: species.into(),
            count,
        }
    }
}

/// A site-visit report exactly as it arrived on the wire. Duplicate species
/// entries are preserved here unmodified; collapsing equal-count duplicates
/// and rejecting conflicting ones is the connection handler's job (§4.E), not
/// the codec's. It is a validation rule on the report's *meaning*, not on the
/// frame's *shape*.
#[derive(Debug, PartialEq)]
pub struct Packet {
    pub site: u32,
    pub observations: Vec<Observation>,
}

impl Packet {
    pub(crate) fn write_packet(&self) -> Vec<u8> {
        let mut writer = Writer::new(0x58);

        writer.write_u32(self.site);
        writer.write_array(&self.observations, |writer, obs| {
            writer.write_str(&obs.species).write_u32(obs.count);
        });

        writer.finalize()
    }

    #[must_use]
    pub fn new(site: u32, observations: Vec<Observation>) -> Self {
        Self { site, observations }
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
        let observations = parser.read_array(|parser| {
            let species = parser.read_str();
            let count = parser.read_u32();
            Observation::new(species, count)
        });

        Packet::new(site, observations)
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
    async fn test_round_trip() {
        init_tracing_subscriber();

        let packet = Packet::new(
            42,
            vec![Observation::new("dog", 3), Observation::new("dog", 3)],
        );

        let mut buffer = vec![];
        {
            let mut writer = FramedWrite::new(&mut buffer, PacketCodec::new());
            writer.send(packet.into()).await.unwrap();
        }

        let mut reader = FramedRead::new(buffer.as_slice(), PacketCodec::new());
        let packets::Packet::SiteVisit(decoded) = reader.try_next().await.unwrap().unwrap()
        else {
            panic!("invalid packet");
        };

        assert_eq!(
            Packet::new(42, vec![Observation::new("dog", 3), Observation::new("dog", 3)]),
            decoded
        );
    }

    #[tokio::test]
    async fn test_flipped_bit_is_invalid_frame() {
        init_tracing_subscriber();

        let packet = Packet::new(1, vec![Observation::new("rat", 10)]);
        let mut buffer = vec![];
        {
            let mut writer = FramedWrite::new(&mut buffer, PacketCodec::new());
            writer.send(packet.into()).await.unwrap();
        }

        // flip one bit in the middle of the frame; checksum no longer sums to zero.
        let mid = buffer.len() / 2;
        buffer[mid] ^= 0x01;

        let mut reader = FramedRead::new(buffer.as_slice(), PacketCodec::new());
        assert!(matches!(reader.try_next().await, Err(Error::InvalidFrame)));
    }
}
