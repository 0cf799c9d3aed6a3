use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{decode_frame, encode_message, FRAME_DELIMITER, FRAME_LEN_MAX};
use crate::error::FrameError;
use crate::message::{Message, PortId};

/// `tokio_util` codec for host-side async streams.
///
/// Corrupt frames are skipped rather than reported, so one bad frame never
/// ends a `FramedRead` stream.
#[derive(Debug, Clone, Default)]
pub struct MessageCodec {
    port: PortId,
    discarding: bool,
}

impl MessageCodec {
    /// Create a codec stamping decoded messages with `port`.
    pub fn new(port: PortId) -> Self {
        Self {
            port,
            discarding: false,
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == FRAME_DELIMITER) else {
                if src.len() > FRAME_LEN_MAX {
                    debug!(buffered = src.len(), "no delimiter within frame limit, discarding");
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let frame = src.split_to(pos + 1);
            if std::mem::take(&mut self.discarding) || pos == 0 {
                continue;
            }

            match decode_frame(&frame[..pos], self.port) {
                Ok(msg) => return Ok(Some(msg)),
                Err(err) => debug!(%err, "skipping corrupt frame"),
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_message(&item, dst).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::encode_frame;

    #[test]
    fn decodes_back_to_back_frames() {
        let mut src = BytesMut::new();
        encode_frame(1, 1, b"one", &mut src).unwrap();
        encode_frame(2, 2, b"two", &mut src).unwrap();

        let mut codec = MessageCodec::new(0);
        let first = codec.decode(&mut src).unwrap().unwrap();
        let second = codec.decode(&mut src).unwrap().unwrap();

        assert_eq!(first.payload.as_ref(), b"one");
        assert_eq!(second.payload.as_ref(), b"two");
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn skips_corrupt_frame() {
        let mut src = BytesMut::from(&[0x07, 0x01, 0x00][..]);
        encode_frame(3, 0, b"good", &mut src).unwrap();

        let mut codec = MessageCodec::new(0);
        let msg = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(msg.interface(), 3);
    }

    #[test]
    fn waits_for_delimiter() {
        let mut full = BytesMut::new();
        encode_frame(1, 1, b"split", &mut full).unwrap();
        let mut src = full.split_to(4);

        let mut codec = MessageCodec::new(0);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.unsplit(full);
        assert!(codec.decode(&mut src).unwrap().is_some());
    }

    #[test]
    fn discards_runaway_input() {
        let mut src = BytesMut::from(&[0x55u8; FRAME_LEN_MAX + 1][..]);
        let mut codec = MessageCodec::new(0);
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert!(src.is_empty());

        // tail of the runaway frame, then a good one
        src.extend_from_slice(&[0x55, 0x00]);
        encode_frame(1, 1, b"ok", &mut src).unwrap();
        let msg = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(msg.payload.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn framed_roundtrip() {
        let mut wire = Vec::new();
        {
            let mut sink = FramedWrite::new(&mut wire, MessageCodec::new(0));
            sink.send(Message::new(0, 4, 2, b"async".to_vec()).unwrap())
                .await
                .unwrap();
        }

        let mut stream = FramedRead::new(wire.as_slice(), MessageCodec::new(1));
        let msg = stream.next().await.unwrap().unwrap();
        assert_eq!(msg.interface(), 4);
        assert_eq!(msg.port, 1);
        assert_eq!(msg.payload.as_ref(), b"async");
    }
}
