use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{AppError, AppResult};

/// type (u16 LE), checksum (u8), size (u16 LE)
pub const HEADER_SIZE: usize = 5;

/// Message kinds on the wire. Codes 0x00..=0x0F are reserved by the
/// server protocol, 0x10.. are application messages. Codes this client
/// does not know still decode, so the session layer can discard them
/// instead of tearing the connection down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Login,
    Logout,
    Ok,
    Error,
    RequestTasks,
    ResponseTasks,
    Unknown(u16),
}

impl FrameType {
    pub const fn code(self) -> u16 {
        match self {
            FrameType::Login => 0x00,
            FrameType::Logout => 0x01,
            FrameType::Ok => 0x02,
            FrameType::Error => 0x03,
            FrameType::RequestTasks => 0x10,
            FrameType::ResponseTasks => 0x11,
            FrameType::Unknown(code) => code,
        }
    }

    pub const fn from_code(code: u16) -> FrameType {
        match code {
            0x00 => FrameType::Login,
            0x01 => FrameType::Logout,
            0x02 => FrameType::Ok,
            0x03 => FrameType::Error,
            0x10 => FrameType::RequestTasks,
            0x11 => FrameType::ResponseTasks,
            other => FrameType::Unknown(other),
        }
    }
}

/// One complete unit of the wire protocol: a 5-byte header plus an
/// optional UTF-8 text payload. Text payloads carry one trailing 0x00
/// terminator on the wire, counted in the `size` field; the terminator
/// never appears in `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Option<String>,
}

impl Frame {
    pub fn new(frame_type: FrameType, payload: Option<String>) -> Frame {
        Frame {
            frame_type,
            payload,
        }
    }

    pub fn login(token: &str) -> Frame {
        Frame::new(FrameType::Login, Some(token.to_string()))
    }

    pub fn logout() -> Frame {
        Frame::new(FrameType::Logout, None)
    }

    pub fn request_tasks() -> Frame {
        Frame::new(FrameType::RequestTasks, None)
    }

    /// Serializes the frame. Fails only with `PayloadTooLarge` when the
    /// payload plus terminator does not fit the u16 size field.
    pub fn encode(&self) -> AppResult<Bytes> {
        let payload = self.payload.as_deref();
        let size = payload.map_or(0, |p| p.len() + 1);
        if size > u16::MAX as usize {
            return Err(AppError::PayloadTooLarge(size - 1));
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + size);
        buf.put_u16_le(self.frame_type.code());
        // checksum placeholder, patched once all summed bytes are in place
        buf.put_u8(0);
        buf.put_u16_le(size as u16);
        if let Some(p) = payload {
            buf.put_slice(p.as_bytes());
            buf.put_u8(0);
        }
        let checksum = compute_checksum(&buf);
        buf[2] = checksum;
        Ok(buf.freeze())
    }

    /// Decodes exactly one frame from a complete buffer.
    ///
    /// Fails with `Truncated` when the buffer length does not match the
    /// declared frame extent: fewer than `HEADER_SIZE` bytes, a payload
    /// extending past the buffer, or trailing bytes beyond it (the
    /// streaming `parse` hands over exact extents, so trailing data here
    /// means a framing error). Fails with `ChecksumMismatch` when the
    /// recomputed checksum disagrees with the transmitted one.
    pub fn decode(bytes: &[u8]) -> AppResult<Frame> {
        if bytes.len() < HEADER_SIZE {
            return Err(AppError::Truncated);
        }
        let frame_type = FrameType::from_code(u16::from_le_bytes([bytes[0], bytes[1]]));
        let transmitted = bytes[2];
        let size = u16::from_le_bytes([bytes[3], bytes[4]]) as usize;
        if bytes.len() != HEADER_SIZE + size {
            return Err(AppError::Truncated);
        }

        let expected = compute_checksum(&bytes[..HEADER_SIZE + size]);
        if expected != transmitted {
            return Err(AppError::ChecksumMismatch {
                expected,
                actual: transmitted,
            });
        }

        let payload = if size > 0 {
            let mut text = &bytes[HEADER_SIZE..HEADER_SIZE + size];
            // terminator is counted in size but not part of the text
            if let [head @ .., 0x00] = text {
                text = head;
            }
            Some(String::from_utf8_lossy(text).into_owned())
        } else {
            None
        };

        Ok(Frame {
            frame_type,
            payload,
        })
    }

    fn check(buffer: &BytesMut) -> AppResult<usize> {
        if buffer.remaining() < HEADER_SIZE {
            return Err(AppError::Truncated);
        }
        let size = u16::from_le_bytes([buffer[3], buffer[4]]) as usize;
        if buffer.remaining() < HEADER_SIZE + size {
            return Err(AppError::Truncated);
        }
        Ok(HEADER_SIZE + size)
    }

    /// Decodes one frame from a stream cursor.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// frame; the bytes stay put for the next read. A complete frame is
    /// consumed from the buffer even when its checksum turns out to be
    /// bad, so the stream resynchronizes at the next frame boundary and a
    /// single corrupt frame never wedges the reader.
    pub fn parse(buffer: &mut BytesMut) -> AppResult<Option<Frame>> {
        match Frame::check(buffer) {
            Ok(frame_len) => {
                let frame_bytes = buffer.split_to(frame_len);
                Ok(Some(Frame::decode(&frame_bytes)?))
            }
            Err(AppError::Truncated) => {
                buffer.reserve(HEADER_SIZE);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// `0xFF - (sum of all frame bytes except the checksum byte itself, mod 256)`
fn compute_checksum(frame_bytes: &[u8]) -> u8 {
    let mut sum: u8 = 0;
    for (i, byte) in frame_bytes.iter().enumerate() {
        if i == 2 {
            continue;
        }
        sum = sum.wrapping_add(*byte);
    }
    0xFF_u8.wrapping_sub(sum)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use rstest::rstest;

    use super::{Frame, FrameType, HEADER_SIZE};
    use crate::AppError;

    #[rstest]
    #[case(FrameType::Login, Some("secret-token".to_string()))]
    #[case(FrameType::Logout, None)]
    #[case(FrameType::RequestTasks, None)]
    #[case(FrameType::ResponseTasks, Some("task1;task2".to_string()))]
    #[case(FrameType::Unknown(0x42), Some("¡hola!".to_string()))]
    #[case(FrameType::Ok, Some(String::new()))]
    fn round_trip(#[case] frame_type: FrameType, #[case] payload: Option<String>) {
        let frame = Frame::new(frame_type, payload);
        let bytes = frame.encode().unwrap();
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn request_tasks_wire_bytes() {
        let bytes = Frame::request_tasks().encode().unwrap();
        assert_eq!(&bytes[..], &[0x10, 0x00, 0xEF, 0x00, 0x00]);

        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded.frame_type, FrameType::RequestTasks);
        assert_eq!(decoded.payload, None);
    }

    #[test]
    fn text_payload_is_terminated_on_the_wire() {
        let bytes = Frame::login("ab").encode().unwrap();
        // size counts the terminator
        assert_eq!(u16::from_le_bytes([bytes[3], bytes[4]]), 3);
        assert_eq!(bytes[HEADER_SIZE + 2], 0x00);
    }

    #[test]
    fn every_prefix_is_truncated() {
        let bytes = Frame::login("token").encode().unwrap();
        for len in 0..bytes.len() {
            assert!(
                matches!(Frame::decode(&bytes[..len]), Err(AppError::Truncated)),
                "prefix of {} bytes should be truncated",
                len
            );
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = Frame::login("token").encode().unwrap().to_vec();
        bytes.push(0xAA);
        // decode takes exactly one frame; the size field must account for
        // every byte supplied
        assert!(matches!(Frame::decode(&bytes), Err(AppError::Truncated)));
    }

    #[test]
    fn any_flipped_byte_fails_decode() {
        let bytes = Frame::login("token").encode().unwrap();
        for i in 0..bytes.len() {
            let mut corrupted = bytes.to_vec();
            corrupted[i] ^= 0x01;
            let result = Frame::decode(&corrupted);
            if i == 3 || i == 4 {
                // a flipped size byte changes the declared payload extent,
                // which reads as a length mismatch before the checksum runs
                assert!(
                    matches!(
                        result,
                        Err(AppError::Truncated) | Err(AppError::ChecksumMismatch { .. })
                    ),
                    "flipping size byte {} should fail decode",
                    i
                );
            } else {
                assert!(
                    matches!(result, Err(AppError::ChecksumMismatch { .. })),
                    "flipping byte {} should fail the checksum",
                    i
                );
            }
        }
    }

    #[test]
    fn parse_waits_for_a_complete_frame() {
        let bytes = Frame::login("token").encode().unwrap();
        let mut buffer = BytesMut::new();

        buffer.extend_from_slice(&bytes[..3]);
        assert!(Frame::parse(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), 3);

        buffer.extend_from_slice(&bytes[3..]);
        let frame = Frame::parse(&mut buffer).unwrap().unwrap();
        assert_eq!(frame, Frame::login("token"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn parse_consumes_a_corrupt_frame_and_resynchronizes() {
        let good = Frame::request_tasks().encode().unwrap();
        let mut bad = Frame::login("token").encode().unwrap().to_vec();
        bad[2] ^= 0xFF;

        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&bad);
        buffer.extend_from_slice(&good);

        assert!(matches!(
            Frame::parse(&mut buffer),
            Err(AppError::ChecksumMismatch { .. })
        ));
        // the next parse starts at the following frame boundary
        let frame = Frame::parse(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.frame_type, FrameType::RequestTasks);
    }

    #[test]
    fn oversized_payload_is_a_caller_error() {
        let frame = Frame::new(FrameType::Login, Some("x".repeat(u16::MAX as usize)));
        assert!(matches!(
            frame.encode(),
            Err(AppError::PayloadTooLarge(_))
        ));
    }
}
