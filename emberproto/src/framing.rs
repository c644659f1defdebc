//! Length-framing: `[u32 big-endian length][payload bytes]`.
//!
//! The reader rejects an oversized declared length before allocating the
//! buffer for it — a peer cannot make us allocate 4 GiB by lying about the
//! length header.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::TransportError;

pub const MAX_PAYLOAD_BYTES: usize = 65_536;

pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, TransportError> {
    let len = reader.read_u32().await? as usize;
    if len > MAX_PAYLOAD_BYTES {
        return Err(TransportError::FramingError(format!(
                    "declared payload length {len} exceeds the {MAX_PAYLOAD_BYTES} byte maximum"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(TransportError::FramingError(format!(
                    "payload of {} bytes exceeds the {MAX_PAYLOAD_BYTES} byte maximum",
                    payload.len()
        )));
    }
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello world").await.unwrap();

        let mut cursor = Cursor::new(buf);
        let payload = read_frame(&mut cursor).await.unwrap();
        assert_eq!(payload, b"hello world");
    }

    #[tokio::test]
    async fn rejects_oversized_declared_length_before_reading_body() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_PAYLOAD_BYTES as u32) + 1).to_be_bytes());
        // Deliberately no body bytes follow: if the reader tried to read_exact
        // first, this would hang/err on EOF instead of failing fast on length.
        let mut cursor = Cursor::new(buf);
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(TransportError::FramingError(_))));
    }

    #[tokio::test]
    async fn accepts_exactly_the_maximum_payload() {
        let mut buf = Vec::new();
        let payload = vec![7u8; MAX_PAYLOAD_BYTES];
        write_frame(&mut buf, &payload).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let read_back = read_frame(&mut cursor).await.unwrap();
        assert_eq!(read_back.len(), MAX_PAYLOAD_BYTES);
    }
}
