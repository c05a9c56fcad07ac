//! Drives [`acip_protocol::frame`] against a live socket: partial reads are
//! retried until a full header, then a full payload, is available (spec §4.1).

use acip_protocol::{FrameError, HEADER_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Reads exactly one frame off `reader`. `CleanEof` only if the connection
/// closes before any header byte arrives; any other truncation is
/// `Truncated`, matching the codec's own distinction.
pub async fn read_frame<R>(reader: &mut R, max_payload: u32) -> Result<(u16, Vec<u8>), FrameError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = reader
            .read(&mut header_buf[filled..])
            .await
            .map_err(|_| FrameError::Truncated)?;
        if n == 0 {
            return if filled == 0 {
                Err(FrameError::CleanEof)
            } else {
                Err(FrameError::Truncated)
            };
        }
        filled += n;
    }

    let header = acip_protocol::FrameHeader::parse(&header_buf)?;
    if header.length > max_payload {
        return Err(FrameError::Oversize(header.length, max_payload));
    }

    let mut payload = vec![0u8; header.length as usize];
    let mut filled = 0;
    while filled < payload.len() {
        let n = reader
            .read(&mut payload[filled..])
            .await
            .map_err(|_| FrameError::Truncated)?;
        if n == 0 {
            return Err(FrameError::Truncated);
        }
        filled += n;
    }

    let expected_crc = acip_protocol::frame::crc32(&payload);
    if expected_crc != header.crc32 {
        return Err(FrameError::CorruptCrc {
            expected: header.crc32,
            actual: expected_crc,
        });
    }

    Ok((header.packet_type, payload))
}

/// Writes one already-encoded frame (as produced by
/// [`acip_protocol::frame::encode`]) to `writer`.
pub async fn write_frame<W>(writer: &mut W, encoded: &[u8]) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(encoded).await?;
    writer.flush().await
}
