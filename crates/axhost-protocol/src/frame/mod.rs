//! Length-prefixed frame codec.
//!
//! The codec is stateless apart from the configured [`FrameLimit`]. Reads
//! distinguish a clean end of stream (zero bytes where a length prefix was
//! expected) from a stream that stops part-way through a frame, and from a
//! length prefix outside `1..=limit`. Writes always flush so the peer, which
//! is typically blocked on exactly this frame, observes it immediately.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;

/// Size of the little-endian length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Largest payload the protocol admits (10 MiB).
pub const MAX_FRAME_BYTES: u32 = 10 * 1024 * 1024;

/// Upper bound on accepted payload sizes.
///
/// The bound never exceeds [`MAX_FRAME_BYTES`]; embedders may only tighten it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimit(u32);

impl FrameLimit {
    /// The full protocol bound.
    pub const PROTOCOL: Self = Self(MAX_FRAME_BYTES);

    /// Creates a limit, clamping it into `1..=MAX_FRAME_BYTES`.
    #[must_use]
    pub const fn new(max_bytes: u32) -> Self {
        if max_bytes == 0 {
            Self(1)
        } else if max_bytes > MAX_FRAME_BYTES {
            Self::PROTOCOL
        } else {
            Self(max_bytes)
        }
    }

    /// Returns the bound in bytes.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns `true` when `length` is a valid payload length.
    #[must_use]
    pub const fn admits(self, length: u32) -> bool {
        length > 0 && length <= self.0
    }
}

impl Default for FrameLimit {
    fn default() -> Self {
        Self::PROTOCOL
    }
}

/// Outcome of a successful frame read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete payload.
    Frame(Vec<u8>),
    /// The peer closed the stream on a frame boundary.
    EndOfChannel,
}

/// Reads one frame from `reader`.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] when the stream ends inside a frame,
/// [`FrameError::MalformedLength`] when the prefix falls outside
/// `1..=limit`, and [`FrameError::Io`] for stream failures.
pub async fn read_frame<R>(reader: &mut R, limit: FrameLimit) -> Result<FrameRead, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let prefix = read_up_to(reader, LENGTH_PREFIX_BYTES).await?;
    if prefix.is_empty() {
        return Ok(FrameRead::EndOfChannel);
    }
    let length = decode_prefix(&prefix)?;
    if !limit.admits(length) {
        return Err(FrameError::MalformedLength {
            length,
            limit: limit.get(),
        });
    }

    let expected = length as usize;
    let payload = read_up_to(reader, expected).await?;
    if payload.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            received: payload.len(),
        });
    }
    Ok(FrameRead::Frame(payload))
}

/// Writes `payload` as one frame and flushes `writer`.
///
/// # Errors
///
/// Returns [`FrameError::PayloadSize`] for empty or oversized payloads and
/// [`FrameError::Io`] when the stream fails.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    limit: FrameLimit,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|length| limit.admits(*length))
        .ok_or(FrameError::PayloadSize {
            size: payload.len(),
            limit: limit.get(),
        })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    frame.extend_from_slice(&encode_prefix(length));
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads until `wanted` bytes have arrived or the stream ends.
async fn read_up_to<R>(reader: &mut R, wanted: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = Vec::with_capacity(wanted);
    let mut limited = reader.take(wanted as u64);
    limited.read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Decodes a prefix; anything short of four bytes is a truncated frame.
#[expect(
    clippy::little_endian_bytes,
    reason = "the wire format fixes the prefix byte order"
)]
fn decode_prefix(prefix: &[u8]) -> Result<u32, FrameError> {
    let bytes: [u8; LENGTH_PREFIX_BYTES] =
        prefix.try_into().map_err(|_| FrameError::Truncated {
            expected: LENGTH_PREFIX_BYTES,
            received: prefix.len(),
        })?;
    Ok(u32::from_le_bytes(bytes))
}

#[expect(
    clippy::little_endian_bytes,
    reason = "the wire format fixes the prefix byte order"
)]
const fn encode_prefix(length: u32) -> [u8; LENGTH_PREFIX_BYTES] {
    length.to_le_bytes()
}

/// Frame reader bound to a stream and a limit.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    limit: FrameLimit,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps `inner` with the given limit.
    #[must_use]
    pub const fn new(inner: R, limit: FrameLimit) -> Self {
        Self { inner, limit }
    }

    /// Reads the next frame.
    ///
    /// # Errors
    ///
    /// See [`read_frame`].
    pub async fn read_frame(&mut self) -> Result<FrameRead, FrameError> {
        read_frame(&mut self.inner, self.limit).await
    }
}

/// Frame writer bound to a stream and a limit.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    limit: FrameLimit,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wraps `inner` with the given limit.
    #[must_use]
    pub const fn new(inner: W, limit: FrameLimit) -> Self {
        Self { inner, limit }
    }

    /// Writes and flushes one frame.
    ///
    /// # Errors
    ///
    /// See [`write_frame`].
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        write_frame(&mut self.inner, payload, self.limit).await
    }
}
