use super::{conn, Client};
use bytes::BytesMut;
use tokio::io;
use tokio::io::ReadHalf;
use tokio_stream::StreamExt;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};

/// Lines longer than this are dropped.
pub const MAX_LINE_LENGTH: usize = 1 << 16;

pub type ReadStream = FramedRead<ReadHalf<conn::Stream>, Lines>;

pub(super) fn reader(half: ReadHalf<conn::Stream>) -> ReadStream {
  FramedRead::new(half, Lines::default())
}

/// [`LinesCodec`] which skips over-long and non-UTF-8 lines instead of failing.
///
/// `FramedRead` ends the stream after the first decoder error,
/// so the error must not reach it.
#[derive(Debug)]
pub struct Lines(LinesCodec);

impl Default for Lines {
  fn default() -> Self {
    Self(LinesCodec::new_with_max_length(MAX_LINE_LENGTH))
  }
}

impl Lines {
  fn skip_long(
    &mut self,
    buf: &mut BytesMut,
    decode: fn(&mut LinesCodec, &mut BytesMut) -> Result<Option<String>, LinesCodecError>,
  ) -> Result<Option<String>, io::Error> {
    loop {
      match decode(&mut self.0, buf) {
        Ok(line) => return Ok(line),
        Err(LinesCodecError::MaxLineLengthExceeded) => {
          warn!(max = MAX_LINE_LENGTH, "dropping over-long line");
        }
        // the codec has already consumed the offending line
        Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
          warn!(error = %e, "dropping line which is not valid UTF-8");
        }
        Err(LinesCodecError::Io(e)) => return Err(e),
      }
    }
  }
}

impl Decoder for Lines {
  type Item = String;
  type Error = io::Error;

  fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
    self.skip_long(buf, LinesCodec::decode)
  }

  fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
    self.skip_long(buf, LinesCodec::decode_eof)
  }
}

impl Client {
  /// Read a single raw line from the underlying stream, without its line ending.
  ///
  /// Empty lines are skipped, and so are lines longer than [`MAX_LINE_LENGTH`]
  /// or not valid UTF-8.
  pub async fn recv(&mut self) -> Result<String, RecvError> {
    loop {
      match self.reader.next().await {
        Some(Ok(line)) if line.is_empty() => continue,
        Some(Ok(line)) => return Ok(line),
        Some(Err(e)) => return Err(e.into()),
        None => return Err(RecvError::StreamClosed),
      }
    }
  }
}

/// Failed to receive a message.
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
  /// The underlying I/O operation failed.
  #[error("failed to read message: {0}")]
  Io(#[from] io::Error),

  /// The stream was closed.
  #[error("failed to read message: stream closed")]
  StreamClosed,
}

impl RecvError {
  /// Returns `true` if this `recv` failed due to a disconnect of some kind.
  pub fn is_disconnect(&self) -> bool {
    match self {
      RecvError::StreamClosed => true,
      RecvError::Io(e)
        if matches!(
          e.kind(),
          io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionAborted | io::ErrorKind::TimedOut
        ) =>
      {
        true
      }
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn long_lines_are_skipped() {
    let mut lines = Lines::default();
    let mut buf = BytesMut::new();
    buf.extend_from_slice("a".repeat(MAX_LINE_LENGTH + 10).as_bytes());
    assert_eq!(lines.decode(&mut buf).unwrap(), None);

    buf.extend_from_slice(b"aaa\r\nPING :tmi.twitch.tv\r\n");
    assert_eq!(
      lines.decode(&mut buf).unwrap().as_deref(),
      Some("PING :tmi.twitch.tv")
    );
    assert_eq!(lines.decode(&mut buf).unwrap(), None);
  }

  #[test]
  fn invalid_utf8_lines_are_skipped() {
    let mut lines = Lines::default();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"PRIVMSG #forsen :bad \xff\xfe\r\nPRIVMSG #forsen :after\r\n");
    assert_eq!(
      lines.decode(&mut buf).unwrap().as_deref(),
      Some("PRIVMSG #forsen :after")
    );
    assert_eq!(lines.decode(&mut buf).unwrap(), None);

    buf.extend_from_slice(b"\xc3");
    assert_eq!(lines.decode_eof(&mut buf).unwrap(), None);
  }
}
