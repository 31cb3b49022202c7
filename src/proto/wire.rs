//! Binary framing for the cluster's TCP protocol.
//!
//! Big-endian throughout. A request is a 3-byte header (`version`, `command`,
//! `argCount`) followed by `argCount` length-prefixed argument strings; a
//! response is `version`, `reply`, and one length-prefixed body.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{KafoError, Result};

/// Wire protocol version this build speaks. A mismatched version fails the
/// connection immediately rather than attempting to interpret the frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Command bytes, frozen for wire compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Get = 1,
    Set = 2,
    Delete = 3,
    Status = 4,
    Nodes = 5,
}

impl Command {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Command::Get),
            2 => Ok(Command::Set),
            3 => Ok(Command::Delete),
            4 => Ok(Command::Status),
            5 => Ok(Command::Nodes),
            _ => Err(KafoError::UnknownCommand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Success = 1,
    Error = 2,
}

/// A decoded request frame: the raw command byte plus its argument bytes.
///
/// The command byte is kept raw rather than resolved to a [`Command`] at
/// framing time: an unrecognized byte is a dispatch-level concern (reply
/// with `"the command is invalid"` and keep the connection open), not a
/// framing failure, and the full frame — argCount and every argument —
/// must still be read off the wire so the next request on this connection
/// starts at the right offset.
#[derive(Debug, Clone)]
pub struct RequestFrame {
    pub command: u8,
    pub args: Vec<Vec<u8>>,
}

impl RequestFrame {
    /// Resolves this frame's raw command byte to a known [`Command`].
    pub fn command(&self) -> Result<Command> {
        Command::from_byte(self.command)
    }
}

/// A decoded response frame: success/error plus the raw body bytes.
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    pub reply: Reply,
    pub body: Vec<u8>,
}

impl ResponseFrame {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            reply: Reply::Success,
            body,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            reply: Reply::Error,
            body: message.into().into_bytes(),
        }
    }

    /// `Ok(body)` on success, or the decoded error as a `KafoError`.
    pub fn into_result(self) -> Result<Vec<u8>> {
        match self.reply {
            Reply::Success => Ok(self.body),
            Reply::Error => {
                let message = String::from_utf8_lossy(&self.body).into_owned();
                if let Some(addr) = KafoError::parse_redirect(&message) {
                    Err(KafoError::Redirect(addr.to_string()))
                } else if message == KafoError::NotFound.to_string() {
                    Err(KafoError::NotFound)
                } else if message == KafoError::CapacityExceeded.to_string() {
                    Err(KafoError::CapacityExceeded)
                } else {
                    Err(KafoError::Transport(message))
                }
            }
        }
    }
}

async fn write_arg<W: AsyncWrite + Unpin>(writer: &mut W, arg: &[u8]) -> Result<()> {
    writer
        .write_u32(arg.len() as u32)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    writer
        .write_all(arg)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))
}

async fn read_arg<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let len = reader
        .read_u32()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))? as usize;
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    Ok(buf)
}

/// Writes a request frame: `version | command | argCount | args...`.
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: Command,
    args: &[&[u8]],
) -> Result<()> {
    writer
        .write_u8(PROTOCOL_VERSION)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    writer
        .write_u8(command as u8)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    writer
        .write_u8(args.len() as u8)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    for arg in args {
        write_arg(writer, arg).await?;
    }
    writer
        .flush()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))
}

/// Reads and decodes a request frame, failing fast on a version mismatch.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<RequestFrame> {
    let version = reader
        .read_u8()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    if version != PROTOCOL_VERSION {
        return Err(KafoError::ProtocolMismatch);
    }

    let command = reader
        .read_u8()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;

    let arg_count = reader
        .read_u8()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;

    let mut args = Vec::with_capacity(arg_count as usize);
    for _ in 0..arg_count {
        args.push(read_arg(reader).await?);
    }

    Ok(RequestFrame { command, args })
}

/// Writes a response frame: `version | reply | body`.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &ResponseFrame,
) -> Result<()> {
    writer
        .write_u8(PROTOCOL_VERSION)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    writer
        .write_u8(response.reply as u8)
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    write_arg(writer, &response.body).await?;
    writer
        .flush()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))
}

/// Reads and decodes a response frame, failing fast on a version mismatch.
pub async fn read_response<R: AsyncRead + Unpin>(reader: &mut R) -> Result<ResponseFrame> {
    let version = reader
        .read_u8()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    if version != PROTOCOL_VERSION {
        return Err(KafoError::ProtocolMismatch);
    }

    let reply = reader
        .read_u8()
        .await
        .map_err(|e| KafoError::Transport(e.to_string()))?;
    let reply = match reply {
        1 => Reply::Success,
        _ => Reply::Error,
    };

    let body = read_arg(reader).await?;
    Ok(ResponseFrame { reply, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn request_round_trips_through_the_wire() {
        let (mut client, mut server) = duplex(4096);
        write_request(&mut client, Command::Set, &[b"60", b"key", b"value"])
            .await
            .unwrap();

        let frame = read_request(&mut server).await.unwrap();
        assert_eq!(frame.command().unwrap(), Command::Set);
        assert_eq!(frame.args, vec![b"60".to_vec(), b"key".to_vec(), b"value".to_vec()]);
    }

    #[tokio::test]
    async fn unrecognized_command_byte_still_reads_the_full_frame() {
        let (mut client, mut server) = duplex(4096);
        client.write_u8(PROTOCOL_VERSION).await.unwrap();
        client.write_u8(99).await.unwrap();
        client.write_u8(1).await.unwrap();
        write_arg(&mut client, b"arg").await.unwrap();

        let frame = read_request(&mut server).await.unwrap();
        assert_eq!(frame.command, 99);
        assert!(matches!(frame.command(), Err(KafoError::UnknownCommand)));
        assert_eq!(frame.args, vec![b"arg".to_vec()]);
    }

    #[tokio::test]
    async fn response_round_trips_through_the_wire() {
        let (mut client, mut server) = duplex(4096);
        write_response(&mut server, &ResponseFrame::ok(b"hi".to_vec()))
            .await
            .unwrap();

        let frame = read_response(&mut client).await.unwrap();
        assert_eq!(frame.reply, Reply::Success);
        assert_eq!(frame.into_result().unwrap(), b"hi".to_vec());
    }

    #[tokio::test]
    async fn error_reply_with_redirect_prefix_parses_back_to_redirect() {
        let (mut client, mut server) = duplex(4096);
        write_response(&mut server, &ResponseFrame::err("redirect to node 10.0.0.2:5837"))
            .await
            .unwrap();

        let frame = read_response(&mut client).await.unwrap();
        let err = frame.into_result().unwrap_err();
        assert!(matches!(err, KafoError::Redirect(addr) if addr == "10.0.0.2:5837"));
    }
}
