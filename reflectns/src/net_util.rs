//! TCP framing and UDP send helpers, grounded on the wire library's own
//! `util::net` module.

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

/// Read a length-prefixed DNS message from a TCP stream: a big-endian
/// `u16` byte count, followed by that many bytes.
pub async fn read_tcp_bytes(stream: &mut TcpStream) -> Result<BytesMut, TcpError> {
    let size = stream
        .read_u16()
        .await
        .map_err(|error| TcpError::Io { id: None, error })?;
    let expected = size as usize;
    let mut bytes = BytesMut::with_capacity(expected);

    while bytes.len() < expected {
        let id = (bytes.len() >= 2).then(|| u16::from_be_bytes([bytes[0], bytes[1]]));
        match stream.read_buf(&mut bytes).await {
            Ok(0) => {
                return Err(TcpError::TooShort {
                    id,
                    expected,
                    actual: bytes.len(),
                })
            }
            Ok(_) => (),
            Err(error) => return Err(TcpError::Io { id, error }),
        }
    }

    Ok(bytes)
}

#[derive(Debug)]
pub enum TcpError {
    TooShort {
        id: Option<u16>,
        expected: usize,
        actual: usize,
    },
    Io {
        id: Option<u16>,
        error: io::Error,
    },
}

impl TcpError {
    pub fn id(&self) -> Option<u16> {
        match self {
            TcpError::TooShort { id, .. } | TcpError::Io { id, .. } => *id,
        }
    }
}

/// Send a serialised message over TCP with its two-byte length prefix,
/// truncating and setting the TC flag if it doesn't fit in a `u16`.
pub async fn send_tcp_bytes(stream: &mut TcpStream, bytes: &mut [u8]) -> io::Result<()> {
    let len = if let Ok(len) = u16::try_from(bytes.len()) {
        bytes[2] &= 0b1111_1101;
        len
    } else {
        bytes[2] |= 0b0000_0010;
        u16::MAX
    };

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&bytes[..(len as usize)]).await
}

/// Send a serialised message over UDP to `target`, truncating to 512
/// bytes and setting the TC flag if it's too big for one datagram.
pub async fn send_udp_bytes_to(
    sock: &UdpSocket,
    target: SocketAddr,
    bytes: &mut [u8],
) -> io::Result<()> {
    if bytes.len() > 512 {
        bytes[2] |= 0b0000_0010;
        sock.send_to(&bytes[..512], target).await?;
    } else {
        bytes[2] &= 0b1111_1101;
        sock.send_to(bytes, target).await?;
    }
    Ok(())
}
