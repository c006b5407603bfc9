//! Device node protocol.
//!
//! The device is published to other processes as a local stream socket.
//! One connection is one open handle; closing the connection closes it.
//!
//! Request: `op: u8` (0 = read, 1 = write), `size: u32` little-endian, then
//! `size` payload bytes for writes.
//! Response: `status: i32` little-endian (bytes transferred, or a negative
//! error code), followed by `status` bytes of table data for a read.

use crate::device::TableDevice;
use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Read request opcode.
pub const OP_READ: u8 = 0;

/// Write request opcode.
pub const OP_WRITE: u8 = 1;

/// Request header size.
pub const HEADER_SIZE: usize = 5;

/// Status for a request whose size is not one channel table.
pub const STATUS_SIZE_MISMATCH: i32 = -1;

/// Status for a failed transfer.
pub const STATUS_TRANSFER_FAILED: i32 = -2;

/// Largest payload buffered for a single request. Larger writes are drained
/// and rejected without allocating.
const MAX_REQUEST: u32 = 64 * 1024;

/// Builds a request header.
pub fn encode_header(op: u8, size: u32) -> [u8; HEADER_SIZE] {
    let size = size.to_le_bytes();
    [op, size[0], size[1], size[2], size[3]]
}

/// Maps a device error to its wire status.
pub fn status_for(error: &Error) -> i32 {
    match error {
        Error::SizeMismatch { .. } => STATUS_SIZE_MISMATCH,
        _ => STATUS_TRANSFER_FAILED,
    }
}

/// Maps a negative wire status back to an error.
pub fn error_for(status: i32, requested: usize) -> Error {
    match status {
        STATUS_SIZE_MISMATCH => Error::SizeMismatch {
            expected: crate::channel::TABLE_SIZE,
            actual: requested,
        },
        other => Error::Transfer(format!("device returned status {other}")),
    }
}

/// Serves requests from one connection until the peer closes it.
pub async fn serve<S, D>(stream: &mut S, device: &D) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: TableDevice,
{
    let mut header = [0u8; HEADER_SIZE];
    loop {
        match stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
        match header[0] {
            OP_READ => handle_read(stream, device, size).await?,
            OP_WRITE => handle_write(stream, device, size).await?,
            op => {
                // Framing is lost once the opcode is unknown.
                return Err(Error::Transfer(format!("unknown device node opcode {op}")));
            }
        }
    }
}

async fn handle_read<S, D>(stream: &mut S, device: &D, size: u32) -> Result<()>
where
    S: AsyncWrite + Unpin,
    D: TableDevice,
{
    if size > MAX_REQUEST {
        debug!("Rejecting {} byte read", size);
        return send_status(stream, STATUS_SIZE_MISMATCH).await;
    }

    let mut buffer = vec![0u8; size as usize];
    match device.read(&mut buffer) {
        Ok(count) => {
            send_status(stream, count as i32).await?;
            stream.write_all(&buffer[..count]).await?;
            stream.flush().await?;
            Ok(())
        }
        Err(e) => {
            debug!("Device read failed: {}", e);
            send_status(stream, status_for(&e)).await
        }
    }
}

async fn handle_write<S, D>(stream: &mut S, device: &D, size: u32) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: TableDevice,
{
    if size > MAX_REQUEST {
        let mut payload = (&mut *stream).take(size as u64);
        let drained = tokio::io::copy(&mut payload, &mut tokio::io::sink()).await?;
        if drained < size as u64 {
            return Err(Error::Transfer(format!(
                "write payload truncated at {drained} of {size} bytes"
            )));
        }
        debug!("Rejecting {} byte write", size);
        return send_status(stream, STATUS_SIZE_MISMATCH).await;
    }

    let mut buffer = vec![0u8; size as usize];
    if let Err(e) = stream.read_exact(&mut buffer).await {
        warn!("Write payload transfer failed: {}", e);
        // Best effort; the peer is most likely gone already.
        let _ = send_status(stream, STATUS_TRANSFER_FAILED).await;
        return Err(Error::Transfer(e.to_string()));
    }

    let status = match device.write(&buffer) {
        Ok(count) => count as i32,
        Err(e) => {
            debug!("Device write failed: {}", e);
            status_for(&e)
        }
    };
    send_status(stream, status).await
}

async fn send_status<S: AsyncWrite + Unpin>(stream: &mut S, status: i32) -> Result<()> {
    stream.write_all(&status.to_le_bytes()).await?;
    stream.flush().await?;
    Ok(())
}
