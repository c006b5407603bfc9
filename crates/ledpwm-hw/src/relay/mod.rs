//! Command relay.
//!
//! Translates single-field command frames into whole-table reads and writes
//! on a [`TableDevice`]. The relay keeps nothing between frames: every frame
//! starts from a fresh read of the table.

mod frame;

pub use frame::{CommandFrame, Direction, FRAME_SIZE};

use crate::device::TableDevice;
use crate::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Applies one frame to the device.
///
/// Reads return a response frame carrying the current value; writes perform
/// a read-modify-write of the whole table and return nothing.
pub fn apply<D: TableDevice>(device: &D, frame: &CommandFrame) -> Result<Option<CommandFrame>> {
    let mut table = device.read_table()?;
    let state = table.channel_mut(frame.channel);

    match frame.direction {
        Direction::Read => {
            let value = state.get(frame.field);
            debug!("{} {} is {}", frame.channel, frame.field, value);
            Ok(Some(CommandFrame { value, ..*frame }))
        }
        Direction::Write => {
            state.set(frame.field, frame.value);
            device.write_table(&table)?;
            debug!("Wrote {} {} to {}", frame.channel, frame.field, frame.value);
            Ok(None)
        }
    }
}

/// Serves frames from one controller connection until it closes.
///
/// Malformed frames and device errors are logged and the frame is dropped;
/// only connection errors end the session.
pub async fn serve<S, D>(stream: &mut S, device: &D) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: TableDevice,
{
    let mut buffer = [0u8; FRAME_SIZE];
    loop {
        match stream.read_exact(&mut buffer).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }

        let frame = match CommandFrame::decode(&buffer) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping command frame {:02X?}: {}", buffer, e);
                continue;
            }
        };

        match apply(device, &frame) {
            Ok(Some(response)) => {
                stream.write_all(&response.encode()).await?;
                stream.flush().await?;
            }
            Ok(None) => {}
            Err(e) => warn!("Command {:?} failed: {}", frame, e),
        }
    }
}

/// Sends one frame from the controller side and waits for the response to
/// reads. Returns the value carried by the response, if any.
pub async fn request<S>(stream: &mut S, frame: &CommandFrame) -> Result<Option<i32>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&frame.encode()).await?;
    stream.flush().await?;

    if frame.direction == Direction::Write {
        return Ok(None);
    }

    let mut buffer = [0u8; FRAME_SIZE];
    stream.read_exact(&mut buffer).await?;
    Ok(Some(CommandFrame::decode(&buffer)?.value))
}
