//! Client library for the LED device node published by the daemon.
//!
//! A connected client is one open handle on the device. Only whole-table
//! reads and writes exist on the node, so single-field updates are done as
//! read-modify-write of the full table.

use anyhow::{Context, Result};
use ledpwm_hw::node::{self, OP_READ, OP_WRITE};
use ledpwm_hw::{ChannelId, ChannelTable, Field, TABLE_SIZE};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

/// Default device node path.
pub const DEFAULT_NODE_PATH: &str = "/run/led_driver.sock";

/// Open handle on the device node.
pub struct DeviceClient {
    stream: UnixStream,
}

impl DeviceClient {
    /// Opens the device node at `path`.
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .with_context(|| format!("Failed to open device node {:?}", path))?;
        debug!("Connected to device node {:?}", path);
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Reads `size` bytes from the device. Anything but one table size is
    /// rejected by the device.
    pub async fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        self.stream
            .write_all(&node::encode_header(OP_READ, size as u32))
            .await?;
        self.stream.flush().await?;

        let status = self.read_status(size).await?;
        let mut data = vec![0u8; status];
        self.stream
            .read_exact(&mut data)
            .await
            .context("Device node closed during read")?;
        Ok(data)
    }

    /// Writes `data` to the device, returning the accepted byte count.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.stream
            .write_all(&node::encode_header(OP_WRITE, data.len() as u32))
            .await?;
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        self.read_status(data.len()).await
    }

    async fn read_status(&mut self, requested: usize) -> Result<usize> {
        let mut status = [0u8; 4];
        self.stream
            .read_exact(&mut status)
            .await
            .context("Device node closed before replying")?;
        let status = i32::from_le_bytes(status);
        if status < 0 {
            return Err(node::error_for(status, requested).into());
        }
        Ok(status as usize)
    }

    /// Reads the whole channel table.
    pub async fn read_table(&mut self) -> Result<ChannelTable> {
        let data = self.read(TABLE_SIZE).await?;
        Ok(ChannelTable::from_bytes(&data)?)
    }

    /// Replaces the whole channel table.
    pub async fn write_table(&mut self, table: &ChannelTable) -> Result<()> {
        self.write(&table.to_bytes()).await?;
        Ok(())
    }

    /// Returns one field of one channel.
    pub async fn get(&mut self, channel: ChannelId, field: Field) -> Result<i32> {
        Ok(self.read_table().await?.channel(channel).get(field))
    }

    /// Sets one field of one channel, leaving everything else as read.
    pub async fn set(&mut self, channel: ChannelId, field: Field, value: i32) -> Result<()> {
        let mut table = self.read_table().await?;
        table.channel_mut(channel).set(field, value);
        self.write_table(&table).await?;
        debug!("Set {} {} to {}", channel, field, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledpwm_hw::{ChannelState, ChannelStore, LedDevice};
    use std::sync::Arc;

    fn connect_pair(store: Arc<ChannelStore>) -> DeviceClient {
        let (client, mut server) = UnixStream::pair().unwrap();
        let device = LedDevice::new(store).open();
        tokio::spawn(async move { node::serve(&mut server, &device).await });
        DeviceClient::from_stream(client)
    }

    #[tokio::test]
    async fn test_table_round_trip() {
        let store = Arc::new(ChannelStore::default());
        let mut client = connect_pair(store.clone());
        let table = ChannelTable::new([
            ChannelState::new(true, 50, 1000),
            ChannelState::new(false, 25, 400),
            ChannelState::new(true, 0, 0),
            ChannelState::new(true, 100, 2000),
        ]);

        client.write_table(&table).await.unwrap();
        assert_eq!(client.read_table().await.unwrap(), table);
        assert_eq!(store.snapshot(), table);
    }

    #[tokio::test]
    async fn test_size_mismatch_surfaces() {
        let store = Arc::new(ChannelStore::default());
        let mut client = connect_pair(store.clone());

        let err = client.read(12).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ledpwm_hw::Error>(),
            Some(ledpwm_hw::Error::SizeMismatch { actual: 12, .. })
        ));
        assert!(client.write(&[0u8; 50]).await.is_err());
        assert_eq!(store.snapshot(), ChannelTable::default());
    }

    #[tokio::test]
    async fn test_set_field_keeps_others() {
        let store = Arc::new(ChannelStore::new(ChannelTable::uniform(ChannelState::new(
            true, 50, 1000,
        ))));
        let mut client = connect_pair(store.clone());
        let channel = ChannelId::new(3).unwrap();

        client.set(channel, Field::Period, 4000).await.unwrap();
        assert_eq!(client.get(channel, Field::Period).await.unwrap(), 4000);
        assert_eq!(store.snapshot().channel(channel), ChannelState::new(true, 50, 4000));
        assert_eq!(
            store.snapshot().channel(ChannelId::new(0).unwrap()),
            ChannelState::new(true, 50, 1000)
        );
    }
}
