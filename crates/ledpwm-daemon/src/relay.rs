//! Board side of the command relay.
//!
//! Keeps a connection to the controller open and feeds its frames into the
//! device interface, reconnecting whenever the connection drops.

use ledpwm_hw::{relay, LedDevice};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{info, warn};

/// Interval between repeated connect error logs.
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub async fn relay_loop(controller: String, device: LedDevice, reconnect: Duration) {
    let mut errors = ConnectErrors::default();

    loop {
        match TcpStream::connect(&controller).await {
            Ok(mut stream) => {
                errors.reset();
                info!("Relay connected to controller {}", controller);
                let handle = device.open();
                match relay::serve(&mut stream, &handle).await {
                    Ok(()) => info!("Controller {} closed the relay connection", controller),
                    Err(e) => warn!("Relay connection to {} failed: {}", controller, e),
                }
                handle.close();
            }
            Err(e) => match errors.record() {
                Some((1, _)) => warn!("Relay connect error: {}", e),
                Some((repeated, elapsed)) => warn!(
                    "Relay connect error (repeated {} times in {:?}): {}",
                    repeated, elapsed, e
                ),
                None => {}
            },
        }
        tokio::time::sleep(reconnect).await;
    }
}

/// Counts failed connects between logs. Only log errors once per minute or
/// on the first error of a failing stretch.
#[derive(Debug, Default)]
struct ConnectErrors {
    unlogged: u32,
    last_log: Option<Instant>,
}

impl ConnectErrors {
    /// Records one failure. Returns the failures covered by this log line
    /// and the time since the previous one when it is due.
    fn record(&mut self) -> Option<(u32, Duration)> {
        let now = Instant::now();
        let elapsed = self.last_log.map_or(Duration::ZERO, |at| now - at);
        if self.last_log.is_some() && elapsed < ERROR_LOG_INTERVAL {
            self.unlogged += 1;
            return None;
        }
        let repeated = self.unlogged + 1;
        self.unlogged = 0;
        self.last_log = Some(now);
        Some((repeated, elapsed))
    }

    fn reset(&mut self) {
        self.unlogged = 0;
        self.last_log = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledpwm_hw::relay::CommandFrame;
    use ledpwm_hw::{ChannelId, ChannelState, ChannelStore, ChannelTable, Field};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[tokio::test(start_paused = true)]
    async fn test_connect_errors_count_since_last_log() {
        let mut errors = ConnectErrors::default();
        assert_eq!(errors.record(), Some((1, Duration::ZERO)));

        for _ in 0..11 {
            tokio::time::advance(Duration::from_secs(5)).await;
            assert_eq!(errors.record(), None);
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(errors.record(), Some((12, ERROR_LOG_INTERVAL)));

        // The next window counts from zero again
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(errors.record(), None);
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(errors.record(), None);
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(errors.record(), Some((3, ERROR_LOG_INTERVAL)));

        // A successful connect starts a new failing stretch
        errors.reset();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(errors.record(), Some((1, Duration::ZERO)));
    }

    #[tokio::test]
    async fn test_relay_serves_controller() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let store = Arc::new(ChannelStore::new(ChannelTable::uniform(ChannelState::new(
            true, 50, 1000,
        ))));
        let task = tokio::spawn(relay_loop(
            addr,
            LedDevice::new(store.clone()),
            Duration::from_millis(10),
        ));

        let (mut stream, _) = listener.accept().await.unwrap();
        let channel = ChannelId::new(0).unwrap();
        relay::request(&mut stream, &CommandFrame::write(channel, Field::DutyCycle, 10))
            .await
            .unwrap();
        let value = relay::request(&mut stream, &CommandFrame::read(channel, Field::DutyCycle))
            .await
            .unwrap();
        assert_eq!(value, Some(10));
        assert_eq!(store.snapshot().channel(channel), ChannelState::new(true, 10, 1000));

        // Dropping the connection makes the relay dial again
        drop(stream);
        assert!(listener.accept().await.is_ok());
        task.abort();
    }
}
