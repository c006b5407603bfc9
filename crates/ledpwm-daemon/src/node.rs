//! Device node server.
//!
//! Publishes the LED device as a Unix socket. Each accepted connection is
//! one open handle served until the peer hangs up.

use anyhow::{bail, Context, Result};
use ledpwm_hw::{node, LedDevice};
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Registered device node.
pub struct DeviceNode {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl DeviceNode {
    /// Binds the node at `path` and starts serving. A stale socket left by
    /// a previous run is replaced; a live node or any other file at `path`
    /// is a conflict. Failing to bind is fatal for the caller.
    pub fn register<P: AsRef<Path>>(path: P, device: LedDevice) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        remove_stale_socket(&path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Failed to register device node {:?}", path))?;
        info!("Device node registered at {:?}", path);

        let task = tokio::spawn(accept_loop(listener, device));
        Ok(Self { path, task })
    }

    /// Stops accepting connections and removes the socket file.
    pub fn unregister(self) {
        self.task.abort();
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove device node {:?}: {}", self.path, e);
        }
        info!("Device node unregistered");
    }
}

/// Removes a socket at `path` that nobody listens on any more.
fn remove_stale_socket(path: &Path) -> Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("Failed to inspect {:?}", path)),
    };
    if !metadata.file_type().is_socket() {
        bail!("Device node path {:?} exists and is not a socket", path);
    }

    match std::os::unix::net::UnixStream::connect(path) {
        Ok(_) => bail!("Device node {:?} is in use", path),
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale device node {:?}", path))?;
            info!("Removed stale device node {:?}", path);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to check device node {:?}", path)),
    }
}

async fn accept_loop(listener: UnixListener, device: LedDevice) {
    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let handle = device.open();
                tokio::spawn(async move {
                    if let Err(e) = node::serve(&mut stream, &handle).await {
                        warn!("Device node connection failed: {}", e);
                    }
                    handle.close();
                });
            }
            Err(e) => {
                warn!("Device node accept failed: {}", e);
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
        debug!("Device node ready for next connection");
    }
}
