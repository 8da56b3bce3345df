//! systemd manager proxy and connector.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

#[zbus::proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1"
)]
trait Manager {
    /// Unit file state, e.g. "enabled", "disabled", "static".
    fn get_unit_file_state(&self, file: &str) -> zbus::Result<String>;

    fn enable_unit_files(
        &self,
        files: &[&str],
        runtime: bool,
        force: bool,
    ) -> zbus::Result<(bool, Vec<(String, String, String)>)>;

    fn disable_unit_files(
        &self,
        files: &[&str],
        runtime: bool,
    ) -> zbus::Result<Vec<(String, String, String)>>;

    fn reload(&self) -> zbus::Result<()>;
}

/// Unit-file operations the operators drive.
#[async_trait]
pub trait Systemd: Send {
    /// Enable the unit and reload the daemon.
    async fn enable(&self, token: &CancellationToken, service: &str) -> Result<()>;

    /// Disable the unit and reload the daemon.
    async fn disable(&self, token: &CancellationToken, service: &str) -> Result<()>;

    /// Whether the unit file state is exactly "enabled".
    async fn is_enabled(&self, token: &CancellationToken, service: &str) -> Result<bool>;

    /// Release the bus connection. Further calls fail with
    /// [`Error::Closed`].
    async fn close(&mut self);
}

/// Creates connectors lazily; operators hold a loader and connect in Plan.
#[async_trait]
pub trait SystemdLoader: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Systemd>>;
}

/// Connector bound to the system bus.
///
/// The proxy keeps its own handle on the connection; dropping it tears the
/// bus link down.
pub struct BusConnector {
    manager: Option<ManagerProxy<'static>>,
}

impl BusConnector {
    /// Connect to the system bus and resolve the systemd manager.
    pub async fn system() -> Result<Self> {
        let connection = zbus::Connection::system()
            .await
            .map_err(Error::Connect)?;
        let manager = ManagerProxy::new(&connection)
            .await
            .map_err(Error::Connect)?;

        Ok(Self {
            manager: Some(manager),
        })
    }

    fn manager(&self) -> Result<&ManagerProxy<'static>> {
        self.manager.as_ref().ok_or(Error::Closed)
    }

    async fn reload(&self, token: &CancellationToken, service: &str) -> Result<()> {
        let manager = self.manager()?;
        tokio::select! {
            () = token.cancelled() => Err(Error::Cancelled),
            result = manager.reload() => result.map_err(|source| Error::Reload {
                service: service.to_string(),
                source,
            }),
        }
    }
}

#[async_trait]
impl Systemd for BusConnector {
    async fn enable(&self, token: &CancellationToken, service: &str) -> Result<()> {
        let manager = self.manager()?;
        let services = [service];
        tokio::select! {
            () = token.cancelled() => return Err(Error::Cancelled),
            result = manager.enable_unit_files(&services, false, true) => {
                result.map_err(|source| Error::Enable {
                    service: service.to_string(),
                    source,
                })?;
            }
        }

        self.reload(token, service).await
    }

    async fn disable(&self, token: &CancellationToken, service: &str) -> Result<()> {
        let manager = self.manager()?;
        let services = [service];
        tokio::select! {
            () = token.cancelled() => return Err(Error::Cancelled),
            result = manager.disable_unit_files(&services, false) => {
                result.map_err(|source| Error::Disable {
                    service: service.to_string(),
                    source,
                })?;
            }
        }

        self.reload(token, service).await
    }

    async fn is_enabled(&self, token: &CancellationToken, service: &str) -> Result<bool> {
        let manager = self.manager()?;
        let state = tokio::select! {
            () = token.cancelled() => return Err(Error::Cancelled),
            result = manager.get_unit_file_state(service) => {
                result.map_err(|source| Error::UnitFileState {
                    service: service.to_string(),
                    source,
                })?
            }
        };

        debug!(service, state = %state, "unit file state");
        Ok(state == "enabled")
    }

    async fn close(&mut self) {
        self.manager.take();
    }
}

/// Default loader connecting to the system bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusLoader;

#[async_trait]
impl SystemdLoader for BusLoader {
    async fn connect(&self) -> Result<Box<dyn Systemd>> {
        Ok(Box::new(BusConnector::system().await?))
    }
}
