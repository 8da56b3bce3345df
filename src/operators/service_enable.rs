//! systemd service enablement operators.
//!
//! `pacemakerenable`/`pacemakerdisable` toggle the pacemaker unit's
//! enablement over the system bus. The bus connection is opened lazily in
//! Plan and always released in the `after` hook, whatever the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use operator::{Arguments, BaseOperator, BaseOptions, Executor, Phaser, PlanOutcome, Snapshot};
use serde::Serialize;
use sysbus::{BusLoader, Systemd, SystemdLoader};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const PACEMAKER_ENABLE: &str = "pacemakerenable";
pub const PACEMAKER_DISABLE: &str = "pacemakerdisable";
pub const PACEMAKER_SERVICE: &str = "pacemaker.service";

/// Options shared by the enable/disable operators.
#[derive(Default)]
pub struct ServiceOptions {
    pub base: BaseOptions,
    /// Unit to manage; defaults to [`PACEMAKER_SERVICE`].
    pub service: Option<String>,
    /// Loader override; defaults to the system-bus loader.
    pub loader: Option<Arc<dyn SystemdLoader>>,
}

impl ServiceOptions {
    fn split(self) -> (String, Arc<dyn SystemdLoader>) {
        (
            self.service
                .unwrap_or_else(|| PACEMAKER_SERVICE.to_string()),
            self.loader.unwrap_or_else(|| Arc::new(BusLoader)),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
struct EnablementState {
    enabled: bool,
}

/// Enables a systemd unit and reloads the daemon.
pub struct ServiceEnable {
    base: BaseOperator,
    service: String,
    loader: Arc<dyn SystemdLoader>,
    connector: Option<Box<dyn Systemd>>,
    snapshot: Snapshot<EnablementState>,
}

impl ServiceEnable {
    pub fn build(arguments: Arguments, operation_id: &str, options: ServiceOptions) -> Executor {
        let (service, loader) = options.split();
        let phaser = Self {
            base: BaseOperator::new(PACEMAKER_ENABLE, operation_id, arguments),
            service,
            loader,
            connector: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }
}

/// Disables a systemd unit and reloads the daemon.
pub struct ServiceDisable {
    base: BaseOperator,
    service: String,
    loader: Arc<dyn SystemdLoader>,
    connector: Option<Box<dyn Systemd>>,
    snapshot: Snapshot<EnablementState>,
}

impl ServiceDisable {
    pub fn build(arguments: Arguments, operation_id: &str, options: ServiceOptions) -> Executor {
        let (service, loader) = options.split();
        let phaser = Self {
            base: BaseOperator::new(PACEMAKER_DISABLE, operation_id, arguments),
            service,
            loader,
            connector: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }
}

/// The unit name without its `.service` suffix, for messages.
fn service_display(service: &str) -> &str {
    service.trim_end_matches(".service")
}

async fn connect_and_probe(
    loader: &dyn SystemdLoader,
    token: &CancellationToken,
    service: &str,
) -> Result<(Box<dyn Systemd>, bool)> {
    let connector = loader
        .connect()
        .await
        .context("unable to initialize systemd connector")?;

    let enabled = connector
        .is_enabled(token, service)
        .await
        .with_context(|| {
            format!(
                "failed to check if {} service is enabled",
                service_display(service)
            )
        })?;

    Ok((connector, enabled))
}

#[async_trait]
impl Phaser for ServiceEnable {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let (connector, enabled) =
            connect_and_probe(self.loader.as_ref(), token, &self.service).await?;
        self.connector = Some(connector);

        self.snapshot.record_before(EnablementState { enabled });

        if enabled {
            self.base.span().in_scope(|| {
                info!(service = %self.service, "service already enabled, skipping operation");
            });
            self.snapshot.record_after(EnablementState { enabled });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        let connector = self
            .connector
            .as_deref()
            .ok_or_else(|| anyhow!("systemd connector not initialized"))?;
        connector.enable(token, &self.service).await?;
        Ok(())
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let connector = self
            .connector
            .as_deref()
            .ok_or_else(|| anyhow!("systemd connector not initialized"))?;

        let enabled = connector
            .is_enabled(token, &self.service)
            .await
            .with_context(|| {
                format!(
                    "failed to check if {} service is enabled",
                    service_display(&self.service)
                )
            })?;

        if !enabled {
            bail!("{} service is not enabled", service_display(&self.service));
        }

        self.snapshot.record_after(EnablementState { enabled });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        let connector = self
            .connector
            .as_deref()
            .ok_or_else(|| anyhow!("systemd connector not initialized"))?;
        connector.disable(token, &self.service).await?;
        Ok(())
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }

    async fn after(&mut self) {
        if let Some(mut connector) = self.connector.take() {
            connector.close().await;
        }
    }
}

#[async_trait]
impl Phaser for ServiceDisable {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let (connector, enabled) =
            connect_and_probe(self.loader.as_ref(), token, &self.service).await?;
        self.connector = Some(connector);

        self.snapshot.record_before(EnablementState { enabled });

        if !enabled {
            self.base.span().in_scope(|| {
                info!(service = %self.service, "service already disabled, skipping operation");
            });
            self.snapshot.record_after(EnablementState { enabled });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        let connector = self
            .connector
            .as_deref()
            .ok_or_else(|| anyhow!("systemd connector not initialized"))?;
        connector.disable(token, &self.service).await?;
        Ok(())
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let connector = self
            .connector
            .as_deref()
            .ok_or_else(|| anyhow!("systemd connector not initialized"))?;

        let enabled = connector
            .is_enabled(token, &self.service)
            .await
            .with_context(|| {
                format!(
                    "failed to check if {} service is enabled",
                    service_display(&self.service)
                )
            })?;

        if enabled {
            bail!(
                "{} service is still enabled",
                service_display(&self.service)
            );
        }

        self.snapshot.record_after(EnablementState { enabled });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        let connector = self
            .connector
            .as_deref()
            .ok_or_else(|| anyhow!("systemd connector not initialized"))?;
        connector.enable(token, &self.service).await?;
        Ok(())
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }

    async fn after(&mut self) {
        if let Some(mut connector) = self.connector.take() {
            connector.close().await;
        }
    }
}
