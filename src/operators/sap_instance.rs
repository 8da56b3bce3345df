//! SAP instance start/stop operators.
//!
//! Instance state is read through `GetProcessList`: started means a
//! non-empty process list with every process GREEN, stopped means every
//! process GRAY. Verify and rollback wait for the target color under the
//! caller-provided timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use operator::{
    ArgumentError, Arguments, ArgumentsExt, BaseOperator, BaseOptions, Executor, Phaser,
    PlanOutcome, Snapshot, sleep_cancellable,
};
use sapcontrol::{SapControl, StateColor, UdsClient};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const SAP_INSTANCE_START: &str = "sapinstancestart";
pub const SAP_INSTANCE_STOP: &str = "sapinstancestop";

const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_STATE_INTERVAL: Duration = Duration::from_secs(10);

/// Options shared by the instance start/stop operators.
#[derive(Default)]
pub struct SapInstanceOptions {
    pub base: BaseOptions,
    /// Connector override; defaults to the UNIX-socket client derived from
    /// the `instance_number` argument.
    pub sapcontrol: Option<Arc<dyn SapControl>>,
    /// Interval between state probes.
    pub poll_interval: Option<Duration>,
}

pub(super) struct InstanceArguments {
    pub instance_number: String,
    pub timeout: Duration,
}

pub(super) fn parse_instance_arguments(arguments: &Arguments) -> Result<InstanceArguments> {
    let instance_number = arguments.required_string("instance_number")?;
    if instance_number.len() != 2 {
        return Err(ArgumentError::Invalid {
            name: "instance_number".to_string(),
            expected: "two character string",
            value: Value::String(instance_number),
        }
        .into());
    }

    let timeout = match arguments.optional_number("timeout")? {
        None => DEFAULT_STATE_TIMEOUT,
        Some(seconds) => Duration::try_from_secs_f64(seconds).map_err(|_| {
            ArgumentError::Invalid {
                name: "timeout".to_string(),
                expected: "number",
                value: Value::from(seconds),
            }
        })?,
    };

    Ok(InstanceArguments {
        instance_number,
        timeout,
    })
}

#[derive(Debug, Clone, Serialize)]
struct StartedState {
    started: bool,
}

#[derive(Debug, Clone, Serialize)]
struct StoppedState {
    stopped: bool,
}

/// Whether every process reported by the instance carries the expected
/// dispatch color.
///
/// `GetProcessList` transiently returns an empty list while the instance
/// comes up; an empty list never counts as being in the target state.
async fn all_processes_in_state(
    sapcontrol: &dyn SapControl,
    token: &CancellationToken,
    expected: StateColor,
) -> Result<bool> {
    let processes = sapcontrol
        .process_list(token)
        .await
        .context("error getting instance process list")?;

    if processes.is_empty() {
        return Ok(false);
    }

    Ok(processes
        .iter()
        .all(|process| process.dispstatus == Some(expected)))
}

/// Poll until every process carries the expected color or the deadline
/// passes. The deadline is checked after the probe and before the state, so
/// a zero timeout fails even when the state already matches.
async fn wait_until_instance_state(
    sapcontrol: &dyn SapControl,
    token: &CancellationToken,
    expected: StateColor,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let in_state = all_processes_in_state(sapcontrol, token, expected).await?;

        if tokio::time::Instant::now() >= deadline {
            bail!("error waiting until instance is in desired state");
        }
        if in_state {
            return Ok(());
        }

        sleep_cancellable(token, interval).await?;
    }
}

/// Starts a SAP instance through sapcontrol.
pub struct SapInstanceStart {
    base: BaseOperator,
    sapcontrol: Option<Arc<dyn SapControl>>,
    interval: Duration,
    parsed: Option<InstanceArguments>,
    snapshot: Snapshot<StartedState>,
}

impl SapInstanceStart {
    pub fn build(arguments: Arguments, operation_id: &str, options: SapInstanceOptions) -> Executor {
        let phaser = Self {
            base: BaseOperator::new(SAP_INSTANCE_START, operation_id, arguments),
            sapcontrol: options.sapcontrol,
            interval: options.poll_interval.unwrap_or(DEFAULT_STATE_INTERVAL),
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }

    fn sapcontrol(&self) -> Result<&dyn SapControl> {
        self.sapcontrol
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("sapcontrol connector not initialized"))
    }

    fn timeout(&self) -> Duration {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.timeout)
            .unwrap_or(DEFAULT_STATE_TIMEOUT)
    }
}

#[async_trait]
impl Phaser for SapInstanceStart {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let parsed = parse_instance_arguments(self.base.arguments())?;

        if self.sapcontrol.is_none() {
            self.sapcontrol = Some(Arc::new(UdsClient::new(&parsed.instance_number)));
        }
        self.parsed = Some(parsed);

        let started =
            all_processes_in_state(self.sapcontrol()?, token, StateColor::Green)
                .await
                .context("error checking processes state")?;

        self.snapshot.record_before(StartedState { started });

        if started {
            self.base.span().in_scope(|| {
                info!("instance already started, skipping operation");
            });
            self.snapshot.record_after(StartedState { started });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .start(token)
            .await
            .context("error starting instance")
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        wait_until_instance_state(
            self.sapcontrol()?,
            token,
            StateColor::Green,
            self.timeout(),
            self.interval,
        )
        .await
        .context("verify instance started failed")?;

        self.snapshot.record_after(StartedState { started: true });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .stop(token)
            .await
            .context("error stopping instance")?;

        wait_until_instance_state(
            self.sapcontrol()?,
            token,
            StateColor::Gray,
            self.timeout(),
            self.interval,
        )
        .await
        .context("rollback to stopped failed")
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}

/// Stops a SAP instance through sapcontrol.
pub struct SapInstanceStop {
    base: BaseOperator,
    sapcontrol: Option<Arc<dyn SapControl>>,
    interval: Duration,
    parsed: Option<InstanceArguments>,
    snapshot: Snapshot<StoppedState>,
}

impl SapInstanceStop {
    pub fn build(arguments: Arguments, operation_id: &str, options: SapInstanceOptions) -> Executor {
        let phaser = Self {
            base: BaseOperator::new(SAP_INSTANCE_STOP, operation_id, arguments),
            sapcontrol: options.sapcontrol,
            interval: options.poll_interval.unwrap_or(DEFAULT_STATE_INTERVAL),
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }

    fn sapcontrol(&self) -> Result<&dyn SapControl> {
        self.sapcontrol
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("sapcontrol connector not initialized"))
    }

    fn timeout(&self) -> Duration {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.timeout)
            .unwrap_or(DEFAULT_STATE_TIMEOUT)
    }
}

#[async_trait]
impl Phaser for SapInstanceStop {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let parsed = parse_instance_arguments(self.base.arguments())?;

        if self.sapcontrol.is_none() {
            self.sapcontrol = Some(Arc::new(UdsClient::new(&parsed.instance_number)));
        }
        self.parsed = Some(parsed);

        let stopped = all_processes_in_state(self.sapcontrol()?, token, StateColor::Gray)
            .await
            .context("error checking processes state")?;

        self.snapshot.record_before(StoppedState { stopped });

        if stopped {
            self.base.span().in_scope(|| {
                info!("instance already stopped, skipping operation");
            });
            self.snapshot.record_after(StoppedState { stopped });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .stop(token)
            .await
            .context("error stopping instance")
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        wait_until_instance_state(
            self.sapcontrol()?,
            token,
            StateColor::Gray,
            self.timeout(),
            self.interval,
        )
        .await
        .context("verify instance stopped failed")?;

        self.snapshot.record_after(StoppedState { stopped: true });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .start(token)
            .await
            .context("error starting instance")?;

        wait_until_instance_state(
            self.sapcontrol()?,
            token,
            StateColor::Green,
            self.timeout(),
            self.interval,
        )
        .await
        .context("rollback to started failed")
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}
