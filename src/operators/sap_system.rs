//! SAP system start/stop operators.
//!
//! System state is read through `GetSystemInstanceList` and filtered by the
//! `instance_type` argument: instances whose `features` string does not
//! contain the selector's tag are ignored. The `StartSystem`/`StopSystem`
//! calls carry the same selector on the wire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use operator::{
    Arguments, ArgumentsExt, BaseOperator, BaseOptions, Executor, Phaser, PlanOutcome, Snapshot,
    sleep_cancellable,
};
use sapcontrol::{SapControl, StartStopOption, StateColor, UdsClient};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::sap_instance::parse_instance_arguments;

pub const SAP_SYSTEM_START: &str = "sapsystemstart";
pub const SAP_SYSTEM_STOP: &str = "sapsystemstop";

const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_STATE_INTERVAL: Duration = Duration::from_secs(10);

/// Options shared by the system start/stop operators.
#[derive(Default)]
pub struct SapSystemOptions {
    pub base: BaseOptions,
    /// Connector override; defaults to the UNIX-socket client derived from
    /// the `instance_number` argument.
    pub sapcontrol: Option<Arc<dyn SapControl>>,
    /// Interval between state probes.
    pub poll_interval: Option<Duration>,
}

struct SystemArguments {
    instance_number: String,
    timeout: Duration,
    instance_type: StartStopOption,
}

fn parse_system_arguments(arguments: &Arguments) -> Result<SystemArguments> {
    let instance = parse_instance_arguments(arguments)?;

    let instance_type = match arguments.optional_string("instance_type")? {
        None => StartStopOption::AllInstances,
        Some(value) => match value.as_str() {
            "all" => StartStopOption::AllInstances,
            "abap" => StartStopOption::AbapInstances,
            "j2ee" => StartStopOption::J2eeInstances,
            "scs" => StartStopOption::ScsInstances,
            "enqrep" => StartStopOption::EnqrepInstances,
            other => bail!("invalid instance_type value: {other}"),
        },
    };

    Ok(SystemArguments {
        instance_number: instance.instance_number,
        timeout: instance.timeout,
        instance_type,
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

/// Whether every instance selected by `instance_type` carries the expected
/// dispatch color.
async fn all_instances_in_state(
    sapcontrol: &dyn SapControl,
    token: &CancellationToken,
    instance_type: StartStopOption,
    expected: StateColor,
) -> Result<bool> {
    let instances = sapcontrol
        .system_instance_list(token)
        .await
        .context("error getting instance list")?;

    let filter = instance_type.features_filter();
    Ok(instances
        .iter()
        .filter(|instance| instance.features.contains(filter))
        .all(|instance| instance.dispstatus == Some(expected)))
}

/// Poll until the selected instances carry the expected color or the
/// deadline passes; same probe→deadline→state ordering as the instance
/// wait.
async fn wait_until_system_state(
    sapcontrol: &dyn SapControl,
    token: &CancellationToken,
    instance_type: StartStopOption,
    expected: StateColor,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let in_state =
            all_instances_in_state(sapcontrol, token, instance_type, expected).await?;

        if tokio::time::Instant::now() >= deadline {
            bail!("error waiting until system is in desired state");
        }
        if in_state {
            return Ok(());
        }

        sleep_cancellable(token, interval).await?;
    }
}

/// Starts a SAP system through sapcontrol.
pub struct SapSystemStart {
    base: BaseOperator,
    sapcontrol: Option<Arc<dyn SapControl>>,
    interval: Duration,
    parsed: Option<SystemArguments>,
    snapshot: Snapshot<StartedState>,
}

impl SapSystemStart {
    pub fn build(arguments: Arguments, operation_id: &str, options: SapSystemOptions) -> Executor {
        let phaser = Self {
            base: BaseOperator::new(SAP_SYSTEM_START, operation_id, arguments),
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

    fn instance_type(&self) -> StartStopOption {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.instance_type)
            .unwrap_or_default()
    }

    fn timeout(&self) -> Duration {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.timeout)
            .unwrap_or(DEFAULT_STATE_TIMEOUT)
    }
}

#[async_trait]
impl Phaser for SapSystemStart {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let parsed = parse_system_arguments(self.base.arguments())?;

        if self.sapcontrol.is_none() {
            self.sapcontrol = Some(Arc::new(UdsClient::new(&parsed.instance_number)));
        }
        self.parsed = Some(parsed);

        let started = all_instances_in_state(
            self.sapcontrol()?,
            token,
            self.instance_type(),
            StateColor::Green,
        )
        .await
        .context("error checking system state")?;

        self.snapshot.record_before(StartedState { started });

        if started {
            self.base.span().in_scope(|| {
                info!("system already started, skipping operation");
            });
            self.snapshot.record_after(StartedState { started });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .start_system(token, self.instance_type())
            .await
            .context("error starting system")
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        wait_until_system_state(
            self.sapcontrol()?,
            token,
            self.instance_type(),
            StateColor::Green,
            self.timeout(),
            self.interval,
        )
        .await
        .context("verify system started failed")?;

        self.snapshot.record_after(StartedState { started: true });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .stop_system(token, self.instance_type())
            .await
            .context("error stopping system")?;

        wait_until_system_state(
            self.sapcontrol()?,
            token,
            self.instance_type(),
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

/// Stops a SAP system through sapcontrol.
pub struct SapSystemStop {
    base: BaseOperator,
    sapcontrol: Option<Arc<dyn SapControl>>,
    interval: Duration,
    parsed: Option<SystemArguments>,
    snapshot: Snapshot<StoppedState>,
}

impl SapSystemStop {
    pub fn build(arguments: Arguments, operation_id: &str, options: SapSystemOptions) -> Executor {
        let phaser = Self {
            base: BaseOperator::new(SAP_SYSTEM_STOP, operation_id, arguments),
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

    fn instance_type(&self) -> StartStopOption {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.instance_type)
            .unwrap_or_default()
    }

    fn timeout(&self) -> Duration {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.timeout)
            .unwrap_or(DEFAULT_STATE_TIMEOUT)
    }
}

#[async_trait]
impl Phaser for SapSystemStop {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        let parsed = parse_system_arguments(self.base.arguments())?;

        if self.sapcontrol.is_none() {
            self.sapcontrol = Some(Arc::new(UdsClient::new(&parsed.instance_number)));
        }
        self.parsed = Some(parsed);

        let stopped = all_instances_in_state(
            self.sapcontrol()?,
            token,
            self.instance_type(),
            StateColor::Gray,
        )
        .await
        .context("error checking system state")?;

        self.snapshot.record_before(StoppedState { stopped });

        if stopped {
            self.base.span().in_scope(|| {
                info!("system already stopped, skipping operation");
            });
            self.snapshot.record_after(StoppedState { stopped });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .stop_system(token, self.instance_type())
            .await
            .context("error stopping system")
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        wait_until_system_state(
            self.sapcontrol()?,
            token,
            self.instance_type(),
            StateColor::Gray,
            self.timeout(),
            self.interval,
        )
        .await
        .context("verify system stopped failed")?;

        self.snapshot.record_after(StoppedState { stopped: true });
        Ok(())
    }

    async fn rollback(&mut self, token: &CancellationToken) -> Result<()> {
        self.sapcontrol()?
            .start_system(token, self.instance_type())
            .await
            .context("error starting system")?;

        wait_until_system_state(
            self.sapcontrol()?,
            token,
            self.instance_type(),
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
