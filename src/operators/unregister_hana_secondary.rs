//! HANA secondary unregistration operator.
//!
//! Detaches a registered HANA system-replication secondary from its
//! primary. There is no rollback: re-registering needs the primary's
//! coordinates, which this operator does not receive.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use operator::{
    Arguments, ArgumentsExt, BaseOperator, BaseOptions, Executor, Phaser, PlanOutcome, Snapshot,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::hana::{Hdbnsutil, HdbnsutilClient};

pub const UNREGISTER_HANA_SECONDARY: &str = "unregisterhanasecondary";

/// Options for [`UnregisterHanaSecondary`].
#[derive(Default)]
pub struct UnregisterHanaSecondaryOptions {
    pub base: BaseOptions,
    /// hdbnsutil override; defaults to the CLI client on the base executor.
    pub hdbnsutil: Option<Arc<dyn Hdbnsutil>>,
}

struct SidArguments {
    sid: String,
}

fn parse_sid_arguments(arguments: &Arguments) -> Result<SidArguments> {
    Ok(SidArguments {
        sid: arguments.required_string("sid")?,
    })
}

#[derive(Debug, Clone, Serialize)]
struct RegistrationState {
    registered: bool,
}

/// Unregisters a HANA system-replication secondary via hdbnsutil.
pub struct UnregisterHanaSecondary {
    base: BaseOperator,
    hdbnsutil: Arc<dyn Hdbnsutil>,
    parsed: Option<SidArguments>,
    snapshot: Snapshot<RegistrationState>,
}

impl UnregisterHanaSecondary {
    pub fn build(
        arguments: Arguments,
        operation_id: &str,
        options: UnregisterHanaSecondaryOptions,
    ) -> Executor {
        let hdbnsutil = match options.hdbnsutil {
            Some(client) => client,
            None => Arc::new(HdbnsutilClient::new(options.base.executor())),
        };

        let phaser = Self {
            base: BaseOperator::new(UNREGISTER_HANA_SECONDARY, operation_id, arguments),
            hdbnsutil,
            parsed: None,
            snapshot: Snapshot::new(),
        };
        Executor::new(Box::new(phaser), operation_id)
    }

    fn sid(&self) -> &str {
        self.parsed
            .as_ref()
            .map(|arguments| arguments.sid.as_str())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Phaser for UnregisterHanaSecondary {
    async fn plan(&mut self, token: &CancellationToken) -> Result<PlanOutcome> {
        self.parsed = Some(parse_sid_arguments(self.base.arguments())?);

        let state = self
            .hdbnsutil
            .system_replication_state(token, self.sid())
            .await?;

        let registered = state.is_registered();
        self.snapshot.record_before(RegistrationState { registered });

        if !registered {
            self.base.span().in_scope(|| {
                info!(sid = %self.sid(), "HANA secondary already unregistered, skipping operation");
            });
            self.snapshot.record_after(RegistrationState { registered });
            return Ok(PlanOutcome::AlreadyApplied);
        }

        Ok(PlanOutcome::MutationRequired)
    }

    async fn commit(&mut self, token: &CancellationToken) -> Result<()> {
        self.hdbnsutil
            .unregister_secondary(token, self.sid())
            .await
    }

    async fn verify(&mut self, token: &CancellationToken) -> Result<()> {
        let state = self
            .hdbnsutil
            .system_replication_state(token, self.sid())
            .await?;

        if state.is_registered() {
            bail!(
                "verify unregister failed, HANA secondary instance {} is still registered",
                self.sid()
            );
        }

        self.snapshot
            .record_after(RegistrationState { registered: false });
        Ok(())
    }

    async fn rollback(&mut self, _token: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn operation_diff(&self) -> HashMap<String, String> {
        self.snapshot.diff()
    }
}
