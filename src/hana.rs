//! hdbnsutil wrapper.
//!
//! `hdbnsutil` must run as the `<sid>adm` user, so every invocation goes
//! through `/usr/bin/su -lc`. The `-sr_state -sapcontrol=1` output is a flat
//! `key=value` listing which is parsed into [`SystemReplicationState`].

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cmdkit::CommandExecutor;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// System replication facts reported by `hdbnsutil -sr_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemReplicationState {
    pub online: bool,
    pub mode: String,
    pub operation_mode: String,
}

impl SystemReplicationState {
    /// A secondary is registered while its replication mode is anything
    /// other than `none`.
    pub fn is_registered(&self) -> bool {
        self.mode != "none"
    }

    pub fn is_online(&self) -> bool {
        self.online
    }
}

/// hdbnsutil calls used by the operators.
#[async_trait]
pub trait Hdbnsutil: Send + Sync {
    async fn system_replication_state(
        &self,
        token: &CancellationToken,
        sid: &str,
    ) -> Result<SystemReplicationState>;

    /// `hdbnsutil -sr_unregister`.
    async fn unregister_secondary(&self, token: &CancellationToken, sid: &str) -> Result<()>;
}

/// Default client shelling out as `<sid>adm`.
pub struct HdbnsutilClient {
    executor: Arc<dyn CommandExecutor>,
    key_value_pattern: Regex,
}

impl HdbnsutilClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            key_value_pattern: Regex::new(r"(?m)^\s*([^=\s]+)=(.*)$").expect("valid pattern"),
        }
    }

    async fn run(
        &self,
        token: &CancellationToken,
        command: &str,
        sid: &str,
    ) -> Result<Vec<u8>> {
        let user = format!("{}adm", sid.to_lowercase());
        let command_line = format!("hdbnsutil {command}");

        self.executor
            .exec(token, "/usr/bin/su", &["-lc", &command_line, &user])
            .await
            .with_context(|| format!("could not execute hdbnsutil command '{command_line}'"))
    }

    fn parse_replication_state(&self, output: &str) -> SystemReplicationState {
        let mut online = false;
        let mut mode = String::new();
        let mut operation_mode = String::new();

        for capture in self.key_value_pattern.captures_iter(output) {
            let value = capture[2].trim();
            match &capture[1] {
                "online" => online = value == "true",
                "mode" => mode = value.to_string(),
                "operation_mode" => operation_mode = value.to_string(),
                _ => {}
            }
        }

        SystemReplicationState {
            online,
            mode,
            operation_mode,
        }
    }
}

#[async_trait]
impl Hdbnsutil for HdbnsutilClient {
    async fn system_replication_state(
        &self,
        token: &CancellationToken,
        sid: &str,
    ) -> Result<SystemReplicationState> {
        let output = self
            .run(token, "-sr_state -sapcontrol=1", sid)
            .await?;

        let state = self.parse_replication_state(&String::from_utf8_lossy(&output));
        debug!(?state, sid, "system replication state");
        Ok(state)
    }

    async fn unregister_secondary(&self, token: &CancellationToken, sid: &str) -> Result<()> {
        self.run(token, "-sr_unregister", sid)
            .await
            .with_context(|| format!("could not unregister HANA secondary instance {sid}"))?;

        info!(sid, "HANA secondary instance unregistered successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingExecutor {
        output: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn exec(
            &self,
            _token: &CancellationToken,
            program: &str,
            args: &[&str],
        ) -> cmdkit::Result<Vec<u8>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{program} {}", args.join(" ")));
            Ok(self.output.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_parse_replication_state() {
        let client = HdbnsutilClient::new(Arc::new(RecordingExecutor {
            output: "",
            calls: Mutex::new(Vec::new()),
        }));

        let state = client.parse_replication_state(
            "online=true\nmode=sync\noperation_mode=logreplay\nsite id=2\n",
        );
        assert!(state.is_online());
        assert!(state.is_registered());
        assert_eq!(state.mode, "sync");
        assert_eq!(state.operation_mode, "logreplay");

        let state = client.parse_replication_state("online=false\nmode=none\n");
        assert!(!state.is_online());
        assert!(!state.is_registered());
    }

    #[tokio::test]
    async fn test_commands_run_as_sidadm() {
        let executor = Arc::new(RecordingExecutor {
            output: "mode=none\n",
            calls: Mutex::new(Vec::new()),
        });
        let client = HdbnsutilClient::new(executor.clone());
        let token = CancellationToken::new();

        client
            .system_replication_state(&token, "PRD")
            .await
            .unwrap();
        client.unregister_secondary(&token, "PRD").await.unwrap();

        let calls = executor.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "/usr/bin/su -lc hdbnsutil -sr_state -sapcontrol=1 prdadm",
                "/usr/bin/su -lc hdbnsutil -sr_unregister prdadm",
            ]
        );
    }
}
