//! Scripted collaborator stubs shared by the operator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cmdkit::CommandExecutor;
use crmsh::Cluster;
use sapcontrol::{OsProcess, SapControl, StartStopOption, StateColor, SystemInstance};
use saptune::Saptune;
use sysbus::{Systemd, SystemdLoader};
use tokio_util::sync::CancellationToken;

use crate::hana::{Hdbnsutil, SystemReplicationState};

/// One scripted reply for [`ScriptedExecutor`].
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(&'static str),
    Fail(&'static str),
}

/// Command executor stub keyed by full command line.
///
/// Each command line holds a reply sequence; once exhausted the last reply
/// repeats. Unscripted commands panic, naming the command.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<HashMap<String, (usize, Vec<Reply>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, command: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap()
            .insert(command.to_string(), (0, replies));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == command)
            .count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn exec(
        &self,
        _token: &CancellationToken,
        program: &str,
        args: &[&str],
    ) -> cmdkit::Result<Vec<u8>> {
        let command = format!("{program} {}", args.join(" "));
        self.calls.lock().unwrap().push(command.clone());

        let mut replies = self.replies.lock().unwrap();
        let (cursor, sequence) = replies
            .get_mut(&command)
            .unwrap_or_else(|| panic!("unscripted command: {command}"));

        let reply = sequence
            .get(*cursor)
            .or_else(|| sequence.last())
            .unwrap_or_else(|| panic!("no replies scripted for: {command}"))
            .clone();
        *cursor += 1;

        match reply {
            Reply::Ok(output) => Ok(output.as_bytes().to_vec()),
            Reply::Fail(output) => Err(cmdkit::Error::NonZeroExit {
                program: program.to_string(),
                code: 1,
                output: output.to_string(),
            }),
        }
    }
}

/// Saptune stub with an in-memory applied solution.
pub struct StubSaptune {
    version: String,
    applied: Mutex<String>,
    fail_mutations: AtomicBool,
    apply_calls: AtomicUsize,
    change_calls: AtomicUsize,
    revert_calls: AtomicUsize,
}

impl StubSaptune {
    pub fn new(version: &str, applied: &str) -> Self {
        Self {
            version: version.to_string(),
            applied: Mutex::new(applied.to_string()),
            fail_mutations: AtomicBool::new(false),
            apply_calls: AtomicUsize::new(0),
            change_calls: AtomicUsize::new(0),
            revert_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_mutations(&self) {
        self.fail_mutations.store(true, Ordering::SeqCst);
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn change_calls(&self) -> usize {
        self.change_calls.load(Ordering::SeqCst)
    }

    pub fn revert_calls(&self) -> usize {
        self.revert_calls.load(Ordering::SeqCst)
    }

    fn mutate(&self, verb: &'static str, solution: &str) -> saptune::Result<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(saptune::Error::SolutionChange {
                verb,
                solution: solution.to_string(),
                source: cmdkit::Error::NonZeroExit {
                    program: "saptune".into(),
                    code: 1,
                    output: "scripted failure".into(),
                },
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Saptune for StubSaptune {
    async fn check_version_support(&self, _token: &CancellationToken) -> saptune::Result<()> {
        let minimum = semver_triple("3.1.0");
        if semver_triple(&self.version) < minimum {
            return Err(saptune::Error::VersionNotSupported {
                installed: self.version.clone(),
                minimum: "v3.1.0".to_string(),
            });
        }
        Ok(())
    }

    async fn get_applied_solution(&self, _token: &CancellationToken) -> saptune::Result<String> {
        Ok(self.applied.lock().unwrap().clone())
    }

    async fn apply_solution(
        &self,
        _token: &CancellationToken,
        solution: &str,
    ) -> saptune::Result<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.mutate("apply", solution)?;
        *self.applied.lock().unwrap() = solution.to_string();
        Ok(())
    }

    async fn change_solution(
        &self,
        _token: &CancellationToken,
        solution: &str,
    ) -> saptune::Result<()> {
        self.change_calls.fetch_add(1, Ordering::SeqCst);
        self.mutate("change", solution)?;
        *self.applied.lock().unwrap() = solution.to_string();
        Ok(())
    }

    async fn revert_solution(
        &self,
        _token: &CancellationToken,
        solution: &str,
    ) -> saptune::Result<()> {
        self.revert_calls.fetch_add(1, Ordering::SeqCst);
        self.mutate("revert", solution)?;
        self.applied.lock().unwrap().clear();
        Ok(())
    }
}

fn semver_triple(version: &str) -> (u64, u64, u64) {
    let mut parts = version.split('.').map(|part| part.parse().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Cluster stub with an in-memory online flag.
pub struct StubCluster {
    online: Mutex<bool>,
    idle: AtomicBool,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    /// Start/stop calls succeed but leave the online flag untouched.
    mutations_have_no_effect: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl StubCluster {
    pub fn new(online: bool) -> Self {
        Self {
            online: Mutex::new(online),
            idle: AtomicBool::new(true),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            mutations_have_no_effect: AtomicBool::new(false),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn freeze(&self) {
        self.mutations_have_no_effect.store(true, Ordering::SeqCst);
    }

    pub fn set_idle(&self, idle: bool) {
        self.idle.store(idle, Ordering::SeqCst);
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    pub fn online(&self) -> bool {
        *self.online.lock().unwrap()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn command_error(verb: &str) -> crmsh::Error {
        let source = cmdkit::Error::NonZeroExit {
            program: "crm".into(),
            code: 1,
            output: "scripted failure".into(),
        };
        match verb {
            "start" => crmsh::Error::StartCluster(source),
            _ => crmsh::Error::StopCluster(source),
        }
    }
}

#[async_trait]
impl Cluster for StubCluster {
    async fn is_host_online(&self, _token: &CancellationToken) -> bool {
        self.online()
    }

    async fn is_idle(&self, _token: &CancellationToken) -> crmsh::Result<bool> {
        Ok(self.idle.load(Ordering::SeqCst))
    }

    async fn start_cluster(&self, _token: &CancellationToken) -> crmsh::Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Self::command_error("start"));
        }
        if !self.mutations_have_no_effect.load(Ordering::SeqCst) {
            *self.online.lock().unwrap() = true;
        }
        Ok(())
    }

    async fn stop_cluster(&self, _token: &CancellationToken) -> crmsh::Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(Self::command_error("stop"));
        }
        if !self.mutations_have_no_effect.load(Ordering::SeqCst) {
            *self.online.lock().unwrap() = false;
        }
        Ok(())
    }

    async fn resource_refresh(
        &self,
        _token: &CancellationToken,
        _resource_id: Option<&str>,
        _node_id: Option<&str>,
    ) -> crmsh::Result<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// sapcontrol stub over in-memory process and instance tables.
pub struct StubSapControl {
    processes: Mutex<Vec<OsProcess>>,
    instances: Mutex<Vec<SystemInstance>>,
    /// Color applied to every process/instance on start; `None` leaves the
    /// tables untouched (e.g. an instance that never comes up).
    start_sets: Option<StateColor>,
    stop_sets: Option<StateColor>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl StubSapControl {
    pub fn with_processes(processes: Vec<OsProcess>) -> Self {
        Self {
            processes: Mutex::new(processes),
            instances: Mutex::new(Vec::new()),
            start_sets: Some(StateColor::Green),
            stop_sets: Some(StateColor::Gray),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_instances(instances: Vec<SystemInstance>) -> Self {
        Self {
            processes: Mutex::new(Vec::new()),
            instances: Mutex::new(instances),
            start_sets: Some(StateColor::Green),
            stop_sets: Some(StateColor::Gray),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    /// Make start/stop calls succeed without moving any state.
    pub fn inert(mut self) -> Self {
        self.start_sets = None;
        self.stop_sets = None;
        self
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    fn recolor(&self, color: Option<StateColor>) {
        let Some(color) = color else { return };
        for process in self.processes.lock().unwrap().iter_mut() {
            process.dispstatus = Some(color);
        }
        for instance in self.instances.lock().unwrap().iter_mut() {
            instance.dispstatus = Some(color);
        }
    }
}

/// A process entry with the given dispatch color.
pub fn process(name: &str, color: StateColor) -> OsProcess {
    OsProcess {
        name: name.to_string(),
        description: String::new(),
        dispstatus: Some(color),
        textstatus: String::new(),
        pid: 1,
    }
}

/// An instance entry with the given features and dispatch color.
pub fn instance(hostname: &str, features: &str, color: StateColor) -> SystemInstance {
    SystemInstance {
        hostname: hostname.to_string(),
        instance_nr: 0,
        features: features.to_string(),
        dispstatus: Some(color),
    }
}

#[async_trait]
impl SapControl for StubSapControl {
    async fn start(&self, _token: &CancellationToken) -> sapcontrol::Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.recolor(self.start_sets);
        Ok(())
    }

    async fn stop(&self, _token: &CancellationToken) -> sapcontrol::Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.recolor(self.stop_sets);
        Ok(())
    }

    async fn start_system(
        &self,
        _token: &CancellationToken,
        _options: StartStopOption,
    ) -> sapcontrol::Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.recolor(self.start_sets);
        Ok(())
    }

    async fn stop_system(
        &self,
        _token: &CancellationToken,
        _options: StartStopOption,
    ) -> sapcontrol::Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.recolor(self.stop_sets);
        Ok(())
    }

    async fn process_list(&self, _token: &CancellationToken) -> sapcontrol::Result<Vec<OsProcess>> {
        Ok(self.processes.lock().unwrap().clone())
    }

    async fn system_instance_list(
        &self,
        _token: &CancellationToken,
    ) -> sapcontrol::Result<Vec<SystemInstance>> {
        Ok(self.instances.lock().unwrap().clone())
    }
}

/// Shared state behind the systemd stub, inspectable after the run.
#[derive(Default)]
pub struct SystemdState {
    enabled: Mutex<bool>,
    /// Enable/disable calls succeed but leave the state untouched.
    mutations_have_no_effect: AtomicBool,
    enable_calls: AtomicUsize,
    disable_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl SystemdState {
    pub fn new(enabled: bool) -> Arc<Self> {
        let state = Self::default();
        *state.enabled.lock().unwrap() = enabled;
        Arc::new(state)
    }

    pub fn freeze(&self) {
        self.mutations_have_no_effect.store(true, Ordering::SeqCst);
    }

    pub fn enabled(&self) -> bool {
        *self.enabled.lock().unwrap()
    }

    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }

    pub fn disable_calls(&self) -> usize {
        self.disable_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

pub struct StubSystemd(Arc<SystemdState>);

#[async_trait]
impl Systemd for StubSystemd {
    async fn enable(&self, _token: &CancellationToken, _service: &str) -> sysbus::Result<()> {
        self.0.enable_calls.fetch_add(1, Ordering::SeqCst);
        if !self.0.mutations_have_no_effect.load(Ordering::SeqCst) {
            *self.0.enabled.lock().unwrap() = true;
        }
        Ok(())
    }

    async fn disable(&self, _token: &CancellationToken, _service: &str) -> sysbus::Result<()> {
        self.0.disable_calls.fetch_add(1, Ordering::SeqCst);
        if !self.0.mutations_have_no_effect.load(Ordering::SeqCst) {
            *self.0.enabled.lock().unwrap() = false;
        }
        Ok(())
    }

    async fn is_enabled(&self, _token: &CancellationToken, _service: &str) -> sysbus::Result<bool> {
        Ok(self.0.enabled())
    }

    async fn close(&mut self) {
        self.0.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Loader handing out connectors over the shared state.
pub struct StubSystemdLoader(pub Arc<SystemdState>);

#[async_trait]
impl SystemdLoader for StubSystemdLoader {
    async fn connect(&self) -> sysbus::Result<Box<dyn Systemd>> {
        Ok(Box::new(StubSystemd(self.0.clone())))
    }
}

/// hdbnsutil stub with an in-memory replication mode.
pub struct StubHdbnsutil {
    mode: Mutex<String>,
    unregister_calls: AtomicUsize,
}

impl StubHdbnsutil {
    pub fn new(mode: &str) -> Self {
        Self {
            mode: Mutex::new(mode.to_string()),
            unregister_calls: AtomicUsize::new(0),
        }
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Hdbnsutil for StubHdbnsutil {
    async fn system_replication_state(
        &self,
        _token: &CancellationToken,
        _sid: &str,
    ) -> anyhow::Result<SystemReplicationState> {
        Ok(SystemReplicationState {
            online: true,
            mode: self.mode.lock().unwrap().clone(),
            operation_mode: "logreplay".to_string(),
        })
    }

    async fn unregister_secondary(
        &self,
        _token: &CancellationToken,
        _sid: &str,
    ) -> anyhow::Result<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        *self.mode.lock().unwrap() = "none".to_string();
        Ok(())
    }
}
