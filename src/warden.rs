//! The Warden - container supervisor
//!
//! Drives the watch cycle:
//! - Resolves every service to a container, one after another
//! - Probes each resolved service in its own task
//! - Restarts the containers of services nobody answered for
//! - Joins every task before the next cycle may begin

pub mod state;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dock::{self, ContainerRuntime};
use crate::error::{Error, Result};
use crate::manifest::WatchConfig;
use crate::roster::{Roster, Service};
use crate::sickbay::{self, HttpClient, Liveness};
use state::{Watch, WatchState};

/// Extra time a restart may take beyond the container's stop timeout
const RESTART_GRACE: Duration = Duration::from_secs(30);

/// Warden settings, fixed at startup
#[derive(Debug, Clone)]
pub struct Settings {
    /// Compose project containers must belong to
    pub project: String,
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Stop timeout handed to the runtime on restart
    pub restart_timeout: Duration,
}

impl Settings {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            project: config.project.clone(),
            interval: config.interval_duration(),
            restart_timeout: config.restart_timeout_duration(),
        }
    }

    /// Upper bound on a single restart call
    pub fn restart_deadline(&self) -> Duration {
        self.restart_timeout.saturating_add(RESTART_GRACE)
    }
}

/// What happened to a service in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No container could be resolved
    Skipped(String),
    /// A candidate host answered
    Alive { host: String },
    /// Nothing answered and the container was restarted
    Restarted,
    /// Nothing answered and the restart failed
    RestartFailed(String),
    /// The watch task itself died
    Crashed(String),
}

/// Per-service result of a cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub service: String,
    pub outcome: Outcome,
    pub state: WatchState,
}

/// What a watch task hands back to the Warden
#[derive(Debug)]
struct Verdict {
    service: String,
    liveness: Liveness,
    restart: Option<Result<()>>,
}

/// Result of a one-shot survey, no restarts involved
#[derive(Debug, Clone)]
pub struct SurveyEntry {
    pub service: String,
    pub port: u16,
    pub container: Option<String>,
    pub liveness: Option<Liveness>,
}

/// A dispatched cycle whose tasks may still be running
struct Cycle {
    number: u64,
    tasks: JoinSet<Verdict>,
    watches: HashMap<Id, Watch>,
    reports: Vec<CycleReport>,
}

impl Cycle {
    /// Wait for every task, turning verdicts into reports
    async fn finish(mut self) -> Vec<CycleReport> {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, verdict)) => {
                    let watch = self
                        .watches
                        .remove(&id)
                        .unwrap_or_else(|| found_watch(&verdict.service));
                    self.reports.push(settle(watch, verdict));
                }
                Err(e) => {
                    let mut watch = self
                        .watches
                        .remove(&e.id())
                        .unwrap_or_else(|| found_watch("unknown"));
                    error!(service = watch.service(), "watch task failed: {}", e);
                    advance(&mut watch, Watch::dead);
                    advance(&mut watch, Watch::restart_failed);
                    self.reports.push(CycleReport {
                        service: watch.service().to_string(),
                        outcome: Outcome::Crashed(e.to_string()),
                        state: watch.state(),
                    });
                }
            }
        }

        let count = |f: fn(&Outcome) -> bool| self.reports.iter().filter(|r| f(&r.outcome)).count();
        info!(
            cycle = self.number,
            alive = count(|o| matches!(o, Outcome::Alive { .. })),
            restarted = count(|o| matches!(o, Outcome::Restarted)),
            failed = count(|o| matches!(o, Outcome::RestartFailed(_) | Outcome::Crashed(_))),
            skipped = count(|o| matches!(o, Outcome::Skipped(_))),
            "cycle complete"
        );

        self.reports
    }
}

/// Log a transition the machine refused
fn advance(watch: &mut Watch, step: fn(&mut Watch) -> std::result::Result<(), state_machines::DynamicError>) {
    if let Err(e) = step(watch) {
        warn!(service = watch.service(), state = %watch.state(), "invalid watch transition: {:?}", e);
    }
}

fn found_watch(service: &str) -> Watch {
    let mut watch = Watch::new(service);
    advance(&mut watch, Watch::resolve);
    advance(&mut watch, Watch::found);
    watch
}

/// Apply a task's verdict to its state machine
fn settle(mut watch: Watch, verdict: Verdict) -> CycleReport {
    let outcome = match (verdict.liveness, verdict.restart) {
        (Liveness::Alive { host, .. }, _) => {
            advance(&mut watch, Watch::alive);
            Outcome::Alive { host }
        }
        (Liveness::Dead, Some(Ok(()))) => {
            advance(&mut watch, Watch::dead);
            advance(&mut watch, Watch::restarted);
            Outcome::Restarted
        }
        (Liveness::Dead, Some(Err(e))) => {
            advance(&mut watch, Watch::dead);
            advance(&mut watch, Watch::restart_failed);
            Outcome::RestartFailed(e.to_string())
        }
        (Liveness::Dead, None) => {
            advance(&mut watch, Watch::dead);
            advance(&mut watch, Watch::restart_failed);
            Outcome::RestartFailed("restart was not attempted".to_string())
        }
    };

    if !watch.state().is_terminal() {
        warn!(service = %verdict.service, state = %watch.state(), "watch ended in a non-terminal state");
    }

    CycleReport {
        service: verdict.service,
        outcome,
        state: watch.state(),
    }
}

/// Probe one service and restart its container if nothing answers
async fn examine<R: ContainerRuntime, H: HttpClient>(
    runtime: Arc<R>,
    http: Arc<H>,
    service: Arc<Service>,
    container: String,
    stop_timeout: Duration,
    deadline: Duration,
) -> Verdict {
    let liveness = sickbay::probe(http.as_ref(), &service).await;

    if let Some(host) = liveness.host() {
        service.set_host_hint(host);
        return Verdict {
            service: service.name().to_string(),
            liveness,
            restart: None,
        };
    }

    info!(service = service.name(), %container, "service is not alive, restarting");

    let restart = match tokio::time::timeout(deadline, runtime.restart_container(&container, stop_timeout)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::RestartFailed {
            service: service.name().to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(Error::RestartFailed {
            service: service.name().to_string(),
            message: format!("restart did not complete within {:?}", deadline),
        }),
    };

    match &restart {
        Ok(()) => info!(service = service.name(), %container, "container restarted"),
        Err(e) => error!(service = service.name(), %container, "{}", e),
    }

    Verdict {
        service: service.name().to_string(),
        liveness,
        restart: Some(restart),
    }
}

/// The Warden supervises every service in the roster
pub struct Warden<R, H> {
    runtime: Arc<R>,
    http: Arc<H>,
    roster: Roster,
    settings: Settings,
}

impl<R: ContainerRuntime, H: HttpClient> Warden<R, H> {
    pub fn new(runtime: R, http: H, roster: Roster, settings: Settings) -> Self {
        Self {
            runtime: Arc::new(runtime),
            http: Arc::new(http),
            roster,
            settings,
        }
    }

    #[cfg(test)]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Run cycles until `shutdown` resolves
    ///
    /// Shutdown is only observed while waiting out the interval. By then the
    /// previous cycle has been joined, so no probe or restart is cut short.
    pub async fn run<F: Future<Output = ()>>(&self, shutdown: F) {
        info!(
            project = %self.settings.project,
            services = self.roster.len(),
            interval = ?self.settings.interval,
            "Warden: starting container supervisor"
        );

        tokio::pin!(shutdown);
        let mut pending: Option<Cycle> = None;
        let mut number: u64 = 0;

        loop {
            // Barrier: the previous cycle must be fully joined
            if let Some(cycle) = pending.take() {
                for report in cycle.finish().await {
                    if report.state != WatchState::Idle {
                        info!(service = %report.service, state = %report.state, "watch ended");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = &mut shutdown => {
                    info!("Warden: shutting down");
                    break;
                }
            }

            number += 1;
            pending = Some(self.dispatch(number).await);
        }

        info!("Warden: supervisor stopped");
    }

    /// Run a single cycle immediately and wait for it to finish
    #[cfg(test)]
    pub async fn run_cycle(&self) -> Vec<CycleReport> {
        self.dispatch(0).await.finish().await
    }

    /// Resolve every service and spawn a watch task for each one found
    async fn dispatch(&self, number: u64) -> Cycle {
        info!(cycle = number, "starting probe");

        let mut cycle = Cycle {
            number,
            tasks: JoinSet::new(),
            watches: HashMap::new(),
            reports: Vec::new(),
        };

        for service in self.roster.iter() {
            let mut watch = Watch::new(service.name());
            advance(&mut watch, Watch::resolve);
            debug!(service = service.name(), port = service.port(), "resolving container");

            let container = match dock::locate(self.runtime.as_ref(), &self.settings.project, service.name()).await {
                Ok(id) => id,
                Err(e) => {
                    let reason = match &e {
                        Error::ContainerNotFound(_) => {
                            info!(service = service.name(), "service is not running");
                            "not running".to_string()
                        }
                        other => {
                            warn!(service = service.name(), "could not resolve container: {}", other);
                            other.to_string()
                        }
                    };
                    advance(&mut watch, Watch::not_found);
                    cycle.reports.push(CycleReport {
                        service: service.name().to_string(),
                        outcome: Outcome::Skipped(reason),
                        state: watch.state(),
                    });
                    continue;
                }
            };

            advance(&mut watch, Watch::found);
            info!(service = service.name(), port = service.port(), %container, "probing");

            // Fresh handles for this iteration's task
            let runtime = Arc::clone(&self.runtime);
            let http = Arc::clone(&self.http);
            let service = Arc::clone(service);
            let stop_timeout = self.settings.restart_timeout;
            let deadline = self.settings.restart_deadline();

            let handle = cycle.tasks.spawn(async move {
                examine(runtime, http, service, container, stop_timeout, deadline).await
            });
            cycle.watches.insert(handle.id(), watch);
        }

        cycle
    }

    /// Locate and probe every service without restarting anything
    pub async fn survey(&self) -> Vec<SurveyEntry> {
        let mut entries = Vec::with_capacity(self.roster.len());

        for service in self.roster.iter() {
            let container = match dock::locate(self.runtime.as_ref(), &self.settings.project, service.name()).await {
                Ok(id) => Some(id),
                Err(e) => {
                    info!(service = service.name(), "no container: {}", e);
                    None
                }
            };

            let liveness = match container {
                Some(_) => Some(sickbay::probe(self.http.as_ref(), service).await),
                None => None,
            };

            entries.push(SurveyEntry {
                service: service.name().to_string(),
                port: service.port(),
                container,
                liveness,
            });
        }

        entries
    }
}
