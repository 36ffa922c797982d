//! Per-service watch state machine
//!
//! Tracks one service through a single cycle using the state-machines crate in
//! dynamic mode, so the Warden can drive it from runtime outcomes.

use state_machines::state_machine;

state_machine! {
    name: WatchMachine,
    dynamic: true,
    initial: Idle,
    states: [Idle, Resolving, Skipped, Probing, RestartRequested, RestartSucceeded, RestartFailed],
    events {
        resolve {
            transition: { from: Idle, to: Resolving }
        }
        absent {
            transition: { from: Resolving, to: Skipped }
        }
        found {
            transition: { from: Resolving, to: Probing }
        }
        alive {
            transition: { from: Probing, to: Idle }
        }
        dead {
            transition: { from: Probing, to: RestartRequested }
        }
        restarted {
            transition: { from: RestartRequested, to: RestartSucceeded }
        }
        failed {
            transition: { from: RestartRequested, to: RestartFailed }
        }
    }
}

/// Simple state enum for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Resolving,
    Skipped,
    Probing,
    RestartRequested,
    RestartSucceeded,
    RestartFailed,
}

impl WatchState {
    /// Parse state from its machine name
    pub fn from_name(s: &str) -> Self {
        match s {
            "Resolving" => WatchState::Resolving,
            "Skipped" => WatchState::Skipped,
            "Probing" => WatchState::Probing,
            "RestartRequested" => WatchState::RestartRequested,
            "RestartSucceeded" => WatchState::RestartSucceeded,
            "RestartFailed" => WatchState::RestartFailed,
            _ => WatchState::Idle,
        }
    }

    /// Whether the cycle is over for this service
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WatchState::Idle
                | WatchState::Skipped
                | WatchState::RestartSucceeded
                | WatchState::RestartFailed
        )
    }
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchState::Idle => write!(f, "idle"),
            WatchState::Resolving => write!(f, "resolving"),
            WatchState::Skipped => write!(f, "skipped"),
            WatchState::Probing => write!(f, "probing"),
            WatchState::RestartRequested => write!(f, "restart requested"),
            WatchState::RestartSucceeded => write!(f, "restarted"),
            WatchState::RestartFailed => write!(f, "restart failed"),
        }
    }
}

/// One service's pass through a cycle
pub struct Watch {
    machine: DynamicWatchMachine<()>,
    service: String,
}

impl Watch {
    pub fn new(service: &str) -> Self {
        Self {
            machine: WatchMachine::new(()).into_dynamic(),
            service: service.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn state(&self) -> WatchState {
        WatchState::from_name(self.machine.current_state())
    }

    pub fn resolve(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(WatchMachineEvent::Resolve)
    }

    pub fn not_found(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(WatchMachineEvent::Absent)
    }

    pub fn found(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(WatchMachineEvent::Found)
    }

    pub fn alive(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(WatchMachineEvent::Alive)
    }

    pub fn dead(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(WatchMachineEvent::Dead)
    }

    pub fn restarted(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(WatchMachineEvent::Restarted)
    }

    pub fn restart_failed(&mut self) -> Result<(), state_machines::DynamicError> {
        self.machine.handle(WatchMachineEvent::Failed)
    }
}
