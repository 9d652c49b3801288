pub mod session;
pub mod supervisor;

pub use session::{Session, TurnReport, TERMINAL_CAPACITY};
pub use supervisor::{
    LaunchSpec, ProcessEvent, ProcessState, ProcessSupervisor, SupervisorError, DEFAULT_STOP_GRACE,
};
