//! The VRF relay worker's coordination engine: the task poller (§4.4), the
//! per-task pipeline state machine (§4.5), and the optional fork/reorg sweep
//! (§4.6). This is the sole subject of the worker's specification — chain
//! clients and the proof trimmer live in `vrf-chain-evm`/`vrf-chain-oracle`.

pub mod engine;
pub mod metrics;
pub mod poller;
pub mod sweep;
pub mod worker;

pub use engine::PipelineEngine;
pub use metrics::{TerminalCounters, TerminalCountersSnapshot};
pub use worker::VrfWorker;
