//! Reusable remote operations built on the executor

pub mod wait_for;

pub use wait_for::{
    strategy_for, DarwinDetection, DetectionStrategy, LinuxDetection, PortState, WaitFor,
    WaitForConfig,
};
