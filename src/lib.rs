//! # sos-sysml - SoS language module for SysML
//!
//! Moves variables between the SoS (host) kernel and a SysML (guest) kernel.
//!
//! sos-sysml provides:
//! - A host value model covering the transferable types
//! - An encoder from host values to guest literal source (`%get`)
//! - A safe literal decoder for the guest's canonical output (`%put`)
//! - The guest-side canonicalization routine and a Rust mirror of it
//! - Pull/Push orchestration over an abstract host kernel channel

pub mod value;
pub mod encode;
pub mod literal;
pub mod guest;
pub mod adapter;
pub mod kernel;
pub mod bridge;
pub mod loopback;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use value::{DataFrame, HostValue, NdArray, Scalar, Series};
pub use encode::encode;
pub use literal::decode;
pub use guest::{GuestValue, canonicalize};
pub use kernel::{HostKernel, HostNamespace, KernelMessage};
pub use bridge::{SysmlBridge, Transfer};
pub use loopback::LoopbackKernel;
pub use config::BridgeConfig;

/// Result type alias for sos-sysml operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sos-sysml operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot convert {text:?} at offset {offset}: {reason}")]
    Conversion {
        text: String,
        offset: usize,
        reason: String,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Variable not defined: {0}")]
    UndefinedVariable(String),

    #[error("Guest execution failed: {0}")]
    GuestExecution(String),

    #[error("Kernel error: {0}")]
    Kernel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn conversion(text: &str, offset: usize, reason: impl Into<String>) -> Self {
        Error::Conversion {
            text: text.to_string(),
            offset,
            reason: reason.into(),
        }
    }
}
