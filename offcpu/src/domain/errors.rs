//! Structured error types for offcpu
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Failed to load eBPF program from {path}: {source}")]
    EbpfLoadFailed {
        path: String,
        #[source]
        source: aya::EbpfError,
    },

    #[error("eBPF program {0} not found in object")]
    ProgramNotFound(&'static str),

    #[error("eBPF map {0} not found in object")]
    MapNotFound(&'static str),

    #[error("Failed to attach {program} to {category}:{name}: {source}")]
    ProbeAttachFailed {
        program: &'static str,
        category: &'static str,
        name: &'static str,
        #[source]
        source: aya::programs::ProgramError,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Ring buffer poll failed: {0}")]
    RingBufferPoll(#[source] std::io::Error),

    #[error(transparent)]
    Map(#[from] aya::maps::MapError),

    #[error(transparent)]
    Program(#[from] aya::programs::ProgramError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_not_found_display() {
        let err = ProfilerError::MapNotFound("OFFCPU_EVENTS");
        assert_eq!(err.to_string(), "eBPF map OFFCPU_EVENTS not found in object");
    }

    #[test]
    fn test_permission_error_mentions_cause() {
        let err = ProfilerError::PermissionDenied("requires root".to_string());
        assert!(err.to_string().to_lowercase().contains("permission denied"));
        assert!(err.to_string().contains("requires root"));
    }
}
