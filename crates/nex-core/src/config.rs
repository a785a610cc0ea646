//! NEX Configuration
//!
//! Runtime limits and module search settings for the executor.
//! Configuration specifies constraints only; enforcement is handled by the VM.

use std::path::PathBuf;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct NexConfig {
    /// Maximum call depth before `StackOverflowException` is raised
    pub recursion_limit: usize,

    /// Maximum operand stack height
    pub max_stack_size: usize,

    /// Directory searched first for imported modules
    pub library_dir: PathBuf,

    /// File extension of compiled module images
    pub module_extension: String,

    /// Reported to guest code through `runtime$assertionsEnabled`
    pub enable_assert: bool,
}

impl Default for NexConfig {
    fn default() -> Self {
        NexConfig {
            recursion_limit: 1000,
            max_stack_size: 1 << 20,
            library_dir: PathBuf::from("lib"),
            module_extension: "neonx".to_string(),
            enable_assert: true,
        }
    }
}

impl NexConfig {
    /// Create a new configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }
}
