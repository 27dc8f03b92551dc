//! Session configuration

use std::time::Duration;

/// Suffix inserted between the original base name and the date stamp
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_edited_";

/// Largest grid, in cells, a sheet view allocates
pub const DEFAULT_GRID_CELL_LIMIT: u64 = 1 << 18;

/// Options for an edit session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of history entries kept (default: 10)
    pub history_limit: usize,
    /// How long to wait for the translator before abandoning the call
    /// (default: 60 seconds; `None` waits indefinitely)
    pub translator_timeout: Option<Duration>,
    /// Suffix used when naming the downloaded file (default: `_edited_`)
    pub output_suffix: String,
    /// Largest sheet view, in cells, a load or sheet switch will build
    /// (default: 262 144)
    pub grid_cell_limit: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            translator_timeout: Some(Duration::from_secs(60)),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            grid_cell_limit: DEFAULT_GRID_CELL_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of history entries kept
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set the translator timeout
    pub fn with_translator_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.translator_timeout = timeout;
        self
    }

    /// Set the largest sheet view, in cells
    pub fn with_grid_cell_limit(mut self, limit: u64) -> Self {
        self.grid_cell_limit = limit;
        self
    }

    /// Set the output file suffix
    pub fn with_output_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.output_suffix = suffix.into();
        self
    }
}
