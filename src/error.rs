use std::fmt;

/// Errors surfaced across pool configuration, pool init, and task submission.
///
/// Arena exhaustion is deliberately not a variant here: `Pool::alloc` and
/// friends return `None` on failure, matching `ngx_palloc`'s null-sentinel
/// contract rather than threading a `Result` through every bump allocation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A pool directive named an unknown pool, duplicated a pool, or carried
    /// an invalid numeric option.
    #[error("thread pool config: {0}")]
    Config(ConfigError),

    /// Mutex/condvar/thread creation failed while bringing a pool up.
    #[error("thread pool \"{name}\" failed to initialize: {reason}")]
    PoolInit { name: String, reason: String },

    /// `post` was called while `max_queue` tasks were already waiting.
    #[error("thread pool \"{pool}\" queue overflow: {waiting} tasks waiting")]
    QueueOverflow { pool: String, waiting: i64 },

    /// `post` was called with a task whose `event.active` was already set.
    #[error("task #{id} already active")]
    TaskAlreadyActive { id: u64 },
}

/// Configuration-layer errors for the pool directive surface: unknown or
/// duplicate pool names, and invalid `threads=`/`max_queue=` values.
#[derive(Debug)]
pub enum ConfigError {
    MissingThreads { pool: String },
    DuplicatePool { name: String },
    UnknownPool { name: String },
    InvalidOption { pool: String, option: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingThreads { pool } => {
                write!(f, "\"{pool}\" must have a \"threads\" parameter")
            }
            ConfigError::DuplicatePool { name } => write!(f, "duplicate thread pool \"{name}\""),
            ConfigError::UnknownPool { name } => write!(f, "unknown thread pool \"{name}\""),
            ConfigError::InvalidOption { pool, option, value } => {
                write!(f, "invalid {option} value \"{value}\" for pool \"{pool}\"")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}
