//! Crate-wide error type tying together the seams that can fail while
//! standing up or running a proxy instance.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Pool(#[from] crate::pool::PoolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("proxy instance {name} has no usable secondaries (all filtered by weight <= 0, or none configured)")]
    NoReplicas { name: String },
}
