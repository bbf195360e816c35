use thiserror::Error;

/// Error kinds surfaced by the engine core.
///
/// Recoverable kinds (missing or corrupt assets, failed pipeline builds) are
/// logged and swallowed at provider / renderer level; fatal kinds bubble to
/// the entry point.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("corrupt asset: {0}")]
    CorruptAsset(String),
    #[error("unsupported feature: {0}")]
    Unsupported(String),
    #[error("allocation failed: {0}")]
    AllocFailed(String),
    #[error("pipeline build failed: {0}")]
    PipelineBuild(String),
    #[error("swapchain lost")]
    SwapchainLost,
    #[error("fatal device error: {0}")]
    FatalDevice(String),
}

impl Error {
    pub fn is_fatal(&self) -> bool { matches!(self, Error::FatalDevice(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
