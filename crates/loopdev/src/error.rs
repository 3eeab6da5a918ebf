use std::io;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("loop control device unavailable: {0}")]
    ControlUnavailable(#[source] io::Error),
    #[error("no free loop device index: {0}")]
    NoFreeDevice(#[source] io::Error),
    #[error("failed to bind backing file to loop device: {0}")]
    BindFailed(#[source] io::Error),
    #[error("failed to unbind loop device: {0}")]
    UnbindFailed(#[source] io::Error),
    #[error("loop device unbound but backing file removal failed: {0}")]
    CleanupFailed(#[source] io::Error),
    #[error("io issue encountered: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
