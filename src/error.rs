use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("neighbor information base full")]
    Exhausted,

    #[error("network unreachable")]
    NetUnreachable,
}

pub type Result<T> = std::result::Result<T, Error>;
