use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstateError {
    #[error("remote estate with eid {0} already registered")]
    DuplicateEid(u32),

    #[error("remote estate with name '{0}' already registered")]
    DuplicateName(String),

    #[error("remote estate at {0}:{1} already registered")]
    DuplicateHostPort(String, u16),

    #[error("no remote estate with eid {0}")]
    UnknownRemote(u32),
}

pub type Result<T> = std::result::Result<T, EstateError>;
