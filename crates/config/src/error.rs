pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Load,
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    #[display("could not determine a home directory for this platform")]
    ProjectDirs,
    #[display("could not persist runtime overrides")]
    Persist,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
