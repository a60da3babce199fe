pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ErrorKind {
    #[display("database error while driving the job queue")]
    Database,
    #[display("cache store unavailable")]
    Store,
    #[display("job row {_0} holds an invalid state")]
    InvalidState(#[error(not(source))] i64),
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Database | ErrorKind::Store)
    }
}
