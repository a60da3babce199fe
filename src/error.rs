pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("cache error")]
    Cache,
    #[display("indexing error")]
    Index,
    #[display("upstream client error")]
    Fetch,
}
