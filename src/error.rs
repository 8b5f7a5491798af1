use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("failed to load configuration")]
    Config,
    #[display("cannot read {_0}")]
    Read(#[error(not(source))] String),
    #[display("cannot parse {_0}")]
    Parse(#[error(not(source))] String),
    /// A record that parsed as JSON but is not a known backend event.
    #[display("invalid event record on line {_0}")]
    Event(#[error(not(source))] usize),
}
