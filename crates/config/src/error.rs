use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration source could not be parsed, or held a value of the
    /// wrong type. Fix the file or environment and try again.
    #[display("invalid configuration")]
    Invalid,
    /// No platform configuration directory could be determined.
    #[display("no configuration directory available")]
    NoConfigDir,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
