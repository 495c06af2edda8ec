use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("asset registry error")]
    Registry,
    #[display("cannot open directory {}", _0.display())]
    Directory(#[error(not(source))] PathBuf),
    #[display("cannot read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("cannot write {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    #[display("no asset with id `{_0}`")]
    NotFound(#[error(not(source))] String),
    #[display("refusing to clear the registry without --yes")]
    Unconfirmed,
}
