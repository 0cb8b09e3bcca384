use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Auth(String),
    Discovery(String),
    CommandRejected { status: u16, body: String },
    InvalidScheduleData(String),
    TaskTimeout { task_id: String, waited: Duration },
    UnknownDevice(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Discovery(msg) => write!(f, "discovery failed: {msg}"),
            Error::CommandRejected { status, body } => {
                write!(f, "command rejected (HTTP {status}): {body}")
            }
            Error::InvalidScheduleData(msg) => write!(f, "invalid schedule data: {msg}"),
            Error::TaskTimeout { task_id, waited } => {
                write!(f, "task {task_id} not terminal after {waited:?}")
            }
            Error::UnknownDevice(key) => write!(f, "unknown device: {key}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
