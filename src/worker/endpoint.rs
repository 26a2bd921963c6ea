use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::WorkerError;

/// Address of one side of the worker transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp { host: String, port: u16 },
    /// `ipc:///path/to/socket`
    Ipc(PathBuf),
}

impl Endpoint {
    pub fn parse(s: &str) -> Result<Self, WorkerError> {
        let invalid = || WorkerError::InvalidEndpoint(s.to_string());

        if let Some(addr) = s.strip_prefix("tcp://") {
            let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
            // [::1]:5555
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(invalid());
            }
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            return Ok(Endpoint::Tcp { host: host.to_string(), port });
        }

        if let Some(path) = s.strip_prefix("ipc://") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Endpoint::Ipc(PathBuf::from(path)));
        }

        Err(invalid())
    }
}

impl FromStr for Endpoint {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{host}]:{port}"),
            Endpoint::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}
