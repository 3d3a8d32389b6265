//! Command-line configuration: bind address and document root.

use std::fmt;
use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_IP: &str = "127.0.0.1";

pub const USAGE: &str = "\
Usage: staticd -p <port> -f <root_directory> [-i <ip_address>] [-h]

Options:
  -p <port>   Port number to listen on (required)
  -f <path>   Path to the document root (required)
  -i <ip>     IP address to bind (default: 127.0.0.1)
  -h          Display this help and exit";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    /// Canonical document root; the resolver relies on this being the
    /// real path.
    pub root: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    Help,
    MissingPort,
    MissingRoot,
    MissingValue(&'static str),
    UnknownFlag(String),
    InvalidPort(String),
    InvalidAddress(String),
    RootAccess(PathBuf, io::Error),
    RootNotADirectory(PathBuf),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Help => f.write_str("help requested"),
            ConfigError::MissingPort => f.write_str("port number is required (-p <port>)"),
            ConfigError::MissingRoot => f.write_str("root directory is required (-f <dir>)"),
            ConfigError::MissingValue(flag) => {
                write!(f, "option '{}' requires an argument", flag)
            }
            ConfigError::UnknownFlag(flag) => write!(f, "unknown option '{}'", flag),
            ConfigError::InvalidPort(value) => {
                write!(f, "invalid port number '{}', must be 0-65535", value)
            }
            ConfigError::InvalidAddress(value) => {
                write!(f, "'{}' is not a valid IPv4 or IPv6 address", value)
            }
            ConfigError::RootAccess(path, err) => {
                write!(f, "cannot use root directory {}: {}", path.display(), err)
            }
            ConfigError::RootNotADirectory(path) => {
                write!(f, "{} is not a directory", path.display())
            }
        }
    }
}

impl Config {
    /// Parses the flag list (without the program name). The document root
    /// is canonicalized here, once, and must be a directory we can list —
    /// the same requirement `access(R_OK | X_OK)` expresses for serving
    /// files out of it.
    pub fn from_args<I>(args: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut port = None;
        let mut root = None;
        let mut ip = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-p" => port = Some(args.next().ok_or(ConfigError::MissingValue("-p"))?),
                "-f" => root = Some(args.next().ok_or(ConfigError::MissingValue("-f"))?),
                "-i" => ip = Some(args.next().ok_or(ConfigError::MissingValue("-i"))?),
                "-h" => return Err(ConfigError::Help),
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }

        let port = port.ok_or(ConfigError::MissingPort)?;
        let port: u16 = match port.parse() {
            Ok(port) => port,
            Err(_) => return Err(ConfigError::InvalidPort(port)),
        };

        let ip = ip.unwrap_or_else(|| DEFAULT_IP.to_string());
        let ip: IpAddr = match ip.parse() {
            Ok(ip) => ip,
            Err(_) => return Err(ConfigError::InvalidAddress(ip)),
        };

        let root = root.ok_or(ConfigError::MissingRoot)?;
        let root = fs::canonicalize(&root)
            .map_err(|err| ConfigError::RootAccess(PathBuf::from(&root), err))?;
        let metadata =
            fs::metadata(&root).map_err(|err| ConfigError::RootAccess(root.clone(), err))?;
        if !metadata.is_dir() {
            return Err(ConfigError::RootNotADirectory(root));
        }
        fs::read_dir(&root).map_err(|err| ConfigError::RootAccess(root.clone(), err))?;

        Ok(Config {
            addr: SocketAddr::new(ip, port),
            root,
        })
    }
}
