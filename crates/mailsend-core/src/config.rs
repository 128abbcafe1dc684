//! Relay configuration.
//!
//! The configuration file is a list of `KEY=VALUE` lines. A value runs
//! from the `=` to the first whitespace character. `MAILHOST` and `PORT`
//! are required whenever the file exists; when it does not, the built-in
//! relay is used. Timeouts are whole seconds and must be non-zero.

use std::io;
use std::path::Path;
use std::time::Duration;

use mailsend_smtp::{DeliveryOptions, Handshake, Timeouts};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "email.conf";

/// Relay used when no configuration file exists.
pub const DEFAULT_MAILHOST: &str = "mailhost.cs.pdx.edu";

/// Port used when no configuration file exists.
pub const DEFAULT_PORT: u16 = 25;

const KEY_MAILHOST: &str = "MAILHOST";
const KEY_PORT: &str = "PORT";
const KEY_CONNECT_TIMEOUT: &str = "CONNECT_TIMEOUT";
const KEY_IO_TIMEOUT: &str = "IO_TIMEOUT";
const KEY_HELLO: &str = "HELLO";
const KEY_GREETING: &str = "GREETING";

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Relay host name.
    pub mailhost: String,
    /// Relay port.
    pub port: u16,
    /// Name announced with EHLO; the relay host when unset.
    pub hello: Option<String>,
    /// Greeting pairing.
    pub handshake: Handshake,
    /// Network deadlines.
    pub timeouts: Timeouts,
}

impl Config {
    /// Creates a configuration for `mailhost` on the default port.
    #[must_use]
    pub fn new(mailhost: impl Into<String>) -> Self {
        Self {
            mailhost: mailhost.into(),
            port: DEFAULT_PORT,
            hello: None,
            handshake: Handshake::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(mailhost: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(mailhost)
    }

    /// Loads the configuration at `path`, falling back to the built-in
    /// relay when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCorrupted`] if a required key is missing,
    /// [`Error::ConfigInvalid`] if a value cannot be used, or an I/O error
    /// if the file exists but cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config = Self::parse(path, &contents)?;
                info!(
                    path = %path.display(),
                    mailhost = %config.mailhost,
                    port = config.port,
                    "loaded relay configuration"
                );
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "no configuration file, using {DEFAULT_MAILHOST}:{DEFAULT_PORT}"
                );
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Parses configuration text. `path` is only used in error reports.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus I/O errors.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let required = |key: &'static str| {
            lookup(contents, key).ok_or_else(|| Error::ConfigCorrupted {
                path: path.to_path_buf(),
                key,
            })
        };
        let invalid = |key: &'static str, value: &str| Error::ConfigInvalid {
            path: path.to_path_buf(),
            key,
            value: value.to_string(),
        };
        let seconds = |key: &'static str, default: Duration| -> Result<Duration> {
            lookup(contents, key).map_or(Ok(default), |value| {
                value
                    .parse::<u64>()
                    .ok()
                    .filter(|&secs| secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| invalid(key, value))
            })
        };

        let mailhost = required(KEY_MAILHOST)?;
        let port_text = required(KEY_PORT)?;
        let port = port_text
            .parse::<u16>()
            .map_err(|_| invalid(KEY_PORT, port_text))?;

        let handshake = match lookup(contents, KEY_GREETING) {
            Some(value) => Handshake::parse(value).ok_or_else(|| invalid(KEY_GREETING, value))?,
            None => Handshake::default(),
        };

        let config = ConfigBuilder::new(mailhost)
            .port(port)
            .handshake(handshake)
            .connect_timeout(seconds(KEY_CONNECT_TIMEOUT, Timeouts::DEFAULT_CONNECT)?)
            .io_timeout(seconds(KEY_IO_TIMEOUT, Timeouts::DEFAULT_IO)?);

        let config = match lookup(contents, KEY_HELLO) {
            Some(hello) => config.hello(hello),
            None => config,
        };

        debug!(?handshake, "parsed configuration");
        Ok(config.build())
    }

    /// Returns the options handed to the SMTP client.
    #[must_use]
    pub fn delivery_options(&self) -> DeliveryOptions {
        DeliveryOptions {
            hello: self.hello.clone(),
            handshake: self.handshake,
            timeouts: self.timeouts,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_MAILHOST)
    }
}

/// Finds `KEY=value` and returns the value up to the first whitespace.
///
/// Blank values count as missing. Lines starting with `#` are ignored.
fn lookup<'a>(contents: &'a str, key: &str) -> Option<&'a str> {
    contents
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
        .and_then(|rest| rest.split_whitespace().next())
}

/// Builder for relay configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    mailhost: String,
    port: Option<u16>,
    hello: Option<String>,
    handshake: Handshake,
    timeouts: Timeouts,
}

impl ConfigBuilder {
    /// Creates a new builder for the given relay.
    #[must_use]
    pub fn new(mailhost: impl Into<String>) -> Self {
        Self {
            mailhost: mailhost.into(),
            port: None,
            hello: None,
            handshake: Handshake::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the name announced with EHLO.
    #[must_use]
    pub fn hello(mut self, hello: impl Into<String>) -> Self {
        self.hello = Some(hello.into());
        self
    }

    /// Sets the greeting pairing.
    #[must_use]
    pub const fn handshake(mut self, handshake: Handshake) -> Self {
        self.handshake = handshake;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.io = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            mailhost: self.mailhost,
            port: self.port.unwrap_or(DEFAULT_PORT),
            hello: self.hello,
            handshake: self.handshake,
            timeouts: self.timeouts,
        }
    }
}
