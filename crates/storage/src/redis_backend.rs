//! Redis backend
//!
//! Synchronous connections from the `redis` crate with connect, read and
//! write timeouts. Single script calls go through `EVALSHA` (the script is
//! loaded on a `NOSCRIPT` miss); scripts inside a batch are sent as `EVAL`
//! because `MULTI` cannot recover from a digest miss.

use crate::command::Command;
use crate::reply::Reply;
use crate::scripts::Script;
use crate::traits::{Backend, Connection};
use redis::{RedisError, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_model_core::{StoreError, StoreResult};
use tracing::debug;

/// Default server URL
pub const DEFAULT_URL: &str = "redis://127.0.0.1:6379/0";

/// Default connect, read and write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`RedisBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    /// `redis://` or `rediss://` URL
    pub url: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Socket read timeout; `None` blocks indefinitely
    pub read_timeout: Option<Duration>,
    /// Socket write timeout; `None` blocks indefinitely
    pub write_timeout: Option<Duration>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

/// A Redis server reachable over the network
pub struct RedisBackend {
    client: redis::Client,
    settings: RedisSettings,
    scripts: Arc<HashMap<Script, redis::Script>>,
}

impl RedisBackend {
    /// Create a backend; no connection is opened until one is needed
    ///
    /// # Errors
    ///
    /// `StoreError::Connection` if the URL cannot be parsed.
    pub fn new(settings: RedisSettings) -> StoreResult<Self> {
        let client = redis::Client::open(settings.url.as_str())
            .map_err(|e| StoreError::Connection(format!("invalid url {}: {e}", settings.url)))?;
        let scripts = Script::ALL
            .iter()
            .map(|script| (*script, redis::Script::new(script.source())))
            .collect();
        Ok(Self {
            client,
            settings,
            scripts: Arc::new(scripts),
        })
    }

    /// Settings the backend was created with
    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }
}

impl Backend for RedisBackend {
    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        let conn = self
            .client
            .get_connection_with_timeout(self.settings.connect_timeout)
            .map_err(map_error)?;
        conn.set_read_timeout(self.settings.read_timeout)
            .map_err(map_error)?;
        conn.set_write_timeout(self.settings.write_timeout)
            .map_err(map_error)?;
        debug!(target: "strata::model::store", url = %self.settings.url, "Connected");
        Ok(Box::new(RedisConnection {
            conn,
            scripts: Arc::clone(&self.scripts),
        }))
    }

    fn describe(&self) -> String {
        self.settings.url.clone()
    }
}

/// A connection to a [`RedisBackend`]
pub struct RedisConnection {
    conn: redis::Connection,
    scripts: Arc<HashMap<Script, redis::Script>>,
}

impl RedisConnection {
    fn invoke(
        &mut self,
        script: Script,
        keys: &[String],
        args: &[Vec<u8>],
    ) -> StoreResult<Reply> {
        let handle = self.scripts.get(&script).ok_or_else(|| StoreError::Script {
            script: script.name().to_string(),
            message: "script not loaded".to_string(),
        })?;
        let mut invocation = handle.prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.as_slice());
        }
        invocation
            .invoke::<Value>(&mut self.conn)
            .map(to_reply)
            .map_err(|e| script_error(script, e))
    }
}

impl Connection for RedisConnection {
    fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        match command {
            Command::Eval { script, keys, args } => self.invoke(*script, keys, args),
            other => {
                let value: Value = to_cmd(other).query(&mut self.conn).map_err(map_error)?;
                Ok(to_reply(value))
            }
        }
    }

    fn execute_atomic(&mut self, commands: &[Command]) -> StoreResult<Vec<Reply>> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in commands {
            pipe.add_command(to_cmd(command));
        }
        let values: Vec<Value> = pipe.query(&mut self.conn).map_err(map_error)?;
        Ok(values.into_iter().map(to_reply).collect())
    }
}

fn to_cmd(command: &Command) -> redis::Cmd {
    let mut cmd = redis::cmd(command.name());
    if let Command::Eval { script, .. } = command {
        cmd.arg(script.source());
    }
    for arg in command.wire_args() {
        cmd.arg(arg);
    }
    cmd
}

fn to_reply(value: Value) -> Reply {
    match value {
        Value::Nil => Reply::Nil,
        Value::Int(n) => Reply::Int(n),
        Value::Data(bytes) => Reply::Bytes(bytes),
        Value::Bulk(items) => Reply::Array(items.into_iter().map(to_reply).collect()),
        Value::Status(status) => Reply::Status(status),
        Value::Okay => Reply::Status("OK".to_string()),
    }
}

fn map_error(err: RedisError) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(err.to_string())
    } else if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Protocol(err.to_string())
    }
}

fn script_error(script: Script, err: RedisError) -> StoreError {
    match map_error(err) {
        StoreError::Protocol(message) => StoreError::Script {
            script: script.name().to_string(),
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_value_conversion() {
        let value = Value::Bulk(vec![
            Value::Data(b"a".to_vec()),
            Value::Nil,
            Value::Int(3),
            Value::Okay,
        ]);
        assert_eq!(
            to_reply(value),
            Reply::Array(vec![
                Reply::Bytes(b"a".to_vec()),
                Reply::Nil,
                Reply::Int(3),
                Reply::Status("OK".to_string()),
            ])
        );
    }

    #[test]
    fn test_error_mapping() {
        let timeout = RedisError::from(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(matches!(map_error(timeout), StoreError::Timeout(_)));

        let dropped = RedisError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(map_error(dropped), StoreError::Connection(_)));

        let response = RedisError::from((redis::ErrorKind::ResponseError, "WRONGTYPE"));
        assert!(matches!(map_error(response), StoreError::Protocol(_)));
    }

    #[test]
    fn test_script_error_keeps_transport_kind() {
        let response = RedisError::from((redis::ErrorKind::ResponseError, "bad range"));
        assert!(matches!(
            script_error(Script::ExtractLexRange, response),
            StoreError::Script { ref script, .. } if script == "extract_lex_range"
        ));

        let dropped = RedisError::from(io::Error::new(io::ErrorKind::BrokenPipe, "eof"));
        assert!(matches!(
            script_error(Script::ExtractLexRange, dropped),
            StoreError::Connection(_)
        ));
    }

    #[test]
    fn test_eval_carries_source() {
        let cmd = to_cmd(&Command::eval(
            Script::ExtractScoreRange,
            vec!["a".to_string(), "b".to_string()],
            vec![b"0".to_vec(), b"1".to_vec()],
        ));
        let packed = String::from_utf8_lossy(&cmd.get_packed_command()).into_owned();
        assert!(packed.contains("EVAL"));
        assert!(packed.contains("ZRANGEBYSCORE"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let settings = RedisSettings {
            url: "not a url".to_string(),
            ..RedisSettings::default()
        };
        assert!(matches!(
            RedisBackend::new(settings),
            Err(StoreError::Connection(_))
        ));
    }

    #[test]
    fn test_backend_creation_does_not_connect() {
        let backend = RedisBackend::new(RedisSettings::default()).unwrap();
        assert_eq!(backend.describe(), DEFAULT_URL);
        assert_eq!(backend.settings().connect_timeout, DEFAULT_TIMEOUT);
    }
}
