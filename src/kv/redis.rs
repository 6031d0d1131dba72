use std::str::FromStr;

use async_trait::async_trait;
use bytes::BytesMut;
use percent_encoding::percent_decode_str;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::{KvStore, StoreError};
use crate::config::ConfigError;
use crate::protocol::{Command, Parser, ProtocolError, Value};

/// Default Redis port
const DEFAULT_PORT: u16 = 6379;

/// Parsed `redis://[user[:password]@]host[:port][/db]` connection url.
///
/// IPv6 hosts keep their brackets so `address` can be dialed directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisUrl {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: Option<u32>,
}

impl RedisUrl {
    /// `host:port` to dial
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for RedisUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidKvUrl {
            url: s.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(s).map_err(|e| invalid(&e.to_string()))?;
        match url.scheme() {
            "redis" => {}
            "rediss" => return Err(invalid("TLS connections are not supported")),
            _ => return Err(invalid("expected a redis:// url")),
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid("missing host")),
        };

        // url keeps userinfo percent-encoded
        let decode = |raw: &str| -> Result<Option<String>, ConfigError> {
            if raw.is_empty() {
                return Ok(None);
            }
            percent_decode_str(raw)
                .decode_utf8()
                .map(|decoded| Some(decoded.into_owned()))
                .map_err(|_| invalid("credentials are not valid UTF-8"))
        };
        let username = decode(url.username())?;
        let password = decode(url.password().unwrap_or(""))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
            .unwrap_or_default();
        let db = match segments.as_slice() {
            [] => None,
            [db] => Some(db.parse().map_err(|_| invalid("database is not a number"))?),
            _ => return Err(invalid("unexpected path after database")),
        };

        Ok(RedisUrl {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            username,
            password,
            db,
        })
    }
}

/// A single RESP connection with its unparsed read buffer
struct Connection {
    stream: TcpStream,
    pending: BytesMut,
}

impl Connection {
    async fn open(url: &RedisUrl, token: Option<&str>) -> Result<Self, StoreError> {
        let stream = TcpStream::connect(url.address()).await?;
        stream.set_nodelay(true)?;
        let mut conn = Self {
            stream,
            pending: BytesMut::with_capacity(512),
        };

        if let Some(password) = token.or(url.password.as_deref()) {
            let auth = Command::Auth {
                username: url.username.clone(),
                password: password.to_string(),
            };
            expect_ok(&auth, conn.request(&auth).await?)?;
        }
        if let Some(db) = url.db {
            let select = Command::Select(db);
            expect_ok(&select, conn.request(&select).await?)?;
        }

        // Liveness check before the connection is handed out
        match conn.request(&Command::Ping).await? {
            Value::SimpleString(s) if s == "PONG" => {}
            Value::Error(message) => {
                return Err(StoreError::Backend {
                    command: "PING",
                    message,
                });
            }
            reply => {
                return Err(ProtocolError::UnexpectedReply {
                    command: "PING",
                    reply,
                }
                .into());
            }
        }

        info!("Connected to KV backend at {}", url.address());
        Ok(conn)
    }

    /// Send one command and wait for its reply
    async fn request(&mut self, command: &Command) -> Result<Value, StoreError> {
        self.stream.write_all(&command.to_resp().encode()).await?;

        loop {
            if let Some((value, consumed)) = Parser::parse(&self.pending)? {
                let _ = self.pending.split_to(consumed);
                return Ok(value);
            }
            if self.stream.read_buf(&mut self.pending).await? == 0 {
                return Err(StoreError::ConnectionClosed);
            }
        }
    }
}

fn expect_ok(command: &Command, reply: Value) -> Result<(), StoreError> {
    match reply {
        Value::SimpleString(s) if s == "OK" => Ok(()),
        Value::Error(message) => Err(StoreError::Backend {
            command: command.name(),
            message,
        }),
        reply => Err(ProtocolError::UnexpectedReply {
            command: command.name(),
            reply,
        }
        .into()),
    }
}

/// Durable counter store backed by a Redis hash per resource.
///
/// Increments use `HINCRBY`, so atomicity holds across processes. One
/// connection is shared and opened lazily; after an I/O or framing failure it
/// is dropped and reopened by the next call. Failures are never retried.
pub struct RedisStore {
    url: RedisUrl,
    token: Option<String>,
    conn: Mutex<Option<Connection>>,
}

impl RedisStore {
    pub fn new(url: RedisUrl, token: Option<String>) -> Self {
        Self {
            url,
            token,
            conn: Mutex::new(None),
        }
    }

    async fn execute(&self, command: Command) -> Result<Value, StoreError> {
        let mut guard = self.conn.lock().await;
        // Held outside the slot while in flight, so a cancelled request never
        // leaves a half-read reply on a reused connection.
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => Connection::open(&self.url, self.token.as_deref()).await?,
        };

        debug!(command = command.name(), "sending command to KV backend");
        match conn.request(&command).await {
            Ok(reply) => {
                *guard = Some(conn);
                match reply {
                    Value::Error(message) => Err(StoreError::Backend {
                        command: command.name(),
                        message,
                    }),
                    value => Ok(value),
                }
            }
            Err(e) => {
                warn!("Dropping KV connection after {}: {}", command.name(), e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str, field: &str) -> Result<Option<u64>, StoreError> {
        let command = Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        };
        match self.execute(command).await? {
            reply if reply.is_nil() => Ok(None),
            reply => match reply.as_text() {
                Some(text) => text.parse::<u64>().map(Some).map_err(|_| StoreError::InvalidValue {
                    key: key.to_string(),
                    field: field.to_string(),
                    raw: text,
                }),
                None => Err(ProtocolError::UnexpectedReply {
                    command: "HGET",
                    reply,
                }
                .into()),
            },
        }
    }

    async fn set(&self, key: &str, field: &str, value: u64) -> Result<(), StoreError> {
        let command = Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value,
        };
        match self.execute(command).await? {
            Value::Integer(_) => Ok(()),
            reply => Err(ProtocolError::UnexpectedReply {
                command: "HSET",
                reply,
            }
            .into()),
        }
    }

    async fn increment(&self, key: &str, field: &str, by: u64) -> Result<u64, StoreError> {
        let overflow = || StoreError::Overflow {
            key: key.to_string(),
            field: field.to_string(),
        };
        let command = Command::HIncrBy {
            key: key.to_string(),
            field: field.to_string(),
            by: i64::try_from(by).map_err(|_| overflow())?,
        };
        match self.execute(command).await? {
            Value::Integer(n) => u64::try_from(n).map_err(|_| StoreError::InvalidValue {
                key: key.to_string(),
                field: field.to_string(),
                raw: n.to_string(),
            }),
            reply => Err(ProtocolError::UnexpectedReply {
                command: "HINCRBY",
                reply,
            }
            .into()),
        }
    }
}
