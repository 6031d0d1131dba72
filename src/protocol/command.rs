use crate::protocol::resp::Value;

/// Redis commands spoken by the durable counter store
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// AUTH [username] password
    Auth {
        username: Option<String>,
        password: String,
    },
    /// PING
    Ping,
    /// SELECT index
    Select(u32),
    /// HGET key field
    HGet { key: String, field: String },
    /// HSET key field value
    HSet {
        key: String,
        field: String,
        value: u64,
    },
    /// HINCRBY key field increment
    HIncrBy { key: String, field: String, by: i64 },
    /// Unknown or malformed command, carrying the error reply text
    Unknown(String),
}

impl Command {
    /// Command name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::Auth { .. } => "AUTH",
            Command::Ping => "PING",
            Command::Select(_) => "SELECT",
            Command::HGet { .. } => "HGET",
            Command::HSet { .. } => "HSET",
            Command::HIncrBy { .. } => "HINCRBY",
            Command::Unknown(_) => "UNKNOWN",
        }
    }

    /// Encode the command as a RESP array of bulk strings
    pub fn to_resp(&self) -> Value {
        let mut args = vec![Value::bulk(self.name())];
        match self {
            Command::Auth { username, password } => {
                if let Some(username) = username {
                    args.push(Value::bulk(username));
                }
                args.push(Value::bulk(password));
            }
            Command::Ping | Command::Unknown(_) => {}
            Command::Select(index) => args.push(Value::bulk(index.to_string())),
            Command::HGet { key, field } => {
                args.push(Value::bulk(key));
                args.push(Value::bulk(field));
            }
            Command::HSet { key, field, value } => {
                args.push(Value::bulk(key));
                args.push(Value::bulk(field));
                args.push(Value::bulk(value.to_string()));
            }
            Command::HIncrBy { key, field, by } => {
                args.push(Value::bulk(key));
                args.push(Value::bulk(field));
                args.push(Value::bulk(by.to_string()));
            }
        }
        Value::Array(Some(args))
    }

    /// Parse a RESP array into a Command.
    ///
    /// The store only sends commands; this is the server side, used by the
    /// in-process RESP backend the store tests run against.
    pub fn from_resp(value: Value) -> Option<Self> {
        match value {
            Value::Array(Some(items)) if !items.is_empty() => {
                let Some(cmd_name) = items[0].as_text() else {
                    return Some(Command::Unknown("ERR invalid command format".to_string()));
                };
                let cmd_name = cmd_name.to_uppercase();
                let args: Vec<String> = match items[1..].iter().map(Value::as_text).collect() {
                    Some(args) => args,
                    None => return Some(Command::Unknown("ERR invalid argument".to_string())),
                };

                let parsed = match cmd_name.as_str() {
                    "AUTH" => Self::parse_auth(args),
                    "PING" => Self::parse_arity(&cmd_name, &args, 0).map(|_| Command::Ping),
                    "SELECT" => Self::parse_select(args),
                    "HGET" => Self::parse_hget(args),
                    "HSET" => Self::parse_hset(args),
                    "HINCRBY" => Self::parse_hincrby(args),
                    _ => Err(format!("ERR unknown command '{}'", cmd_name)),
                };
                Some(parsed.unwrap_or_else(Command::Unknown))
            }
            _ => None,
        }
    }

    fn parse_arity(name: &str, args: &[String], expected: usize) -> Result<(), String> {
        if args.len() != expected {
            return Err(format!(
                "ERR wrong number of arguments for '{}' command",
                name.to_lowercase()
            ));
        }
        Ok(())
    }

    fn parse_auth(mut args: Vec<String>) -> Result<Command, String> {
        match args.len() {
            1 => Ok(Command::Auth {
                username: None,
                password: args.remove(0),
            }),
            2 => {
                let password = args.remove(1);
                Ok(Command::Auth {
                    username: Some(args.remove(0)),
                    password,
                })
            }
            _ => Err("ERR wrong number of arguments for 'auth' command".to_string()),
        }
    }

    fn parse_select(args: Vec<String>) -> Result<Command, String> {
        Self::parse_arity("SELECT", &args, 1)?;
        args[0]
            .parse()
            .map(Command::Select)
            .map_err(|_| "ERR value is not an integer or out of range".to_string())
    }

    fn parse_hget(mut args: Vec<String>) -> Result<Command, String> {
        Self::parse_arity("HGET", &args, 2)?;
        let field = args.remove(1);
        Ok(Command::HGet {
            key: args.remove(0),
            field,
        })
    }

    fn parse_hset(mut args: Vec<String>) -> Result<Command, String> {
        Self::parse_arity("HSET", &args, 3)?;
        let value = args[2]
            .parse()
            .map_err(|_| "ERR value is not an integer or out of range".to_string())?;
        args.truncate(2);
        let field = args.remove(1);
        Ok(Command::HSet {
            key: args.remove(0),
            field,
            value,
        })
    }

    fn parse_hincrby(mut args: Vec<String>) -> Result<Command, String> {
        Self::parse_arity("HINCRBY", &args, 3)?;
        let by = args[2]
            .parse()
            .map_err(|_| "ERR value is not an integer or out of range".to_string())?;
        args.truncate(2);
        let field = args.remove(1);
        Ok(Command::HIncrBy {
            key: args.remove(0),
            field,
            by,
        })
    }
}
