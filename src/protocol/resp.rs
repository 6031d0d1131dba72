use atoi::FromRadix10SignedChecked;

use super::ProtocolError;

/// RESP (REdis Serialization Protocol) data types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// Simple strings, used for simple responses like "OK"
  SimpleString(String),
  /// Errors
  Error(String),
  /// Integers
  Integer(i64),
  /// Bulk strings, used for binary-safe strings (can be null)
  BulkString(Option<Vec<u8>>),
  /// Arrays of other values (can be null)
  Array(Option<Vec<Value>>),
}

impl Value {
  /// Create a simple OK response
  pub fn ok() -> Self {
    Value::SimpleString("OK".to_string())
  }

  /// Create an error response
  pub fn error(msg: impl Into<String>) -> Self {
    Value::Error(msg.into())
  }

  /// Create a non-null bulk string
  pub fn bulk(data: impl AsRef<[u8]>) -> Self {
    Value::BulkString(Some(data.as_ref().to_vec()))
  }

  /// Create a null bulk string (the reply for a missing key or field)
  pub fn nil() -> Self {
    Value::BulkString(None)
  }

  /// Whether this is a null bulk string or null array
  pub fn is_nil(&self) -> bool {
    matches!(self, Value::BulkString(None) | Value::Array(None))
  }

  /// Textual payload of a simple or bulk string
  pub fn as_text(&self) -> Option<String> {
    match self {
      Value::SimpleString(s) => Some(s.clone()),
      Value::BulkString(Some(data)) => Some(String::from_utf8_lossy(data).to_string()),
      _ => None,
    }
  }

  /// Encode Value to RESP bytes
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = Vec::new();
    self.encode_to(&mut buf);
    buf
  }

  fn encode_to(&self, buf: &mut Vec<u8>) {
    match self {
      Value::SimpleString(s) => {
        buf.push(b'+');
        buf.extend_from_slice(s.as_bytes());
        buf.extend_from_slice(b"\r\n");
      }
      Value::Error(e) => {
        buf.push(b'-');
        buf.extend_from_slice(e.as_bytes());
        buf.extend_from_slice(b"\r\n");
      }
      Value::Integer(i) => {
        buf.push(b':');
        buf.extend_from_slice(i.to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
      }
      Value::BulkString(None) => {
        buf.extend_from_slice(b"$-1\r\n");
      }
      Value::BulkString(Some(data)) => {
        buf.push(b'$');
        buf.extend_from_slice(data.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\r\n");
      }
      Value::Array(None) => {
        buf.extend_from_slice(b"*-1\r\n");
      }
      Value::Array(Some(items)) => {
        buf.push(b'*');
        buf.extend_from_slice(items.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        for item in items {
          item.encode_to(buf);
        }
      }
    }
  }
}

/// Incremental parser for RESP frames.
///
/// `Ok(None)` means the buffer holds only part of a frame and the caller should
/// read more bytes; `Err` means the bytes can never form a valid frame.
pub struct Parser;

impl Parser {
  /// Parse one value from the front of `buffer`, returning it with the number
  /// of bytes consumed.
  pub fn parse(buffer: &[u8]) -> Result<Option<(Value, usize)>, ProtocolError> {
    if buffer.is_empty() {
      return Ok(None);
    }

    let mut pos = 0;
    let result = Self::parse_value(buffer, &mut pos)?;
    Ok(result.map(|value| (value, pos)))
  }

  fn parse_value(buffer: &[u8], pos: &mut usize) -> Result<Option<Value>, ProtocolError> {
    if *pos >= buffer.len() {
      return Ok(None);
    }

    let type_byte = buffer[*pos];
    *pos += 1;

    match type_byte {
      b'+' => Ok(Self::read_line(buffer, pos).map(|line| {
        Value::SimpleString(String::from_utf8_lossy(line).to_string())
      })),
      b'-' => Ok(
        Self::read_line(buffer, pos).map(|line| Value::Error(String::from_utf8_lossy(line).to_string())),
      ),
      b':' => match Self::read_line(buffer, pos) {
        Some(line) => Ok(Some(Value::Integer(Self::parse_len(line)?))),
        None => Ok(None),
      },
      b'$' => Self::parse_bulk_string(buffer, pos),
      b'*' => Self::parse_array(buffer, pos),
      other => Err(ProtocolError::UnknownType(other)),
    }
  }

  fn parse_bulk_string(buffer: &[u8], pos: &mut usize) -> Result<Option<Value>, ProtocolError> {
    let Some(line) = Self::read_line(buffer, pos) else {
      return Ok(None);
    };
    let len = Self::parse_len(line)?;

    if len == -1 {
      return Ok(Some(Value::BulkString(None)));
    }
    if len < 0 {
      return Err(ProtocolError::InvalidLength(len));
    }

    let len = len as usize;

    // Payload plus trailing \r\n
    if *pos + len + 2 > buffer.len() {
      return Ok(None);
    }
    if &buffer[*pos + len..*pos + len + 2] != b"\r\n" {
      return Err(ProtocolError::MissingTerminator);
    }

    let data = buffer[*pos..*pos + len].to_vec();
    *pos += len + 2;

    Ok(Some(Value::BulkString(Some(data))))
  }

  fn parse_array(buffer: &[u8], pos: &mut usize) -> Result<Option<Value>, ProtocolError> {
    let Some(line) = Self::read_line(buffer, pos) else {
      return Ok(None);
    };
    let count = Self::parse_len(line)?;

    if count == -1 {
      return Ok(Some(Value::Array(None)));
    }
    if count < 0 {
      return Err(ProtocolError::InvalidLength(count));
    }

    let count = count as usize;
    let mut items = Vec::with_capacity(count.min(1024));

    for _ in 0..count {
      match Self::parse_value(buffer, pos)? {
        Some(item) => items.push(item),
        None => return Ok(None),
      }
    }

    Ok(Some(Value::Array(Some(items))))
  }

  fn parse_len(line: &[u8]) -> Result<i64, ProtocolError> {
    match i64::from_radix_10_signed_checked(line) {
      (Some(n), used) if used == line.len() && !line.is_empty() => Ok(n),
      _ => Err(ProtocolError::InvalidInteger(
        String::from_utf8_lossy(line).to_string(),
      )),
    }
  }

  fn read_line<'a>(buffer: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let start = *pos;
    let offset = buffer[start..].windows(2).position(|w| w == b"\r\n")?;
    *pos = start + offset + 2;
    Some(&buffer[start..start + offset])
  }
}
