//! Decoder for PHP's `serialize()` format.
//!
//! Web sessions are stored as a serialized string whose contents are
//! themselves a serialized attribute array, so records are decoded twice.
//! String lengths are byte counts, so strings are kept as raw bytes.

use thiserror::Error;

/// Deepest array/object nesting accepted.
pub const MAX_DEPTH: usize = 64;

/// A decoded PHP value.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    /// `N;`
    Null,
    /// `b:0;` / `b:1;`
    Bool(bool),
    /// `i:<n>;`
    Int(i64),
    /// `d:<f>;`
    Float(f64),
    /// `s:<len>:"<bytes>";`
    String(Vec<u8>),
    /// `a:<count>:{<key><value>...}`, insertion order preserved.
    Array(Vec<(PhpValue, PhpValue)>),
    /// `O:<len>:"<class>":<count>:{<key><value>...}`
    Object {
        /// Class name.
        class: String,
        /// Property name/value pairs.
        properties: Vec<(PhpValue, PhpValue)>,
    },
}

/// Decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhpError {
    /// Input ended inside a value.
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),
    /// A specific byte was required.
    #[error("expected '{expected}' at byte {position}")]
    Expected {
        /// Required byte.
        expected: char,
        /// Offset in the input.
        position: usize,
    },
    /// A numeric field did not parse.
    #[error("invalid number at byte {0}")]
    InvalidNumber(usize),
    /// Value type tag not handled by this decoder.
    #[error("unsupported value type '{tag}' at byte {position}")]
    Unsupported {
        /// The type tag.
        tag: char,
        /// Offset in the input.
        position: usize,
    },
    /// Bytes remained after the top-level value.
    #[error("trailing data at byte {0}")]
    TrailingData(usize),
    /// Arrays or objects nested deeper than [`MAX_DEPTH`].
    #[error("nesting deeper than {MAX_DEPTH} at byte {0}")]
    TooDeep(usize),
}

impl PhpValue {
    /// Looks up an array element or object property by string key.
    pub fn get(&self, key: &str) -> Option<&PhpValue> {
        let entries = match self {
            PhpValue::Array(entries) => entries,
            PhpValue::Object { properties, .. } => properties,
            _ => return None,
        };

        entries.iter().find_map(|(k, v)| {
            let matches = match k {
                PhpValue::String(bytes) => bytes == key.as_bytes(),
                PhpValue::Int(i) => key.parse::<i64>().ok() == Some(*i),
                _ => false,
            };
            matches.then_some(v)
        })
    }

    /// String bytes, if this is a string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PhpValue::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Non-negative integer value; numeric strings are accepted.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PhpValue::Int(i) => u64::try_from(*i).ok(),
            PhpValue::String(bytes) => std::str::from_utf8(bytes).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// PHP truthiness for booleans, integers and strings.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PhpValue::Bool(b) => Some(*b),
            PhpValue::Int(i) => Some(*i != 0),
            PhpValue::String(bytes) => Some(!(bytes.is_empty() || bytes.as_slice() == b"0")),
            PhpValue::Null => Some(false),
            _ => None,
        }
    }
}

/// Decodes a complete serialized value.
pub fn unserialize(input: &[u8]) -> Result<PhpValue, PhpError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    if parser.pos != input.len() {
        return Err(PhpError::TrailingData(parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn value(&mut self) -> Result<PhpValue, PhpError> {
        let start = self.pos;
        let tag = self.next()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(PhpValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let n = self.integer(b';')?;
                Ok(PhpValue::Bool(n != 0))
            }
            b'i' => {
                self.expect(b':')?;
                Ok(PhpValue::Int(self.integer(b';')?))
            }
            b'd' => {
                self.expect(b':')?;
                let at = self.pos;
                let raw = self.until(b';')?;
                let float = match raw {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NAN" => f64::NAN,
                    other => other.parse().map_err(|_| PhpError::InvalidNumber(at))?,
                };
                Ok(PhpValue::Float(float))
            }
            b's' => {
                self.expect(b':')?;
                let bytes = self.quoted()?;
                self.expect(b';')?;
                Ok(PhpValue::String(bytes))
            }
            b'a' => {
                self.expect(b':')?;
                Ok(PhpValue::Array(self.entries()?))
            }
            b'O' => {
                self.expect(b':')?;
                let class = String::from_utf8_lossy(&self.quoted()?).into_owned();
                self.expect(b':')?;
                Ok(PhpValue::Object {
                    class,
                    properties: self.entries()?,
                })
            }
            other => Err(PhpError::Unsupported {
                tag: other as char,
                position: start,
            }),
        }
    }

    /// `<count>:{<key><value>...}`
    fn entries(&mut self) -> Result<Vec<(PhpValue, PhpValue)>, PhpError> {
        let at = self.pos;
        if self.depth == MAX_DEPTH {
            return Err(PhpError::TooDeep(at));
        }
        let count = usize::try_from(self.integer(b':')?).map_err(|_| PhpError::InvalidNumber(at))?;
        self.expect(b'{')?;

        self.depth += 1;
        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.value()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.depth -= 1;

        self.expect(b'}')?;
        Ok(entries)
    }

    /// `<len>:"<bytes>"`
    fn quoted(&mut self) -> Result<Vec<u8>, PhpError> {
        let at = self.pos;
        let len = usize::try_from(self.integer(b':')?).map_err(|_| PhpError::InvalidNumber(at))?;
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or(PhpError::UnexpectedEnd(self.input.len()))?;
        let bytes = self.input[self.pos..end].to_vec();
        self.pos = end;
        self.expect(b'"')?;
        Ok(bytes)
    }

    fn integer(&mut self, terminator: u8) -> Result<i64, PhpError> {
        let at = self.pos;
        self.until(terminator)?
            .parse()
            .map_err(|_| PhpError::InvalidNumber(at))
    }

    /// Text up to (and consuming) `terminator`.
    fn until(&mut self, terminator: u8) -> Result<&str, PhpError> {
        let start = self.pos;
        let offset = self.input[start..]
            .iter()
            .position(|b| *b == terminator)
            .ok_or(PhpError::UnexpectedEnd(self.input.len()))?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&self.input[start..start + offset])
            .map_err(|_| PhpError::InvalidNumber(start))
    }

    fn next(&mut self) -> Result<u8, PhpError> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(PhpError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), PhpError> {
        let position = self.pos;
        match self.next()? {
            b if b == expected => Ok(()),
            _ => Err(PhpError::Expected {
                expected: expected as char,
                position,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(unserialize(b"N;").unwrap(), PhpValue::Null);
        assert_eq!(unserialize(b"b:1;").unwrap(), PhpValue::Bool(true));
        assert_eq!(unserialize(b"i:-42;").unwrap(), PhpValue::Int(-42));
        assert_eq!(unserialize(b"d:1.5;").unwrap(), PhpValue::Float(1.5));
        assert_eq!(
            unserialize(b"s:5:\"hello\";").unwrap(),
            PhpValue::String(b"hello".to_vec())
        );
    }

    #[test]
    fn test_string_length_counts_bytes() {
        // "héllo" is six bytes in UTF-8
        let value = unserialize("s:6:\"héllo\";".as_bytes()).unwrap();
        assert_eq!(value.as_bytes(), Some("héllo".as_bytes()));
    }

    #[test]
    fn test_string_may_contain_quotes_and_semicolons() {
        let value = unserialize(b"s:7:\"a\";b:\"c\";").unwrap();
        assert_eq!(value.as_bytes(), Some(&b"a\";b:\"c"[..]));
    }

    #[test]
    fn test_array_lookup() {
        let value = unserialize(b"a:3:{s:6:\"_token\";s:3:\"abc\";s:5:\"login\";i:7;i:0;b:1;}").unwrap();
        assert_eq!(value.get("_token").and_then(PhpValue::as_bytes), Some(&b"abc"[..]));
        assert_eq!(value.get("login").and_then(PhpValue::as_u64), Some(7));
        assert_eq!(value.get("0").and_then(PhpValue::as_bool), Some(true));
        assert!(value.get("missing").is_none());
    }

    #[test]
    fn test_object_properties() {
        let value = unserialize(b"O:8:\"stdClass\":1:{s:3:\"foo\";s:1:\"1\";}").unwrap();
        match &value {
            PhpValue::Object { class, .. } => assert_eq!(class, "stdClass"),
            other => panic!("expected object, got {other:?}"),
        }
        assert_eq!(value.get("foo").and_then(PhpValue::as_u64), Some(1));
    }

    #[test]
    fn test_double_serialized_record() {
        let inner = b"a:1:{s:6:\"_token\";s:3:\"xyz\";}";
        let outer = format!("s:{}:\"{}\";", inner.len(), std::str::from_utf8(inner).unwrap());

        let first = unserialize(outer.as_bytes()).unwrap();
        let second = unserialize(first.as_bytes().unwrap()).unwrap();
        assert_eq!(second.get("_token").and_then(PhpValue::as_bytes), Some(&b"xyz"[..]));
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(unserialize(b"s:10:\"short\";"), Err(PhpError::UnexpectedEnd(_))));
        assert!(matches!(unserialize(b"a:2:{i:0;i:1;"), Err(PhpError::UnexpectedEnd(_))));
    }

    fn nested_arrays(depth: usize) -> Vec<u8> {
        let mut input = "a:1:{i:0;".repeat(depth);
        input.push_str("N;");
        input.push_str(&"}".repeat(depth));
        input.into_bytes()
    }

    #[test]
    fn test_nesting_limit() {
        assert!(unserialize(&nested_arrays(MAX_DEPTH)).is_ok());
        assert!(matches!(
            unserialize(&nested_arrays(MAX_DEPTH + 1)),
            Err(PhpError::TooDeep(_))
        ));
        // far past the limit fails cleanly instead of exhausting the stack
        assert!(matches!(
            unserialize(&nested_arrays(100_000)),
            Err(PhpError::TooDeep(_))
        ));
    }

    #[test]
    fn test_rejects_trailing_data_and_unknown_tags() {
        assert_eq!(unserialize(b"N;N;"), Err(PhpError::TrailingData(2)));
        assert!(matches!(
            unserialize(b"r:1;"),
            Err(PhpError::Unsupported { tag: 'r', position: 0 })
        ));
        assert!(matches!(unserialize(b"i:abc;"), Err(PhpError::InvalidNumber(2))));
    }
}
