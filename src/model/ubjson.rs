//! Universal Binary JSON decoder for XGBoost `.ubj` model files
//!
//! XGBoost writes its model as UBJSON (big-endian numbers, length-prefixed
//! strings, and typed/counted containers for the large float arrays). The
//! decoder produces the same `serde_json::Value` tree the JSON model format
//! parses into, so the booster loader only deals with one document shape.

use serde_json::{Map, Number, Value};

use crate::error::{ModelError, ModelResult};

const MAX_DEPTH: usize = 128;

pub fn from_slice(bytes: &[u8]) -> ModelResult<Value> {
    let mut reader = Reader { bytes, pos: 0, depth: 0 };
    let value = reader.read_value()?;
    Ok(value)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn error(&self, reason: impl Into<String>) -> ModelError {
        ModelError::Ubjson {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn take(&mut self, n: usize) -> ModelResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.error(format!("unexpected end of input reading {} bytes", n)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> ModelResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> ModelResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Next type marker, skipping no-op markers.
    fn next_marker(&mut self) -> ModelResult<u8> {
        loop {
            let marker = self.read_u8()?;
            if marker != b'N' {
                return Ok(marker);
            }
        }
    }

    fn read_value(&mut self) -> ModelResult<Value> {
        let marker = self.next_marker()?;
        self.read_typed(marker)
    }

    fn read_typed(&mut self, marker: u8) -> ModelResult<Value> {
        match marker {
            b'Z' => Ok(Value::Null),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'i' | b'U' | b'I' | b'l' | b'L' => Ok(Value::Number(self.read_integer(marker)?.into())),
            b'd' => {
                let v = f32::from_be_bytes(self.take_array::<4>()?);
                Ok(float_value(v as f64))
            }
            b'D' => {
                let v = f64::from_be_bytes(self.take_array::<8>()?);
                Ok(float_value(v))
            }
            b'C' => {
                let c = self.read_u8()?;
                Ok(Value::String((c as char).to_string()))
            }
            b'S' => Ok(Value::String(self.read_string_body()?)),
            b'H' => {
                let text = self.read_string_body()?;
                let number: Number = text
                    .parse()
                    .map_err(|_| self.error(format!("invalid high-precision number '{}'", text)))?;
                Ok(Value::Number(number))
            }
            b'[' => self.nested(Self::read_array),
            b'{' => self.nested(Self::read_object),
            other => Err(self.error(format!("unknown type marker 0x{:02x}", other))),
        }
    }

    fn nested(&mut self, read: fn(&mut Self) -> ModelResult<Value>) -> ModelResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("containers nested too deeply"));
        }
        self.depth += 1;
        let value = read(self);
        self.depth -= 1;
        value
    }

    fn read_integer(&mut self, marker: u8) -> ModelResult<i64> {
        match marker {
            b'i' => Ok(i8::from_be_bytes(self.take_array::<1>()?) as i64),
            b'U' => Ok(self.read_u8()? as i64),
            b'I' => Ok(i16::from_be_bytes(self.take_array::<2>()?) as i64),
            b'l' => Ok(i32::from_be_bytes(self.take_array::<4>()?) as i64),
            b'L' => Ok(i64::from_be_bytes(self.take_array::<8>()?)),
            other => Err(self.error(format!("expected integer marker, found 0x{:02x}", other))),
        }
    }

    fn read_length(&mut self) -> ModelResult<usize> {
        let marker = self.next_marker()?;
        let len = self.read_integer(marker)?;
        usize::try_from(len).map_err(|_| self.error(format!("negative length {}", len)))
    }

    fn read_string_body(&mut self) -> ModelResult<String> {
        let len = self.read_length()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| self.error("string is not valid UTF-8"))
    }

    /// Optional `$type` and `#count` container header.
    fn read_container_header(&mut self) -> ModelResult<(Option<u8>, Option<usize>)> {
        let mut element_type = None;
        if self.peek() == Some(b'$') {
            self.pos += 1;
            let marker = self.read_u8()?;
            if matches!(marker, b'Z' | b'T' | b'F' | b'N') {
                return Err(self.error(format!(
                    "typed container of zero-width type '{}'",
                    marker as char
                )));
            }
            element_type = Some(marker);
            if self.peek() != Some(b'#') {
                return Err(self.error("typed container without a count"));
            }
        }

        let mut count = None;
        if self.peek() == Some(b'#') {
            self.pos += 1;
            let n = self.read_length()?;
            // Every element occupies at least one byte
            if n > self.remaining() {
                return Err(self.error(format!(
                    "container count {} exceeds the {} bytes left",
                    n,
                    self.remaining()
                )));
            }
            count = Some(n);
        }

        Ok((element_type, count))
    }

    fn read_element(&mut self, element_type: Option<u8>) -> ModelResult<Value> {
        match element_type {
            Some(marker) => self.read_typed(marker),
            None => self.read_value(),
        }
    }

    fn read_array(&mut self) -> ModelResult<Value> {
        let (element_type, count) = self.read_container_header()?;

        match count {
            Some(count) => {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_element(element_type)?);
                }
                Ok(Value::Array(items))
            }
            None => {
                let mut items = Vec::new();
                loop {
                    let marker = self.next_marker()?;
                    if marker == b']' {
                        break;
                    }
                    items.push(self.read_typed(marker)?);
                }
                Ok(Value::Array(items))
            }
        }
    }

    fn read_object(&mut self) -> ModelResult<Value> {
        let (element_type, count) = self.read_container_header()?;
        let mut map = Map::new();

        match count {
            Some(count) => {
                for _ in 0..count {
                    let key = self.read_string_body()?;
                    let value = self.read_element(element_type)?;
                    map.insert(key, value);
                }
            }
            None => loop {
                while self.peek() == Some(b'N') {
                    self.pos += 1;
                }
                if self.peek() == Some(b'}') {
                    self.pos += 1;
                    break;
                }
                let key = self.read_string_body()?;
                let value = self.read_value()?;
                map.insert(key, value);
            },
        }

        Ok(Value::Object(map))
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}
