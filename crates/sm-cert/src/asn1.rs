// asn1.rs — Pattern-driven DER encoder and decoder.
//
// Certificates are built and taken apart with a compact pattern language,
// one character per element:
//
//   (...)    SEQUENCE              {...}  SET
//   c<n>(..) explicit context tag [n]
//   i        INTEGER (u32)         l      INTEGER (big-endian bytes)
//   o        OBJECT IDENTIFIER     x      OCTET STRING
//   b        BIT STRING            n      NULL
//   u        UTF8String            p      PrintableString
//   a        IA5String             t      UTCTime
//   g        GeneralizedTime
//   R        raw pre-encoded bytes (encode only)
//   ?        any single element, returned raw with its header (decode only)
//   .        the rest of the current level, returned raw (decode only)
//
// Headers, lengths and the typed primitives come from the `der` crate, so
// only DER definite lengths are accepted. Tags are compared exactly.
// String and time elements carry their content bytes unchecked: a group id
// is 16 raw bytes inside a UTF8String.

use std::slice;

use der::asn1::{BitStringRef, Null, ObjectIdentifier, OctetStringRef, UintRef};
use der::{Decode, Encode, Header, Reader, SliceReader, Tag, TagNumber};

use crate::error::CertError;

/// Largest context tag number expressible in a single identifier octet.
const MAX_CONTEXT_TAG: u8 = 30;

/// One value consumed by [`encode`] or produced by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asn1Value {
    /// `i`
    Int(u32),
    /// `l`, unsigned big-endian magnitude.
    Integer(Vec<u8>),
    /// `o`, dotted decimal form.
    Oid(String),
    /// `x`
    Octets(Vec<u8>),
    /// `b`
    Bits { data: Vec<u8>, unused_bits: u8 },
    /// `u`
    Utf8(Vec<u8>),
    /// `p`
    Printable(Vec<u8>),
    /// `a`
    Ascii(Vec<u8>),
    /// `t`, e.g. `b"250101120000Z"`.
    UtcTime(Vec<u8>),
    /// `g`, e.g. `b"20500101120000Z"`.
    GeneralizedTime(Vec<u8>),
    /// `R`, `?` and `.`
    Raw(Vec<u8>),
}

impl Asn1Value {
    /// Bit string with no unused bits.
    pub fn bits(data: Vec<u8>) -> Self {
        Asn1Value::Bits {
            data,
            unused_bits: 0,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Asn1Value::Int(_) => "Int",
            Asn1Value::Integer(_) => "Integer",
            Asn1Value::Oid(_) => "Oid",
            Asn1Value::Octets(_) => "Octets",
            Asn1Value::Bits { .. } => "Bits",
            Asn1Value::Utf8(_) => "Utf8",
            Asn1Value::Printable(_) => "Printable",
            Asn1Value::Ascii(_) => "Ascii",
            Asn1Value::UtcTime(_) => "UtcTime",
            Asn1Value::GeneralizedTime(_) => "GeneralizedTime",
            Asn1Value::Raw(_) => "Raw",
        }
    }
}

fn encode_error(e: der::Error) -> CertError {
    CertError::Encode(e.to_string())
}

fn decode_error(e: der::Error) -> CertError {
    CertError::Decode(e.to_string())
}

/// Encode `values` according to `pattern`. Every value must be consumed.
pub fn encode(pattern: &str, values: &[Asn1Value]) -> Result<Vec<u8>, CertError> {
    let mut encoder = Encoder {
        pattern: pattern.as_bytes(),
        pos: 0,
        values: values.iter(),
    };
    let out = encoder.encode_level(None)?;
    if encoder.values.next().is_some() {
        return Err(CertError::Encode(format!(
            "pattern '{pattern}' left values unused"
        )));
    }
    Ok(out)
}

/// Decode `der` according to `pattern`, requiring the input to be
/// consumed exactly.
pub fn decode(pattern: &str, der: &[u8]) -> Result<Vec<Asn1Value>, CertError> {
    let (values, consumed) = decode_prefix(pattern, der)?;
    if consumed != der.len() {
        return Err(CertError::Decode(format!(
            "{} trailing bytes after '{pattern}'",
            der.len() - consumed
        )));
    }
    Ok(values)
}

/// Decode the leading elements of `der` according to `pattern`. Returns
/// the values and the number of bytes consumed.
pub fn decode_prefix(pattern: &str, der: &[u8]) -> Result<(Vec<Asn1Value>, usize), CertError> {
    let mut decoder = Decoder {
        pattern: pattern.as_bytes(),
        pos: 0,
        out: Vec::new(),
    };
    let consumed = decoder.decode_level(der, None)?;
    Ok((decoder.out, consumed))
}

/// Wrap `content` in a tag-length header.
pub fn tlv(tag: Tag, content: &[u8]) -> Result<Vec<u8>, CertError> {
    let mut out = Vec::with_capacity(content.len() + 6);
    write_tlv(&mut out, tag, content)?;
    Ok(out)
}

fn write_tlv(out: &mut Vec<u8>, tag: Tag, content: &[u8]) -> Result<(), CertError> {
    Header::new(tag, content.len())
        .and_then(|header| header.encode_to_vec(out))
        .map_err(encode_error)?;
    out.extend_from_slice(content);
    Ok(())
}

fn write_value(out: &mut Vec<u8>, value: &impl Encode) -> Result<(), CertError> {
    value.encode_to_vec(out).map_err(encode_error)?;
    Ok(())
}

/// One element read from the input.
struct Element<'a> {
    tag: Tag,
    /// Header and content.
    raw: &'a [u8],
    content: &'a [u8],
    /// Offset just past the element.
    end: usize,
}

fn read_element(data: &[u8], offset: usize) -> Result<Element<'_>, CertError> {
    let rest = data
        .get(offset..)
        .ok_or_else(|| CertError::Decode(format!("truncated element at offset {offset}")))?;
    let mut reader = SliceReader::new(rest).map_err(decode_error)?;
    let header = Header::decode(&mut reader).map_err(decode_error)?;
    let content = reader.read_slice(header.length).map_err(decode_error)?;
    let used = usize::try_from(reader.position()).map_err(decode_error)?;
    Ok(Element {
        tag: header.tag,
        raw: &rest[..used],
        content,
        end: offset + used,
    })
}

fn read_expected(data: &[u8], offset: usize, expected: Tag) -> Result<Element<'_>, CertError> {
    let element = read_element(data, offset)?;
    if element.tag != expected {
        return Err(CertError::Decode(format!(
            "expected {expected} at offset {offset}, found {}",
            element.tag
        )));
    }
    Ok(element)
}

/// Parse `c<digits>(` and return the tag. `pos` points after `c`.
fn context_tag(pattern: &[u8], pos: &mut usize) -> Result<Tag, String> {
    let start = *pos;
    while pattern.get(*pos).is_some_and(u8::is_ascii_digit) {
        *pos += 1;
    }
    let number: u8 = std::str::from_utf8(&pattern[start..*pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n <= MAX_CONTEXT_TAG)
        .ok_or_else(|| "context tag needs a number between 0 and 30".to_string())?;
    if pattern.get(*pos) != Some(&b'(') {
        return Err("context tag must be followed by '('".into());
    }
    *pos += 1;
    Ok(Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::new(number),
    })
}

/// Tag of the string and time symbols, whose content is carried as is.
fn string_tag(symbol: u8) -> Option<Tag> {
    match symbol {
        b'u' => Some(Tag::Utf8String),
        b'p' => Some(Tag::PrintableString),
        b'a' => Some(Tag::Ia5String),
        b't' => Some(Tag::UtcTime),
        b'g' => Some(Tag::GeneralizedTime),
        _ => None,
    }
}

struct Encoder<'a> {
    pattern: &'a [u8],
    pos: usize,
    values: slice::Iter<'a, Asn1Value>,
}

impl<'a> Encoder<'a> {
    fn next_value(&mut self, symbol: char) -> Result<&'a Asn1Value, CertError> {
        self.values
            .next()
            .ok_or_else(|| CertError::Encode(format!("no value left for '{symbol}'")))
    }

    fn mismatch(symbol: char, value: &Asn1Value) -> CertError {
        CertError::Encode(format!(
            "'{symbol}' cannot encode a {} value",
            value.describe()
        ))
    }

    fn encode_level(&mut self, close: Option<u8>) -> Result<Vec<u8>, CertError> {
        let mut out = Vec::new();
        loop {
            let Some(&symbol) = self.pattern.get(self.pos) else {
                return match close {
                    Some(c) => Err(CertError::Encode(format!("missing '{}'", c as char))),
                    None => Ok(out),
                };
            };
            self.pos += 1;
            let sym = symbol as char;

            match symbol {
                b')' | b'}' => {
                    return if close == Some(symbol) {
                        Ok(out)
                    } else {
                        Err(CertError::Encode(format!("unbalanced '{sym}'")))
                    };
                }
                b'(' => {
                    let inner = self.encode_level(Some(b')'))?;
                    write_tlv(&mut out, Tag::Sequence, &inner)?;
                }
                b'{' => {
                    let inner = self.encode_level(Some(b'}'))?;
                    write_tlv(&mut out, Tag::Set, &inner)?;
                }
                b'c' => {
                    let tag = context_tag(self.pattern, &mut self.pos).map_err(CertError::Encode)?;
                    let inner = self.encode_level(Some(b')'))?;
                    write_tlv(&mut out, tag, &inner)?;
                }
                b'n' => write_value(&mut out, &Null)?,
                _ => {
                    let value = self.next_value(sym)?;
                    self.encode_value(&mut out, symbol, value)?;
                }
            }
        }
    }

    fn encode_value(
        &self,
        out: &mut Vec<u8>,
        symbol: u8,
        value: &Asn1Value,
    ) -> Result<(), CertError> {
        let sym = symbol as char;
        match (symbol, value) {
            (b'i', Asn1Value::Int(v)) => write_value(out, v),
            (b'l', Asn1Value::Integer(bytes)) => {
                let magnitude: &[u8] = if bytes.is_empty() { &[0] } else { bytes };
                write_value(out, &UintRef::new(magnitude).map_err(encode_error)?)
            }
            (b'o', Asn1Value::Oid(dotted)) => {
                let oid = ObjectIdentifier::new(dotted).map_err(|e| {
                    CertError::Encode(format!("invalid object identifier '{dotted}': {e}"))
                })?;
                write_value(out, &oid)
            }
            (b'x', Asn1Value::Octets(bytes)) => {
                write_value(out, &OctetStringRef::new(bytes).map_err(encode_error)?)
            }
            (b'b', Asn1Value::Bits { data, unused_bits }) => {
                let mut masked = data.clone();
                if let Some(last) = masked.last_mut().filter(|_| *unused_bits <= 7) {
                    *last &= 0xFFu8 << *unused_bits;
                }
                let bits = BitStringRef::new(*unused_bits, &masked).map_err(|_| {
                    CertError::Encode(format!("invalid unused bit count {unused_bits}"))
                })?;
                write_value(out, &bits)
            }
            (b'u', Asn1Value::Utf8(bytes))
            | (b'p', Asn1Value::Printable(bytes))
            | (b'a', Asn1Value::Ascii(bytes))
            | (b't', Asn1Value::UtcTime(bytes))
            | (b'g', Asn1Value::GeneralizedTime(bytes)) => match string_tag(symbol) {
                Some(tag) => write_tlv(out, tag, bytes),
                None => Err(Self::mismatch(sym, value)),
            },
            (b'R', Asn1Value::Raw(bytes)) => {
                out.extend_from_slice(bytes);
                Ok(())
            }
            (b'i' | b'l' | b'o' | b'x' | b'b' | b'u' | b'p' | b'a' | b't' | b'g' | b'R', v) => {
                Err(Self::mismatch(sym, v))
            }
            _ => Err(CertError::Encode(format!(
                "unsupported pattern character '{sym}'"
            ))),
        }
    }
}

struct Decoder<'a> {
    pattern: &'a [u8],
    pos: usize,
    out: Vec<Asn1Value>,
}

impl Decoder<'_> {
    /// Decode one nesting level of `data`; returns bytes consumed.
    fn decode_level(&mut self, data: &[u8], close: Option<u8>) -> Result<usize, CertError> {
        let mut offset = 0;
        loop {
            let Some(&symbol) = self.pattern.get(self.pos) else {
                return match close {
                    Some(c) => Err(CertError::Decode(format!("pattern missing '{}'", c as char))),
                    None => Ok(offset),
                };
            };
            self.pos += 1;

            offset = match symbol {
                b')' | b'}' => {
                    return if close == Some(symbol) {
                        Ok(offset)
                    } else {
                        Err(CertError::Decode(format!(
                            "unbalanced '{}' in pattern",
                            symbol as char
                        )))
                    };
                }
                b'(' => self.decode_constructed(data, offset, Tag::Sequence, b')')?,
                b'{' => self.decode_constructed(data, offset, Tag::Set, b'}')?,
                b'c' => {
                    let tag = context_tag(self.pattern, &mut self.pos).map_err(CertError::Decode)?;
                    self.decode_constructed(data, offset, tag, b')')?
                }
                b'?' => {
                    let element = read_element(data, offset)?;
                    self.out.push(Asn1Value::Raw(element.raw.to_vec()));
                    element.end
                }
                b'.' => {
                    self.out.push(Asn1Value::Raw(data[offset..].to_vec()));
                    data.len()
                }
                b'n' => {
                    let element = read_expected(data, offset, Tag::Null)?;
                    Null::from_der(element.raw).map_err(decode_error)?;
                    element.end
                }
                b'i' => {
                    let element = read_expected(data, offset, Tag::Integer)?;
                    let value = u32::from_der(element.raw).map_err(decode_error)?;
                    self.out.push(Asn1Value::Int(value));
                    element.end
                }
                b'l' => {
                    let element = read_expected(data, offset, Tag::Integer)?;
                    let value = UintRef::from_der(element.raw).map_err(decode_error)?;
                    self.out.push(Asn1Value::Integer(value.as_bytes().to_vec()));
                    element.end
                }
                b'o' => {
                    let element = read_expected(data, offset, Tag::ObjectIdentifier)?;
                    let oid = ObjectIdentifier::from_der(element.raw).map_err(decode_error)?;
                    self.out.push(Asn1Value::Oid(oid.to_string()));
                    element.end
                }
                b'x' => {
                    let element = read_expected(data, offset, Tag::OctetString)?;
                    self.out.push(Asn1Value::Octets(element.content.to_vec()));
                    element.end
                }
                b'b' => {
                    let element = read_expected(data, offset, Tag::BitString)?;
                    let bits = BitStringRef::from_der(element.raw).map_err(decode_error)?;
                    self.out.push(Asn1Value::Bits {
                        data: bits.raw_bytes().to_vec(),
                        unused_bits: bits.unused_bits(),
                    });
                    element.end
                }
                b'u' | b'p' | b'a' | b't' | b'g' => {
                    let wrap: fn(Vec<u8>) -> Asn1Value = match symbol {
                        b'u' => Asn1Value::Utf8,
                        b'p' => Asn1Value::Printable,
                        b'a' => Asn1Value::Ascii,
                        b't' => Asn1Value::UtcTime,
                        _ => Asn1Value::GeneralizedTime,
                    };
                    let tag = string_tag(symbol).ok_or_else(|| {
                        CertError::Decode(format!("no tag for '{}'", symbol as char))
                    })?;
                    let element = read_expected(data, offset, tag)?;
                    self.out.push(wrap(element.content.to_vec()));
                    element.end
                }
                other => {
                    return Err(CertError::Decode(format!(
                        "unsupported pattern character '{}'",
                        other as char
                    )));
                }
            };
        }
    }

    fn decode_constructed(
        &mut self,
        data: &[u8],
        offset: usize,
        tag: Tag,
        close: u8,
    ) -> Result<usize, CertError> {
        let element = read_expected(data, offset, tag)?;
        let used = self.decode_level(element.content, Some(close))?;
        if used != element.content.len() {
            return Err(CertError::Decode(format!(
                "{} unexpected bytes inside {tag}",
                element.content.len() - used
            )));
        }
        Ok(element.end)
    }
}
