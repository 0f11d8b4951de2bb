use core::fmt;

use heapless::{String, Vec};

use crate::config::PROVISION_FIELD_MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldError {
    MissingRequiredField(&'static str),
    FieldTooLong(&'static str),
    InvalidString(&'static str),
    MalformedPayload,
}

impl FieldError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequiredField(_) => "missing required field",
            Self::FieldTooLong(_) => "field too long",
            Self::InvalidString(_) => "field is not a string",
            Self::MalformedPayload => "malformed payload",
        }
    }

    pub const fn field(self) -> Option<&'static str> {
        match self {
            Self::MissingRequiredField(field)
            | Self::FieldTooLong(field)
            | Self::InvalidString(field) => Some(field),
            Self::MalformedPayload => None,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field() {
            Some(field) => write!(f, "{}: {}", self.as_str(), field),
            None => f.write_str(self.as_str()),
        }
    }
}

/// A field value as it appears in the source, before typing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RawValue<'a> {
    /// Already-decoded text.
    Text(&'a str),
    /// Contents of a JSON string literal, escapes still encoded.
    Quoted(&'a str),
    /// A JSON number, boolean or null token.
    Bare(&'a str),
    /// An object or array.
    Nested,
}

/// Keyed lookup over submitted fields with typed accessors.
pub trait FieldMap {
    fn raw(&self, key: &str) -> Option<RawValue<'_>>;

    /// Non-empty string. Whitespace-only counts as missing.
    fn required_str<const N: usize>(&self, key: &'static str) -> Result<String<N>, FieldError> {
        match self.optional_str::<N>(key)? {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(FieldError::MissingRequiredField(key)),
        }
    }

    fn optional_str<const N: usize>(
        &self,
        key: &'static str,
    ) -> Result<Option<String<N>>, FieldError> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        let mut out = String::new();
        match raw {
            RawValue::Text(text) => out
                .push_str(text)
                .map_err(|_| FieldError::FieldTooLong(key))?,
            RawValue::Quoted(literal) => unescape_into(literal, &mut out, key)?,
            RawValue::Bare("null") => return Ok(None),
            RawValue::Bare(token) => out
                .push_str(token)
                .map_err(|_| FieldError::FieldTooLong(key))?,
            RawValue::Nested => return Err(FieldError::InvalidString(key)),
        }
        Ok(Some(out))
    }

    /// Integer, quoted or bare. Anything unparsable yields `default`.
    fn int_or(&self, key: &str, default: i32) -> i32 {
        let text = match self.raw(key) {
            Some(RawValue::Text(text) | RawValue::Quoted(text) | RawValue::Bare(text)) => text,
            _ => return default,
        };
        text.trim().parse().unwrap_or(default)
    }
}

impl FieldMap for [(&str, &str)] {
    fn raw(&self, key: &str) -> Option<RawValue<'_>> {
        self.iter()
            .rev()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| RawValue::Text(value))
    }
}

/// Flat JSON object reader. Keys may come in any order; a repeated key
/// resolves to its last occurrence. Nested values are skipped.
#[derive(Debug)]
pub struct JsonFields<'a> {
    fields: Vec<(&'a str, RawValue<'a>), PROVISION_FIELD_MAX>,
}

impl<'a> JsonFields<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, FieldError> {
        let text = core::str::from_utf8(payload).map_err(|_| FieldError::MalformedPayload)?;
        let mut scanner = Scanner { text, pos: 0 };
        let mut fields = Vec::new();

        scanner.skip_ws();
        scanner.expect(b'{')?;
        scanner.skip_ws();
        if scanner.eat(b'}') {
            return scanner.finish(fields);
        }
        loop {
            scanner.skip_ws();
            let key = scanner.string()?;
            scanner.skip_ws();
            scanner.expect(b':')?;
            scanner.skip_ws();
            let value = scanner.value()?;
            fields
                .push((key, value))
                .map_err(|_| FieldError::MalformedPayload)?;
            scanner.skip_ws();
            if scanner.eat(b',') {
                continue;
            }
            scanner.expect(b'}')?;
            return scanner.finish(fields);
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldMap for JsonFields<'_> {
    fn raw(&self, key: &str) -> Option<RawValue<'_>> {
        self.fields
            .iter()
            .rev()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), FieldError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(FieldError::MalformedPayload)
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Returns the literal between the quotes without decoding escapes.
    fn string(&mut self) -> Result<&'a str, FieldError> {
        self.expect(b'"')?;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(FieldError::MalformedPayload),
                Some(b'"') => break,
                Some(b'\\') => self.pos += 2,
                Some(_) => self.pos += 1,
            }
        }
        let literal = self
            .text
            .get(start..self.pos)
            .ok_or(FieldError::MalformedPayload)?;
        self.pos += 1;
        Ok(literal)
    }

    fn value(&mut self) -> Result<RawValue<'a>, FieldError> {
        match self.peek() {
            Some(b'"') => Ok(RawValue::Quoted(self.string()?)),
            Some(b'{' | b'[') => {
                self.skip_nested()?;
                Ok(RawValue::Nested)
            }
            Some(_) => {
                let start = self.pos;
                while !matches!(
                    self.peek(),
                    None | Some(b',' | b'}' | b' ' | b'\t' | b'\r' | b'\n')
                ) {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(FieldError::MalformedPayload);
                }
                self.text
                    .get(start..self.pos)
                    .map(RawValue::Bare)
                    .ok_or(FieldError::MalformedPayload)
            }
            None => Err(FieldError::MalformedPayload),
        }
    }

    fn skip_nested(&mut self) -> Result<(), FieldError> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(FieldError::MalformedPayload),
                Some(b'"') => {
                    self.string()?;
                    continue;
                }
                Some(b'{' | b'[') => depth += 1,
                Some(b'}' | b']') => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
            self.pos += 1;
        }
    }

    fn finish(
        mut self,
        fields: Vec<(&'a str, RawValue<'a>), PROVISION_FIELD_MAX>,
    ) -> Result<JsonFields<'a>, FieldError> {
        self.skip_ws();
        if self.peek().is_some() {
            return Err(FieldError::MalformedPayload);
        }
        Ok(JsonFields { fields })
    }
}

fn unescape_into<const N: usize>(
    literal: &str,
    out: &mut String<N>,
    key: &'static str,
) -> Result<(), FieldError> {
    let too_long = |_| FieldError::FieldTooLong(key);
    let mut chars = literal.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch).map_err(too_long)?;
            continue;
        }
        let decoded = match chars.next() {
            Some('"') => '"',
            Some('\\') => '\\',
            Some('/') => '/',
            Some('b') => '\u{8}',
            Some('f') => '\u{c}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('u') => {
                let high = hex4(&mut chars).ok_or(FieldError::MalformedPayload)?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(FieldError::MalformedPayload);
                    }
                    let low = hex4(&mut chars).ok_or(FieldError::MalformedPayload)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(FieldError::MalformedPayload);
                    }
                    0x1_0000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                char::from_u32(code).ok_or(FieldError::MalformedPayload)?
            }
            _ => return Err(FieldError::MalformedPayload),
        };
        out.push(decoded).map_err(too_long)?;
    }
    Ok(())
}

fn hex4(chars: &mut core::str::Chars<'_>) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..4 {
        value = (value << 4) | chars.next()?.to_digit(16)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_in_any_order_with_whitespace() {
        let fields = JsonFields::parse(
            br#" { "chat_id" : "42",
                  "wifi_ssid":"Home Net" ,"lora_region": 7 } "#,
        )
        .expect("parses");
        assert_eq!(fields.len(), 3);
        let ssid: String<32> = fields.required_str("wifi_ssid").expect("present");
        assert_eq!(ssid.as_str(), "Home Net");
        assert_eq!(fields.int_or("lora_region", 3), 7);
        assert_eq!(fields.int_or("lora_preset", 0), 0);
    }

    #[test]
    fn quoted_and_bare_integers() {
        let fields =
            JsonFields::parse(br#"{"a":"5","b":6,"c":" 8 ","d":"x","e":null,"f":1.5}"#)
                .expect("parses");
        assert_eq!(fields.int_or("a", 0), 5);
        assert_eq!(fields.int_or("b", 0), 6);
        assert_eq!(fields.int_or("c", 0), 8);
        assert_eq!(fields.int_or("d", -1), -1);
        assert_eq!(fields.int_or("e", -1), -1);
        assert_eq!(fields.int_or("f", -1), -1);
    }

    #[test]
    fn last_duplicate_wins() {
        let fields = JsonFields::parse(br#"{"k":"first","k":"second"}"#).expect("parses");
        let value: String<16> = fields.required_str("k").expect("present");
        assert_eq!(value.as_str(), "second");
    }

    #[test]
    fn decodes_escapes() {
        let fields = JsonFields::parse(br#"{"k":"a\"b\\c\/d\n\u00e9\ud83d\ude00"}"#)
            .expect("parses");
        let value: String<32> = fields.required_str("k").expect("present");
        assert_eq!(value.as_str(), "a\"b\\c/d\n\u{e9}\u{1F600}");
    }

    #[test]
    fn unpaired_surrogate_is_malformed() {
        let fields = JsonFields::parse(br#"{"k":"\ud83d"}"#).expect("parses");
        assert_eq!(
            fields.optional_str::<16>("k"),
            Err(FieldError::MalformedPayload)
        );
    }

    #[test]
    fn empty_and_blank_required_fields_are_missing() {
        let fields = JsonFields::parse(br#"{"a":"","b":"   ","c":null}"#).expect("parses");
        for key in ["a", "b", "c", "d"] {
            assert_eq!(
                fields.required_str::<8>(key),
                Err(FieldError::MissingRequiredField(key))
            );
        }
    }

    #[test]
    fn overlong_value_names_the_field() {
        let fields = JsonFields::parse(br#"{"k":"abcdefghi"}"#).expect("parses");
        assert_eq!(
            fields.required_str::<4>("k"),
            Err(FieldError::FieldTooLong("k"))
        );
    }

    #[test]
    fn nested_values_are_skipped_but_not_strings() {
        let fields =
            JsonFields::parse(br#"{"n":{"x":[1,"}"]},"k":"v"}"#).expect("parses");
        assert_eq!(
            fields.optional_str::<8>("n"),
            Err(FieldError::InvalidString("n"))
        );
        let value: String<8> = fields.required_str("k").expect("present");
        assert_eq!(value.as_str(), "v");
    }

    #[test]
    fn rejects_malformed_payloads() {
        for payload in [
            &b""[..],
            &b"[]"[..],
            &b"{"[..],
            &br#"{"k" "v"}"#[..],
            &br#"{"k":"v",}"#[..],
            &br#"{"k":"v"} trailing"#[..],
            &br#"{"k":"unterminated}"#[..],
            &[b'{', 0xFF, b'}'][..],
        ] {
            assert_eq!(
                JsonFields::parse(payload).err(),
                Some(FieldError::MalformedPayload),
                "payload {payload:?}"
            );
        }
    }

    #[test]
    fn empty_object_has_no_fields() {
        let fields = JsonFields::parse(b" {} ").expect("parses");
        assert!(fields.is_empty());
        assert_eq!(fields.optional_str::<8>("k"), Ok(None));
    }

    #[test]
    fn pair_slice_is_a_field_map() {
        let pairs: &[(&str, &str)] = &[
            ("wifi_ssid", "A"),
            ("lora_region", "9"),
            ("wifi_ssid", "B"),
        ];
        let ssid: String<8> = pairs.required_str("wifi_ssid").expect("present");
        assert_eq!(ssid.as_str(), "B");
        assert_eq!(pairs.int_or("lora_region", 3), 9);
    }
}
