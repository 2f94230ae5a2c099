//! A parser for Python-style literals (the subset `ast.literal_eval` accepts),
//! producing JSON values.
//!
//! Model output is untrusted, so nothing here evaluates anything: names other
//! than `True`, `False` and `None`, calls, operators and f-strings are all
//! rejected. Tuples and sets become JSON arrays. Dict keys that are not
//! strings are rendered to their JSON text.

use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 64;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

// ── Public API ───────────────────────────────────────────────────────────────

pub fn parse_literal(src: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser { src, pos: 0 };
    let value = parser.parse_value(0)?;
    parser.skip_ws();
    if parser.pos != src.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

// ── Recursive descent ────────────────────────────────────────────────────────

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset,
            message: message.into(),
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LiteralError> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    /// Whitespace, `#` comments and backslash line continuations.
    fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0c') => self.pos += 1,
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => self.pos += 2,
                Some(b'\\') if self.peek_at(1) == Some(b'\r') && self.peek_at(2) == Some(b'\n') => {
                    self.pos += 3
                }
                _ => break,
            }
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("literal is nested too deeply"));
        }
        self.skip_ws();

        if let Some((prefix_len, raw)) = self.string_start() {
            self.pos += prefix_len;
            return self.parse_strings(raw).map(Value::String);
        }

        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'[') => {
                self.pos += 1;
                self.parse_sequence(b']', depth).map(Value::Array)
            }
            Some(b'(') => {
                self.pos += 1;
                self.parse_paren(depth)
            }
            Some(b'{') => {
                self.pos += 1;
                self.parse_brace(depth)
            }
            Some(sign @ (b'+' | b'-')) => {
                self.pos += 1;
                self.skip_ws();
                if !self.at_number() {
                    return Err(self.error("a sign may only precede a number"));
                }
                self.parse_number(sign == b'-')
            }
            Some(_) if self.at_number() => self.parse_number(false),
            Some(_) => self.parse_name(),
        }
    }

    // ── Names ────────────────────────────────────────────────────────────────

    fn parse_name(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let first = self.rest().chars().next();
        if !matches!(first, Some(c) if c.is_alphabetic() || c == '_') {
            return Err(self.error("unexpected character"));
        }
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let name = &self.src[start..start + len];
        self.pos += len;

        match name {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ if matches!(self.peek(), Some(b'\'' | b'"')) => Err(
                self.error_at(start, format!("string prefix '{name}' is not supported")),
            ),
            _ => Err(self.error_at(start, format!("name '{name}' is not a literal"))),
        }
    }

    // ── Containers ───────────────────────────────────────────────────────────

    /// Items up to and including `close`; the opening bracket is already consumed.
    fn parse_sequence(&mut self, close: u8, depth: usize) -> Result<Vec<Value>, LiteralError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.parse_value(depth + 1)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                _ => return Err(self.error(format!("expected ',' or '{}'", close as char))),
            }
        }
    }

    /// `()` and `(a, b)` are tuples; `(a)` is just `a`.
    fn parse_paren(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.skip_ws();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(Value::Array(Vec::new()));
        }
        let first = self.parse_value(depth + 1)?;
        self.skip_ws();
        match self.peek() {
            Some(b')') => {
                self.pos += 1;
                Ok(first)
            }
            Some(b',') => {
                self.pos += 1;
                let mut items = vec![first];
                items.extend(self.parse_sequence(b')', depth)?);
                Ok(Value::Array(items))
            }
            _ => Err(self.error("expected ',' or ')'")),
        }
    }

    /// `{}` is an empty dict, `{k: v, ...}` a dict and `{a, b}` a set.
    fn parse_brace(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Object(Map::new()));
        }

        let mut key_offset = self.pos;
        let first = self.parse_value(depth + 1)?;
        self.skip_ws();

        match self.peek() {
            Some(b':') => {}
            Some(b'}') => {
                self.pos += 1;
                return Ok(Value::Array(vec![first]));
            }
            Some(b',') => {
                self.pos += 1;
                let mut items = vec![first];
                for item in self.parse_sequence(b'}', depth)? {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                return Ok(Value::Array(items));
            }
            _ => return Err(self.error("expected ':', ',' or '}'")),
        }

        let mut map = Map::new();
        let mut key = first;
        loop {
            self.expect(b':')?;
            let value = self.parse_value(depth + 1)?;
            map.insert(self.key_text(key, key_offset)?, value);

            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some(b'}') {
                        self.pos += 1;
                        return Ok(Value::Object(map));
                    }
                    key_offset = self.pos;
                    key = self.parse_value(depth + 1)?;
                }
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn key_text(&self, key: Value, offset: usize) -> Result<String, LiteralError> {
        match key {
            Value::String(s) => Ok(s),
            Value::Array(_) | Value::Object(_) => {
                Err(self.error_at(offset, "dict keys must be strings, numbers or booleans"))
            }
            scalar => Ok(scalar.to_string()),
        }
    }

    // ── Numbers ──────────────────────────────────────────────────────────────

    fn at_number(&self) -> bool {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => true,
            Some(b'.') => matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()),
            _ => false,
        }
    }

    /// Digits valid in `radix`, with single `_` separators between them removed.
    fn scan_digits(&mut self, radix: u32) -> String {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if (c as char).is_digit(radix) {
                digits.push(c as char);
                self.pos += 1;
            } else if c == b'_' && matches!(self.peek_at(1), Some(n) if (n as char).is_digit(radix)) {
                self.pos += 1;
            } else {
                break;
            }
        }
        digits
    }

    fn parse_number(&mut self, negative: bool) -> Result<Value, LiteralError> {
        let start = self.pos;

        let radix = match (self.peek(), self.peek_at(1)) {
            (Some(b'0'), Some(b'x' | b'X')) => Some(16),
            (Some(b'0'), Some(b'o' | b'O')) => Some(8),
            (Some(b'0'), Some(b'b' | b'B')) => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            self.pos += 2;
            let digits = self.scan_digits(radix);
            if digits.is_empty() {
                return Err(self.error_at(start, "invalid integer literal"));
            }
            self.reject_suffix(start)?;
            return match i128::from_str_radix(&digits, radix) {
                Ok(magnitude) => self.integer(if negative { -magnitude } else { magnitude }, start),
                Err(_) => {
                    // Same policy as oversized decimals: fall back to a float.
                    let magnitude = digits.chars().fold(0.0_f64, |acc, d| {
                        acc * f64::from(radix) + f64::from(d.to_digit(radix).unwrap_or(0))
                    });
                    self.float(if negative { -magnitude } else { magnitude }, start)
                }
            };
        }

        let mut text = self.scan_digits(10);
        let mut is_float = false;

        if self.peek() == Some(b'.') {
            self.pos += 1;
            is_float = true;
            text.push('.');
            text.push_str(&self.scan_digits(10));
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            let exp_start = self.pos;
            self.pos += 1;
            text.push('e');
            if let Some(sign @ (b'+' | b'-')) = self.peek() {
                text.push(sign as char);
                self.pos += 1;
            }
            let exponent = self.scan_digits(10);
            if exponent.is_empty() {
                return Err(self.error_at(exp_start, "invalid exponent"));
            }
            text.push_str(&exponent);
            is_float = true;
        }

        self.reject_suffix(start)?;

        if !is_float {
            if let Ok(magnitude) = text.parse::<i128>() {
                return self.integer(if negative { -magnitude } else { magnitude }, start);
            }
        }

        let float: f64 = text
            .parse()
            .map_err(|_| self.error_at(start, "invalid number literal"))?;
        self.float(if negative { -float } else { float }, start)
    }

    fn reject_suffix(&self, start: usize) -> Result<(), LiteralError> {
        match self.rest().chars().next() {
            Some('j' | 'J') => Err(self.error_at(start, "complex numbers are not supported")),
            Some(c) if c.is_alphanumeric() || c == '_' => {
                Err(self.error_at(start, "invalid number literal"))
            }
            _ => Ok(()),
        }
    }

    fn integer(&self, value: i128, start: usize) -> Result<Value, LiteralError> {
        if let Ok(v) = i64::try_from(value) {
            Ok(Value::from(v))
        } else if let Ok(v) = u64::try_from(value) {
            Ok(Value::from(v))
        } else {
            self.float(value as f64, start)
        }
    }

    fn float(&self, value: f64, start: usize) -> Result<Value, LiteralError> {
        Number::from_f64(value)
            .map(Value::Number)
            .ok_or_else(|| self.error_at(start, "number is out of range"))
    }

    // ── Strings ──────────────────────────────────────────────────────────────

    /// Length of an `r`/`u` prefix and whether the string is raw, when a
    /// string literal starts here.
    fn string_start(&self) -> Option<(usize, bool)> {
        let mut chars = self.rest().chars();
        match chars.next()? {
            '\'' | '"' => Some((0, false)),
            p @ ('r' | 'R' | 'u' | 'U') if matches!(chars.next(), Some('\'' | '"')) => {
                Some((1, matches!(p, 'r' | 'R')))
            }
            _ => None,
        }
    }

    /// One string literal plus any adjacent ones, concatenated.
    fn parse_strings(&mut self, raw: bool) -> Result<String, LiteralError> {
        let mut out = self.parse_string(raw)?;
        loop {
            let before = self.pos;
            self.skip_ws();
            match self.string_start() {
                Some((prefix_len, raw)) => {
                    self.pos += prefix_len;
                    out.push_str(&self.parse_string(raw)?);
                }
                None => {
                    self.pos = before;
                    return Ok(out);
                }
            }
        }
    }

    fn parse_string(&mut self, raw: bool) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = match self.bump_char() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error_at(start, "expected a string")),
        };
        let closing_pair = if quote == '\'' { "''" } else { "\"\"" };
        let triple = self.rest().starts_with(closing_pair);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = self
                .bump_char()
                .ok_or_else(|| self.error_at(start, "unterminated string"))?;
            match c {
                c if c == quote => {
                    if !triple {
                        return Ok(out);
                    }
                    if self.rest().starts_with(closing_pair) {
                        self.pos += 2;
                        return Ok(out);
                    }
                    out.push(c);
                }
                '\n' if !triple => return Err(self.error_at(start, "unterminated string")),
                '\\' => {
                    let escape_start = self.pos - 1;
                    let esc = self
                        .bump_char()
                        .ok_or_else(|| self.error_at(start, "unterminated string"))?;
                    if raw {
                        out.push('\\');
                        out.push(esc);
                        continue;
                    }
                    self.push_escape(&mut out, esc, escape_start)?;
                }
                c => out.push(c),
            }
        }
    }

    fn push_escape(&mut self, out: &mut String, esc: char, offset: usize) -> Result<(), LiteralError> {
        match esc {
            '\n' => {}
            '\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            '\\' | '\'' | '"' => out.push(esc),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            code = code * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push(self.code_point(code, offset)?);
            }
            'x' => {
                let code = self.hex_digits(2, offset)?;
                out.push(self.code_point(code, offset)?);
            }
            'u' => {
                let code = self.hex_digits(4, offset)?;
                out.push(self.code_point(code, offset)?);
            }
            'U' => {
                let code = self.hex_digits(8, offset)?;
                out.push(self.code_point(code, offset)?);
            }
            'N' => return Err(self.error_at(offset, "named unicode escapes are not supported")),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize, offset: usize) -> Result<u32, LiteralError> {
        let digits = self
            .rest()
            .get(..count)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error_at(offset, "truncated hex escape"))?;
        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| self.error_at(offset, "truncated hex escape"))?;
        self.pos += count;
        Ok(code)
    }

    fn code_point(&self, code: u32, offset: usize) -> Result<char, LiteralError> {
        char::from_u32(code).ok_or_else(|| self.error_at(offset, "invalid unicode escape"))
    }
}
