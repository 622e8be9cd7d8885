//! Tokenizer for watcher expressions.

use super::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

/// A token plus the byte offset it starts at (for error messages).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Multi-character operators first so that the longest match wins.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "+", "-", "*", "/", "%", "<",
    ">", "!", "=", ".", ",", ";", ":", "?", "(", ")", "[", "]", "{", "}",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        // Comments
        if source[pos..].starts_with("//") {
            pos = source[pos..].find('\n').map(|i| pos + i).unwrap_or(bytes.len());
            continue;
        }
        if source[pos..].starts_with("/*") {
            match source[pos + 2..].find("*/") {
                Some(end) => pos = pos + 2 + end + 2,
                None => return Err(parse_error(pos, "unterminated comment")),
            }
            continue;
        }

        let start = pos;

        if c.is_ascii_digit()
            || (c == b'.' && bytes.get(pos + 1).is_some_and(|b| b.is_ascii_digit()))
        {
            pos = scan_number(bytes, pos);
            let text = &source[start..pos];
            let n: f64 = text
                .parse()
                .map_err(|_| parse_error(start, &format!("invalid number '{text}'")))?;
            tokens.push(Spanned { token: Token::Number(n), offset: start });
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (s, next) = scan_string(source, pos)?;
            pos = next;
            tokens.push(Spanned { token: Token::Str(s), offset: start });
            continue;
        }

        if is_ident_start(c) {
            while pos < bytes.len() && is_ident_continue(bytes[pos]) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(source[start..pos].to_string()),
                offset: start,
            });
            continue;
        }

        match PUNCTUATORS.iter().find(|p| source[pos..].starts_with(**p)) {
            Some(p) => {
                pos += p.len();
                tokens.push(Spanned { token: Token::Punct(p), offset: start });
            }
            None => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(parse_error(pos, &format!("unexpected character '{ch}'")));
            }
        }
    }

    Ok(tokens)
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut p = pos + 1;
        if p < bytes.len() && (bytes[p] == b'+' || bytes[p] == b'-') {
            p += 1;
        }
        if p < bytes.len() && bytes[p].is_ascii_digit() {
            while p < bytes.len() && bytes[p].is_ascii_digit() {
                p += 1;
            }
            pos = p;
        }
    }
    pos
}

/// Scan a quoted string starting at `start`; returns the unescaped text and
/// the offset just past the closing quote.
fn scan_string(source: &str, start: usize) -> Result<(String, usize), ScriptError> {
    let mut chars = source[start..].char_indices();
    let (_, quote) = chars.next().ok_or_else(|| parse_error(start, "expected string"))?;
    let mut out = String::new();

    while let Some((i, ch)) = chars.next() {
        if ch == quote {
            return Ok((out, start + i + ch.len_utf8()));
        }
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let (_, esc) = chars
            .next()
            .ok_or_else(|| parse_error(start, "unterminated string"))?;
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'u' => {
                let mut code = String::with_capacity(4);
                for _ in 0..4 {
                    let (_, h) = chars
                        .next()
                        .ok_or_else(|| parse_error(start, "truncated unicode escape"))?;
                    code.push(h);
                }
                let decoded = u32::from_str_radix(&code, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| parse_error(start, &format!("invalid unicode escape '{code}'")))?;
                out.push(decoded);
            }
            other => out.push(other),
        }
    }

    Err(parse_error(start, "unterminated string"))
}

fn parse_error(offset: usize, message: &str) -> ScriptError {
    ScriptError::Parse {
        offset,
        message: message.to_string(),
    }
}
