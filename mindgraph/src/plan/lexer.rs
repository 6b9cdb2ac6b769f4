//! Tokenizer for plan text.
//!
//! Statements end at a newline or `;`. Newlines inside brackets, `\`-continued lines
//! and `#` comments are skipped. Strings use single, double or triple quotes with the
//! usual backslash escapes; string prefixes (`f`, `r`, `b`, `u`) are refused.

use super::PlanError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    /// `[` or `{`.
    Open(char),
    /// `]` or `}`.
    Close(char),
    Comma,
    Dot,
    Colon,
    Assign,
    /// Any other operator (`==`, `+`, `**`, ...).
    Op(String),
    /// End of statement (newline or `;`).
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

const OPERATOR_CHARS: &str = "+-*/%<>!&|^~@=";

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, PlanError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut depth: usize = 0;
    let mut line = 1;
    let mut i = 0;

    let push = |tokens: &mut Vec<Token>, kind: TokenKind, line: usize| {
        if kind == TokenKind::End
            && matches!(tokens.last(), None | Some(Token { kind: TokenKind::End, .. }))
        {
            return;
        }
        tokens.push(Token { kind, line });
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                if depth == 0 {
                    push(&mut tokens, TokenKind::End, line);
                }
                line += 1;
                i += 1;
            }
            ';' => {
                if depth > 0 {
                    return Err(PlanError::syntax(format!("unexpected ';' on line {}", line)));
                }
                push(&mut tokens, TokenKind::End, line);
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                line += 1;
                i += 2;
            }
            c if c.is_whitespace() => i += 1,
            '\'' | '"' => {
                let (value, next, lines) = read_string(&chars, i, line)?;
                push(&mut tokens, TokenKind::Str(value), line);
                line += lines;
                i = next;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value = digits.parse::<i64>().map_err(|_| {
                    PlanError::syntax(format!("integer too large on line {}", line))
                })?;
                push(&mut tokens, TokenKind::Int(value), line);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if matches!(chars.get(i), Some('\'') | Some('"')) && is_string_prefix(&word) {
                    return Err(PlanError::syntax(format!(
                        "string prefix '{}' is not allowed on line {}",
                        word, line
                    )));
                }
                push(&mut tokens, TokenKind::Ident(word), line);
            }
            '(' => {
                depth += 1;
                push(&mut tokens, TokenKind::LParen, line);
                i += 1;
            }
            '[' | '{' => {
                depth += 1;
                push(&mut tokens, TokenKind::Open(c), line);
                i += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    PlanError::syntax(format!("unmatched '{}' on line {}", c, line))
                })?;
                let kind = if c == ')' {
                    TokenKind::RParen
                } else {
                    TokenKind::Close(c)
                };
                push(&mut tokens, kind, line);
                i += 1;
            }
            ',' => {
                push(&mut tokens, TokenKind::Comma, line);
                i += 1;
            }
            '.' => {
                push(&mut tokens, TokenKind::Dot, line);
                i += 1;
            }
            ':' => {
                push(&mut tokens, TokenKind::Colon, line);
                i += 1;
            }
            c if OPERATOR_CHARS.contains(c) => {
                let start = i;
                while i < chars.len() && OPERATOR_CHARS.contains(chars[i]) {
                    i += 1;
                }
                let op: String = chars[start..i].iter().collect();
                let kind = if op == "=" {
                    TokenKind::Assign
                } else {
                    TokenKind::Op(op)
                };
                push(&mut tokens, kind, line);
            }
            other => {
                return Err(PlanError::syntax(format!(
                    "unexpected character {:?} on line {}",
                    other, line
                )));
            }
        }
    }

    if depth > 0 {
        return Err(PlanError::syntax("unexpected end of plan: unclosed bracket"));
    }
    push(&mut tokens, TokenKind::End, line);
    Ok(tokens)
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "f" | "r" | "b" | "u" | "rb" | "br" | "fr" | "rf"
    )
}

/// Reads a quoted string starting at `start`; returns (value, next index, newlines consumed).
fn read_string(
    chars: &[char],
    start: usize,
    line: usize,
) -> Result<(String, usize, usize), PlanError> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };
    let mut value = String::new();
    let mut lines = 0;

    loop {
        let Some(&c) = chars.get(i) else {
            return Err(PlanError::syntax(format!(
                "unterminated string starting on line {}",
                line
            )));
        };
        if c == quote {
            if !triple {
                return Ok((value, i + 1, lines));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((value, i + 3, lines));
            }
        }
        match c {
            '\n' if !triple => {
                return Err(PlanError::syntax(format!(
                    "unterminated string starting on line {}",
                    line
                )));
            }
            '\\' => {
                let Some(&escaped) = chars.get(i + 1) else {
                    i += 1;
                    continue;
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    '\n' => lines += 1,
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                i += 2;
            }
            _ => {
                if c == '\n' {
                    lines += 1;
                }
                value.push(c);
                i += 1;
            }
        }
    }
}
