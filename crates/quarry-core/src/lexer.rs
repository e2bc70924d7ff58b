//! Placeholder-aware SQL scanner.
//!
//! This is not a SQL parser. It only knows enough about literals, quoted
//! identifiers and comments to tell a real `?` placeholder (or `;` statement
//! terminator) from one that is just text.

use crate::error::{LiteralKind, TokenizeError};

/// A piece of scanned SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    /// Ordinary text, including literals and comments.
    Text,
    /// A positional `?` placeholder.
    Placeholder,
    /// A `;` outside of any literal.
    Terminator,
}

/// How a dialect treats backslashes inside string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEscapes {
    /// A backslash is an ordinary character; only a doubled quote escapes.
    /// PostgreSQL standard strings and SQLite. PostgreSQL `E'...'` strings
    /// still honour backslashes.
    #[default]
    Standard,
    /// A backslash escapes the next character (MySQL).
    Backslash,
}

/// A scanner over raw SQL text.
struct Scanner<'a> {
    /// The input source.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    escapes: StringEscapes,
}

impl<'a> Scanner<'a> {
    const fn new(input: &'a str, escapes: StringEscapes) -> Self {
        Self {
            input,
            pos: 0,
            escapes,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Scans the next piece, returning its kind and byte range.
    fn next_piece(&mut self) -> Option<Result<(Piece, usize, usize), TokenizeError>> {
        let start = self.pos;
        let c = self.peek()?;

        let kind = match c {
            '?' => {
                self.advance();
                Piece::Placeholder
            }
            ';' => {
                self.advance();
                Piece::Terminator
            }
            _ => {
                if let Err(err) = self.scan_text() {
                    return Some(Err(err));
                }
                Piece::Text
            }
        };

        Some(Ok((kind, start, self.pos)))
    }

    /// Consumes text up to the next placeholder or terminator.
    fn scan_text(&mut self) -> Result<(), TokenizeError> {
        while let Some(c) = self.peek() {
            match c {
                '?' | ';' => break,
                '\'' => {
                    let backslash = self.escapes == StringEscapes::Backslash;
                    self.scan_quoted('\'', LiteralKind::String, backslash)?;
                }
                'e' | 'E' if self.peek_next() == Some('\'') && self.at_word_start() => {
                    self.advance();
                    self.scan_quoted('\'', LiteralKind::String, true)?;
                }
                '"' => {
                    // MySQL reads "..." as a string unless ANSI_QUOTES is set.
                    let backslash = self.escapes == StringEscapes::Backslash;
                    self.scan_quoted('"', LiteralKind::QuotedIdentifier, backslash)?;
                }
                '`' => self.scan_quoted('`', LiteralKind::QuotedIdentifier, false)?,
                '-' if self.peek_next() == Some('-') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => self.scan_block_comment()?,
                '$' if self.dollar_tag().is_some() => self.scan_dollar_quoted()?,
                _ => {
                    self.advance();
                }
            }
        }
        Ok(())
    }

    /// Returns true if the previous character cannot be part of a word, so an
    /// `E` here starts an escape string rather than ending an identifier.
    fn at_word_start(&self) -> bool {
        self.input[..self.pos]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '$'))
    }

    /// Scans a quoted run. A doubled quote is an escaped quote, and with
    /// `backslash` set a backslash escapes the next character.
    fn scan_quoted(
        &mut self,
        quote: char,
        kind: LiteralKind,
        backslash: bool,
    ) -> Result<(), TokenizeError> {
        let offset = self.pos;
        self.advance();
        loop {
            match self.advance() {
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.advance();
                    } else {
                        return Ok(());
                    }
                }
                Some('\\') if backslash => {
                    self.advance();
                }
                Some(_) => {}
                None => return Err(TokenizeError { kind, offset }),
            }
        }
    }

    fn scan_block_comment(&mut self) -> Result<(), TokenizeError> {
        let offset = self.pos;
        self.advance();
        self.advance();
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    return Err(TokenizeError {
                        kind: LiteralKind::BlockComment,
                        offset,
                    });
                }
            }
        }
    }

    /// Returns the `$tag$` opener at the current position, if any.
    ///
    /// `$1` style positional parameters are not dollar quotes.
    fn dollar_tag(&self) -> Option<&'a str> {
        let rest = &self.input[self.pos..];
        let body = rest.strip_prefix('$')?;
        let end = body.find('$')?;
        let tag = &body[..end];
        let valid = tag
            .chars()
            .next()
            .is_none_or(|first| first.is_ascii_alphabetic() || first == '_')
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then(|| &rest[..end + 2])
    }

    fn scan_dollar_quoted(&mut self) -> Result<(), TokenizeError> {
        let offset = self.pos;
        let Some(delimiter) = self.dollar_tag() else {
            return Ok(());
        };
        self.pos += delimiter.len();
        match self.input[self.pos..].find(delimiter) {
            Some(close) => {
                self.pos += close + delimiter.len();
                Ok(())
            }
            None => Err(TokenizeError {
                kind: LiteralKind::DollarQuoted,
                offset,
            }),
        }
    }
}

/// Splits SQL into the text segments between positional placeholders.
///
/// The result always has one more element than there are placeholders.
///
/// # Errors
///
/// Returns a [`TokenizeError`] when a literal, quoted identifier or block
/// comment is not terminated.
pub fn split_placeholders(
    sql: &str,
    escapes: StringEscapes,
) -> Result<Vec<String>, TokenizeError> {
    let mut scanner = Scanner::new(sql, escapes);
    let mut parts = vec![String::new()];

    while let Some(piece) = scanner.next_piece() {
        let (kind, start, end) = piece?;
        match kind {
            Piece::Placeholder => parts.push(String::new()),
            Piece::Text | Piece::Terminator => {
                if let Some(last) = parts.last_mut() {
                    last.push_str(&sql[start..end]);
                }
            }
        }
    }

    Ok(parts)
}

/// Splits a script into individual statements on `;` outside of literals.
///
/// Statements are trimmed; empty statements are dropped.
///
/// # Errors
///
/// Returns a [`TokenizeError`] when a literal, quoted identifier or block
/// comment is not terminated.
pub fn split_statements(sql: &str, escapes: StringEscapes) -> Result<Vec<String>, TokenizeError> {
    let mut scanner = Scanner::new(sql, escapes);
    let mut statements = Vec::new();
    let mut current = String::new();

    while let Some(piece) = scanner.next_piece() {
        let (kind, start, end) = piece?;
        match kind {
            Piece::Terminator => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            Piece::Text | Piece::Placeholder => current.push_str(&sql[start..end]),
        }
    }
    push_statement(&mut statements, &current);

    Ok(statements)
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !is_blank(trimmed) {
        statements.push(trimmed.to_string());
    }
}

/// Returns true if the text is only whitespace and `--` comments.
fn is_blank(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_placeholders() {
        let parts = split_placeholders("a = ? and b = ?", StringEscapes::Standard).unwrap();
        assert_eq!(parts, vec!["a = ", " and b = ", ""]);
    }

    #[test]
    fn test_no_placeholders_is_single_part() {
        let parts = split_placeholders("CURRENT_TIMESTAMP", StringEscapes::Standard).unwrap();
        assert_eq!(parts, vec!["CURRENT_TIMESTAMP"]);
    }

    #[test]
    fn test_question_mark_in_string_is_text() {
        let parts = split_placeholders("note = 'why?' and id = ?", StringEscapes::Standard).unwrap();
        assert_eq!(parts, vec!["note = 'why?' and id = ", ""]);
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let parts = split_placeholders("name = 'it''s ?' or x = ?", StringEscapes::Standard).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "name = 'it''s ?' or x = ");
    }

    #[test]
    fn test_question_mark_in_identifier_and_comments() {
        let sql = "select \"what?\", `huh?` -- really?\n from t /* ? */ where a = ?";
        let parts = split_placeholders(sql, StringEscapes::Standard).unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_dollar_quoted_body() {
        let sql = "select $body$ ? ; $body$, $1 where x = ?";
        let parts = split_placeholders(sql, StringEscapes::Standard).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("$body$ ? ; $body$"));
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = split_placeholders("a = 'oops ?", StringEscapes::Standard).unwrap_err();
        assert_eq!(err.kind, LiteralKind::String);
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_unterminated_comment_fails() {
        let err = split_placeholders("a /* ?", StringEscapes::Standard).unwrap_err();
        assert_eq!(err.kind, LiteralKind::BlockComment);
    }

    #[test]
    fn test_split_statements() {
        let script = "create table a (x text default ';');\n\n-- trailing\ninsert into a values ('b');\n";
        let statements = split_statements(script, StringEscapes::Standard).unwrap();
        assert_eq!(
            statements,
            vec![
                "create table a (x text default ';')",
                "-- trailing\ninsert into a values ('b')",
            ]
        );
    }

    #[test]
    fn test_split_statements_drops_comment_only_tail() {
        let statements = split_statements("select 1;\n-- done\n", StringEscapes::Standard).unwrap();
        assert_eq!(statements, vec!["select 1"]);
    }

    #[test]
    fn test_backslash_is_literal_in_standard_strings() {
        let script = "insert into paths (p) values ('C:\\'); insert into paths (p) values ('D:');";
        let statements = split_statements(script, StringEscapes::Standard).unwrap();
        assert_eq!(
            statements,
            vec![
                "insert into paths (p) values ('C:\\')",
                "insert into paths (p) values ('D:')",
            ]
        );

        let parts = split_placeholders("path = 'C:\\' or id = ?", StringEscapes::Standard).unwrap();
        assert_eq!(parts, vec!["path = 'C:\\' or id = ", ""]);
    }

    #[test]
    fn test_backslash_escapes_quote_in_mysql_strings() {
        let parts = split_placeholders("name = 'it\\'s ?' or x = ?", StringEscapes::Backslash).unwrap();
        assert_eq!(parts, vec!["name = 'it\\'s ?' or x = ", ""]);

        let parts = split_placeholders("note = \"say \\\"?\\\"\" and id = ?", StringEscapes::Backslash)
            .unwrap();
        assert_eq!(parts.len(), 2);

        // Where backslashes are literal the quotes pair up differently.
        assert!(split_placeholders("name = 'it\\'s' or x = ?", StringEscapes::Standard).is_err());
    }

    #[test]
    fn test_escape_string_prefix() {
        let parts = split_placeholders("a = E'it\\'s ?' and b = ?", StringEscapes::Standard).unwrap();
        assert_eq!(parts, vec!["a = E'it\\'s ?' and b = ", ""]);

        // A trailing `e` of an identifier is not an escape prefix.
        let parts = split_placeholders("where type='C:\\' and id = ?", StringEscapes::Standard).unwrap();
        assert_eq!(parts.len(), 2);
    }
}
