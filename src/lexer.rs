use std::{iter::Peekable, str::CharIndices};

use crate::token::{Span, Token, TokenKind};

pub use self::error::{LexError, LexResult};

mod error;

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    indent_stack: Vec<usize>,
    pending_tokens: Vec<Token<'a>>,
    at_line_start: bool,
    line_has_tokens: bool,
    paren_depth: usize,
    eof_reached: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            indent_stack: vec![0],
            pending_tokens: Vec::new(),
            at_line_start: true,
            line_has_tokens: false,
            paren_depth: 0,
            eof_reached: false,
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        loop {
            if let Some(token) = self.scan_token()? {
                return Ok(token);
            }
        }
    }

    /// Produces the next token, or `None` after consuming a blank or
    /// comment-only line.
    fn scan_token(&mut self) -> LexResult<Option<Token<'a>>> {
        if let Some(token) = self.pending_tokens.pop() {
            return Ok(Some(token));
        }

        if self.eof_reached {
            return Ok(Some(Token::new(TokenKind::EOF, self.empty_span())));
        }

        if self.at_line_start {
            self.at_line_start = false;
            if let Some(token) = self.handle_indentation()? {
                return Ok(Some(token));
            }
        }

        self.skip_insignificant();

        let Some(&(start_idx, ch)) = self.chars.peek() else {
            return Ok(Some(self.finish()));
        };

        let start_line = self.line;
        let start_column = self.column;
        let span = |end: usize| Span {
            start: start_idx,
            end,
            line: start_line,
            column: start_column,
        };

        let token = match ch {
            '\n' => {
                self.advance_char();
                self.at_line_start = true;
                if !self.line_has_tokens {
                    return Ok(None);
                }
                self.line_has_tokens = false;
                return Ok(Some(Token::new(TokenKind::Newline, span(start_idx + 1))));
            }
            '=' | '!' | '<' | '>' => {
                self.advance_char();
                let followed_by_equal = matches!(self.chars.peek(), Some(&(_, '=')));
                if followed_by_equal {
                    self.advance_char();
                }
                let kind = match (ch, followed_by_equal) {
                    ('=', false) => TokenKind::Equal,
                    ('=', true) => TokenKind::EqualEqual,
                    ('!', true) => TokenKind::NotEqual,
                    ('<', false) => TokenKind::Less,
                    ('<', true) => TokenKind::LessEqual,
                    ('>', false) => TokenKind::Greater,
                    ('>', true) => TokenKind::GreaterEqual,
                    _ => {
                        return Err(LexError::UnexpectedCharacter {
                            character: ch,
                            line: start_line,
                            column: start_column,
                        });
                    }
                };
                let width = if followed_by_equal { 2 } else { 1 };
                Token::new(kind, span(start_idx + width))
            }
            '+' | '-' | '*' | ':' | ',' | '.' | '(' | ')' | '[' | ']' => {
                self.advance_char();
                let kind = match ch {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    ':' => TokenKind::Colon,
                    ',' => TokenKind::Comma,
                    '.' => TokenKind::Dot,
                    '(' | '[' => {
                        self.paren_depth += 1;
                        if ch == '(' {
                            TokenKind::LParen
                        } else {
                            TokenKind::LBracket
                        }
                    }
                    _ => {
                        self.paren_depth = self.paren_depth.saturating_sub(1);
                        if ch == ')' {
                            TokenKind::RParen
                        } else {
                            TokenKind::RBracket
                        }
                    }
                };
                Token::new(kind, span(start_idx + 1))
            }
            '"' | '\'' => self.read_string(ch, start_idx, start_line, start_column)?,
            c if c.is_alphabetic() || c == '_' => {
                self.read_identifier(start_idx, start_line, start_column)
            }
            c if c.is_ascii_digit() => self.read_integer(start_idx, start_line, start_column)?,
            _ => {
                return Err(LexError::UnexpectedCharacter {
                    character: ch,
                    line: start_line,
                    column: start_column,
                });
            }
        };

        self.line_has_tokens = true;
        Ok(Some(token))
    }

    /// Compares the indentation of a fresh logical line against the stack and
    /// queues the matching `Indent` or `Dedent` tokens.
    fn handle_indentation(&mut self) -> LexResult<Option<Token<'a>>> {
        let Some(indent_level) = self.count_indentation()? else {
            return Ok(None);
        };
        let current_indent = self.current_indent();
        let span = self.empty_span();

        if indent_level > current_indent {
            self.indent_stack.push(indent_level);
            return Ok(Some(Token::new(TokenKind::Indent, span)));
        }

        while self.current_indent() > indent_level {
            self.indent_stack.pop();
            self.pending_tokens.push(Token::new(TokenKind::Dedent, span));
        }
        if self.current_indent() != indent_level {
            return Err(LexError::InvalidDedent {
                indent_level,
                line: self.line,
                column: self.column,
            });
        }
        Ok(self.pending_tokens.pop())
    }

    /// Consumes leading spaces and returns their count, or `None` for lines
    /// that carry no tokens (blank, comment-only, trailing) and therefore must
    /// not open or close blocks.
    fn count_indentation(&mut self) -> LexResult<Option<usize>> {
        let mut lookahead = self.chars.clone();
        let mut count = 0;
        let mut column = self.column;

        loop {
            match lookahead.peek() {
                Some(&(_, ' ')) => {
                    lookahead.next();
                    count += 1;
                    column += 1;
                }
                Some(&(_, '\t')) => {
                    return Err(LexError::TabIndentation {
                        line: self.line,
                        column,
                    });
                }
                Some(&(_, '\r' | '\n' | '#')) | None => return Ok(None),
                Some(_) => break,
            }
        }

        for _ in 0..count {
            self.advance_char();
        }
        Ok(Some(count))
    }

    /// Skips spaces, comments, and (inside brackets) line breaks.
    fn skip_insignificant(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                ' ' | '\r' => {
                    self.advance_char();
                }
                '\n' if self.paren_depth > 0 => {
                    self.advance_char();
                }
                '#' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance_char();
                    }
                }
                _ => break,
            }
        }
    }

    /// Terminates the stream: a closing `Newline` for an unterminated last
    /// line, one `Dedent` per open block, then `EOF`.
    fn finish(&mut self) -> Token<'a> {
        self.eof_reached = true;
        let span = self.empty_span();
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending_tokens.push(Token::new(TokenKind::Dedent, span));
        }
        if self.line_has_tokens {
            self.line_has_tokens = false;
            return Token::new(TokenKind::Newline, span);
        }
        self.pending_tokens
            .pop()
            .unwrap_or_else(|| Token::new(TokenKind::EOF, span))
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = match ident {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "not" => TokenKind::Not,
            "is" => TokenKind::Is,
            "while" => TokenKind::While,
            "def" => TokenKind::Def,
            "return" => TokenKind::Return,
            "pass" => TokenKind::Pass,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            _ => TokenKind::Identifier(ident),
        };
        Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_integer(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.advance_char(); // Consume first digit
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                line,
                column,
            })?;
        Ok(Token::new(
            TokenKind::Integer(value),
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn read_string(
        &mut self,
        quote: char,
        start: usize,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        self.advance_char(); // Consume opening quote
        let content_start = start + quote.len_utf8();
        while let Some(&(idx, c)) = self.chars.peek() {
            if c == quote {
                self.advance_char(); // Consume closing quote
                return Ok(Token::new(
                    TokenKind::String(&self.input[content_start..idx]),
                    Span {
                        start,
                        end: idx + 1,
                        line,
                        column,
                    },
                ));
            }
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
        Err(LexError::UnterminatedString { line, column })
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn empty_span(&mut self) -> Span {
        let index = self.current_index();
        Span {
            start: index,
            end: index,
            line: self.line,
            column: self.column,
        }
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            for i in range(3):
                if i >= 1:
                    print(i)
            x = 5
        "};
        let expected_tokens = vec![
            TokenKind::For,
            TokenKind::Identifier("i"),
            TokenKind::In,
            TokenKind::Identifier("range"),
            TokenKind::LParen,
            TokenKind::Integer(3),
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::If,
            TokenKind::Identifier("i"),
            TokenKind::GreaterEqual,
            TokenKind::Integer(1),
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Identifier("print"),
            TokenKind::LParen,
            TokenKind::Identifier("i"),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Dedent,
            TokenKind::Identifier("x"),
            TokenKind::Equal,
            TokenKind::Integer(5),
            TokenKind::Newline,
            TokenKind::EOF,
        ];

        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn lexes_two_character_operators() {
        assert_eq!(
            kinds("a == b != c <= d\n"),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::EqualEqual,
                TokenKind::Identifier("b"),
                TokenKind::NotEqual,
                TokenKind::Identifier("c"),
                TokenKind::LessEqual,
                TokenKind::Identifier("d"),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn blank_and_comment_lines_do_not_change_indentation() {
        let input = indoc! {"
            if x:
                # comment

                y = 1
        "};
        let kinds = kinds(input);
        let indents = kinds
            .iter()
            .filter(|kind| matches!(kind, TokenKind::Indent))
            .count();
        let dedents = kinds
            .iter()
            .filter(|kind| matches!(kind, TokenKind::Dedent))
            .count();
        assert_eq!((indents, dedents), (1, 1));
    }

    #[test]
    fn closes_last_line_and_open_blocks_at_eof() {
        assert_eq!(
            kinds("if x:\n    y = 1"),
            vec![
                TokenKind::If,
                TokenKind::Identifier("x"),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Identifier("y"),
                TokenKind::Equal,
                TokenKind::Integer(1),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn newlines_inside_parentheses_are_joined() {
        assert_eq!(
            kinds("print(1,\n      2)\n"),
            vec![
                TokenKind::Identifier("print"),
                TokenKind::LParen,
                TokenKind::Integer(1),
                TokenKind::Comma,
                TokenKind::Integer(2),
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn records_line_and_column() {
        let tokens = tokenize("x = 1\nif x:\n    y = 2\n").expect("tokenize");
        let y = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Identifier("y"))
            .expect("y token");
        assert_eq!((y.span.line, y.span.column), (3, 4));
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("x = 1 @ 2\n").expect_err("expected lexing failure");
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                line: 1,
                column: 6,
            }
        );
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("n = 99999999999999999999999999\n").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid integer literal"));
    }

    #[test]
    fn errors_on_tab_indentation() {
        let err = tokenize("if x:\n\ty = 1\n").expect_err("expected tab failure");
        assert!(matches!(err, LexError::TabIndentation { line: 2, .. }));
    }

    #[test]
    fn errors_on_inconsistent_dedent() {
        let err = tokenize("if x:\n    y = 1\n  z = 2\n").expect_err("expected dedent failure");
        assert!(matches!(
            err,
            LexError::InvalidDedent {
                indent_level: 2,
                ..
            }
        ));
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("print(\"abc\n").expect_err("expected string failure");
        assert_eq!(err, LexError::UnterminatedString { line: 1, column: 6 });
    }

    #[test]
    fn long_runs_of_blank_and_comment_lines() {
        let mut input = "\n".repeat(100_000);
        input.push_str(&"# comment\n".repeat(100_000));
        input.push_str("x = 5\n");
        assert_eq!(
            kinds(&input),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::Integer(5),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn crlf_blank_lines_keep_the_block_open() {
        assert_eq!(
            kinds("if x > 0:\r\n    y = 1\r\n\r\n    y = 2\r\n"),
            vec![
                TokenKind::If,
                TokenKind::Identifier("x"),
                TokenKind::Greater,
                TokenKind::Integer(0),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Identifier("y"),
                TokenKind::Equal,
                TokenKind::Integer(1),
                TokenKind::Newline,
                TokenKind::Identifier("y"),
                TokenKind::Equal,
                TokenKind::Integer(2),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::EOF,
            ]
        );
    }
}
