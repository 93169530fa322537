//! Filter语言的词法分析器

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

/// 对输入进行分词，并丢弃空白 token
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input)
        .filter(|token| token.kind != TokenKind::Whitespace)
        .collect()
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// 读取连续的空白字符
    fn read_whitespace(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
        self.token(TokenKind::Whitespace, start)
    }

    /// 读取双引号包围的字符串字面量，保留引号
    /// 反斜杠会转义紧随其后的任意字符
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.bump() {
            match c {
                '"' => {
                    let raw = &self.input[start..self.position];
                    return self.token(TokenKind::String(raw), start);
                }
                '\\' => {
                    // 转义字符，输入末尾的反斜杠留给未闭合分支处理
                    self.bump();
                }
                _ => {}
            }
        }
        let raw = &self.input[start..self.position];
        self.token(TokenKind::UnterminatedString(raw), start)
    }

    /// 读取属性名或关键字
    /// 属性名以字母开头，可以包含字母、数字和下划线
    fn read_attribute(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        self.token(match_keyword(literal), start)
    }

    /// 读取双字符运算符，例如 "&&"、"||"、"!="
    fn read_pair(&mut self, first: char, second: char, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        if self.peek() == Some(second) {
            self.bump();
            self.token(kind, start)
        } else {
            self.token(TokenKind::Illegal(first), start)
        }
    }
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    if s.eq_ignore_ascii_case("and") {
        TokenKind::And
    } else if s.eq_ignore_ascii_case("or") {
        TokenKind::Or
    } else {
        TokenKind::Attribute(s)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // 到达输入末尾
        };

        let token = match c {
            '=' => self.token(TokenKind::Eq, start),
            '(' => self.token(TokenKind::LParen, start),
            ')' => self.token(TokenKind::RParen, start),
            ',' => self.token(TokenKind::Comma, start),
            '!' => self.read_pair('!', '=', TokenKind::NotEq, start),
            '&' => self.read_pair('&', '&', TokenKind::And, start),
            '|' => self.read_pair('|', '|', TokenKind::Or, start),
            '"' => self.read_string(start),
            c if c.is_whitespace() => self.read_whitespace(start),
            c if c.is_alphabetic() => self.read_attribute(start),
            c => self.token(TokenKind::Illegal(c), start),
        };
        Some(token)
    }
}
