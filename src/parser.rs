//! Filter语言的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 收集词法错误 (非法字符 / 未闭合字符串)
//!   └─ parse_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_or_expression()
//!        │    │    ├─ parse_clause()
//!        │    │    │    ├─ "(" → 分组表达式 (递归调用parse_and_expression)
//!        │    │    │    ├─ 属性名 + 比较运算符 + 字符串 → 原子子句
//!        │    │    │    └─ 属性名 + "(" 字符串 "," 字符串 ")" → 键值子句
//!        │    │    │
//!        │    │    └─ 遇到OR时，继续解析右侧子句
//!        │    │
//!        │    └─ 遇到AND时，继续解析右侧OR表达式
//!        │
//!        └─ 期望输入结束 (多余的 ")" 等在这里报错)
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **子句** `name = "x"`, `variable("k", "v")`
//! 3. **OR操作** `clause OR clause`
//! 4. **AND操作** `or_expr AND or_expr`
//!
//! 与常见语言不同, OR 的优先级高于 AND:
//!
//! ```text
//! name = "a" OR name = "b" AND project_name = "c" OR project_name = "d"
//! // 等价于
//! (name = "a" OR name = "b") AND (project_name = "c" OR project_name = "d")
//! ```
//!
//! ## 错误处理
//!
//! 所有词法错误都会被收集, 再加上遇到的第一个语法错误, 一起返回。

use crate::ast::{AndExpression, Clause, CompOp, Expression, Identifier, OrExpression};
use crate::error::SyntaxError;
use crate::token::{Span, Token, TokenKind};

/// 括号嵌套的默认最大深度
pub const DEFAULT_MAX_DEPTH: usize = 64;

pub struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token<'a>],
    position: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` 应该来自 [`crate::lexer::tokenize`], 即已经去掉空白 token
    pub fn new(source: &'a str, tokens: &'a [Token<'a>]) -> Self {
        Self {
            source,
            tokens,
            position: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind, what: &str) -> Result<Span, SyntaxError> {
        if self.match_token(&expected) {
            let span = self.tokens[self.position].span;
            self.position += 1;
            Ok(span)
        } else {
            Err(self.unexpected(what))
        }
    }

    /// 期望一个字符串字面量, 返回原始文本 (包含引号)
    fn expect_string(&mut self) -> Result<(&'a str, Span), SyntaxError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::String(raw),
                span,
            }) => {
                self.position += 1;
                Ok((*raw, *span))
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    /// 针对当前位置构造 "期望 X" 错误
    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => self.lexical_error(token).unwrap_or_else(|| {
                SyntaxError::at(
                    self.source,
                    token.span,
                    format!("expected {}, found {}", expected, token.kind.describe()),
                )
            }),
            None => SyntaxError::at_end(
                self.source,
                format!("expected {}, but reached end of input", expected),
            ),
        }
    }

    fn lexical_error(&self, token: &Token<'a>) -> Option<SyntaxError> {
        let message = match &token.kind {
            TokenKind::Illegal(c) => format!("token recognition error at: '{}'", c),
            TokenKind::UnterminatedString(raw) => format!("unterminated string literal {}", raw),
            _ => return None,
        };
        Some(SyntaxError::at(self.source, token.span, message))
    }

    pub fn parse(&mut self) -> Result<Expression, Vec<SyntaxError>> {
        let mut errors: Vec<SyntaxError> = self
            .tokens
            .iter()
            .filter_map(|token| self.lexical_error(token))
            .collect();

        match self.parse_expression() {
            Ok(expression) if errors.is_empty() => Ok(expression),
            Ok(_) => Err(errors),
            Err(error) => {
                if !errors.contains(&error) {
                    errors.push(error);
                }
                Err(errors)
            }
        }
    }

    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        let and_expression = self.parse_and_expression()?;

        if let Some(token) = self.peek() {
            return Err(self.lexical_error(token).unwrap_or_else(|| {
                SyntaxError::at(
                    self.source,
                    token.span,
                    format!("extraneous input {}, expected AND, OR or end of input", token.kind.describe()),
                )
            }));
        }

        Ok(Expression(and_expression))
    }

    /// 解析AND表达式 (最低优先级)
    ///
    /// 语法: `or_expr (AND or_expr)*`
    fn parse_and_expression(&mut self) -> Result<AndExpression, SyntaxError> {
        let mut operands = vec![self.parse_or_expression()?];

        while self.match_token(&TokenKind::And) {
            self.advance(); // 消费 AND
            operands.push(self.parse_or_expression()?);
        }

        Ok(AndExpression { operands })
    }

    /// 解析OR表达式
    ///
    /// 语法: `clause (OR clause)*`
    fn parse_or_expression(&mut self) -> Result<OrExpression, SyntaxError> {
        let mut clauses = vec![self.parse_clause()?];

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 OR
            clauses.push(self.parse_clause()?);
        }

        Ok(OrExpression { clauses })
    }

    /// 解析子句 (最高优先级)
    ///
    /// 支持的子句类型:
    /// - `(and_expr)` - 分组表达式
    /// - `attribute = "value"` / `attribute != "value"` - 原子子句
    /// - `pair_type("key", "value")` - 键值子句
    fn parse_clause(&mut self) -> Result<Clause, SyntaxError> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("clause"));
        };

        match &token.kind {
            TokenKind::LParen => {
                let open = token.span;
                if self.depth >= self.max_depth {
                    return Err(SyntaxError::at(
                        self.source,
                        open,
                        format!("expression nested deeper than {} levels", self.max_depth),
                    ));
                }
                self.advance(); // 消费 (
                self.depth += 1;
                let inner = self.parse_and_expression()?;
                self.depth -= 1;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Clause::Group(Box::new(inner)))
            }
            TokenKind::Attribute(name) => {
                let start = token.span.start;
                self.advance(); // 消费属性名
                let attribute = Identifier((*name).to_string());

                if self.match_token(&TokenKind::LParen) {
                    self.advance(); // 消费 (
                    let (key, _) = self.expect_string()?;
                    self.expect(TokenKind::Comma, "','")?;
                    let (value, _) = self.expect_string()?;
                    let close = self.expect(TokenKind::RParen, "')'")?;
                    return Ok(Clause::KeyValue {
                        pair_type: attribute,
                        key: key.to_string(),
                        value: value.to_string(),
                        span: Span::new(start, close.end),
                    });
                }

                let operator = self.parse_comparison_operator()?;
                let (literal, literal_span) = self.expect_string()?;
                Ok(Clause::Atomic {
                    attribute,
                    operator,
                    literal: literal.to_string(),
                    span: Span::new(start, literal_span.end),
                })
            }
            _ => Err(self.unexpected("clause")),
        }
    }

    fn parse_comparison_operator(&mut self) -> Result<CompOp, SyntaxError> {
        let operator = match self.peek().map(|token| &token.kind) {
            Some(TokenKind::Eq) => CompOp::Equal,
            Some(TokenKind::NotEq) => CompOp::NotEqual,
            _ => return Err(self.unexpected("'=', '!=' or '('")),
        };
        self.advance();
        Ok(operator)
    }
}
