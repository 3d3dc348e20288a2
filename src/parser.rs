use thiserror::Error;

use crate::ast::{
    AssignTarget, BinaryOperator, CompareOp, Constant, Expression, Module, Statement,
    StatementKind, UnaryOperator,
};
use crate::lexer;
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Expected {expected}, got {found} at line {line}, column {column}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
    pub column: usize,
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must end with an `EOF` token, as produced by
    /// [`lexer::tokenize`].
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if !matches!(tokens.last().map(Token::kind), Some(TokenKind::EOF)) {
            let span = tokens.last().map(Token::span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, span));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse_module(mut self) -> ParseResult<Module> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        Ok(Module { body })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let span = self.current().span;
        let kind = match self.current_kind() {
            TokenKind::If => {
                self.advance();
                self.parse_if_tail()?
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Def => self.parse_function_def()?,
            _ => self.parse_simple_statement()?,
        };
        Ok(Statement::new(kind, span))
    }

    /// Parses the remainder of an `if`/`elif` after its keyword; an `elif`
    /// becomes a nested `If` as the sole statement of the else-sequence.
    fn parse_if_tail(&mut self) -> ParseResult<StatementKind> {
        let test = self.parse_expression()?;
        self.expect(TokenKind::Colon, ":")?;
        let body = self.parse_block()?;

        let orelse = match self.current_kind() {
            TokenKind::Elif => {
                let span = self.current().span;
                self.advance();
                let nested = self.parse_if_tail()?;
                vec![Statement::new(nested, span)]
            }
            TokenKind::Else => {
                self.advance();
                self.expect(TokenKind::Colon, ":")?;
                self.parse_block()?
            }
            _ => Vec::new(),
        };

        Ok(StatementKind::If { test, body, orelse })
    }

    fn parse_for(&mut self) -> ParseResult<StatementKind> {
        self.expect(TokenKind::For, "for")?;
        let target_span = self.current().span;
        let target = self.parse_list_with(Self::parse_postfix)?;
        let target = self.target_from(target, target_span)?;
        self.expect(TokenKind::In, "in")?;
        let iter = self.parse_expression()?;
        self.expect(TokenKind::Colon, ":")?;
        let body = self.parse_block()?;
        Ok(StatementKind::For { target, iter, body })
    }

    fn parse_while(&mut self) -> ParseResult<StatementKind> {
        self.expect(TokenKind::While, "while")?;
        let test = self.parse_expression()?;
        self.expect(TokenKind::Colon, ":")?;
        let body = self.parse_block()?;
        Ok(StatementKind::While { test, body })
    }

    fn parse_function_def(&mut self) -> ParseResult<StatementKind> {
        self.expect(TokenKind::Def, "def")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen, "(")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            params.push(self.expect_identifier()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        self.expect(TokenKind::Colon, ":")?;
        let body = self.parse_block()?;
        Ok(StatementKind::FunctionDef { name, params, body })
    }

    /// A suite: either simple statements on the header's line, or an
    /// indented block on the following lines.
    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        if !self.eat(&TokenKind::Newline) {
            let span = self.current().span;
            let kind = self.parse_simple_statement()?;
            return Ok(vec![Statement::new(kind, span)]);
        }

        self.expect(TokenKind::Indent, "indent")?;
        let mut body = Vec::new();
        while !matches!(self.current().kind, TokenKind::Dedent | TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            body.push(self.parse_statement()?);
        }
        self.expect(TokenKind::Dedent, "dedent")?;
        Ok(body)
    }

    fn parse_simple_statement(&mut self) -> ParseResult<StatementKind> {
        let kind = match self.current_kind() {
            TokenKind::Pass => {
                self.advance();
                StatementKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                StatementKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StatementKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                if self.check(&TokenKind::Newline) {
                    StatementKind::Return(None)
                } else {
                    StatementKind::Return(Some(self.parse_target_list()?))
                }
            }
            _ => self.parse_expression_or_assignment()?,
        };
        self.expect(TokenKind::Newline, "newline")?;
        Ok(kind)
    }

    fn parse_expression_or_assignment(&mut self) -> ParseResult<StatementKind> {
        let mut span = self.current().span;
        let mut value = self.parse_target_list()?;
        let mut targets = Vec::new();
        while self.eat(&TokenKind::Equal) {
            targets.push(self.target_from(value, span)?);
            span = self.current().span;
            value = self.parse_target_list()?;
        }

        if targets.is_empty() {
            Ok(StatementKind::Expr(value))
        } else {
            Ok(StatementKind::Assign { targets, value })
        }
    }

    fn parse_target_list(&mut self) -> ParseResult<Expression> {
        self.parse_list_with(Self::parse_not_test)
    }

    /// Comma-separated items; more than one yields a tuple. Loop targets use
    /// postfix items so that `in` is not read as a comparison.
    fn parse_list_with(
        &mut self,
        parse_item: fn(&mut Self) -> ParseResult<Expression>,
    ) -> ParseResult<Expression> {
        let first = parse_item(self)?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.ends_target_list() {
                break;
            }
            items.push(parse_item(self)?);
        }
        Ok(Expression::Tuple(items))
    }

    fn ends_target_list(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Equal | TokenKind::Newline | TokenKind::In | TokenKind::EOF
        )
    }

    fn target_from(&self, expr: Expression, span: Span) -> ParseResult<AssignTarget> {
        match expr {
            Expression::Name(name) => Ok(AssignTarget::Name(name)),
            Expression::Attribute { object, name } => Ok(AssignTarget::Attribute { object, name }),
            Expression::Subscript { object, index } => {
                Ok(AssignTarget::Subscript { object, index })
            }
            Expression::Tuple(items) => items
                .into_iter()
                .map(|item| self.target_from(item, span))
                .collect::<ParseResult<Vec<_>>>()
                .map(AssignTarget::Tuple),
            other => Err(ParseError {
                expected: "assignment target".to_string(),
                found: format!("{other:?}"),
                line: span.line,
                column: span.column,
            }),
        }
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_not_test()
    }

    fn parse_not_test(&mut self) -> ParseResult<Expression> {
        if self.eat(&TokenKind::Not) {
            let operand = self.parse_not_test()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let left = self.parse_sum()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.parse_compare_op() {
            ops.push(op);
            comparators.push(self.parse_sum()?);
        }

        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expression::Compare {
                left: Box::new(left),
                ops,
                comparators,
            })
        }
    }

    fn parse_compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.current_kind() {
            TokenKind::EqualEqual => CompareOp::Eq,
            TokenKind::NotEqual => CompareOp::NotEq,
            TokenKind::Less => CompareOp::Lt,
            TokenKind::LessEqual => CompareOp::LtE,
            TokenKind::Greater => CompareOp::Gt,
            TokenKind::GreaterEqual => CompareOp::GtE,
            TokenKind::In => CompareOp::In,
            TokenKind::Not if matches!(self.peek_kind(), TokenKind::In) => {
                self.advance();
                CompareOp::NotIn
            }
            TokenKind::Is => {
                if matches!(self.peek_kind(), TokenKind::Not) {
                    self.advance();
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_sum(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_unary()?;
        while self.eat(&TokenKind::Star) {
            let right = self.parse_unary()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op: BinaryOperator::Mul,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Negated integer literals fold into a single constant.
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if !self.eat(&TokenKind::Minus) {
            return self.parse_postfix();
        }
        match self.parse_unary()? {
            Expression::Constant(Constant::Integer(value)) => {
                Ok(Expression::Constant(Constant::Integer(-value)))
            }
            operand => Ok(Expression::UnaryOp {
                op: UnaryOperator::Neg,
                operand: Box::new(operand),
            }),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(&TokenKind::RParen) {
                        args.push(self.parse_expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, ")")?;
                    expr = Expression::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = Expression::Attribute {
                        object: Box::new(expr),
                        name,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "]")?;
                    expr = Expression::Subscript {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let expr = match self.current_kind() {
            TokenKind::Integer(value) => Expression::Constant(Constant::Integer(value)),
            TokenKind::String(value) => Expression::Constant(Constant::String(value.to_string())),
            TokenKind::True => Expression::Constant(Constant::Boolean(true)),
            TokenKind::False => Expression::Constant(Constant::Boolean(false)),
            TokenKind::Identifier(name) => Expression::Name(name.to_string()),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_target_list()?;
                self.expect(TokenKind::RParen, ")")?;
                return Ok(expr);
            }
            _ => return Err(self.error("expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn consume_newlines(&mut self) -> bool {
        let mut consumed = false;
        while self.eat(&TokenKind::Newline) {
            consumed = true;
        }
        consumed
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = self.current_kind() {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(self.error("identifier"))
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>, expected: &str) -> ParseResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn eat(&mut self, kind: &TokenKind<'a>) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: &TokenKind<'a>) -> bool {
        self.current().kind == *kind
    }

    fn current(&self) -> &Token<'a> {
        // `new` guarantees a trailing EOF, and `advance` never moves past it.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> TokenKind<'a> {
        self.current().kind
    }

    fn peek_kind(&self) -> TokenKind<'a> {
        let index = (self.position + 1).min(self.tokens.len() - 1);
        self.tokens[index].kind
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError {
            expected: expected.to_string(),
            found: format!("{:?}", token.kind),
            line: token.span.line,
            column: token.span.column,
        }
    }
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> ParseResult<Module> {
    Parser::new(tokens).parse_module()
}

/// Lexes and parses `source` in one step.
pub fn parse(source: &str) -> Result<Module, crate::TranslateError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parse_tokens(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_ok(source: &str) -> Module {
        parse(source).expect("parse failed")
    }

    fn int(value: i64) -> Expression {
        Expression::Constant(Constant::Integer(value))
    }

    fn name(value: &str) -> Expression {
        Expression::Name(value.to_string())
    }

    fn print_call(args: Vec<Expression>) -> StatementKind {
        StatementKind::Expr(Expression::Call {
            func: Box::new(name("print")),
            args,
        })
    }

    #[test]
    fn parses_simple_program() {
        let module = parse_ok(indoc! {"
            x = 5
            for i in range(1, x):
                print(i)
        "});

        assert_eq!(module.body.len(), 2);
        assert_eq!(
            module.body[0].kind,
            StatementKind::Assign {
                targets: vec![AssignTarget::Name("x".to_string())],
                value: int(5),
            }
        );
        let StatementKind::For { target, iter, body } = &module.body[1].kind else {
            panic!("expected for statement, got {:?}", module.body[1].kind);
        };
        assert_eq!(target, &AssignTarget::Name("i".to_string()));
        assert_eq!(
            iter,
            &Expression::Call {
                func: Box::new(name("range")),
                args: vec![int(1), name("x")],
            }
        );
        assert_eq!(body[0].kind, print_call(vec![name("i")]));
        assert_eq!((module.body[1].span.line, module.body[1].span.column), (2, 0));
    }

    #[test]
    fn parses_single_line_suite() {
        let module = parse_ok("for i in range(3): print(i)\n");
        let StatementKind::For { body, .. } = &module.body[0].kind else {
            panic!("expected for statement");
        };
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].kind, print_call(vec![name("i")]));
    }

    #[test]
    fn desugars_elif_into_nested_if() {
        let module = parse_ok(indoc! {"
            if x == 1:
                print(1)
            elif x == 2:
                print(2)
            else:
                print(3)
        "});

        let StatementKind::If { orelse, .. } = &module.body[0].kind else {
            panic!("expected if statement");
        };
        assert_eq!(orelse.len(), 1);
        let StatementKind::If { test, body, orelse } = &orelse[0].kind else {
            panic!("expected nested if, got {:?}", orelse[0].kind);
        };
        assert_eq!(
            test,
            &Expression::Compare {
                left: Box::new(name("x")),
                ops: vec![CompareOp::Eq],
                comparators: vec![int(2)],
            }
        );
        assert_eq!(body[0].kind, print_call(vec![int(2)]));
        assert_eq!(orelse[0].kind, print_call(vec![int(3)]));
    }

    #[test]
    fn keeps_chained_comparisons_and_word_operators() {
        let module = parse_ok("a < b <= c\nx not in y\nx is not y\n");
        let ops = module
            .body
            .iter()
            .map(|stmt| match &stmt.kind {
                StatementKind::Expr(Expression::Compare { ops, .. }) => ops.clone(),
                other => panic!("expected comparison, got {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            ops,
            vec![
                vec![CompareOp::Lt, CompareOp::LtE],
                vec![CompareOp::NotIn],
                vec![CompareOp::IsNot],
            ]
        );
    }

    #[test]
    fn parses_unsupported_targets_for_later_rejection() {
        let module = parse_ok("a = b = 1\nobj.field = 2\nx, y = 1, 2\n");
        let StatementKind::Assign { targets, .. } = &module.body[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(targets.len(), 2);
        assert!(matches!(
            &module.body[1].kind,
            StatementKind::Assign { targets, .. }
                if matches!(targets[0], AssignTarget::Attribute { .. })
        ));
        assert!(matches!(
            &module.body[2].kind,
            StatementKind::Assign { targets, value: Expression::Tuple(_) }
                if matches!(targets[0], AssignTarget::Tuple(_))
        ));
    }

    #[test]
    fn folds_negative_integer_literals() {
        let module = parse_ok("x = -3\n");
        assert_eq!(
            module.body[0].kind,
            StatementKind::Assign {
                targets: vec![AssignTarget::Name("x".to_string())],
                value: int(-3),
            }
        );
    }

    #[test]
    fn reports_expected_token_and_location() {
        let err = parse("if x > 0\n    print(x)\n").expect_err("expected parse failure");
        assert_eq!(
            err.to_string(),
            "Expected :, got Newline at line 1, column 8"
        );
    }

    #[test]
    fn rejects_assignment_to_literal() {
        let err = parse("1 = x\n").expect_err("expected parse failure");
        assert!(err.to_string().contains("Expected assignment target"));
    }

    #[test]
    fn parses_function_definitions_with_params() {
        let module = parse_ok("def add(a, b):\n    pass\n");
        assert_eq!(
            module.body[0].kind,
            StatementKind::FunctionDef {
                name: "add".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
                body: vec![Statement::new(
                    StatementKind::Pass,
                    Span {
                        start: 19,
                        end: 23,
                        line: 2,
                        column: 4,
                    },
                )],
            }
        );
    }
}
