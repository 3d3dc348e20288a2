use std::collections::HashSet;

use log::debug;

use crate::ast::{AssignTarget, CompareOp, Constant, Expression, Module, Statement, StatementKind};
use crate::builtins::BuiltinFunction;
use crate::error::{TranslateError, TranslateResult};
use crate::parser;
use crate::token::Span;

const C_HEADER: &str = "#include <stdio.h>";
const C_MAIN_OPEN: &str = "int main(void) {";
const C_MAIN_RETURN: &str = "return 0;";
const C_INT_TYPE: &str = "int";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorOptions {
    /// Spaces per nesting level in the generated C.
    pub indent_width: usize,
    /// Declare every assigned name as `int` at the top of `main`.
    pub declare_variables: bool,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            indent_width: 4,
            declare_variables: true,
        }
    }
}

/// Walks a [`Module`] and renders it as a single C `main` function.
///
/// The translator only holds options; every call to [`Translator::translate`]
/// builds its output in a fresh buffer, so one instance can be reused or
/// shared between threads.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    options: TranslatorOptions,
}

/// Lines emitted so far by one translation.
struct Output {
    lines: Vec<String>,
    indent_unit: String,
}

impl Output {
    fn new(indent_width: usize) -> Self {
        Self {
            lines: Vec::new(),
            indent_unit: " ".repeat(indent_width),
        }
    }

    fn push_line(&mut self, depth: usize, line: &str) {
        let mut text = self.indent_unit.repeat(depth);
        text.push_str(line);
        self.lines.push(text);
    }

    fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

impl Translator {
    pub fn new(options: TranslatorOptions) -> Self {
        Self { options }
    }

    /// Lexes, parses and translates Python source text.
    pub fn translate_source(&self, source: &str) -> TranslateResult<String> {
        let module = parser::parse(source)?;
        self.translate(&module)
    }

    pub fn translate(&self, module: &Module) -> TranslateResult<String> {
        let mut output = Output::new(self.options.indent_width);
        self.emit_module(module, &mut output)
            .inspect_err(|err| debug!("translation failed: {err}"))?;
        debug!(
            "translated {} top-level statements into {} lines",
            module.body.len(),
            output.lines.len()
        );
        Ok(output.finish())
    }

    fn emit_module(&self, module: &Module, output: &mut Output) -> TranslateResult<()> {
        output.push_line(0, C_HEADER);
        output.push_line(0, C_MAIN_OPEN);
        if self.options.declare_variables {
            for name in collect_declarations(&module.body) {
                output.push_line(1, &format!("{C_INT_TYPE} {name};"));
            }
        }
        self.emit_block(&module.body, 1, output)?;
        output.push_line(1, C_MAIN_RETURN);
        output.push_line(0, "}");
        Ok(())
    }

    fn emit_block(
        &self,
        statements: &[Statement],
        depth: usize,
        output: &mut Output,
    ) -> TranslateResult<()> {
        for statement in statements {
            self.emit_statement(statement, depth, output)?;
        }
        Ok(())
    }

    fn emit_statement(
        &self,
        statement: &Statement,
        depth: usize,
        output: &mut Output,
    ) -> TranslateResult<()> {
        let span = statement.span;
        match &statement.kind {
            StatementKind::Assign { targets, value } => {
                let [target] = targets.as_slice() else {
                    return Err(TranslateError::unsupported(
                        "assignment with multiple targets",
                        span,
                    ));
                };
                let name = simple_name(target, "assignment target", span)?;
                let value = self.visit_expression(value, span)?;
                output.push_line(depth, &format!("{name} = {value};"));
            }
            StatementKind::Expr(expr) => {
                let expr = self.visit_expression(expr, span)?;
                output.push_line(depth, &format!("{expr};"));
            }
            StatementKind::If { test, body, orelse } => {
                let test = self.visit_expression(test, span)?;
                output.push_line(depth, &format!("if ({test}) {{"));
                self.emit_block(body, depth + 1, output)?;
                output.push_line(depth, "}");
                if !orelse.is_empty() {
                    output.push_line(depth, "else {");
                    self.emit_block(orelse, depth + 1, output)?;
                    output.push_line(depth, "}");
                }
            }
            StatementKind::For { target, iter, body } => {
                let var = simple_name(target, "loop target", span)?;
                let (start, end) = self.range_bounds(iter, span)?;
                output.push_line(
                    depth,
                    &format!("for ({C_INT_TYPE} {var} = {start}; {var} < {end}; {var}++) {{"),
                );
                self.emit_block(body, depth + 1, output)?;
                output.push_line(depth, "}");
            }
            StatementKind::Pass => {}
            StatementKind::While { .. } => {
                return Err(TranslateError::unsupported("while loop", span));
            }
            StatementKind::FunctionDef { name, .. } => {
                return Err(TranslateError::unsupported(
                    format!("function definition `{name}`"),
                    span,
                ));
            }
            StatementKind::Return(_) => {
                return Err(TranslateError::unsupported("return statement", span));
            }
            StatementKind::Break => {
                return Err(TranslateError::unsupported("break statement", span));
            }
            StatementKind::Continue => {
                return Err(TranslateError::unsupported("continue statement", span));
            }
        }
        Ok(())
    }

    /// Resolves `range(end)` / `range(start, end)` into C loop bounds.
    fn range_bounds(&self, iter: &Expression, span: Span) -> TranslateResult<(String, String)> {
        let Expression::Call { func, args } = iter else {
            return Err(TranslateError::unsupported(
                "for loop over a non-range iterable",
                span,
            ));
        };
        if !matches!(func.as_ref(), Expression::Name(name)
            if BuiltinFunction::from_name(name) == Some(BuiltinFunction::Range))
        {
            return Err(TranslateError::unsupported(
                "for loop over a non-range iterable",
                span,
            ));
        }

        match args.as_slice() {
            [end] => Ok(("0".to_string(), self.visit_expression(end, span)?)),
            [start, end] => Ok((
                self.visit_expression(start, span)?,
                self.visit_expression(end, span)?,
            )),
            _ => Err(TranslateError::unsupported(
                format!("range() with {} arguments", args.len()),
                span,
            )),
        }
    }

    /// Renders an expression as a C fragment. `span` is the location of the
    /// enclosing statement and is only used for error reporting.
    fn visit_expression(&self, expr: &Expression, span: Span) -> TranslateResult<String> {
        match expr {
            Expression::Name(name) => Ok(name.clone()),
            Expression::Constant(constant) => visit_constant(constant, span),
            Expression::Call { func, args } => self.visit_call(func, args, span),
            Expression::Compare {
                left,
                ops,
                comparators,
            } => self.visit_compare(left, ops, comparators, span),
            Expression::BinaryOp { op, .. } => Err(TranslateError::unsupported(
                format!("binary operator `{}`", op.as_str()),
                span,
            )),
            Expression::UnaryOp { op, .. } => Err(TranslateError::unsupported(
                format!("unary operator `{}`", op.as_str()),
                span,
            )),
            Expression::Attribute { name, .. } => Err(TranslateError::unsupported(
                format!("attribute access `.{name}`"),
                span,
            )),
            Expression::Subscript { .. } => {
                Err(TranslateError::unsupported("subscript expression", span))
            }
            Expression::Tuple(_) => Err(TranslateError::unsupported("tuple expression", span)),
        }
    }

    fn visit_call(
        &self,
        func: &Expression,
        args: &[Expression],
        span: Span,
    ) -> TranslateResult<String> {
        let Expression::Name(name) = func else {
            return Err(TranslateError::unsupported("call of a non-name callee", span));
        };
        match BuiltinFunction::from_name(name) {
            Some(BuiltinFunction::Print) => {
                if args.is_empty() {
                    return Ok("printf(\"\\n\")".to_string());
                }
                let mut rendered_args = Vec::with_capacity(args.len());
                for arg in args {
                    rendered_args.push(self.visit_expression(arg, span)?);
                }
                let format = vec!["%d"; args.len()].join(" ");
                Ok(format!(
                    "printf(\"{format}\\n\", {})",
                    rendered_args.join(", ")
                ))
            }
            Some(builtin @ BuiltinFunction::Range) => Err(TranslateError::unsupported(
                format!("call to `{}` outside a for loop header", builtin.name()),
                span,
            )),
            None => Err(TranslateError::unsupported(
                format!("call to `{name}`"),
                span,
            )),
        }
    }

    fn visit_compare(
        &self,
        left: &Expression,
        ops: &[CompareOp],
        comparators: &[Expression],
        span: Span,
    ) -> TranslateResult<String> {
        let ([op], [right]) = (ops, comparators) else {
            return Err(TranslateError::unsupported("chained comparison", span));
        };
        let symbol = c_compare_symbol(*op).ok_or_else(|| {
            TranslateError::unsupported(format!("comparison operator `{}`", op.as_str()), span)
        })?;
        let left = self.visit_expression(left, span)?;
        let right = self.visit_expression(right, span)?;
        Ok(format!("{left} {symbol} {right}"))
    }
}

fn visit_constant(constant: &Constant, span: Span) -> TranslateResult<String> {
    match constant {
        Constant::Integer(value) => match i32::try_from(*value) {
            Ok(value) => Ok(value.to_string()),
            Err(_) => Err(TranslateError::unsupported(
                format!("integer literal {value} outside the C int range"),
                span,
            )),
        },
        Constant::Boolean(value) => Ok(if *value { "1" } else { "0" }.to_string()),
        Constant::String(_) => Err(TranslateError::unsupported("string literal", span)),
    }
}

fn c_compare_symbol(op: CompareOp) -> Option<&'static str> {
    match op {
        CompareOp::Eq => Some("=="),
        CompareOp::NotEq => Some("!="),
        CompareOp::Lt => Some("<"),
        CompareOp::LtE => Some("<="),
        CompareOp::Gt => Some(">"),
        CompareOp::GtE => Some(">="),
        CompareOp::In | CompareOp::NotIn | CompareOp::Is | CompareOp::IsNot => None,
    }
}

fn simple_name<'t>(target: &'t AssignTarget, role: &str, span: Span) -> TranslateResult<&'t str> {
    match target {
        AssignTarget::Name(name) => Ok(name.as_str()),
        AssignTarget::Attribute { name, .. } => Err(TranslateError::unsupported(
            format!("{role} attribute `.{name}`"),
            span,
        )),
        AssignTarget::Subscript { .. } => Err(TranslateError::unsupported(
            format!("{role} subscript"),
            span,
        )),
        AssignTarget::Tuple(_) => {
            Err(TranslateError::unsupported(format!("{role} tuple"), span))
        }
    }
}

/// Names assigned anywhere in `statements`, in order of first assignment.
fn collect_declarations(statements: &[Statement]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    collect_assignments(statements, &mut seen, &mut names);
    names
}

fn collect_assignments<'m>(
    statements: &'m [Statement],
    seen: &mut HashSet<&'m str>,
    names: &mut Vec<&'m str>,
) {
    for statement in statements {
        match &statement.kind {
            StatementKind::Assign { targets, .. } => {
                if let [AssignTarget::Name(name)] = targets.as_slice()
                    && seen.insert(name.as_str())
                {
                    names.push(name.as_str());
                }
            }
            StatementKind::If { body, orelse, .. } => {
                collect_assignments(body, seen, names);
                collect_assignments(orelse, seen, names);
            }
            StatementKind::For { body, .. } => collect_assignments(body, seen, names),
            _ => {}
        }
    }
}
