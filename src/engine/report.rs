//! Warnings for code the compressor removes.
//!
//! `oxc_minifier` drops code without saying so, so the parsed program is
//! walked once before compression and every statement that is about to go
//! is reported to the job's sink with its position marker.

use super::lines::LineIndex;
use super::{WarningSink, marked};
use crate::config::CompressOptions;
use oxc_ast::AstKind;
use oxc_ast::ast::{CallExpression, Expression, Program, Statement, VariableDeclarationKind};
use oxc_ast_visit::Visit;
use oxc_span::GetSpan;

struct DropReporter<'r> {
    options: &'r CompressOptions,
    file: &'r str,
    lines: &'r LineIndex<'r>,
    sink: &'r mut dyn WarningSink,
}

impl DropReporter<'_> {
    fn warn(&mut self, message: &str, offset: u32) {
        let (line, col) = self.lines.position(offset);
        self.sink.warn(marked(message, self.file, line, col));
    }

    /// Report the first statement that can never run after a `return` or
    /// `throw` in the same list.
    fn check_unreachable(&mut self, statements: &[Statement<'_>]) {
        let Some(exit) = statements.iter().position(|statement| {
            matches!(
                statement,
                Statement::ReturnStatement(_) | Statement::ThrowStatement(_)
            )
        }) else {
            return;
        };
        if let Some(dropped) = statements[exit + 1..].iter().find(|s| !is_hoisted(s)) {
            self.warn("Dropping unreachable code", dropped.span().start);
        }
    }
}

/// Declarations that stay in effect even when control never reaches them.
fn is_hoisted(statement: &Statement<'_>) -> bool {
    match statement {
        Statement::FunctionDeclaration(_) | Statement::EmptyStatement(_) => true,
        Statement::VariableDeclaration(declaration) => {
            declaration.kind == VariableDeclarationKind::Var
        }
        _ => false,
    }
}

fn is_console_call(call: &CallExpression<'_>) -> bool {
    if let Expression::StaticMemberExpression(member) = &call.callee
        && let Expression::Identifier(id) = &member.object
    {
        return id.name == "console";
    }
    false
}

impl<'a> Visit<'a> for DropReporter<'_> {
    fn enter_node(&mut self, kind: AstKind<'a>) {
        match kind {
            AstKind::DebuggerStatement(statement) if self.options.drop_debugger => {
                self.warn("Dropping debugger statement", statement.span.start);
            }
            AstKind::CallExpression(call) if self.options.drop_console && is_console_call(call) => {
                self.warn("Dropping console call", call.span.start);
            }
            AstKind::BlockStatement(block) => self.check_unreachable(&block.body),
            AstKind::FunctionBody(body) => self.check_unreachable(&body.statements),
            AstKind::SwitchCase(case) => self.check_unreachable(&case.consequent),
            _ => {}
        }
    }
}

/// Walk `program` and warn about everything `options` will remove.
pub fn report_drops(
    program: &Program<'_>,
    options: &CompressOptions,
    file: &str,
    lines: &LineIndex<'_>,
    sink: &mut dyn WarningSink,
) {
    let mut reporter = DropReporter {
        options,
        file,
        lines,
        sink,
    };
    reporter.visit_program(program);
}
