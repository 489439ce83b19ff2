//! DynamoDB condition and update expressions.
//!
//! Expressions are built as ASTs and compiled to the placeholder-based text
//! DynamoDB expects:
//!
//! 1. **Building**: [`attr`] paths produce [`Condition`]s and [`UpdateAction`]s.
//! 2. **Compiling**: names and literals are swapped for `#n` / `:n`
//!    placeholders recorded in a [`Placeholders`] table.

pub mod ast;
pub mod compiler;

pub use ast::{
    AttributePath, CompareOp, Condition, FunctionName, LogicalOp, Operand, PathElement, SetValue,
    UpdateAction, attr,
};
pub use compiler::{
    ExpressionError, Placeholders, compile_condition, compile_projection, compile_update,
};
