//! Compilation of condition and update ASTs to DynamoDB expression text.
//!
//! Attribute names are replaced by `#n` placeholders and literals by `:n`
//! placeholders, numbered from zero in first-use order. A [`Placeholders`]
//! table is shared by everything compiled for one operation, so a name or
//! value that recurs reuses its placeholder.

use std::collections::HashMap;

use dynatx_model::AttributeValue;
use dynatx_model::types::{ExpressionAttributeNames, ExpressionAttributeValues};
use serde_json::Value;

use super::ast::{AttributePath, Condition, FunctionName, Operand, PathElement, SetValue, UpdateAction};
use crate::schema::{AttributeType, TableSchema};
use crate::serializer::{self, SerializeError};

/// Errors produced while compiling expressions.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    /// A path's top-level attribute is not declared by the table schema.
    #[error("attribute {attribute} is not declared on table {table}")]
    UnknownAttribute {
        /// The attribute name.
        attribute: String,
        /// The table name.
        table: String,
    },
    /// Two update actions write the same path, or one path contains the other.
    #[error("path {path} overlaps another update action")]
    ConflictingPaths {
        /// The later of the two paths.
        path: String,
    },
    /// An update without any action.
    #[error("update expression has no actions")]
    EmptyUpdate,
    /// An update writes part of the primary key.
    #[error("key attribute {attribute} cannot be updated")]
    KeyAttributeUpdate {
        /// The attribute name.
        attribute: String,
    },
    /// An operand is invalid for the given operation.
    #[error("invalid operand for {operation}: {message}")]
    InvalidOperand {
        /// The operation that failed.
        operation: String,
        /// Explanation.
        message: String,
    },
    /// A literal cannot be serialized as the type of its attribute.
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// Placeholder tables for one operation.
#[derive(Debug, Default)]
pub struct Placeholders {
    names: Vec<String>,
    name_index: HashMap<String, usize>,
    values: Vec<AttributeValue>,
    value_index: HashMap<AttributeValue, usize>,
}

impl Placeholders {
    /// Create empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the `#n` placeholder for `name`, allocating one on first use.
    pub fn name(&mut self, name: &str) -> String {
        let index = match self.name_index.get(name) {
            Some(&index) => index,
            None => {
                let index = self.names.len();
                self.names.push(name.to_owned());
                self.name_index.insert(name.to_owned(), index);
                index
            }
        };
        format!("#{index}")
    }

    /// Return the `:n` placeholder for `value`, allocating one on first use.
    pub fn value(&mut self, value: AttributeValue) -> String {
        let index = match self.value_index.get(&value) {
            Some(&index) => index,
            None => {
                let index = self.values.len();
                self.value_index.insert(value.clone(), index);
                self.values.push(value);
                index
            }
        };
        format!(":{index}")
    }

    /// Returns `true` when no placeholder has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// Consume the tables, producing the wire maps.
    #[must_use]
    pub fn finish(self) -> (ExpressionAttributeNames, ExpressionAttributeValues) {
        let names = self
            .names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (format!("#{i}"), name))
            .collect();
        let values = self
            .values
            .into_iter()
            .enumerate()
            .map(|(i, value)| (format!(":{i}"), value))
            .collect();
        (names, values)
    }
}

/// Compile a condition to expression text.
pub fn compile_condition(
    condition: &Condition,
    schema: &TableSchema,
    placeholders: &mut Placeholders,
) -> Result<String, ExpressionError> {
    Compiler { schema, placeholders }.condition(condition)
}

/// Compile update actions to expression text.
///
/// Actions are grouped as `SET`, `REMOVE`, `ADD`, `DELETE`, each group
/// keeping the caller's order. Key attributes cannot be written and no two
/// actions may touch overlapping paths.
pub fn compile_update(
    actions: &[UpdateAction],
    schema: &TableSchema,
    placeholders: &mut Placeholders,
) -> Result<String, ExpressionError> {
    if actions.is_empty() {
        return Err(ExpressionError::EmptyUpdate);
    }

    let mut seen: Vec<&AttributePath> = Vec::with_capacity(actions.len());
    for action in actions {
        let path = action.path();
        if schema.attribute(path.root()).is_some_and(|a| a.is_key()) {
            return Err(ExpressionError::KeyAttributeUpdate {
                attribute: path.root().to_owned(),
            });
        }
        if seen.iter().any(|p| p.overlaps(path)) {
            return Err(ExpressionError::ConflictingPaths {
                path: path.to_string(),
            });
        }
        seen.push(path);
    }

    let mut compiler = Compiler { schema, placeholders };
    let mut clauses = Vec::with_capacity(4);
    for verb in ["SET", "REMOVE", "ADD", "DELETE"] {
        let items = actions
            .iter()
            .filter(|a| a.verb() == verb)
            .map(|a| compiler.action(a))
            .collect::<Result<Vec<_>, _>>()?;
        if !items.is_empty() {
            clauses.push(format!("{verb} {}", items.join(", ")));
        }
    }
    Ok(clauses.join(" "))
}

/// Compile a projection to a comma-separated list of paths.
pub fn compile_projection(
    paths: &[AttributePath],
    schema: &TableSchema,
    placeholders: &mut Placeholders,
) -> Result<String, ExpressionError> {
    if paths.is_empty() {
        return Err(ExpressionError::InvalidOperand {
            operation: "projection".to_owned(),
            message: "no attributes requested".to_owned(),
        });
    }
    let mut compiler = Compiler { schema, placeholders };
    let rendered = paths
        .iter()
        .map(|path| compiler.path(path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(", "))
}

/// Attribute a literal is typed against. `None` means dynamic typing.
type Context<'a> = Option<(&'a str, AttributeType)>;

struct Compiler<'a, 'p> {
    schema: &'a TableSchema,
    placeholders: &'p mut Placeholders,
}

impl<'a> Compiler<'a, '_> {
    fn condition(&mut self, condition: &Condition) -> Result<String, ExpressionError> {
        match condition {
            Condition::Compare { left, op, right } => {
                let ctx = self.operand_context(left).or_else(|| self.operand_context(right));
                let left = self.operand(left, ctx)?;
                let right = self.operand(right, ctx)?;
                Ok(format!("{left} {op} {right}"))
            }
            Condition::Between { value, low, high } => {
                let ctx = self.operand_context(value);
                let value = self.operand(value, ctx)?;
                let low = self.operand(low, ctx)?;
                let high = self.operand(high, ctx)?;
                Ok(format!("{value} BETWEEN {low} AND {high}"))
            }
            Condition::In { value, list } => {
                if list.is_empty() {
                    return Err(ExpressionError::InvalidOperand {
                        operation: "IN".to_owned(),
                        message: "candidate list is empty".to_owned(),
                    });
                }
                let ctx = self.operand_context(value);
                let value = self.operand(value, ctx)?;
                let list = list
                    .iter()
                    .map(|item| self.operand(item, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{value} IN ({})", list.join(", ")))
            }
            Condition::Logical { op, left, right } => {
                let left = self.condition(left)?;
                let right = self.condition(right)?;
                Ok(format!("({left} {op} {right})"))
            }
            Condition::Not(inner) => Ok(format!("(NOT {})", self.condition(inner)?)),
            Condition::Function { name, args } => self.function(*name, args),
        }
    }

    fn function(&mut self, name: FunctionName, args: &[Operand]) -> Result<String, ExpressionError> {
        let Some(Operand::Path(path)) = args.first() else {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "first argument must be an attribute path".to_owned(),
            });
        };
        if args.len() != name.arity() {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: format!("expected {} arguments, got {}", name.arity(), args.len()),
            });
        }

        let mut rendered = vec![self.path(path)?];
        if let Some(arg) = args.get(1) {
            let ctx = match name {
                FunctionName::Contains => self.path_context(path).and_then(|(attr, t)| {
                    match t {
                        AttributeType::String => Some((attr, t)),
                        _ => t.element_type().map(|element| (attr, element)),
                    }
                }),
                _ => None,
            };
            rendered.push(self.operand(arg, ctx)?);
        }
        Ok(format!("{name} ({})", rendered.join(", ")))
    }

    fn action(&mut self, action: &UpdateAction) -> Result<String, ExpressionError> {
        match action {
            UpdateAction::Set { path, value } => {
                let ctx = self.path_context(path);
                let path = self.path(path)?;
                let value = self.set_value(value, ctx)?;
                Ok(format!("{path} = {value}"))
            }
            UpdateAction::Remove { path } => self.path(path),
            UpdateAction::Add { path, value } | UpdateAction::Delete { path, value } => {
                let ctx = self.path_context(path);
                let path = self.path(path)?;
                let value = self.operand(value, ctx)?;
                Ok(format!("{path} {value}"))
            }
        }
    }

    fn set_value(&mut self, value: &SetValue, ctx: Context<'a>) -> Result<String, ExpressionError> {
        match value {
            SetValue::Operand(operand) => self.operand(operand, ctx),
            SetValue::Plus(left, right) | SetValue::Minus(left, right) => {
                let sign = if matches!(value, SetValue::Plus(..)) { '+' } else { '-' };
                let ctx = ctx.map(|(attr, _)| (attr, AttributeType::Number));
                let left = self.set_value(left, ctx)?;
                let right = self.set_value(right, ctx)?;
                Ok(format!("{left} {sign} {right}"))
            }
            SetValue::IfNotExists(path, default) => {
                let path = self.path(path)?;
                let default = self.operand(default, ctx)?;
                Ok(format!("if_not_exists ({path}, {default})"))
            }
            SetValue::ListAppend(left, right) => {
                let ctx = ctx.map(|(attr, _)| (attr, AttributeType::List));
                let left = self.operand(left, ctx)?;
                let right = self.operand(right, ctx)?;
                Ok(format!("list_append ({left}, {right})"))
            }
        }
    }

    fn operand(&mut self, operand: &Operand, ctx: Context<'a>) -> Result<String, ExpressionError> {
        match operand {
            Operand::Path(path) => self.path(path),
            Operand::Value(value) => self.literal(value, ctx),
            Operand::Size(path) => Ok(format!("size ({})", self.path(path)?)),
        }
    }

    fn literal(&mut self, value: &Value, ctx: Context<'a>) -> Result<String, ExpressionError> {
        let value = match ctx {
            Some(_) if value.is_null() => AttributeValue::Null(true),
            Some((attr, attr_type)) => serializer::serialize_as(attr, attr_type, value)?,
            None => serializer::serialize_dynamic(value),
        };
        Ok(self.placeholders.value(value))
    }

    fn path(&mut self, path: &AttributePath) -> Result<String, ExpressionError> {
        if self.schema.attribute(path.root()).is_none() {
            return Err(ExpressionError::UnknownAttribute {
                attribute: path.root().to_owned(),
                table: self.schema.table_name().to_owned(),
            });
        }
        let mut rendered = String::new();
        for (i, element) in path.elements().iter().enumerate() {
            match element {
                PathElement::Attribute(name) => {
                    if i > 0 {
                        rendered.push('.');
                    }
                    rendered.push_str(&self.placeholders.name(name));
                }
                PathElement::Index(index) => {
                    rendered.push_str(&format!("[{index}]"));
                }
            }
        }
        Ok(rendered)
    }

    /// Literals compared with a top-level attribute take its declared type.
    fn path_context(&self, path: &AttributePath) -> Context<'a> {
        if !path.is_top_level() {
            return None;
        }
        self.schema
            .attribute(path.root())
            .map(|attr| (attr.name.as_str(), attr.attr_type))
    }

    fn operand_context(&self, operand: &Operand) -> Context<'a> {
        match operand {
            Operand::Path(path) => self.path_context(path),
            Operand::Size(path) => {
                let attr = self
                    .schema
                    .attribute(path.root())
                    .map_or("size", |a| a.name.as_str());
                Some((attr, AttributeType::Number))
            }
            Operand::Value(_) => None,
        }
    }
}
