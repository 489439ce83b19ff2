//! AST types for condition and update expressions.
//!
//! Conditions and update actions are built in Rust from [`AttributePath`]
//! builders and compiled to DynamoDB expression text by
//! [`compile_condition`](super::compile_condition) and
//! [`compile_update`](super::compile_update). Literals stay as
//! `serde_json::Value` until compilation, where they are typed against the
//! attribute they are compared with or assigned to.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde_json::Value;

use crate::schema::AttributeType;

/// Condition AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Comparison expression: `left op right`.
    Compare {
        /// Left-hand operand.
        left: Operand,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Operand,
    },
    /// Between expression: `value BETWEEN low AND high`.
    Between {
        /// Value to test.
        value: Operand,
        /// Lower bound (inclusive).
        low: Operand,
        /// Upper bound (inclusive).
        high: Operand,
    },
    /// In expression: `value IN (list...)`.
    In {
        /// Value to search for.
        value: Operand,
        /// List of candidate values.
        list: Vec<Operand>,
    },
    /// Logical combination: `left AND right` or `left OR right`.
    Logical {
        /// Logical operator.
        op: LogicalOp,
        /// Left-hand expression.
        left: Box<Condition>,
        /// Right-hand expression.
        right: Box<Condition>,
    },
    /// Logical negation: `NOT expr`.
    Not(Box<Condition>),
    /// Function call: `function_name (args...)`.
    Function {
        /// Function name.
        name: FunctionName,
        /// Function arguments. The first one is always a path.
        args: Vec<Operand>,
    },
}

impl Condition {
    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: Condition) -> Condition {
        Condition::Logical {
            op: LogicalOp::And,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// `self OR other`.
    #[must_use]
    pub fn or(self, other: Condition) -> Condition {
        Condition::Logical {
            op: LogicalOp::Or,
            left: Box::new(self),
            right: Box::new(other),
        }
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Built-in DynamoDB condition function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `attribute_exists(path)` - true if the attribute exists.
    AttributeExists,
    /// `attribute_not_exists(path)` - true if the attribute does not exist.
    AttributeNotExists,
    /// `attribute_type(path, type)` - true if the attribute is of the given type.
    AttributeType,
    /// `begins_with(path, substr)` - true if the string begins with the prefix.
    BeginsWith,
    /// `contains(path, operand)` - true if string contains substring or set contains element.
    Contains,
}

impl FunctionName {
    /// Number of arguments the function takes.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::AttributeExists | Self::AttributeNotExists => 1,
            Self::AttributeType | Self::BeginsWith | Self::Contains => 2,
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::AttributeType => write!(f, "attribute_type"),
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

/// An operand in an expression (a value producer).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A document path reference (e.g., `info.rating`, `myList[0]`).
    Path(AttributePath),
    /// A literal, typed during compilation.
    Value(Value),
    /// The `size(path)` function used as an operand in comparisons.
    Size(AttributePath),
}

impl From<AttributePath> for Operand {
    fn from(path: AttributePath) -> Self {
        Operand::Path(path)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

#[allow(clippy::should_implement_trait)]
impl Operand {
    fn compare(self, op: CompareOp, right: impl Into<Operand>) -> Condition {
        Condition::Compare {
            left: self,
            op,
            right: right.into(),
        }
    }

    /// `self = value`.
    #[must_use]
    pub fn eq(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    /// `self <> value`.
    #[must_use]
    pub fn ne(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Ne, value)
    }

    /// `self < value`.
    #[must_use]
    pub fn lt(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    /// `self <= value`.
    #[must_use]
    pub fn le(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Le, value)
    }

    /// `self > value`.
    #[must_use]
    pub fn gt(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    /// `self >= value`.
    #[must_use]
    pub fn ge(self, value: impl Into<Operand>) -> Condition {
        self.compare(CompareOp::Ge, value)
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Value(Value::from(value))
                }
            }

            impl From<$ty> for SetValue {
                fn from(value: $ty) -> Self {
                    SetValue::Operand(Operand::Value(Value::from(value)))
                }
            }
        )*
    };
}

literal_operand!(bool, i32, i64, u32, u64, f64, String, &str);

/// A document path consisting of one or more elements.
///
/// The first element is always an attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    elements: Vec<PathElement>,
}

/// A single element in an attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// A named attribute or map key.
    Attribute(String),
    /// A list index dereference (e.g., `[0]`).
    Index(usize),
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elements.iter().enumerate() {
            match elem {
                PathElement::Attribute(name) => {
                    if i > 0 {
                        write!(f, ".{name}")?;
                    } else {
                        write!(f, "{name}")?;
                    }
                }
                PathElement::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// Shorthand for [`AttributePath::new`].
#[must_use]
pub fn attr(name: impl Into<String>) -> AttributePath {
    AttributePath::new(name)
}

// Builder names mirror the DynamoDB verbs, some of which shadow operator traits.
#[allow(clippy::should_implement_trait)]
impl AttributePath {
    /// A path naming the top-level attribute `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            elements: vec![PathElement::Attribute(name.into())],
        }
    }

    /// Descend into the map key `name`.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.elements.push(PathElement::Attribute(name.into()));
        self
    }

    /// Descend into list element `index`.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.elements.push(PathElement::Index(index));
        self
    }

    /// The top-level attribute name.
    #[must_use]
    pub fn root(&self) -> &str {
        match self.elements.first() {
            Some(PathElement::Attribute(name)) => name,
            _ => "",
        }
    }

    /// The path elements in order.
    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Returns `true` when the path names a top-level attribute.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.elements.len() == 1
    }

    /// Returns `true` when one path equals or contains the other.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.elements.starts_with(&other.elements) || other.elements.starts_with(&self.elements)
    }

    /// `path = value`.
    #[must_use]
    pub fn eq(self, value: impl Into<Operand>) -> Condition {
        Operand::Path(self).eq(value)
    }

    /// `path <> value`.
    #[must_use]
    pub fn ne(self, value: impl Into<Operand>) -> Condition {
        Operand::Path(self).ne(value)
    }

    /// `path < value`.
    #[must_use]
    pub fn lt(self, value: impl Into<Operand>) -> Condition {
        Operand::Path(self).lt(value)
    }

    /// `path <= value`.
    #[must_use]
    pub fn le(self, value: impl Into<Operand>) -> Condition {
        Operand::Path(self).le(value)
    }

    /// `path > value`.
    #[must_use]
    pub fn gt(self, value: impl Into<Operand>) -> Condition {
        Operand::Path(self).gt(value)
    }

    /// `path >= value`.
    #[must_use]
    pub fn ge(self, value: impl Into<Operand>) -> Condition {
        Operand::Path(self).ge(value)
    }

    /// `path BETWEEN low AND high`.
    #[must_use]
    pub fn between(self, low: impl Into<Operand>, high: impl Into<Operand>) -> Condition {
        Condition::Between {
            value: Operand::Path(self),
            low: low.into(),
            high: high.into(),
        }
    }

    /// `path IN (values...)`.
    #[must_use]
    pub fn is_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        Condition::In {
            value: Operand::Path(self),
            list: values.into_iter().map(Into::into).collect(),
        }
    }

    fn function(self, name: FunctionName, arg: Option<Operand>) -> Condition {
        let mut args = vec![Operand::Path(self)];
        args.extend(arg);
        Condition::Function { name, args }
    }

    /// `attribute_exists (path)`.
    #[must_use]
    pub fn exists(self) -> Condition {
        self.function(FunctionName::AttributeExists, None)
    }

    /// `attribute_not_exists (path)`.
    #[must_use]
    pub fn does_not_exist(self) -> Condition {
        self.function(FunctionName::AttributeNotExists, None)
    }

    /// `attribute_type (path, type)`.
    #[must_use]
    pub fn is_type(self, attr_type: AttributeType) -> Condition {
        let descriptor = Value::from(attr_type.type_descriptor());
        self.function(FunctionName::AttributeType, Some(Operand::Value(descriptor)))
    }

    /// `begins_with (path, prefix)`.
    #[must_use]
    pub fn begins_with(self, prefix: impl Into<Operand>) -> Condition {
        self.function(FunctionName::BeginsWith, Some(prefix.into()))
    }

    /// `contains (path, operand)`.
    #[must_use]
    pub fn contains(self, item: impl Into<Operand>) -> Condition {
        self.function(FunctionName::Contains, Some(item.into()))
    }

    /// `size (path)`, usable on either side of a comparison.
    #[must_use]
    pub fn size(self) -> Operand {
        Operand::Size(self)
    }

    /// `SET path = value`.
    #[must_use]
    pub fn set(self, value: impl Into<SetValue>) -> UpdateAction {
        UpdateAction::Set {
            path: self,
            value: value.into(),
        }
    }

    /// `REMOVE path`.
    #[must_use]
    pub fn remove(self) -> UpdateAction {
        UpdateAction::Remove { path: self }
    }

    /// `ADD path value`: numeric increment or set union.
    #[must_use]
    pub fn add(self, value: impl Into<Operand>) -> UpdateAction {
        UpdateAction::Add {
            path: self,
            value: value.into(),
        }
    }

    /// `DELETE path value`: set difference.
    #[must_use]
    pub fn delete(self, value: impl Into<Operand>) -> UpdateAction {
        UpdateAction::Delete {
            path: self,
            value: value.into(),
        }
    }

    /// `path + value`, for use as the right-hand side of a SET.
    #[must_use]
    pub fn plus(self, value: impl Into<SetValue>) -> SetValue {
        SetValue::from(self).plus(value)
    }

    /// `path - value`, for use as the right-hand side of a SET.
    #[must_use]
    pub fn minus(self, value: impl Into<SetValue>) -> SetValue {
        SetValue::from(self).minus(value)
    }

    /// `if_not_exists (path, default)`.
    #[must_use]
    pub fn if_not_exists(self, default: impl Into<Operand>) -> SetValue {
        SetValue::IfNotExists(self, default.into())
    }

    /// `list_append (path, items)`.
    #[must_use]
    pub fn append(self, items: impl Into<Operand>) -> SetValue {
        SetValue::ListAppend(Operand::Path(self), items.into())
    }

    /// `list_append (items, path)`.
    #[must_use]
    pub fn prepend(self, items: impl Into<Operand>) -> SetValue {
        SetValue::ListAppend(items.into(), Operand::Path(self))
    }
}

/// One action of an update expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// `SET path = value`.
    Set {
        /// Target attribute path.
        path: AttributePath,
        /// Value to assign.
        value: SetValue,
    },
    /// `REMOVE path`.
    Remove {
        /// Attribute path to remove.
        path: AttributePath,
    },
    /// `ADD path value`.
    Add {
        /// Target attribute path.
        path: AttributePath,
        /// Value to add.
        value: Operand,
    },
    /// `DELETE path value`.
    Delete {
        /// Target attribute path.
        path: AttributePath,
        /// Value (set) to remove.
        value: Operand,
    },
}

impl UpdateAction {
    /// The attribute path this action writes.
    #[must_use]
    pub fn path(&self) -> &AttributePath {
        match self {
            Self::Set { path, .. }
            | Self::Remove { path }
            | Self::Add { path, .. }
            | Self::Delete { path, .. } => path,
        }
    }

    /// The update clause keyword.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Set { .. } => "SET",
            Self::Remove { .. } => "REMOVE",
            Self::Add { .. } => "ADD",
            Self::Delete { .. } => "DELETE",
        }
    }
}

/// The right-hand side of a SET action.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Simple operand assignment.
    Operand(Operand),
    /// Addition: `left + right`.
    Plus(Box<SetValue>, Box<SetValue>),
    /// Subtraction: `left - right`.
    Minus(Box<SetValue>, Box<SetValue>),
    /// `if_not_exists(path, operand)` - use default if path does not exist.
    IfNotExists(AttributePath, Operand),
    /// `list_append(operand, operand)` - concatenate two lists.
    ListAppend(Operand, Operand),
}

#[allow(clippy::should_implement_trait)]
impl SetValue {
    /// `self + value`.
    #[must_use]
    pub fn plus(self, value: impl Into<SetValue>) -> SetValue {
        SetValue::Plus(Box::new(self), Box::new(value.into()))
    }

    /// `self - value`.
    #[must_use]
    pub fn minus(self, value: impl Into<SetValue>) -> SetValue {
        SetValue::Minus(Box::new(self), Box::new(value.into()))
    }
}

impl From<Operand> for SetValue {
    fn from(operand: Operand) -> Self {
        SetValue::Operand(operand)
    }
}

impl From<AttributePath> for SetValue {
    fn from(path: AttributePath) -> Self {
        SetValue::Operand(Operand::Path(path))
    }
}

impl From<Value> for SetValue {
    fn from(value: Value) -> Self {
        SetValue::Operand(Operand::Value(value))
    }
}
