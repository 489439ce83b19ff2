//! Table and attribute metadata supplied by the model layer.
//!
//! A [`TableSchema`] names the table, its key attributes, every declared
//! attribute with its type, and the optional version attribute used for
//! optimistic locking. Serialization and expression compilation take the
//! schema as an explicit argument.

use std::collections::HashSet;
use std::fmt;

use dynatx_model::types::KeyType;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors produced while building a [`TableSchema`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// No hash key was declared.
    #[error("table {table} has no hash key")]
    MissingHashKey {
        /// The table name.
        table: String,
    },
    /// A second hash or range key was declared.
    #[error("table {table} declares more than one {key_type} key")]
    DuplicateKey {
        /// The table name.
        table: String,
        /// The duplicated key role.
        key_type: KeyType,
    },
    /// Two attributes share a name.
    #[error("attribute {attribute} is declared twice")]
    DuplicateAttribute {
        /// The attribute name.
        attribute: String,
    },
    /// A key attribute has a type DynamoDB does not allow for keys.
    #[error("key attribute {attribute} must be S, N or B, not {attr_type}")]
    InvalidKeyType {
        /// The attribute name.
        attribute: String,
        /// The declared type.
        attr_type: AttributeType,
    },
}

/// Declared type of a model attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// UTF-8 string (`S`).
    String,
    /// Arbitrary-precision number (`N`).
    Number,
    /// Raw bytes (`B`).
    Binary,
    /// Boolean (`BOOL`).
    Boolean,
    /// Set of strings (`SS`).
    StringSet,
    /// Set of numbers (`NS`).
    NumberSet,
    /// Set of byte strings (`BS`).
    BinarySet,
    /// Heterogeneous list (`L`).
    List,
    /// String-keyed document (`M`).
    Map,
}

impl AttributeType {
    /// Returns the DynamoDB type descriptor (e.g. `S`, `NS`, `BOOL`).
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::String => "S",
            Self::Number => "N",
            Self::Binary => "B",
            Self::Boolean => "BOOL",
            Self::StringSet => "SS",
            Self::NumberSet => "NS",
            Self::BinarySet => "BS",
            Self::List => "L",
            Self::Map => "M",
        }
    }

    /// Returns `true` for the three set types.
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::StringSet | Self::NumberSet | Self::BinarySet)
    }

    /// Returns the member type of a set, or `None` for non-set types.
    #[must_use]
    pub fn element_type(&self) -> Option<Self> {
        match self {
            Self::StringSet => Some(Self::String),
            Self::NumberSet => Some(Self::Number),
            Self::BinarySet => Some(Self::Binary),
            _ => None,
        }
    }

    fn is_valid_key_type(self) -> bool {
        matches!(self, Self::String | Self::Number | Self::Binary)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_descriptor())
    }
}

/// A single declared attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    /// Attribute name, both on the wire and in the model's serde form.
    pub name: String,
    /// Declared type.
    pub attr_type: AttributeType,
    /// Whether the attribute may be absent from an item.
    pub nullable: bool,
    /// Key role, if this attribute is part of the primary key.
    pub key_type: Option<KeyType>,
}

impl AttributeSchema {
    /// Returns `true` if this attribute is the hash or range key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.key_type.is_some()
    }
}

/// Metadata describing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table_name: String,
    attributes: Vec<AttributeSchema>,
    hash_key: usize,
    range_key: Option<usize>,
    version_attribute: Option<usize>,
}

impl TableSchema {
    /// Start building a schema for `table_name`.
    #[must_use]
    pub fn builder(table_name: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder {
            table_name: table_name.into(),
            attributes: Vec::new(),
            version_attribute: None,
        }
    }

    /// The table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All declared attributes in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeSchema] {
        &self.attributes
    }

    /// Look up a declared attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The hash (partition) key attribute.
    #[must_use]
    pub fn hash_key(&self) -> &AttributeSchema {
        &self.attributes[self.hash_key]
    }

    /// The range (sort) key attribute, if the table has one.
    #[must_use]
    pub fn range_key(&self) -> Option<&AttributeSchema> {
        self.range_key.map(|i| &self.attributes[i])
    }

    /// The version attribute, if optimistic locking is enabled.
    #[must_use]
    pub fn version_attribute(&self) -> Option<&AttributeSchema> {
        self.version_attribute.map(|i| &self.attributes[i])
    }
}

/// Builder for [`TableSchema`].
#[derive(Debug)]
pub struct TableSchemaBuilder {
    table_name: String,
    attributes: Vec<AttributeSchema>,
    version_attribute: Option<String>,
}

impl TableSchemaBuilder {
    /// Declare the hash key.
    #[must_use]
    pub fn hash_key(self, name: impl Into<String>, attr_type: AttributeType) -> Self {
        self.push(name.into(), attr_type, false, Some(KeyType::Hash))
    }

    /// Declare the range key.
    #[must_use]
    pub fn range_key(self, name: impl Into<String>, attr_type: AttributeType) -> Self {
        self.push(name.into(), attr_type, false, Some(KeyType::Range))
    }

    /// Declare a required attribute.
    #[must_use]
    pub fn attribute(self, name: impl Into<String>, attr_type: AttributeType) -> Self {
        self.push(name.into(), attr_type, false, None)
    }

    /// Declare an attribute that may be absent.
    #[must_use]
    pub fn nullable(self, name: impl Into<String>, attr_type: AttributeType) -> Self {
        self.push(name.into(), attr_type, true, None)
    }

    /// Declare the numeric version attribute used for optimistic locking.
    ///
    /// It is absent on items that were never written.
    #[must_use]
    pub fn version(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.version_attribute = Some(name.clone());
        self.push(name, AttributeType::Number, true, None)
    }

    fn push(
        mut self,
        name: String,
        attr_type: AttributeType,
        nullable: bool,
        key_type: Option<KeyType>,
    ) -> Self {
        self.attributes.push(AttributeSchema {
            name,
            attr_type,
            nullable,
            key_type,
        });
        self
    }

    /// Validate and build the schema.
    pub fn build(self) -> Result<TableSchema, SchemaError> {
        let mut seen = HashSet::new();
        let mut hash_key = None;
        let mut range_key = None;

        for (index, attr) in self.attributes.iter().enumerate() {
            if !seen.insert(attr.name.as_str()) {
                return Err(SchemaError::DuplicateAttribute {
                    attribute: attr.name.clone(),
                });
            }
            let Some(key_type) = attr.key_type else {
                continue;
            };
            if !attr.attr_type.is_valid_key_type() {
                return Err(SchemaError::InvalidKeyType {
                    attribute: attr.name.clone(),
                    attr_type: attr.attr_type,
                });
            }
            let slot = match key_type {
                KeyType::Hash => &mut hash_key,
                KeyType::Range => &mut range_key,
            };
            if slot.replace(index).is_some() {
                return Err(SchemaError::DuplicateKey {
                    table: self.table_name,
                    key_type,
                });
            }
        }

        let Some(hash_key) = hash_key else {
            return Err(SchemaError::MissingHashKey {
                table: self.table_name,
            });
        };
        let version_attribute = self
            .version_attribute
            .as_deref()
            .and_then(|name| self.attributes.iter().position(|a| a.name == name));

        Ok(TableSchema {
            table_name: self.table_name,
            attributes: self.attributes,
            hash_key,
            range_key,
            version_attribute,
        })
    }
}

/// A typed item stored in one table.
///
/// The model's serde form must be a JSON object whose field names match the
/// attribute names declared by [`Model::schema`]. Models with a version
/// attribute must also implement [`Model::version`] and
/// [`Model::set_version`]; a model is not safe to share with another writer
/// while a transaction that touched it is open.
pub trait Model: Serialize + DeserializeOwned {
    /// The schema of the table this model is stored in.
    fn schema() -> &'static TableSchema;

    /// The current value of the version attribute, `None` for new items.
    fn version(&self) -> Option<u64> {
        None
    }

    /// Record a new version after a write was accepted.
    fn set_version(&mut self, version: u64) {
        let _ = version;
    }
}
