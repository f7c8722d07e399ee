//! Logical schema types. Pure data.
//!
//! A `Schema` is attached to record batches and tables by reference
//! (`SchemaRef`) so cloning a batch never copies field metadata.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int16,
    Int32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Struct(Vec<Field>),
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::UInt64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Format string as used by the C data interchange layout.
    pub fn format(&self) -> &'static str {
        match self {
            DataType::Boolean => "b",
            DataType::Int16 => "s",
            DataType::Int32 => "i",
            DataType::Int64 => "l",
            DataType::UInt64 => "L",
            DataType::Float32 => "f",
            DataType::Float64 => "g",
            DataType::Utf8 => "u",
            DataType::Struct(_) => "+s",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "bool"),
            DataType::Int16 => write!(f, "int16"),
            DataType::Int32 => write!(f, "int32"),
            DataType::Int64 => write!(f, "int64"),
            DataType::UInt64 => write!(f, "uint64"),
            DataType::Float32 => write!(f, "float"),
            DataType::Float64 => write!(f, "double"),
            DataType::Utf8 => write!(f, "string"),
            DataType::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                write!(f, ">")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

pub type SchemaRef = Arc<Schema>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: vec![] }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of the first field called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Like `index_of`, but reports a missing field as an error.
    pub fn try_index_of(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| Error::NoSuchField(name.to_string()))
    }

    pub fn field_with_name(&self, name: &str) -> Result<&Field> {
        let idx = self.try_index_of(name)?;
        Ok(&self.fields[idx])
    }

    /// Same field count, names, and types. Nullability is not compared.
    pub fn check_compatible(&self, other: &Schema) -> Result<()> {
        if self.fields.len() != other.fields.len() {
            return Err(Error::SchemaMismatch(format!(
                "field count differs: {} vs {}",
                self.fields.len(),
                other.fields.len()
            )));
        }
        for (a, b) in self.fields.iter().zip(other.fields.iter()) {
            if a.name != b.name {
                return Err(Error::SchemaMismatch(format!(
                    "field name differs: '{}' vs '{}'",
                    a.name, b.name
                )));
            }
            if a.data_type != b.data_type {
                return Err(Error::Type(format!(
                    "field '{}' has type {} vs {}",
                    a.name, a.data_type, b.data_type
                )));
            }
        }
        Ok(())
    }

    pub fn is_compatible(&self, other: &Schema) -> bool {
        self.check_compatible(other).is_ok()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", field.name, field.data_type)?;
            if !field.nullable {
                write!(f, " not null")?;
            }
        }
        Ok(())
    }
}
