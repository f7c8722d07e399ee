//! A small expression language evaluated over record batches.
//!
//! Expressions are bound against a schema with `data_type`, which reports
//! unknown columns (`NoSuchField`) and ill-typed operands (`Type`) before any
//! data flows. Literals adopt the type of the column they meet, so
//! `col("x") > lit(4)` works for any integer or float `x`.

use std::fmt;

use serde::{Deserialize, Serialize};

use quiver_core::array::BooleanArray;
use quiver_core::{Array, DataType, Datum, Error, RecordBatch, Result, Scalar, Schema};

use crate::arithmetic::{arithmetic, promoted_type, ArithmeticOp};
use crate::compare::{self, CmpOp};
use crate::util::broadcast;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    fn arithmetic(self) -> Option<ArithmeticOp> {
        match self {
            BinaryOp::Add => Some(ArithmeticOp::Add),
            BinaryOp::Subtract => Some(ArithmeticOp::Subtract),
            BinaryOp::Multiply => Some(ArithmeticOp::Multiply),
            _ => None,
        }
    }

    fn comparison(self) -> Option<CmpOp> {
        match self {
            BinaryOp::Eq => Some(CmpOp::Eq),
            BinaryOp::NotEq => Some(CmpOp::NotEq),
            BinaryOp::Lt => Some(CmpOp::Lt),
            BinaryOp::LtEq => Some(CmpOp::LtEq),
            BinaryOp::Gt => Some(CmpOp::Gt),
            BinaryOp::GtEq => Some(CmpOp::GtEq),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(String),
    Literal(Scalar),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
}

pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

pub fn lit(value: impl Into<Scalar>) -> Expr {
    Expr::Literal(value.into())
}

/// Evaluated operand: literals stay scalar until a kernel needs an array.
enum Value {
    Array(Array),
    Scalar(Scalar),
}

impl Value {
    fn into_array(self, data_type: &DataType, len: usize) -> Result<Array> {
        match self {
            Value::Array(a) => Ok(a),
            Value::Scalar(s) => broadcast(&s, data_type, len),
        }
    }

    fn into_datum(self) -> Datum {
        match self {
            Value::Array(a) => Datum::Array(a),
            Value::Scalar(s) => Datum::Scalar(s),
        }
    }
}

fn into_boolean(array: Array) -> Result<BooleanArray> {
    match array {
        Array::Boolean(b) => Ok(b),
        other => Err(Error::Type(format!("expected boolean, got {}", other.data_type()))),
    }
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, self, other)
    }

    pub fn not_eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::NotEq, self, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Lt, self, other)
    }

    pub fn lt_eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::LtEq, self, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Gt, self, other)
    }

    pub fn gt_eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::GtEq, self, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::And, self, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, self, other)
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }

    /// Name of the column this expression produces when projected.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column(name) => name.clone(),
            other => other.to_string(),
        }
    }

    /// Result type against `schema`.
    pub fn data_type(&self, schema: &Schema) -> Result<DataType> {
        self.resolve(schema)?
            .ok_or_else(|| Error::Type(format!("cannot infer a type for '{self}'")))
    }

    /// `None` is an untyped null literal.
    fn resolve(&self, schema: &Schema) -> Result<Option<DataType>> {
        match self {
            Expr::Column(name) => Ok(Some(schema.field_with_name(name)?.data_type.clone())),
            Expr::Literal(Scalar::Struct(_)) => {
                Err(Error::Type("struct literals are not supported".into()))
            }
            Expr::Literal(s) => Ok(s.data_type()),
            Expr::Not(inner) => match inner.resolve(schema)? {
                None | Some(DataType::Boolean) => Ok(Some(DataType::Boolean)),
                Some(other) => Err(Error::Type(format!("'not' expects boolean, got {other}"))),
            },
            Expr::IsNull(inner) => {
                inner.resolve(schema)?;
                Ok(Some(DataType::Boolean))
            }
            Expr::Binary { op, left, right } => {
                if op.arithmetic().is_some() {
                    return match Self::arithmetic_type(left, right, schema)? {
                        Some(dt) if !dt.is_numeric() => Err(Error::Type(format!(
                            "'{}' expects numeric operands, got {dt}",
                            op.symbol()
                        ))),
                        other => Ok(other),
                    };
                }
                let operand = Self::operand_type(left, right, schema)?;
                if op.comparison().is_some() {
                    match operand {
                        Some(DataType::Struct(_)) => {
                            Err(Error::Type("structs cannot be compared".into()))
                        }
                        _ => Ok(Some(DataType::Boolean)),
                    }
                } else {
                    match operand {
                        None | Some(DataType::Boolean) => Ok(Some(DataType::Boolean)),
                        Some(other) => Err(Error::Type(format!(
                            "'{}' expects boolean operands, got {other}",
                            op.symbol()
                        ))),
                    }
                }
            }
        }
    }

    /// Common type of a binary expression's operands. A literal facing a
    /// typed operand must cast to that operand's type.
    fn operand_type(left: &Expr, right: &Expr, schema: &Schema) -> Result<Option<DataType>> {
        let l = left.resolve(schema)?;
        let r = right.resolve(schema)?;
        match (l, r) {
            (None, None) => Ok(None),
            (Some(t), None) | (None, Some(t)) => Ok(Some(t)),
            (Some(a), Some(b)) if a == b => Ok(Some(a)),
            (Some(a), Some(b)) => {
                let (target, literal) = match (left, right) {
                    (_, Expr::Literal(s)) => (a, s),
                    (Expr::Literal(s), _) => (b, s),
                    _ => {
                        return Err(Error::Type(format!(
                            "operands of '{left}' and '{right}' have different types {a} and {b}"
                        )))
                    }
                };
                if !target.is_numeric() {
                    return Err(Error::Type(format!("cannot use {literal} as {target}")));
                }
                literal.cast_to(&target)?;
                Ok(Some(target))
            }
        }
    }

    /// Like `operand_type`, but numeric operands that do not share a type are
    /// widened the way the arithmetic kernels widen them.
    fn arithmetic_type(left: &Expr, right: &Expr, schema: &Schema) -> Result<Option<DataType>> {
        match Self::operand_type(left, right, schema) {
            Ok(t) => Ok(t),
            Err(e) => match (left.resolve(schema)?, right.resolve(schema)?) {
                (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => {
                    Ok(Some(promoted_type(&a, &b)))
                }
                _ => Err(e),
            },
        }
    }

    /// Evaluate against `batch`. Literal-only expressions broadcast to the
    /// batch's row count.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<Array> {
        let data_type = self.data_type(batch.schema())?;
        self.eval(batch)?.into_array(&data_type, batch.num_rows())
    }

    fn eval(&self, batch: &RecordBatch) -> Result<Value> {
        let rows = batch.num_rows();
        match self {
            Expr::Column(name) => Ok(Value::Array(batch.column_by_name(name)?.clone())),
            Expr::Literal(s) => Ok(Value::Scalar(s.clone())),
            Expr::IsNull(inner) => Ok(match inner.eval(batch)? {
                Value::Scalar(s) => Value::Scalar(Scalar::Bool(s.is_null())),
                Value::Array(a) => Value::Array(compare::is_null(&a)?.into()),
            }),
            Expr::Not(inner) => {
                let input = into_boolean(inner.eval(batch)?.into_array(&DataType::Boolean, rows)?)?;
                Ok(Value::Array(compare::not(&input)?.into()))
            }
            Expr::Binary { op, left, right } => {
                let operand = match op.arithmetic() {
                    Some(_) => Self::arithmetic_type(left, right, batch.schema())?,
                    None => Self::operand_type(left, right, batch.schema())?,
                }
                .unwrap_or(DataType::Boolean);
                let lhs = left.eval(batch)?.into_array(&operand, rows)?;
                let rhs = right.eval(batch)?;
                if let Some(aop) = op.arithmetic() {
                    return Ok(Value::Array(arithmetic(aop, &lhs, &rhs.into_datum())?));
                }
                if let Some(cop) = op.comparison() {
                    return Ok(Value::Array(
                        compare::compare(cop, &lhs, &rhs.into_datum())?.into(),
                    ));
                }
                let lhs = into_boolean(lhs)?;
                let rhs = into_boolean(rhs.into_array(&DataType::Boolean, rows)?)?;
                let out = match op {
                    BinaryOp::And => compare::and(&lhs, &rhs)?,
                    _ => compare::or(&lhs, &rhs)?,
                };
                Ok(Value::Array(out.into()))
            }
        }
    }

    /// Parse the predicate form `column op literal`, where `op` is one of
    /// `==`, `=`, `!=`, `<`, `<=`, `>`, `>=`.
    ///
    /// Literals: quoted strings, `true`/`false`, `null`, integers, floats;
    /// any other bare word is a string.
    pub fn parse(text: &str) -> Result<Expr> {
        const OPS: [(&str, BinaryOp); 7] = [
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::NotEq),
            ("<=", BinaryOp::LtEq),
            (">=", BinaryOp::GtEq),
            ("<", BinaryOp::Lt),
            (">", BinaryOp::Gt),
            ("=", BinaryOp::Eq),
        ];
        for (symbol, op) in OPS {
            if let Some(pos) = text.find(symbol) {
                let column = text[..pos].trim();
                let literal = text[pos + symbol.len()..].trim();
                if column.is_empty() {
                    return Err(Error::Parse(format!("missing column in '{text}'")));
                }
                return Ok(Expr::binary(op, col(column), Expr::Literal(parse_literal(literal)?)));
            }
        }
        Err(Error::Parse(format!("unparseable predicate: {text}")))
    }
}

fn parse_literal(text: &str) -> Result<Scalar> {
    if text.is_empty() {
        return Err(Error::Parse("missing literal".into()));
    }
    for quote in ['\'', '"'] {
        if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
            return Ok(Scalar::Str(inner.to_string()));
        }
    }
    match text {
        "true" => return Ok(Scalar::Bool(true)),
        "false" => return Ok(Scalar::Bool(false)),
        "null" => return Ok(Scalar::Null),
        _ => {}
    }
    if let Ok(v) = text.parse::<i64>() {
        return Ok(Scalar::I64(v));
    }
    if let Ok(v) = text.parse::<f64>() {
        return Ok(Scalar::F64(v));
    }
    Ok(Scalar::Str(text.to_string()))
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Subtract, self, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Multiply, self, rhs)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{name}"),
            Expr::Literal(s) => write!(f, "{s}"),
            Expr::Binary { op, left, right } => {
                let side = |e: &Expr| match e {
                    Expr::Binary { .. } => format!("({e})"),
                    _ => e.to_string(),
                };
                write!(f, "{} {} {}", side(left), op.symbol(), side(right))
            }
            Expr::Not(inner) => write!(f, "not {inner}"),
            Expr::IsNull(inner) => write!(f, "{inner} is null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::array::{PrimitiveArray, StringArray};
    use quiver_core::Field;

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter([
            ("v", Array::from(PrimitiveArray::<i32>::from(vec![Some(1), Some(5), None, Some(7)]))),
            ("name", Array::from(StringArray::from(vec!["a", "b", "c", "d"]))),
        ])
        .unwrap()
    }

    #[test]
    fn literal_adopts_column_type() {
        let e = col("v").gt(lit(4i64));
        assert_eq!(e.data_type(batch().schema()).unwrap(), DataType::Boolean);
        let out = e.evaluate(&batch()).unwrap();
        assert_eq!(out.to_string(), "[false, true, null, true]");

        let sum = (col("v") + lit(10i64)).evaluate(&batch()).unwrap();
        assert_eq!(sum.data_type(), DataType::Int32);
        assert_eq!(sum.to_string(), "[11, 15, null, 17]");
    }

    #[test]
    fn binding_errors() {
        let schema = batch().schema().clone();
        assert!(matches!(col("zz").data_type(&schema), Err(Error::NoSuchField(_))));
        assert!(matches!((col("name") + lit(1i64)).data_type(&schema), Err(Error::Type(_))));
        assert!(matches!(col("v").gt(lit(2.5)).data_type(&schema), Err(Error::Type(_))));
        let s = Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Int64, true),
        ]);
        assert!(matches!(col("a").eq(col("b")).data_type(&s), Err(Error::Type(_))));
    }

    #[test]
    fn arithmetic_widens_mixed_numeric_operands() {
        let b = batch();
        let e = col("v") + lit(0.5);
        assert_eq!(e.data_type(b.schema()).unwrap(), DataType::Float64);
        let out = e.evaluate(&b).unwrap();
        assert_eq!(out.data_type(), DataType::Float64);
        assert_eq!(out.to_string(), "[1.5, 5.5, null, 7.5]");

        let s = Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Int64, true),
        ]);
        assert_eq!((col("a") * col("b")).data_type(&s).unwrap(), DataType::Int64);
    }

    #[test]
    fn boolean_combinators_and_literals_broadcast() {
        let e = col("v").gt(lit(2i64)).and(col("name").not_eq(lit("d")));
        assert_eq!(e.evaluate(&batch()).unwrap().to_string(), "[false, true, null, false]");

        let always = lit(true).evaluate(&batch()).unwrap();
        assert_eq!(always.len(), 4);

        let nulls = col("v").is_null().evaluate(&batch()).unwrap();
        assert_eq!(nulls.to_string(), "[false, false, true, false]");
        assert_eq!(
            (!col("v").is_null()).evaluate(&batch()).unwrap().to_string(),
            "[true, true, false, true]"
        );
    }

    #[test]
    fn parse_simple_predicates() {
        assert_eq!(Expr::parse("v > 4").unwrap(), col("v").gt(lit(4i64)));
        assert_eq!(Expr::parse("v<=4").unwrap(), col("v").lt_eq(lit(4i64)));
        assert_eq!(Expr::parse("name == 'Alice'").unwrap(), col("name").eq(lit("Alice")));
        assert_eq!(Expr::parse("name != Bob").unwrap(), col("name").not_eq(lit("Bob")));
        assert_eq!(Expr::parse("x = 2.5").unwrap(), col("x").eq(lit(2.5)));
        assert!(matches!(Expr::parse("just words"), Err(Error::Parse(_))));
        assert!(matches!(Expr::parse("> 3"), Err(Error::Parse(_))));
    }

    #[test]
    fn output_names() {
        assert_eq!(col("v").output_name(), "v");
        assert_eq!((col("v") * lit(2i64)).output_name(), "v * 2");
    }
}
