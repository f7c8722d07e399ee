//! Filter operator: keeps the rows where a boolean predicate holds.
//!
//! Null predicate results drop the row. Batches left empty are not emitted.

use quiver_compute::{filter_record_batch, Expr};
use quiver_core::{DataType, Error, RecordBatch, Schema};

use crate::plan::OpPlan;
use crate::traits::{single_input, Budget, OpError, Operator};

#[derive(Debug, Clone)]
pub struct Filter {
    pub predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    /// Build from the textual form `"column op literal"`, e.g. `"age > 18"`.
    pub fn parse(text: &str) -> Result<Self, OpError> {
        Ok(Self::new(Expr::parse(text)?))
    }
}

impl Operator for Filter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn plan(&self, input_schemas: &[Schema]) -> Result<OpPlan, OpError> {
        let schema = single_input(self.name(), input_schemas)?;
        match self.predicate.data_type(schema)? {
            DataType::Boolean => Ok(OpPlan::new(schema.clone())),
            other => Err(OpError::Plan(format!(
                "filter predicate '{}' must be boolean, got {other}",
                self.predicate
            ))),
        }
    }

    fn push(&mut self, batch: RecordBatch, _budget: &Budget) -> Result<Vec<RecordBatch>, OpError> {
        let mask = self.predicate.evaluate(&batch)?;
        let mask = mask.as_boolean().ok_or_else(|| {
            Error::Type(format!("filter predicate produced {}", mask.data_type()))
        })?;
        let kept = filter_record_batch(&batch, mask)?;
        if kept.num_rows() == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![kept])
    }

    fn finish(&mut self, _budget: &Budget) -> Result<Vec<RecordBatch>, OpError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_compute::{col, lit};
    use quiver_core::array::PrimitiveArray;
    use quiver_core::{Array, Field};
    use quiver_mem::MemoryPool;

    fn batch(values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_from_iter([("v", Array::from(PrimitiveArray::<i64>::from_vec(values)))])
            .unwrap()
    }

    #[test]
    fn filter_drops_empty_batches() {
        let budget = MemoryPool::new(1 << 20);
        let mut op = Filter::new(col("v").gt(lit(4i64)));
        let out = op.push(batch(vec![1, 2, 5, 6]), &budget).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].column(0).unwrap().to_string(), "[5, 6]");
        assert!(op.push(batch(vec![1, 2]), &budget).unwrap().is_empty());
        assert!(op.finish(&budget).unwrap().is_empty());
    }

    #[test]
    fn plan_rejects_non_boolean_and_unknown_columns() {
        let schema = Schema::new(vec![Field::new("v", DataType::Int64, false)]);
        let plan = Filter::parse("v >= 3").unwrap().plan(&[schema.clone()]).unwrap();
        assert_eq!(plan.output_schema, schema);
        assert!(!plan.blocking);

        let err = Filter::new(col("v") + lit(1i64)).plan(&[schema.clone()]).unwrap_err();
        assert!(matches!(err, OpError::Plan(_)));
        let err = Filter::new(col("w").eq(lit(1i64))).plan(&[schema]).unwrap_err();
        assert!(matches!(err, OpError::Core(Error::NoSuchField(_))));
    }
}
