//! Project operator: evaluates one expression per output column.

use std::sync::Arc;

use quiver_compute::Expr;
use quiver_core::{Field, RecordBatch, Schema};

use crate::plan::OpPlan;
use crate::traits::{single_input, Budget, OpError, Operator};

#[derive(Debug, Clone)]
pub struct Project {
    pub exprs: Vec<Expr>,
    /// Output names; empty means each expression names itself.
    pub names: Vec<String>,
}

impl Project {
    pub fn new(exprs: Vec<Expr>, names: Vec<String>) -> Self {
        Self { exprs, names }
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema, OpError> {
        if !self.names.is_empty() && self.names.len() != self.exprs.len() {
            return Err(OpError::Plan(format!(
                "project has {} expressions but {} names",
                self.exprs.len(),
                self.names.len()
            )));
        }
        let mut fields = Vec::with_capacity(self.exprs.len());
        for (i, expr) in self.exprs.iter().enumerate() {
            let name = self
                .names
                .get(i)
                .cloned()
                .unwrap_or_else(|| expr.output_name());
            let nullable = match expr {
                Expr::Column(c) => input.field_with_name(c)?.nullable,
                _ => true,
            };
            fields.push(Field::new(name, expr.data_type(input)?, nullable));
        }
        Ok(Schema::new(fields))
    }
}

impl Operator for Project {
    fn name(&self) -> &'static str {
        "project"
    }

    fn plan(&self, input_schemas: &[Schema]) -> Result<OpPlan, OpError> {
        let schema = single_input(self.name(), input_schemas)?;
        Ok(OpPlan::new(self.output_schema(schema)?))
    }

    fn push(&mut self, batch: RecordBatch, _budget: &Budget) -> Result<Vec<RecordBatch>, OpError> {
        if batch.num_rows() == 0 {
            return Ok(Vec::new());
        }
        let schema = Arc::new(self.output_schema(batch.schema())?);
        let columns = self
            .exprs
            .iter()
            .map(|e| e.evaluate(&batch))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vec![RecordBatch::try_new(schema, columns)?])
    }

    fn finish(&mut self, _budget: &Budget) -> Result<Vec<RecordBatch>, OpError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_compute::{col, lit};
    use quiver_core::array::{PrimitiveArray, StringArray};
    use quiver_core::{Array, DataType};
    use quiver_mem::MemoryPool;

    #[test]
    fn columns_follow_expression_order() {
        let budget = MemoryPool::new(1 << 20);
        let batch = RecordBatch::try_from_iter([
            ("a", Array::from(PrimitiveArray::<i32>::from_vec(vec![1, 2]))),
            ("s", Array::from(StringArray::from(vec!["x", "y"]))),
        ])
        .unwrap();
        let mut op = Project::new(vec![col("s"), col("a") * lit(3i64)], vec![]);
        let plan = op.plan(&[batch.schema().as_ref().clone()]).unwrap();
        assert_eq!(plan.output_schema.fields[1].name, "a * 3");
        assert_eq!(plan.output_schema.fields[1].data_type, DataType::Int32);

        let out = op.push(batch, &budget).unwrap();
        assert_eq!(out[0].num_columns(), 2);
        assert_eq!(out[0].column(1).unwrap().to_string(), "[3, 6]");
    }

    #[test]
    fn names_must_match_expressions() {
        let schema = Schema::new(vec![Field::new("a", DataType::Int32, false)]);
        let op = Project::new(vec![col("a")], vec!["x".into(), "y".into()]);
        assert!(matches!(op.plan(&[schema]), Err(OpError::Plan(_))));
    }
}
