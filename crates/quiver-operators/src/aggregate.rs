//! Aggregate operator: a barrier over grouped aggregation.
//!
//! Partial state grows with the number of groups and is accounted against
//! the plan's memory budget after every batch. Exactly one batch is emitted
//! from `finish`, also when no input arrived.

use quiver_compute::{AggregateSpec, GroupedAggregator};
use quiver_core::{Error, RecordBatch, Schema};
use quiver_mem::Reservation;

use crate::plan::OpPlan;
use crate::traits::{single_input, Budget, OpError, Operator};

pub struct Aggregate {
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
    state: Option<GroupedAggregator>,
    guard: Option<Reservation>,
}

impl Aggregate {
    pub fn new(group_by: Vec<String>, aggregates: Vec<AggregateSpec>) -> Self {
        Self {
            group_by,
            aggregates,
            state: None,
            guard: None,
        }
    }

    fn state_for(&mut self, input: &Schema) -> Result<&mut GroupedAggregator, OpError> {
        if self.state.is_none() {
            self.state = Some(GroupedAggregator::try_new(
                input,
                &self.group_by,
                &self.aggregates,
            )?);
        }
        self.state
            .as_mut()
            .ok_or_else(|| OpError::Exec("aggregate state missing".into()))
    }

    /// Bring the guard in line with the current state size.
    fn account(&mut self, budget: &Budget) -> Result<(), OpError> {
        let needed = self.state.as_ref().map_or(0, GroupedAggregator::state_size);
        if self.guard.is_none() {
            self.guard = budget.try_acquire(0, "aggregate");
        }
        let guard = self.guard.as_mut().ok_or_else(|| {
            Error::ResourceExhausted("aggregate could not reserve memory".into())
        })?;
        guard.resize(needed)?;
        Ok(())
    }
}

impl Operator for Aggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn plan(&self, input_schemas: &[Schema]) -> Result<OpPlan, OpError> {
        let schema = single_input(self.name(), input_schemas)?;
        let shape = GroupedAggregator::try_new(schema, &self.group_by, &self.aggregates)?;
        Ok(OpPlan::new(shape.output_schema().as_ref().clone()).blocking())
    }

    fn open(&mut self, input_schemas: &[Schema]) -> Result<(), OpError> {
        let schema = single_input(self.name(), input_schemas)?;
        self.state = None;
        self.state_for(schema)?;
        Ok(())
    }

    fn push(&mut self, batch: RecordBatch, budget: &Budget) -> Result<Vec<RecordBatch>, OpError> {
        self.state_for(batch.schema())?.update(&batch)?;
        self.account(budget)?;
        Ok(Vec::new())
    }

    fn finish(&mut self, _budget: &Budget) -> Result<Vec<RecordBatch>, OpError> {
        let state = self.state.as_mut().ok_or_else(|| {
            OpError::Exec("aggregate finished without an input schema".into())
        })?;
        let groups = state.num_groups();
        let out = state.finish()?;
        tracing::debug!(groups, "aggregate flushed");
        self.guard = None;
        Ok(vec![out])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_compute::AggregateFunc;
    use quiver_core::array::PrimitiveArray;
    use quiver_core::{Array, Scalar};
    use quiver_mem::MemoryPool;

    fn batch(keys: Vec<i64>, values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_from_iter([
            ("k", Array::from(PrimitiveArray::<i64>::from_vec(keys))),
            ("v", Array::from(PrimitiveArray::<i64>::from_vec(values))),
        ])
        .unwrap()
    }

    #[test]
    fn barrier_emits_once_at_finish() {
        let budget = MemoryPool::new(1 << 20);
        let mut op = Aggregate::new(
            vec!["k".into()],
            vec![AggregateSpec::new(AggregateFunc::Sum, "v", "total")],
        );
        op.open(&[batch(vec![], vec![]).schema().as_ref().clone()]).unwrap();
        assert!(op.push(batch(vec![1, 2], vec![10, 20]), &budget).unwrap().is_empty());
        assert!(op.push(batch(vec![1], vec![5]), &budget).unwrap().is_empty());
        assert!(budget.used_bytes() > 0);

        let out = op.finish(&budget).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].column(0).unwrap().to_string(), "[15, 20]");
        assert_eq!(out[0].column(1).unwrap().to_string(), "[1, 2]");
        assert_eq!(budget.used_bytes(), 0);
    }

    #[test]
    fn no_input_still_emits_a_batch() {
        let budget = MemoryPool::new(1 << 20);
        let mut op = Aggregate::new(vec![], vec![AggregateSpec::new(AggregateFunc::Count, "v", "n")]);
        let schema = batch(vec![], vec![]).schema().as_ref().clone();
        assert!(op.plan(&[schema.clone()]).unwrap().blocking);
        op.open(&[schema]).unwrap();
        let out = op.finish(&budget).unwrap();
        assert_eq!(out[0].num_rows(), 1);
        assert_eq!(out[0].column(0).unwrap().value_at(0).unwrap(), Scalar::I64(0));
    }

    #[test]
    fn state_over_budget_is_resource_exhausted() {
        let budget = MemoryPool::new(16);
        let mut op = Aggregate::new(
            vec!["k".into()],
            vec![AggregateSpec::new(AggregateFunc::Max, "v", "m")],
        );
        let err = op
            .push(batch((0..100).collect(), (0..100).collect()), &budget)
            .unwrap_err();
        assert!(matches!(err, OpError::Core(Error::ResourceExhausted(_))));
    }
}
