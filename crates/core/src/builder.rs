use std::sync::Arc;

use flame_cat_protocol::ValueFormatter;
use log::debug;
use thiserror::Error;

use crate::model::{CallTree, Frame, NodeId, Profile};

#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("timestamp {timestamp} is earlier than previous sample at {previous}")]
    TimestampRegression { previous: f64, timestamp: f64 },
    #[error("timestamp is not a finite number: {0}")]
    NonFiniteTimestamp(f64),
    #[error("sample weight must be finite and non-negative: {0}")]
    InvalidWeight(f64),
}

/// Aggregates an ordered stream of full-stack samples into a call tree.
///
/// Timestamped samples are diffed against the previously open stack: the
/// interval between two samples is charged to the stack that was open during
/// it, then only the frames past the common prefix are closed and reopened.
/// Consecutive identical stacks therefore keep accumulating onto the same
/// nodes instead of creating siblings.
#[derive(Debug)]
pub struct StackSampleBuilder {
    name: String,
    value_formatter: ValueFormatter,
    tree: CallTree,
    /// Open node chain of the previous timestamped sample, root first.
    open: Vec<NodeId>,
    first_timestamp: Option<f64>,
    last_timestamp: Option<f64>,
    weight_sum: f64,
    sample_count: usize,
}

impl StackSampleBuilder {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            value_formatter: ValueFormatter::default(),
            tree: CallTree::new(),
            open: vec![CallTree::ROOT],
            first_timestamp: None,
            last_timestamp: None,
            weight_sum: 0.0,
            sample_count: 0,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_value_formatter(&mut self, formatter: ValueFormatter) {
        self.value_formatter = formatter;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of samples accepted so far, in either mode.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Append the full root-to-leaf stack active at `timestamp`.
    ///
    /// Timestamps must not decrease; a rejected sample leaves the builder
    /// untouched.
    pub fn append_sample_with_timestamp(
        &mut self,
        stack: &[Arc<Frame>],
        timestamp: f64,
    ) -> Result<(), BuildError> {
        if !timestamp.is_finite() {
            return Err(BuildError::NonFiniteTimestamp(timestamp));
        }

        match self.last_timestamp {
            Some(previous) if timestamp < previous => {
                return Err(BuildError::TimestampRegression {
                    previous,
                    timestamp,
                });
            }
            Some(previous) => self.charge_open_stack(timestamp - previous),
            None => self.first_timestamp = Some(timestamp),
        }

        let common = self.common_prefix_len(stack);
        self.open.truncate(common + 1);
        for frame in &stack[common..] {
            let parent = self.innermost_open();
            let child = self.tree.child_or_insert(parent, frame);
            self.open.push(child);
        }

        self.last_timestamp = Some(timestamp);
        self.sample_count += 1;
        Ok(())
    }

    /// Attribute `weight` directly to `stack`, independent of timestamps.
    pub fn append_sample_with_weight(
        &mut self,
        stack: &[Arc<Frame>],
        weight: f64,
    ) -> Result<(), BuildError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(BuildError::InvalidWeight(weight));
        }

        let mut node = CallTree::ROOT;
        self.tree.add_total(node, weight);
        for frame in stack {
            node = self.tree.child_or_insert(node, frame);
            self.tree.add_total(node, weight);
        }
        self.tree.add_self(node, weight);

        self.weight_sum += weight;
        self.sample_count += 1;
        Ok(())
    }

    /// Finish the profile. Nothing is charged past the last timestamp.
    pub fn build(self) -> Profile {
        let span = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        let total_weight = span + self.weight_sum;
        debug!(
            "built profile {:?}: {} samples, {} nodes, total weight {}",
            self.name,
            self.sample_count,
            self.tree.len(),
            total_weight
        );
        Profile::new(self.name, self.value_formatter, total_weight, self.tree)
    }

    fn innermost_open(&self) -> NodeId {
        self.open.last().copied().unwrap_or(CallTree::ROOT)
    }

    /// Charge `elapsed` to every open node as total weight and to the
    /// innermost one as self weight.
    fn charge_open_stack(&mut self, elapsed: f64) {
        if elapsed == 0.0 {
            return;
        }
        for &id in &self.open {
            self.tree.add_total(id, elapsed);
        }
        let innermost = self.innermost_open();
        self.tree.add_self(innermost, elapsed);
    }

    /// Depth of the longest shared root-to-leaf prefix, compared by frame key.
    fn common_prefix_len(&self, stack: &[Arc<Frame>]) -> usize {
        self.open[1..]
            .iter()
            .zip(stack)
            .take_while(|&(&id, frame)| {
                self.tree
                    .node(id)
                    .and_then(|node| node.key())
                    .is_some_and(|key| key == frame.key)
            })
            .count()
    }
}

impl Default for StackSampleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
