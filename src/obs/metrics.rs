// self
use crate::obs::{LeaseOp, OpOutcome};

/// Counter incremented once per broker operation outcome.
pub const OP_COUNTER: &str = "lease_broker_op_total";

/// Bumps [`OP_COUNTER`] labelled by `op` and `outcome`; a no-op without the `metrics` feature.
pub fn record_op_outcome(op: LeaseOp, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(OP_COUNTER, "op" => op.as_str(), "outcome" => outcome.as_str()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (op, outcome);
}
