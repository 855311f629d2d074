// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter bumped once per session flow transition.
///
/// Labels: `flow` ([`FlowKind::as_str`]) and `outcome` ([`FlowOutcome::as_str`]). A refresh that
/// joins an in-flight rotation is not counted; only the leader records.
pub const SESSION_FLOW_COUNTER: &str = "session_broker_flow_total";

/// Bumps [`SESSION_FLOW_COUNTER`] for `kind`/`outcome`; compiled out without the `metrics`
/// feature.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			SESSION_FLOW_COUNTER,
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}
