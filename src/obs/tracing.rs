// self
use crate::{_prelude::*, obs::GovernorOp};

/// A span builder used around governor operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation.
	pub fn new(op: GovernorOp) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!("lease_governor.op", op = op.as_str());

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = op;

			Self {}
		}
	}

	/// Enters the span for the duration of the returned guard.
	pub fn entered(self) -> OpSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OpSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OpSpanGuard {}
		}
	}
}

/// RAII guard returned by [`OpSpan::entered`].
pub struct OpSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for OpSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OpSpanGuard(..)")
	}
}

/// Logs a denial at `warn` level when the `tracing` feature is enabled.
pub fn warn_denied(actor_id: &str, action: &str, reason: &str, retry_after_ms: u64) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(actor_id, action, reason, retry_after_ms, "acquire denied");
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (actor_id, action, reason, retry_after_ms);
	}
}

/// Logs a free-form advisory at `warn` level when the `tracing` feature is enabled.
pub fn warn_message(message: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(message);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}
