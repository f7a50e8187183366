use std::fmt;

use tokio::sync::watch;

/// Current phase of a tagging run, published by the run and polled by callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunPhase {
	Idle,
	Estimating,
	PreparingStorage,
	LoadingQueries,
	Executing { completed: usize, total: usize },
	Aggregating,
	WritingReport,
	CleaningUp,
	Finished,
	Failed,
}
impl RunPhase {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Finished | Self::Failed)
	}
}

impl fmt::Display for RunPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Idle => write!(f, "Idle."),
			Self::Estimating => write!(f, "Estimating hit counts."),
			Self::PreparingStorage => write!(f, "Preparing scratch storage."),
			Self::LoadingQueries => write!(f, "Loading named queries."),
			Self::Executing { completed, total } =>
				write!(f, "Executing queries ({completed}/{total} complete)."),
			Self::Aggregating => write!(f, "Aggregating scores."),
			Self::WritingReport => write!(f, "Writing report."),
			Self::CleaningUp => write!(f, "Cleaning up scratch storage."),
			Self::Finished => write!(f, "Finished."),
			Self::Failed => write!(f, "Failed."),
		}
	}
}

/// Single writer side of the run status.
#[derive(Debug)]
pub(crate) struct StatusPublisher {
	tx: watch::Sender<RunPhase>,
}
impl StatusPublisher {
	pub(crate) fn new() -> Self {
		let (tx, _) = watch::channel(RunPhase::Idle);

		Self { tx }
	}

	pub(crate) fn publish(&self, phase: RunPhase) {
		tracing::debug!(status = %phase, "Run status changed.");

		self.tx.send_replace(phase);
	}

	pub(crate) fn handle(&self) -> StatusHandle {
		StatusHandle { rx: self.tx.subscribe() }
	}
}

/// Read side of the run status. Cheap to clone and safe to poll from any task.
#[derive(Clone, Debug)]
pub struct StatusHandle {
	rx: watch::Receiver<RunPhase>,
}
impl StatusHandle {
	pub fn phase(&self) -> RunPhase {
		self.rx.borrow().clone()
	}

	/// Display string of the current phase.
	pub fn current(&self) -> String {
		self.rx.borrow().to_string()
	}

	/// Waits for the next published phase. Returns `None` once the run is dropped.
	pub async fn changed(&mut self) -> Option<RunPhase> {
		self.rx.changed().await.ok()?;

		Some(self.rx.borrow_and_update().clone())
	}
}
