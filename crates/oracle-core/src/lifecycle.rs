// oracle-core/src/lifecycle.rs

use crate::error::CoreError;
use std::fmt;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Initializing,
	Running,
	Stopping,
	Stopped,
	Failed,
}

impl LifecycleState {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Uninitialized => "Uninitialized",
			Self::Initializing => "Initializing",
			Self::Running => "Running",
			Self::Stopping => "Stopping",
			Self::Stopped => "Stopped",
			Self::Failed => "Failed",
		}
	}

	fn can_transition_to(self, to: LifecycleState) -> bool {
		use LifecycleState::*;

		matches!(
			(self, to),
			(Uninitialized, Initializing)
				| (Initializing, Running)
				| (Running, Stopping)
				| (Stopping, Stopped)
				| (Uninitialized | Initializing | Running | Stopping, Failed)
		)
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Tracks the oracle's run state and fans the shutdown signal out to the
/// background loops.
pub struct LifecycleManager {
	state: RwLock<LifecycleState>,
	shutdown_tx: broadcast::Sender<()>,
}

impl LifecycleManager {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(16);

		Self {
			state: RwLock::new(LifecycleState::Uninitialized),
			shutdown_tx,
		}
	}

	pub async fn get_state(&self) -> LifecycleState {
		*self.state.read().await
	}

	async fn set_state(&self, new_state: LifecycleState) -> Result<(), CoreError> {
		let mut state = self.state.write().await;
		let old_state = *state;

		if !old_state.can_transition_to(new_state) {
			return Err(CoreError::Lifecycle(format!(
				"Invalid state transition from {} to {}",
				old_state, new_state
			)));
		}

		*state = new_state;
		info!("Lifecycle state changed: {} -> {}", old_state, new_state);

		Ok(())
	}

	pub async fn initialize(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Initializing).await
	}

	pub async fn start(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Running).await
	}

	pub async fn fail(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Failed).await
	}

	/// Moves to `Stopping` and signals every subscriber. The caller finishes
	/// with [`Self::stopped`] once the loops have exited.
	pub async fn shutdown(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Stopping).await?;
		// No receivers just means nothing was spawned.
		let _ = self.shutdown_tx.send(());
		Ok(())
	}

	pub async fn stopped(&self) -> Result<(), CoreError> {
		self.set_state(LifecycleState::Stopped).await
	}

	/// Receivers created after [`Self::shutdown`] never see the signal, so
	/// subscribe before spawning the task that waits on it.
	pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
		self.shutdown_tx.subscribe()
	}

	pub async fn is_running(&self) -> bool {
		*self.state.read().await == LifecycleState::Running
	}

	pub async fn is_stopped(&self) -> bool {
		matches!(
			*self.state.read().await,
			LifecycleState::Stopped | LifecycleState::Failed
		)
	}
}

impl Default for LifecycleManager {
	fn default() -> Self {
		Self::new()
	}
}
