//! JSON over HTTP bridge client.
//!
//! `POST {endpoint}/claims` submits a batch, `GET {endpoint}/chains/{chain_id}/expected-txs`
//! lists expected transactions and `POST {endpoint}/chains/{chain_id}/confirmed-blocks`
//! reports processed blocks.

use crate::{BridgeError, BridgeInterface, RetryPolicy, SubmitOpts};
use async_trait::async_trait;
use oracle_chains::ConfirmedBlock;
use oracle_config::BridgeConfig;
use oracle_types::{BridgeClaims, ChainId, ExpectedTx};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitClaimsRequest {
	pub claims: BridgeClaims,
	pub gas_limit_multiplier: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitConfirmedBlocksRequest {
	pub blocks: Vec<ConfirmedBlock>,
}

pub struct HttpBridge {
	client: reqwest::Client,
	endpoint: String,
	retry: RetryPolicy,
}

impl HttpBridge {
	pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()
			.map_err(|e| BridgeError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			client,
			endpoint: config.endpoint.trim_end_matches('/').to_string(),
			retry: RetryPolicy::new(config.max_retries),
		})
	}

	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BridgeError> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let body = response.text().await.unwrap_or_default();
		Err(BridgeError::Status {
			status: status.as_u16(),
			body,
		})
	}
}

#[async_trait]
impl BridgeInterface for HttpBridge {
	async fn submit_claims(&self, claims: &BridgeClaims, opts: SubmitOpts) -> Result<(), BridgeError> {
		let url = format!("{}/claims", self.endpoint);
		let request = SubmitClaimsRequest {
			claims: claims.clone(),
			gas_limit_multiplier: opts.gas_limit_multiplier,
		};

		debug!("Submitting claims to {}: {}", url, claims);

		self.retry
			.run("Submit claims", || async {
				let response = self
					.client
					.post(&url)
					.json(&request)
					.send()
					.await
					.map_err(|e| BridgeError::Transport(e.to_string()))?;

				Self::check_status(response).await.map(|_| ())
			})
			.await?;

		info!(
			claims = %claims,
			gas_limit_multiplier = opts.gas_limit_multiplier,
			"Claims submitted"
		);

		Ok(())
	}

	async fn get_expected_txs(&self, chain_id: &ChainId) -> Result<Vec<ExpectedTx>, BridgeError> {
		let url = format!("{}/chains/{}/expected-txs", self.endpoint, chain_id);

		self.retry
			.run("Fetch expected txs", || async {
				let response = self
					.client
					.get(&url)
					.send()
					.await
					.map_err(|e| BridgeError::Transport(e.to_string()))?;

				Self::check_status(response)
					.await?
					.json::<Vec<ExpectedTx>>()
					.await
					.map_err(|e| BridgeError::Decode(e.to_string()))
			})
			.await
	}

	async fn submit_confirmed_blocks(
		&self,
		chain_id: &ChainId,
		blocks: &[ConfirmedBlock],
	) -> Result<(), BridgeError> {
		let url = format!("{}/chains/{}/confirmed-blocks", self.endpoint, chain_id);
		let request = SubmitConfirmedBlocksRequest {
			blocks: blocks.to_vec(),
		};

		self.retry
			.run("Submit confirmed blocks", || async {
				let response = self
					.client
					.post(&url)
					.json(&request)
					.send()
					.await
					.map_err(|e| BridgeError::Transport(e.to_string()))?;

				Self::check_status(response).await.map(|_| ())
			})
			.await?;

		debug!(chain_id = %chain_id, count = blocks.len(), "Confirmed blocks submitted");
		Ok(())
	}
}
