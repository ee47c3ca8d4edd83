//! Shared data model for the bridge oracle.
//!
//! Every other crate in the workspace speaks in terms of these types: chain
//! identifiers, the chain-family transaction shapes delivered by the indexers,
//! the metadata payload embedded in bridging transactions, the claim batch
//! submitted to the bridge contract and the bridging request status machine.

pub mod block_info;
pub mod bridging_state;
pub mod chains;
pub mod claims;
pub mod metadata;
pub mod serde_helpers;
pub mod txs;

pub use block_info::BridgeClaimsBlockInfo;
pub use bridging_state::{
	BridgingRequestState, BridgingRequestStatus, InvalidTransitionError,
	NewBridgingRequestStateModel,
};
pub use chains::{ChainId, ChainType, ExpiryResolution};
pub use claims::*;
pub use metadata::{
	marshal_metadata, unmarshal_metadata, BaseMetadata, BatchExecutedMetadata, BridgingRequestMetadata,
	BridgingRequestMetadataTransaction, BridgingTxType, MetadataError,
};
pub use txs::*;
