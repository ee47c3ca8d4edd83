//! Oracle runtime.
//!
//! Per chain family a [`TxsProcessor`] turns stored transactions into claim
//! batches and submits them to the bridge, backing off through
//! [`TxsProcessorSettings`] when submissions fail, while an
//! [`ExpectedTxsFetcher`] pulls the batches the bridge expects to see
//! executed. A [`ConfirmedBlocksSubmitter`] per chain reports the blocks
//! whose transactions are all processed. [`OracleBuilder`] wires everything
//! into an [`Oracle`].

pub mod blocks_submitter;
pub mod builder;
pub mod error;
pub mod fetcher;
pub mod lifecycle;
pub mod oracle;
pub mod settings;
pub mod txs_processor;

pub use blocks_submitter::ConfirmedBlocksSubmitter;
pub use builder::OracleBuilder;
pub use error::CoreError;
pub use fetcher::ExpectedTxsFetcher;
pub use lifecycle::{LifecycleManager, LifecycleState};
pub use oracle::{BatchEvent, BatchEventKind, ObservedTxs, Oracle};
pub use settings::TxsProcessorSettings;
pub use txs_processor::TxsProcessor;
