//! Testing utilities
//!
//! A scripted in-memory wallet for exercising the session and swap workflow
//! without a browser extension or a node.
//!
//! Enable with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! tokenswap-rs = { path = "../tokenswap-rs", features = ["testing"] }
//! ```

pub mod mock_wallet;

pub use mock_wallet::{MockWallet, RecordedRequest, SentTransaction};
