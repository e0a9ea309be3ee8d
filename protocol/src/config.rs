//! # Protocol Configuration & Constants
//!
//! Every magic number of the distribution format lives here. The dump tag
//! and the leaf encoding are part of the wire contract with the on-chain
//! verifier and with every dump published so far: changing them silently
//! produces roots the ledger will not accept.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Distribution Format
// ---------------------------------------------------------------------------

/// Format tag written into every dump. Parsers refuse anything else.
pub const DUMP_FORMAT: &str = "standard-v1";

/// Solidity types of the leaf tuple, in encoding order.
pub const LEAF_ENCODING: [&str; 2] = ["address", "uint256"];

/// Length of an account address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Keccak-256 output length in bytes. Leaves, nodes and roots are all this size.
pub const HASH_LENGTH: usize = 32;

/// ABI word size. Every static ABI value occupies one word.
pub const ABI_WORD_LENGTH: usize = 32;

/// Length of an ABI-encoded `(address, uint256)` leaf.
pub const ENCODED_LEAF_LENGTH: usize = 2 * ABI_WORD_LENGTH;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// BNB Smart Chain testnet. The distribution contract is deployed here.
pub const BSC_TESTNET_CHAIN_ID: u64 = 97;

/// Human-readable name for [`BSC_TESTNET_CHAIN_ID`].
pub const BSC_TESTNET_NAME: &str = "BNB Smart Chain Testnet";

/// Default public RPC endpoint for the testnet.
pub const BSC_TESTNET_RPC_URL: &str = "https://data-seed-prebsc-1-s1.binance.org:8545/";

/// Block explorer base URL, used when rendering transaction links.
pub const BSC_TESTNET_EXPLORER_URL: &str = "https://testnet.bscscan.com";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 9751;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9752;

/// How long the node waits on a single ledger call before giving up.
/// The core never enforces this itself; the node wraps ledger calls with it.
pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Explorer link for a transaction hash on the testnet.
pub fn explorer_tx_url(tx_hash: &str) -> String {
    format!("{}/tx/{}", BSC_TESTNET_EXPLORER_URL, tx_hash)
}

/// Returns a friendly name for a chain ID, mainly for logging.
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        BSC_TESTNET_CHAIN_ID => BSC_TESTNET_NAME.to_string(),
        other => format!("unknown(0x{:x})", other),
    }
}
