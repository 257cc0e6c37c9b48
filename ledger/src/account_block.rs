//! Account block — one record on a single account's chain.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use trellis_crypto::blake2b_256;
use trellis_types::{Address, Amount, Gid, Hash, Timestamp, TokenId};

/// The operation an account block represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Call a contract or transfer to a general account.
    SendCall,
    /// Create a contract (the call data opens with the group id).
    SendCreate,
    /// Receive a linked send.
    Receive,
    /// Receive a linked send whose execution failed.
    ReceiveError,
}

impl BlockKind {
    pub fn is_send(&self) -> bool {
        matches!(self, Self::SendCall | Self::SendCreate)
    }

    pub fn is_receive(&self) -> bool {
        matches!(self, Self::Receive | Self::ReceiveError)
    }
}

/// How an account is known to the persisted chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    General,
    Contract,
    NotExist,
}

/// A block on an account chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountBlock {
    /// The operation this block performs.
    pub kind: BlockKind,

    /// The account this block belongs to.
    pub account_address: Address,

    /// Recipient of a send. Meaningless on receives.
    pub to_address: Address,

    /// Position in the account's chain, starting at 1.
    pub height: u64,

    /// Hash of the previous block on this chain (zero iff `height == 1`).
    pub prev_hash: Hash,

    /// For receives: the hash of the send being consumed.
    pub from_block_hash: Hash,

    /// The snapshot block this block is ordered against.
    pub snapshot_hash: Hash,

    /// Transferred amount. Absent is read as zero.
    pub amount: Option<Amount>,

    /// Fee paid to the protocol. Absent is read as zero.
    pub fee: Option<Amount>,

    /// The token being transferred.
    pub token_id: TokenId,

    /// Call data / contract-creation payload.
    pub data: Vec<u8>,

    /// Proof-of-work nonce, present when work substitutes for quota.
    pub nonce: Option<[u8; 8]>,

    /// Target difficulty for the nonce.
    pub difficulty: Option<U256>,

    /// Quota consumed by this block.
    pub quota_used: u64,

    /// Block creation time.
    pub timestamp: Option<Timestamp>,

    /// Signature over the block hash. Empty for sends from accounts that do
    /// not exist yet and for sends from contracts.
    pub signature: Vec<u8>,

    /// The signing public key. Empty under the same rule as `signature`.
    pub public_key: Vec<u8>,

    /// The computed hash of this block.
    pub hash: Hash,
}

impl AccountBlock {
    pub fn is_send(&self) -> bool {
        self.kind.is_send()
    }

    pub fn is_receive(&self) -> bool {
        self.kind.is_receive()
    }

    /// Transferred amount with absent read as zero.
    pub fn amount_or_zero(&self) -> Amount {
        self.amount.unwrap_or(Amount::ZERO)
    }

    /// Fee with absent read as zero.
    pub fn fee_or_zero(&self) -> Amount {
        self.fee.unwrap_or(Amount::ZERO)
    }

    /// The contract group created by a `SendCreate`, read from the call data.
    pub fn created_gid(&self) -> Option<Gid> {
        if self.kind != BlockKind::SendCreate {
            return None;
        }
        Gid::from_create_data(&self.data)
    }

    /// Compute the hash of this block from its contents.
    ///
    /// Serializes all consensus-relevant fields in canonical order, then
    /// hashes with Blake2b-256. `signature`, `public_key` and `hash` itself
    /// are excluded.
    pub fn compute_hash(&self) -> Hash {
        // Canonical order:
        // 0. kind (u8 discriminant)
        // 1. account_address (21 bytes)
        // 2. to_address (21 bytes)
        // 3. height (8 bytes, big-endian)
        // 4. prev_hash (32 bytes)
        // 5. from_block_hash (32 bytes)
        // 6. snapshot_hash (32 bytes)
        // 7. token_id (10 bytes)
        // 8. amount (32 bytes, big-endian, absent = zero)
        // 9. fee (32 bytes, big-endian, absent = zero)
        // 10. data
        // 11. quota_used (8 bytes, big-endian)
        // 12. nonce (8 bytes, only if present)
        // 13. difficulty (32 bytes, only if present)
        // 14. timestamp (8 bytes, big-endian, absent = zero)
        let mut buffer = Vec::with_capacity(256 + self.data.len());

        let kind_byte = match self.kind {
            BlockKind::SendCall => 1u8,
            BlockKind::SendCreate => 2,
            BlockKind::Receive => 3,
            BlockKind::ReceiveError => 4,
        };
        buffer.push(kind_byte);
        buffer.extend_from_slice(self.account_address.as_bytes());
        buffer.extend_from_slice(self.to_address.as_bytes());
        buffer.extend_from_slice(&self.height.to_be_bytes());
        buffer.extend_from_slice(self.prev_hash.as_bytes());
        buffer.extend_from_slice(self.from_block_hash.as_bytes());
        buffer.extend_from_slice(self.snapshot_hash.as_bytes());
        buffer.extend_from_slice(self.token_id.as_bytes());
        buffer.extend_from_slice(&self.amount_or_zero().to_be_bytes());
        buffer.extend_from_slice(&self.fee_or_zero().to_be_bytes());
        buffer.extend_from_slice(&self.data);
        buffer.extend_from_slice(&self.quota_used.to_be_bytes());
        if let Some(nonce) = &self.nonce {
            buffer.extend_from_slice(nonce);
        }
        if let Some(difficulty) = &self.difficulty {
            let mut d = [0u8; 32];
            difficulty.to_big_endian(&mut d);
            buffer.extend_from_slice(&d);
        }
        let ts = self.timestamp.map(|t| t.as_secs()).unwrap_or(0);
        buffer.extend_from_slice(&ts.to_be_bytes());

        Hash::new(blake2b_256(&buffer))
    }
}

/// An account block together with the side effects the VM produced while
/// generating it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmAccountBlock {
    pub block: AccountBlock,
    /// `(group, contract address)` pairs registered by a `SendCreate`.
    pub created_contracts: Vec<(Gid, Address)>,
}

impl VmAccountBlock {
    /// Wrap a block that produced no side effects.
    pub fn plain(block: AccountBlock) -> Self {
        Self {
            block,
            created_contracts: Vec::new(),
        }
    }
}
