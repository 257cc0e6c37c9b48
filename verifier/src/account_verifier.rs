//! The account block verifier.

use std::sync::Arc;

use crate::error::VerifierError;
use crate::interfaces::{ChainReader, ConsensusReader, Generator, Signer};
use crate::stat::{AccountPendingTask, SnapshotPendingTask, VerifyResult, VerifyStat};
use trellis_crypto::{check_pow_nonce, hash256, pubkey_to_address, verify_signature};
use trellis_ledger::{AccountBlock, AccountType, SnapshotBlock, VmAccountBlock};
use trellis_types::{MAX_BIG_INT_LEN, TIME_OUT_HEIGHT};

/// Seconds a block timestamp may run ahead of the snapshot head.
const TIME_NOT_YET_SECS: u64 = 3600;

/// Classifies account blocks against predecessor, counterpart and snapshot
/// references.
///
/// Verification never mutates state; a `Pending` verdict carries the tasks
/// the caller registers for retry once the awaited hash arrives.
pub struct AccountVerifier {
    chain: Arc<dyn ChainReader>,
    consensus: Arc<dyn ConsensusReader>,
    signer: Arc<dyn Signer>,
    generator: Arc<dyn Generator>,
}

impl AccountVerifier {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        consensus: Arc<dyn ConsensusReader>,
        signer: Arc<dyn Signer>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            chain,
            consensus,
            signer,
            generator,
        }
    }

    /// Verify a block's referential dependencies.
    ///
    /// The verdict is the conjunction of three independent sub-verifications
    /// (self, from, snapshot) combined with the `Fail`-dominant lattice of
    /// [`VerifyStat::result`].
    pub fn verify_referred(&self, block: &AccountBlock) -> (VerifyResult, VerifyStat) {
        let mut stat = VerifyStat::default();

        self.verify_self(block, &mut stat);
        self.verify_from(block, &mut stat);
        self.verify_snapshot(block, &mut stat);

        (stat.result(), stat)
    }

    /// Run the generator/VM over the block and return the emitted result
    /// blocks.
    pub fn verify_for_vm(&self, block: &AccountBlock) -> Result<Vec<VmAccountBlock>, VerifierError> {
        let blocks = self.generator.generate(block, self.signer.as_ref())?;
        if blocks.is_empty() {
            return Err(VerifierError::GenerateFailed(
                "generator returned no blocks".into(),
            ));
        }
        Ok(blocks)
    }

    /// Cheap relay gate: timestamp-not-yet plus data validity only.
    pub fn verify_for_p2p(&self, block: &AccountBlock) -> bool {
        if !self.verify_time_not_yet(block) {
            return false;
        }
        if let Err(err) = self.verify_data_validity(block) {
            tracing::debug!(hash = %block.hash, %err, "p2p gate rejected block");
            return false;
        }
        true
    }

    // ── Self ────────────────────────────────────────────────────────────

    fn verify_self(&self, block: &AccountBlock, stat: &mut VerifyStat) {
        let producer = match self.verify_producer_legality(block) {
            Ok(result) => result,
            Err(err) => {
                stat.referred_self = VerifyResult::Fail;
                stat.err_msg.push_str(&err.to_string());
                return;
            }
        };
        let prev = match self.verify_self_prev(block, &mut stat.account_tasks) {
            Ok(result) => result,
            Err(err) => {
                stat.referred_self = VerifyResult::Fail;
                stat.err_msg.push_str(&err.to_string());
                return;
            }
        };

        if producer == VerifyResult::Success && prev == VerifyResult::Success {
            stat.referred_self = VerifyResult::Success;
        } else {
            stat.account_tasks.push(AccountPendingTask {
                addr: Some(block.account_address),
                hash: block.hash,
            });
            stat.referred_self = VerifyResult::Pending;
        }
    }

    /// Producer legality: contract receives go through the consensus
    /// producer check; a general account's public key must authorise its
    /// address. Sends from contracts and from not-yet-existing accounts
    /// pass unconditionally.
    fn verify_producer_legality(
        &self,
        block: &AccountBlock,
    ) -> Result<VerifyResult, VerifierError> {
        let code = self.chain.account_type(&block.account_address)?;
        if code == AccountType::Contract && block.is_receive() {
            if let Err(err) = self.consensus.verify_account_producer(block) {
                tracing::error!(hash = %block.hash, %err, "producer check failed");
                return Err(VerifierError::ProducerIllegal);
            }
        }
        if code == AccountType::General
            && pubkey_to_address(&block.public_key) != block.account_address
        {
            return Err(VerifierError::Integrity(
                "public key does not match account address".into(),
            ));
        }
        Ok(VerifyResult::Success)
    }

    fn verify_self_prev(
        &self,
        block: &AccountBlock,
        tasks: &mut Vec<AccountPendingTask>,
    ) -> Result<VerifyResult, VerifierError> {
        let latest = self.chain.get_latest_account_block(&block.account_address)?;
        match latest {
            None => {
                if block.height == 1 {
                    if !block.prev_hash.is_zero() {
                        return Err(VerifierError::Integrity(
                            "first block must have zero prev hash".into(),
                        ));
                    }
                    return Ok(VerifyResult::Success);
                }
                tasks.push(AccountPendingTask {
                    addr: None,
                    hash: block.prev_hash,
                });
                Ok(VerifyResult::Pending)
            }
            Some(latest) => {
                if !self.verify_snapshot_of_referred(block, &latest) {
                    return Err(VerifierError::Integrity(
                        "referred block's snapshot is newer than this block's".into(),
                    ));
                }
                if block.prev_hash == latest.hash && block.height == latest.height + 1 {
                    Ok(VerifyResult::Success)
                } else if block.height > latest.height + 1 {
                    tasks.push(AccountPendingTask {
                        addr: None,
                        hash: block.prev_hash,
                    });
                    Ok(VerifyResult::Pending)
                } else {
                    Err(VerifierError::Integrity(
                        "prev hash or height is invalid".into(),
                    ))
                }
            }
        }
    }

    // ── From ────────────────────────────────────────────────────────────

    fn verify_from(&self, block: &AccountBlock, stat: &mut VerifyStat) {
        if !block.is_receive() {
            // Sends have no counterpart to wait for.
            stat.referred_from = VerifyResult::Success;
            return;
        }

        match self.chain.get_account_block_by_hash(&block.from_block_hash) {
            Err(err) => {
                tracing::error!(hash = %block.from_block_hash, %err, "send lookup failed");
                stat.referred_from = VerifyResult::Fail;
                stat.err_msg.push_str("send block lookup failed");
            }
            Ok(None) => {
                stat.account_tasks.push(AccountPendingTask {
                    addr: None,
                    hash: block.from_block_hash,
                });
                stat.referred_from = VerifyResult::Pending;
            }
            Ok(Some(from_block)) => {
                if self.verify_snapshot_of_referred(block, &from_block) {
                    stat.referred_from = VerifyResult::Success;
                } else {
                    stat.referred_from = VerifyResult::Fail;
                    stat.err_msg
                        .push_str("send block's snapshot is newer than the receive's");
                }
            }
        }
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    fn verify_snapshot(&self, block: &AccountBlock, stat: &mut VerifyStat) {
        match self.chain.get_snapshot_block_by_hash(&block.snapshot_hash) {
            Err(err) => {
                tracing::error!(hash = %block.snapshot_hash, %err, "snapshot lookup failed");
                stat.referred_snapshot = VerifyResult::Fail;
                stat.err_msg.push_str("snapshot block lookup failed");
            }
            Ok(None) => {
                stat.snapshot_task = Some(SnapshotPendingTask {
                    hash: block.snapshot_hash,
                });
                stat.referred_snapshot = VerifyResult::Pending;
            }
            Ok(Some(snapshot)) => {
                if self.verify_time_out(&snapshot) {
                    stat.referred_snapshot = VerifyResult::Success;
                } else {
                    stat.referred_snapshot = VerifyResult::Fail;
                    stat.err_msg.push_str("snapshot reference timed out");
                }
            }
        }
    }

    // ── Data validity ───────────────────────────────────────────────────

    /// Structural validity of the block itself: amount bounds, timestamp
    /// presence, hash, PoW nonce and signature.
    pub fn verify_data_validity(&self, block: &AccountBlock) -> Result<(), VerifierError> {
        if block.amount_or_zero().bits() > MAX_BIG_INT_LEN {
            return Err(VerifierError::AmountOutOfBounds("amount"));
        }
        if block.fee_or_zero().bits() > MAX_BIG_INT_LEN {
            return Err(VerifierError::AmountOutOfBounds("fee"));
        }
        if block.timestamp.is_none() {
            return Err(VerifierError::Integrity("timestamp is missing".into()));
        }
        if !self.verify_hash(block) {
            return Err(VerifierError::HashInvalid);
        }
        if !self.verify_nonce(block) {
            return Err(VerifierError::NonceInvalid);
        }
        if !self.verify_signature(block)? {
            return Err(VerifierError::SignatureInvalid);
        }
        Ok(())
    }

    /// Whether the stored hash matches the recomputed one.
    pub fn verify_hash(&self, block: &AccountBlock) -> bool {
        if block.hash.is_zero() {
            return false;
        }
        block.compute_hash() == block.hash
    }

    /// Check the PoW nonce when one is present. Blocks without a nonce pay
    /// quota instead, so they pass.
    pub fn verify_nonce(&self, block: &AccountBlock) -> bool {
        match &block.nonce {
            None => true,
            Some(nonce) => {
                let data = hash256(
                    block.account_address.as_bytes(),
                    block.prev_hash.as_bytes(),
                );
                check_pow_nonce(block.difficulty, nonce, &data)
            }
        }
    }

    /// Signature rule: a send from an account that does not exist yet, or
    /// from a contract, must carry neither signature nor public key (its
    /// authority is the consensus producer). Every other block must carry a
    /// valid signature over its hash.
    pub fn verify_signature(&self, block: &AccountBlock) -> Result<bool, VerifierError> {
        let code = self.chain.account_type(&block.account_address)?;

        if block.is_send()
            && (code == AccountType::NotExist || code == AccountType::Contract)
        {
            return Ok(block.signature.is_empty() && block.public_key.is_empty());
        }

        if block.signature.is_empty() || block.public_key.is_empty() {
            return Ok(false);
        }
        Ok(verify_signature(
            &block.public_key,
            block.hash.as_bytes(),
            &block.signature,
        ))
    }

    // ── Time windows ────────────────────────────────────────────────────

    /// Whether the referenced snapshot is still within the acceptance
    /// window of [`TIME_OUT_HEIGHT`] behind the snapshot head.
    pub fn verify_time_out(&self, referred: &SnapshotBlock) -> bool {
        let current = match self.chain.get_latest_snapshot_block() {
            Ok(current) => current,
            Err(err) => {
                tracing::error!(%err, "snapshot head lookup failed");
                return false;
            }
        };
        current.height <= referred.height + TIME_OUT_HEIGHT
    }

    /// Whether the block's timestamp is within one hour of the snapshot
    /// head's timestamp — blocks from the future are not relayed yet.
    pub fn verify_time_not_yet(&self, block: &AccountBlock) -> bool {
        let Some(timestamp) = block.timestamp else {
            return false;
        };
        let current = match self.chain.get_latest_snapshot_block() {
            Ok(current) => current,
            Err(err) => {
                tracing::error!(%err, "snapshot head lookup failed");
                return false;
            }
        };
        timestamp < current.timestamp.plus_secs(TIME_NOT_YET_SECS)
    }

    /// Monotone snapshot reference: the referred block's snapshot height
    /// must not exceed this block's snapshot height.
    fn verify_snapshot_of_referred(
        &self,
        this_block: &AccountBlock,
        referred: &AccountBlock,
    ) -> bool {
        let this_snapshot = self
            .chain
            .get_snapshot_block_by_hash(&this_block.snapshot_hash)
            .ok()
            .flatten();
        let referred_snapshot = self
            .chain
            .get_snapshot_block_by_hash(&referred.snapshot_hash)
            .ok()
            .flatten();
        match (this_snapshot, referred_snapshot) {
            (Some(this), Some(referred)) => referred.height <= this.height,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_crypto::{derive_address, sign_message, KeyPair};
    use trellis_ledger::BlockKind;
    use trellis_store::MemStore;
    use trellis_types::{Address, Amount, Gid, Hash, Timestamp, TokenId};

    struct AllowAll;
    impl ConsensusReader for AllowAll {
        fn verify_account_producer(&self, _block: &AccountBlock) -> Result<(), VerifierError> {
            Ok(())
        }
    }

    struct NoSigner;
    impl Signer for NoSigner {
        fn sign(&self, _addr: &Address, _data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), VerifierError> {
            Err(VerifierError::SignatureInvalid)
        }
    }

    struct EchoGenerator;
    impl Generator for EchoGenerator {
        fn generate(
            &self,
            block: &AccountBlock,
            _signer: &dyn Signer,
        ) -> Result<Vec<VmAccountBlock>, VerifierError> {
            Ok(vec![VmAccountBlock::plain(block.clone())])
        }
    }

    struct EmptyGenerator;
    impl Generator for EmptyGenerator {
        fn generate(
            &self,
            _block: &AccountBlock,
            _signer: &dyn Signer,
        ) -> Result<Vec<VmAccountBlock>, VerifierError> {
            Ok(Vec::new())
        }
    }

    fn addr(tag: u8) -> Address {
        Address::from_parts([tag; 20], 0)
    }

    fn genesis_snapshot() -> SnapshotBlock {
        SnapshotBlock {
            height: 1,
            hash: Hash::new([0xA0; 32]),
            prev_hash: Hash::ZERO,
            timestamp: Timestamp::new(1_000),
        }
    }

    fn seeded_store() -> Arc<MemStore> {
        let store = Arc::new(MemStore::new());
        store.put_snapshot_block(genesis_snapshot());
        store
    }

    fn verifier(store: &Arc<MemStore>) -> AccountVerifier {
        AccountVerifier::new(
            store.clone(),
            Arc::new(AllowAll),
            Arc::new(NoSigner),
            Arc::new(EchoGenerator),
        )
    }

    fn block_template(account: Address, height: u64, snapshot_hash: Hash) -> AccountBlock {
        let mut block = AccountBlock {
            kind: BlockKind::SendCall,
            account_address: account,
            to_address: addr(0xB0),
            height,
            prev_hash: Hash::ZERO,
            from_block_hash: Hash::ZERO,
            snapshot_hash,
            amount: Some(Amount::from_u64(1)),
            fee: None,
            token_id: TokenId::new([1u8; 10]),
            data: Vec::new(),
            nonce: None,
            difficulty: None,
            quota_used: 0,
            timestamp: Some(Timestamp::new(1_100)),
            signature: Vec::new(),
            public_key: Vec::new(),
            hash: Hash::ZERO,
        };
        block.hash = block.compute_hash();
        block
    }

    // ── verify_referred ─────────────────────────────────────────────────

    #[test]
    fn genesis_block_succeeds() {
        let store = seeded_store();
        let verifier = verifier(&store);

        let block = block_template(addr(1), 1, genesis_snapshot().hash);
        let (result, stat) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Success, "{}", stat.err_msg());
    }

    #[test]
    fn genesis_block_with_nonzero_prev_fails() {
        let store = seeded_store();
        let verifier = verifier(&store);

        let mut block = block_template(addr(1), 1, genesis_snapshot().hash);
        block.prev_hash = Hash::new([9u8; 32]);
        block.hash = block.compute_hash();

        let (result, _) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Fail);
    }

    #[test]
    fn missing_predecessor_is_pending_on_prev_hash() {
        let store = seeded_store();
        let verifier = verifier(&store);

        // The verifier checks a general account's key once the chain exists.
        let kp = KeyPair::from_seed(&[1u8; 32]);
        let account = derive_address(&kp.public);

        // The store has height 3 for this account.
        let mut latest = block_template(account, 3, genesis_snapshot().hash);
        latest.prev_hash = Hash::new([2u8; 32]);
        latest.hash = latest.compute_hash();
        store.put_account_block(latest);

        // Submitting height 5 leaves a gap at height 4.
        let mut block = block_template(account, 5, genesis_snapshot().hash);
        block.prev_hash = Hash::new([4u8; 32]);
        block.public_key = kp.public.to_vec();
        block.hash = block.compute_hash();

        let (result, stat) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Pending, "{}", stat.err_msg());
        let (account_tasks, _) = stat.pending_tasks();
        assert!(account_tasks
            .iter()
            .any(|t| t.addr.is_none() && t.hash == block.prev_hash));
    }

    #[test]
    fn wrong_prev_hash_at_next_height_fails() {
        let store = seeded_store();
        let verifier = verifier(&store);

        let kp = KeyPair::from_seed(&[2u8; 32]);
        let account = derive_address(&kp.public);

        let latest = block_template(account, 1, genesis_snapshot().hash);
        store.put_account_block(latest.clone());

        let mut block = block_template(account, 2, genesis_snapshot().hash);
        block.prev_hash = Hash::new([0xAB; 32]); // not latest.hash
        block.public_key = kp.public.to_vec();
        block.hash = block.compute_hash();

        let (result, _) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Fail);
    }

    #[test]
    fn receive_with_missing_send_is_pending() {
        let store = seeded_store();
        let verifier = verifier(&store);

        let mut block = block_template(addr(3), 1, genesis_snapshot().hash);
        block.kind = BlockKind::Receive;
        block.from_block_hash = Hash::new([0x55; 32]);
        block.hash = block.compute_hash();

        let (result, stat) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Pending);
        let (account_tasks, _) = stat.pending_tasks();
        assert!(account_tasks
            .iter()
            .any(|t| t.addr.is_none() && t.hash == block.from_block_hash));
    }

    #[test]
    fn receive_of_present_send_succeeds() {
        let store = seeded_store();
        let verifier = verifier(&store);

        let send = block_template(addr(4), 1, genesis_snapshot().hash);
        store.put_account_block(send.clone());

        let mut block = block_template(addr(5), 1, genesis_snapshot().hash);
        block.kind = BlockKind::Receive;
        block.from_block_hash = send.hash;
        block.hash = block.compute_hash();

        let (result, stat) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Success, "{}", stat.err_msg());
    }

    #[test]
    fn receive_with_newer_send_snapshot_fails() {
        let store = seeded_store();
        store.put_snapshot_block(SnapshotBlock {
            height: 2,
            hash: Hash::new([0xC2; 32]),
            prev_hash: genesis_snapshot().hash,
            timestamp: Timestamp::new(2_000),
        });
        let verifier = verifier(&store);

        // The send references snapshot height 2...
        let send = block_template(addr(4), 1, Hash::new([0xC2; 32]));
        store.put_account_block(send.clone());

        // ...but the receive references height 1. Monotonicity is violated.
        let mut block = block_template(addr(5), 1, genesis_snapshot().hash);
        block.kind = BlockKind::Receive;
        block.from_block_hash = send.hash;
        block.hash = block.compute_hash();

        let (result, _) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Fail);
    }

    #[test]
    fn missing_snapshot_is_pending() {
        let store = seeded_store();
        let verifier = verifier(&store);

        let block = block_template(addr(6), 1, Hash::new([0xDD; 32]));
        let (result, stat) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Pending);
        let (_, snapshot_task) = stat.pending_tasks();
        assert_eq!(snapshot_task.unwrap().hash, Hash::new([0xDD; 32]));
    }

    #[test]
    fn timed_out_snapshot_fails() {
        let store = seeded_store();
        store.put_snapshot_block(SnapshotBlock {
            height: 2 + TIME_OUT_HEIGHT,
            hash: Hash::new([0xEE; 32]),
            prev_hash: Hash::ZERO,
            timestamp: Timestamp::new(9_000_000),
        });
        let verifier = verifier(&store);

        // References genesis (height 1), head is now past the window.
        let block = block_template(addr(7), 1, genesis_snapshot().hash);
        let (result, _) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Fail);
    }

    #[test]
    fn verifier_is_monotone_as_store_gains_blocks() {
        let store = seeded_store();
        let verifier = verifier(&store);

        let send = block_template(addr(8), 1, genesis_snapshot().hash);
        let mut receive = block_template(addr(9), 1, genesis_snapshot().hash);
        receive.kind = BlockKind::Receive;
        receive.from_block_hash = send.hash;
        receive.hash = receive.compute_hash();

        let (first, _) = verifier.verify_referred(&receive);
        assert_eq!(first, VerifyResult::Pending);

        store.put_account_block(send);
        let (second, _) = verifier.verify_referred(&receive);
        assert_eq!(second, VerifyResult::Success);

        // Gaining more unrelated blocks never degrades the verdict.
        store.put_account_block(block_template(addr(10), 1, genesis_snapshot().hash));
        let (third, _) = verifier.verify_referred(&receive);
        assert_eq!(third, VerifyResult::Success);
    }

    // ── Data validity and the p2p gate ──────────────────────────────────

    fn signed_block(seed: u8, store: &Arc<MemStore>) -> AccountBlock {
        let kp = KeyPair::from_seed(&[seed; 32]);
        let account = derive_address(&kp.public);
        // Signature rule: sends from existing general accounts sign.
        let opener = block_template(account, 1, genesis_snapshot().hash);
        store.put_account_block(opener.clone());

        let mut block = block_template(account, 2, genesis_snapshot().hash);
        block.prev_hash = opener.hash;
        block.public_key = kp.public.to_vec();
        block.hash = block.compute_hash();
        block.signature = sign_message(block.hash.as_bytes(), &kp);
        block
    }

    #[test]
    fn data_validity_accepts_signed_block() {
        let store = seeded_store();
        let verifier = verifier(&store);
        let block = signed_block(11, &store);
        verifier.verify_data_validity(&block).unwrap();
        assert!(verifier.verify_for_p2p(&block));
    }

    #[test]
    fn data_validity_rejects_tampered_hash() {
        let store = seeded_store();
        let verifier = verifier(&store);
        let mut block = signed_block(12, &store);
        block.hash = Hash::new([0x99; 32]);
        assert!(matches!(
            verifier.verify_data_validity(&block),
            Err(VerifierError::HashInvalid)
        ));
    }

    #[test]
    fn data_validity_rejects_missing_timestamp() {
        let store = seeded_store();
        let verifier = verifier(&store);
        let mut block = signed_block(13, &store);
        block.timestamp = None;
        assert!(verifier.verify_data_validity(&block).is_err());
    }

    #[test]
    fn data_validity_rejects_bad_signature() {
        let store = seeded_store();
        let verifier = verifier(&store);
        let mut block = signed_block(14, &store);
        block.signature = vec![0u8; 64];
        assert!(matches!(
            verifier.verify_data_validity(&block),
            Err(VerifierError::SignatureInvalid)
        ));
    }

    #[test]
    fn unsigned_send_from_fresh_account_is_valid() {
        let store = seeded_store();
        let verifier = verifier(&store);

        // No chain for this account: the send may omit signature + key.
        let block = block_template(addr(15), 1, genesis_snapshot().hash);
        verifier.verify_data_validity(&block).unwrap();

        // But carrying only one of the two is not allowed.
        let mut half_signed = block_template(addr(15), 1, genesis_snapshot().hash);
        half_signed.public_key = vec![1u8; 32];
        half_signed.hash = half_signed.compute_hash();
        assert!(verifier.verify_data_validity(&half_signed).is_err());
    }

    #[test]
    fn future_block_fails_p2p_gate() {
        let store = seeded_store();
        let verifier = verifier(&store);
        let mut block = signed_block(16, &store);
        // Snapshot head timestamp is 1_000; beyond one hour is "not yet".
        block.timestamp = Some(Timestamp::new(1_000 + TIME_NOT_YET_SECS + 1));
        block.hash = block.compute_hash();
        let kp = KeyPair::from_seed(&[16u8; 32]);
        block.signature = sign_message(block.hash.as_bytes(), &kp);
        assert!(!verifier.verify_for_p2p(&block));
    }

    // ── verify_for_vm ───────────────────────────────────────────────────

    #[test]
    fn vm_verification_returns_generated_blocks() {
        let store = seeded_store();
        let verifier = verifier(&store);
        let block = block_template(addr(17), 1, genesis_snapshot().hash);
        let blocks = verifier.verify_for_vm(&block).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block.hash, block.hash);
    }

    #[test]
    fn vm_verification_fails_on_empty_generation() {
        let store = seeded_store();
        let verifier = AccountVerifier::new(
            store.clone(),
            Arc::new(AllowAll),
            Arc::new(NoSigner),
            Arc::new(EmptyGenerator),
        );
        let block = block_template(addr(18), 1, genesis_snapshot().hash);
        assert!(verifier.verify_for_vm(&block).is_err());
    }

    #[test]
    fn contract_receive_consults_producer_check() {
        struct DenyAll;
        impl ConsensusReader for DenyAll {
            fn verify_account_producer(
                &self,
                _block: &AccountBlock,
            ) -> Result<(), VerifierError> {
                Err(VerifierError::ProducerIllegal)
            }
        }

        let store = seeded_store();
        let contract = Address::from_parts([0xC0; 20], 1);
        store.register_contract(Gid::new([1u8; 10]), contract);

        let verifier = AccountVerifier::new(
            store.clone(),
            Arc::new(DenyAll),
            Arc::new(NoSigner),
            Arc::new(EchoGenerator),
        );

        let send = block_template(addr(19), 1, genesis_snapshot().hash);
        store.put_account_block(send.clone());

        let mut block = block_template(contract, 1, genesis_snapshot().hash);
        block.kind = BlockKind::Receive;
        block.from_block_hash = send.hash;
        block.hash = block.compute_hash();

        let (result, _) = verifier.verify_referred(&block);
        assert_eq!(result, VerifyResult::Fail);
    }
}
