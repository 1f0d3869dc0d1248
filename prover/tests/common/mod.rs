#![allow(dead_code)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use umbra_prover::WithdrawRequest;
use umbra_shielded::{AccountKeys, Commitment, CommitmentRandomness, FieldElement, commitment};

pub const TREE_LEVELS: usize = 8;

/// A recipient account holding one commitment inside a small ledger
pub struct TestFixture {
    pub rng: StdRng,
    pub keys: AccountKeys,
    pub commitment: Commitment,
    pub leaves: Vec<FieldElement>,
    pub index: usize,
}

impl TestFixture {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let keys = AccountKeys::random(&mut rng);
        let commitment = commitment(
            &keys.verify_public_key,
            &keys.enc_public_key,
            FieldElement::from(250_000u64),
            CommitmentRandomness::default(),
            &mut rng,
        )
        .expect("commitment");

        let mut leaves: Vec<FieldElement> = (1..=5u64).map(FieldElement::from).collect();
        leaves.push(commitment.commitment_hash);
        leaves.push(FieldElement::from(99u64));

        Self {
            rng,
            keys,
            commitment,
            leaves,
            index: 5,
        }
    }

    pub fn request(&self) -> WithdrawRequest<'_> {
        WithdrawRequest {
            pk_verify: &self.keys.verify_public_key,
            sk_verify: &self.keys.verify_secret_key,
            pk_enc: &self.keys.enc_public_key,
            sk_enc: &self.keys.enc_secret_key,
            amount: self.commitment.amount,
            commitment_hash: self.commitment.commitment_hash,
            encrypted_note: &self.commitment.encrypted_note,
            tree_leaves: &self.leaves,
            tree_index: self.index,
            tree_levels: TREE_LEVELS,
            zero_element: None,
            recipient: None,
        }
    }
}
