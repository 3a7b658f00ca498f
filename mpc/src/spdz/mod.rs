mod engine;
pub use engine::{SpdzMessage, SpdzSuite, DEFAULT_MAC_CHECK_THRESHOLD};

mod fake_dealer;
pub use fake_dealer::FakeSpdzDealer;

mod mac_check;

mod precomp_dealer;
pub use precomp_dealer::{
    generate_precomputed, PrecomputeParams, PrecomputedSpdzData, PrecomputedSpdzDealer,
};

mod share;
pub use share::SpdzShare;

mod store;
pub use store::OpenedValueStore;

use crate::{error::MpcError, MpcDealer};

/// Sharing of a random input mask. Only the party the mask is meant for learns its plaintext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputMask<S, T> {
    pub share: S,
    pub plain: Option<T>,
}

/// Dealer of precomputed parameters for SPDZ protocol.
pub trait SpdzDealer: MpcDealer {
    /// Raw sharing of random authentication key.
    fn authentication_key_share(&self) -> Self::Field;

    /// Random sharing of a random value whose plaintext is known to party `toward`.
    /// Every party must request masks for the same parties in the same order.
    fn next_input_mask(
        &mut self,
        toward: usize,
    ) -> Result<InputMask<Self::Share, Self::Field>, MpcError>;
}
