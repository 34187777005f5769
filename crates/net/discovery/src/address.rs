//! Canonical address forms used for set comparisons.

use libp2p::{Multiaddr, PeerId};
use std::{borrow::Cow, collections::HashSet};

/// A stable, order-independent byte form of an identifier or address.
///
/// Two values are the same address iff their canonical bytes are equal. Any type
/// taking part in an intersection check must provide one.
pub trait CanonicalAddress {
    fn canonical_bytes(&self) -> Cow<'_, [u8]>;
}

impl CanonicalAddress for Multiaddr {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_ref())
    }
}

impl CanonicalAddress for PeerId {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_bytes())
    }
}

/// Whether any address in `left` also appears in `right`.
pub fn intersects<A: CanonicalAddress>(left: &[A], right: &[A]) -> bool {
    if left.is_empty() || right.is_empty() {
        return false;
    }
    let seen: HashSet<Cow<'_, [u8]>> = left.iter().map(CanonicalAddress::canonical_bytes).collect();
    right.iter().any(|addr| seen.contains(&addr.canonical_bytes()))
}
