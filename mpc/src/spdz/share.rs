use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::{error::MpcError, fields::MpcField, MpcShare};

/// Value share in SPDZ protocol: an additive share of the value and of its MAC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpdzShare<T> {
    pub(super) value: T,
    pub(super) mac: T,
}

impl<T: MpcField> SpdzShare<T> {
    pub fn new(value: T, mac: T) -> Self {
        Self { value, mac }
    }

    /// Additive share of the value.
    pub fn value(&self) -> T {
        self.value
    }

    /// Additive share of the MAC `alpha * x`.
    pub fn mac(&self) -> T {
        self.mac
    }

    /// Sharing of a public value. Party 0 holds the value, every party holds its part of the MAC.
    pub fn from_plain(x: T, key_share: T, party_id: usize) -> Self {
        Self {
            value: if party_id == 0 { x } else { T::zero() },
            mac: x * key_share,
        }
    }

    /// Add a public constant.
    pub fn add_public(self, c: T, key_share: T, party_id: usize) -> Self {
        self + Self::from_plain(c, key_share, party_id)
    }

    /// Value share followed by MAC share, both big-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.value.to_be_bytes();
        bytes.extend(self.mac.to_be_bytes());
        bytes
    }

    /// Parse encoding produced by [`SpdzShare::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MpcError> {
        if bytes.len() != 2 * T::BYTE_LEN {
            return Err(MpcError::contract(format!(
                "share must be {} bytes, got {}",
                2 * T::BYTE_LEN,
                bytes.len()
            )));
        }
        let (value, mac) = bytes.split_at(T::BYTE_LEN);
        Ok(Self {
            value: T::from_be_bytes(value)?,
            mac: T::from_be_bytes(mac)?,
        })
    }
}

impl<T: MpcField> MpcShare for SpdzShare<T> {
    type Field = T;

    fn zero() -> Self {
        SpdzShare {
            value: T::zero(),
            mac: T::zero(),
        }
    }

    fn double(&self) -> Self {
        SpdzShare {
            value: self.value.double(),
            mac: self.mac.double(),
        }
    }
}

impl<T: MpcField> Add for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn add(self, rhs: Self) -> Self::Output {
        SpdzShare {
            value: self.value + rhs.value,
            mac: self.mac + rhs.mac,
        }
    }
}

impl<T: MpcField> AddAssign for SpdzShare<T> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: MpcField> Sub for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        SpdzShare {
            value: self.value - rhs.value,
            mac: self.mac - rhs.mac,
        }
    }
}

impl<T: MpcField> Neg for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn neg(self) -> Self::Output {
        SpdzShare {
            value: -self.value,
            mac: -self.mac,
        }
    }
}

impl<T: MpcField> Mul<T> for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn mul(self, rhs: T) -> Self::Output {
        SpdzShare {
            value: self.value * rhs,
            mac: self.mac * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use ff::Field;
    use proptest::prelude::*;

    use super::*;
    use crate::fields::{Fp97, Mersenne61};

    /// Split `x` into two authenticated shares under key `alpha = k0 + k1`.
    fn split(x: u64, r: u64, k0: u64, k1: u64, m: u64) -> [SpdzShare<Mersenne61>; 2] {
        let (x, r, k0, k1, m) = (
            Mersenne61::from(x),
            Mersenne61::from(r),
            Mersenne61::from(k0),
            Mersenne61::from(k1),
            Mersenne61::from(m),
        );
        let mac = x * (k0 + k1);
        [
            SpdzShare::new(r, m),
            SpdzShare::new(x - r, mac - m),
        ]
    }

    fn reconstruct(shares: &[SpdzShare<Mersenne61>; 2]) -> (Mersenne61, Mersenne61) {
        (
            shares[0].value + shares[1].value,
            shares[0].mac + shares[1].mac,
        )
    }

    proptest! {
        #[test]
        fn linear_operations_keep_macs_valid(
            x in any::<u64>(), y in any::<u64>(), c in any::<u64>(),
            rx in any::<u64>(), ry in any::<u64>(), mx in any::<u64>(), my in any::<u64>(),
            k0 in any::<u64>(), k1 in any::<u64>(),
        ) {
            let alpha = Mersenne61::from(k0) + Mersenne61::from(k1);
            let keys = [Mersenne61::from(k0), Mersenne61::from(k1)];
            let a = split(x, rx, k0, k1, mx);
            let b = split(y, ry, k0, k1, my);
            let c = Mersenne61::from(c);

            let sum = [a[0] + b[0], a[1] + b[1]];
            let (value, mac) = reconstruct(&sum);
            prop_assert_eq!(value, Mersenne61::from(x) + Mersenne61::from(y));
            prop_assert_eq!(mac, alpha * value);

            let diff = [a[0] - b[0], a[1] - b[1]];
            let (value, mac) = reconstruct(&diff);
            prop_assert_eq!(mac, alpha * value);

            let scaled = [a[0] * c, a[1] * c];
            let (value, mac) = reconstruct(&scaled);
            prop_assert_eq!(value, Mersenne61::from(x) * c);
            prop_assert_eq!(mac, alpha * value);

            let shifted = [
                a[0].add_public(c, keys[0], 0),
                a[1].add_public(c, keys[1], 1),
            ];
            let (value, mac) = reconstruct(&shifted);
            prop_assert_eq!(value, Mersenne61::from(x) + c);
            prop_assert_eq!(mac, alpha * value);
        }
    }

    #[test]
    fn test_from_plain() {
        let x = Fp97::from(11);
        let zero = SpdzShare::from_plain(x, Fp97::from(3), 1);
        assert_eq!(zero.value(), Fp97::zero());
        assert_eq!(zero.mac(), Fp97::from(33));
        assert_eq!(SpdzShare::from_plain(x, Fp97::from(3), 0).value(), x);
    }

    #[test]
    fn test_byte_layout() {
        let share = SpdzShare::new(Fp97::from(5), Fp97::from(96));
        assert_eq!(share.to_bytes(), vec![5, 96]);
        assert_eq!(SpdzShare::<Fp97>::from_bytes(&[5, 96]).unwrap(), share);
        assert!(SpdzShare::<Fp97>::from_bytes(&[5]).is_err());
        assert!(SpdzShare::<Fp97>::from_bytes(&[5, 200]).is_err());
    }
}
