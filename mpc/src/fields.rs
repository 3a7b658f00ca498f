use std::{fmt, marker::PhantomData};

use ff::PrimeField;
use serde::{
    de::{self, DeserializeOwned, SeqAccess, Visitor},
    ser::SerializeTuple,
    Deserializer, Serialize, Serializer,
};

use crate::error::MpcError;

/// Prime field used for MPC computation.
/// All fields shipped with this crate have moduli below 2^128, so canonical values fit in `u128`.
pub trait MpcField: PrimeField + Serialize + DeserializeOwned + Unpin {
    /// Number of bytes needed to hold the modulus.
    const BYTE_LEN: usize = ((Self::NUM_BITS + 7) / 8) as usize;

    /// Field modulus.
    fn modulus() -> u128 {
        (-Self::one()).to_u128() + 1
    }

    /// Canonical representative in `[0, modulus)`.
    fn to_u128(&self) -> u128 {
        self.to_repr()
            .as_ref()
            .iter()
            .take(16)
            .enumerate()
            .fold(0, |acc, (i, &b)| acc | (b as u128) << (8 * i))
    }

    /// Embed unsigned integer, reducing modulo field size.
    fn from_u128(value: u128) -> Self {
        let two_pow_32 = Self::from(1u64 << 32);
        Self::from((value >> 64) as u64) * two_pow_32.square() + Self::from(value as u64)
    }

    /// Embed signed integer. Negative values map to `modulus - |value|`.
    fn from_i128(value: i128) -> Self {
        let abs = Self::from_u128(value.unsigned_abs());
        if value < 0 {
            -abs
        } else {
            abs
        }
    }

    /// Signed representative: values above half the modulus are negative.
    fn to_signed(&self) -> i128 {
        let value = self.to_u128();
        let modulus = Self::modulus();
        if value > modulus / 2 {
            -((modulus - value) as i128)
        } else {
            value as i128
        }
    }

    /// Big-endian magnitude, padded to the modulus byte length.
    fn to_be_bytes(&self) -> Vec<u8> {
        let le = self.to_u128().to_le_bytes();
        le[..Self::BYTE_LEN].iter().rev().copied().collect()
    }

    /// Parse big-endian magnitude. Rejects wrong lengths and non-canonical values.
    fn from_be_bytes(bytes: &[u8]) -> Result<Self, MpcError> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(MpcError::contract(format!(
                "field element must be {} bytes, got {}",
                Self::BYTE_LEN,
                bytes.len()
            )));
        }
        let value = bytes.iter().fold(0u128, |acc, &b| acc << 8 | b as u128);
        if value >= Self::modulus() {
            return Err(MpcError::contract("field element is not reduced"));
        }
        Ok(Self::from_u128(value))
    }
}

/// Serialize field element as a fixed-size tuple of big-endian bytes.
fn serialize_field<T: MpcField, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut tuple = serializer.serialize_tuple(T::BYTE_LEN)?;
    for byte in value.to_be_bytes() {
        tuple.serialize_element(&byte)?;
    }
    tuple.end()
}

/// Deserialize field element written by [`serialize_field`].
fn deserialize_field<'de, T: MpcField, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<T, D::Error> {
    struct FieldVisitor<T>(PhantomData<T>);

    impl<'de, T: MpcField> Visitor<'de> for FieldVisitor<T> {
        type Value = T;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{} big-endian bytes of a field element", T::BYTE_LEN)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<T, A::Error> {
            let mut bytes = Vec::with_capacity(T::BYTE_LEN);
            for i in 0..T::BYTE_LEN {
                let byte = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                bytes.push(byte);
            }
            T::from_be_bytes(&bytes).map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_tuple(T::BYTE_LEN, FieldVisitor(PhantomData))
}

macro_rules! impl_mpc_field {
    ($name:ident) => {
        impl MpcField for $name {}

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serialize_field(self, serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserialize_field(deserializer)
            }
        }
    };
}

mod fp_97 {
    use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

    use ff::{Field, PrimeField};
    use rand::RngCore;
    use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, CtOption};

    const MODULUS: u8 = 97;

    /// Finite field mod 97. Small enough to reason about by hand in tests.
    ///
    /// Written out by hand: 97 = 1 mod 4, which the `ff` derive does not support.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Fp97(u8);

    impl Fp97 {
        fn reduce(value: u32) -> Self {
            Fp97((value % MODULUS as u32) as u8)
        }
    }

    impl From<u64> for Fp97 {
        fn from(value: u64) -> Self {
            Fp97((value % MODULUS as u64) as u8)
        }
    }

    impl ConstantTimeEq for Fp97 {
        fn ct_eq(&self, other: &Self) -> Choice {
            self.0.ct_eq(&other.0)
        }
    }

    impl ConditionallySelectable for Fp97 {
        fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
            Fp97(u8::conditional_select(&a.0, &b.0, choice))
        }
    }

    impl Add for Fp97 {
        type Output = Self;

        fn add(self, rhs: Self) -> Self {
            Self::reduce(self.0 as u32 + rhs.0 as u32)
        }
    }

    impl Sub for Fp97 {
        type Output = Self;

        fn sub(self, rhs: Self) -> Self {
            Self::reduce(self.0 as u32 + MODULUS as u32 - rhs.0 as u32)
        }
    }

    impl Mul for Fp97 {
        type Output = Self;

        fn mul(self, rhs: Self) -> Self {
            Self::reduce(self.0 as u32 * rhs.0 as u32)
        }
    }

    impl Neg for Fp97 {
        type Output = Self;

        fn neg(self) -> Self {
            Self::reduce(MODULUS as u32 - self.0 as u32)
        }
    }

    /// By-reference and assigning forms of the operators above.
    macro_rules! derived_ops {
        ($($op:ident $method:ident $assign:ident $assign_method:ident),*) => {$(
            impl<'a> $op<&'a Fp97> for Fp97 {
                type Output = Fp97;

                fn $method(self, rhs: &'a Fp97) -> Fp97 {
                    $op::$method(self, *rhs)
                }
            }

            impl $assign for Fp97 {
                fn $assign_method(&mut self, rhs: Fp97) {
                    *self = $op::$method(*self, rhs);
                }
            }

            impl<'a> $assign<&'a Fp97> for Fp97 {
                fn $assign_method(&mut self, rhs: &'a Fp97) {
                    *self = $op::$method(*self, *rhs);
                }
            }
        )*};
    }

    derived_ops!(
        Add add AddAssign add_assign,
        Sub sub SubAssign sub_assign,
        Mul mul MulAssign mul_assign
    );

    impl Field for Fp97 {
        fn random(mut rng: impl RngCore) -> Self {
            Self::from(rng.next_u64())
        }

        fn zero() -> Self {
            Fp97(0)
        }

        fn one() -> Self {
            Fp97(1)
        }

        fn is_zero(&self) -> Choice {
            self.0.ct_eq(&0)
        }

        fn square(&self) -> Self {
            *self * *self
        }

        fn double(&self) -> Self {
            *self + *self
        }

        fn invert(&self) -> CtOption<Self> {
            CtOption::new(self.pow_vartime([MODULUS as u64 - 2]), !self.is_zero())
        }

        // Exhaustive search over the whole field.
        fn sqrt(&self) -> CtOption<Self> {
            let root = (0..MODULUS).map(Fp97).find(|r| r.square() == *self);
            CtOption::new(root.unwrap_or_default(), Choice::from(root.is_some() as u8))
        }
    }

    impl PrimeField for Fp97 {
        type Repr = [u8; 1];

        fn from_repr(repr: [u8; 1]) -> CtOption<Self> {
            CtOption::new(Fp97(repr[0]), Choice::from((repr[0] < MODULUS) as u8))
        }

        fn to_repr(&self) -> [u8; 1] {
            [self.0]
        }

        fn is_odd(&self) -> Choice {
            Choice::from(self.0 & 1)
        }

        const NUM_BITS: u32 = 7;
        const CAPACITY: u32 = 6;

        fn multiplicative_generator() -> Self {
            Fp97(5)
        }

        // 97 - 1 = 2^5 * 3
        const S: u32 = 5;

        /// `5^3`, of order 32.
        fn root_of_unity() -> Self {
            Fp97(28)
        }
    }
}

mod mersenne_61 {
    use ff::PrimeField;

    /// Finite field mod 2^61-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "2305843009213693951"]
    #[PrimeFieldGenerator = "37"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne61([u64; 1]);
}

mod mersenne_127 {
    use ff::PrimeField;

    /// Finite field mod 2^127-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "170141183460469231731687303715884105727"]
    #[PrimeFieldGenerator = "43"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne127([u64; 2]);
}

pub use fp_97::Fp97;
pub use mersenne_127::{Mersenne127, Mersenne127Repr};
pub use mersenne_61::{Mersenne61, Mersenne61Repr};

impl_mpc_field!(Fp97);
impl_mpc_field!(Mersenne61);
impl_mpc_field!(Mersenne127);

#[cfg(test)]
mod tests {
    use ff::Field;

    use super::*;

    #[test]
    fn test_modulus() {
        assert_eq!(Fp97::modulus(), 97);
        assert_eq!(Mersenne61::modulus(), (1 << 61) - 1);
        assert_eq!(Mersenne127::modulus(), (1 << 127) - 1);
        assert_eq!(Fp97::BYTE_LEN, 1);
        assert_eq!(Mersenne61::BYTE_LEN, 8);
        assert_eq!(Mersenne127::BYTE_LEN, 16);
    }

    #[test]
    fn test_reduction() {
        assert_eq!(Fp97::from_u128(97 * 5 + 3).to_u128(), 3);
        assert_eq!(Fp97::from_u128(u128::MAX).to_u128(), u128::MAX % 97);
        assert_eq!(
            Mersenne127::from_u128(u128::MAX).to_u128(),
            u128::MAX % Mersenne127::modulus()
        );
        assert_eq!((Fp97::from(90) + Fp97::from(10)).to_u128(), 3);
        assert_eq!((Fp97::from(3) - Fp97::from(5)).to_u128(), 95);
    }

    #[test]
    fn test_signed_representation() {
        assert_eq!(Fp97::from_i128(-1).to_u128(), 96);
        assert_eq!(Fp97::from(96).to_signed(), -1);
        assert_eq!(Fp97::from(48).to_signed(), 48);
        assert_eq!(Fp97::from(49).to_signed(), -48);
        assert_eq!(Mersenne61::from_i128(-123456789).to_signed(), -123456789);
        assert_eq!(Mersenne127::from_i128(i64::MIN as i128).to_signed(), i64::MIN as i128);
        assert_eq!(Mersenne127::zero().to_signed(), 0);
    }

    #[test]
    fn test_fp97_arithmetic() {
        for x in 1..97u64 {
            let x = Fp97::from(x);
            assert_eq!(x * x.invert().unwrap(), Fp97::one());
        }
        assert!(bool::from(Fp97::zero().invert().is_none()));

        let root = Fp97::from(9).sqrt().unwrap();
        assert_eq!(root.square(), Fp97::from(9));
        // 5 generates the multiplicative group, so it is not a square
        assert!(bool::from(Fp97::from(5).sqrt().is_none()));

        let root_of_unity = Fp97::root_of_unity();
        assert_eq!(root_of_unity.pow_vartime([32]), Fp97::one());
        assert_ne!(root_of_unity.pow_vartime([16]), Fp97::one());
        assert_eq!(Fp97::multiplicative_generator().pow_vartime([3]), root_of_unity);

        assert_eq!(-Fp97::zero(), Fp97::zero());
        assert_eq!(Fp97::from(50).double(), Fp97::from(3));
        assert!(bool::from(Fp97::from(3).is_odd()));
        assert!(bool::from(Fp97::from_repr([97]).is_none()));
        assert_eq!(Fp97::from_repr([96]).unwrap(), -Fp97::one());
    }

    #[test]
    fn test_byte_codec() {
        assert_eq!(Fp97::from(96).to_be_bytes(), vec![96]);
        assert_eq!(
            Mersenne61::from(0x0102).to_be_bytes(),
            vec![0, 0, 0, 0, 0, 0, 1, 2]
        );
        assert_eq!(Fp97::from_be_bytes(&[42]).unwrap(), Fp97::from(42));
        assert!(Fp97::from_be_bytes(&[97]).is_err());
        assert!(Fp97::from_be_bytes(&[1, 2]).is_err());

        let x = Mersenne127::from_i128(-77);
        assert_eq!(Mersenne127::from_be_bytes(&x.to_be_bytes()).unwrap(), x);
    }

    #[test]
    fn test_serde_layout() {
        let bytes = bincode::serialize(&Mersenne61::from(7)).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 7]);
        let x: Mersenne61 = bincode::deserialize(&bytes).unwrap();
        assert_eq!(x, Mersenne61::from(7));
        assert!(bincode::deserialize::<Fp97>(&[200]).is_err());
    }
}
