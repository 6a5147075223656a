use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};

use crate::error::Error;

/// Element of the ring of integers modulo 2^31.
///
/// The value always fits in 31 bits, so addition of two elements cannot
/// overflow a `u32` and reduction is a mask instead of a division.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ring31(u32);

impl Ring31 {
    pub const MODULUS: u32 = 1 << 31;
    pub const MASK: u32 = Self::MODULUS - 1;

    /// Construct from a raw word, masking to 31 bits.
    pub const fn new(raw: u32) -> Self {
        Self(raw & Self::MASK)
    }

    /// Raw 31-bit representative in `[0, 2^31)`.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether the element is invertible, i.e. odd.
    pub const fn is_unit(self) -> bool {
        self.0 & 1 == 1
    }

    /// Multiplicative inverse, defined for odd elements only.
    ///
    /// Newton lifting from the seed x = 1, which is correct modulo 2.
    /// Each step `x <- x * (2 - a * x)` doubles the number of correct
    /// low bits, so five steps reach all 31.
    pub fn inverse(self) -> Result<Self, Error> {
        if !self.is_unit() {
            return Err(Error::NotInvertible(self.0));
        }
        let two = Ring31::new(2);
        let mut x = Ring31::one();
        for _ in 0..5 {
            x = x * (two - self * x);
        }
        Ok(x)
    }

    /// Division by an odd element.
    pub fn checked_div(self, rhs: Self) -> Result<Self, Error> {
        Ok(self * rhs.inverse()?)
    }
}

impl From<u32> for Ring31 {
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl From<i32> for Ring31 {
    fn from(v: i32) -> Self {
        Self::new(v as u32)
    }
}

impl Add for Ring31 {
    type Output = Ring31;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.0 + rhs.0)
    }
}

impl Sub for Ring31 {
    type Output = Ring31;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for Ring31 {
    type Output = Ring31;
    fn neg(self) -> Self::Output {
        Self::new(0u32.wrapping_sub(self.0))
    }
}

impl Mul for Ring31 {
    type Output = Ring31;
    fn mul(self, rhs: Self) -> Self::Output {
        Self::new((u64::from(self.0) * u64::from(rhs.0)) as u32)
    }
}

impl AddAssign for Ring31 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Ring31 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Ring31 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Sum for Ring31 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl Zero for Ring31 {
    fn zero() -> Self {
        Self(0)
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl One for Ring31 {
    fn one() -> Self {
        Self(1)
    }
}

impl Distribution<Ring31> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Ring31 {
        Ring31::new(rng.gen())
    }
}

impl fmt::Display for Ring31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Ring31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ring31({})", self.0)
    }
}

/// Uniformly random vector of ring elements.
pub fn random_vector<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Vec<Ring31> {
    (0..dim).map(|_| rng.gen()).collect()
}

/// Component-wise sum of two equal-length vectors.
pub fn add_vectors(lhs: &[Ring31], rhs: &[Ring31]) -> Result<Vec<Ring31>, Error> {
    if lhs.len() != rhs.len() {
        return Err(Error::LengthMismatch {
            expected: lhs.len(),
            found: rhs.len(),
        });
    }
    Ok(lhs.iter().zip(rhs).map(|(&x, &y)| x + y).collect())
}

/// Inner product of two equal-length vectors.
pub fn dot(lhs: &[Ring31], rhs: &[Ring31]) -> Result<Ring31, Error> {
    if lhs.len() != rhs.len() {
        return Err(Error::LengthMismatch {
            expected: lhs.len(),
            found: rhs.len(),
        });
    }
    Ok(lhs.iter().zip(rhs).map(|(&x, &y)| x * y).sum())
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn arithmetic_matches_modular_model() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let a: u32 = rng.gen::<u32>() & Ring31::MASK;
            let b: u32 = rng.gen::<u32>() & Ring31::MASK;
            let m = u64::from(Ring31::MODULUS);
            let (x, y) = (Ring31::new(a), Ring31::new(b));
            assert_eq!(u64::from((x + y).raw()), (u64::from(a) + u64::from(b)) % m);
            assert_eq!(
                u64::from((x - y).raw()),
                (u64::from(a) + m - u64::from(b)) % m
            );
            assert_eq!(u64::from((x * y).raw()), u64::from(a) * u64::from(b) % m);
            assert_eq!(x + (-x), Ring31::zero());
        }
    }

    #[test]
    fn negation_edge_cases() {
        assert_eq!(-Ring31::zero(), Ring31::zero());
        assert_eq!((-Ring31::one()).raw(), Ring31::MASK);
    }

    #[test]
    fn signed_constructor_wraps() {
        assert_eq!(Ring31::from(-1i32).raw(), Ring31::MASK);
        assert_eq!(Ring31::from(-5i32), Ring31::zero() - Ring31::new(5));
    }

    #[test]
    fn odd_elements_invert() {
        let mut rng = StdRng::seed_from_u64(2);
        for a in [1u32, 3, 5, Ring31::MASK, Ring31::MASK - 2] {
            let a = Ring31::new(a);
            assert_eq!(a * a.inverse().unwrap(), Ring31::one());
        }
        for _ in 0..200 {
            let a = Ring31::new(rng.gen::<u32>() | 1);
            assert_eq!(a * a.inverse().unwrap(), Ring31::one());
        }
    }

    #[test]
    fn even_elements_have_no_inverse() {
        for a in [0u32, 2, 4, 1 << 30] {
            assert!(matches!(
                Ring31::new(a).inverse(),
                Err(Error::NotInvertible(_))
            ));
        }
    }

    #[test]
    fn division_by_odd() {
        let a = Ring31::new(123456);
        let d = Ring31::new(7);
        assert_eq!(a.checked_div(d).unwrap() * d, a);
        assert!(a.checked_div(Ring31::new(6)).is_err());
    }

    #[test]
    fn dot_requires_equal_lengths() {
        let a = vec![Ring31::one(); 3];
        let b = vec![Ring31::one(); 4];
        assert!(matches!(
            dot(&a, &b),
            Err(Error::LengthMismatch {
                expected: 3,
                found: 4
            })
        ));
        assert_eq!(dot(&a, &a).unwrap(), Ring31::new(3));
    }
}
