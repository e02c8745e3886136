//! Volume element trait for generic voxel values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a volume voxel.
///
/// Loaders cast every on-disk sample type through `f64`, so an element
/// only needs lossy conversions in both directions plus a NaN test.
pub trait VolumeElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Whether this value is a floating point NaN
    fn is_nan(&self) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, falling back to zero when out of range
    fn from_f64(value: f64) -> Self {
        NumCast::from(value).unwrap_or_else(Self::zero)
    }
}

macro_rules! impl_volume_element_int {
    ($t:ty) => {
        impl VolumeElement for $t {
            fn is_nan(&self) -> bool {
                false
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_volume_element_float {
    ($t:ty) => {
        impl VolumeElement for $t {
            fn is_nan(&self) -> bool {
                <$t>::is_nan(*self)
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_volume_element_int!(i8);
impl_volume_element_int!(i16);
impl_volume_element_int!(i32);
impl_volume_element_int!(i64);
impl_volume_element_int!(u8);
impl_volume_element_int!(u16);
impl_volume_element_int!(u32);
impl_volume_element_int!(u64);
impl_volume_element_float!(f32);
impl_volume_element_float!(f64);
