//! Generational identifiers (slotmap-style) for the node and property arenas.
//!
//! All IDs pack a `u64` as `index (low 32 bits) | generation (high 32 bits)`.
//! Index `0` is reserved as the nil value. The owning arena bumps the
//! generation whenever a slot is reused so that a stale ID held by a link,
//! a script closure, or a deserialized file can never silently resolve to
//! the wrong live object.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Defines a generational ID newtype over `u64`.
macro_rules! define_generational_id {
    ($type_name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $type_name(pub u64);

        impl $type_name {
            #[inline]
            pub const fn nil() -> Self {
                Self(0)
            }

            #[inline]
            pub const fn index(self) -> u32 {
                (self.0 & 0xFFFF_FFFF) as u32
            }

            #[inline]
            pub const fn generation(self) -> u32 {
                (self.0 >> 32) as u32
            }

            #[inline]
            pub const fn from_parts(index: u32, generation: u32) -> Self {
                Self((index as u64) | ((generation as u64) << 32))
            }

            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            #[inline]
            pub const fn from_u64(value: u64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn is_nil(self) -> bool {
                self.0 == 0
            }
        }

        impl Default for $type_name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl fmt::Debug for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!(stringify!($type_name), "({}:{})"),
                    self.index(),
                    self.generation()
                )
            }
        }

        impl fmt::Display for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", self.index(), self.generation())
            }
        }
    };
}

define_generational_id!(
    NodeId,
    "Stable identifier for a node in the engine's node arena. Assigned monotonically and survives serialization round-trips so links can target it by value."
);
define_generational_id!(
    PropertyId,
    "Stable identifier for a single property (slot) inside the global property arena."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_zero_and_recognized() {
        let nil = NodeId::nil();
        assert!(nil.is_nil());
        assert_eq!(nil.index(), 0);
        assert_eq!(nil.generation(), 0);
        assert_eq!(NodeId::default(), nil);
    }

    #[test]
    fn parts_round_trip_through_u64() {
        let cases: &[(u32, u32)] = &[
            (0, 0),
            (1, 0),
            (0, 1),
            (5, 2),
            (12345, 77),
            (u32::MAX, 0),
            (0, u32::MAX),
            (u32::MAX, u32::MAX),
        ];
        for &(index, generation) in cases {
            let id = PropertyId::from_parts(index, generation);
            let packed = id.as_u64();
            let unpacked = PropertyId::from_u64(packed);
            assert_eq!(unpacked, id);
            assert_eq!(unpacked.index(), index);
            assert_eq!(unpacked.generation(), generation);
        }
    }

    #[test]
    fn distinct_index_or_generation_means_distinct_id() {
        let a = NodeId::from_parts(3, 0);
        let b = NodeId::from_parts(3, 1);
        let c = NodeId::from_parts(4, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
