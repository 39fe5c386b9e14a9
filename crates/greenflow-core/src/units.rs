//! Units used by the platform description and the simulation substrate.
//!
//! Integral quantities (sizes, times, bandwidths) are `u64` newtypes so that event times order
//! exactly. Power and energy are `f64` newtypes.

macro_rules! unit {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Sum,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);
            pub const MAX: $name = Self::new(u64::MAX);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn into_u64(self) -> u64 {
                self.0
            }

            pub fn into_f64(self) -> f64 {
                self.0 as f64
            }

            pub const fn saturating_add(self, other: Self) -> Self {
                Self(self.0.saturating_add(other.0))
            }

            pub fn saturating_sub(self, other: Self) -> Self {
                Self(self.0.saturating_sub(other.0))
            }
        }
    };
}

macro_rules! float_unit {
    ($name: ident, $suffix: literal) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            PartialEq,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::Sum,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(f64);

        impl $name {
            pub const ZERO: $name = Self::new(0.0);

            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            pub const fn into_f64(self) -> f64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", self.0, $suffix)
            }
        }
    };
}

unit!(Bytes);

impl std::fmt::Display for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}B", self.0)
    }
}

unit!(Nanosecs);

impl Nanosecs {
    const PER_MILLI: u64 = 1_000_000;
    const PER_SEC: u64 = 1_000_000_000;

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(Self::PER_MILLI))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(Self::PER_SEC))
    }

    /// Converts seconds to nanoseconds, rounding up so that a positive duration never
    /// collapses to zero. Durations past the representable range saturate to `MAX`.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs <= 0.0 {
            return Self::ZERO;
        }
        Self((secs * Self::PER_SEC as f64).ceil() as u64)
    }

    pub fn into_secs_f64(self) -> f64 {
        self.0 as f64 / Self::PER_SEC as f64
    }
}

impl std::fmt::Display for Nanosecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

unit!(BitsPerSec);

impl BitsPerSec {
    /// The rate in bytes per second.
    pub fn bytes_per_sec(self) -> f64 {
        self.into_f64() / 8.0
    }
}

impl std::fmt::Display for BitsPerSec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

float_unit!(Watts, "W");

impl Watts {
    /// Energy drawn at this power over `duration`.
    pub fn over(self, duration: Nanosecs) -> Joules {
        Joules::new(self.0 * duration.into_secs_f64())
    }
}

float_unit!(Joules, "J");

float_unit!(Flops, "flop/s");
