//! Transfer requests and their decomposition into flows.

use std::ops::RangeInclusive;
use std::str::FromStr;

use rand::Rng;

use crate::units::Bytes;

/// Placeholder id for jobs submitted without one.
pub const UNNAMED_JOB: &str = "unnamed";

/// An immutable transfer request: move `total_bytes` as `flow_count` concurrent flows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct JobDescriptor {
    job_id: String,
    flow_count: usize,
    total_bytes: Bytes,
}

impl JobDescriptor {
    pub fn new(
        job_id: impl Into<String>,
        flow_count: usize,
        total_bytes: Bytes,
    ) -> Result<Self, JobError> {
        if flow_count == 0 {
            return Err(JobError::NoFlows);
        }
        let job_id = job_id.into();
        Ok(Self {
            job_id: if job_id.is_empty() {
                UNNAMED_JOB.to_owned()
            } else {
                job_id
            },
            flow_count,
            total_bytes,
        })
    }

    /// Builds a descriptor whose size is resolved from `size` using `rng`.
    pub fn resolve<R: Rng>(
        job_id: impl Into<String>,
        flow_count: usize,
        size: &PayloadSize,
        rng: &mut R,
    ) -> Result<Self, JobError> {
        let total_bytes = size.resolve(rng)?;
        Self::new(job_id, flow_count, total_bytes)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn flow_count(&self) -> usize {
        self.flow_count
    }

    pub fn total_bytes(&self) -> Bytes {
        self.total_bytes
    }

    /// The flows this job is sent as.
    pub fn flows(&self) -> Vec<Flow> {
        split(self.total_bytes, self.flow_count)
    }
}

/// How the size of a job is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Explicit(Bytes),
    /// Drawn uniformly from `min..=max` when the job is built.
    Random { min: Bytes, max: Bytes },
}

impl PayloadSize {
    pub const DEFAULT: Bytes = Bytes::new(25_000);
    pub const RANDOM_RANGE: RangeInclusive<Bytes> =
        Bytes::new(1_000_000)..=Bytes::new(1_000_000_000);

    pub fn random() -> Self {
        Self::Random {
            min: *Self::RANDOM_RANGE.start(),
            max: *Self::RANDOM_RANGE.end(),
        }
    }

    pub fn resolve<R: Rng>(&self, rng: &mut R) -> Result<Bytes, JobError> {
        match *self {
            Self::Explicit(size) => Ok(size),
            Self::Random { min, max } => {
                if min > max {
                    return Err(JobError::EmptyRange { min, max });
                }
                Ok(Bytes::new(rng.gen_range(min.into_u64()..=max.into_u64())))
            }
        }
    }
}

impl Default for PayloadSize {
    fn default() -> Self {
        Self::Explicit(Self::DEFAULT)
    }
}

impl FromStr for PayloadSize {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "random" {
            return Ok(Self::random());
        }
        s.parse::<u64>()
            .map(|n| Self::Explicit(Bytes::new(n)))
            .map_err(|_| JobError::BadSize(s.to_owned()))
    }
}

/// One independently transferred chunk of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Flow {
    pub index: usize,
    pub size: Bytes,
}

/// Splits `total` into `count` flows of `total / count` bytes. The last flow also carries the
/// remainder, so the sizes always sum to `total`.
///
/// # Panics
///
/// Panics if `count` is zero.
pub fn split(total: Bytes, count: usize) -> Vec<Flow> {
    assert!(count > 0, "a job has at least one flow");
    let n = count as u64;
    let chunk = total.into_u64() / n;
    let remainder = total.into_u64() % n;
    (0..count)
        .map(|index| {
            let size = if index == count - 1 {
                chunk + remainder
            } else {
                chunk
            };
            Flow {
                index,
                size: Bytes::new(size),
            }
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("a job needs at least one flow")]
    NoFlows,

    #[error("invalid payload size {0:?}: expected a byte count or \"random\"")]
    BadSize(String),

    #[error("empty random size range {min}..={max}")]
    EmptyRange { min: Bytes, max: Bytes },
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn sizes(total: u64, count: usize) -> Vec<u64> {
        split(Bytes::new(total), count)
            .into_iter()
            .map(|f| f.size.into_u64())
            .collect()
    }

    #[test]
    fn remainder_goes_last() {
        assert_eq!(sizes(10, 3), [3, 3, 4]);
        assert_eq!(sizes(1000, 4), [250, 250, 250, 250]);
    }

    #[test]
    fn single_flow_carries_everything() {
        assert_eq!(sizes(25_000, 1), [25_000]);
    }

    #[test]
    fn sizes_sum_to_total() {
        for total in [0, 1, 7, 999, 25_000, 1_000_003] {
            for count in 1..=9 {
                let flows = split(Bytes::new(total), count);
                assert_eq!(flows.len(), count);
                assert_eq!(flows.iter().map(|f| f.size).sum::<Bytes>(), Bytes::new(total));
                let first = flows[0].size;
                assert!(flows[..count - 1].iter().all(|f| f.size == first));
                assert!(flows.iter().enumerate().all(|(i, f)| f.index == i));
            }
        }
    }

    #[test]
    fn fewer_bytes_than_flows_leaves_empty_flows() {
        assert_eq!(sizes(2, 4), [0, 0, 0, 2]);
    }

    #[test]
    fn zero_flows_rejected() {
        assert!(matches!(
            JobDescriptor::new("job", 0, Bytes::new(10)),
            Err(JobError::NoFlows)
        ));
    }

    #[test]
    fn empty_id_becomes_placeholder() -> anyhow::Result<()> {
        let job = JobDescriptor::new("", 1, Bytes::new(10))?;
        assert_eq!(job.job_id(), UNNAMED_JOB);
        Ok(())
    }

    #[test]
    fn parse_payload_size() -> anyhow::Result<()> {
        assert_eq!(
            "1000".parse::<PayloadSize>()?,
            PayloadSize::Explicit(Bytes::new(1000))
        );
        assert_eq!("random".parse::<PayloadSize>()?, PayloadSize::random());
        assert!("lots".parse::<PayloadSize>().is_err());
        assert!("-5".parse::<PayloadSize>().is_err());
        Ok(())
    }

    #[test]
    fn random_size_is_seeded_and_in_range() -> anyhow::Result<()> {
        let size = PayloadSize::random();
        let a = JobDescriptor::resolve("j", 2, &size, &mut StdRng::seed_from_u64(7))?;
        let b = JobDescriptor::resolve("j", 2, &size, &mut StdRng::seed_from_u64(7))?;
        assert_eq!(a, b);
        assert!(PayloadSize::RANDOM_RANGE.contains(&a.total_bytes()));
        Ok(())
    }

    #[test]
    fn inverted_range_rejected() {
        let size = PayloadSize::Random {
            min: Bytes::new(10),
            max: Bytes::new(1),
        };
        assert!(size.resolve(&mut StdRng::seed_from_u64(0)).is_err());
    }
}
