//! The six pluggable scheduling algorithms (spec §4.4), each gated behind
//! its own Cargo feature so a consumer only pays for the policies it
//! selects in `Config`.

#[cfg(feature = "fifo")]
pub mod fifo;
#[cfg(feature = "rr")]
pub mod rr;
#[cfg(feature = "cfs")]
pub mod cfs;
#[cfg(feature = "eevdf")]
pub mod eevdf;
#[cfg(feature = "sq")]
pub mod sq;
#[cfg(feature = "sq-lcbe")]
pub mod sq_lcbe;

use std::sync::Arc;

use crate::config::{Config, PolicyKind};
use crate::error::{Result, SkyloftError};

use super::policy::Policy;

/// Builds the configured policy, erroring if its feature was compiled out.
pub fn build(config: &Config, num_cpus: usize) -> Result<Arc<dyn Policy>> {
    match config.policy {
        #[cfg(feature = "fifo")]
        PolicyKind::FifoSteal => Ok(Arc::new(fifo::FifoSteal::new(num_cpus))),
        #[cfg(feature = "rr")]
        PolicyKind::RoundRobin => Ok(Arc::new(rr::RoundRobin::new(num_cpus))),
        #[cfg(feature = "cfs")]
        PolicyKind::Cfs => Ok(Arc::new(cfs::Cfs::new(num_cpus))),
        #[cfg(feature = "eevdf")]
        PolicyKind::Eevdf => Ok(Arc::new(eevdf::Eevdf::new(num_cpus))),
        #[cfg(feature = "sq")]
        PolicyKind::SingleQueue => Ok(Arc::new(sq::SingleQueue::new(config.sq_params))),
        #[cfg(feature = "sq-lcbe")]
        PolicyKind::SingleQueueLcBe => {
            Ok(Arc::new(sq_lcbe::SqLcBe::new(config.sq_params, num_cpus)))
        }
        #[allow(unreachable_patterns)]
        _ => Err(SkyloftError::InvalidArgument(
            "selected policy's Cargo feature is not enabled",
        )),
    }
}
