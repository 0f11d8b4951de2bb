pub mod banner;
pub mod orchestrator;
pub mod partition;
pub mod sampler;
pub mod selector;

pub use banner::{Banner, HARDWARE_SUMMARY};
pub use orchestrator::{
    boot_alternate, conclude, run_boot_cycle, sample_verdict, BootFault, BootOutcome, BootPolicy,
    BootVerdict,
};
pub use partition::{
    find_partition, find_slot, validate, BootSlot, PartitionHandle, PartitionMap,
    PartitionMapError, PartitionTable, SizeCheck,
};
pub use sampler::{sample_hold, HoldStep, HoldTracker, HoldWindow};
pub use selector::{commit_boot_target, BootCommitError, BootSelector};
