use core::fmt;

use embedded_hal::digital::InputPin;
use log::{error, info, warn};

use super::partition::{find_slot, validate, BootSlot, PartitionHandle, PartitionTable, SizeCheck};
use super::sampler::{sample_hold, HoldWindow};
use super::selector::{commit_boot_target, BootCommitError, BootSelector};
use crate::config::{
    BOOT_COMMIT_FAILED_GRACE_MS, CHAIN_BOOT_SETTLE_MS, MIN_GATEWAY_SIZE_BYTES,
    PARTITION_ABSENT_GRACE_MS,
};
use crate::platform::{DelayOps, MonotonicClock, Restart};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BootVerdict {
    EnterProvisioning,
    BootAlternate,
}

impl BootVerdict {
    pub const fn from_hold(held: bool) -> Self {
        if held {
            Self::EnterProvisioning
        } else {
            Self::BootAlternate
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BootFault {
    PartitionAbsent,
    BootCommitFailed(BootCommitError),
}

impl BootFault {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PartitionAbsent => "gateway partition absent",
            Self::BootCommitFailed(_) => "boot partition commit failed",
        }
    }
}

impl fmt::Display for BootFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartitionAbsent => f.write_str(self.as_str()),
            Self::BootCommitFailed(err) => write!(f, "{}: {}", self.as_str(), err),
        }
    }
}

/// Terminal result of one boot decision. Only `Provision` leads anywhere
/// other than a restart.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BootOutcome {
    Provision,
    ChainBoot {
        target: PartitionHandle,
        size: SizeCheck,
    },
    FatalRetry {
        fault: BootFault,
        grace_ms: u32,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BootPolicy {
    pub hold: HoldWindow,
    pub min_alternate_size: u32,
    pub absent_grace_ms: u32,
    pub commit_failed_grace_ms: u32,
    pub chain_boot_settle_ms: u32,
}

impl Default for BootPolicy {
    fn default() -> Self {
        Self {
            hold: HoldWindow::boot_button(),
            min_alternate_size: MIN_GATEWAY_SIZE_BYTES,
            absent_grace_ms: PARTITION_ABSENT_GRACE_MS,
            commit_failed_grace_ms: BOOT_COMMIT_FAILED_GRACE_MS,
            chain_boot_settle_ms: CHAIN_BOOT_SETTLE_MS,
        }
    }
}

pub fn sample_verdict<I, C, D>(input: &mut I, clock: &C, delay: &D, policy: &BootPolicy) -> BootVerdict
where
    I: InputPin,
    C: MonotonicClock + ?Sized,
    D: DelayOps + ?Sized,
{
    BootVerdict::from_hold(sample_hold(input, clock, delay, policy.hold))
}

/// Resolves the gateway slot and commits it as the next boot target.
pub fn boot_alternate<T, B>(table: &T, selector: &mut B, policy: &BootPolicy) -> BootOutcome
where
    T: PartitionTable + ?Sized,
    B: BootSelector + ?Sized,
{
    info!("boot: locating gateway firmware in {}", BootSlot::Alternate.as_str());
    let Some(target) = find_slot(table, BootSlot::Alternate) else {
        error!(
            "boot: gateway firmware not found in {} partition; flash it at the ota_1 offset",
            BootSlot::Alternate.as_str()
        );
        return BootOutcome::FatalRetry {
            fault: BootFault::PartitionAbsent,
            grace_ms: policy.absent_grace_ms,
        };
    };

    let size = validate(&target, policy.min_alternate_size);
    if size == SizeCheck::TooSmall {
        warn!(
            "boot: gateway partition is {} bytes (expected >= {}); it may be empty or corrupted, booting anyway",
            target.size, policy.min_alternate_size
        );
    }
    info!("boot: gateway partition {}", target);

    let running = find_slot(table, BootSlot::Running);
    if let Err(err) = commit_boot_target(selector, &target, running.as_ref()) {
        error!("boot: failed to set boot partition: {}", err);
        return BootOutcome::FatalRetry {
            fault: BootFault::BootCommitFailed(err),
            grace_ms: policy.commit_failed_grace_ms,
        };
    }

    info!("boot: boot partition set");
    BootOutcome::ChainBoot { target, size }
}

pub fn run_boot_cycle<I, C, D, T, B>(
    input: &mut I,
    clock: &C,
    delay: &D,
    table: &T,
    selector: &mut B,
    policy: &BootPolicy,
) -> BootOutcome
where
    I: InputPin,
    C: MonotonicClock + ?Sized,
    D: DelayOps + ?Sized,
    T: PartitionTable + ?Sized,
    B: BootSelector + ?Sized,
{
    match sample_verdict(input, clock, delay, policy) {
        BootVerdict::EnterProvisioning => BootOutcome::Provision,
        BootVerdict::BootAlternate => boot_alternate(table, selector, policy),
    }
}

/// Turns a non-provisioning outcome into the matching restart.
pub fn conclude<D, R>(outcome: BootOutcome, delay: &D, restart: &mut R, policy: &BootPolicy) -> !
where
    D: DelayOps + ?Sized,
    R: Restart + ?Sized,
{
    match outcome {
        BootOutcome::ChainBoot { .. } => {
            info!("boot: launching gateway firmware");
            delay.delay_ms(policy.chain_boot_settle_ms);
        }
        BootOutcome::FatalRetry { fault, grace_ms } => {
            error!("boot: {}; restarting in {} ms", fault, grace_ms);
            delay.delay_ms(grace_ms);
        }
        BootOutcome::Provision => {
            warn!("boot: provisioning outcome reached the boot driver; restarting");
        }
    }
    restart.restart()
}
