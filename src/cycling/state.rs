use std::fmt;

use serde::Serialize;

use crate::domain::instance_group::InstanceGroup;
use crate::domain::retirement_batch::RetirementBatch;

/// The backing group of a batch together with its size before the run doubled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetTarget {
    pub group: InstanceGroup,
    pub original_size: u32,
}

impl FleetTarget {
    pub fn doubled_size(&self) -> Option<u32> {
        self.original_size.checked_mul(2)
    }
}

/// Phases of cycling one role. Each phase carries exactly what the next one needs.
///
/// A fresh run walks every phase in order. A resumed run enters at `Draining`
/// with no fleet target and finishes once the batch is drained, leaving deletion
/// to the operator.
#[derive(Debug, Clone)]
pub enum CycleState {
    Idle,
    Labeling,
    ResolvingGroup { batch: RetirementBatch },
    Scaling { batch: RetirementBatch, group: InstanceGroup },
    AwaitingScaleUp { batch: RetirementBatch, target: FleetTarget },
    ZoneBalanceCheck { batch: RetirementBatch, target: FleetTarget },
    Draining { batch: RetirementBatch, target: Option<FleetTarget> },
    Terminating { batch: RetirementBatch, target: FleetTarget },
    AwaitingScaleDown { target: FleetTarget },
    Done,
}

impl CycleState {
    pub fn name(&self) -> &'static str {
        match self {
            CycleState::Idle => "Idle",
            CycleState::Labeling => "Labeling",
            CycleState::ResolvingGroup { .. } => "ResolvingGroup",
            CycleState::Scaling { .. } => "Scaling",
            CycleState::AwaitingScaleUp { .. } => "AwaitingScaleUp",
            CycleState::ZoneBalanceCheck { .. } => "ZoneBalanceCheck",
            CycleState::Draining { .. } => "Draining",
            CycleState::Terminating { .. } => "Terminating",
            CycleState::AwaitingScaleDown { .. } => "AwaitingScaleDown",
            CycleState::Done => "Done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, CycleState::Done)
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
