pub mod builder;
pub mod reconciler;
pub mod supervisor;

pub use builder::{ConsensusBuilder, ConsensusGroup, ConsensusStatistics};
pub use reconciler::{
    average_score, consensus_score, detect_conflicts, statistical_risk_label, Conflict,
    ConflictKind, ReconciledFindingSet, SupervisorReconciler, VerificationStatus,
    MAJORITY_STRATEGY,
};
pub use supervisor::{ConsensusSupervisor, ProviderSupervisor, Supervisor, SupervisorInput};
