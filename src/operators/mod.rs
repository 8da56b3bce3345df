//! Concrete operators.
//!
//! Each module instantiates the phased-operator pattern against one
//! collaborator: probe the current state in Plan, short-circuit when the
//! desired state already holds, mutate in Commit, re-probe in Verify, and
//! invert to the captured `before` state in Rollback.

pub mod cluster_maintenance_change;
pub mod crm_cluster;
pub mod sap_instance;
pub mod sap_system;
pub mod saptune_solution;
pub mod service_enable;
pub mod unregister_hana_secondary;

#[cfg(test)]
pub mod testing;

pub use cluster_maintenance_change::{
    CLUSTER_MAINTENANCE_CHANGE, ClusterMaintenanceChange, ClusterMaintenanceChangeOptions,
};
pub use crm_cluster::{
    CRM_CLUSTER_START, CRM_CLUSTER_STOP, CrmClusterStart, CrmClusterStop, CrmClusterOptions,
};
pub use sap_instance::{
    SAP_INSTANCE_START, SAP_INSTANCE_STOP, SapInstanceOptions, SapInstanceStart, SapInstanceStop,
};
pub use sap_system::{
    SAP_SYSTEM_START, SAP_SYSTEM_STOP, SapSystemOptions, SapSystemStart, SapSystemStop,
};
pub use saptune_solution::{
    SAPTUNE_APPLY_SOLUTION, SAPTUNE_CHANGE_SOLUTION, SaptuneApplySolution, SaptuneChangeSolution,
    SaptuneSolutionOptions,
};
pub use service_enable::{
    PACEMAKER_ENABLE, PACEMAKER_DISABLE, PACEMAKER_SERVICE, ServiceDisable, ServiceEnable,
    ServiceOptions,
};
pub use unregister_hana_secondary::{
    UNREGISTER_HANA_SECONDARY, UnregisterHanaSecondary, UnregisterHanaSecondaryOptions,
};
