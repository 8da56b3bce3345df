//! Built-in operator catalogue.

use operator::{BaseOptions, Registry};

use crate::operators::{
    CLUSTER_MAINTENANCE_CHANGE, CRM_CLUSTER_START, CRM_CLUSTER_STOP, ClusterMaintenanceChange,
    ClusterMaintenanceChangeOptions, CrmClusterOptions, CrmClusterStart, CrmClusterStop,
    PACEMAKER_DISABLE, PACEMAKER_ENABLE, SAP_INSTANCE_START, SAP_INSTANCE_STOP, SAP_SYSTEM_START,
    SAP_SYSTEM_STOP, SAPTUNE_APPLY_SOLUTION, SAPTUNE_CHANGE_SOLUTION, SapInstanceOptions,
    SapInstanceStart, SapInstanceStop, SapSystemOptions, SapSystemStart, SapSystemStop,
    SaptuneApplySolution, SaptuneChangeSolution, SaptuneSolutionOptions, ServiceDisable,
    ServiceEnable, ServiceOptions, UNREGISTER_HANA_SECONDARY, UnregisterHanaSecondary,
    UnregisterHanaSecondaryOptions,
};

/// The full catalogue of built-in operators, all at `v1`.
pub fn standard_registry(base: BaseOptions) -> Registry {
    let mut registry = Registry::new();

    {
        let base = base.clone();
        registry.register(
            SAPTUNE_APPLY_SOLUTION,
            "v1",
            Box::new(move |operation_id, arguments| {
                SaptuneApplySolution::build(
                    arguments,
                    operation_id,
                    SaptuneSolutionOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            SAPTUNE_CHANGE_SOLUTION,
            "v1",
            Box::new(move |operation_id, arguments| {
                SaptuneChangeSolution::build(
                    arguments,
                    operation_id,
                    SaptuneSolutionOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            CLUSTER_MAINTENANCE_CHANGE,
            "v1",
            Box::new(move |operation_id, arguments| {
                ClusterMaintenanceChange::build(
                    arguments,
                    operation_id,
                    ClusterMaintenanceChangeOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            CRM_CLUSTER_START,
            "v1",
            Box::new(move |operation_id, arguments| {
                CrmClusterStart::build(
                    arguments,
                    operation_id,
                    CrmClusterOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            CRM_CLUSTER_STOP,
            "v1",
            Box::new(move |operation_id, arguments| {
                CrmClusterStop::build(
                    arguments,
                    operation_id,
                    CrmClusterOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            PACEMAKER_ENABLE,
            "v1",
            Box::new(move |operation_id, arguments| {
                ServiceEnable::build(
                    arguments,
                    operation_id,
                    ServiceOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            PACEMAKER_DISABLE,
            "v1",
            Box::new(move |operation_id, arguments| {
                ServiceDisable::build(
                    arguments,
                    operation_id,
                    ServiceOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            SAP_INSTANCE_START,
            "v1",
            Box::new(move |operation_id, arguments| {
                SapInstanceStart::build(
                    arguments,
                    operation_id,
                    SapInstanceOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            SAP_INSTANCE_STOP,
            "v1",
            Box::new(move |operation_id, arguments| {
                SapInstanceStop::build(
                    arguments,
                    operation_id,
                    SapInstanceOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            SAP_SYSTEM_START,
            "v1",
            Box::new(move |operation_id, arguments| {
                SapSystemStart::build(
                    arguments,
                    operation_id,
                    SapSystemOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            SAP_SYSTEM_STOP,
            "v1",
            Box::new(move |operation_id, arguments| {
                SapSystemStop::build(
                    arguments,
                    operation_id,
                    SapSystemOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    {
        let base = base.clone();
        registry.register(
            UNREGISTER_HANA_SECONDARY,
            "v1",
            Box::new(move |operation_id, arguments| {
                UnregisterHanaSecondary::build(
                    arguments,
                    operation_id,
                    UnregisterHanaSecondaryOptions {
                        base: base.clone(),
                        ..Default::default()
                    },
                )
            }),
        );
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_lists_every_operator() {
        let registry = standard_registry(BaseOptions::default());

        assert_eq!(
            registry.available(),
            vec![
                "clustermaintenancechange - v1",
                "crmclusterstart - v1",
                "crmclusterstop - v1",
                "pacemakerdisable - v1",
                "pacemakerenable - v1",
                "sapinstancestart - v1",
                "sapinstancestop - v1",
                "sapsystemstart - v1",
                "sapsystemstop - v1",
                "saptuneapplysolution - v1",
                "saptunechangesolution - v1",
                "unregisterhanasecondary - v1",
            ]
        );
    }

    #[test]
    fn test_standard_registry_resolves_latest_and_explicit() {
        let registry = standard_registry(BaseOptions::default());

        for name in [
            "saptuneapplysolution",
            "clustermaintenancechange",
            "crmclusterstart",
            "sapinstancestart",
        ] {
            assert!(registry.get_builder(name).is_ok(), "latest of {name}");
            let explicit = format!("{name}@v1");
            assert!(registry.get_builder(&explicit).is_ok(), "explicit {explicit}");
        }

        assert!(registry.get_builder("saptuneapplysolution@v2").is_err());
    }
}
