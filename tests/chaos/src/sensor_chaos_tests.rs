//! Sensor Fault Tests
//!
//! The control loop must keep deciding when sensors drop out, flap or
//! report garbage. These tests validate:
//! - No decision is made before both groups have reported once, but a
//!   critical group still forces maximum cooling
//! - Missing groups reuse their last reading afterwards, up to a limit
//! - Emergency handling stays intact while sensors flap
//! - Slow sensors do not stall the loop

#[cfg(test)]
mod tests {
    use thermo_core::{ControlConfig, FanGroup, SensorGroup, Severity};

    use crate::faults::ChaosRig;
    use crate::{ChaosMetrics, ChaosTestable, FaultType};

    #[tokio::test]
    async fn test_total_outage_before_first_reading_holds_initial_speeds() {
        let rig = ChaosRig::new();
        rig.sensors.set(40.0, 60.0);
        rig.sensors.switch.inject_fault(FaultType::Outage).await.unwrap();

        let mut runner = rig.runner(ControlConfig::default()).await;
        let mut metrics = ChaosMetrics::default();
        let reports = rig.drive(&mut runner, 5, &mut metrics).await.unwrap();

        assert!(reports.iter().all(|r| r.is_skipped()));
        assert_eq!(runner.stats().skipped_cycles, 5);
        assert_eq!(metrics.availability(), 0.0);
        // Nothing is known to be critical: initial speeds are written once
        // and then held
        assert!(!runner.engine().is_emergency());
        assert_eq!(
            rig.actuator.writes(),
            vec![(FanGroup::Radiator, 50), (FanGroup::Chassis, 50)]
        );
        assert_eq!(rig.events.recorded(), 0);
        assert!(runner.engine().table().is_empty());
    }

    #[tokio::test]
    async fn test_radiator_critical_with_storage_never_seen() {
        let rig = ChaosRig::new();
        rig.sensors.set_radiator_only(85.0);

        let mut runner = rig.runner(ControlConfig::default()).await;
        let mut metrics = ChaosMetrics::default();
        let reports = rig.drive(&mut runner, 5, &mut metrics).await.unwrap();

        assert!(reports.iter().all(|r| r.is_skipped()));
        assert!(runner.engine().is_emergency());
        assert_eq!(
            rig.actuator.writes(),
            vec![(FanGroup::Radiator, 100), (FanGroup::Chassis, 100)]
        );
        assert_eq!(rig.notifier.delivered(Severity::Critical), 1);
        assert_eq!(runner.stats().emergency_entries, 1);
        assert!(runner.engine().table().is_empty());
    }

    #[tokio::test]
    async fn test_storage_lost_for_good_fails_safe() {
        let rig = ChaosRig::new();
        rig.sensors.set(40.0, 60.0);
        let mut config = ControlConfig::default();
        config.schedule.max_stale_cycles = 4;
        let mut runner = rig.runner(config).await;
        let mut metrics = ChaosMetrics::default();

        rig.drive(&mut runner, 2, &mut metrics).await.unwrap();
        rig.sensors.set_radiator_only(40.0);
        let reports = rig.drive(&mut runner, 5, &mut metrics).await.unwrap();

        let emergencies: Vec<bool> = reports
            .iter()
            .map(|r| r.decision.as_ref().unwrap().emergency)
            .collect();
        assert_eq!(emergencies, vec![false, false, false, false, true]);
        assert_eq!(runner.applied_speed(FanGroup::Radiator), Some(100));
        assert_eq!(runner.applied_speed(FanGroup::Chassis), Some(100));
        assert_eq!(rig.notifier.delivered(Severity::Critical), 1);
    }

    #[tokio::test]
    async fn test_outage_after_warmup_reuses_last_readings() {
        let rig = ChaosRig::new();
        rig.sensors.set(40.0, 60.0);
        let mut runner = rig.runner(ControlConfig::default()).await;
        let mut metrics = ChaosMetrics::default();

        rig.drive(&mut runner, 3, &mut metrics).await.unwrap();
        rig.sensors.switch.inject_fault(FaultType::Outage).await.unwrap();
        let reports = rig.drive(&mut runner, 3, &mut metrics).await.unwrap();

        for report in &reports {
            let decision = report.decision.as_ref().unwrap();
            assert_eq!(decision.stale, vec![SensorGroup::Radiator, SensorGroup::Storage]);
            assert_eq!(decision.raw.radiator, 40.0);
            assert_eq!(decision.raw.storage, 60.0);
        }

        rig.sensors.switch.restore().await.unwrap();
        let reports = rig.drive(&mut runner, 1, &mut metrics).await.unwrap();
        assert!(reports[0].decision.as_ref().unwrap().stale.is_empty());

        assert_eq!(metrics.decisions, 7);
        assert_eq!(metrics.stale_decisions, 3);
        assert_eq!(runner.stats().skipped_cycles, 0);
    }

    #[tokio::test]
    async fn test_intermittent_sensors_never_skip_after_warmup() {
        let rig = ChaosRig::new();
        rig.sensors.set(40.0, 60.0);
        rig.sensors
            .switch
            .inject_fault(FaultType::Intermittent { every: 3 })
            .await
            .unwrap();

        let mut runner = rig.runner(ControlConfig::default()).await;
        let mut metrics = ChaosMetrics::default();
        rig.drive(&mut runner, 30, &mut metrics).await.unwrap();

        assert_eq!(metrics.availability(), 1.0);
        assert_eq!(metrics.stale_decisions, 10);
        assert_eq!(rig.events.recorded(), 30);
    }

    #[tokio::test]
    async fn test_non_finite_readings_count_as_missing() {
        let rig = ChaosRig::new();
        rig.sensors.set(40.0, 60.0);
        rig.sensors.switch.inject_fault(FaultType::Garbage).await.unwrap();

        let mut runner = rig.runner(ControlConfig::default()).await;
        let mut metrics = ChaosMetrics::default();
        let reports = rig.drive(&mut runner, 2, &mut metrics).await.unwrap();
        assert!(reports.iter().all(|r| r.is_skipped()));

        rig.sensors.switch.restore().await.unwrap();
        rig.drive(&mut runner, 1, &mut metrics).await.unwrap();
        rig.sensors.switch.inject_fault(FaultType::Garbage).await.unwrap();
        let reports = rig.drive(&mut runner, 2, &mut metrics).await.unwrap();

        for report in &reports {
            let decision = report.decision.as_ref().unwrap();
            assert_eq!(decision.stale.len(), 2);
            assert!(decision.reward.is_finite());
            assert!(decision.smoothed.radiator.is_finite());
        }
    }

    #[tokio::test]
    async fn test_emergency_holds_while_sensors_flap() {
        let rig = ChaosRig::new();
        rig.sensors.set(70.0, 60.0);
        rig.sensors
            .switch
            .inject_fault(FaultType::Intermittent { every: 2 })
            .await
            .unwrap();

        let mut runner = rig.runner(ControlConfig::default()).await;
        let mut metrics = ChaosMetrics::default();
        let reports = rig.drive(&mut runner, 10, &mut metrics).await.unwrap();

        for report in &reports {
            let decision = report.decision.as_ref().unwrap();
            assert!(decision.emergency);
            assert_eq!(decision.action.radiator, 100);
            assert_eq!(decision.action.chassis, 100);
        }
        assert_eq!(metrics.stale_decisions, 5);
        assert_eq!(rig.notifier.delivered(Severity::Critical), 1);
        assert_eq!(runner.stats().emergency_entries, 1);
        assert_eq!(runner.applied_speed(FanGroup::Radiator), Some(100));
    }

    #[tokio::test]
    async fn test_slow_sensors_complete() {
        let rig = ChaosRig::new();
        let delay_ms = u64::try_from(rig.config.injection_delay.as_millis()).unwrap_or(5);
        rig.sensors.set(45.0, 65.0);
        rig.sensors
            .switch
            .inject_fault(FaultType::Latency { delay_ms })
            .await
            .unwrap();
        rig.actuator
            .switch
            .inject_fault(FaultType::Latency { delay_ms })
            .await
            .unwrap();

        let mut runner = rig.runner(ControlConfig::default()).await;
        let mut metrics = ChaosMetrics::default();
        rig.drive(&mut runner, 5, &mut metrics).await.unwrap();

        assert_eq!(metrics.decisions, 5);
        assert_eq!(metrics.degraded_cycles, 0);
        assert_eq!(rig.sensors.switch.failures(), 0);
    }
}
