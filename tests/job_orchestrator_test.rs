// ==========================================
// 作业编排测试
// ==========================================
// 测试范围:
// 1. 进度与预计剩余工时
// 2. 开工策略（FIRST_READY / ALL_READY）
// 3. 挂起/恢复、取消、完工
// 4. 取消时分配原子释放
// 5. 释放策略与事件发布
// ==========================================


use omm_orchestrator::config::config_keys;
use omm_orchestrator::domain::types::{ActionStatus, ActionType, JobStatus, VehicleType};
use omm_orchestrator::domain::{Action, OmmError, Product, Resource, ResourceVariant, Sensor};
use omm_orchestrator::engine::OrchestratorEventType;

#[test]
fn test_progress_and_estimate_after_first_action() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0), ("A-2", 2, 2.0)]);

    assert_eq!(orch.get_progress("J-1").unwrap(), 0.0);
    assert_eq!(orch.get_estimated_completion_time("J-1").unwrap(), 3.0);

    let report = orch.start_job("J-1").unwrap();
    assert_eq!(report.started_actions, vec!["A-1"]);
    orch.complete_action("A-1").unwrap();

    assert_eq!(orch.get_progress("J-1").unwrap(), 50.0);
    assert_eq!(orch.get_estimated_completion_time("J-1").unwrap(), 2.0);
}

#[test]
fn test_progress_without_actions_is_zero() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[]);
    assert_eq!(orch.get_progress("J-1").unwrap(), 0.0);
    assert_eq!(orch.get_estimated_completion_time("J-1").unwrap(), 0.0);
}

#[test]
fn test_progress_is_non_decreasing() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(
        &orch,
        "J-1",
        &[("A-1", 1, 0.5), ("A-2", 2, 0.5), ("A-3", 3, 0.5), ("A-4", 4, 0.5)],
    );
    orch.start_job("J-1").unwrap();

    let mut last = orch.get_progress("J-1").unwrap();
    for id in ["A-1", "A-2", "A-3", "A-4"] {
        if orch.get_action(id).unwrap().status() != ActionStatus::InProgress {
            orch.start_action(id).unwrap();
        }
        orch.complete_action(id).unwrap();
        let progress = orch.get_progress("J-1").unwrap();
        assert!(progress >= last);
        last = progress;
    }
    assert_eq!(last, 100.0);

    orch.complete_job("J-1").unwrap();
    assert_eq!(orch.get_job("J-1").unwrap().status(), JobStatus::Completed);
}

#[test]
fn test_start_job_requires_planned() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);
    orch.start_job("J-1").unwrap();
    assert!(matches!(
        orch.start_job("J-1"),
        Err(OmmError::InvalidTransition { .. })
    ));

    orch.put_on_hold("J-1", "material shortage").unwrap();
    assert!(matches!(
        orch.start_job("J-1"),
        Err(OmmError::InvalidTransition { .. })
    ));
}

#[test]
fn test_all_ready_policy_starts_parallel_actions() {
    let orch = test_helpers::orchestrator_with(&[(config_keys::JOB_AUTO_START_POLICY, "ALL_READY")]);
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0), ("A-2", 1, 1.0), ("A-3", 2, 1.0)]);

    let report = orch.start_job("J-1").unwrap();
    assert_eq!(report.started_actions, vec!["A-1", "A-2"]);
    assert_eq!(orch.get_in_progress_actions("J-1").unwrap().len(), 2);
    assert_eq!(orch.get_action("A-3").unwrap().status(), ActionStatus::Requested);
}

#[test]
fn test_hold_and_resume_record_reason() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);

    assert!(matches!(
        orch.put_on_hold("J-1", "not started"),
        Err(OmmError::InvalidTransition { .. })
    ));
    assert!(matches!(
        orch.resume_job("J-1", "not held"),
        Err(OmmError::InvalidTransition { .. })
    ));

    orch.start_job("J-1").unwrap();
    orch.put_on_hold("J-1", "machine breakdown").unwrap();
    let job = orch.get_job("J-1").unwrap();
    assert_eq!(job.status(), JobStatus::OnHold);
    assert_eq!(job.hold_reason(), Some("machine breakdown"));

    orch.resume_job("J-1", "repaired").unwrap();
    let job = orch.get_job("J-1").unwrap();
    assert_eq!(job.status(), JobStatus::InProgress);
    assert_eq!(job.hold_reason(), None);
    assert_eq!(job.resume_reason(), Some("repaired"));

    // 再次挂起时清除上一次的恢复原因
    orch.put_on_hold("J-1", "second breakdown").unwrap();
    assert_eq!(orch.get_job("J-1").unwrap().resume_reason(), None);
}

#[test]
fn test_actions_cannot_start_while_job_on_hold() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0), ("A-2", 2, 1.0)]);
    orch.start_job("J-1").unwrap();
    orch.complete_action("A-1").unwrap();
    orch.put_on_hold("J-1", "inspection").unwrap();

    assert!(orch.start_action("A-2").is_err());
    assert_eq!(orch.get_action("A-2").unwrap().status(), ActionStatus::Requested);
}

#[test]
fn test_complete_job_with_incomplete_actions() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0), ("A-2", 2, 1.0)]);

    // 未开工的作业不能完工
    assert!(matches!(
        orch.complete_job("J-1"),
        Err(OmmError::InvalidTransition { .. })
    ));

    orch.start_job("J-1").unwrap();
    orch.complete_action("A-1").unwrap();
    match orch.complete_job("J-1") {
        Err(OmmError::IncompleteActions { job_id, remaining }) => {
            assert_eq!(job_id, "J-1");
            assert_eq!(remaining, vec!["A-2".to_string()]);
        }
        other => panic!("期望 IncompleteActions, 实际 {:?}", other),
    }
    assert_eq!(orch.get_job("J-1").unwrap().status(), JobStatus::InProgress);
}

#[test]
fn test_cancel_completed_job_is_invalid() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);
    orch.start_job("J-1").unwrap();
    orch.complete_action("A-1").unwrap();
    orch.complete_job("J-1").unwrap();

    assert!(matches!(
        orch.cancel_job("J-1", "too late"),
        Err(OmmError::InvalidTransition { .. })
    ));
    assert_eq!(orch.get_job("J-1").unwrap().status(), JobStatus::Completed);
}

#[test]
fn test_cancel_in_progress_job_restores_resource_loads() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0), ("A-2", 2, 1.0)]);
    orch.register_resource(test_helpers::workstation("WS-1")).unwrap();
    orch.register_resource(
        Resource::new(
            "Forklift",
            ResourceVariant::vehicle(VehicleType::ManualForklift, 2.0, 500.0),
        )
        .unwrap()
        .with_id("V-1"),
    )
    .unwrap();

    orch.start_job("J-1").unwrap();
    orch.allocate_resource("A-1", "WS-1", None).unwrap();
    orch.allocate_resource("A-2", "V-1", Some(120.0)).unwrap();
    assert_eq!(orch.get_resource("WS-1").unwrap().current_load(), 1);

    let released = orch.cancel_job("J-1", "customer withdrew").unwrap();
    assert_eq!(released.len(), 2);

    let ws = orch.get_resource("WS-1").unwrap();
    let vehicle = orch.get_resource("V-1").unwrap();
    assert_eq!(ws.current_load(), 0);
    assert_eq!(vehicle.current_load(), 0);
    assert_eq!(vehicle.volume_load(), 0.0);

    let job = orch.get_job("J-1").unwrap();
    assert_eq!(job.status(), JobStatus::Cancelled);
    assert_eq!(job.cancel_reason(), Some("customer withdrew"));
    assert_eq!(job.allocation_count(), 0);
    assert!(orch
        .job_actions("J-1")
        .unwrap()
        .iter()
        .all(|a| a.status() == ActionStatus::Cancelled));
    assert!(orch.verify_job_consistency("J-1").unwrap().is_empty());
}

#[test]
fn test_release_policy_explicit_vs_on_action_end() {
    let explicit = test_helpers::orchestrator();
    test_helpers::setup_job(&explicit, "J-1", &[("A-1", 1, 1.0)]);
    explicit.register_resource(test_helpers::workstation("WS-1")).unwrap();
    explicit.start_job("J-1").unwrap();
    explicit.allocate_resource("A-1", "WS-1", None).unwrap();
    explicit.complete_action("A-1").unwrap();
    assert_eq!(explicit.get_resource("WS-1").unwrap().current_load(), 1);
    // 作业完工时释放残留分配
    explicit.complete_job("J-1").unwrap();
    assert_eq!(explicit.get_resource("WS-1").unwrap().current_load(), 0);

    let automatic =
        test_helpers::orchestrator_with(&[(config_keys::ALLOCATION_RELEASE_POLICY, "ON_ACTION_END")]);
    test_helpers::setup_job(&automatic, "J-1", &[("A-1", 1, 1.0)]);
    automatic.register_resource(test_helpers::workstation("WS-1")).unwrap();
    automatic.start_job("J-1").unwrap();
    automatic.allocate_resource("A-1", "WS-1", None).unwrap();
    automatic.complete_action("A-1").unwrap();
    assert_eq!(automatic.get_resource("WS-1").unwrap().current_load(), 0);
}

#[test]
fn test_cancel_action_always_releases() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0), ("A-2", 2, 3.0)]);
    orch.register_resource(test_helpers::workstation("WS-1")).unwrap();
    orch.start_job("J-1").unwrap();
    orch.allocate_resource("A-1", "WS-1", None).unwrap();

    orch.cancel_action("A-1").unwrap();
    assert_eq!(orch.get_resource("WS-1").unwrap().current_load(), 0);
    assert!(matches!(
        orch.complete_action("A-1"),
        Err(OmmError::InvalidTransition { .. })
    ));

    // 取消的工序不阻塞后续工序
    let ready: Vec<String> = orch
        .get_ready_actions("J-1")
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ready, vec!["A-2"]);
    assert_eq!(orch.get_estimated_completion_time("J-1").unwrap(), 3.0);
}

#[test]
fn test_events_published_after_mutations() {
    let (orch, recorder) = test_helpers::recording_orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);
    orch.register_resource(test_helpers::workstation("WS-1")).unwrap();

    orch.start_job("J-1").unwrap();
    orch.allocate_resource("A-1", "WS-1", None).unwrap();
    orch.cancel_job("J-1", "stop").unwrap();

    let types = recorder.types();
    assert_eq!(types.first(), Some(&OrchestratorEventType::JobStarted));
    assert!(types.contains(&OrchestratorEventType::ResourceAllocated));
    assert!(types.contains(&OrchestratorEventType::AllocationReleased));
    assert_eq!(types.last(), Some(&OrchestratorEventType::JobCancelled));
    assert!(types
        .iter()
        .filter(|t| **t == OrchestratorEventType::ActionStatusChanged)
        .count()
        >= 3);
}

#[test]
fn test_update_action_resequences_job() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0), ("A-2", 2, 1.0)]);

    orch.update_action("A-1", |action| {
        action.sequence = 3;
        Ok(())
    })
    .unwrap();
    assert_eq!(orch.get_job("J-1").unwrap().action_ids(), vec!["A-2", "A-1"]);
    assert!(orch.verify_job_consistency("J-1").unwrap().is_empty());

    let report = orch.start_job("J-1").unwrap();
    assert_eq!(report.started_actions, vec!["A-2"]);
}

#[test]
fn test_update_product_keeps_action_links() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[]);
    let action = Action::new("Paint", ActionType::Process, 1, 1.0)
        .unwrap()
        .with_id("A-1")
        .with_product("PRD-J-1");
    orch.add_action("J-1", action).unwrap();

    let err = orch
        .update_product("PRD-J-1", |p| {
            *p = Product::new("Widget", None)?.with_id("PRD-J-1");
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, OmmError::ValidationError(_)));
    assert_eq!(orch.get_product("PRD-J-1").unwrap().action_ids(), vec!["A-1"]);

    let updated = orch
        .update_product("PRD-J-1", |p| {
            p.description = Some("Blue finish".to_string());
            Ok(())
        })
        .unwrap();
    assert_eq!(updated.action_ids(), vec!["A-1"]);
}

#[test]
fn test_remove_job_requires_terminal_or_planned() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);
    orch.start_job("J-1").unwrap();
    assert!(orch.remove_job("J-1").is_err());

    orch.cancel_job("J-1", "obsolete").unwrap();
    orch.remove_job("J-1").unwrap();
    assert!(matches!(
        orch.get_action("A-1"),
        Err(OmmError::NotFound { .. })
    ));
}

#[test]
fn test_read_sensor_forwards_without_range_check() {
    let orch = test_helpers::orchestrator();
    let mut press = test_helpers::workstation("WS-1");
    press
        .add_sensor(
            Sensor::new("Spindle temp", "temperature", "C", 0.0, 120.0)
                .unwrap()
                .with_id("S-1"),
        )
        .unwrap();
    orch.register_resource(press).unwrap();

    let reader = test_helpers::FixedSensorReader::new(480.0);
    let reading = orch.read_sensor("WS-1", "S-1", &reader).unwrap();
    assert_eq!(reading.sensor_id, "S-1");
    assert_eq!(reading.value, 480.0);
    assert_eq!(*reader.calls.lock().unwrap(), 1);

    assert!(matches!(
        orch.read_sensor("WS-1", "S-404", &reader),
        Err(OmmError::NotFound { .. })
    ));
}
