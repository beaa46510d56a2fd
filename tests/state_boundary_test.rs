// ==========================================
// 状态边界测试
// ==========================================
// 测试范围:
// 1. 四个状态机的合法边与非法边
// 2. 非法转换返回 InvalidTransition 且实体保持原状态
// 3. CHARGING 仅车辆可达
// 4. 属性更新入口不能绕过状态机与指派关系
// ==========================================


use omm_orchestrator::domain::types::{
    ActionStatus, JobStatus, PartType, ProductionState, ResourceStatus, VehicleType,
};
use omm_orchestrator::domain::{
    Action, EntityMapping, OmmError, Part, Requirement, Resource, ResourceVariant,
};
use omm_orchestrator::engine::StateMachine;

#[test]
fn test_action_status_edges() {
    use ActionStatus::*;
    assert_eq!(Draft.successors(), vec![Requested, Cancelled]);
    assert_eq!(Requested.successors(), vec![Confirmed, Cancelled]);
    assert_eq!(Confirmed.successors(), vec![InProgress, Cancelled]);
    assert_eq!(InProgress.successors(), vec![Completed, Cancelled]);
    assert!(Completed.successors().is_empty());
    assert!(Cancelled.successors().is_empty());

    // 不允许跳步或自转换
    assert!(!Requested.can_transition_to(InProgress));
    assert!(!Confirmed.can_transition_to(Confirmed));
}

#[test]
fn test_job_status_edges() {
    use JobStatus::*;
    assert!(Planned.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(OnHold));
    assert!(OnHold.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Completed));
    for from in [Planned, InProgress, OnHold] {
        assert!(from.can_transition_to(Cancelled), "{} → CANCELLED", from);
    }
    assert!(!OnHold.can_transition_to(Completed));
    assert!(!Planned.can_transition_to(OnHold));

    match Completed.transition(Cancelled) {
        Err(OmmError::InvalidTransition { entity, from, to }) => {
            assert_eq!(entity, "JobStatus");
            assert_eq!(from, "COMPLETED");
            assert_eq!(to, "CANCELLED");
        }
        other => panic!("期望 InvalidTransition, 实际 {:?}", other),
    }
}

#[test]
fn test_production_state_recovery() {
    let mut part = Part::new("Blank", PartType::RawMaterial, 1.0, 1.0, 1.0).unwrap();
    assert_eq!(part.state(), ProductionState::Raw);

    part.transition_state(ProductionState::WorkInProgress).unwrap();
    part.transition_state(ProductionState::Defective).unwrap();
    part.transition_state(ProductionState::WorkInProgress).unwrap();
    part.transition_state(ProductionState::Finished).unwrap();

    // FINISHED 之后只能进入 DEFECTIVE / ON_HOLD
    assert!(part.transition_state(ProductionState::Raw).is_err());
    assert_eq!(part.state(), ProductionState::Finished);
    part.transition_state(ProductionState::OnHold).unwrap();

    let purchased = Part::new("Screw", PartType::PurchasedComponent, 1.0, 1.0, 1.0).unwrap();
    assert_eq!(purchased.state(), ProductionState::Finished);
}

#[test]
fn test_resource_status_and_charging() {
    let mut station = test_helpers::workstation("WS-1");
    assert_eq!(station.status(), ResourceStatus::Idle);

    assert!(matches!(
        station.transition_status(ResourceStatus::Working),
        Err(OmmError::InvalidTransition { .. })
    ));
    assert_eq!(station.status(), ResourceStatus::Idle);

    station.transition_status(ResourceStatus::Wait).unwrap();
    station.transition_status(ResourceStatus::Working).unwrap();
    station.transition_status(ResourceStatus::Failed).unwrap();
    station.transition_status(ResourceStatus::Idle).unwrap();
    assert!(station.transition_status(ResourceStatus::Charging).is_err());

    let mut vehicle = Resource::new(
        "AGV",
        ResourceVariant::vehicle(VehicleType::AutomatedMobileRobot, 1.0, 50.0),
    )
    .unwrap();
    vehicle.set_speed(0.8).unwrap();
    vehicle.start_charging().unwrap();
    assert_eq!(vehicle.status(), ResourceStatus::Charging);
    vehicle.stop_charging().unwrap();
    assert_eq!(vehicle.status(), ResourceStatus::Idle);
    assert!(vehicle.stop_charging().is_err());
}

#[test]
fn test_invalid_action_transition_leaves_state() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);

    assert!(matches!(
        orch.complete_action("A-1"),
        Err(OmmError::InvalidTransition { .. })
    ));
    assert!(matches!(
        orch.transition_action("A-1", ActionStatus::InProgress),
        Err(OmmError::InvalidTransition { .. })
    ));
    assert_eq!(orch.get_action("A-1").unwrap().status(), ActionStatus::Requested);

    // CONFIRMED 后仍需作业开工
    orch.confirm_action("A-1").unwrap();
    assert!(matches!(
        orch.transition_action("A-1", ActionStatus::InProgress),
        Err(OmmError::ValidationError(_))
    ));
    assert_eq!(orch.get_action("A-1").unwrap().status(), ActionStatus::Confirmed);
}

#[test]
fn test_progress_only_settable_while_in_progress() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);

    assert!(orch.update_action("A-1", |a| a.set_progress(40.0)).is_err());
    orch.start_job("J-1").unwrap();
    let action = orch.update_action("A-1", |a| a.set_progress(40.0)).unwrap();
    assert_eq!(action.progress(), 40.0);
    assert!(orch.update_action("A-1", |a| a.set_progress(140.0)).is_err());

    orch.complete_action("A-1").unwrap();
    assert_eq!(orch.get_action("A-1").unwrap().progress(), 100.0);
}

#[test]
fn test_update_action_cannot_rewrite_status_or_assignment() {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[("A-1", 1, 1.0)]);
    orch.update_action("A-1", |a| a.add_requirement(Requirement::worker(&["Assembler"])?))
        .unwrap();
    orch.register_actor(test_helpers::worker("W-1", "Inspector")).unwrap();
    orch.assign_worker("A-1", "W-1").unwrap();
    orch.start_job("J-1").unwrap();
    assert_eq!(orch.get_action("A-1").unwrap().status(), ActionStatus::Requested);

    // 通过映射整体替换为 IN_PROGRESS
    let forced = orch.update_action("A-1", |a| {
        let mut mapping = a.to_mapping()?;
        mapping["status"] = serde_json::json!("IN_PROGRESS");
        *a = Action::from_mapping(mapping)?;
        Ok(())
    });
    assert!(matches!(forced, Err(OmmError::ValidationError(_))));
    assert_eq!(orch.get_action("A-1").unwrap().status(), ActionStatus::Requested);
    assert!(!orch.check_requirements("A-1").unwrap().satisfied);

    // 通过映射清除工人指派
    let unassigned = orch.update_action("A-1", |a| {
        let mut mapping = a.to_mapping()?;
        mapping["worker_id"] = serde_json::Value::Null;
        *a = Action::from_mapping(mapping)?;
        Ok(())
    });
    assert!(unassigned.is_err());
    assert_eq!(orch.get_action("A-1").unwrap().worker_id(), Some("W-1"));
    assert_eq!(orch.actions_for_worker("W-1").unwrap(), vec!["A-1"]);

    // 描述性属性仍可更新
    let renamed = orch
        .update_action("A-1", |a| {
            a.name = "Final assembly".to_string();
            a.set_duration_hours(2.5)
        })
        .unwrap();
    assert_eq!(renamed.duration_hours(), 2.5);
}
