// ==========================================
// 需求匹配测试
// ==========================================
// 测试范围:
// 1. 工人角色匹配（满足 / 缺失描述）
// 2. 资源变体与能力匹配
// 3. 零件库存检查不修改库存
// 4. 产品范围
// 5. 开工后匹配结果为 (true, [])
// 6. 多资源需求: 指派资源与分配表中的资源共同参与匹配
// ==========================================


use omm_orchestrator::domain::types::{ActionType, PartType, RequirementKind, StorageType};
use omm_orchestrator::domain::{
    Action, OmmError, Part, Requirement, Resource, ResourceVariant, SpecValue, StoredItem,
};
use omm_orchestrator::engine::JobOrchestrator;

fn job_with_requirements(requirements: Vec<Requirement>) -> JobOrchestrator {
    let orch = test_helpers::orchestrator();
    test_helpers::setup_job(&orch, "J-1", &[]);
    let mut action = Action::new("Assemble", ActionType::Assembly, 1, 1.0)
        .unwrap()
        .with_id("A-1");
    for requirement in requirements {
        action.add_requirement(requirement).unwrap();
    }
    orch.add_action("J-1", action).unwrap();
    orch
}

#[test]
fn test_worker_role_match_and_missing_description() {
    let orch = job_with_requirements(vec![Requirement::worker(&["Assembler"]).unwrap()]);
    orch.register_actor(test_helpers::worker("W-ASM", "Assembler")).unwrap();
    orch.register_actor(test_helpers::worker("W-INS", "Inspector")).unwrap();

    orch.assign_worker("A-1", "W-ASM").unwrap();
    let (satisfied, missing) = orch.check_requirements("A-1").unwrap().into_pair();
    assert!(satisfied);
    assert!(missing.is_empty());

    orch.assign_worker("A-1", "W-INS").unwrap();
    let (satisfied, missing) = orch.check_requirements("A-1").unwrap().into_pair();
    assert!(!satisfied);
    assert_eq!(missing, vec!["Worker: Assembler".to_string()]);
    assert_eq!(orch.actions_for_worker("W-INS").unwrap(), vec!["A-1"]);
    assert!(orch.actions_for_worker("W-ASM").unwrap().is_empty());
}

#[test]
fn test_stakeholder_cannot_be_assigned_as_worker() {
    let orch = job_with_requirements(vec![]);
    orch.register_actor(
        omm_orchestrator::domain::Actor::stakeholder("Customer")
            .unwrap()
            .with_id("C-1"),
    )
    .unwrap();
    assert!(matches!(
        orch.assign_worker("A-1", "C-1"),
        Err(OmmError::ValidationError(_))
    ));
}

#[test]
fn test_worker_tag_satisfies_requirement() {
    let orch = job_with_requirements(vec![Requirement::worker(&["welding"]).unwrap()]);
    let welder = omm_orchestrator::domain::Actor::worker("Sam")
        .unwrap()
        .with_id("W-1")
        .with_role("Fabricator", &["Welding", "Grinding"])
        .unwrap();
    orch.register_actor(welder).unwrap();
    orch.assign_worker("A-1", "W-1").unwrap();
    assert!(orch.check_requirements("A-1").unwrap().satisfied);
}

#[test]
fn test_resource_variant_and_capability() {
    let orch = job_with_requirements(vec![
        Requirement::resource(RequirementKind::Machine, &["cnc"]).unwrap(),
    ]);
    let mut mill = Resource::new("Mill", ResourceVariant::machine("Milling"))
        .unwrap()
        .with_id("R-MILL");
    mill.add_capability("CNC").unwrap();
    orch.register_resource(mill).unwrap();
    orch.register_resource(
        Resource::new("Torch", ResourceVariant::tool("Welding Torch"))
            .unwrap()
            .with_id("R-TORCH"),
    )
    .unwrap();

    orch.assign_resource("A-1", "R-TORCH").unwrap();
    let outcome = orch.check_requirements("A-1").unwrap();
    assert_eq!(outcome.missing, vec!["Machine: cnc".to_string()]);

    orch.assign_resource("A-1", "R-MILL").unwrap();
    assert!(orch.check_requirements("A-1").unwrap().satisfied);
}

#[test]
fn test_machine_and_tool_both_allocated_satisfy_action() {
    let orch = job_with_requirements(vec![
        Requirement::resource(RequirementKind::Machine, &[]).unwrap(),
        Requirement::resource(RequirementKind::Tool, &[]).unwrap(),
    ]);
    orch.register_resource(
        Resource::new("Press", ResourceVariant::machine("Press"))
            .unwrap()
            .with_id("M-1"),
    )
    .unwrap();
    orch.register_resource(
        Resource::new("Die", ResourceVariant::tool("Stamping Die"))
            .unwrap()
            .with_id("T-1"),
    )
    .unwrap();

    orch.assign_resource("A-1", "M-1").unwrap();
    orch.allocate_resource("A-1", "M-1", None).unwrap();
    let (satisfied, missing) = orch.check_requirements("A-1").unwrap().into_pair();
    assert!(!satisfied);
    assert_eq!(missing, vec!["Tool: any".to_string()]);

    orch.allocate_resource("A-1", "T-1", None).unwrap();
    assert!(orch.check_requirements("A-1").unwrap().satisfied);

    let report = orch.start_job("J-1").unwrap();
    assert_eq!(report.started_actions, vec!["A-1"]);
    assert!(report.deferred.is_empty());
}

#[test]
fn test_part_check_does_not_mutate_inventory() {
    let orch = job_with_requirements(vec![Requirement::part("Bolt", Some(5.0)).unwrap()]);
    let storage = orch.create_storage("Main", StorageType::Warehouse, 10.0).unwrap();
    orch.add_item_to_storage(
        &storage,
        StoredItem::Part(
            Part::new("Bolt", PartType::PurchasedComponent, 3.0, 0.5, 0.1)
                .unwrap()
                .with_id("B-1"),
        ),
    )
    .unwrap();

    let outcome = orch.check_requirements("A-1").unwrap();
    assert_eq!(outcome.missing, vec!["Part: Bolt x 5".to_string()]);

    let second = orch.create_storage("Overflow", StorageType::Rack, 10.0).unwrap();
    orch.add_item_to_storage(
        &second,
        StoredItem::Part(
            Part::new("Bolt", PartType::PurchasedComponent, 2.0, 0.5, 0.1)
                .unwrap()
                .with_id("B-2"),
        ),
    )
    .unwrap();

    assert!(orch.check_requirements("A-1").unwrap().satisfied);
    assert!(orch.check_requirements("A-1").unwrap().satisfied);
    assert_eq!(orch.total_part_quantity("Bolt").unwrap(), 5.0);
}

#[test]
fn test_product_scope_by_name() {
    let orch = job_with_requirements(vec![
        Requirement::new(RequirementKind::Product, vec![SpecValue::from("Widget")]).unwrap(),
    ]);
    assert!(orch.check_requirements("A-1").unwrap().satisfied);

    let other = job_with_requirements(vec![
        Requirement::new(RequirementKind::Product, vec![SpecValue::from("Gearbox")]).unwrap(),
    ]);
    assert!(!other.check_requirements("A-1").unwrap().satisfied);
}

#[test]
fn test_all_missing_reported_together() {
    let orch = job_with_requirements(vec![
        Requirement::worker(&["Assembler"]).unwrap(),
        Requirement::resource(RequirementKind::Workstation, &[]).unwrap(),
        Requirement::part("Gear", None).unwrap(),
    ]);
    let outcome = orch.check_requirements("A-1").unwrap();
    assert!(!outcome.satisfied);
    assert_eq!(outcome.missing.len(), 3);
}

#[test]
fn test_in_progress_action_reports_satisfied() {
    let orch = job_with_requirements(vec![
        Requirement::worker(&["Assembler"]).unwrap(),
        Requirement::resource(RequirementKind::Workstation, &[]).unwrap(),
    ]);
    orch.register_actor(test_helpers::worker("W-1", "Assembler")).unwrap();
    orch.register_resource(test_helpers::workstation("WS-1")).unwrap();

    // 需求未满足时作业开工,工序被暂缓
    let report = orch.start_job("J-1").unwrap();
    assert_eq!(report.deferred.len(), 1);
    assert_eq!(report.deferred[0].missing.len(), 2);

    orch.assign_worker("A-1", "W-1").unwrap();
    orch.assign_resource("A-1", "WS-1").unwrap();
    orch.start_action("A-1").unwrap();

    assert_eq!(
        orch.check_requirements("A-1").unwrap().into_pair(),
        (true, Vec::<String>::new())
    );
}

#[test]
fn test_start_gate_returns_missing_list() {
    let orch = job_with_requirements(vec![Requirement::worker(&["Assembler"]).unwrap()]);
    orch.start_job("J-1").unwrap();

    match orch.start_action("A-1") {
        Err(OmmError::RequirementUnsatisfied { action_id, missing }) => {
            assert_eq!(action_id, "A-1");
            assert_eq!(missing, vec!["Worker: Assembler".to_string()]);
        }
        other => panic!("期望 RequirementUnsatisfied, 实际 {:?}", other),
    }
}

#[test]
fn test_malformed_requirement_rejected() {
    assert!(Requirement::part("Bolt", Some(-1.0)).is_err());
    assert!(Requirement::parse("TELEPORTER", vec![]).is_err());
}
