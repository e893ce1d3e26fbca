//! End-to-end layout scenarios, run against both row storages.

use tether_solver::{
    AnchorKey, LinearSystem, Resolution, RowStorageKind, RowVariables, SolverConfig, SolverError,
    Strength, Variable, VariableType,
};

const STORAGES: [RowStorageKind; 2] = [RowStorageKind::Linked, RowStorageKind::Hashed];

fn system(storage: RowStorageKind) -> LinearSystem {
    LinearSystem::with_config(SolverConfig::default().with_storage(storage)).unwrap()
}

fn anchors(system: &mut LinearSystem, count: u64) -> Vec<Variable> {
    (0..count)
        .map(|key| system.create_object_variable(AnchorKey(key)))
        .collect()
}

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 0.001,
        "expected {expected}, got {actual}"
    );
}

/// Keys never appear among their own terms, their `Basic` index matches
/// their table position, and no term is below epsilon.
fn assert_table_consistent(system: &LinearSystem) {
    let vars = system.variables();
    for (index, row) in system.rows().enumerate() {
        let key = row.key().expect("table rows are keyed");
        assert!(!row.variables().contains(key), "key {key} among its terms");
        if !row.is_simple_definition() {
            assert_eq!(vars[key].resolution(), Resolution::Basic { row: index });
        }
        for (id, value) in row.variables().terms() {
            assert!(value.abs() >= tether_solver::storage::EPSILON, "term {id} = {value}");
        }
    }
}

/// Every row keyed on a restricted variable has a non-negative constant.
fn assert_feasible(system: &LinearSystem) {
    let vars = system.variables();
    for row in system.rows() {
        let key = row.key().expect("table rows are keyed");
        if vars[key].kind().is_restricted() {
            assert!(row.constant() >= -0.001, "row {} infeasible", row.display(vars));
        }
    }
}

#[test]
fn test_equality_with_final_operand() {
    for storage in STORAGES {
        let mut system = system(storage);
        let vars = anchors(&mut system, 2);
        let (x, y) = (vars[0], vars[1]);
        system.add_equality(x, y, 10, Strength::Fixed).unwrap();
        system.add_equality_value(y, 5).unwrap();
        system.minimize().unwrap();

        assert_close(system.value(x).unwrap(), 15.0);
        assert_close(system.value(y).unwrap(), 5.0);
        assert_table_consistent(&system);
    }
}

#[test]
fn test_equality_after_final_operand() {
    for storage in STORAGES {
        let mut system = system(storage);
        let vars = anchors(&mut system, 2);
        let (a, b) = (vars[0], vars[1]);
        system.add_equality_value(b, 5).unwrap();
        let rows = system.num_equations();
        system.add_equality(a, b, 0, Strength::Fixed).unwrap();

        assert!(system.is_final_value(a).unwrap());
        assert_eq!(system.num_equations(), rows);
        system.minimize().unwrap();
        assert_close(system.value(a).unwrap(), 5.0);
    }
}

#[test]
fn test_greater_than_with_final_operand() {
    for storage in STORAGES {
        let mut system = system(storage);
        let vars = anchors(&mut system, 2);
        let (a, b) = (vars[0], vars[1]);
        system.add_equality_value(b, 0).unwrap();
        system.add_greater_than(a, b, 5, Strength::Fixed).unwrap();
        system.minimize().unwrap();

        assert!(system.value(a).unwrap() >= 5.0 - 0.001);
        let slack_values: Vec<f32> = system
            .variables()
            .iter()
            .filter(|variable| variable.kind() == VariableType::Slack)
            .map(|variable| variable.computed_value())
            .collect();
        assert_eq!(slack_values.len(), 1);
        assert!(slack_values.iter().all(|value| *value >= -0.001));
        assert_feasible(&system);
    }
}

#[test]
fn test_centering_with_coincident_anchors() {
    for storage in STORAGES {
        let mut system = system(storage);
        let vars = anchors(&mut system, 3);
        let (a, center, d) = (vars[0], vars[1], vars[2]);
        system.add_equality_value(a, 0).unwrap();
        system.add_equality_value(d, 100).unwrap();
        system
            .add_centering(a, center, 0, 0.5, center, d, 0, Strength::Fixed)
            .unwrap();
        system.minimize().unwrap();

        assert_close(system.value(center).unwrap(), 50.0);
    }
}

#[test]
fn test_weak_centering_settles_in_the_middle() {
    for storage in STORAGES {
        let mut system = system(storage);
        let vars = anchors(&mut system, 3);
        let (a, center, d) = (vars[0], vars[1], vars[2]);
        system.add_equality_value(a, 0).unwrap();
        system.add_equality_value(d, 100).unwrap();
        system
            .add_centering(a, center, 0, 0.5, center, d, 0, Strength::High)
            .unwrap();
        system.minimize().unwrap();

        assert_close(system.value(center).unwrap(), 50.0);
        assert_eq!(system.goal().len(), 2);
    }
}

#[test]
fn test_weak_equality_yields_to_required_inequality() {
    for storage in STORAGES {
        let mut system = system(storage);
        let vars = anchors(&mut system, 2);
        let (origin, a) = (vars[0], vars[1]);
        system.add_equality_value(origin, 0).unwrap();
        system.add_greater_than(a, origin, 10, Strength::Fixed).unwrap();
        system.add_equality(a, origin, 0, Strength::Low).unwrap();
        system.minimize().unwrap();

        assert_close(system.value(a).unwrap(), 10.0);
        assert_feasible(&system);
        assert_table_consistent(&system);
    }
}

#[test]
fn test_weak_equality_is_met_when_feasible() {
    for storage in STORAGES {
        let mut system = system(storage);
        let vars = anchors(&mut system, 2);
        let (origin, a) = (vars[0], vars[1]);
        system.add_equality_value(origin, 0).unwrap();
        system.add_greater_than(a, origin, 10, Strength::Fixed).unwrap();
        system.add_equality(a, origin, 30, Strength::Low).unwrap();
        system.minimize().unwrap();

        assert_close(system.value(a).unwrap(), 30.0);
        assert!(system.metrics().pivots > 0);
        assert_feasible(&system);
        assert_table_consistent(&system);
    }
}

/// Widgets of width 20 packed left to right with an 8 unit gap, each pulled
/// weakly towards the origin.
fn build_chain(system: &mut LinearSystem, count: u64) -> Vec<(Variable, Variable)> {
    let origin = system.create_object_variable(AnchorKey(0));
    system.add_equality_value(origin, 0).unwrap();
    let mut widgets = Vec::new();
    let mut previous = origin;
    for index in 0..count {
        let left = system.create_object_variable(AnchorKey(1 + index * 2));
        let right = system.create_object_variable(AnchorKey(2 + index * 2));
        system.add_equality(right, left, 20, Strength::Fixed).unwrap();
        system.add_greater_than(left, previous, 8, Strength::Fixed).unwrap();
        system.add_equality(left, origin, 0, Strength::Low).unwrap();
        widgets.push((left, right));
        previous = right;
    }
    widgets
}

#[test]
fn test_chain_respects_required_constraints() {
    for storage in STORAGES {
        let mut system = system(storage);
        let widgets = build_chain(&mut system, 4);
        system.minimize().unwrap();

        let mut previous_right = 0.0;
        for &(left, right) in &widgets {
            let (left, right) = (system.value(left).unwrap(), system.value(right).unwrap());
            assert_close(right - left, 20.0);
            assert!(left >= previous_right + 8.0 - 0.001);
            previous_right = right;
        }
        assert_feasible(&system);
        assert_table_consistent(&system);
    }
}

#[test]
fn test_reset_gives_identical_results() {
    for storage in STORAGES {
        let mut system = system(storage);
        let widgets = build_chain(&mut system, 3);
        system.minimize().unwrap();
        let first: Vec<f32> = widgets
            .iter()
            .map(|&(left, _)| system.value(left).unwrap())
            .collect();
        let first_rows = system.readable_rows();

        system.reset();
        assert_eq!(system.num_equations(), 0);
        assert_eq!(system.num_variables(), 0);
        let widgets = build_chain(&mut system, 3);
        system.minimize().unwrap();
        let second: Vec<f32> = widgets
            .iter()
            .map(|&(left, _)| system.value(left).unwrap())
            .collect();

        assert_eq!(first, second);
        assert_eq!(first_rows, system.readable_rows());
    }
}

#[test]
fn test_reset_reuses_pooled_rows() {
    let mut system = LinearSystem::new();
    build_chain(&mut system, 3);
    system.reset();
    assert!(!system.cache().row_pool().is_empty());
    assert!(!system.cache().variable_pool().is_empty());
}

#[test]
fn test_handles_from_previous_pass_are_stale() {
    let mut system = LinearSystem::new();
    let vars = anchors(&mut system, 2);
    let row = system.create_row();
    system.reset();

    assert!(matches!(
        system.value(vars[0]),
        Err(SolverError::StaleVariable { .. })
    ));
    assert!(matches!(
        system.add_greater_than(vars[0], vars[1], 1, Strength::Low),
        Err(SolverError::StaleVariable { .. })
    ));
    assert!(matches!(
        system.add_constraint(row),
        Err(SolverError::StaleRow { .. })
    ));
}

#[test]
fn test_graph_optimizer_skips_fully_solved_tables() {
    let config = SolverConfig::default().with_graph_optimizer(true);
    let mut system = LinearSystem::with_config(config).unwrap();
    let vars = anchors(&mut system, 2);
    system.create_error_variable(Strength::Low, None);
    system.add_equality_value(vars[0], 3).unwrap();
    system.add_equality(vars[1], vars[0], 4, Strength::Fixed).unwrap();
    system.minimize().unwrap();

    assert_eq!(system.metrics().fully_solved, 1);
    assert_eq!(system.metrics().minimize_goal, 0);
    assert_close(system.value(vars[1]).unwrap(), 7.0);
}

#[test]
fn test_object_variable_value_rounds() {
    let mut system = LinearSystem::new();
    let vars = anchors(&mut system, 3);
    system.add_equality_value(vars[0], 0).unwrap();
    system.add_equality_value(vars[2], 5).unwrap();
    system
        .add_centering(vars[0], vars[1], 0, 0.5, vars[1], vars[2], 0, Strength::Fixed)
        .unwrap();
    system.minimize().unwrap();

    assert_close(system.value(vars[1]).unwrap(), 2.5);
    assert_eq!(system.object_variable_value(AnchorKey(1)), Some(3));
    assert_eq!(system.object_variable_value(AnchorKey(9)), None);
}
