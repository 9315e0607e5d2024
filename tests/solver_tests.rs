use approx::assert_relative_eq;
use multilateration::algorithms::{assess_geometry, GeometryQuality, SolverKind};
use multilateration::{
    BoundedSolver, BoundingBox, ClosedFormSolver, MultilaterationSolver, Multilaterator, SolveError, SolverSettings,
    SolverStrategy,
};
use nalgebra::Vector3;
use rand::distr::{Distribution, Uniform};
use rand::prelude::*;

fn room_anchors() -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(5.0, 0.0, 0.0),
        Vector3::new(0.0, 5.0, 0.0),
        Vector3::new(2.5, 2.5, 3.0),
    ]
}

fn distances_to(anchors: &[Vector3<f64>], point: &Vector3<f64>) -> Vec<f64> {
    anchors.iter().map(|a| (point - a).norm()).collect()
}

fn room_box() -> BoundingBox {
    BoundingBox::new([-1.0, -1.0, -1.0], [6.0, 6.0, 4.0])
}

#[test]
fn closed_form_round_trip_random_points() {
    let mut r = StdRng::seed_from_u64(0);
    let coordinate = Uniform::new(-2.0, 7.0).unwrap();
    let anchors = room_anchors();
    let solver = ClosedFormSolver::new();

    for _ in 0..200 {
        let truth = Vector3::new(coordinate.sample(&mut r), coordinate.sample(&mut r), coordinate.sample(&mut r));
        let point = solver.solve(&anchors, &distances_to(&anchors, &truth)).unwrap();
        assert_relative_eq!(point, truth, epsilon = 1e-6);
    }
}

#[test]
fn closed_form_reference_scenario() {
    let anchors = room_anchors();
    let truth = Vector3::new(1.0, 1.0, 1.0);
    let point = ClosedFormSolver::new()
        .solve(&anchors, &distances_to(&anchors, &truth))
        .unwrap();
    assert_relative_eq!(point, truth, epsilon = 1e-9);
}

#[test]
fn closed_form_coplanar_off_plane_target_fails_cleanly() {
    let anchors = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(5.0, 0.0, 0.0),
        Vector3::new(0.0, 5.0, 0.0),
        Vector3::new(2.5, 2.5, 0.0),
    ];
    assert_eq!(assess_geometry(&anchors), GeometryQuality::Coplanar);

    let truth = Vector3::new(1.0, 2.0, 3.0);
    let result = ClosedFormSolver::new().solve(&anchors, &distances_to(&anchors, &truth));
    assert!(matches!(result, Err(SolveError::Singular { .. })));
}

#[test]
fn bounded_solver_with_noise() {
    let mut r = StdRng::seed_from_u64(0);
    let noise = Uniform::new_inclusive(-0.02, 0.02).unwrap();
    let coordinate = Uniform::new(0.5, 4.5).unwrap();
    let height = Uniform::new(0.2, 2.8).unwrap();

    let mut anchors = room_anchors();
    anchors.push(Vector3::new(5.0, 5.0, 2.0));
    let solver = BoundedSolver::new(room_box());

    for _ in 0..50 {
        let truth = Vector3::new(coordinate.sample(&mut r), coordinate.sample(&mut r), height.sample(&mut r));
        let distances: Vec<f64> = distances_to(&anchors, &truth)
            .into_iter()
            .map(|d| d + noise.sample(&mut r))
            .collect();

        let point = solver.solve(&anchors, &distances).unwrap();
        assert!(room_box().contains(&point));
        assert_relative_eq!(point, truth, epsilon = 0.25);
    }
}

#[test]
fn strategies_agree_on_exact_input() {
    let anchors = room_anchors();
    let truth = Vector3::new(3.2, 1.4, 0.9);
    let distances = distances_to(&anchors, &truth);

    let settings = |strategy| SolverSettings {
        strategy,
        bounds: Some(room_box()),
        ..SolverSettings::default()
    };

    let closed = Multilaterator::new(&settings(SolverStrategy::ClosedForm))
        .solve(&anchors, &distances)
        .unwrap();
    let bounded = Multilaterator::new(&settings(SolverStrategy::Bounded))
        .solve(&anchors, &distances)
        .unwrap();

    assert_eq!(closed.kind, SolverKind::ClosedForm);
    assert_eq!(bounded.kind, SolverKind::Bounded);
    assert_relative_eq!(closed.point, bounded.point, epsilon = 1e-4);
}

#[test]
fn bounded_strategy_without_bounds_is_unavailable() {
    let solver = Multilaterator::new(&SolverSettings {
        strategy: SolverStrategy::Bounded,
        ..SolverSettings::default()
    });
    let anchors = room_anchors();
    assert_eq!(
        solver.solve(&anchors, &distances_to(&anchors, &Vector3::zeros())),
        Err(SolveError::NoSolverAvailable { count: 4 })
    );
}
