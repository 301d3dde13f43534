//! Library-level generation scenarios with seeded randomness

mod common;

use common::is_multiple_of;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spcs::core::constants::{SUBGROUP_COUNT, SUBGROUP_SIZE};
use spcs::core::{
    check_rules, compute_control_limits, evaluate_difficulty, generate_reference_range,
    generate_standard, run_task, subgroup_stats, DifficultyTier, Feasibility, GenerationMode,
    GeneratorConfig, KeepTarget, ReferenceRange, Resolution, SpcData, Tolerance,
};
use spcs::entities::{Plan, TaskMode};
use spcs::parse::parse_tolerance;
use spcs::yaml::parse_yaml;

fn assert_chart_shape(data: &SpcData) {
    assert_eq!(data.quantized.len(), SUBGROUP_SIZE);
    assert!(data.quantized.iter().all(|row| row.len() == SUBGROUP_COUNT));
    assert_eq!(data.x_bar.len(), SUBGROUP_COUNT);
    assert_eq!(data.ranges.len(), SUBGROUP_COUNT);
}

// ============================================================================
// Standard search
// ============================================================================

#[test]
fn test_standard_data_passes_rules_and_resolution() {
    let tol = Tolerance::double(10.0, 8.0).unwrap();
    let limits = compute_control_limits(&tol, 1.33, None).unwrap();
    let res: Resolution = "0.01".parse().unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    let data = generate_standard(&tol, &limits, 1.33, Some(res), 2000, &mut rng)
        .unwrap()
        .expect("a clean candidate");

    assert_chart_shape(&data);
    assert_eq!(data.mode, GenerationMode::Standard);
    assert!(data.quantized.iter().flatten().all(|&v| is_multiple_of(v, 0.01)));
    assert!(check_rules(&data.x_bar, &data.ranges, &limits).is_empty());
    if data.accepted {
        assert!((data.cpk - 1.33).abs() <= 0.03 + 1e-9);
    }
}

#[test]
fn test_statistics_match_the_matrix() {
    let tol = Tolerance::double(25.2, 24.8).unwrap();
    let limits = compute_control_limits(&tol, 1.67, None).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    let data = generate_standard(&tol, &limits, 1.67, None, 1500, &mut rng)
        .unwrap()
        .expect("a clean candidate");
    let (x_bar, ranges) = subgroup_stats(&data.quantized).unwrap();
    for (a, b) in x_bar.iter().zip(&data.x_bar) {
        assert!((a - b).abs() < 1e-12);
    }
    for (a, b) in ranges.iter().zip(&data.ranges) {
        assert!((a - b).abs() < 1e-12);
    }
    let mean: f64 = x_bar.iter().sum::<f64>() / x_bar.len() as f64;
    assert!((mean - data.grand_mean).abs() < 1e-9);
}

#[test]
fn test_even_hundredths_gauge() {
    let tol = parse_tolerance("φ3.5±0.1").unwrap();
    let limits = compute_control_limits(&tol, 1.33, None).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    let res = Some(Resolution::EvenHundredths);
    let data = generate_standard(&tol, &limits, 1.33, res, 1500, &mut rng)
        .unwrap()
        .expect("a clean candidate");
    assert!(data.quantized.iter().flatten().all(|&v| is_multiple_of(v, 0.02)));
    assert!(check_rules(&data.x_bar, &data.ranges, &limits).is_empty());
}

#[test]
fn test_same_seed_same_data() {
    let tol = Tolerance::double(10.0, 8.0).unwrap();
    let limits = compute_control_limits(&tol, 1.33, None).unwrap();
    let res = Some(Resolution::Decimal(3));

    let a = generate_standard(&tol, &limits, 1.33, res, 300, &mut StdRng::seed_from_u64(5));
    let b = generate_standard(&tol, &limits, 1.33, res, 300, &mut StdRng::seed_from_u64(5));
    assert_eq!(a.unwrap(), b.unwrap());
}

#[test]
fn test_tiny_budget_does_not_panic() {
    let tol = Tolerance::double(10.0, 8.0).unwrap();
    let limits = compute_control_limits(&tol, 3.0, None).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    assert!(generate_standard(&tol, &limits, 3.0, None, 1, &mut rng).is_ok());
    assert!(generate_standard(&tol, &limits, 3.0, None, 0, &mut rng)
        .unwrap()
        .is_none());
}

#[test]
fn test_upper_only_tolerance() {
    let tol = parse_tolerance("≤0.05").unwrap();
    let limits = compute_control_limits(&tol, 1.33, None).unwrap();
    let mut rng = StdRng::seed_from_u64(8);
    let res = Some(Resolution::Decimal(4));
    let result = generate_standard(&tol, &limits, 1.33, res, 500, &mut rng);
    assert!(result.is_ok());
}

// ============================================================================
// Reference-range search
// ============================================================================

#[test]
fn test_reference_band_outside_tolerance_is_rejected() {
    let tol = Tolerance::double(53.005, 52.985).unwrap();
    let limits = compute_control_limits(&tol, 1.33, Some(53.0)).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let result =
        generate_reference_range(&tol, &limits, 1.33, None, 52.98, 53.0, 100, &mut rng);
    assert!(result.is_err());
}

#[test]
fn test_reference_data_stays_in_band() {
    let tol = Tolerance::double(53.005, 52.985).unwrap();
    let limits = compute_control_limits(&tol, 1.33, Some(52.9955)).unwrap();
    let res = Some(Resolution::Decimal(4));
    let mut rng = StdRng::seed_from_u64(21);

    let data =
        generate_reference_range(&tol, &limits, 1.33, res, 52.992, 52.999, 1500, &mut rng)
            .unwrap()
            .expect("band reachable at Cpk 1.33");

    assert_chart_shape(&data);
    assert_eq!(data.mode, GenerationMode::ReferenceRange);
    assert!(data.accepted);
    assert!(data.x_bar.iter().all(|&x| (52.992..=52.999).contains(&x)));
    let inside = data
        .quantized
        .iter()
        .flatten()
        .filter(|&&v| (52.992..=52.999).contains(&v))
        .count();
    assert!(inside >= 100);
    assert!(check_rules(&data.x_bar, &data.ranges, &limits).is_empty());
}

#[test]
fn test_unreachable_reference_target_is_not_an_error() {
    let tol = Tolerance::double(53.005, 52.985).unwrap();
    let band = ReferenceRange::new(52.992, 52.999).unwrap();
    let assessment = evaluate_difficulty(&tol, &band, 5.0);
    assert_eq!(assessment.feasibility, Feasibility::Above);
    assert_eq!(assessment.tier, DifficultyTier::High);

    let limits = compute_control_limits(&tol, 5.0, Some(band.center())).unwrap();
    let mut rng = StdRng::seed_from_u64(4);
    let result =
        generate_reference_range(&tol, &limits, 5.0, None, 52.992, 52.999, 2000, &mut rng);

    match result {
        Ok(None) => {}
        Ok(Some(data)) => {
            assert_eq!(data.mode, GenerationMode::StandardFallback);
            assert_chart_shape(&data);
            assert!(check_rules(&data.x_bar, &data.ranges, &limits).is_empty());
        }
        Err(e) => panic!("exhaustion reported as an error: {}", e),
    }
}

// ============================================================================
// Task service
// ============================================================================

#[test]
fn test_plan_tasks_run_through_the_service() {
    let plan: Plan = parse_yaml(
        r#"
defaults:
  target_cpk: 1.33
  resolution: 0.01
tasks:
  - product_model: HX-200
    process: Turning
    inspection_item: OD
    theory: "φ20±0.1"
  - product_model: HX-200
    process: Turning
    inspection_item: Thread
    theory: "M8"
"#,
        "plan.yaml",
    )
    .unwrap();
    let config = GeneratorConfig {
        standard_attempts: 1000,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(12);
    let tasks = plan.resolved_tasks();

    let report = run_task(&tasks[0], TaskMode::Standard, &config, &mut KeepTarget, &mut rng)
        .unwrap();
    assert_eq!(report.target_cpk, 1.33);
    assert!((report.limits.cl - 20.0).abs() < 1e-9);
    if let Some(data) = &report.data {
        assert!(data.quantized.iter().flatten().all(|&v| is_multiple_of(v, 0.01)));
    }

    assert!(
        run_task(&tasks[1], TaskMode::Standard, &config, &mut KeepTarget, &mut rng).is_err()
    );
}
