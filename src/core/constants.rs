//! Control chart constants and generation defaults
//!
//! Chart factors are the tabulated values for subgroups of five.

/// Relative-range factor d2 for n = 5 (σ = R̄ / d2)
pub const D2: f64 = 2.326;

/// Lower range-chart factor D3 for n = 5
pub const D3: f64 = 0.0;

/// Upper range-chart factor D4 for n = 5
pub const D4: f64 = 2.114;

/// Measurements per subgroup (rows of the data matrix)
pub const SUBGROUP_SIZE: usize = 5;

/// Subgroups per chart (columns of the data matrix)
pub const SUBGROUP_COUNT: usize = 25;

/// Total measurements in one chart
pub const SAMPLE_COUNT: usize = SUBGROUP_SIZE * SUBGROUP_COUNT;

pub const DEFAULT_TARGET_CPK: f64 = 1.8;

/// Accepted distance between the recomputed and the target Cpk
pub const DEFAULT_CPK_WINDOW: f64 = 0.03;

/// Decimal places used for published control limits and intermediate targets
pub const LIMIT_DECIMALS: u32 = 3;

pub const DEFAULT_STANDARD_ATTEMPTS: usize = 4_000;
pub const DEFAULT_REFERENCE_ATTEMPTS: usize = 20_000;

/// Redraw cap when expanding one subgroup into measurements
pub const SUBGROUP_ATTEMPTS: usize = 200;

/// Raw points (of 125) that must sit inside the reference band
pub const MIN_POINTS_IN_REFERENCE: usize = 100;

/// Points per subgroup pushed into the reference band
pub const MIN_SUBGROUP_POINTS_IN_REFERENCE: usize = 4;

/// Within-subgroup sigma below this is treated as zero
pub const SIGMA_EPSILON: f64 = 1e-10;

/// Instrument resolutions seen on inspection plans
pub const SUPPORTED_RESOLUTIONS: [f64; 6] = [0.1, 0.01, 0.02, 0.001, 0.0001, 0.00001];

/// Slack used when comparing a target Cpk against its theoretical interval
pub const FEASIBILITY_SLACK: f64 = 0.01;
