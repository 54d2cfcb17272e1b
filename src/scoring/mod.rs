//! Risk scoring over cached scan results

pub mod engine;

pub use engine::{score_package, PackageScore, ScoreBreakdown, ScoreEngine, ScoreReport};
