//! Synthetic plate generation for demos and fixtures.
//!
//! A plate is a fixed layout of twelve wells covering the shapes the analyzer
//! has to tell apart: clean amplification curves with different midpoints and
//! plateaus, a flat negative control, a linear drift, a growth curve with a
//! sudden drop, and a heavily noisy trace. Gaussian noise is drawn from a
//! seeded `StdRng`, so the same `(cycles, seed)` always yields the same plate.

use std::fs::File;
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde_json::{Map, Value, json};

use crate::domain::WellSample;
use crate::error::AppError;
use crate::models::{SigmoidParams, sigmoid};

/// Fewest cycles a synthetic plate can have.
pub const MIN_PLATE_CYCLES: usize = 10;

/// Measurement noise on every well (RFU, one sigma).
const READ_NOISE: f64 = 6.0;

/// Shape of one synthetic well.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleKind {
    /// Clean amplification; the midpoint is a fraction of the run length.
    Sigmoid { amplitude: f64, midpoint_frac: f64, baseline: f64 },
    /// No amplification.
    Flat { level: f64 },
    /// Linear rise without a plateau.
    Drift { start: f64, slope: f64 },
    /// Amplification with one reading dropped inside the growth phase.
    NegativeSpike { amplitude: f64 },
    /// Weak amplification buried in noise.
    Noisy { amplitude: f64, sigma: f64 },
}

/// Well layout of the demo plate.
pub const PLATE_LAYOUT: [(&str, SampleKind); 12] = [
    ("A1", SampleKind::Sigmoid { amplitude: 1000.0, midpoint_frac: 0.50, baseline: 100.0 }),
    ("A2", SampleKind::Sigmoid { amplitude: 1400.0, midpoint_frac: 0.45, baseline: 120.0 }),
    ("A3", SampleKind::Sigmoid { amplitude: 800.0, midpoint_frac: 0.55, baseline: 90.0 }),
    ("A4", SampleKind::Sigmoid { amplitude: 2000.0, midpoint_frac: 0.40, baseline: 150.0 }),
    ("A5", SampleKind::Sigmoid { amplitude: 600.0, midpoint_frac: 0.60, baseline: 80.0 }),
    ("A6", SampleKind::Sigmoid { amplitude: 1200.0, midpoint_frac: 0.65, baseline: 110.0 }),
    ("B1", SampleKind::Flat { level: 200.0 }),
    ("B2", SampleKind::Flat { level: 350.0 }),
    ("B3", SampleKind::Drift { start: 100.0, slope: 15.0 }),
    ("B4", SampleKind::NegativeSpike { amplitude: 1000.0 }),
    ("B5", SampleKind::Noisy { amplitude: 300.0, sigma: 120.0 }),
    ("B6", SampleKind::Sigmoid { amplitude: 900.0, midpoint_frac: 0.35, baseline: 100.0 }),
];

/// Generate the demo plate with cycles `1..=cycles`.
pub fn generate_plate(cycles: usize, seed: u64) -> Result<Vec<WellSample>, AppError> {
    if cycles < MIN_PLATE_CYCLES {
        return Err(AppError::input(format!(
            "A synthetic plate needs at least {MIN_PLATE_CYCLES} cycles (got {cycles})."
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, READ_NOISE).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let axis: Vec<f64> = (1..=cycles).map(|c| c as f64).collect();

    PLATE_LAYOUT
        .iter()
        .map(|&(id, kind)| {
            let mut rfu = clean_trace(kind, &axis);
            if let SampleKind::Noisy { sigma, .. } = kind {
                let heavy = Normal::new(0.0, sigma)
                    .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
                rfu.iter_mut().for_each(|v| *v += heavy.sample(&mut rng));
            }
            rfu.iter_mut().for_each(|v| *v += noise.sample(&mut rng));
            Ok(WellSample::new(id, axis.clone(), rfu))
        })
        .collect()
}

fn clean_trace(kind: SampleKind, axis: &[f64]) -> Vec<f64> {
    let n = axis.len() as f64;
    match kind {
        SampleKind::Sigmoid {
            amplitude,
            midpoint_frac,
            baseline,
        } => {
            let params = SigmoidParams::new(amplitude, 0.5, n * midpoint_frac, baseline);
            axis.iter().map(|&x| params.at(x)).collect()
        }
        SampleKind::Flat { level } => vec![level; axis.len()],
        SampleKind::Drift { start, slope } => axis.iter().map(|&x| start + slope * x).collect(),
        SampleKind::NegativeSpike { amplitude } => {
            let mut rfu: Vec<f64> = axis.iter().map(|&x| sigmoid(x, amplitude, 0.5, n * 0.5, 100.0)).collect();
            // Lands inside the exponential-phase window for any run length.
            let spike = axis.len() * 2 / 5;
            rfu[spike] -= amplitude * 0.6;
            rfu
        }
        SampleKind::Noisy { amplitude, .. } => axis
            .iter()
            .map(|&x| sigmoid(x, amplitude, 0.5, n * 0.5, 100.0))
            .collect(),
    }
}

/// Write wells in the JSON input layout (`{ id: { cycles, rfu } }`), keeping order.
pub fn write_plate_json(path: &Path, wells: &[WellSample]) -> Result<(), AppError> {
    let mut plate = Map::new();
    for well in wells {
        plate.insert(well.well_id.clone(), json!({ "cycles": well.cycles, "rfu": well.rfu }));
    }

    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create plate JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &Value::Object(plate))
        .map_err(|e| AppError::output(format!("Failed to write plate JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::detect_curve_anomalies;
    use crate::domain::AnomalyTag;
    use crate::fit::analyze_curve_quality;

    fn well<'a>(plate: &'a [WellSample], id: &str) -> &'a WellSample {
        plate.iter().find(|w| w.well_id == id).unwrap()
    }

    #[test]
    fn same_seed_same_plate() {
        let a = generate_plate(40, 7).unwrap();
        let b = generate_plate(40, 7).unwrap();
        let c = generate_plate(40, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), PLATE_LAYOUT.len());
        assert!(a.iter().all(|w| w.cycles.len() == 40 && w.rfu.len() == 40));
    }

    #[test]
    fn too_few_cycles_is_rejected() {
        let err = generate_plate(6, 1).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn clean_wells_fit_as_good_curves() {
        let plate = generate_plate(40, 42).unwrap();
        for id in ["A1", "A2", "A3", "A4"] {
            let w = well(&plate, id);
            let fit = analyze_curve_quality(&w.cycles, &w.rfu).unwrap();
            assert!(fit.is_good_scurve, "{id}: r2={}", fit.r2_score);
        }
    }

    #[test]
    fn pathological_wells_carry_their_tags() {
        let plate = generate_plate(40, 42).unwrap();

        let flat = well(&plate, "B1");
        assert!(detect_curve_anomalies(&flat.cycles, &flat.rfu).contains(&AnomalyTag::LowAmplitude));

        let spike = well(&plate, "B4");
        assert!(detect_curve_anomalies(&spike.cycles, &spike.rfu).contains(&AnomalyTag::NegativeAmplification));
    }

    #[test]
    fn plate_json_reads_back_in_order() {
        let plate = generate_plate(12, 3).unwrap();
        let path = std::env::temp_dir().join(format!("qpcr-plate-{}.json", std::process::id()));
        write_plate_json(&path, &plate).unwrap();

        let file = File::open(&path).unwrap();
        let wells = crate::io::read_wells_json(file).unwrap();
        std::fs::remove_file(&path).ok();

        let ids: Vec<&str> = wells.iter().map(|w| w.well_id.as_str()).collect();
        let expected: Vec<&str> = PLATE_LAYOUT.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, expected);
        assert_eq!(wells[0].rfu.as_deref(), Some(plate[0].rfu.as_slice()));
    }
}
