//! Health Laplacian.
//!
//! `delta_h(v) = raw_risk(v) - mean(raw_risk(u))` over the neighbours `u`
//! of `v` in either edge direction. A positive value marks a file that is
//! riskier than its structural neighbourhood. Works in every tier because
//! raw risk does not depend on percentiles.

use super::composites::{churn_factor, RISK_WEIGHTS};
use super::field::SignalField;
use crate::graph::DependencyGraph;
use crate::math::clamp01;

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

/// Fill `raw_risk` on every file: the risk formula over max-normalised
/// values instead of percentiles.
pub fn compute_raw_risks(field: &mut SignalField) {
    let files = field.per_file.values();
    let (mut max_pr, mut max_blast, mut max_cog, mut max_bf) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for fs in files {
        max_pr = max_pr.max(fs.pagerank);
        max_blast = max_blast.max(fs.blast_radius_size as f64);
        max_cog = max_cog.max(fs.cognitive_load);
        max_bf = max_bf.max(fs.bus_factor);
    }

    for fs in field.per_file.values_mut() {
        let bus = if max_bf > 0.0 {
            1.0 - fs.bus_factor / max_bf
        } else {
            0.0
        };
        let terms = [
            ratio(fs.pagerank, max_pr),
            ratio(fs.blast_radius_size as f64, max_blast),
            ratio(fs.cognitive_load, max_cog),
            churn_factor(fs.churn_trajectory),
            bus,
        ];
        fs.raw_risk = clamp01(RISK_WEIGHTS.iter().zip(terms).map(|(w, t)| w * t).sum());
    }
}

/// Fill `delta_h` for every file in the field. Files without neighbours in
/// the field get exactly 0.0.
pub fn health_laplacian(field: &mut SignalField, graph: &DependencyGraph) {
    let mut deltas = Vec::with_capacity(field.per_file.len());
    for (path, fs) in &field.per_file {
        let neighbours: Vec<f64> = graph
            .index_of(path)
            .map(|v| {
                graph
                    .undirected_neighbors(v)
                    .into_iter()
                    .filter_map(|u| field.per_file.get(graph.path(u)))
                    .map(|n| n.raw_risk)
                    .collect()
            })
            .unwrap_or_default();
        let delta = if neighbours.is_empty() {
            0.0
        } else {
            fs.raw_risk - neighbours.iter().sum::<f64>() / neighbours.len() as f64
        };
        deltas.push((path.clone(), delta));
    }

    for (path, delta) in deltas {
        if let Some(fs) = field.per_file.get_mut(&path) {
            fs.delta_h = delta;
        }
        field.delta_h.insert(path, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::field::FileSignals;

    const EPSILON: f64 = 1e-9;

    fn field_with_risk(risks: &[(&str, f64)]) -> SignalField {
        let mut field = SignalField::new(risks.len());
        for &(path, risk) in risks {
            let mut fs = FileSignals::new(path);
            fs.raw_risk = risk;
            field.per_file.insert(path.to_string(), fs);
        }
        field
    }

    #[test]
    fn test_isolated_file_is_zero() {
        let mut field = field_with_risk(&[("a.py", 0.9), ("b.py", 0.1)]);
        let g = DependencyGraph::from_edges(["a.py", "b.py"], std::iter::empty());
        health_laplacian(&mut field, &g);
        assert_eq!(field.delta_h["a.py"], 0.0);
        assert_eq!(field.file("b.py").unwrap().delta_h, 0.0);
    }

    #[test]
    fn test_risky_hub_among_calm_neighbours() {
        let mut field = field_with_risk(&[
            ("hub.py", 0.8),
            ("x.py", 0.2),
            ("y.py", 0.2),
            ("z.py", 0.2),
        ]);
        // Mixed directions: neighbours count either way
        let g = DependencyGraph::from_edges(
            ["hub.py", "x.py", "y.py", "z.py"],
            [("hub.py", "x.py"), ("y.py", "hub.py"), ("hub.py", "z.py")],
        );
        health_laplacian(&mut field, &g);
        assert!((field.delta_h["hub.py"] - 0.6).abs() < EPSILON);
        assert!((field.delta_h["x.py"] + 0.6).abs() < EPSILON);
    }

    #[test]
    fn test_raw_risk_uses_max_normalisation() {
        let mut field = SignalField::new(2);
        let mut hot = FileSignals::new("hot.py");
        hot.pagerank = 0.5;
        hot.blast_radius_size = 10;
        hot.cognitive_load = 40.0;
        hot.bus_factor = 1.0;
        hot.churn_trajectory = crate::git::Trajectory::Churning;
        let mut cold = FileSignals::new("cold.py");
        cold.pagerank = 0.25;
        cold.bus_factor = 2.0;
        field.per_file.insert("hot.py".into(), hot);
        field.per_file.insert("cold.py".into(), cold);

        compute_raw_risks(&mut field);
        // 0.25 + 0.20 + 0.20 + 0.20 + 0.15 * 0.5
        assert!((field.file("hot.py").unwrap().raw_risk - 0.925).abs() < EPSILON);
        // 0.25 * 0.5 + 0.20 * 0.3
        assert!((field.file("cold.py").unwrap().raw_risk - 0.185).abs() < EPSILON);
    }
}
