//! End-to-end runs through the library entry point.

use std::{fs, path::PathBuf};

use approx::assert_abs_diff_eq;
use num_complex::Complex64;
use rectflow::prelude::*;
use tempfile::tempdir;

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn config(nodes: &str, edges: &str, prefix: String) -> RunConfig {
    let mut cfg = RunConfig::new(data(nodes), data(edges));
    cfg.output_prefix = prefix;
    cfg
}

/// Parses a result file written with a header line.
fn read_rows(path: PathBuf) -> (String, Vec<Vec<f64>>) {
    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap().to_string();
    let rows = lines
        .map(|l| l.split(',').map(|v| v.parse().unwrap()).collect())
        .collect();
    (header, rows)
}

#[test]
fn test_two_bus_without_load() {
    let tmp = tempdir().unwrap();
    let prefix = format!("{}/", tmp.path().display());
    let report = run(&config("two_bus_nodes.csv", "two_bus_edges.csv", prefix)).unwrap();

    assert!(report.flow.iterations <= 5);
    let pq = &report.flow.buses[1];
    assert_abs_diff_eq!(pq.v, 1.04, epsilon = 1e-6);
    assert_abs_diff_eq!(pq.theta, 0.0, epsilon = 1e-6);
    assert!(report.short_circuit.is_none());

    let (header, rows) = read_rows(tmp.path().join("flow.csv"));
    assert_eq!(header, "V,theta,P,Q");
    assert_eq!(rows.len(), 2);
    for row in rows {
        for (got, want) in row.iter().zip([1.04, 0.0, 0.0, 0.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_three_bus_reference() {
    let tmp = tempdir().unwrap();
    let prefix = format!("{}/case-", tmp.path().display());
    let mut cfg = config("three_bus_nodes.csv", "three_bus_edges.csv", prefix);
    cfg.remove_first_line = true;
    run(&cfg).unwrap();

    let (header, rows) = read_rows(tmp.path().join("case-flow.csv"));
    assert_eq!(header, "V,theta,P,Q");
    let expected = [
        [1.0268371938, -0.0291611222, -0.5, -0.2],
        [1.05, 0.0, 0.8114738232, 0.2544052528],
        [1.0184432865, -0.0432447006, -0.3, -0.1],
    ];
    assert_eq!(rows.len(), expected.len());
    for (row, want) in rows.iter().zip(expected) {
        for (got, want) in row.iter().zip(want) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-5);
        }
    }

    let real = fs::read_to_string(tmp.path().join("case-node-admittance-real.csv")).unwrap();
    let imag = fs::read_to_string(tmp.path().join("case-node-admittance-imag.csv")).unwrap();
    assert_eq!(real.lines().nth(1), Some("-5,6.25,-1.25"));
    assert_eq!(imag.lines().nth(1), Some("15,-18.7225,3.75"));
}

#[test]
fn test_short_circuit_outputs() {
    let tmp = tempdir().unwrap();
    let prefix = format!("{}/", tmp.path().display());
    let mut cfg = config("four_bus_nodes.csv", "four_bus_edges.csv", prefix);
    cfg.short_circuit = Some(ShortCircuitConfig::new(3));
    let report = run(&cfg).unwrap();

    let fault = report.short_circuit.unwrap();
    assert_eq!(fault.node, 3);
    assert_abs_diff_eq!(fault.current.re, 0.8314121515, epsilon = 1e-5);
    assert_abs_diff_eq!(fault.current.im, -5.7803537760, epsilon = 1e-5);
    assert_eq!(fault.voltages[2], Complex64::new(0.0, 0.0));

    for name in [
        "node-admittance-real.csv",
        "node-admittance-imag.csv",
        "flow.csv",
        "node-impedance-real.csv",
        "node-impedance-imag.csv",
    ] {
        assert!(tmp.path().join(name).exists(), "{} missing", name);
    }

    let (header, voltages) = read_rows(tmp.path().join("short-circuit-voltage.csv"));
    assert_eq!(header, "Ui(real),Ui(imag)");
    assert_eq!(voltages.len(), 4);
    assert_eq!(voltages[2], vec![0.0, 0.0]);
    assert_abs_diff_eq!(voltages[1][0], 0.5222528739, epsilon = 1e-5);

    let (header, currents) = read_rows(tmp.path().join("short-circuit-edge-current.csv"));
    assert_eq!(header, "Iij(real),Iij(imag)");
    assert_eq!(currents.len(), 4);
    assert_abs_diff_eq!(currents[0][1], -3.4910014331, epsilon = 1e-5);
}

#[test]
fn test_ignore_load_and_transition() {
    let tmp = tempdir().unwrap();
    let prefix = format!("{}/", tmp.path().display());
    let mut cfg = config("four_bus_nodes.csv", "four_bus_edges.csv", prefix);
    cfg.short_circuit = Some(ShortCircuitConfig {
        node: 3,
        transition_impedance: Complex64::new(0.0, 0.0),
        ignore_load: true,
    });
    let bolted = run(&cfg).unwrap().short_circuit.unwrap();
    assert_abs_diff_eq!(bolted.current.re, 0.2511483310, epsilon = 1e-5);
    assert_abs_diff_eq!(bolted.current.im, -5.5102847194, epsilon = 1e-5);

    cfg.short_circuit = Some(ShortCircuitConfig {
        node: 3,
        transition_impedance: Complex64::new(0.05, 0.0),
        ignore_load: true,
    });
    let damped = run(&cfg).unwrap().short_circuit.unwrap();
    assert!(damped.current.norm() < bolted.current.norm());
}

#[test]
fn test_admittance_survives_convergence_failure() {
    let tmp = tempdir().unwrap();
    let prefix = format!("{}/", tmp.path().display());
    let mut cfg = config("three_bus_nodes.csv", "three_bus_edges.csv", prefix);
    cfg.remove_first_line = true;
    cfg.power_flow = PowerFlowConfig {
        max_it: Some(1),
        tol: Some(0.0),
    };
    let err = run(&cfg).unwrap_err();
    assert!(matches!(err, FlowError::NotConverged { .. }));
    assert!(tmp.path().join("node-admittance-real.csv").exists());
    assert!(tmp.path().join("node-admittance-imag.csv").exists());
    assert!(!tmp.path().join("flow.csv").exists());
}

#[test]
fn test_short_circuit_node_out_of_range() {
    let tmp = tempdir().unwrap();
    let prefix = format!("{}/", tmp.path().display());
    let mut cfg = config("four_bus_nodes.csv", "four_bus_edges.csv", prefix);
    cfg.short_circuit = Some(ShortCircuitConfig::new(5));
    let err = run(&cfg).unwrap_err();
    assert!(matches!(
        err,
        FlowError::ShortCircuitNode { id: 5, count: 4 }
    ));
    assert!(!tmp.path().join("short-circuit-voltage.csv").exists());
    assert!(!tmp.path().join("node-impedance-real.csv").exists());
}

#[test]
fn test_header_without_skip_flag() {
    let tmp = tempdir().unwrap();
    let prefix = format!("{}/", tmp.path().display());
    let cfg = config("three_bus_nodes.csv", "three_bus_edges.csv", prefix);
    assert!(matches!(run(&cfg), Err(FlowError::NotNumeric { line: 1, .. })));
}

#[test]
fn test_swing_only_short_circuit_without_edges() {
    let tmp = tempdir().unwrap();
    let nodes = tmp.path().join("nodes.csv");
    let edges = tmp.path().join("edges.csv");
    fs::write(&nodes, "1.0,0,0,0,0.2,0\n").unwrap();
    fs::write(&edges, "").unwrap();

    let mut cfg = RunConfig::new(&nodes, &edges);
    cfg.output_prefix = format!("{}/", tmp.path().display());
    cfg.short_circuit = Some(ShortCircuitConfig::new(1));
    let report = run(&cfg).unwrap();

    assert_eq!(report.flow.iterations, 0);
    let fault = report.short_circuit.unwrap();
    // 1 / (j 0.2)
    assert_abs_diff_eq!(fault.current.re, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fault.current.im, -5.0, epsilon = 1e-12);
    assert!(fault.edge_currents.is_empty());

    let current = fs::read_to_string(tmp.path().join("short-circuit-edge-current.csv")).unwrap();
    assert_eq!(current, "Iij(real),Iij(imag)\n");
}
