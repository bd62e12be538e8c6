//! Wires reader, solver, analyzer and writer into a single run.

use nalgebra::DVector;
use num_complex::Complex64;
use tracing::info;

use crate::{
    basic::{
        admittance::node_admittance,
        network::{Network, NetworkOptions},
        newtonpf::{NewtonRaphson, newton_pf},
        result_extract::{FlowSolution, result},
        short_circuit::node_impedance,
        solver::{DefaultSolver, Solve},
    },
    config::RunConfig,
    error::Result,
    io::{
        display::{complex_table, flow_table, format_complex, matrix_table, voltage_table},
        reader::read_matrix,
        writer::OutputWriter,
    },
};

/// Short-circuit results of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultReport {
    /// 1-based ID of the faulted node.
    pub node: usize,
    /// Fault current.
    pub current: Complex64,
    /// Post-fault node voltages in original order.
    pub voltages: DVector<Complex64>,
    /// Post-fault edge currents in edge input order.
    pub edge_currents: Vec<Complex64>,
}

/// Results of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub flow: FlowSolution,
    pub short_circuit: Option<FaultReport>,
}

/// Runs the calculation with the default sparse solver.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    run_with_solver(config, DefaultSolver::default())
}

/// Runs the calculation: read, build, solve, analyze and write.
///
/// Files are written as soon as their data is available, admittance first,
/// then flow, then short-circuit results. Files written before a failure are
/// left in place.
pub fn run_with_solver<S: Solve>(config: &RunConfig, solver: S) -> Result<RunReport> {
    config.validate()?;
    let tol = config.power_flow.tol();

    let nodes = read_matrix(&config.nodes, config.remove_first_line)?;
    let edges = read_matrix(&config.edges, config.remove_first_line)?;
    let options = NetworkOptions {
        short_circuit: config.short_circuit.map(|sc| sc.node),
    };
    let network = Network::init(&nodes, &edges, &options)?;
    info!(
        nodes = network.node_count(),
        pq = network.npq(),
        pv = network.npv(),
        edges = network.edges().len(),
        "network loaded"
    );

    let writer = OutputWriter::new(config.output_prefix.as_str());
    let admittance = node_admittance(&network);
    if config.verbose {
        println!("Node admittance (real)\n{}", matrix_table(&admittance.real(), 6));
        println!("Node admittance (imag)\n{}", matrix_table(&admittance.imag(), 6));
    }
    writer.write_admittance(&admittance)?;

    let mut nr = NewtonRaphson::iterate_init(&network, &admittance, solver);
    let iterations = newton_pf(&mut nr, tol, config.power_flow.max_it())?;
    info!(iterations, residual = nr.get_max(), "power flow converged");
    let (e, f) = nr.into_voltages();

    let buses = result(&network, &admittance, &e, &f, tol);
    if config.verbose {
        println!("Power flow\n{}", flow_table(&buses));
    }
    writer.write_flow(&buses)?;
    let flow = FlowSolution { buses, iterations };

    let Some(sc) = config.short_circuit else {
        return Ok(RunReport {
            flow,
            short_circuit: None,
        });
    };

    let analyzer = node_impedance(
        &network,
        &admittance,
        &e,
        &f,
        sc.transition_impedance,
        sc.ignore_load,
    )?;
    if config.verbose {
        println!("Node impedance (real)\n{}", matrix_table(&analyzer.real(), 6));
        println!("Node impedance (imag)\n{}", matrix_table(&analyzer.imag(), 6));
    }
    writer.write_impedance(&analyzer)?;

    let current = analyzer.short_circuit_current()?;
    info!(node = sc.node, current = %format_complex(current, 6), "fault current");
    println!("Short-circuit current: {}", format_complex(current, 6));

    let voltages = analyzer.short_circuit_voltage(tol)?;
    if config.verbose {
        println!("Short-circuit voltage\n{}", voltage_table(&voltages));
    }
    writer.write_short_circuit_voltage(&voltages)?;

    let edge_currents = analyzer.short_circuit_edge_current(&network, &voltages);
    if config.verbose {
        println!("Short-circuit edge current\n{}", complex_table(&edge_currents));
    }
    writer.write_short_circuit_edge_current(&edge_currents)?;

    Ok(RunReport {
        flow,
        short_circuit: Some(FaultReport {
            node: sc.node,
            current,
            voltages,
            edge_currents,
        }),
    })
}
