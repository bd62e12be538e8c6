use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{FlowError, Result};

/// Columns of a node row: `V, G, P, Q, type`.
pub const NODE_COLUMNS: usize = 5;
/// Columns of a node row in short-circuit mode: `V, G, P, Q, x_d, type`.
pub const NODE_COLUMNS_SHORT_CIRCUIT: usize = 6;
/// Columns of an edge row: `from, to, R, X, B, k`.
pub const EDGE_COLUMNS: usize = 6;

/// Bus classification.
///
/// The declaration order is the solver order: PQ nodes first, then PV nodes,
/// then the single swing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    /// Load bus, fixed P and Q.
    PQ,
    /// Generation bus, fixed P and voltage magnitude.
    PV,
    /// Reference bus, fixed voltage magnitude and angle.
    Swing,
}

impl NodeType {
    /// Parses the type code used in node files (0 = swing, 1 = PQ, 2 = PV).
    pub fn from_code(code: f64) -> Option<Self> {
        if code.fract() != 0.0 {
            return None;
        }
        match code as i64 {
            0 => Some(NodeType::Swing),
            1 => Some(NodeType::PQ),
            2 => Some(NodeType::PV),
            _ => None,
        }
    }
}

/// A bus of the network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// 1-based ID, the row position in the node file.
    pub id: usize,
    /// Specified voltage magnitude, also the flat-start seed.
    pub v: f64,
    /// Auxiliary `G` column, carried but not used by the flow equations.
    pub g: f64,
    /// Scheduled net active power injection.
    pub p: f64,
    /// Scheduled net reactive power injection.
    pub q: f64,
    /// Generator transient reactance, present in short-circuit mode only.
    pub x_d: Option<f64>,
    /// Bus classification.
    pub kind: NodeType,
}

impl Node {
    /// Scheduled complex power injection.
    pub fn s(&self) -> Complex64 {
        Complex64::new(self.p, self.q)
    }
}

/// A line or transformer between two buses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// 1-based ID of the near-side node.
    pub from: usize,
    /// 1-based ID of the far-side node.
    pub to: usize,
    /// Series resistance.
    pub r: f64,
    /// Series reactance.
    pub x: f64,
    /// Total shunt susceptance of the line.
    pub b: f64,
    /// Transformer turns ratio, zero for a plain line.
    pub k: f64,
}

impl Edge {
    /// Series admittance `1 / (r + jx)`.
    pub fn admittance(&self) -> Complex64 {
        Complex64::new(self.r, self.x).inv()
    }

    /// Grounding admittance at each end of a line, half the shunt susceptance.
    pub fn grounding_admittance(&self) -> Complex64 {
        Complex64::new(0.0, self.b / 2.0)
    }

    pub fn is_transformer(&self) -> bool {
        self.k != 0.0
    }
}

/// Options that change how input matrices are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkOptions {
    /// 1-based ID of the short-circuit node. Enables the `x_d` node column.
    pub short_circuit: Option<usize>,
}

/// Validated network with nodes kept in solver order.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    npq: usize,
    npv: usize,
    to_perm: Vec<usize>,   // original offset -> solver offset
    from_perm: Vec<usize>, // solver offset -> original offset
    fault: Option<usize>,
}

impl Network {
    /// Validates raw node and edge matrices and builds the network.
    ///
    /// # Arguments
    ///
    /// * `nodes` - One row per node: `V, G, P, Q, [x_d], type`.
    /// * `edges` - One row per edge: `from, to, R, X, B, k`.
    /// * `options` - Short-circuit target, which also selects the node column layout.
    ///
    /// # Errors
    ///
    /// Fails with a format error on a wrong column count, an unknown type code,
    /// a swing node count other than one, an edge endpoint or short-circuit
    /// node outside `[1, node count]`, an edge with zero impedance, or a
    /// generator without reactance in short-circuit mode.
    pub fn init(
        nodes: &DMatrix<f64>,
        edges: &DMatrix<f64>,
        options: &NetworkOptions,
    ) -> Result<Self> {
        let short_circuit = options.short_circuit.is_some();
        let node_columns = if short_circuit {
            NODE_COLUMNS_SHORT_CIRCUIT
        } else {
            NODE_COLUMNS
        };
        if nodes.ncols() != node_columns {
            return Err(FlowError::ColumnCount {
                matrix: "node",
                expected: node_columns,
                found: nodes.ncols(),
            });
        }
        if edges.nrows() > 0 && edges.ncols() != EDGE_COLUMNS {
            return Err(FlowError::ColumnCount {
                matrix: "edge",
                expected: EDGE_COLUMNS,
                found: edges.ncols(),
            });
        }

        let type_column = node_columns - 1;
        let mut parsed = Vec::with_capacity(nodes.nrows());
        for (offset, row) in nodes.row_iter().enumerate() {
            let id = offset + 1;
            let code = row[type_column];
            let kind = NodeType::from_code(code).ok_or(FlowError::NodeType { node: id, code })?;
            parsed.push(Node {
                id,
                v: row[0],
                g: row[1],
                p: row[2],
                q: row[3],
                x_d: short_circuit.then(|| row[4]),
                kind,
            });
        }

        let count = parsed.len();
        let npq = parsed.iter().filter(|n| n.kind == NodeType::PQ).count();
        let npv = parsed.iter().filter(|n| n.kind == NodeType::PV).count();
        let swing = count - npq - npv;
        if swing != 1 {
            return Err(FlowError::SwingCount { found: swing });
        }

        // stable: equal kinds keep input order
        let mut from_perm: Vec<usize> = (0..count).collect();
        from_perm.sort_by_key(|&i| parsed[i].kind);
        let mut to_perm = vec![0; count];
        for (solver_idx, &original_idx) in from_perm.iter().enumerate() {
            to_perm[original_idx] = solver_idx;
        }
        let sorted = from_perm.iter().map(|&i| parsed[i]).collect();

        let mut parsed_edges = Vec::with_capacity(edges.nrows());
        for (offset, row) in edges.row_iter().enumerate() {
            let edge = offset + 1;
            let from = node_id(row[0], count).ok_or(FlowError::EdgeEndpoint { edge, id: row[0] })?;
            let to = node_id(row[1], count).ok_or(FlowError::EdgeEndpoint { edge, id: row[1] })?;
            let (r, x) = (row[2], row[3]);
            if r == 0.0 && x == 0.0 {
                return Err(FlowError::ZeroImpedance { edge });
            }
            parsed_edges.push(Edge {
                from,
                to,
                r,
                x,
                b: row[4],
                k: row[5],
            });
        }

        if let Some(id) = options.short_circuit {
            if id == 0 || id > count {
                return Err(FlowError::ShortCircuitNode { id, count });
            }
            let missing = parsed.iter().find(|n| {
                n.kind != NodeType::PQ
                    && n.x_d.map_or(true, |x| x == 0.0 || !x.is_finite())
            });
            if let Some(node) = missing {
                return Err(FlowError::GeneratorReactance { node: node.id });
            }
        }

        Ok(Self {
            nodes: sorted,
            edges: parsed_edges,
            npq,
            npv,
            to_perm,
            from_perm,
            fault: options.short_circuit,
        })
    }

    /// Nodes in solver order: PQ, then PV, then swing.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in input order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of PQ nodes.
    pub fn npq(&self) -> usize {
        self.npq
    }

    /// Number of PV nodes.
    pub fn npv(&self) -> usize {
        self.npv
    }

    /// Solver offset of the swing node, always the last one.
    pub fn swing(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Maps a 1-based node ID to its solver offset.
    pub fn solver_index(&self, id: usize) -> usize {
        self.to_perm[id - 1]
    }

    /// Maps a solver offset back to the 1-based node ID.
    pub fn original_id(&self, solver_idx: usize) -> usize {
        self.from_perm[solver_idx] + 1
    }

    /// Solver offset -> original offset.
    pub fn from_perm(&self) -> &[usize] {
        &self.from_perm
    }

    /// Original offset -> solver offset.
    pub fn to_perm(&self) -> &[usize] {
        &self.to_perm
    }

    /// 1-based ID of the short-circuit node, if one was requested.
    pub fn fault_node(&self) -> Option<usize> {
        self.fault
    }
}

fn node_id(raw: f64, count: usize) -> Option<usize> {
    if raw.fract() != 0.0 || raw < 1.0 || raw > count as f64 {
        None
    } else {
        Some(raw as usize)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Node 2 is the swing node so that solver order differs from input order.
    pub(crate) fn three_bus() -> (DMatrix<f64>, DMatrix<f64>) {
        let nodes = DMatrix::from_row_slice(
            3,
            5,
            &[
                1.0, 0.0, -0.5, -0.2, 1.0, //
                1.05, 0.0, 0.0, 0.0, 0.0, //
                1.0, 0.0, -0.3, -0.1, 1.0,
            ],
        );
        let edges = DMatrix::from_row_slice(
            3,
            6,
            &[
                2.0, 1.0, 0.02, 0.06, 0.03, 0.0, //
                2.0, 3.0, 0.08, 0.24, 0.025, 0.0, //
                1.0, 3.0, 0.06, 0.18, 0.02, 0.0,
            ],
        );
        (nodes, edges)
    }

    /// Swing, PV behind a transformer, two PQ loads. Carries the `x_d` column.
    pub(crate) fn four_bus() -> (DMatrix<f64>, DMatrix<f64>) {
        let nodes = DMatrix::from_row_slice(
            4,
            6,
            &[
                1.0, 0.0, 0.0, 0.0, 0.2, 0.0, //
                1.02, 0.0, 0.4, 0.0, 0.25, 2.0, //
                1.0, 0.0, -0.6, -0.25, 0.0, 1.0, //
                1.0, 0.0, -0.3, -0.1, 0.0, 1.0,
            ],
        );
        let edges = DMatrix::from_row_slice(
            4,
            6,
            &[
                1.0, 3.0, 0.01, 0.08, 0.02, 0.0, //
                2.0, 4.0, 0.0, 0.1, 0.0, 1.05, //
                3.0, 4.0, 0.03, 0.12, 0.015, 0.0, //
                1.0, 4.0, 0.02, 0.1, 0.01, 0.0,
            ],
        );
        (nodes, edges)
    }

    pub(crate) fn four_bus_flow_only() -> (DMatrix<f64>, DMatrix<f64>) {
        let (nodes, edges) = four_bus();
        let nodes = nodes.remove_column(4);
        (nodes, edges)
    }

    #[test]
    fn test_sorted_order() {
        let (nodes, edges) = four_bus_flow_only();
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        assert_eq!(net.node_count(), net.npq() + net.npv() + 1);
        assert_eq!(net.npq(), 2);
        assert_eq!(net.npv(), 1);
        let kinds: Vec<_> = net.nodes().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![NodeType::PQ, NodeType::PQ, NodeType::PV, NodeType::Swing]
        );
        let ids: Vec<_> = net.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);
        assert_eq!(net.nodes()[net.swing()].kind, NodeType::Swing);
    }

    #[test]
    fn test_permutation_is_bijection() {
        let (nodes, edges) = four_bus_flow_only();
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        for id in 1..=net.node_count() {
            assert_eq!(net.original_id(net.solver_index(id)), id);
        }
        for idx in 0..net.node_count() {
            assert_eq!(net.solver_index(net.original_id(idx)), idx);
            assert_eq!(net.nodes()[idx].id, net.original_id(idx));
        }
    }

    #[test]
    fn test_column_count() {
        let (nodes, edges) = four_bus();
        let err = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            FlowError::ColumnCount {
                matrix: "node",
                expected: 5,
                found: 6
            }
        ));

        let (nodes, edges) = three_bus();
        let edges = edges.remove_column(5);
        let err = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap_err();
        assert!(matches!(err, FlowError::ColumnCount { matrix: "edge", .. }));
    }

    #[test]
    fn test_bad_node_type() {
        let (mut nodes, edges) = three_bus();
        nodes[(2, 4)] = 3.0;
        let err = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap_err();
        assert!(matches!(err, FlowError::NodeType { node: 3, .. }));

        nodes[(2, 4)] = 1.5;
        assert!(Network::init(&nodes, &edges, &NetworkOptions::default()).is_err());
    }

    #[test]
    fn test_swing_count() {
        let (mut nodes, edges) = three_bus();
        nodes[(0, 4)] = 0.0;
        let err = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap_err();
        assert!(matches!(err, FlowError::SwingCount { found: 2 }));

        nodes[(0, 4)] = 1.0;
        nodes[(1, 4)] = 2.0;
        let err = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap_err();
        assert!(matches!(err, FlowError::SwingCount { found: 0 }));
    }

    #[test]
    fn test_edge_endpoint() {
        let (nodes, mut edges) = three_bus();
        edges[(1, 1)] = 4.0;
        let err = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap_err();
        assert!(matches!(err, FlowError::EdgeEndpoint { edge: 2, .. }));

        edges[(1, 1)] = 0.0;
        assert!(Network::init(&nodes, &edges, &NetworkOptions::default()).is_err());
    }

    #[test]
    fn test_zero_impedance_edge() {
        let (nodes, mut edges) = three_bus();
        edges[(0, 2)] = 0.0;
        edges[(0, 3)] = 0.0;
        let err = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap_err();
        assert!(matches!(err, FlowError::ZeroImpedance { edge: 1 }));
    }

    #[test]
    fn test_short_circuit_node_range() {
        let (nodes, edges) = four_bus();
        for id in [0, 5] {
            let options = NetworkOptions {
                short_circuit: Some(id),
            };
            let err = Network::init(&nodes, &edges, &options).unwrap_err();
            assert!(matches!(err, FlowError::ShortCircuitNode { count: 4, .. }));
        }
        let options = NetworkOptions {
            short_circuit: Some(4),
        };
        let net = Network::init(&nodes, &edges, &options).unwrap();
        assert_eq!(net.fault_node(), Some(4));
        assert_eq!(net.nodes()[net.swing()].x_d, Some(0.2));
    }

    #[test]
    fn test_generator_reactance_required() {
        let (mut nodes, edges) = four_bus();
        nodes[(1, 4)] = 0.0;
        let options = NetworkOptions {
            short_circuit: Some(3),
        };
        let err = Network::init(&nodes, &edges, &options).unwrap_err();
        assert!(matches!(err, FlowError::GeneratorReactance { node: 2 }));
    }

    #[test]
    fn test_edge_admittance() {
        let edge = Edge {
            from: 1,
            to: 2,
            r: 3.0,
            x: 4.0,
            b: 0.5,
            k: 0.0,
        };
        let y = edge.admittance();
        assert!((y - Complex64::new(0.12, -0.16)).norm() < 1e-12);
        assert_eq!(edge.grounding_admittance(), Complex64::new(0.0, 0.25));
        assert!(!edge.is_transformer());
    }
}
