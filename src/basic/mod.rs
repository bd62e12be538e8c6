pub mod admittance;
pub mod jacobian;
pub mod network;
pub mod newtonpf;
pub mod result_extract;
pub mod short_circuit;
pub mod solver;

pub use admittance::{NodeAdmittance, node_admittance};
pub use network::{Edge, Network, NetworkOptions, Node, NodeType};
pub use newtonpf::{NewtonRaphson, newton_pf};
pub use result_extract::{BusResult, FlowSolution, result};
pub use short_circuit::{ShortCircuit, node_impedance};
