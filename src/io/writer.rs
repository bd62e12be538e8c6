use std::{
    fs::File,
    path::{Path, PathBuf},
};

use csv::{Writer, WriterBuilder};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use serde::{Serialize, Serializer};
use tracing::info;

use crate::{
    basic::{NodeAdmittance, ShortCircuit, result_extract::BusResult},
    error::{FlowError, Result},
};

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "result-";

pub const ADMITTANCE_REAL: &str = "node-admittance-real.csv";
pub const ADMITTANCE_IMAG: &str = "node-admittance-imag.csv";
pub const FLOW: &str = "flow.csv";
pub const IMPEDANCE_REAL: &str = "node-impedance-real.csv";
pub const IMPEDANCE_IMAG: &str = "node-impedance-imag.csv";
pub const SHORT_CIRCUIT_VOLTAGE: &str = "short-circuit-voltage.csv";
pub const SHORT_CIRCUIT_EDGE_CURRENT: &str = "short-circuit-edge-current.csv";

/// Formats a double with six decimals, dropping trailing zeros.
///
/// `0.500000` becomes `0.5`, `2.000000` becomes `2` and `-0.000000` becomes `0`.
pub fn format_double(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    if text == "-0" { "0".to_string() } else { text.to_string() }
}

/// A double serialized through [`format_double`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trimmed(pub f64);

impl Serialize for Trimmed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_double(self.0))
    }
}

/// A result row with a fixed header line.
pub trait Record: Serialize {
    const HEADER: &'static [&'static str];
}

/// One row of the flow file.
#[derive(Debug, Serialize)]
pub struct FlowRecord {
    pub v: Trimmed,
    pub theta: Trimmed,
    pub p: Trimmed,
    pub q: Trimmed,
}

impl Record for FlowRecord {
    const HEADER: &'static [&'static str] = &["V", "theta", "P", "Q"];
}

impl From<&BusResult> for FlowRecord {
    fn from(bus: &BusResult) -> Self {
        Self {
            v: Trimmed(bus.v),
            theta: Trimmed(bus.theta),
            p: Trimmed(bus.p),
            q: Trimmed(bus.q),
        }
    }
}

/// One row of the post-fault voltage file.
#[derive(Debug, Serialize)]
pub struct VoltageRecord {
    pub re: Trimmed,
    pub im: Trimmed,
}

impl Record for VoltageRecord {
    const HEADER: &'static [&'static str] = &["Ui(real)", "Ui(imag)"];
}

/// One row of the post-fault edge current file.
#[derive(Debug, Serialize)]
pub struct CurrentRecord {
    pub re: Trimmed,
    pub im: Trimmed,
}

impl Record for CurrentRecord {
    const HEADER: &'static [&'static str] = &["Iij(real)", "Iij(imag)"];
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| FlowError::io(path, e))
}

fn finish(mut wtr: Writer<File>, path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| FlowError::io(path, e))
}

/// Writes a matrix without a header, one row per line.
pub fn write_matrix(path: impl AsRef<Path>, matrix: &DMatrix<f64>) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(create(path)?);
    for row in matrix.row_iter() {
        wtr.write_record(row.iter().map(|v| format_double(*v)))
            .map_err(|e| FlowError::csv(path, e))?;
    }
    finish(wtr, path)
}

/// Writes the record header, then one line per record.
///
/// The header is written even when there are no records.
pub fn write_records<T, I>(path: impl AsRef<Path>, records: I) -> Result<()>
where
    T: Record,
    I: IntoIterator<Item = T>,
{
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(create(path)?);
    wtr.write_record(T::HEADER)
        .map_err(|e| FlowError::csv(path, e))?;
    for record in records {
        wtr.serialize(record).map_err(|e| FlowError::csv(path, e))?;
    }
    finish(wtr, path)
}

/// Writes result files under a common prefix.
///
/// The prefix is prepended verbatim, so `out/case-` writes `out/case-flow.csv`.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    prefix: String,
}

impl Default for OutputWriter {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl OutputWriter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Prefixed path of an output file.
    pub fn path(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.prefix, name))
    }

    pub fn write_admittance(&self, admittance: &NodeAdmittance) -> Result<()> {
        self.matrix(ADMITTANCE_REAL, &admittance.real())?;
        self.matrix(ADMITTANCE_IMAG, &admittance.imag())
    }

    pub fn write_flow(&self, buses: &[BusResult]) -> Result<()> {
        let path = self.path(FLOW);
        write_records(&path, buses.iter().map(FlowRecord::from))?;
        info!(path = %path.display(), "flow written");
        Ok(())
    }

    pub fn write_impedance(&self, short_circuit: &ShortCircuit) -> Result<()> {
        self.matrix(IMPEDANCE_REAL, &short_circuit.real())?;
        self.matrix(IMPEDANCE_IMAG, &short_circuit.imag())
    }

    pub fn write_short_circuit_voltage(&self, voltages: &DVector<Complex64>) -> Result<()> {
        let path = self.path(SHORT_CIRCUIT_VOLTAGE);
        write_records(
            &path,
            voltages.iter().map(|u| VoltageRecord {
                re: Trimmed(u.re),
                im: Trimmed(u.im),
            }),
        )?;
        info!(path = %path.display(), "short-circuit voltage written");
        Ok(())
    }

    pub fn write_short_circuit_edge_current(&self, currents: &[Complex64]) -> Result<()> {
        let path = self.path(SHORT_CIRCUIT_EDGE_CURRENT);
        write_records(
            &path,
            currents.iter().map(|i| CurrentRecord {
                re: Trimmed(i.re),
                im: Trimmed(i.im),
            }),
        )?;
        info!(path = %path.display(), "short-circuit edge current written");
        Ok(())
    }

    fn matrix(&self, name: &str, matrix: &DMatrix<f64>) -> Result<()> {
        let path = self.path(name);
        write_matrix(&path, matrix)?;
        info!(path = %path.display(), "matrix written");
        Ok(())
    }
}
