use std::fmt;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tabled::{Table, Tabled, builder::Builder, settings::Style};

use crate::basic::result_extract::BusResult;

/// A float printed with a fixed number of decimal places.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct FloatWrapper {
    pub value: f64,
    pub precision: usize,
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl Default for FloatWrapper {
    fn default() -> Self {
        Self {
            value: Default::default(),
            precision: 6,
        }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

/// Formats a complex number as `a+jb` or `a-jb`.
pub fn format_complex(value: Complex64, precision: usize) -> String {
    let sign = if value.im.is_sign_negative() { '-' } else { '+' };
    format!("{:.3$}{}j{:.3$}", value.re, sign, value.im.abs(), precision)
}

/// Table row of the flow result.
#[derive(Debug, Tabled)]
#[allow(non_snake_case)]
pub struct BusResTable {
    pub Bus: usize,
    pub V: FloatWrapper,
    pub theta: FloatWrapper,
    pub P: FloatWrapper,
    pub Q: FloatWrapper,
}

impl From<&BusResult> for BusResTable {
    fn from(bus: &BusResult) -> Self {
        BusResTable {
            Bus: bus.id,
            V: FloatWrapper::new(bus.v, 6),
            theta: FloatWrapper::new(bus.theta, 6),
            P: FloatWrapper::new(bus.p, 6),
            Q: FloatWrapper::new(bus.q, 6),
        }
    }
}

/// Table row of a complex per-node or per-edge quantity.
#[derive(Debug, Tabled)]
pub struct ComplexTable {
    #[tabled(rename = "#")]
    pub index: usize,
    pub real: FloatWrapper,
    pub imag: FloatWrapper,
}

pub fn flow_table(buses: &[BusResult]) -> String {
    Table::new(buses.iter().map(BusResTable::from))
        .with(Style::markdown())
        .to_string()
}

/// Renders complex values numbered from 1.
pub fn complex_table<'a>(values: impl IntoIterator<Item = &'a Complex64>) -> String {
    let rows = values
        .into_iter()
        .enumerate()
        .map(|(idx, v)| ComplexTable {
            index: idx + 1,
            real: FloatWrapper::new(v.re, 6),
            imag: FloatWrapper::new(v.im, 6),
        });
    Table::new(rows).with(Style::markdown()).to_string()
}

pub fn voltage_table(voltages: &DVector<Complex64>) -> String {
    complex_table(voltages.iter())
}

/// Renders a dense matrix with 1-based row and column labels.
pub fn matrix_table(matrix: &DMatrix<f64>, precision: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(
        std::iter::once(String::new()).chain((1..=matrix.ncols()).map(|c| c.to_string())),
    );
    for (r, row) in matrix.row_iter().enumerate() {
        builder.push_record(
            std::iter::once((r + 1).to_string())
                .chain(row.iter().map(|v| FloatWrapper::new(*v, precision).to_string())),
        );
    }
    builder.build().with(Style::markdown()).to_string()
}
