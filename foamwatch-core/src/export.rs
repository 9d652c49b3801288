use crate::series::TimeSeriesStore;
use foamwatch_case::XAxis;
use std::io::Write;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("render error: {0}")]
    Render(String),
    #[error("no samples to export")]
    NoData,
}

/// Which variables take part in plotting and export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VariableFilter {
    #[default]
    All,
    Only(Vec<String>),
}

impl VariableFilter {
    /// An empty list means no restriction.
    pub fn from_list(variables: &[String]) -> Self {
        if variables.is_empty() {
            Self::All
        } else {
            Self::Only(variables.to_vec())
        }
    }

    pub fn allows(&self, variable: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|name| name == variable),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub x: f64,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub header: Vec<String>,
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn variables(&self) -> &[String] {
        self.header.get(1..).unwrap_or(&[])
    }
}

impl TimeSeriesStore {
    /// One row per time point; one column per allowed variable with at least
    /// one sample, in discovery order.
    pub fn export_table(&self, filter: &VariableFilter, axis: XAxis) -> ExportTable {
        let columns: Vec<_> = self
            .series()
            .iter()
            .filter(|series| filter.allows(series.name()) && series.has_data())
            .collect();
        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(axis.label().to_string());
        header.extend(columns.iter().map(|series| series.name().to_string()));

        let rows = self
            .times()
            .iter()
            .enumerate()
            .map(|(idx, time)| ExportRow {
                x: match axis {
                    XAxis::Time => *time,
                    XAxis::Iteration => (idx + 1) as f64,
                },
                values: columns
                    .iter()
                    .map(|series| series.samples().get(idx).copied().flatten())
                    .collect(),
            })
            .collect();
        ExportTable { header, rows }
    }
}

/// Writes `table` as comma separated values. Absent samples are empty fields.
pub fn write_csv<W: Write>(table: &ExportTable, writer: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&table.header)?;
    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.x.to_string());
        record.extend(
            row.values
                .iter()
                .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_csv_file(table: &ExportTable, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    write_csv(table, std::io::BufWriter::new(file))
}
