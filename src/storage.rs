//! Flat-file persistence: the reference table going in, CSV artifacts coming out

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{CompanyRecord, DataTable, DatasetCategory, TickerRecord};

/// Read the reference table of tickers, in file order
pub fn load_reference_table(path: &Path) -> Result<Vec<TickerRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open reference table {}", path.display()))?;

    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<TickerRecord>().enumerate() {
        let record = result
            .with_context(|| format!("Malformed row {} in {}", row + 1, path.display()))?;
        records.push(record);
    }

    info!("Loaded {} tickers from {}", records.len(), path.display());
    Ok(records)
}

/// Write the company directory in the shape `load_reference_table` reads
pub fn write_company_list(path: &Path, companies: &[CompanyRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for company in companies {
        writer.serialize(company)?;
    }
    writer.flush()?;

    info!("Wrote {} companies to {}", companies.len(), path.display());
    Ok(())
}

/// Directory that receives one CSV file per ticker and category
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Open the output directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticker: &str, category: DatasetCategory) -> PathBuf {
        self.dir.join(category.file_name(ticker))
    }

    /// Write `table` for `ticker`, replacing any file from an earlier run
    pub fn write_table(
        &self,
        ticker: &str,
        category: DatasetCategory,
        table: &DataTable,
    ) -> Result<PathBuf> {
        let path = self.path_for(ticker, category);

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(&table.columns)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Wrote {} rows to {}", table.len(), path.display());
        Ok(path)
    }
}
