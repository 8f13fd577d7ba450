//! CSV and inline input loaders, CSV output saver.

use std::fs::File;
use std::path::PathBuf;

use log::info;
use synth_core::{CollaboratorError, InputLoader, OutputSaver, PipelineContext};
use synth_domain::io::separator_byte;
use synth_domain::{ConfigError, Input, Output};

/// One root node per row, taken from `target_column`.
#[derive(Debug, Clone)]
pub struct CsvInputLoader {
    path: PathBuf,
    target_column: String,
    delimiter: u8,
}

impl CsvInputLoader {
    pub fn new(path: impl Into<PathBuf>, target_column: impl Into<String>, delimiter: u8) -> Self {
        Self { path: path.into(),
               target_column: target_column.into(),
               delimiter }
    }
}

fn csv_error(e: csv::Error) -> CollaboratorError {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => CollaboratorError::Io(io),
            other => CollaboratorError::InvalidData(format!("{other:?}")),
        }
    } else {
        CollaboratorError::InvalidData(e.to_string())
    }
}

impl InputLoader for CsvInputLoader {
    fn load(&self, ctx: &mut PipelineContext) -> Result<(), CollaboratorError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new().delimiter(self.delimiter).from_reader(file);
        let headers = reader.headers().map_err(csv_error)?.clone();
        let column = headers.iter().position(|h| h == self.target_column).ok_or_else(|| {
                         CollaboratorError::InvalidData(format!("column {:?} not found in {}",
                                                                self.target_column,
                                                                self.path.display()))
                     })?;
        let mut rows = 0;
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let value = record.get(column).unwrap_or_default();
            ctx.push_root(value);
            rows += 1;
        }
        info!("loaded {rows} rows from {}", self.path.display());
        Ok(())
    }
}

/// Fixed values from the configuration file itself.
#[derive(Debug, Clone, Default)]
pub struct InlineInputLoader {
    values: Vec<String>,
}

impl InlineInputLoader {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }
}

impl InputLoader for InlineInputLoader {
    fn load(&self, ctx: &mut PipelineContext) -> Result<(), CollaboratorError> {
        for value in &self.values {
            ctx.push_root(value.clone());
        }
        Ok(())
    }
}

/// Writes the final working set as a one-column CSV file.
#[derive(Debug, Clone)]
pub struct CsvOutputSaver {
    path: PathBuf,
    column: String,
    delimiter: u8,
}

impl CsvOutputSaver {
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>, delimiter: u8) -> Self {
        Self { path: path.into(),
               column: column.into(),
               delimiter }
    }
}

impl OutputSaver for CsvOutputSaver {
    fn save(&self, ctx: &PipelineContext) -> Result<(), CollaboratorError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut writer = csv::WriterBuilder::new().delimiter(self.delimiter)
                                                  .from_path(&self.path)
                                                  .map_err(csv_error)?;
        writer.write_record([&self.column]).map_err(csv_error)?;
        for node in ctx.working() {
            writer.write_record([&node.value]).map_err(csv_error)?;
        }
        writer.flush()?;
        info!("saved {} rows to {}", ctx.working().len(), self.path.display());
        Ok(())
    }
}

pub fn build_loader(input: &Input) -> Result<Box<dyn InputLoader>, ConfigError> {
    Ok(match input {
        Input::Csv(p) => Box::new(CsvInputLoader::new(&p.path, &p.target_column, separator_byte(&p.separator)?)),
        Input::Inline(p) => Box::new(InlineInputLoader::new(p.values.clone())),
    })
}

pub fn build_saver(output: &Output) -> Result<Box<dyn OutputSaver>, ConfigError> {
    Ok(match output {
        Output::Csv(p) => Box::new(CsvOutputSaver::new(&p.path, &p.column, separator_byte(&p.separator)?)),
    })
}
