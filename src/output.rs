use std::io::{self, Write};

use clap::ValueEnum;
use csv::{Terminator, WriterBuilder};
use serde::Serialize;

use crate::query::TabularModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableFormat {
    Json,
    Csv,
    Tsv,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_table(model: &TabularModel, format: TableFormat) -> io::Result<()> {
    match format {
        TableFormat::Json => JsonOutput::print(model),
        TableFormat::Csv | TableFormat::Tsv => write_delimited(model, format, io::stdout().lock()),
    }
}

/// Header row of `id` plus the model columns, then one record per row.
/// Empty cells render as empty fields.
pub fn write_delimited<W: Write>(model: &TabularModel, format: TableFormat, out: W) -> io::Result<()> {
    let delimiter = if format == TableFormat::Tsv { b'\t' } else { b',' };
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(std::iter::once("id").chain(model.columns.iter().map(String::as_str)))?;
    for row in &model.rows {
        writer.write_record(
            std::iter::once(row.id.as_str())
                .chain(row.values.iter().map(|value| value.as_deref().unwrap_or_default())),
        )?;
    }
    writer.flush()
}

pub fn render_delimited(model: &TabularModel, format: TableFormat) -> io::Result<String> {
    let mut buf = Vec::new();
    write_delimited(model, format, &mut buf)?;
    String::from_utf8(buf).map_err(io::Error::other)
}
