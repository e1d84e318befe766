use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Human-readable view of one result: labelled fields plus the bare value
/// printed by `--format raw`.
pub struct Record {
    pub fields: Vec<(&'static str, String)>,
    pub raw: String,
}

impl Record {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            raw: raw.into(),
        }
    }

    pub fn field(mut self, label: &'static str, value: impl ToString) -> Self {
        self.fields.push((label, value.to_string()));
        self
    }
}

/// Print a single result. `value` is the JSON form, `record` the rest.
pub fn print_record<T: Serialize>(value: &T, record: &Record, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (label, value) in &record.fields {
                table.add_row(vec![label.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pairs(&record.fields)),
        OutputFormat::Raw => println!("{}", record.raw),
    }
}

/// Print a list of results sharing one set of columns.
///
/// Raw output prints the first column of each row.
pub fn print_rows<T: Serialize>(
    values: &[T],
    header: &[&'static str],
    rows: &[Vec<String>],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&values),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header.to_vec());
            for row in rows {
                table.add_row(row.clone());
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                let fields: Vec<(&'static str, String)> =
                    header.iter().copied().zip(row.iter().cloned()).collect();
                println!("{}", pairs(&fields));
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                if let Some(first) = row.first() {
                    println!("{first}");
                }
            }
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn pairs(fields: &[(&'static str, String)]) -> String {
    fields
        .iter()
        .map(|(label, value)| format!("{}={}", label.to_lowercase().replace(' ', "_"), value))
        .collect::<Vec<_>>()
        .join(" ")
}
