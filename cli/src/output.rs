//! Output formatting

use clap::ValueEnum;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Print a whole document. Tables fall back to pretty JSON.
    pub fn print<T: Serialize>(&self, data: &T) {
        match self {
            OutputFormat::Json | OutputFormat::Table => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
            }
            OutputFormat::Yaml => {
                println!("{}", serde_yaml::to_string(data).unwrap_or_default());
            }
        }
    }

    /// Print a list of records, as a table when asked for one.
    pub fn print_rows<R: Tabled + Serialize>(&self, rows: Vec<R>) {
        match self {
            OutputFormat::Table => println!("{}", render_table(rows)),
            _ => self.print(&rows),
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, OutputFormat::Table)
    }
}

pub fn render_table<R: Tabled>(rows: Vec<R>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}
