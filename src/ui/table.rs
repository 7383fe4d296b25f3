use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
pub struct ColumnRow {
    #[tabled(rename = "Column")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub semantic: String,
    #[tabled(rename = "Affinity")]
    pub affinity: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// `(column, semantic type, affinity)` rows of a table schema
pub fn columns_table(columns: &[(&str, String, String)]) -> String {
    let rows: Vec<ColumnRow> = columns
        .iter()
        .map(|(name, semantic, affinity)| ColumnRow {
            name: name.to_string(),
            semantic: semantic.clone(),
            affinity: affinity.clone(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
