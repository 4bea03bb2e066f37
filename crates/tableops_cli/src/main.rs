//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tableops_core` linkage without a database.
//! - Print the statement family a demo record compiles to for one dialect.
//!
//! Usage: `tableops_cli [dialect]` (defaults to `sqlite`).

use log::info;
use tableops_core::{
    AmendExpression, DataType, Dialect, FieldSpec, NullConnection, Record, SearchType,
    StatementTypes, TableModel, TableOperations, TargetExpression,
};

#[derive(Debug, Default, Clone)]
struct Measurement {
    id: i64,
    signal_id: uuid::Uuid,
    point_tag: String,
    value: f64,
    enabled: bool,
}

impl Record for Measurement {
    fn table_model() -> TableModel<Self> {
        TableModel::new()
            .amend_expression(
                AmendExpression::new("TOP {count}")
                    .for_dialect(Dialect::SqlServer)
                    .target(TargetExpression::FieldList)
                    .statements(StatementTypes::SELECT_SET),
            )
            .field(
                FieldSpec::new("ID", |m: &Self| &m.id, |m: &mut Self| &mut m.id).primary_key(true),
            )
            .field(
                FieldSpec::new("SignalID", |m: &Self| &m.signal_id, |m: &mut Self| &mut m.signal_id)
                    .field_data_type(Some(Dialect::Sqlite), DataType::Text),
            )
            .field(
                FieldSpec::new("PointTag", |m: &Self| &m.point_tag, |m: &mut Self| &mut m.point_tag)
                    .searchable(SearchType::LikeExpression),
            )
            .field(
                FieldSpec::new("Value", |m: &Self| &m.value, |m: &mut Self| &mut m.value)
                    .use_escaped_name(None, false),
            )
            .field(
                FieldSpec::new("Enabled", |m: &Self| &m.enabled, |m: &mut Self| &mut m.enabled)
                    .default_value(true),
            )
    }
}

fn main() {
    let requested = std::env::args().nth(1).unwrap_or_else(|| "sqlite".to_string());
    let dialect = match requested.parse::<Dialect>() {
        Ok(dialect) => dialect,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = tableops_core::init_stderr_logging("warn") {
        eprintln!("logging disabled: {err}");
    }

    println!("tableops_core ping={}", tableops_core::ping());
    println!("tableops_core version={}", tableops_core::core_version());

    let connection = NullConnection::new(dialect);
    let options = tableops_core::TableOptions::default().custom_token("{count}", "100");
    let operations = TableOperations::<Measurement>::with_options(&connection, options);

    println!("dialect={dialect} table={}", operations.table_name());
    for (name, template) in operations.templates().statements() {
        println!("{name:>16}: {template}");
    }
    if let Some(filter) = operations.templates().search_filter() {
        println!("{:>16}: {filter}", "search_filter");
    }
    info!("event=cli_probe module=cli status=ok dialect={dialect}");
}
