mod common;

use common::{Company, Measurement, RecordingConnection};
use tableops_core::db::{DataType, Dialect, NullConnection};
use tableops_core::{
    AmendExpression, FieldSpec, Record, RecordRestriction, StatementTypes, TableModel,
    TableOperations, TableOptions, TargetExpression, Value,
};

#[derive(Debug, Default, Clone)]
struct OrderLine {
    id: i64,
    key: String,
    quantity: i64,
}

impl Record for OrderLine {
    fn table_model() -> TableModel<Self> {
        TableModel::new()
            .table_name("Order")
            .use_escaped_name(None, false)
            .amend_expression(
                AmendExpression::new("TOP {count}")
                    .for_dialect(Dialect::SqlServer)
                    .target(TargetExpression::FieldList)
                    .statements(StatementTypes::SELECT_SET),
            )
            .field(
                FieldSpec::new("ID", |o: &Self| &o.id, |o: &mut Self| &mut o.id).primary_key(true),
            )
            .field(
                FieldSpec::new("Key", |o: &Self| &o.key, |o: &mut Self| &mut o.key)
                    .use_escaped_name(Some(Dialect::SqlServer), false),
            )
            .field(
                FieldSpec::new("Quantity", |o: &Self| &o.quantity, |o: &mut Self| &mut o.quantity)
                    .field_data_type(Some(Dialect::Sqlite), DataType::Text),
            )
    }
}

#[test]
fn company_statement_family_on_sqlite() {
    let conn = NullConnection::new(Dialect::Sqlite);
    let ops = TableOperations::<Company>::new(&conn);
    let templates = ops.templates();

    assert_eq!(templates.count.sql(), "SELECT COUNT(*) FROM Company");
    assert_eq!(templates.select_row.sql(), "SELECT * FROM Company WHERE ID={0}");
    assert_eq!(
        templates.insert.sql(),
        "INSERT INTO Company(Name, Acronym, Url, LoadOrder, Active, UpdatedBy) VALUES ({0}, {1}, {2}, {3}, {4}, {5})"
    );
    assert_eq!(
        templates.update.sql(),
        "UPDATE Company SET Name={0}, Acronym={1}, Url={2}, LoadOrder={3}, Active={4}, UpdatedBy={5} WHERE ID={6}"
    );
    assert_eq!(templates.delete.sql(), "DELETE FROM Company WHERE ID={0}");
    assert_eq!(templates.select_keys.to_string(), "SELECT ID FROM Company ORDER BY {order_by}");
    assert_eq!(templates.search_filter(), Some("Name LIKE {0} OR Acronym={1}"));
    assert_eq!(templates.primary_key_list(), "ID");
}

#[test]
fn escaped_value_column_follows_dialect() {
    let mysql = NullConnection::new(Dialect::MySql);
    let ops = TableOperations::<Measurement>::new(&mysql);
    assert_eq!(
        ops.templates().insert.sql(),
        "INSERT INTO Measurement(SignalID, HistorianID, PointTag, `Value`) VALUES ({0}, {1}, {2}, {3})"
    );
    assert_eq!(
        ops.templates().update.sql(),
        "UPDATE Measurement SET PointTag={0}, `Value`={1} WHERE SignalID={2} AND HistorianID={3}"
    );
    assert_eq!(ops.get_field_names(true)[3], "`Value`");
    assert_eq!(ops.get_field_names(false)[3], "Value");

    let oracle = NullConnection::new(Dialect::Oracle);
    let ops = TableOperations::<Measurement>::new(&oracle);
    assert_eq!(ops.get_field_names(true)[3], "\"Value\"");
}

#[test]
fn table_and_field_escapes_are_scoped_independently() {
    let mssql = NullConnection::new(Dialect::SqlServer);
    let ops = TableOperations::<OrderLine>::new(&mssql);
    assert_eq!(ops.table_name(), "\"Order\"");
    assert_eq!(ops.unescaped_table_name(), "Order");
    assert_eq!(ops.templates().delete.sql(), "DELETE FROM \"Order\" WHERE ID={0}");
    assert_eq!(
        ops.templates().insert.sql(),
        "INSERT INTO \"Order\"([Key], Quantity) VALUES ({0}, {1})"
    );

    let mysql = NullConnection::new(Dialect::MySql);
    let ops = TableOperations::<OrderLine>::new(&mysql);
    assert_eq!(ops.table_name(), "`Order`");
    assert_eq!(ops.get_field_names(true), vec!["ID", "Key", "Quantity"]);
}

#[test]
fn amendment_tokens_resolve_per_instance() {
    let mssql = NullConnection::new(Dialect::SqlServer);
    let options = TableOptions::default().custom_token("{count}", "25");
    let ops = TableOperations::<OrderLine>::with_options(&mssql, options.clone());
    assert_eq!(
        ops.templates().select_set.fill("", "ID"),
        "SELECT TOP 25 * FROM \"Order\" ORDER BY ID"
    );
    assert_eq!(ops.templates().select_row.sql(), "SELECT * FROM \"Order\" WHERE ID={0}");

    let sqlite = NullConnection::new(Dialect::Sqlite);
    let ops = TableOperations::<OrderLine>::with_options(&sqlite, options);
    assert_eq!(ops.templates().select_set.fill("", "ID"), "SELECT * FROM \"Order\" ORDER BY ID");
}

#[test]
fn caller_filters_are_rewritten_to_connection_escapes() {
    let conn = RecordingConnection::new(Dialect::MySql);
    let ops = TableOperations::<Measurement>::new(&conn);
    let restriction = RecordRestriction::new("\"value\" > {0}", vec![Value::Real(1.5)]).unwrap();

    ops.query_records(Some("\"Value\" DESC"), Some(&restriction), None).unwrap();
    assert_eq!(
        conn.last_sql(),
        "SELECT * FROM Measurement WHERE `Value` > {0} ORDER BY `Value` DESC"
    );

    let options = TableOptions::default().case_sensitive_field_names(true);
    let strict = TableOperations::<Measurement>::with_options(&conn, options);
    strict.query_record_count(Some(&restriction)).unwrap();
    assert_eq!(conn.last_sql(), "SELECT COUNT(*) FROM Measurement WHERE \"value\" > {0}");
}

#[test]
fn default_sort_replaces_key_order() {
    let conn = RecordingConnection::new(Dialect::Sqlite);
    let ops = TableOperations::<Measurement>::new(&conn);
    ops.query_records(None, None, None).unwrap();
    assert_eq!(conn.last_sql(), "SELECT * FROM Measurement ORDER BY PointTag");
}

#[test]
fn explicit_data_type_applies_to_its_dialect_only() {
    let sqlite = NullConnection::new(Dialect::Sqlite);
    let ops = TableOperations::<OrderLine>::new(&sqlite);
    let parameter = ops.get_interpreted_field_value("quantity", Value::Integer(4));
    assert_eq!(parameter.data_type, Some(DataType::Text));
    assert_eq!(parameter.coerced_value().unwrap(), Value::Text("4".into()));

    let mysql = NullConnection::new(Dialect::MySql);
    let ops = TableOperations::<OrderLine>::new(&mysql);
    assert_eq!(ops.get_interpreted_field_value("Quantity", Value::Integer(4)).data_type, None);
}

#[test]
fn canonical_statements_are_connection_independent() {
    let model = tableops_core::ModelRegistry::global().model::<Measurement>();
    let statements = model.canonical_statements();
    let insert = statements
        .iter()
        .find(|(name, _)| *name == "insert")
        .map(|(_, text)| text.as_str());
    assert_eq!(
        insert,
        Some("INSERT INTO Measurement(SignalID, HistorianID, PointTag, \"Value\") VALUES ({0}, {1}, {2}, {3})")
    );
}
