mod common;

use common::{Company, RecordingConnection};
use std::cell::RefCell;
use tableops_core::db::Dialect;
use tableops_core::{
    open_db_in_memory, ModelError, RecordRestriction, RecoveringTableOperations, TableOperations,
    Value,
};

#[test]
fn missing_table_errors_carry_sql_and_parameters() {
    let db = open_db_in_memory().unwrap();
    let ops = TableOperations::<Company>::new(&db);

    let err = ops
        .query_records_where(
            "Name={0} AND LoadOrder={1}",
            vec![Value::from("Grid"), Value::Integer(3)],
        )
        .unwrap_err();
    match &err {
        ModelError::Db {
            operation,
            sql,
            parameters,
            ..
        } => {
            assert_eq!(*operation, "record query");
            assert_eq!(sql, "SELECT * FROM Company WHERE Name={0} AND LoadOrder={1} ORDER BY ID");
            assert_eq!(parameters.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(", 0:Grid, 1:3\": "));
    assert_eq!(
        err.sql(),
        Some("SELECT * FROM Company WHERE Name={0} AND LoadOrder={1} ORDER BY ID")
    );
    assert!(!err.is_programmer_error());
}

#[test]
fn handler_receives_failures_and_callers_get_defaults() {
    let db = open_db_in_memory().unwrap();
    let failures = RefCell::new(Vec::new());
    let operations = TableOperations::<Company>::new(&db);
    let mut ops = RecoveringTableOperations::with_handler(operations, |err| {
        failures.borrow_mut().push(err)
    });

    let mut company = Company::named("Grid Partners", "GPA", 3);
    assert_eq!(ops.query_record_count(None).unwrap(), -1);
    assert_eq!(ops.query_record_count_search("grid").unwrap(), -1);
    assert!(ops.query_record(None).unwrap().is_none());
    assert!(ops.query_records(None, None, None).unwrap().is_empty());
    assert!(ops.query_records_paged(None, true, 1, 10, None).unwrap().is_empty());
    assert!(ops.search_records(None, true, "grid").unwrap().is_empty());
    assert_eq!(ops.add_new_record(&company).unwrap(), 0);
    assert_eq!(ops.update_record(&mut company, None, None).unwrap(), 0);
    assert_eq!(ops.delete_record(&[Value::Integer(1)]).unwrap(), 0);

    drop(ops);
    let failures = failures.into_inner();
    assert_eq!(failures.len(), 9);
    assert!(failures.iter().all(|err| matches!(err, ModelError::Db { .. })));
}

#[test]
fn handler_never_sees_argument_errors() {
    let conn = RecordingConnection::new(Dialect::Sqlite);
    let handled = RefCell::new(0);
    let operations = TableOperations::<Company>::new(&conn);
    let mut ops = RecoveringTableOperations::with_handler(operations, |_| {
        *handled.borrow_mut() += 1
    });

    assert!(matches!(
        ops.delete_record_where(" ", Vec::new()),
        Err(ModelError::MissingArgument(_))
    ));
    assert!(matches!(
        ops.load_record(&[Value::Integer(1), Value::Integer(2)]),
        Err(ModelError::KeyCountMismatch { .. })
    ));
    let bad = RecordRestriction::new("ID={0}", vec![]);
    assert!(bad.is_err());
    assert!(matches!(
        ops.query_records_where("ID={4}", vec![Value::Integer(1)]),
        Err(ModelError::Restriction(_))
    ));

    assert_eq!(conn.statement_count(), 0);
    drop(ops);
    assert_eq!(handled.into_inner(), 0);
}

#[test]
fn handler_can_be_swapped_and_removed() {
    let mut conn = RecordingConnection::new(Dialect::PostgreSql);
    conn.fail = true;
    let mut ops = RecoveringTableOperations::new(TableOperations::<Company>::new(&conn));

    assert!(matches!(ops.query_record_count(None), Err(ModelError::Db { .. })));

    ops.set_exception_handler(Some(Box::new(|_: ModelError| {})));
    assert_eq!(ops.query_record_count(None).unwrap(), -1);

    ops.set_exception_handler(None);
    assert!(ops.delete_record_where("ID={0}", vec![Value::Integer(1)]).is_err());
    assert_eq!(ops.operations().record_type_name(), "Company");
}
