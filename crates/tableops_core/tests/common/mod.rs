#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use tableops_core::db::{
    DataConnection, DataRow, DbError, DbResult, Dialect, Parameter, SqliteConnection,
};
use tableops_core::{
    open_db_in_memory, FieldSpec, Record, RecordRestriction, RootQueryRestriction, SearchType,
    TableModel, TableOperations, Value,
};
use uuid::Uuid;

pub const SCHEMA: &str = r#"
CREATE TABLE Company (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    Name TEXT NOT NULL,
    Acronym TEXT NOT NULL DEFAULT '',
    Url TEXT NULL,
    LoadOrder INTEGER NOT NULL DEFAULT 0,
    Active INTEGER NOT NULL DEFAULT 0,
    UpdatedBy TEXT NOT NULL DEFAULT ''
);
CREATE TABLE Measurement (
    SignalID TEXT NOT NULL,
    HistorianID INTEGER NOT NULL,
    PointTag TEXT NOT NULL,
    "Value" REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (SignalID, HistorianID)
);
"#;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub acronym: String,
    pub url: Option<String>,
    pub load_order: i32,
    pub active: bool,
    pub updated_by: String,
}

impl Record for Company {
    fn table_model() -> TableModel<Self> {
        TableModel::new()
            .field(
                FieldSpec::new("ID", |c: &Self| &c.id, |c: &mut Self| &mut c.id).primary_key(true),
            )
            .field(
                FieldSpec::new("Name", |c: &Self| &c.name, |c: &mut Self| &mut c.name)
                    .searchable(SearchType::Default),
            )
            .field(
                FieldSpec::new("Acronym", |c: &Self| &c.acronym, |c: &mut Self| &mut c.acronym)
                    .searchable(SearchType::FullValueMatch),
            )
            .field(FieldSpec::new("Url", |c: &Self| &c.url, |c: &mut Self| &mut c.url))
            .field(FieldSpec::new("LoadOrder", |c: &Self| &c.load_order, |c: &mut Self| {
                &mut c.load_order
            }))
            .field(
                FieldSpec::new("Active", |c: &Self| &c.active, |c: &mut Self| &mut c.active)
                    .default_value(true),
            )
            .field(
                FieldSpec::new("UpdatedBy", |c: &Self| &c.updated_by, |c: &mut Self| {
                    &mut c.updated_by
                })
                    .default_value("setup")
                    .update_with(|| Value::from("engine")),
            )
    }
}

impl Company {
    pub fn named(name: &str, acronym: &str, load_order: i32) -> Self {
        Self {
            name: name.to_string(),
            acronym: acronym.to_string(),
            load_order,
            active: true,
            ..Self::default()
        }
    }
}

/// Company rows seen through a fixed `Active` filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ActiveCompany {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

impl Record for ActiveCompany {
    fn table_model() -> TableModel<Self> {
        TableModel::new()
            .table_name("Company")
            .root_query_restriction(RootQueryRestriction::new(
                RecordRestriction::new("Active={0}", vec![Value::Bool(true)])
                    .expect("valid root restriction"),
            ))
            .field(
                FieldSpec::new("ID", |c: &Self| &c.id, |c: &mut Self| &mut c.id).primary_key(true),
            )
            .field(
                FieldSpec::new("Name", |c: &Self| &c.name, |c: &mut Self| &mut c.name)
                    .searchable(SearchType::Default),
            )
            .field(FieldSpec::new("Active", |c: &Self| &c.active, |c: &mut Self| &mut c.active))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Measurement {
    pub signal_id: Uuid,
    pub historian_id: i64,
    pub point_tag: String,
    pub value: f64,
}

impl Record for Measurement {
    fn table_model() -> TableModel<Self> {
        TableModel::new()
            .default_sort("PointTag", true)
            .field(
                FieldSpec::new("SignalID", |m: &Self| &m.signal_id, |m: &mut Self| &mut m.signal_id)
                    .primary_key(false),
            )
            .field(
                FieldSpec::new("HistorianID", |m: &Self| &m.historian_id, |m: &mut Self| {
                    &mut m.historian_id
                })
                .primary_key(false),
            )
            .field(
                FieldSpec::new("PointTag", |m: &Self| &m.point_tag, |m: &mut Self| &mut m.point_tag)
                    .searchable(SearchType::LikeExpression),
            )
            .field(
                FieldSpec::new("Value", |m: &Self| &m.value, |m: &mut Self| &mut m.value)
                    .use_escaped_name(None, false),
            )
    }
}

impl Measurement {
    pub fn new(point_tag: &str, historian_id: i64, value: f64) -> Self {
        Self {
            signal_id: Uuid::new_v4(),
            historian_id,
            point_tag: point_tag.to_string(),
            value,
        }
    }
}

pub fn setup() -> SqliteConnection {
    let db = open_db_in_memory().unwrap();
    db.conn().execute_batch(SCHEMA).unwrap();
    db
}

pub fn seed_companies(db: &SqliteConnection, companies: &[Company]) {
    let mut ops = TableOperations::<Company>::new(db);
    for company in companies {
        assert_eq!(ops.add_new_record(company).unwrap(), 1);
    }
}

pub fn company_fleet() -> Vec<Company> {
    vec![
        Company::named("Grid Partners", "GPA", 3),
        Company::named("Northern Power", "NPW", 1),
        Company::named("Southern Grid", "SGR", 2),
        Company::named("Eastern Utility", "EUT", 5),
        Company::named("Western Transmission", "WTR", 4),
    ]
}

/// Connection double that records every statement and replays canned
/// results.
pub struct RecordingConnection {
    dialect: Dialect,
    pub statements: RefCell<Vec<(String, Vec<Parameter>)>>,
    pub rows: RefCell<VecDeque<Vec<DataRow>>>,
    pub scalar: Value,
    pub affected: usize,
    pub fail: bool,
}

impl RecordingConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: RefCell::new(Vec::new()),
            rows: RefCell::new(VecDeque::new()),
            scalar: Value::Integer(0),
            affected: 1,
            fail: false,
        }
    }

    pub fn queue_rows(&self, rows: Vec<DataRow>) {
        self.rows.borrow_mut().push_back(rows);
    }

    pub fn last_sql(&self) -> String {
        self.statements
            .borrow()
            .last()
            .map(|(sql, _)| sql.clone())
            .unwrap_or_default()
    }

    pub fn last_parameters(&self) -> Vec<Parameter> {
        self.statements
            .borrow()
            .last()
            .map(|(_, parameters)| parameters.clone())
            .unwrap_or_default()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.borrow().len()
    }

    fn record(&self, sql: &str, parameters: &[Parameter]) -> DbResult<()> {
        self.statements
            .borrow_mut()
            .push((sql.to_string(), parameters.to_vec()));
        if self.fail {
            return Err(DbError::Conversion("simulated failure".to_string()));
        }
        Ok(())
    }
}

impl DataConnection for RecordingConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute_scalar(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Value> {
        self.record(sql, parameters)?;
        Ok(self.scalar.clone())
    }

    fn execute_non_query(&self, sql: &str, parameters: &[Parameter]) -> DbResult<usize> {
        self.record(sql, parameters)?;
        Ok(self.affected)
    }

    fn retrieve_rows(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Vec<DataRow>> {
        self.record(sql, parameters)?;
        Ok(self.rows.borrow_mut().pop_front().unwrap_or_default())
    }
}

pub fn data_row(columns: &[&str], values: Vec<Value>) -> DataRow {
    let columns: Arc<[String]> = columns
        .iter()
        .map(|column| column.to_string())
        .collect::<Vec<_>>()
        .into();
    DataRow::new(columns, values)
}
