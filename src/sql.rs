use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::{MAX_BATCH_SIZE, MAX_STATUS_FILTER};
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertResource {
        id: Ulid,
        name: Option<String>,
    },
    InsertReservation(ReservationRequest),
    BatchInsertReservations {
        requests: Vec<ReservationRequest>,
    },
    /// `INSERT INTO status_changes (reservation_id, status) VALUES (...)`
    ChangeStatus {
        id: Ulid,
        status: ReservationStatus,
    },
    /// `DELETE FROM reservations WHERE id = ...` cancels; rows are never removed.
    CancelReservation {
        id: Ulid,
    },
    SelectResources,
    SelectReservations {
        resource_id: Ulid,
        filter: Option<StatusFilter>,
    },
    SelectOccupiedDates {
        resource_id: Ulid,
        filter: Option<StatusFilter>,
    },
    SelectAvailability {
        resource_id: Ulid,
        check_in: Day,
        check_out: Day,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

const RESOURCE_COLUMNS: &[&str] = &["id", "name"];
const RESERVATION_COLUMNS: &[&str] = &["id", "resource_id", "check_in", "check_out", "status"];
const STATUS_CHANGE_COLUMNS: &[&str] = &["reservation_id", "status"];

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();
    let rows = extract_all_insert_rows(insert)?;

    match table.as_str() {
        "resources" => {
            let row = Row::new(&columns, RESOURCE_COLUMNS, single_row(&rows, "resources")?)?;
            Ok(Command::InsertResource {
                id: parse_ulid_expr(row.required("id")?)?,
                name: row.get("name").map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        "reservations" => {
            if rows.len() > MAX_BATCH_SIZE {
                return Err(SqlError::Limit("too many rows in INSERT"));
            }
            let mut requests = Vec::with_capacity(rows.len());
            for (i, values) in rows.iter().enumerate() {
                let request = parse_reservation_row(&columns, values)
                    .map_err(|e| e.in_row(i, rows.len()))?;
                requests.push(request);
            }
            if requests.len() == 1 {
                Ok(Command::InsertReservation(requests.remove(0)))
            } else {
                Ok(Command::BatchInsertReservations { requests })
            }
        }
        "status_changes" => {
            let row = Row::new(&columns, STATUS_CHANGE_COLUMNS, single_row(&rows, "status_changes")?)?;
            Ok(Command::ChangeStatus {
                id: parse_ulid_expr(row.required("reservation_id")?)?,
                status: parse_status_expr(row.required("status")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_reservation_row(columns: &[String], values: &[Expr]) -> Result<ReservationRequest, SqlError> {
    let row = Row::new(columns, RESERVATION_COLUMNS, values)?;
    let status = match row.get("status") {
        Some(expr) if !is_null(expr) => parse_status_expr(expr)?,
        _ => ReservationStatus::Confirmed,
    };
    Ok(ReservationRequest {
        id: parse_ulid_expr(row.required("id")?)?,
        resource_id: parse_ulid_expr(row.required("resource_id")?)?,
        check_in: parse_day_expr(row.required("check_in")?)?,
        check_out: parse_day_expr(row.required("check_out")?)?,
        status,
    })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "reservations" => Ok(Command::CancelReservation { id }),
        "resources" => Err(SqlError::Unsupported("resources cannot be deleted".into())),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Column constraints collected from a WHERE clause of `=`/`IN` terms joined by AND.
/// Any other shape is refused rather than dropped.
#[derive(Default)]
struct Filters {
    resource_id: Option<Ulid>,
    check_in: Option<Day>,
    check_out: Option<Day>,
    status: Option<StatusFilter>,
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "resources" => Ok(Command::SelectResources),
        "reservations" => Ok(Command::SelectReservations {
            resource_id: filters.resource_id.ok_or(SqlError::MissingFilter("resource_id"))?,
            filter: filters.status,
        }),
        "occupied_dates" => Ok(Command::SelectOccupiedDates {
            resource_id: filters.resource_id.ok_or(SqlError::MissingFilter("resource_id"))?,
            filter: filters.status,
        }),
        "availability" => Ok(Command::SelectAvailability {
            resource_id: filters.resource_id.ok_or(SqlError::MissingFilter("resource_id"))?,
            check_in: filters.check_in.ok_or(SqlError::MissingFilter("check_in"))?,
            check_out: filters.check_out.ok_or(SqlError::MissingFilter("check_out"))?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn extract_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_filters(inner, filters)?,
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                extract_filters(left, filters)?;
                extract_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                Some("resource_id") => filters.resource_id = Some(parse_ulid_expr(right)?),
                Some("check_in") => filters.check_in = Some(parse_day_expr(right)?),
                Some("check_out") => filters.check_out = Some(parse_day_expr(right)?),
                Some("status") => filters.status = Some(StatusFilter::only(parse_status_expr(right)?)),
                Some(other) => return Err(SqlError::UnknownColumn(other.to_string())),
                None => return Err(SqlError::Unsupported(format!("WHERE term {expr}"))),
            },
            _ => return Err(SqlError::Unsupported(format!("WHERE operator {op}"))),
        },
        Expr::InList { expr: column, list, negated } => {
            if expr_column_name(column).as_deref() != Some("status") {
                return Err(SqlError::Unsupported(format!("WHERE term {expr}")));
            }
            if list.len() > MAX_STATUS_FILTER {
                return Err(SqlError::Limit("status list too long"));
            }
            let listed = list
                .iter()
                .map(parse_status_expr)
                .collect::<Result<StatusFilter, _>>()?;
            let filter = if *negated {
                listed.iter().fold(StatusFilter::all(), StatusFilter::without)
            } else {
                listed
            };
            filters.status = Some(filter);
        }
        other => return Err(SqlError::Unsupported(format!("WHERE term {other}"))),
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

/// One VALUES row addressed by column name. Without an explicit column list
/// the table's declared column order applies.
struct Row<'a> {
    columns: Vec<&'a str>,
    values: &'a [Expr],
}

impl<'a> Row<'a> {
    fn new(columns: &'a [String], default_order: &'static [&'static str], values: &'a [Expr]) -> Result<Self, SqlError> {
        let columns: Vec<&str> = if columns.is_empty() {
            default_order.iter().copied().take(values.len()).collect()
        } else {
            columns.iter().map(String::as_str).collect()
        };
        if columns.len() != values.len() {
            return Err(SqlError::WrongArity(columns.len(), values.len()));
        }
        if let Some(unknown) = columns.iter().find(|c| !default_order.iter().any(|d| d == *c)) {
            return Err(SqlError::UnknownColumn(unknown.to_string()));
        }
        Ok(Self { columns, values })
    }

    fn get(&self, column: &str) -> Option<&'a Expr> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .map(|i| &self.values[i])
    }

    fn required(&self, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(column))
    }
}

fn single_row<'a>(rows: &'a [Vec<Expr>], table: &'static str) -> Result<&'a [Expr], SqlError> {
    match rows {
        [row] => Ok(row),
        _ => Err(SqlError::Unsupported(format!("multi-row INSERT into {table}"))),
    }
}

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_all_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid_expr(right),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_text_expr(expr: &Expr) -> Result<&str, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.as_str()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_text_expr(expr)?;
    Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_day_expr(expr: &Expr) -> Result<Day, SqlError> {
    let s = parse_text_expr(expr)?;
    parse_day(s).map_err(SqlError::Range)
}

fn parse_status_expr(expr: &Expr) -> Result<ReservationStatus, SqlError> {
    let s = parse_text_expr(expr)?;
    s.parse().map_err(|e: ParseStatusError| SqlError::Parse(e.to_string()))
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string or NULL, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
    #[error("expected {0} values, got {1}")]
    WrongArity(usize, usize),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    #[error("limit exceeded: {0}")]
    Limit(&'static str),
    /// A literal that should be a calendar date is not one.
    #[error(transparent)]
    Range(EngineError),
    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: Box<SqlError>,
    },
}

impl SqlError {
    fn in_row(self, row: usize, total: usize) -> SqlError {
        if total == 1 {
            self
        } else {
            SqlError::Row { row, source: Box::new(self) }
        }
    }

    /// The innermost error, looking through row context.
    pub fn root(&self) -> &SqlError {
        match self {
            SqlError::Row { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RangeError;

    const RID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const ID2: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    fn day(m: u32, d: u32) -> Day {
        Day::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn parse_insert_resource() {
        let sql = format!("INSERT INTO resources (id) VALUES ('{RID}')");
        match parse_sql(&sql).unwrap() {
            Command::InsertResource { id, name } => {
                assert_eq!(id.to_string(), RID);
                assert_eq!(name, None);
            }
            cmd => panic!("expected InsertResource, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_resource_with_name() {
        let sql = format!("INSERT INTO resources (id, name) VALUES ('{RID}', 'Lake house')");
        match parse_sql(&sql).unwrap() {
            Command::InsertResource { name, .. } => assert_eq!(name.as_deref(), Some("Lake house")),
            cmd => panic!("expected InsertResource, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_reservation_defaults_to_confirmed() {
        let sql = format!(
            "INSERT INTO reservations (id, resource_id, check_in, check_out) VALUES ('{ID2}', '{RID}', '2024-03-01', '2024-03-05')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertReservation(req) => {
                assert_eq!(req.id.to_string(), ID2);
                assert_eq!(req.resource_id.to_string(), RID);
                assert_eq!((req.check_in, req.check_out), (day(3, 1), day(3, 5)));
                assert_eq!(req.status, ReservationStatus::Confirmed);
            }
            cmd => panic!("expected InsertReservation, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_reservation_by_column_name() {
        let sql = format!(
            "INSERT INTO reservations (status, check_out, check_in, resource_id, id) VALUES ('pending', '2024-04-02', '2024-04-01T15:00:00', '{RID}', '{ID2}')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertReservation(req) => {
                assert_eq!(req.status, ReservationStatus::Requested);
                assert_eq!((req.check_in, req.check_out), (day(4, 1), day(4, 2)));
            }
            cmd => panic!("expected InsertReservation, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_batch_insert_reservations() {
        let sql = format!(
            "INSERT INTO reservations (id, resource_id, check_in, check_out) VALUES \
             ('{ID2}', '{RID}', '2024-01-01', '2024-01-02'), \
             ('{RID}', '{RID}', '2024-02-01', '2024-02-03')"
        );
        match parse_sql(&sql).unwrap() {
            Command::BatchInsertReservations { requests } => {
                assert_eq!(requests.len(), 2);
                assert_eq!(requests[1].check_out, day(2, 3));
            }
            cmd => panic!("expected BatchInsertReservations, got {cmd:?}"),
        }
    }

    #[test]
    fn invalid_calendar_date_is_range_error() {
        let sql = format!(
            "INSERT INTO reservations (id, resource_id, check_in, check_out) VALUES ('{ID2}', '{RID}', '2024-02-30', '2024-03-01')"
        );
        match parse_sql(&sql) {
            Err(SqlError::Range(EngineError::InvalidRange(RangeError::NotADate(s)))) => {
                assert_eq!(s, "2024-02-30")
            }
            other => panic!("expected Range error, got {other:?}"),
        }
    }

    #[test]
    fn batch_row_errors_carry_row_index() {
        let sql = format!(
            "INSERT INTO reservations (id, resource_id, check_in, check_out) VALUES \
             ('{ID2}', '{RID}', '2024-01-01', '2024-01-02'), \
             ('{RID}', '{RID}', 'soon', '2024-02-03')"
        );
        let err = parse_sql(&sql).unwrap_err();
        assert!(matches!(err, SqlError::Row { row: 1, .. }));
        assert!(matches!(err.root(), SqlError::Range(_)));
    }

    #[test]
    fn parse_status_change() {
        let sql = format!("INSERT INTO status_changes (reservation_id, status) VALUES ('{ID2}', 'cancelled')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::ChangeStatus {
                id: Ulid::from_string(ID2).unwrap(),
                status: ReservationStatus::Cancelled,
            }
        );
    }

    #[test]
    fn parse_unknown_status_errors() {
        let sql = format!("INSERT INTO status_changes (reservation_id, status) VALUES ('{ID2}', 'maybe')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_delete_reservation_cancels() {
        let sql = format!("DELETE FROM reservations WHERE id = '{ID2}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::CancelReservation { id: Ulid::from_string(ID2).unwrap() }
        );
    }

    #[test]
    fn parse_select_resources() {
        assert_eq!(parse_sql("SELECT * FROM resources").unwrap(), Command::SelectResources);
    }

    #[test]
    fn parse_select_reservations_with_status_list() {
        let sql = format!("SELECT * FROM reservations WHERE resource_id = '{RID}' AND status IN ('confirmed', 'requested')");
        match parse_sql(&sql).unwrap() {
            Command::SelectReservations { filter: Some(filter), .. } => {
                assert!(filter.contains(ReservationStatus::Confirmed));
                assert!(filter.contains(ReservationStatus::Requested));
                assert!(!filter.contains(ReservationStatus::Cancelled));
            }
            cmd => panic!("expected SelectReservations, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_occupied_dates_not_in() {
        let sql = format!("SELECT * FROM occupied_dates WHERE resource_id = '{RID}' AND status NOT IN ('cancelled')");
        match parse_sql(&sql).unwrap() {
            Command::SelectOccupiedDates { filter: Some(filter), .. } => {
                assert_eq!(filter, StatusFilter::all().without(ReservationStatus::Cancelled));
            }
            cmd => panic!("expected SelectOccupiedDates, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_occupied_dates_default_filter() {
        let sql = format!("SELECT * FROM occupied_dates WHERE resource_id = '{RID}'");
        match parse_sql(&sql).unwrap() {
            Command::SelectOccupiedDates { filter, .. } => assert_eq!(filter, None),
            cmd => panic!("expected SelectOccupiedDates, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_availability() {
        let sql = format!(
            "SELECT * FROM availability WHERE resource_id = '{RID}' AND check_in = '2024-03-03' AND check_out = '2024-03-04'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailability { resource_id, check_in, check_out } => {
                assert_eq!(resource_id.to_string(), RID);
                assert_eq!((check_in, check_out), (day(3, 3), day(3, 4)));
            }
            cmd => panic!("expected SelectAvailability, got {cmd:?}"),
        }
    }

    #[test]
    fn availability_requires_both_dates() {
        let sql = format!("SELECT * FROM availability WHERE resource_id = '{RID}' AND check_in = '2024-03-03'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("check_out"))));
    }

    #[test]
    fn where_or_is_refused() {
        let sql = format!("SELECT * FROM occupied_dates WHERE resource_id = '{RID}' OR status = 'cancelled'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));

        let sql = format!("SELECT * FROM reservations WHERE resource_id = '{RID}' AND check_in > '2024-03-01'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));

        let sql = format!("SELECT * FROM reservations WHERE resource_id = '{RID}' AND NOT status = 'cancelled'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn where_unknown_column_is_refused() {
        let sql = format!("SELECT * FROM reservations WHERE resource_id = '{RID}' AND colour = 'red'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(c)) if c == "colour"));

        let sql = format!("SELECT * FROM reservations WHERE resource_id IN ('{RID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn status_list_is_bounded() {
        let list = vec!["'confirmed'"; MAX_STATUS_FILTER + 1].join(", ");
        let sql = format!("SELECT * FROM reservations WHERE resource_id = '{RID}' AND status IN ({list})");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Limit(_))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO bookings (id) VALUES ('{RID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_unknown_column_errors() {
        let sql = format!("INSERT INTO resources (id, colour) VALUES ('{RID}', 'red')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(c)) if c == "colour"));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
