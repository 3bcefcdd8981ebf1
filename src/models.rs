use crate::schema::{attendance, faculty, students};
use chrono::{NaiveDate, NaiveTime};
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// A faculty account. The only role allowed to manage students and attendance.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = faculty)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Faculty {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
}

#[derive(Insertable)]
#[diesel(table_name = faculty)]
pub struct NewFaculty<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
}

#[derive(Queryable, Selectable, Tabled, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Student {
    pub id: i32,
    pub name: String,
    #[tabled(rename = "roll number")]
    pub roll_no: String,
    pub branch: String,
    #[tabled(rename = "photo")]
    pub photo_path: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = students)]
pub struct NewStudent {
    pub name: String,
    pub roll_no: String,
    pub branch: String,
    pub photo_path: String,
}

/// The status stored on an attendance record.
///
/// Only [`Status::Present`] is ever written by marking; a student with no record for a date is
/// absent.
#[derive(AsExpression, FromSqlRow, Debug, Clone, Copy, PartialEq, Eq)]
#[diesel(sql_type = Text)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(Status::Present),
            "Absent" => Ok(Status::Absent),
            other => Err(format!("unrecognized attendance status '{other}'")),
        }
    }
}

impl ToSql<Text, Sqlite> for Status {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Status {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        value.parse().map_err(Into::into)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = attendance)]
pub struct NewAttendance {
    pub student_id: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: Status,
}

/// One line of the attendance report: an attendance record joined with its student.
#[derive(Queryable, Tabled, Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    #[tabled(rename = "record")]
    pub id: i32,
    pub name: String,
    #[tabled(rename = "roll number")]
    pub roll_no: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: Status,
}

impl ReportRow {
    /// The exported columns of this row, in report column order.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.roll_no.clone(),
            self.date.format("%Y-%m-%d").to_string(),
            self.time.format("%H:%M:%S").to_string(),
            self.status.to_string(),
        ]
    }
}
