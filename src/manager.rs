use crate::auth::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::models::{Faculty, NewAttendance, NewFaculty, NewStudent, ReportRow, Status, Student};
use crate::schema;
use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::info;

type PooledSqlite = PooledConnection<ConnectionManager<SqliteConnection>>;

/// The manager for recording, modifying, and retrieving attendance data.
///
/// A manager owns one pooled connection for as long as it lives.
pub struct AttendanceManager {
    db: PooledSqlite,
}

impl AttendanceManager {
    pub fn new(db: PooledSqlite) -> Self {
        Self { db }
    }

    fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.db
    }

    /// Creates a faculty account with a salted hash of `raw_password`.
    ///
    /// Fails with [`AppError::Validation`] if the username is already taken.
    pub fn create_faculty(&mut self, username: &str, raw_password: &str) -> AppResult<Faculty> {
        let password_hash = hash_password(raw_password)?;

        let created = diesel::insert_into(schema::faculty::table)
            .values(NewFaculty {
                username,
                password_hash: &password_hash,
            })
            .returning(Faculty::as_returning())
            .get_result(self.conn())
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    AppError::Validation(format!("Username '{username}' is already taken"))
                }
                other => other.into(),
            })?;

        info!(faculty = created.id, "Created faculty '{username}'");
        Ok(created)
    }

    /// Returns the faculty whose credentials match, or `None` for an unknown username and a
    /// wrong password alike.
    pub fn authenticate(&mut self, login: &str, raw_password: &str) -> AppResult<Option<Faculty>> {
        use schema::faculty::dsl::*;

        let found = faculty
            .filter(username.eq(login))
            .select(Faculty::as_select())
            .first(self.conn())
            .optional()?;

        Ok(found.filter(|account| verify_password(raw_password, &account.password_hash)))
    }

    /// Returns the total number of registered students.
    pub fn num_students(&mut self) -> AppResult<usize> {
        use schema::students::dsl::*;

        let count: i64 = students.count().get_result(self.conn())?;
        Ok(count as usize)
    }

    /// Returns the total number of attendance records.
    pub fn num_records(&mut self) -> AppResult<usize> {
        use schema::attendance::dsl::*;

        let count: i64 = attendance.count().get_result(self.conn())?;
        Ok(count as usize)
    }

    /// Retrieves all registered students in registration order.
    pub fn list_students(&mut self) -> AppResult<Vec<Student>> {
        use schema::students::dsl::*;

        Ok(students
            .order(id.asc())
            .select(Student::as_select())
            .load(self.conn())?)
    }

    /// Inserts a student. Roll numbers are not required to be unique.
    pub fn register_student(&mut self, student: &NewStudent) -> AppResult<Student> {
        let created = diesel::insert_into(schema::students::table)
            .values(student)
            .returning(Student::as_returning())
            .get_result(self.conn())?;

        info!(student = created.id, "Registered student '{}'", created.name);
        Ok(created)
    }

    /// For the given date and time, records every one of `student_ids` with the given
    /// [`Status`]. Repeated marks are kept as separate records.
    ///
    /// If `student_ids` contains an ID that is not registered, nothing is recorded and this fails
    /// with [`AppError::Validation`].
    ///
    /// Returns the number of records inserted.
    fn mark(
        &mut self,
        student_ids: &[i32],
        date: NaiveDate,
        time: NaiveTime,
        status: Status,
    ) -> AppResult<usize> {
        if student_ids.is_empty() {
            return Ok(0);
        }

        let records: Vec<NewAttendance> = student_ids
            .iter()
            .map(|&student_id| NewAttendance {
                student_id,
                date,
                time,
                status,
            })
            .collect();

        // Write lock before the read; a deferred upgrade gets SQLITE_BUSY without waiting.
        self.conn().immediate_transaction::<_, AppError, _>(|conn| {
            use schema::students::dsl::*;

            let known: Vec<i32> = students
                .filter(id.eq_any(student_ids))
                .select(id)
                .load(conn)?;

            if let Some(unknown) = student_ids.iter().find(|&&sid| !known.contains(&sid)) {
                return Err(AppError::Validation(format!(
                    "Student {unknown} is not registered"
                )));
            }

            let inserted = diesel::insert_into(schema::attendance::table)
                .values(&records)
                .execute(conn)?;

            assert_eq!(inserted, records.len());

            Ok(inserted)
        })
    }

    /// For the given date and time, marks every one of `student_ids` as [`Status::Present`].
    /// Students left out get no record at all.
    pub fn mark_present(
        &mut self,
        student_ids: &[i32],
        date: NaiveDate,
        time: NaiveTime,
    ) -> AppResult<usize> {
        let inserted = self.mark(student_ids, date, time, Status::Present)?;

        info!("Marked {inserted} students present on {date} at {time}");
        Ok(inserted)
    }

    /// Returns every attendance record joined with its student, most recent first.
    ///
    /// Records sharing a date and time are ordered by record ID, newest first.
    pub fn report(&mut self) -> AppResult<Vec<ReportRow>> {
        use schema::attendance::dsl::*;
        use schema::students::dsl::{name, roll_no};

        Ok(attendance
            .inner_join(schema::students::table)
            .order((date.desc(), time.desc(), id.desc()))
            .select((id, name, roll_no, date, time, status))
            .load::<ReportRow>(self.conn())?)
    }

    /// Deletes a single attendance record.
    pub fn delete_record(&mut self, record_id: i32) -> AppResult<()> {
        let deleted =
            diesel::delete(schema::attendance::table.find(record_id)).execute(self.conn())?;

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Attendance record {record_id}")));
        }

        info!(record = record_id, "Deleted attendance record");
        Ok(())
    }

    /// Deletes every attendance record and returns how many there were.
    pub fn delete_all_records(&mut self) -> AppResult<usize> {
        let deleted = diesel::delete(schema::attendance::table).execute(self.conn())?;

        info!("Deleted all {deleted} attendance records");
        Ok(deleted)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    /// A database living in a temporary directory for the duration of a test.
    pub(crate) struct TestDb {
        pub database: Database,
        _dir: TempDir,
    }

    impl TestDb {
        pub(crate) fn new() -> Self {
            Self::with_pool_size(2)
        }

        pub(crate) fn with_pool_size(pool_size: u32) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("attendance.db");
            let database = Database::connect(path.to_str().unwrap(), pool_size).unwrap();

            Self {
                database,
                _dir: dir,
            }
        }

        pub(crate) fn manager(&self) -> AttendanceManager {
            self.database.manager().unwrap()
        }
    }

    pub(crate) fn student(name: &str, roll_no: &str) -> NewStudent {
        NewStudent {
            name: name.to_string(),
            roll_no: roll_no.to_string(),
            branch: "CS".to_string(),
            photo_path: format!("static/uploads/{roll_no}.png"),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn provisioned_faculty_can_authenticate() {
        let db = TestDb::new();
        let mut manager = db.manager();

        let created = manager.create_faculty("prof1", "pass123").unwrap();
        assert_ne!(created.password_hash, "pass123");

        let found = manager.authenticate("prof1", "pass123").unwrap();
        assert_eq!(found, Some(created));
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let db = TestDb::new();
        let mut manager = db.manager();
        manager.create_faculty("prof1", "pass123").unwrap();

        assert_eq!(manager.authenticate("prof1", "wrong").unwrap(), None);
        assert_eq!(manager.authenticate("nobody", "pass123").unwrap(), None);
    }

    #[test]
    fn usernames_are_provisioned_once() {
        let db = TestDb::new();
        let mut manager = db.manager();
        manager.create_faculty("prof1", "pass123").unwrap();

        let err = manager.create_faculty("prof1", "other").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // The original password still works.
        assert!(manager.authenticate("prof1", "pass123").unwrap().is_some());
    }

    #[test]
    fn duplicate_roll_numbers_are_allowed() {
        let db = TestDb::new();
        let mut manager = db.manager();

        manager.register_student(&student("Alice", "R001")).unwrap();
        manager.register_student(&student("Alicia", "R001")).unwrap();

        let roster = manager.list_students().unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].name, "Alice");
        assert_eq!(roster[1].name, "Alicia");
    }

    #[test]
    fn marking_records_only_selected_students() {
        let db = TestDb::new();
        let mut manager = db.manager();

        let alice = manager.register_student(&student("Alice", "R001")).unwrap();
        let bob = manager.register_student(&student("Bob", "R002")).unwrap();
        let carol = manager.register_student(&student("Carol", "R003")).unwrap();

        let inserted = manager
            .mark_present(&[alice.id, carol.id], day(14), at(9, 30))
            .unwrap();
        assert_eq!(inserted, 2);

        let report = manager.report().unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|row| row.date == day(14)));
        assert!(report.iter().all(|row| row.time == at(9, 30)));
        assert!(report.iter().all(|row| row.status == Status::Present));
        assert!(!report.iter().any(|row| row.name == bob.name));
    }

    #[test]
    fn marking_nobody_records_nothing() {
        let db = TestDb::new();
        let mut manager = db.manager();
        manager.register_student(&student("Alice", "R001")).unwrap();

        assert_eq!(manager.mark_present(&[], day(14), at(9, 0)).unwrap(), 0);
        assert_eq!(manager.num_records().unwrap(), 0);
    }

    #[test]
    fn marking_an_unknown_student_records_nothing() {
        let db = TestDb::new();
        let mut manager = db.manager();
        let alice = manager.register_student(&student("Alice", "R001")).unwrap();

        let err = manager
            .mark_present(&[alice.id, alice.id + 100], day(14), at(9, 0))
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(manager.num_records().unwrap(), 0);
    }

    #[test]
    fn concurrent_marking_waits_for_the_lock() {
        const THREADS: usize = 8;
        const BATCHES: usize = 25;

        let db = TestDb::with_pool_size(THREADS as u32);
        let ids: Vec<i32> = {
            let mut manager = db.manager();
            ["R001", "R002"]
                .iter()
                .map(|roll| manager.register_student(&student("Student", roll)).unwrap().id)
                .collect()
        };

        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    let database = db.database.clone();
                    let ids = &ids;
                    scope.spawn(move || {
                        let mut manager = database.manager().unwrap();
                        for batch in 0..BATCHES {
                            manager
                                .mark_present(ids, day(14), at(9, batch as u32))
                                .unwrap();
                        }
                    })
                })
                .collect();

            for worker in workers {
                worker.join().unwrap();
            }
        });

        assert_eq!(
            db.manager().num_records().unwrap(),
            THREADS * BATCHES * ids.len()
        );
    }

    #[test]
    fn marking_twice_keeps_both_records() {
        let db = TestDb::new();
        let mut manager = db.manager();
        let alice = manager.register_student(&student("Alice", "R001")).unwrap();

        manager.mark_present(&[alice.id], day(14), at(9, 0)).unwrap();
        manager.mark_present(&[alice.id], day(14), at(14, 0)).unwrap();

        assert_eq!(manager.num_records().unwrap(), 2);
    }

    #[test]
    fn report_is_most_recent_first() {
        let db = TestDb::new();
        let mut manager = db.manager();
        let alice = manager.register_student(&student("Alice", "R001")).unwrap();
        let bob = manager.register_student(&student("Bob", "R002")).unwrap();

        manager.mark_present(&[alice.id], day(12), at(16, 0)).unwrap();
        manager.mark_present(&[alice.id], day(14), at(8, 0)).unwrap();
        manager.mark_present(&[alice.id, bob.id], day(14), at(10, 0)).unwrap();
        manager.mark_present(&[bob.id], day(13), at(9, 0)).unwrap();

        let report = manager.report().unwrap();
        let order: Vec<(NaiveDate, NaiveTime, &str)> = report
            .iter()
            .map(|row| (row.date, row.time, row.name.as_str()))
            .collect();

        assert_eq!(
            order,
            vec![
                (day(14), at(10, 0), "Bob"),
                (day(14), at(10, 0), "Alice"),
                (day(14), at(8, 0), "Alice"),
                (day(13), at(9, 0), "Bob"),
                (day(12), at(16, 0), "Alice"),
            ]
        );
    }

    #[test]
    fn deleting_a_record_leaves_the_others() {
        let db = TestDb::new();
        let mut manager = db.manager();
        let alice = manager.register_student(&student("Alice", "R001")).unwrap();
        let bob = manager.register_student(&student("Bob", "R002")).unwrap();
        manager
            .mark_present(&[alice.id, bob.id], day(14), at(9, 0))
            .unwrap();

        let before = manager.report().unwrap();
        let victim = before[0].id;
        manager.delete_record(victim).unwrap();

        let after = manager.report().unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0], before[1]);

        let err = manager.delete_record(victim).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn deleting_everything_empties_the_report() {
        let db = TestDb::new();
        let mut manager = db.manager();
        let alice = manager.register_student(&student("Alice", "R001")).unwrap();
        manager.mark_present(&[alice.id], day(13), at(9, 0)).unwrap();
        manager.mark_present(&[alice.id], day(14), at(9, 0)).unwrap();

        assert_eq!(manager.delete_all_records().unwrap(), 2);
        assert!(manager.report().unwrap().is_empty());
        assert_eq!(manager.num_students().unwrap(), 1);
    }
}
