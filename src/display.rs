use crate::error::AppResult;
use crate::manager::AttendanceManager;
use tabled::{Table, Tabled, settings::Style};

/// Pretty prints the roster of registered students.
pub fn show_roster(manager: &mut AttendanceManager, verbose: bool) -> AppResult<()> {
    let roster = manager.list_students()?;

    let mut table = if verbose {
        Table::new(roster)
    } else {
        #[derive(Tabled)]
        struct SimpleStudent {
            id: i32,
            name: String,
            #[tabled(rename = "roll number")]
            roll_no: String,
        }

        let simplified_roster: Vec<SimpleStudent> = roster
            .into_iter()
            .map(|student| SimpleStudent {
                id: student.id,
                name: student.name,
                roll_no: student.roll_no,
            })
            .collect();

        Table::new(simplified_roster)
    };

    table.with(Style::modern());
    println!("Roster:\n{table}");

    Ok(())
}

/// Pretty prints every attendance record, most recent first.
pub fn show_report(manager: &mut AttendanceManager) -> AppResult<()> {
    let report = manager.report()?;
    let count = report.len();

    let mut table = Table::new(report);
    table.with(Style::modern());

    println!("Attendance report ({count} records):\n{table}");

    Ok(())
}
