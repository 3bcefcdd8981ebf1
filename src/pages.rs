//! Server-rendered HTML pages.

use std::fmt::Write;

use axum::http::StatusCode;

use crate::flash::Flash;
use crate::models::{ReportRow, Student};

const STYLE: &str = "\
body { font-family: sans-serif; margin: 2rem auto; max-width: 60rem; }
nav a { margin-right: 1rem; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 0.4rem; text-align: left; }
.flash { padding: 0.5rem; margin: 0.5rem 0; }
.success { background: #e3f6e3; }
.danger { background: #f8e0e0; }
form label { display: block; margin: 0.5rem 0; }";

/// Escapes text for use inside HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn layout(title: &str, signed_in: bool, flashes: &[Flash], body: &str) -> String {
    let nav = if signed_in {
        r#"<a href="/dashboard">Dashboard</a><a href="/register_student">Register student</a><a href="/mark_attendance">Mark attendance</a><a href="/attendance_report">Report</a><a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/">Home</a><a href="/login">Log in</a>"#
    };

    let mut messages = String::new();
    for flash in flashes {
        let _ = write!(
            messages,
            r#"<div class="flash {}">{}</div>"#,
            flash.level.css_class(),
            escape(&flash.message)
        );
    }

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head>\
         <body><nav>{nav}</nav>{messages}<h1>{title}</h1>{body}</body></html>",
        title = escape(title),
    )
}

pub fn home(flashes: &[Flash]) -> String {
    layout(
        "Smart Attendance",
        false,
        flashes,
        r#"<p>Track daily attendance for your students.</p><p><a href="/login">Faculty login</a></p>"#,
    )
}

pub fn create_faculty(flashes: &[Flash]) -> String {
    layout(
        "Create faculty account",
        false,
        flashes,
        r#"<form method="post" action="/create_faculty">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Create</button>
</form>"#,
    )
}

pub fn login(flashes: &[Flash]) -> String {
    layout(
        "Faculty login",
        false,
        flashes,
        r#"<form method="post" action="/login">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Log in</button>
</form>"#,
    )
}

pub fn dashboard(flashes: &[Flash], students: usize, records: usize) -> String {
    let body = format!(
        "<p>{students} registered students, {records} attendance records.</p>\
         <ul><li><a href=\"/register_student\">Register a student</a></li>\
         <li><a href=\"/mark_attendance\">Mark today's attendance</a></li>\
         <li><a href=\"/attendance_report\">View the attendance report</a></li></ul>"
    );

    layout("Dashboard", true, flashes, &body)
}

pub fn register_student(flashes: &[Flash]) -> String {
    layout(
        "Register student",
        true,
        flashes,
        r#"<form method="post" action="/register_student" enctype="multipart/form-data">
<label>Name <input name="name" required></label>
<label>Roll number <input name="roll_no" required></label>
<label>Branch <input name="branch" required></label>
<label>Photo <input name="photo" type="file" accept="image/*" required></label>
<button type="submit">Register</button>
</form>"#,
    )
}

pub fn mark_attendance(flashes: &[Flash], students: &[Student]) -> String {
    if students.is_empty() {
        return layout(
            "Mark attendance",
            true,
            flashes,
            r#"<p>No students registered yet. <a href="/register_student">Register one</a>.</p>"#,
        );
    }

    let mut rows = String::new();
    for student in students {
        let _ = write!(
            rows,
            r#"<tr><td><input type="checkbox" name="present" value="{}"></td><td>{}</td><td>{}</td></tr>"#,
            student.id,
            escape(&student.name),
            escape(&student.roll_no)
        );
    }

    let body = format!(
        "<form method=\"post\" action=\"/mark_attendance\"><table>\
         <tr><th>Present</th><th>Name</th><th>Roll No</th></tr>{rows}</table>\
         <p><button type=\"submit\">Submit attendance</button></p></form>"
    );

    layout("Mark attendance", true, flashes, &body)
}

pub fn report(flashes: &[Flash], records: &[ReportRow]) -> String {
    let actions = r#"<p><a href="/download_report_excel">Download Excel</a> <a href="/download_report_pdf">Download PDF</a> <a href="/delete_all_attendance">Delete all records</a></p>"#;

    if records.is_empty() {
        return layout(
            "Attendance report",
            true,
            flashes,
            &format!("{actions}<p>No attendance records.</p>"),
        );
    }

    let mut rows = String::new();
    for record in records {
        let _ = write!(rows, "<tr>");
        for cell in record.cells() {
            let _ = write!(rows, "<td>{}</td>", escape(&cell));
        }
        let _ = write!(
            rows,
            r#"<td><a href="/delete_attendance/{}">Delete</a></td></tr>"#,
            record.id
        );
    }

    let body = format!(
        "{actions}<table><tr><th>Name</th><th>Roll No</th><th>Date</th><th>Time</th>\
         <th>Status</th><th></th></tr>{rows}</table>"
    );

    layout("Attendance report", true, flashes, &body)
}

pub fn error(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<p>{}</p><p><a href=\"/\">Back to the homepage</a></p>",
        escape(message)
    );

    layout(title, false, &[], &body)
}
