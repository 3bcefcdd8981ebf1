use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::{Form, WithRejection};
use chrono::{Local, NaiveDate, NaiveTime, SubsecRound};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_sessions::Session;
use tracing::info;

use crate::auth::{self, CurrentFaculty};
use crate::error::{AppError, AppResult};
use crate::flash::{self, Flash};
use crate::models::NewStudent;
use crate::pages;
use crate::pdf::{self, PDF_FILE_NAME, PDF_MIME};
use crate::report::{self, XLSX_FILE_NAME, XLSX_MIME};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(home))
        .route("/create_faculty", get(create_faculty_form).post(create_faculty))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
        .route("/dashboard", get(dashboard))
        .route(
            "/register_student",
            get(register_student_form)
                .post(register_student)
                .layer(upload_limit),
        )
        .route(
            "/mark_attendance",
            get(mark_attendance_form).post(mark_attendance),
        )
        .route("/attendance_report", get(attendance_report))
        .route("/delete_attendance/{id}", get(delete_attendance))
        .route("/delete_all_attendance", get(delete_all_attendance))
        .route("/download_report_excel", get(download_report_excel))
        .route("/download_report_pdf", get(download_report_pdf))
        .nest_service("/uploads", ServeDir::new(state.uploads.dir()))
        .with_state(state)
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct MarkAttendance {
    #[serde(default)]
    present: Vec<String>,
}

async fn home(session: Session) -> AppResult<Html<String>> {
    Ok(Html(pages::home(&flash::take(&session).await?)))
}

async fn create_faculty_form(session: Session) -> AppResult<Html<String>> {
    Ok(Html(pages::create_faculty(&flash::take(&session).await?)))
}

async fn create_faculty(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Form(form), _): WithRejection<Form<Credentials>, AppError>,
) -> AppResult<Redirect> {
    let Credentials { username, password } = form;

    let faculty = state
        .db
        .run(move |manager| manager.create_faculty(&username, &password))
        .await?;

    flash::push(
        &session,
        Flash::success(format!(
            "Faculty '{}' created successfully!",
            faculty.username
        )),
    )
    .await?;

    Ok(Redirect::to("/login"))
}

async fn login_form(session: Session) -> AppResult<Html<String>> {
    Ok(Html(pages::login(&flash::take(&session).await?)))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Form(form), _): WithRejection<Form<Credentials>, AppError>,
) -> AppResult<Response> {
    let Credentials { username, password } = form;

    let found = state
        .db
        .run(move |manager| manager.authenticate(&username, &password))
        .await?;

    match found {
        Some(faculty) => {
            auth::sign_in(&session, &faculty).await?;
            flash::push(&session, Flash::success("Login successful!")).await?;

            Ok(Redirect::to("/dashboard").into_response())
        }
        None => {
            info!("Rejected a login attempt");

            let mut flashes = flash::take(&session).await?;
            flashes.push(Flash::danger("Invalid username or password"));

            Ok(Html(pages::login(&flashes)).into_response())
        }
    }
}

async fn logout(faculty: CurrentFaculty, session: Session) -> AppResult<Redirect> {
    auth::sign_out(&session, faculty).await?;
    flash::push(&session, Flash::success("Logged out successfully!")).await?;

    Ok(Redirect::to("/login"))
}

async fn dashboard(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Html<String>> {
    let (students, records) = state
        .db
        .run(|manager| Ok((manager.num_students()?, manager.num_records()?)))
        .await?;

    Ok(Html(pages::dashboard(
        &flash::take(&session).await?,
        students,
        records,
    )))
}

async fn register_student_form(
    _faculty: CurrentFaculty,
    session: Session,
) -> AppResult<Html<String>> {
    Ok(Html(pages::register_student(&flash::take(&session).await?)))
}

/// The fields of a student registration form.
#[derive(Default)]
struct Registration {
    name: Option<String>,
    roll_no: Option<String>,
    branch: Option<String>,
    photo: Option<(String, Vec<u8>)>,
}

impl Registration {
    async fn read(multipart: &mut Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "name" => form.name = Some(field.text().await?),
                "roll_no" => form.roll_no = Some(field.text().await?),
                "branch" => form.branch = Some(field.text().await?),
                "photo" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let contents = field.bytes().await?;

                    // Browsers send an empty part when no file was picked.
                    if !file_name.is_empty() {
                        form.photo = Some((file_name, contents.to_vec()));
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::Validation(format!("Missing form field '{field}'")))
}

async fn register_student(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
    session: Session,
    WithRejection(mut multipart, _): WithRejection<Multipart, AppError>,
) -> AppResult<Redirect> {
    let form = Registration::read(&mut multipart).await?;

    let name = required(form.name, "name")?;
    let roll_no = required(form.roll_no, "roll_no")?;
    let branch = required(form.branch, "branch")?;
    let (file_name, contents) = required(form.photo, "photo")?;

    let photo = state.uploads.save(&file_name, &contents).await?;

    let student = NewStudent {
        name,
        roll_no,
        branch,
        photo_path: photo.to_string_lossy().into_owned(),
    };

    if let Err(e) = state
        .db
        .run(move |manager| manager.register_student(&student))
        .await
    {
        state.uploads.discard(&photo).await;
        return Err(e);
    }

    flash::push(&session, Flash::success("Student registered successfully!")).await?;

    Ok(Redirect::to("/register_student"))
}

async fn mark_attendance_form(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Html<String>> {
    let students = state.db.run(|manager| manager.list_students()).await?;

    Ok(Html(pages::mark_attendance(
        &flash::take(&session).await?,
        &students,
    )))
}

/// The server's local date and wall-clock time, to the second.
fn marking_timestamp() -> (NaiveDate, NaiveTime) {
    let now = Local::now().naive_local();

    (now.date(), now.time().trunc_subsecs(0))
}

async fn mark_attendance(
    faculty: CurrentFaculty,
    State(state): State<AppState>,
    session: Session,
    WithRejection(Form(form), _): WithRejection<Form<MarkAttendance>, AppError>,
) -> AppResult<Redirect> {
    let student_ids = form
        .present
        .iter()
        .map(|raw| {
            raw.trim()
                .parse::<i32>()
                .map_err(|_| AppError::Validation(format!("'{raw}' is not a student ID")))
        })
        .collect::<AppResult<Vec<i32>>>()?;

    let (date, time) = marking_timestamp();

    let marked = state
        .db
        .run(move |manager| manager.mark_present(&student_ids, date, time))
        .await?;

    info!(faculty = faculty.id, "Recorded {marked} attendance marks");
    flash::push(&session, Flash::success("Attendance marked successfully!")).await?;

    Ok(Redirect::to("/dashboard"))
}

async fn attendance_report(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Html<String>> {
    let records = state.db.run(|manager| manager.report()).await?;

    Ok(Html(pages::report(&flash::take(&session).await?, &records)))
}

async fn delete_attendance(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
    session: Session,
    WithRejection(Path(record_id), _): WithRejection<Path<i32>, AppError>,
) -> AppResult<Redirect> {
    state
        .db
        .run(move |manager| manager.delete_record(record_id))
        .await?;

    flash::push(
        &session,
        Flash::success("Attendance record deleted successfully!"),
    )
    .await?;

    Ok(Redirect::to("/attendance_report"))
}

async fn delete_all_attendance(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Redirect> {
    state.db.run(|manager| manager.delete_all_records()).await?;

    flash::push(
        &session,
        Flash::success("All attendance records deleted successfully!"),
    )
    .await?;

    Ok(Redirect::to("/attendance_report"))
}

fn attachment(mime: &'static str, file_name: &str, contents: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        contents,
    )
        .into_response()
}

async fn download_report_excel(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let workbook = state
        .db
        .run(|manager| report::to_xlsx(&manager.report()?))
        .await?;

    Ok(attachment(XLSX_MIME, XLSX_FILE_NAME, workbook))
}

async fn download_report_pdf(
    _faculty: CurrentFaculty,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let document = state
        .db
        .run(|manager| pdf::to_pdf(&manager.report()?))
        .await?;

    Ok(attachment(PDF_MIME, PDF_FILE_NAME, document))
}
