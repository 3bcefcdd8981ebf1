use anyhow::Result;
use clap::Parser;
use smart_attendance::cli::{Cli, Command};
use smart_attendance::config::Settings;
use smart_attendance::db::Database;
use smart_attendance::{display, start_server};
use tracing_subscriber::{EnvFilter, fmt};

fn connect(settings: &Settings) -> Result<Database> {
    Ok(Database::connect(
        &settings.database.url,
        settings.database.pool_size,
    )?)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Command::Serve => start_server(settings).await?,
        Command::CreateFaculty { username, password } => {
            let faculty = connect(&settings)?
                .run(move |manager| manager.create_faculty(&username, &password))
                .await?;
            println!("Faculty '{}' created with ID {}", faculty.username, faculty.id);
        }
        Command::Roster { verbose } => {
            connect(&settings)?
                .run(move |manager| display::show_roster(manager, verbose))
                .await?
        }
        Command::Report => connect(&settings)?.run(display::show_report).await?,
    }

    Ok(())
}
