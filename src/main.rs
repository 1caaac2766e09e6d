// People Import - Command line
// init-db | import <file> --affiliation <label> | list

use anyhow::Result;
use clap::{Parser, Subcommand};
use people_import::config::DEFAULT_DB_PATH;
use people_import::{
    count_people, count_phones, import, open_connection, query_people, setup_database,
    PeopleFilter,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "people-import")]
#[command(about = "Bulk-import people and phone spreadsheets into SQLite")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long = "db", global = true, default_value = DEFAULT_DB_PATH, env = "PEOPLE_DB_PATH")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the people and phones tables
    InitDb,
    /// Import one semicolon-separated spreadsheet
    Import {
        file: PathBuf,
        /// Affiliation label stamped on every imported person
        #[arg(short, long)]
        affiliation: String,
    },
    /// Show one page of imported people
    List {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        affiliation: Option<String>,
        /// Identifier fragment
        #[arg(long)]
        id: Option<String>,
        /// Name fragment
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("people_import=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::InitDb => run_init(&cli.db_path),
        Command::Import { file, affiliation } => run_import(&cli.db_path, &file, &affiliation),
        Command::List { region, affiliation, id, name, page } => {
            let filter = PeopleFilter {
                region,
                affiliation,
                id_fragment: id,
                name_fragment: name,
                page: Some(page),
            };
            run_list(&cli.db_path, &filter)
        }
    }
}

fn run_init(db_path: &Path) -> Result<()> {
    println!("🔧 Setting up database...");
    let conn = open_connection(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode: {}", db_path.display());
    Ok(())
}

fn run_import(db_path: &Path, file: &Path, affiliation: &str) -> Result<()> {
    println!("📂 Importing {} as '{}'", file.display(), affiliation);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut conn = open_connection(db_path)?;
    let outcome = import(&mut conn, file, affiliation);

    for diagnostic in &outcome.diagnostics {
        println!("⚠️  {}", diagnostic);
    }

    if !outcome.success {
        eprintln!("❌ {}", outcome.summary);
        std::process::exit(1);
    }

    println!("✅ {}", outcome.summary);
    println!(
        "✓ Database now holds {} people and {} phones",
        count_people(&conn)?,
        count_phones(&conn)?
    );
    Ok(())
}

fn run_list(db_path: &Path, filter: &PeopleFilter) -> Result<()> {
    if !db_path.exists() {
        eprintln!("❌ Database not found at {}", db_path.display());
        eprintln!("   Run: people-import init-db");
        std::process::exit(1);
    }

    let conn = open_connection(db_path)?;
    let page = query_people(&conn, filter)?;

    for row in &page.rows {
        println!(
            "{:<14} {:<40} {:<10} {}",
            row.national_id,
            row.full_name.as_deref().unwrap_or("-"),
            row.birth_date.as_deref().unwrap_or("-"),
            row.affiliation.as_deref().unwrap_or("-"),
        );
    }
    println!(
        "\n📊 Page {} of {} ({} people)",
        page.page, page.total_pages, page.total
    );
    Ok(())
}
