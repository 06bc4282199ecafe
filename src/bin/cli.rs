//! flatdb CLI
//!
//! Command-line interface for managing and querying a flatdb directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flatdb::database;
use flatdb::record::parse_hire_date;
use flatdb::{Config, Employee, Engine, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// flatdb CLI
#[derive(Parser, Debug)]
#[command(name = "flatdb-cli")]
#[command(about = "CLI for the flatdb flat-file record database")]
#[command(version)]
struct Args {
    /// Database directory
    #[arg(short, long, default_value = "./flatdb_data")]
    db: PathBuf,

    /// fsync after every write instead of only on close
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty database
    Create,

    /// Check that the database files are present and well-formed
    Validate,

    /// Delete the database files and directory
    Drop,

    /// Add a record
    Add(RecordArgs),

    /// Replace an existing record
    Update(RecordArgs),

    /// Show a record by id
    Get {
        id: i32,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List records, optionally filtered
    List {
        /// Exact department match
        #[arg(long)]
        department: Option<String>,

        /// Exact position match
        #[arg(long)]
        position: Option<String>,

        /// Case-insensitive name fragment
        #[arg(long)]
        name: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a record by id
    Delete { id: i32 },

    /// Delete every record in a department
    DeleteDepartment { department: String },

    /// Show record count and data file size
    Stats,
}

#[derive(clap::Args, Debug)]
struct RecordArgs {
    #[arg(long)]
    id: i32,

    #[arg(long)]
    name: String,

    #[arg(long)]
    department: String,

    #[arg(long)]
    position: String,

    #[arg(long)]
    salary: f32,

    /// Hire date as YYYY-MM-DD
    #[arg(long)]
    hire_date: String,
}

impl RecordArgs {
    fn to_employee(&self) -> flatdb::Result<Employee> {
        Ok(Employee::new(
            self.id,
            self.name.as_str(),
            self.department.as_str(),
            self.position.as_str(),
            self.salary,
            parse_hire_date(&self.hire_date)?,
        ))
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flatdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> flatdb::Result<()> {
    match args.command {
        Commands::Create => return database::create_database(&args.db),
        Commands::Validate => {
            database::validate_database(&args.db)?;
            println!("{} is a valid database", args.db.display());
            return Ok(());
        }
        Commands::Drop => return database::delete_database(&args.db),
        _ => {}
    }

    let sync_strategy = if args.sync {
        SyncStrategy::EveryWrite
    } else {
        SyncStrategy::OnClose
    };
    let config = Config::builder()
        .db_dir(&args.db)
        .create_if_missing(false)
        .sync_strategy(sync_strategy)
        .build();
    let engine = Engine::open_with(config)?;

    match args.command {
        Commands::Add(record) => {
            engine.add(&record.to_employee()?)?;
            println!("Added {}", record.id);
        }
        Commands::Update(record) => {
            engine.update(&record.to_employee()?)?;
            println!("Updated {}", record.id);
        }
        Commands::Get { id, json } => match engine.find_by_id(id)? {
            Some(employee) => print_records(&[employee], json)?,
            None => println!("Record {} not found", id),
        },
        Commands::List {
            department,
            position,
            name,
            json,
        } => {
            let records = if let Some(department) = department {
                engine.find_by_department(&department)?
            } else if let Some(position) = position {
                engine.find_by_position(&position)?
            } else if let Some(name) = name {
                engine.find_by_name(&name)?
            } else {
                engine.get_all()?
            };
            print_records(&records, json)?;
        }
        Commands::Delete { id } => {
            if engine.delete_by_id(id)? {
                println!("Deleted {}", id);
            } else {
                println!("Record {} not found", id);
            }
        }
        Commands::DeleteDepartment { department } => {
            let deleted = engine.delete_by_department(&department)?;
            println!("Deleted {} records", deleted);
        }
        Commands::Stats => {
            println!("records: {}", engine.count()?);
            println!("data bytes: {}", engine.size_in_bytes()?);
        }
        Commands::Create | Commands::Validate | Commands::Drop => {}
    }

    engine.close()
}

fn print_records(records: &[Employee], json: bool) -> flatdb::Result<()> {
    if json {
        let out = serde_json::to_string_pretty(records)
            .map_err(|e| flatdb::FlatDbError::Io(e.into()))?;
        println!("{}", out);
    } else {
        for record in records {
            println!("{}", record);
        }
    }
    Ok(())
}
