pub mod districts;
pub mod init;
pub mod reconcile;
pub mod status;
pub mod tags;
pub mod tasks;
pub mod upload;

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, TaskFilter};
use crate::error::{Result, TaskbookError};
use crate::export::OutputFormat;
use crate::settings::{db_path, get_data_dir};

#[derive(Parser)]
#[command(name = "taskbook", about = "Reconcile call register spreadsheets into task records.")]
pub struct Cli {
    /// Show per-row diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up taskbook: choose a data directory and initialize the store.
    Init {
        /// Path for taskbook data (default: ~/Documents/taskbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Reconcile a register spreadsheet into task and task-tag files.
    Reconcile {
        /// Path to the register (.xlsx, .xls, .ods or .csv)
        file: String,
        /// Output directory (default: <data_dir>/exports/<file>-<date>)
        #[arg(long)]
        out: Option<String>,
        /// Output file format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// District snapshot CSV (id,name) to use instead of the store
        #[arg(long)]
        districts: Option<String>,
        /// Print only the summary, not the review tables
        #[arg(long)]
        quiet: bool,
    },
    /// Insert a reconciled tasks file and task_tags file into the store.
    Upload {
        /// tasks file written by `taskbook reconcile`
        tasks: String,
        /// task_tags file written by `taskbook reconcile`
        task_tags: String,
    },
    /// List or export tasks in the store.
    Tasks {
        #[command(subcommand)]
        command: TasksCommands,
    },
    /// Manage districts.
    Districts {
        #[command(subcommand)]
        command: DistrictsCommands,
    },
    /// Manage tags.
    Tags {
        #[command(subcommand)]
        command: TagsCommands,
    },
    /// Show the store location and record counts.
    Status,
}

#[derive(Subcommand)]
pub enum DistrictsCommands {
    /// Add a district.
    Add {
        /// District name, e.g. 'Ernakulam'
        name: String,
        /// Use this id instead of generating one
        #[arg(long)]
        id: Option<String>,
    },
    /// List all districts.
    List,
    /// Import districts from a CSV with id and name columns.
    Import {
        /// Path to the CSV snapshot
        file: String,
    },
    /// Delete a district no task refers to.
    Delete {
        /// District name or id
        district: String,
    },
}

#[derive(Subcommand)]
pub enum TagsCommands {
    /// List tags with their ids and task counts.
    List,
    /// Add a tag.
    Add {
        /// Tag name, e.g. 'FOLLOW UP'
        name: String,
        /// Display color as #rrggbb
        #[arg(long, default_value = "#3b82f6")]
        color: String,
    },
    /// Delete a tag no task carries.
    Delete {
        /// Tag name or id
        tag: String,
    },
}

#[derive(Subcommand)]
pub enum TasksCommands {
    /// List tasks, newest first.
    List {
        #[command(flatten)]
        filter: TaskFilterArgs,
    },
    /// Export tasks to a spreadsheet laid out like the register.
    Export {
        #[command(flatten)]
        filter: TaskFilterArgs,
        /// Output file (default: <data_dir>/exports/tasks_export_<date>.<format>)
        #[arg(long)]
        out: Option<String>,
        /// Output file format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
}

#[derive(Args)]
pub struct TaskFilterArgs {
    /// Only tasks in this district (name or id); repeatable
    #[arg(long = "district")]
    pub districts: Vec<String>,
    /// Only tasks carrying this tag (name or id); repeatable
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Only tasks with this status, e.g. pending
    #[arg(long)]
    pub status: Option<String>,
}

impl From<TaskFilterArgs> for TaskFilter {
    fn from(args: TaskFilterArgs) -> Self {
        TaskFilter {
            districts: args.districts,
            tags: args.tags,
            status: args.status,
        }
    }
}

/// Open the store under the configured data dir, refusing to create a fresh
/// empty one by accident.
pub(crate) fn open_store() -> Result<Connection> {
    let data_dir = get_data_dir();
    let path = db_path(&data_dir);
    if !path.exists() {
        return Err(TaskbookError::Settings(format!(
            "No store found at {}\nRun `taskbook init` to create one.",
            path.display()
        )));
    }
    get_connection(&path)
}
