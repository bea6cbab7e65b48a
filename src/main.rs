mod cli;
mod db;
mod district;
mod error;
mod export;
mod fmt;
mod importer;
mod logging;
mod models;
mod normalize;
mod reconciler;
mod settings;
mod uploader;

use clap::Parser;

use cli::{Cli, Commands, DistrictsCommands, TagsCommands, TasksCommands};

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Reconcile {
            file,
            out,
            format,
            districts,
            quiet,
        } => cli::reconcile::run(&file, out.as_deref(), format, districts.as_deref(), quiet),
        Commands::Upload { tasks, task_tags } => cli::upload::run(&tasks, &task_tags),
        Commands::Tasks { command } => match command {
            TasksCommands::List { filter } => cli::tasks::list(filter.into()),
            TasksCommands::Export { filter, out, format } => {
                cli::tasks::export(filter.into(), out.as_deref(), format)
            }
        },
        Commands::Districts { command } => match command {
            DistrictsCommands::Add { name, id } => cli::districts::add(&name, id.as_deref()),
            DistrictsCommands::List => cli::districts::list(),
            DistrictsCommands::Import { file } => cli::districts::import(&file),
            DistrictsCommands::Delete { district } => cli::districts::delete(&district),
        },
        Commands::Tags { command } => match command {
            TagsCommands::List => cli::tags::list(),
            TagsCommands::Add { name, color } => cli::tags::add(&name, &color),
            TagsCommands::Delete { tag } => cli::tags::delete(&tag),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
