mod cli;
mod commands;
mod infra;
mod library;
mod pending;
mod shared;
mod sync;
mod tasks;
#[cfg(test)]
mod testing;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let Cli {
        repo,
        verbose,
        command,
    } = Cli::parse();
    let _logging = shared::logging::init(verbose);
    let repo = repo.as_deref();

    match command {
        Commands::Status(args) => commands::status::run(&args, repo)?,
        Commands::Fetch(args) => commands::fetch::run(&args, repo)?,
        Commands::Sync(args) => commands::sync::run(&args, repo)?,
        Commands::Push(args) => commands::push::run(&args, repo)?,
        Commands::Pending(cmd) => cmd.run(repo)?,
        Commands::History(args) => commands::history::run(&args, repo)?,
        Commands::Watch(args) => commands::watch::run(&args, repo)?,
        Commands::Config(cmd) => cmd.run()?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "partdb", &mut std::io::stdout());
        }
    }

    Ok(())
}
