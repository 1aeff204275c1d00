use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use revision_changes::render::{everything, listed};
use revision_changes::{DEFAULT_BATCH_SIZE, Repository, Revision, Session, TextRenderer, select_paths};
use std::io;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "revision-changes")]
#[command(about = "List the files a revision changes, matched to their diff sections")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changed files of a commit, the index or the worktree
    Show {
        /// Commit to show (defaults to HEAD)
        rev: Option<String>,

        /// Show staged changes instead of a commit
        #[arg(long, conflicts_with_all = ["rev", "unstaged"])]
        staged: bool,

        /// Show unstaged changes instead of a commit
        #[arg(long, conflicts_with = "rev")]
        unstaged: bool,

        /// Repository to run git in
        #[arg(long, default_value = ".")]
        repo: String,

        /// Lines handed over per batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Only show the diff sections of these files
        #[arg(long, num_args = 1..)]
        select: Vec<String>,

        /// Also list files without a diff section
        #[arg(long)]
        all: bool,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
    /// Print the man page
    Man,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive("revision_changes=debug".parse()?)
    } else {
        EnvFilter::from_default_env().add_directive("revision_changes=info".parse()?)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Show {
            rev,
            staged,
            unstaged,
            repo,
            batch_size,
            select,
            all,
        } => {
            let repository = Repository::new(&repo).with_batch_size(batch_size);
            let revision = if staged {
                Revision::Staged
            } else if unstaged {
                Revision::Unstaged
            } else {
                repository.resolve(rev.as_deref().unwrap_or("HEAD"))?
            };

            let mut session = Session::new();
            let events = repository.load(&mut session, revision);
            debug!(events = events.len(), state = ?session.state(), "loaded");

            if !select.is_empty() {
                select_paths(&mut session, select.as_slice())?;
            }

            let mut renderer = TextRenderer::new();
            if all {
                session.changes().render(everything, &mut renderer);
            } else {
                session.changes().render(listed, &mut renderer);
            }
            print!("{}", renderer.as_str());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "revision-changes", &mut io::stdout());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut io::stdout())?;
        }
    }

    Ok(())
}
