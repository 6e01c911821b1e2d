//! gitblock - command-line interface over a directory of repository records.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gitblock::codec::Payload;
use gitblock::config::GitblockConfig;
use gitblock::repo::{CreateRepo, FileMetadata, RepoIndex, Workspace};
use gitblock::store::DirObjectStore;

/// state directory used when neither `--state` nor the config names one
const DEFAULT_STATE_DIR: &str = ".gitblock";

/// gitblock - ephemeral git repositories stored as block payloads
#[derive(Parser, Debug)]
#[command(name = "gitblock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding repository records
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a repository seeded with one commit
    Create {
        owner: String,
        name: String,
        /// Repository description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Homepage link
        #[arg(short, long, default_value = "")]
        link: String,
    },

    /// Show a repository's descriptive fields
    Show { owner: String, name: String },

    /// List all repositories
    List,

    /// Show the checked-out tree with commit data
    Files {
        owner: String,
        name: String,
        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print branch refs as `<oid>\trefs/heads/<name>`
    Refs { owner: String, name: String },

    /// Write a repository's payload to a file
    Export {
        owner: String,
        name: String,
        file: PathBuf,
    },

    /// Replace a repository's payload with the contents of a file
    Import {
        owner: String,
        name: String,
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gitblock={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => GitblockConfig::from_file(path)?,
        None => GitblockConfig::default(),
    };
    let state_dir = cli
        .state
        .or_else(|| config.state_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

    let store = DirObjectStore::open(state_dir)?;
    let index = RepoIndex::load(Workspace::new(config)?, &store)?;

    match cli.command {
        Commands::Create {
            owner,
            name,
            description,
            link,
        } => {
            let request = CreateRepo::new(owner, name).description(description).link(link);
            let id = index.create_repo(request)?;
            index.save(&store)?;
            println!("{}", id);
        }
        Commands::Show { owner, name } => {
            let info = index.get_repo(&owner, &name)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::List => {
            let repos = index.list_repos();
            for info in &repos {
                println!("{}\t{}/{}\t{}", info.id, info.owner, info.name, info.description);
            }
            println!("({} repositories)", repos.len());
        }
        Commands::Files { owner, name, json } => {
            let id = index.find(&owner, &name)?;
            let metadata = index.codebase_metadata(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            } else {
                println!(
                    "{} {} ({} commits)",
                    metadata.latest_commit.short_hash,
                    metadata.latest_commit.message,
                    metadata.total_commits
                );
                print_tree(&metadata.files, 0);
            }
        }
        Commands::Refs { owner, name } => {
            let id = index.find(&owner, &name)?;
            print!("{}", index.advertise_refs(&id)?);
        }
        Commands::Export { owner, name, file } => {
            let id = index.find(&owner, &name)?;
            let payload = index.get_data(&id)?;
            write_file(&file, payload.as_bytes())?;
            println!("{} bytes written to {}", payload.len(), file.display());
        }
        Commands::Import { owner, name, file } => {
            let id = index.find(&owner, &name)?;
            let bytes = fs::read(&file).map_err(|e| format!("{}: {}", file.display(), e))?;
            let len = bytes.len();
            index.set_data(&id, Payload::new(bytes))?;
            index.save(&store)?;
            println!("{} bytes imported into {}/{}", len, owner, name);
        }
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, bytes).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(())
}

fn print_tree(files: &BTreeMap<String, FileMetadata>, depth: usize) {
    for (name, meta) in files {
        let indent = "  ".repeat(depth);
        match &meta.children {
            Some(children) => {
                println!("{}{}/", indent, name);
                print_tree(children, depth + 1);
            }
            None => println!("{}{}", indent, name),
        }
    }
}
