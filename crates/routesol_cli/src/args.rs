use clap::Parser;
use routesol_core::{default_log_level, DEFAULT_STORES_NAMESPACE, DEFAULT_USERS_NAMESPACE};
use std::env;
use std::io;
use std::path::PathBuf;

const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Manage delivery store records in a document store",
    long_about = "Console tool to register and log in operators, then insert, import, search, \
                  update and delete delivery store records."
)]
pub struct Cli {
    #[arg(
        long,
        env = "ROUTESOL_CONNECTION_STRING",
        default_value = "sqlite://routesol.sqlite3",
        value_name = "URL",
        help = "Document store connection string (sqlite://PATH, file:PATH or PATH)"
    )]
    pub connection_string: String,

    #[arg(
        long,
        env = "ROUTESOL_STORES_NAMESPACE",
        default_value = DEFAULT_STORES_NAMESPACE,
        value_name = "NAME",
        help = "Namespace holding the Stores collection"
    )]
    pub stores_namespace: String,

    #[arg(
        long,
        env = "ROUTESOL_USERS_NAMESPACE",
        default_value = DEFAULT_USERS_NAMESPACE,
        value_name = "NAME",
        help = "Namespace holding the Users collection"
    )]
    pub users_namespace: String,

    #[arg(
        long,
        env = "ROUTESOL_LOG_DIR",
        value_name = "DIR",
        help = "Directory for rolling log files [default: ./logs]"
    )]
    pub log_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "ROUTESOL_LOG_LEVEL",
        value_name = "LEVEL",
        help = "Log level: trace, debug, info, warn or error"
    )]
    pub log_level: Option<String>,
}

impl Cli {
    /// Absolute log directory; relative paths resolve against the working
    /// directory.
    pub fn resolved_log_dir(&self) -> io::Result<PathBuf> {
        let dir = self
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
        if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(env::current_dir()?.join(dir))
        }
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }
}

pub fn parse() -> Cli {
    let dotenv_path = env::var("DOTENV_PATH").unwrap_or(".env".into());
    dotenvy::from_filename(&dotenv_path).ok();

    Cli::parse()
}
