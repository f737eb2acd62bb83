use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use clinic_vault::audit::AuditLogger;
use clinic_vault::cli::{
    handle_backup_command, handle_encrypt_command, handle_table_command, BackupCommands,
    EncryptCommands, Session, TableCommands,
};
use clinic_vault::config::ClinicPaths;
use clinic_vault::crypto::CryptoCapability;

/// Environment variable holding the log filter
const LOG_ENV: &str = "CLINIC_VAULT_LOG";

#[derive(Parser)]
#[command(
    name = "clinic-vault",
    version,
    about = "Backups, encrypted snapshots, restore and CSV transfer for the clinic database",
    long_about = "Clinic Vault manages the lifecycle of the clinic's data: full snapshots \
                  of the database (optionally sealed with AES-256-GCM), safe restore \
                  with stage-then-swap, and CSV export/import of any table."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data home, settings and database
    Init,

    /// Show current configuration and paths
    Config,

    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Backup encryption commands
    #[command(subcommand)]
    Encrypt(EncryptCommands),

    /// CSV export/import commands
    #[command(subcommand)]
    Table(TableCommands),

    /// Show recent lifecycle operations
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let paths = ClinicPaths::new()?;

    // History only reads the audit log; no need to open the store.
    if let Some(Commands::History { limit }) = cli.command {
        let entries = AuditLogger::new(paths.audit_log()).read_recent(limit)?;
        if entries.is_empty() {
            println!("No lifecycle operations recorded yet.");
        }
        for entry in entries {
            println!("{}", entry.format_human_readable());
        }
        return Ok(());
    }

    let mut session = Session::open(paths, CryptoCapability::detect())?;

    match cli.command {
        Some(Commands::Init) => {
            println!(
                "Clinic Vault initialized at: {}",
                session.paths.base_dir().display()
            );
            println!("Database: {}", session.paths.database_file().display());
        }
        Some(Commands::Config) => {
            let settings = &session.settings;
            println!("Clinic Vault Configuration");
            println!("==========================");
            println!("Data directory:   {}", session.paths.base_dir().display());
            println!("Database:         {}", session.paths.database_file().display());
            println!("Backup directory: {}", session.paths.backup_dir().display());
            println!("Export directory: {}", session.paths.export_dir().display());
            println!();
            println!("Settings:");
            println!("  Language:         {}", settings.language);
            println!("  Dark mode:        {}", settings.dark_mode);
            println!("  Username:         {}", settings.username);
            println!("  Encrypt backups:  {}", settings.encrypt_backups);
            println!(
                "  Backup key:       {}",
                if settings.encryption_key.is_some() {
                    "stored"
                } else {
                    "none"
                }
            );
        }
        Some(Commands::Backup(cmd)) => handle_backup_command(&mut session, cmd)?,
        Some(Commands::Encrypt(cmd)) => handle_encrypt_command(&mut session, cmd)?,
        Some(Commands::Table(cmd)) => handle_table_command(&session, cmd)?,
        Some(Commands::History { .. }) => {}
        None => {
            println!("Clinic Vault - data lifecycle manager for the clinic database");
            println!();
            println!("Run 'clinic-vault --help' for usage information.");
        }
    }

    Ok(())
}
