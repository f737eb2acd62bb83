//! Backup CLI commands
//!
//! Implements CLI commands for backup creation, listing and restore.

use clap::{Subcommand, ValueEnum};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{format_size, key_for_use, supplied_key, Session};
use crate::audit::Operation;
use crate::backup::{is_encrypted_artifact, BackupArtifact, BackupService, RestoreService};
use crate::error::VaultResult;

/// How a restore treats the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RestoreMode {
    /// Decrypt when the file name ends in `.enc`
    Auto,
    /// Copy the artifact as-is
    Plain,
    /// Decrypt the artifact
    Encrypted,
}

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup using the encryption setting
    Create,

    /// List all available backups
    List,

    /// Restore the clinic database from a backup
    Restore {
        /// Backup filename or path (use 'latest' for most recent)
        backup: String,

        /// Actually replace the database
        #[arg(short, long)]
        force: bool,

        /// Restore mode
        #[arg(long, value_enum, default_value_t = RestoreMode::Auto)]
        mode: RestoreMode,

        /// Key to decrypt with (defaults to the stored key)
        #[arg(long, conflicts_with = "prompt_key")]
        key: Option<String>,

        /// Type the key at a hidden prompt
        #[arg(long)]
        prompt_key: bool,

        /// Skip the safety backup of the current database
        #[arg(long)]
        no_safety_backup: bool,
    },
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Encrypted")]
    encrypted: String,
}

impl BackupRow {
    fn new(index: usize, backup: &BackupArtifact) -> Self {
        Self {
            index,
            file: backup.filename.clone(),
            created: backup.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            size: format_size(backup.size_bytes),
            encrypted: if backup.encrypted { "yes" } else { "no" }.to_string(),
        }
    }
}

/// Handle a backup command
pub fn handle_backup_command(session: &mut Session, cmd: BackupCommands) -> VaultResult<()> {
    let backups = BackupService::new(&session.store, session.paths.backup_dir(), session.keys);

    match cmd {
        BackupCommands::Create => {
            println!("Creating backup...");
            let result = backups.create_from_settings(&mut session.settings, &session.paths);
            let artifact = session.record(Operation::Backup, result, describe_backup)?;

            println!("Backup created: {}", artifact.filename);
            println!("Location: {}", artifact.path.display());
            if artifact.encrypted {
                println!("Encrypted: yes (keep your backup key safe, it is required to restore)");
            }
        }

        BackupCommands::List => {
            let list = backups.list()?;

            if list.is_empty() {
                println!("No backups found.");
                println!("Create one with: clinic-vault backup create");
                return Ok(());
            }

            let rows: Vec<BackupRow> = list
                .iter()
                .enumerate()
                .map(|(i, b)| BackupRow::new(i + 1, b))
                .collect();
            let table = Table::new(rows).with(Style::modern()).to_string();
            println!("{}", table);
            println!("Total: {} backup(s)", list.len());
        }

        BackupCommands::Restore {
            backup,
            force,
            mode,
            key,
            prompt_key,
            no_safety_backup,
        } => {
            let path = match backups.resolve(&backup) {
                Ok(path) => path,
                Err(e) => return session.record(Operation::Restore, Err(e), |_: &()| String::new()),
            };
            let encrypted = match mode {
                RestoreMode::Auto => is_encrypted_artifact(&path),
                RestoreMode::Plain => false,
                RestoreMode::Encrypted => true,
            };

            println!("Backup: {}", path.display());
            println!("Mode:   {}", if encrypted { "encrypted" } else { "plain" });
            println!();

            if !force {
                println!("WARNING: This will replace the current clinic database!");
                println!("To proceed, run again with --force flag:");
                println!("  clinic-vault backup restore {} --force", backup);
                return Ok(());
            }

            let key = if encrypted {
                let supplied = supplied_key(key, prompt_key)?;
                match key_for_use(session, supplied) {
                    Ok(key) => key,
                    Err(e) => {
                        return session.record(Operation::Restore, Err(e), |_: &()| String::new())
                    }
                }
            } else {
                None
            };

            if !no_safety_backup {
                println!("Creating backup of current data before restore...");
                let result = backups.create_from_settings(&mut session.settings, &session.paths);
                let safety = session.record(Operation::Backup, result, describe_backup)?;
                println!("Pre-restore backup saved: {}", safety.filename);
                println!();
            }

            println!("Restoring from backup...");
            let result = RestoreService::new(&session.store, session.keys).restore(
                &path,
                encrypted,
                key.as_ref(),
            );
            let report = session.record(Operation::Restore, result, |r| r.summary())?;

            println!("Restore complete!");
            println!("{}", report.summary());
        }
    }

    Ok(())
}

fn describe_backup(artifact: &BackupArtifact) -> String {
    format!(
        "Backup created: {}{}",
        artifact.filename,
        if artifact.encrypted { " (encrypted)" } else { "" }
    )
}
