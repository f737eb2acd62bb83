//! Encryption CLI commands
//!
//! Turns backup encryption on and off and manages the backup key.

use clap::Subcommand;

use super::{prompt_secret, Session};
use crate::audit::Operation;
use crate::config::KeyOrigin;
use crate::error::VaultResult;

/// Backup encryption commands
#[derive(Subcommand)]
pub enum EncryptCommands {
    /// Encrypt future backups (keeps a stored key, otherwise generates one)
    Enable {
        /// Use this key, replacing any stored key
        #[arg(long, conflicts_with = "prompt_key")]
        key: Option<String>,

        /// Type the key at a hidden prompt (blank keeps or generates one)
        #[arg(long)]
        prompt_key: bool,

        /// Replace the stored key with a freshly generated one
        #[arg(long, conflicts_with_all = ["key", "prompt_key"])]
        rotate: bool,
    },

    /// Stop encrypting backups and forget the stored key
    Disable,

    /// Show encryption status
    Status,

    /// Print a fresh key without storing it
    GenerateKey,
}

/// Handle encryption commands
pub fn handle_encrypt_command(session: &mut Session, cmd: EncryptCommands) -> VaultResult<()> {
    match cmd {
        EncryptCommands::Enable {
            key,
            prompt_key,
            rotate,
        } => enable_encryption(session, key, prompt_key, rotate),
        EncryptCommands::Disable => disable_encryption(session),
        EncryptCommands::Status => {
            show_status(session);
            Ok(())
        }
        EncryptCommands::GenerateKey => {
            let key = session.keys.generate()?;
            println!("{}", key.as_str());
            Ok(())
        }
    }
}

/// Enable backup encryption
///
/// The settings file is only rewritten once the key has validated, and not
/// at all when the stored key is kept.
fn enable_encryption(
    session: &mut Session,
    key: Option<String>,
    prompt_key: bool,
    rotate: bool,
) -> VaultResult<()> {
    let candidate = if prompt_key {
        Some(prompt_secret(
            "Encryption key (leave blank to keep the current key or generate one): ",
        )?)
    } else {
        key
    };

    let mut updated = session.settings.clone();
    let result = updated
        .enable_encryption(candidate.as_deref(), rotate, &session.keys)
        .and_then(|enabled| {
            if enabled.origin != KeyOrigin::Kept {
                updated.save(&session.paths)?;
            }
            Ok(enabled)
        });
    let enabled = session.record(Operation::Settings, result, |enabled| {
        let detail = match (enabled.origin, enabled.replaced) {
            (KeyOrigin::Kept, _) => "Backup encryption already enabled, stored key kept",
            (_, true) => "Backup encryption enabled, stored key replaced",
            (_, false) => "Backup encryption enabled",
        };
        detail.to_string()
    })?;
    session.settings = updated;

    if enabled.origin == KeyOrigin::Kept {
        println!("Backup encryption is already enabled. Keeping the stored key.");
        println!("Use --rotate or --key to replace it.");
        return Ok(());
    }

    println!("Backup encryption enabled.");
    if enabled.replaced {
        println!();
        println!("WARNING: The previous backup key was replaced.");
        println!("Backups encrypted with it can only be restored with the old key.");
    }
    if enabled.origin == KeyOrigin::Generated {
        println!();
        println!("Generated backup key:");
        println!("  {}", enabled.key.as_str());
        println!();
        println!("IMPORTANT: Encrypted backups cannot be restored without this key.");
        println!("Keep a copy somewhere other than this machine.");
    }

    Ok(())
}

/// Disable backup encryption
fn disable_encryption(session: &mut Session) -> VaultResult<()> {
    if !session.settings.encrypt_backups {
        println!("Backup encryption is not enabled.");
        return Ok(());
    }

    let mut updated = session.settings.clone();
    updated.disable_encryption();
    let result = updated.save(&session.paths);
    session.record(Operation::Settings, result, |_| {
        "Backup encryption disabled, key cleared".to_string()
    })?;
    session.settings = updated;

    println!("Backup encryption disabled. The stored key has been removed.");
    println!("Existing encrypted backups still need that key to restore.");
    Ok(())
}

/// Show encryption status
fn show_status(session: &Session) {
    println!("Encryption Status");
    println!("=================");
    println!();
    println!(
        "Cipher available: {}",
        if session.keys.capability().is_enabled() {
            "yes (AES-256-GCM)"
        } else {
            "no"
        }
    );

    if session.settings.encrypt_backups {
        println!("Backups:          ENCRYPTED");
        println!(
            "Stored key:       {}",
            if session.settings.encryption_key.is_some() {
                "yes"
            } else {
                "no (one is generated on the next backup)"
            }
        );
    } else {
        println!("Backups:          PLAIN");
        println!();
        println!("Run 'clinic-vault encrypt enable' to encrypt new backups.");
    }
}
