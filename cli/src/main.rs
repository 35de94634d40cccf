//! Command-line front end for the secrets platform.
//!
//! Thin dispatch layer: parse a subcommand, resolve the acting token,
//! authenticate, authorize, call into `simple_secrets_core::Platform`. No
//! design-critical logic lives here.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use simple_secrets_core::auth::rbac::{MANAGE_USERS, READ, ROTATE_OWN_TOKEN, ROTATE_TOKENS, WRITE};
use simple_secrets_core::auth::service::UserContext;
use simple_secrets_core::{config, CancellationToken, CoreError, Platform};

#[derive(Parser)]
#[command(name = "simple-secrets", version, about = "Encrypted local secrets manager")]
struct Cli {
    /// Overrides $CONFIG_DIR / ~/.simple-secrets.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Overrides $TOKEN and config.json's ambient token for this invocation.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store or overwrite a secret value.
    Put { key: String, value: String },
    /// Read a secret value.
    Get { key: String },
    /// Remove a secret (its backup, if any, survives).
    Delete { key: String },
    /// List enabled secret keys.
    List,
    /// List disabled secret keys.
    ListDisabled,
    /// Hide a secret from reads and listings without deleting it.
    Disable { key: String },
    /// Reverse `disable`.
    Enable { key: String },
    /// Swap a secret's current value with its backup.
    RestoreSecret { key: String },

    /// Create a user and print their token once.
    CreateUser { username: String, role: String },
    /// Rotate a token. Defaults to the caller's own account.
    RotateToken {
        #[arg(long)]
        username: Option<String>,
    },
    /// Add a named token to an account. Defaults to the caller's own account.
    AddToken {
        name: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// Revoke a named token by id. Defaults to the caller's own account.
    RevokeToken {
        token_id: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// List token metadata (never raw token values) for an account.
    ListTokens {
        #[arg(long)]
        username: Option<String>,
    },
    /// Disable a user account.
    DisableUser { username: String },
    /// Re-enable a user account.
    EnableUser { username: String },
    /// Delete a user account (forbidden for the last admin).
    DeleteUser { username: String },

    /// Re-encrypt every secret under a freshly generated master key.
    RotateMasterKey,
    /// Replace the live state with a snapshot backup.
    RestoreDatabase { backup_name: String },
    /// List snapshot backups (rotation, manual, pre-restore).
    ListBackups,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            exit_code_for(&err)
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::InvalidToken) | Some(CoreError::PermissionDenied { .. }) => {
            ExitCode::from(77)
        }
        Some(CoreError::NotFound(_)) => ExitCode::from(1),
        Some(CoreError::PartialInstallation(_)) => ExitCode::from(78),
        _ => ExitCode::FAILURE,
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(config::resolve_config_dir);

    let (platform, bootstrap) = Platform::open(&config_dir)?;
    if let Some(outcome) = bootstrap {
        eprintln!("bootstrapped new configuration at {}", config_dir.display());
        eprintln!(
            "admin user \"{}\" created, token (shown once): {}",
            outcome.admin_username, outcome.admin_token
        );
    }

    let token = cli
        .token
        .clone()
        .or_else(|| platform.config().token.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no token supplied: pass --token, set TOKEN, or set config.json's \"token\""
            )
        })?;

    let ctx = platform.authenticate(&token)?;

    match cli.command {
        Command::Put { key, value } => {
            platform.authorize(&ctx, WRITE)?;
            platform.put_secret(&key, value.as_bytes())?;
        }
        Command::Get { key } => {
            platform.authorize(&ctx, READ)?;
            let value = platform.get_secret(&key)?;
            output::print_secret(&value);
        }
        Command::Delete { key } => {
            platform.authorize(&ctx, WRITE)?;
            platform.delete_secret(&key)?;
        }
        Command::List => {
            platform.authorize(&ctx, READ)?;
            output::print_keys(&platform.list_secrets()?);
        }
        Command::ListDisabled => {
            platform.authorize(&ctx, READ)?;
            output::print_keys(&platform.list_disabled_secrets()?);
        }
        Command::Disable { key } => {
            platform.authorize(&ctx, WRITE)?;
            platform.disable_secret(&key)?;
        }
        Command::Enable { key } => {
            platform.authorize(&ctx, WRITE)?;
            platform.enable_secret(&key)?;
        }
        Command::RestoreSecret { key } => {
            platform.authorize(&ctx, WRITE)?;
            platform.restore_secret(&key)?;
        }

        Command::CreateUser { username, role } => {
            platform.authorize(&ctx, MANAGE_USERS)?;
            let (user, token) = platform.create_user(&username, &role)?;
            output::print_new_token(&user.username, &token);
        }
        Command::RotateToken { username } => {
            let target = resolve_target(&ctx, username);
            platform.authorize(&ctx, permission_for(&ctx, &target))?;
            let token = platform.rotate_token(&target)?;
            output::print_new_token(&target, &token);
        }
        Command::AddToken { name, username } => {
            let target = resolve_target(&ctx, username);
            platform.authorize(&ctx, permission_for(&ctx, &target))?;
            let (record, token) = platform.add_token(&target, &name)?;
            output::print_new_token(&record.name, &token);
        }
        Command::RevokeToken { token_id, username } => {
            let target = resolve_target(&ctx, username);
            platform.authorize(&ctx, permission_for(&ctx, &target))?;
            platform.revoke_token(&target, &token_id)?;
        }
        Command::ListTokens { username } => {
            let target = resolve_target(&ctx, username);
            platform.authorize(&ctx, permission_for(&ctx, &target))?;
            output::print_tokens(&platform.list_tokens(&target)?);
        }
        Command::DisableUser { username } => {
            platform.authorize(&ctx, MANAGE_USERS)?;
            platform.disable_user(&username)?;
        }
        Command::EnableUser { username } => {
            platform.authorize(&ctx, MANAGE_USERS)?;
            platform.enable_user(&username)?;
        }
        Command::DeleteUser { username } => {
            platform.authorize(&ctx, MANAGE_USERS)?;
            platform.delete_user(&username)?;
        }

        Command::RotateMasterKey => {
            platform.authorize(&ctx, MANAGE_USERS)?;
            platform.rotate_master_key(&CancellationToken::new())?;
        }
        Command::RestoreDatabase { backup_name } => {
            platform.authorize(&ctx, MANAGE_USERS)?;
            platform.restore_database(&backup_name)?;
        }
        Command::ListBackups => {
            platform.authorize(&ctx, MANAGE_USERS)?;
            output::print_backups(&platform.list_backups()?);
        }
    }

    Ok(())
}

/// Token operations default to the caller's own account when `--username`
/// is omitted.
fn resolve_target(ctx: &UserContext, username: Option<String>) -> String {
    username.unwrap_or_else(|| ctx.username.clone())
}

/// Acting on one's own account needs only `rotate-own-token`; acting on
/// someone else's needs the broader `rotate-tokens`.
fn permission_for<'a>(ctx: &UserContext, target: &str) -> &'a str {
    if ctx.username == target {
        ROTATE_OWN_TOKEN
    } else {
        ROTATE_TOKENS
    }
}
