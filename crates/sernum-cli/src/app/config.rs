use anyhow::bail;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sernum::{BatchMetadata, RetryPolicy, Role, YearMonth};
use std::path::PathBuf;

/// Command-line and environment configuration for the `sernum` binary.
///
/// Global options may also come from environment variables (or a `.env`
/// file in the working directory), which is the expected way to supply
/// credentials.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sernum",
    version,
    about = "Allocate, list and export unique serial numbers"
)]
pub struct CliArgs {
    /// Path of the SQLite database. Created on first use.
    ///
    /// Environment variable: `SERNUM_DB`
    #[arg(long, global = true, env = "SERNUM_DB", default_value = "sernum.db")]
    pub db: PathBuf,

    /// Account to act as.
    ///
    /// Environment variable: `SERNUM_USER`
    #[arg(long, global = true, env = "SERNUM_USER")]
    pub user: Option<String>,

    /// Password for `--user`, or for the administrator created by `init`.
    ///
    /// Environment variable: `SERNUM_PASSWORD`
    #[arg(long, global = true, env = "SERNUM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Consecutive collisions tolerated per serial before giving up. `0`
    /// retries forever.
    ///
    /// Environment variable: `MAX_ATTEMPTS`
    #[arg(long, global = true, env = "MAX_ATTEMPTS", default_value_t = 10_000)]
    pub max_attempts: u32,

    /// Largest number of serials one `generate` may request.
    ///
    /// Environment variable: `MAX_BATCH`
    #[arg(long, global = true, env = "MAX_BATCH", default_value_t = sernum::DEFAULT_MAX_BATCH)]
    pub max_batch: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the database and its first administrator.
    Init {
        /// Username of the administrator. The password comes from
        /// `--password` / `SERNUM_PASSWORD`.
        #[arg(long)]
        admin: String,
    },
    /// Allocate serials for a batch and print them, one per line.
    Generate {
        #[command(flatten)]
        metadata: MetadataArgs,
        /// Number of serials. Defaults to `--quantity`.
        #[arg(long)]
        count: Option<usize>,
    },
    /// List visible records, newest first.
    List {
        /// Only records created in this month (YYYY-MM).
        #[arg(long)]
        month: Option<YearMonth>,
    },
    /// Replace the metadata of a record.
    Edit {
        id: i64,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Delete a record (administrators only).
    Delete { id: i64 },
    /// Counts by month, model and operator.
    Summary,
    /// Write visible records to a file or stdout.
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Only records created in this month (YYYY-MM).
        #[arg(long)]
        month: Option<YearMonth>,
        /// Destination file. Stdout when omitted, which `xlsx` and `pdf` do
        /// not allow.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Manage accounts.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Create an account (administrators only).
    Add {
        username: String,
        /// `admin` or `user`.
        #[arg(long, default_value = "user")]
        role: Role,
        /// Password for the new account.
        ///
        /// Environment variable: `SERNUM_NEW_PASSWORD`
        #[arg(long, env = "SERNUM_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// List accounts (administrators only).
    List,
    /// Delete an account (administrators only).
    Delete { username: String },
    /// Change an account's role (administrators only).
    Role { username: String, role: Role },
    /// Change a password. Users may change their own; administrators any.
    Passwd {
        username: String,
        /// Environment variable: `SERNUM_NEW_PASSWORD`
        #[arg(long, env = "SERNUM_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    /// Excel workbook.
    Xlsx,
    /// The printable report.
    Pdf,
    /// The printable report as fixed-width text.
    Text,
}

impl ExportFormat {
    /// Formats that must not be written to a terminal.
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Xlsx | Self::Pdf)
    }
}

/// The descriptive fields shared by `generate` and `edit`.
#[derive(Args, Debug, Clone)]
pub struct MetadataArgs {
    #[arg(long)]
    pub model: String,
    #[arg(long)]
    pub quantity: u32,
    /// Date of manufacturing (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,
    #[arg(long)]
    pub brazer: String,
    #[arg(long)]
    pub operator: String,
    #[arg(long)]
    pub code_a: Option<String>,
    #[arg(long)]
    pub code_b: Option<String>,
    #[arg(long)]
    pub code_c: Option<String>,
    #[arg(long)]
    pub code_d: Option<String>,
}

impl From<MetadataArgs> for BatchMetadata {
    fn from(args: MetadataArgs) -> Self {
        Self {
            model_number: args.model,
            quantity: args.quantity,
            date_of_manufacturing: args.date,
            brazer_name: args.brazer,
            operator_code: args.operator,
            code_a: args.code_a,
            code_b: args.code_b,
            code_c: args.code_c,
            code_d: args.code_d,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub user: Option<String>,
    pub password: Option<String>,
    pub retry: RetryPolicy,
    pub max_batch: usize,
    pub command: Command,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.db.as_os_str().is_empty() {
            bail!("SERNUM_DB must not be empty");
        }

        if args.max_batch == 0 {
            bail!("MAX_BATCH must be greater than 0");
        }

        if let Command::Export {
            format,
            output: None,
            ..
        } = &args.command
        {
            if format.is_binary() {
                bail!("{format:?} export is binary; pass --output");
            }
        }

        if args.password.is_none() {
            if let Command::Init { admin } = &args.command {
                bail!("`init` needs SERNUM_PASSWORD for administrator `{admin}`");
            }
            if args.user.is_some() {
                bail!("SERNUM_USER is set but SERNUM_PASSWORD is not");
            }
        }

        Ok(Self {
            db_path: args.db,
            user: args.user,
            password: args.password,
            retry: RetryPolicy::from_max_collisions(args.max_attempts),
            max_batch: args.max_batch,
            command: args.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<AppConfig> {
        let mut argv = vec!["sernum", "--db", "test.db"];
        argv.extend_from_slice(args);
        AppConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn generate_parses_metadata_and_defaults() {
        let config = parse(&[
            "--user", "ops", "--password", "pw", "--max-attempts", "0", "--max-batch", "50",
            "generate", "--model", "HX-200", "--quantity", "4", "--date", "2025-06-02",
            "--brazer", "R. Osei", "--operator", "OP-7", "--code-b", "B2",
        ])
        .unwrap();

        assert_eq!(config.max_batch, 50);
        assert_eq!(config.retry, RetryPolicy::Unbounded);
        let Command::Generate { metadata, count } = config.command else {
            panic!("expected generate");
        };
        assert_eq!(count, None);
        let metadata = BatchMetadata::from(metadata);
        assert_eq!(metadata.quantity, 4);
        assert_eq!(metadata.code_b.as_deref(), Some("B2"));
        assert_eq!(metadata.code_a, None);
    }

    #[test]
    fn month_and_role_parse_through_library_types() {
        let config = parse(&["--user", "a", "--password", "b", "list", "--month", "2025-06"]).unwrap();
        let Command::List { month } = config.command else {
            panic!("expected list");
        };
        assert_eq!(month, YearMonth::new(2025, 6));

        assert!(parse(&["list", "--month", "June"]).is_err());
        assert!(
            parse(&["user", "role", "ops", "superuser"]).is_err(),
            "unknown role must be rejected"
        );
    }

    #[test]
    fn rejects_inconsistent_settings() {
        assert!(parse(&["--password", "pw", "--max-batch", "0", "summary"]).is_err());
        assert!(parse(&["--password", "pw", "export", "--format", "pdf"]).is_err());
        assert!(parse(&["--password", "pw", "export", "--format", "xlsx", "-o", "s.xlsx"]).is_ok());
        assert!(parse(&["--password", "pw", "export", "--format", "text"]).is_ok());

        let args = CliArgs {
            db: "test.db".into(),
            user: Some("ops".into()),
            password: None,
            max_attempts: 0,
            max_batch: 10,
            command: Command::Summary,
        };
        assert!(AppConfig::try_from(args).is_err());
    }
}
