use crate::app::config::{AppConfig, Command, ExportFormat, MetadataArgs, UserCommand};
use anyhow::{Context, bail};
use chrono::{SecondsFormat, Utc};
use sernum::{
    Allocator, BatchMetadata, CsvExporter, Exporter, JsonExporter, PdfReportExporter, RecordId,
    SerialRecord, SerialService, SerialStore, ServiceError, TextReportExporter, User, UserStore,
    XlsxExporter, YearMonth, authenticate, create_user, delete_user, ensure_admin, list_users, update_user,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::{info, warn};

/// Runs the configured command against `store`, writing its output to `out`.
///
/// Every command except `init` first authenticates the configured user.
pub fn run<S>(store: &S, config: &AppConfig, out: &mut dyn Write) -> anyhow::Result<()>
where
    S: SerialStore + UserStore,
{
    if let Command::Init { admin } = &config.command {
        let password = config
            .password
            .as_deref()
            .context("`init` needs SERNUM_PASSWORD")?;
        return init(store, admin, password, out);
    }

    let actor = login(store, config)?;
    let service = SerialService::new(Allocator::new(store).with_retry(config.retry))
        .with_max_batch(config.max_batch);

    match &config.command {
        Command::Init { .. } => Ok(()),
        Command::Generate { metadata, count } => generate(&service, &actor, metadata, *count, out),
        Command::List { month } => {
            let records = visible(&service, &actor, *month)?;
            print_records(&records, out)
        }
        Command::Edit { id, metadata } => {
            let record = service.edit(&actor, RecordId(*id), metadata.clone().into())?;
            writeln!(out, "updated record {} ({})", record.id, record.serial_number)?;
            Ok(())
        }
        Command::Delete { id } => {
            service.delete(&actor, RecordId(*id))?;
            writeln!(out, "deleted record {id}")?;
            Ok(())
        }
        Command::Summary => {
            let summary = service.summary(&actor, Utc::now())?;
            write!(out, "{summary}")?;
            Ok(())
        }
        Command::Export {
            format,
            month,
            output,
        } => {
            let records = visible(&service, &actor, *month)?;
            let exporter = exporter(*format);
            match output {
                Some(path) => export_to_file(exporter.as_ref(), &records, path),
                None => Ok(exporter.export(&records, out)?),
            }
        }
        Command::User { command } => user(store, &actor, command, out),
    }
}

fn init<S: UserStore>(
    store: &S,
    admin: &str,
    password: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match ensure_admin(store, admin, password)? {
        Some(user) => {
            info!(username = %user.username, "created first administrator");
            writeln!(out, "created administrator `{}`", user.username)?;
        }
        None => {
            warn!("accounts already exist; nothing to do");
            writeln!(out, "already initialized")?;
        }
    }
    Ok(())
}

fn login<S: UserStore>(store: &S, config: &AppConfig) -> anyhow::Result<User> {
    let (Some(username), Some(password)) = (&config.user, &config.password) else {
        bail!("set SERNUM_USER and SERNUM_PASSWORD to sign in");
    };
    authenticate(store, username, password).context("sign-in failed")
}

fn visible<S: SerialStore>(
    service: &SerialService<&S>,
    actor: &User,
    month: Option<YearMonth>,
) -> Result<Vec<SerialRecord>, ServiceError> {
    match month {
        Some(month) => service.list_month(actor, month),
        None => service.list(actor),
    }
}

fn generate<S: SerialStore>(
    service: &SerialService<&S>,
    actor: &User,
    metadata: &MetadataArgs,
    count: Option<usize>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let metadata = BatchMetadata::from(metadata.clone());
    let count = match count {
        Some(count) => count,
        None => usize::try_from(metadata.quantity)?,
    };

    match service.generate(actor, metadata, count) {
        Ok(records) => {
            for record in &records {
                writeln!(out, "{}", record.serial_number)?;
            }
            info!(count = records.len(), "serials allocated");
            Ok(())
        }
        Err(ServiceError::Alloc(err)) if err.is_partial() => {
            // The committed serials exist in the store; print them so they
            // are not lost.
            for serial in err.committed() {
                writeln!(out, "{serial}")?;
            }
            Err(anyhow::Error::new(err).context("batch was only partially allocated"))
        }
        Err(err) => Err(err.into()),
    }
}

fn print_records(records: &[SerialRecord], out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(
        out,
        "{:>6}  {:<10}  {:<14}  {:>5}  {:<10}  {:<18}  {:<10}  CREATED",
        "ID", "SERIAL", "MODEL", "QTY", "DATE", "BRAZER", "OPERATOR"
    )?;
    for r in records {
        let m = &r.metadata;
        writeln!(
            out,
            "{:>6}  {:<10}  {:<14}  {:>5}  {:<10}  {:<18}  {:<10}  {}",
            r.id,
            r.serial_number,
            m.model_number,
            m.quantity,
            m.date_of_manufacturing.to_string(),
            m.brazer_name,
            m.operator_code,
            r.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
    }
    Ok(())
}

fn exporter(format: ExportFormat) -> Box<dyn Exporter> {
    match format {
        ExportFormat::Csv => Box::new(CsvExporter),
        ExportFormat::Json => Box::new(JsonExporter),
        ExportFormat::Xlsx => Box::new(XlsxExporter),
        ExportFormat::Pdf => Box::new(PdfReportExporter::new(Utc::now())),
        ExportFormat::Text => Box::new(TextReportExporter::new(Utc::now())),
    }
}

fn export_to_file(
    exporter: &dyn Exporter,
    records: &[SerialRecord],
    path: &Path,
) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    exporter.export(records, &mut writer)?;
    writer.flush()?;
    info!(records = records.len(), path = %path.display(), "export written");
    Ok(())
}

fn user<S: UserStore>(
    store: &S,
    actor: &User,
    command: &UserCommand,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let is_self = matches!(command, UserCommand::Passwd { username, .. } if *username == actor.username);
    if !actor.is_admin() && !is_self {
        bail!("user `{}` is not an administrator", actor.username);
    }

    match command {
        UserCommand::Add {
            username,
            role,
            new_password,
        } => {
            let user = create_user(store, username, new_password, *role)?;
            writeln!(out, "created {} `{}` (id {})", user.role, user.username, user.id)?;
        }
        UserCommand::List => {
            writeln!(out, "{:>6}  {:<20}  {:<6}  CREATED", "ID", "USERNAME", "ROLE")?;
            for u in list_users(store)? {
                writeln!(
                    out,
                    "{:>6}  {:<20}  {:<6}  {}",
                    u.id,
                    u.username,
                    u.role,
                    u.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
                )?;
            }
        }
        UserCommand::Delete { username } => {
            let target = find_user(store, username)?;
            delete_user(store, target.id)?;
            writeln!(out, "deleted user `{username}`")?;
        }
        UserCommand::Role { username, role } => {
            let target = find_user(store, username)?;
            update_user(store, target.id, &target.username, None, *role)?;
            writeln!(out, "`{username}` is now {role}")?;
        }
        UserCommand::Passwd {
            username,
            new_password,
        } => {
            let target = find_user(store, username)?;
            update_user(
                store,
                target.id,
                &target.username,
                Some(new_password),
                target.role,
            )?;
            writeln!(out, "password changed for `{username}`")?;
        }
    }
    Ok(())
}

fn find_user<S: UserStore>(store: &S, username: &str) -> anyhow::Result<User> {
    store
        .find_user(username)?
        .map(|(user, _)| user)
        .with_context(|| format!("no user named `{username}`"))
}
