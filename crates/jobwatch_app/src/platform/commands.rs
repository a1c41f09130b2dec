//! One-shot subcommands that talk to the backend without monitoring.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use jobwatch_engine::{log_file_name, AtomicFileWriter, JobApi, ReqwestJobApi};

pub async fn print_status(api: &dyn JobApi, job_id: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let report = api
        .job_status(job_id)
        .await
        .with_context(|| format!("could not fetch status of {job_id}"))?;
    writeln!(out, "{job_id}: {}", report.status)?;
    if let Some(kind) = &report.kind {
        writeln!(out, "  type:    {kind}")?;
    }
    if let Some(start) = &report.start_time {
        writeln!(out, "  started: {start}")?;
    }
    if let Some(end) = &report.end_time {
        writeln!(out, "  ended:   {end}")?;
    }
    if let Some(error) = report.error.as_ref().or(report.stop_reason.as_ref()) {
        writeln!(out, "  error:   {error}")?;
    }
    Ok(())
}

pub async fn print_logs(api: &dyn JobApi, job_id: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let snapshot = api
        .job_logs(job_id)
        .await
        .with_context(|| format!("could not fetch logs of {job_id}"))?;
    for line in &snapshot.logs {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub async fn stop(
    api: &dyn JobApi,
    job_id: &str,
    reason: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let response = api
        .stop_job(job_id, reason)
        .await
        .with_context(|| format!("could not stop {job_id}"))?;
    writeln!(
        out,
        "{}",
        response
            .message
            .unwrap_or_else(|| format!("stop requested: {}", response.status))
    )?;
    Ok(())
}

pub async fn download_logs(
    api: &dyn JobApi,
    job_id: &str,
    dir: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let bytes = api
        .download_logs(job_id)
        .await
        .with_context(|| format!("could not download logs of {job_id}"))?;
    let path = AtomicFileWriter::new(dir.to_path_buf())
        .write(&log_file_name(job_id), &bytes)
        .with_context(|| format!("could not save logs into {}", dir.display()))?;
    writeln!(out, "{}", path.display())?;
    Ok(())
}

pub async fn clear_logs(api: &dyn JobApi, job_id: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let message = api
        .clear_logs(job_id)
        .await
        .with_context(|| format!("could not clear logs of {job_id}"))?;
    writeln!(out, "{message}")?;
    Ok(())
}

pub async fn list_jobs(api: &dyn JobApi, out: &mut impl Write) -> anyhow::Result<()> {
    let jobs = api.list_jobs().await.context("could not list jobs")?;
    if jobs.is_empty() {
        writeln!(out, "no jobs")?;
    }
    for (job_id, job) in &jobs {
        writeln!(
            out,
            "{job_id}  {:<10} {:<14} {}",
            job.status.to_string(),
            job.kind.as_deref().unwrap_or("-"),
            job.start_time.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

pub async fn print_stats(api: &dyn JobApi, out: &mut impl Write) -> anyhow::Result<()> {
    let stats = api.job_stats().await.context("could not fetch job statistics")?;
    writeln!(
        out,
        "{} jobs: {} running, {} completed, {} error, {} stopped",
        stats.total_scripts,
        stats.running_scripts,
        stats.completed_scripts,
        stats.error_scripts,
        stats.stopped_scripts
    )?;
    for (kind, counts) in &stats.script_types {
        writeln!(
            out,
            "  {kind:<14} {:>3} total, {} running, {} completed, {} error, {} stopped",
            counts.total, counts.running, counts.completed, counts.error, counts.stopped
        )?;
    }
    Ok(())
}

/// One row per active account; the id column is what `--account` expects.
pub async fn list_accounts(api: &dyn JobApi, out: &mut impl Write) -> anyhow::Result<()> {
    let accounts = api
        .active_accounts()
        .await
        .context("could not list active accounts")?;
    if accounts.is_empty() {
        writeln!(out, "no active accounts")?;
    }
    for account in &accounts {
        writeln!(
            out,
            "{}  {:<24} last used {}",
            account.id,
            account.username,
            account.last_used.as_deref().unwrap_or("never")
        )?;
    }
    Ok(())
}

pub async fn print_responses(
    api: &dyn JobApi,
    job_id: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let report = api
        .job_responses(job_id)
        .await
        .with_context(|| format!("could not fetch responses of {job_id}"))?;
    if report.responses.is_empty() {
        writeln!(
            out,
            "{}",
            report.message.as_deref().unwrap_or("no responses")
        )?;
        return Ok(());
    }
    let grouped = report.by_account();
    writeln!(
        out,
        "{} responses from {} accounts",
        report.responses.len(),
        grouped.len()
    )?;
    for (account, responses) in grouped {
        writeln!(out, "{account}:")?;
        for response in responses {
            writeln!(out, "  {}: {}", response.responder, response.message)?;
        }
    }
    Ok(())
}

pub async fn verify_token(
    api: &ReqwestJobApi,
    token: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let info = api
        .verify_token(token)
        .await
        .context("token is not valid")?;
    writeln!(
        out,
        "token valid for {} ({})",
        info.username.as_deref().unwrap_or("unknown user"),
        info.role.as_deref().unwrap_or("no role")
    )?;
    Ok(())
}

pub async fn logout(api: &ReqwestJobApi, out: &mut impl Write) -> anyhow::Result<()> {
    let message = api.logout().await.context("logout failed")?;
    writeln!(out, "{message}")?;
    Ok(())
}

pub async fn validate_media(
    api: &ReqwestJobApi,
    media: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let check = api
        .validate_media(media)
        .await
        .with_context(|| format!("{} was rejected", media.display()))?;
    writeln!(
        out,
        "{}: {} ({})",
        media.display(),
        check.message.as_deref().unwrap_or("valid"),
        check.media_type.as_deref().unwrap_or("unknown type")
    )?;
    Ok(())
}
