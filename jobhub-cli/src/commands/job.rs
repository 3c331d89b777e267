//! Job command handlers
//!
//! Handles adding, removing and listing jobs, and printing the output of
//! their last run.

use anyhow::{Context, Result, anyhow};
use colored::*;
use jobhub_core::domain::job::{Job, JobStatus, StatusFilter};
use jobhub_core::dto::job::CreateJob;
use jobhub_store::{RemoveTarget, record};
use std::path::PathBuf;

use crate::config::Config;

/// Builds an add request from command-line values
///
/// The command words are joined with spaces; `gpus` takes a comma separated
/// list or `none`.
pub fn build_request(
    name: Option<String>,
    code: PathBuf,
    data: PathBuf,
    cmd: &[String],
    gpus: Option<&str>,
) -> Result<CreateJob> {
    let mut request = CreateJob::new(code, data, cmd.join(" "));
    request.name = name;

    if let Some(raw) = gpus {
        request.gpus = record::parse_gpus(raw.trim()).map_err(|e| anyhow!("--gpus: {}", e))?;
    }

    Ok(request)
}

/// Add a job to the queue
pub async fn add_job(config: &Config, request: CreateJob) -> Result<Job> {
    let queue = config.open_queue().await?;
    let job = queue.add(request).await.context("Failed to add job")?;

    println!("{}", "Job added:".bold());
    println!("  Name:     {}", job.name.cyan());
    println!("  Code dir: {}", job.code_dir.display());
    println!("  Data dir: {}", job.data_dir.display());
    println!("  Job dir:  {}", job.job_dir.display().to_string().dimmed());
    println!("  Command:  {}", job.cmd);
    println!("  GPUs:     {}", format_gpus(&job));

    Ok(job)
}

/// Remove one job by name, or every job matching a status
pub async fn remove_jobs(
    config: &Config,
    name: Option<String>,
    status: Option<StatusFilter>,
) -> Result<()> {
    let target = match (name, status) {
        (Some(name), _) => RemoveTarget::Name(name),
        (None, Some(filter)) => RemoveTarget::Status(filter),
        (None, None) => {
            return Err(anyhow!(
                "Specify --name <job> or --status <ready|finished|crashed|all>"
            ));
        }
    };

    let queue = config.open_queue().await?;
    let removed = queue
        .remove(target)
        .await
        .context("Failed to remove jobs")?;

    if removed.is_empty() {
        println!("{}", "No jobs removed.".yellow());
    } else {
        println!("{}", format!("Removed {} job(s):", removed.len()).bold());
        for name in removed {
            println!("  {}", name);
        }
    }

    Ok(())
}

/// List jobs matching `status`
pub async fn list_jobs(config: &Config, status: StatusFilter, json: bool) -> Result<()> {
    let queue = config.open_queue().await?;
    let jobs = queue.list(status).await.context("Failed to list jobs")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    match status {
        StatusFilter::All => println!("{}", "Listing all jobs".bold()),
        StatusFilter::Only(status) => {
            println!("{}", format!("Listing {} jobs", status).bold())
        }
    }

    if jobs.is_empty() {
        println!("{}", "No jobs to list.".yellow());
        return Ok(());
    }

    println!("{:<10}  {:<20}  {}", "Status", "Submitted", "Name");
    println!("{}", "─".repeat(60).dimmed());
    for job in &jobs {
        println!("{}", format_row(job));
    }

    Ok(())
}

/// Print the captured output of a job's last run
pub async fn print_output(config: &Config, name: &str) -> Result<()> {
    let queue = config.open_queue().await?;
    let job = queue
        .load(name)
        .await
        .with_context(|| format!("Failed to load job '{}'", name))?;

    println!("{}", "PROCESS OUTPUT".bold());
    println!("{}", "─".repeat(60).dimmed());

    match queue.read_output(&job.name).await {
        Ok(output) => print!("{}", output),
        Err(e) if e.is_not_found() => {
            println!("{}", "No output recorded for this job.".yellow())
        }
        Err(e) => return Err(e).context("Failed to read job output"),
    }

    Ok(())
}

fn format_row(job: &Job) -> String {
    let status = format!("{:<10}", job.status.as_str());
    format!(
        "{}  {:<20}  {}",
        colorize_status(job.status, status),
        job.submitted_at.format("%Y-%m-%d %H:%M:%S"),
        job.name
    )
}

fn format_gpus(job: &Job) -> String {
    match &job.gpus {
        None => "inherit".to_string(),
        Some(gpus) if gpus.is_empty() => "none visible".to_string(),
        Some(gpus) => gpus
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus, text: String) -> ColoredString {
    match status {
        JobStatus::Ready => text.yellow(),
        JobStatus::Finished => text.green(),
        JobStatus::Crashed => text.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn words(cmd: &[&str]) -> Vec<String> {
        cmd.iter().map(|word| word.to_string()).collect()
    }

    struct Fixture {
        _tmp: TempDir,
        code: PathBuf,
        data: PathBuf,
        config: Config,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let code = tmp.path().join("project");
        let data = tmp.path().join("data");
        std::fs::create_dir_all(&code).unwrap();
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(code.join("main.sh"), "echo main\n").unwrap();
        let config = Config {
            queue_dir: tmp.path().join("jobs"),
        };
        Fixture {
            _tmp: tmp,
            code,
            data,
            config,
        }
    }

    #[test]
    fn test_build_request_joins_command_and_parses_gpus() {
        let request = build_request(
            Some("train".to_string()),
            PathBuf::from("src"),
            PathBuf::from("data"),
            &words(&["python", "train.py", "--epochs", "3"]),
            Some("1,0"),
        )
        .unwrap();

        assert_eq!(request.name.as_deref(), Some("train"));
        assert_eq!(request.cmd, "python train.py --epochs 3");
        assert_eq!(request.gpus, Some(vec![1, 0]));
    }

    #[test]
    fn test_build_request_gpu_forms() {
        let none = build_request(None, "a".into(), "b".into(), &words(&["true"]), Some("none"))
            .unwrap();
        assert_eq!(none.gpus, None);

        let absent =
            build_request(None, "a".into(), "b".into(), &words(&["true"]), None).unwrap();
        assert_eq!(absent.gpus, None);

        let bad = build_request(None, "a".into(), "b".into(), &words(&["true"]), Some("0,x"));
        assert!(bad.is_err());
    }

    #[test]
    fn test_format_gpus() {
        let mut job = Job {
            name: "j".to_string(),
            job_dir: PathBuf::from("/q/j"),
            code_dir: PathBuf::from("/c"),
            data_dir: PathBuf::from("/d"),
            cmd: "true".to_string(),
            gpus: None,
            submitted_at: chrono::Utc::now(),
            status: JobStatus::Ready,
        };
        assert_eq!(format_gpus(&job), "inherit");
        job.gpus = Some(vec![]);
        assert_eq!(format_gpus(&job), "none visible");
        job.gpus = Some(vec![2, 3]);
        assert_eq!(format_gpus(&job), "2,3");
        assert!(format_row(&job).ends_with("  j"));
    }

    #[tokio::test]
    async fn test_add_list_remove_round_trip() {
        let fx = fixture();
        let request = build_request(
            Some("demo".to_string()),
            fx.code.clone(),
            fx.data.clone(),
            &words(&["sh", "main.sh"]),
            None,
        )
        .unwrap();

        let job = add_job(&fx.config, request).await.unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert!(job.snapshot_dir().join("main.sh").is_file());

        list_jobs(&fx.config, StatusFilter::All, false).await.unwrap();
        list_jobs(&fx.config, StatusFilter::All, true).await.unwrap();

        remove_jobs(&fx.config, None, Some(StatusFilter::Only(JobStatus::Ready)))
            .await
            .unwrap();
        assert!(!job.job_dir.exists());
    }

    #[tokio::test]
    async fn test_remove_requires_a_target() {
        let fx = fixture();
        assert!(remove_jobs(&fx.config, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_print_output_of_unknown_job_fails() {
        let fx = fixture();
        assert!(print_output(&fx.config, "ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_print_output_before_first_run() {
        let fx = fixture();
        let request = build_request(
            Some("pending".to_string()),
            fx.code.clone(),
            fx.data.clone(),
            &words(&["true"]),
            None,
        )
        .unwrap();
        add_job(&fx.config, request).await.unwrap();

        print_output(&fx.config, "pending").await.unwrap();
    }
}
