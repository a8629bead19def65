use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use serde_json::{json, Value};

use capsa_blackboard::MergePolicy;
use capsa_ledger::validation;
use capsa_pipeline::{CapsuleRequest, Pipeline, PipelineError, PipelinePaths};
use capsa_types::{format_timestamp, Clock, SystemClock};

use crate::cli::{Cli, MergeMode, OutputFormat};

/// The single JSON object an invocation emits, plus its exit disposition.
pub enum Outcome {
    Success(Value),
    Failure(Value),
}

impl Outcome {
    pub fn body(&self) -> &Value {
        match self {
            Self::Success(v) | Self::Failure(v) => v,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let format = cli.output_format;
    let outcome = execute(cli);

    if let Outcome::Failure(body) = &outcome {
        if let Some(detail) = body.get("error").and_then(Value::as_str) {
            eprintln!("{} {detail}", "error:".red().bold());
        }
    }
    emit(outcome.body(), format);

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Run one invocation end to end. All failures, argument or processing,
/// surface as a `Failure` outcome so the boundary always emits one JSON
/// object and exits 1.
pub fn execute(cli: Cli) -> Outcome {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if cli.validate_only {
        return validate_only(&cli, &clock);
    }

    let Some(capsule_id) = cli.capsule_id.clone() else {
        return failure(&clock, "--capsule-id is required for capsule processing");
    };
    let Some(title) = cli.title.clone() else {
        return failure(&clock, "--title is required for capsule processing");
    };

    let content = match (&cli.content, &cli.content_file) {
        (Some(content), _) => content.clone(),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                return failure(
                    &clock,
                    &format!("cannot read content file '{}': {e}", path.display()),
                )
            }
        },
        (None, None) => return failure(&clock, &PipelineError::MissingContent.to_string()),
    };

    let metadata = match &cli.metadata {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => Some(value),
            Err(_) => return failure(&clock, "invalid JSON in --metadata"),
        },
        None => None,
    };

    let paths = PipelinePaths {
        ledger: cli.ledger.clone(),
        cas_dir: cli.cas_dir.clone(),
        blackboard: cli.blackboard.clone(),
        merkle: cli.merkle.clone(),
        archive_dir: cli.archive_dir.clone(),
    };
    let policy = match cli.blackboard_mode {
        MergeMode::Simplified => MergePolicy::Simplified,
        MergeMode::Tagged => MergePolicy::Tagged,
    };

    let mut pipeline = match Pipeline::open(paths, clock.clone()) {
        Ok(pipeline) => pipeline.with_blackboard_policy(policy),
        Err(e) => return failure(&clock, &e.to_string()),
    };

    let request = CapsuleRequest {
        capsule_id,
        title,
        content,
        metadata,
        extra_files: cli.files.clone(),
    };
    match pipeline.process_capsule(request) {
        Ok(summary) => match serde_json::to_value(&summary) {
            Ok(body) => Outcome::Success(body),
            Err(e) => failure(&clock, &e.to_string()),
        },
        Err(e) => failure(&clock, &e.to_string()),
    }
}

fn validate_only(cli: &Cli, clock: &Arc<dyn Clock>) -> Outcome {
    match validation::validate_file(&cli.ledger) {
        Ok(report) if report.is_valid() => Outcome::Success(json!({
            "validation": "passed",
            "timestamp": format_timestamp(clock.now()),
        })),
        Ok(report) => {
            // is_valid() was false, so the violation is present.
            let violation = report.violation.expect("invalid report has a violation");
            Outcome::Failure(json!({
                "validation": "failed",
                "timestamp": format_timestamp(clock.now()),
                "error": format!("{} at line {}", violation.kind, violation.line),
            }))
        }
        Err(e) => Outcome::Failure(json!({
            "validation": "failed",
            "timestamp": format_timestamp(clock.now()),
            "error": e.to_string(),
        })),
    }
}

fn failure(clock: &Arc<dyn Clock>, detail: &str) -> Outcome {
    Outcome::Failure(json!({
        "timestamp": format_timestamp(clock.now()),
        "status": "error",
        "error": detail,
    }))
}

fn emit(body: &Value, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Json => body.to_string(),
        OutputFormat::Pretty => {
            serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
        }
    };
    println!("{rendered}");
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn scoped(dir: &tempfile::TempDir, mut args: Vec<&str>) -> Cli {
        let ledger = dir.path().join("ledger.jsonl");
        let cas = dir.path().join("cas");
        let blackboard = dir.path().join("blackboard.json");
        let merkle = dir.path().join("merkle.json");
        let archives = dir.path().join("archives");
        let mut full = vec!["capsa"];
        full.append(&mut args);
        let mut cli = parse(&full);
        cli.ledger = ledger;
        cli.cas_dir = cas;
        cli.blackboard = blackboard;
        cli.merkle = merkle;
        cli.archive_dir = archives;
        cli
    }

    #[test]
    fn validate_only_empty_ledger_passes() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(scoped(&dir, vec!["--validate-only"]));
        assert!(outcome.is_success());
        assert_eq!(outcome.body()["validation"], "passed");
    }

    #[test]
    fn validate_only_reports_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let cli = scoped(
            &dir,
            vec!["--capsule-id", "cap1", "--title", "T", "--content", "data"],
        );
        let ledger_path = cli.ledger.clone();
        assert!(execute(cli).is_success());

        // Corrupt a sealed payload byte.
        let contents = std::fs::read_to_string(&ledger_path).unwrap();
        std::fs::write(&ledger_path, contents.replacen("cap1", "capX", 1)).unwrap();

        let mut check = scoped(&dir, vec!["--validate-only"]);
        check.ledger = ledger_path;
        let outcome = execute(check);
        assert!(!outcome.is_success());
        assert_eq!(outcome.body()["validation"], "failed");
        assert!(outcome.body()["error"].as_str().unwrap().contains("line 1"));
    }

    #[test]
    fn process_emits_success_summary() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(scoped(
            &dir,
            vec![
                "--capsule-id",
                "cap1",
                "--title",
                "Title",
                "--content",
                "hello world",
            ],
        ));
        assert!(outcome.is_success());
        let body = outcome.body();
        assert_eq!(body["status"], "success");
        assert_eq!(
            body["content_sha256"],
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(Path::new(body["archive_path"].as_str().unwrap()).exists());
    }

    #[test]
    fn missing_capsule_id_is_an_error_object() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(scoped(&dir, vec!["--title", "T", "--content", "x"]));
        assert!(!outcome.is_success());
        assert_eq!(outcome.body()["status"], "error");
        assert!(outcome.body()["error"]
            .as_str()
            .unwrap()
            .contains("--capsule-id"));
    }

    #[test]
    fn missing_content_fails_before_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let cli = scoped(&dir, vec!["--capsule-id", "cap1", "--title", "T"]);
        let cas = cli.cas_dir.clone();
        let ledger = cli.ledger.clone();
        let outcome = execute(cli);
        assert!(!outcome.is_success());
        assert!(!cas.exists());
        assert!(!ledger.exists());
    }

    #[test]
    fn missing_content_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(scoped(
            &dir,
            vec![
                "--capsule-id",
                "cap1",
                "--title",
                "T",
                "--content-file",
                "/nonexistent/content.txt",
            ],
        ));
        assert!(!outcome.is_success());
        assert!(outcome.body()["error"]
            .as_str()
            .unwrap()
            .contains("content file"));
    }

    #[test]
    fn invalid_metadata_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(scoped(
            &dir,
            vec![
                "--capsule-id",
                "cap1",
                "--title",
                "T",
                "--content",
                "x",
                "--metadata",
                "{not json",
            ],
        ));
        assert!(!outcome.is_success());
        assert!(outcome.body()["error"]
            .as_str()
            .unwrap()
            .contains("--metadata"));
    }

    #[test]
    fn content_file_is_read_when_inline_absent() {
        let dir = tempfile::tempdir().unwrap();
        let content_path = dir.path().join("content.txt");
        std::fs::write(&content_path, "from file").unwrap();
        let content_arg = content_path.display().to_string();
        let outcome = execute(scoped(
            &dir,
            vec![
                "--capsule-id",
                "cap1",
                "--title",
                "T",
                "--content-file",
                &content_arg,
            ],
        ));
        assert!(outcome.is_success());
        assert_eq!(
            outcome.body()["content_sha256"],
            serde_json::to_value(capsa_types::Digest::from_bytes(b"from file")).unwrap()
        );
    }
}
