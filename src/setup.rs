//! Startup checks run before any cluster or fleet mutation.

use crate::error::{Error, Result};
use crate::gateway::runner::CommandRunner;

/// Fails unless both CLIs can be started and answer a version query.
pub async fn preflight(runner: &dyn CommandRunner) -> Result<()> {
    for (program, args) in [("kubectl", vec!["version", "--client"]), ("gcloud", vec!["version"])] {
        let args: Vec<String> = args.into_iter().map(String::from).collect();
        let output = runner
            .run(program, &args, None)
            .await
            .map_err(|e| Error::Config(format!("'{}' is not usable: {}", program, e)))?;
        if !output.success {
            return Err(Error::Config(format!("'{} {}' exited with {}: {}", program, args.join(" "), output.status, output.stderr.trim())));
        }
        log::debug!("{} is available.", program);
    }
    Ok(())
}

/// Settles which cluster context and cloud project to act on.
///
/// Both or neither must be given. When neither is, the active `kubectl` context
/// and `gcloud` project are used.
pub async fn resolve_target(runner: &dyn CommandRunner, context: Option<String>, project: Option<String>) -> Result<(String, String)> {
    let (context, project) = match (context, project) {
        (Some(context), Some(project)) => (context, project),
        (None, None) => {
            let context = active_value(runner, "kubectl", &["config", "current-context"]).await?;
            let project = active_value(runner, "gcloud", &["config", "get-value", "project"]).await?;
            log::info!("Using active context '{}' and project '{}'.", context, project);
            (context, project)
        }
        _ => return Err(Error::Config("--context and --project must be given together".to_string())),
    };

    check_pairing(&context, &project)?;
    Ok((context, project))
}

/// GKE contexts are named `gke_<project>_<location>_<cluster>`; such a context
/// must belong to `project`.
pub fn check_pairing(context: &str, project: &str) -> Result<()> {
    if let Some(rest) = context.strip_prefix("gke_") {
        let context_project = rest.split('_').next().unwrap_or_default();
        if context_project != project {
            return Err(Error::Config(format!("context '{}' belongs to project '{}', not '{}'", context, context_project, project)));
        }
    }
    Ok(())
}

async fn active_value(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> Result<String> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let stdout = runner
        .run(program, &args, None)
        .await
        .and_then(|output| output.into_stdout(program))
        .map_err(|e| Error::Config(format!("could not read the active {} setting: {}", program, e)))?;

    let value = stdout.trim();
    if value.is_empty() || value == "(unset)" {
        return Err(Error::Config(format!("'{} {}' returned no value", program, args.join(" "))));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::runner::{CommandOutput, MockRunner};

    #[tokio::test]
    async fn preflight_requires_both_clis() {
        let runner = MockRunner::with_responses(vec![Ok(CommandOutput::ok("Client Version: v1.30.0")), Err("No such file or directory".into())]);
        assert!(matches!(preflight(&runner).await, Err(Error::Config(_))));
        assert_eq!(runner.executed_commands(), vec![vec!["kubectl", "version", "--client"], vec!["gcloud", "version"]]);
    }

    #[tokio::test]
    async fn context_and_project_come_as_a_pair() {
        let runner = MockRunner::new();
        let err = resolve_target(&runner, Some("prod".into()), None).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(runner.executed_commands().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_the_active_configuration() {
        let runner = MockRunner::with_responses(vec![Ok(CommandOutput::ok("gke_acme_europe-west1_prod\n")), Ok(CommandOutput::ok("acme\n"))]);
        let (context, project) = resolve_target(&runner, None, None).await.unwrap();
        assert_eq!(context, "gke_acme_europe-west1_prod");
        assert_eq!(project, "acme");
    }

    #[test]
    fn gke_context_must_match_project() {
        assert!(check_pairing("gke_acme_europe-west1_prod", "acme").is_ok());
        assert!(check_pairing("gke_other_europe-west1_prod", "acme").is_err());
        assert!(check_pairing("my-cluster", "acme").is_ok());
    }
}
