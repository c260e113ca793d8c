use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::kubectl_dto::{NodeListDto, PodListDto};
use crate::domain::id::NodeName;
use crate::domain::node::{LabelKeys, Node};
use crate::domain::retirement_batch::RetirementTag;
use crate::error::GatewayError;
use crate::gateway::cluster::{ClusterGateway, DrainOutcome, NodeSelector};
use crate::gateway::runner::CommandRunner;

const KUBECTL: &str = "kubectl";

// The process is given this much longer than kubectl's own --timeout before it is killed.
const DRAIN_KILL_GRACE: Duration = Duration::from_secs(30);

/// `ClusterGateway` backed by the `kubectl` CLI with JSON output.
#[derive(Debug, Clone)]
pub struct KubectlGateway {
    runner: Arc<dyn CommandRunner>,
    context: String,
    keys: LabelKeys,
}

impl KubectlGateway {
    pub fn new(runner: Arc<dyn CommandRunner>, context: impl Into<String>, keys: LabelKeys) -> Self {
        KubectlGateway { runner, context: context.into(), keys }
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec!["--context".to_string(), self.context.clone()];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }

    async fn kubectl(&self, rest: &[&str]) -> Result<String, GatewayError> {
        self.runner.run(KUBECTL, &self.args(rest), None).await?.into_stdout(KUBECTL)
    }
}

fn drain_timed_out(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("global timeout reached") || stderr.contains("timed out")
}

#[async_trait]
impl ClusterGateway for KubectlGateway {
    async fn list_nodes(&self, selector: &NodeSelector) -> Result<Vec<Node>, GatewayError> {
        let label_selector = selector.to_label_selector(&self.keys);
        let stdout = self.kubectl(&["get", "nodes", "--selector", &label_selector, "--output", "json"]).await?;
        let list: NodeListDto = serde_json::from_str(&stdout)?;

        list.items.into_iter().map(|dto| dto.into_node(&self.keys)).collect()
    }

    async fn label_and_cordon(&self, node: &NodeName, tag: &RetirementTag) -> Result<(), GatewayError> {
        let label = format!("{}={}", self.keys.retiring, tag);
        self.kubectl(&["label", "node", node.as_str(), &label, "--overwrite"]).await?;
        self.kubectl(&["cordon", node.as_str()]).await?;
        Ok(())
    }

    async fn drain(&self, node: &NodeName, timeout: Duration) -> DrainOutcome {
        let timeout_flag = format!("--timeout={}s", timeout.as_secs());
        let args = self.args(&["drain", node.as_str(), "--ignore-daemonsets", "--delete-emptydir-data", "--force", &timeout_flag]);

        match self.runner.run(KUBECTL, &args, Some(timeout + DRAIN_KILL_GRACE)).await {
            Ok(output) if output.success => DrainOutcome::Drained,
            Ok(output) if output.killed_on_timeout || drain_timed_out(&output.stderr) => DrainOutcome::TimedOut,
            Ok(output) => DrainOutcome::Errored(format!("{}: {}", output.status, output.stderr.trim())),
            Err(e) => DrainOutcome::Errored(e.to_string()),
        }
    }

    async fn force_delete_pods(&self, node: &NodeName) -> Result<usize, GatewayError> {
        let field_selector = format!("spec.nodeName={}", node);
        let stdout = self.kubectl(&["get", "pods", "--all-namespaces", "--field-selector", &field_selector, "--output", "json"]).await?;
        let pods: PodListDto = serde_json::from_str(&stdout)?;

        let mut deleted = 0;
        for pod in &pods.items {
            let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
            self.kubectl(&["delete", "pod", &pod.metadata.name, "--namespace", namespace, "--grace-period=0", "--force", "--ignore-not-found", "--wait=false"])
                .await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::Role;
    use crate::gateway::runner::{CommandOutput, MockRunner};

    fn gateway(runner: Arc<MockRunner>) -> KubectlGateway {
        KubectlGateway::new(runner, "prod", LabelKeys::default())
    }

    #[tokio::test]
    async fn list_nodes_queries_by_label_selector() {
        let runner = Arc::new(MockRunner::with_responses(vec![Ok(CommandOutput::ok(
            r#"{"items":[{"metadata":{"name":"m-1","labels":{"role":"master"}},"status":{"conditions":[{"type":"Ready","status":"True"}]}}]}"#,
        ))]));
        let tag = RetirementTag::new("99").unwrap();

        let nodes = gateway(runner.clone()).list_nodes(&NodeSelector::batch(Role::Master, &tag)).await.unwrap();

        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].ready);
        assert_eq!(
            runner.executed_commands()[0],
            ["kubectl", "--context", "prod", "get", "nodes", "--selector", "role=master,retiring=99", "--output", "json"]
        );
    }

    #[tokio::test]
    async fn label_and_cordon_overwrites_then_cordons() {
        let runner = Arc::new(MockRunner::new());
        let tag = RetirementTag::new("1700000000").unwrap();

        gateway(runner.clone()).label_and_cordon(&NodeName::new("w-1"), &tag).await.unwrap();

        let commands = runner.executed_commands();
        assert_eq!(commands[0][3..], ["label", "node", "w-1", "retiring=1700000000", "--overwrite"]);
        assert_eq!(commands[1][3..], ["cordon", "w-1"]);
    }

    #[tokio::test]
    async fn label_failure_stops_before_cordon() {
        let runner = Arc::new(MockRunner::with_responses(vec![Ok(CommandOutput::failed("Unable to connect to the server"))]));
        let err = gateway(runner.clone()).label_and_cordon(&NodeName::new("w-1"), &RetirementTag::new("1").unwrap()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(runner.executed_commands().len(), 1);
    }

    #[tokio::test]
    async fn drain_distinguishes_timeout_from_error() {
        let runner = Arc::new(MockRunner::with_responses(vec![
            Ok(CommandOutput::ok("node/w-1 drained")),
            Ok(CommandOutput::failed("error: unable to drain node \"w-1\" due to error: global timeout reached: 5m0s")),
            Ok(CommandOutput { killed_on_timeout: true, ..CommandOutput::failed("") }),
            Ok(CommandOutput::failed("error: cannot delete Pods with local storage")),
        ]));
        let gw = gateway(runner.clone());
        let node = NodeName::new("w-1");
        let timeout = Duration::from_secs(300);

        assert_eq!(gw.drain(&node, timeout).await, DrainOutcome::Drained);
        assert_eq!(gw.drain(&node, timeout).await, DrainOutcome::TimedOut);
        assert_eq!(gw.drain(&node, timeout).await, DrainOutcome::TimedOut);
        assert!(matches!(gw.drain(&node, timeout).await, DrainOutcome::Errored(_)));

        let commands = runner.executed_commands();
        let first = &commands[0];
        assert!(first.contains(&"--ignore-daemonsets".to_string()));
        assert!(first.contains(&"--delete-emptydir-data".to_string()));
        assert!(first.contains(&"--timeout=300s".to_string()));
    }

    #[tokio::test]
    async fn force_delete_removes_every_pod_on_the_node() {
        let runner = Arc::new(MockRunner::with_responses(vec![Ok(CommandOutput::ok(
            r#"{"items":[{"metadata":{"name":"web-1","namespace":"shop"}},{"metadata":{"name":"dns-1","namespace":"kube-system"}}]}"#,
        ))]));

        let deleted = gateway(runner.clone()).force_delete_pods(&NodeName::new("w-1")).await.unwrap();

        assert_eq!(deleted, 2);
        let commands = runner.executed_commands();
        assert_eq!(commands[0][3..], ["get", "pods", "--all-namespaces", "--field-selector", "spec.nodeName=w-1", "--output", "json"]);
        assert_eq!(commands[1][3..7], ["delete", "pod", "web-1", "--namespace"]);
        assert_eq!(commands[2][5..8], ["dns-1", "--namespace", "kube-system"]);
    }

    #[tokio::test]
    async fn force_delete_on_an_empty_node_is_a_no_op() {
        let runner = Arc::new(MockRunner::with_responses(vec![Ok(CommandOutput::ok(r#"{"items":[]}"#))]));
        assert_eq!(gateway(runner.clone()).force_delete_pods(&NodeName::new("w-1")).await.unwrap(), 0);
        assert_eq!(runner.executed_commands().len(), 1);
    }
}
