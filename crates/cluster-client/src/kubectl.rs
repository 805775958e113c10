//! Manifest applier
//!
//! Runs `kubectl apply|delete -f -` with the manifest on standard input.
//! Apply is retried under the poller while the failure looks transient (API
//! server not reachable yet, CRDs not registered yet, `default` namespace not
//! created yet). Any other failure is returned at once.

use std::path::PathBuf;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ClusterClientError;
use crate::kubeconfig::ContextOverrides;
use crate::poll::{PollBudget, poll_immediate};

/// kubectl verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestVerb {
    Apply,
    Delete,
}

impl ManifestVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestVerb::Apply => "apply",
            ManifestVerb::Delete => "delete",
        }
    }
}

/// Result of one kubectl invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the command exited successfully
    pub success: bool,
    /// Standard output followed by standard error
    pub output: String,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Self {
            success: output.status.success(),
            output: combined,
        }
    }
}

/// Trait for executing kubectl (allows scripting outputs in tests)
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run kubectl with `args`, writing `stdin` to its standard input
    async fn run(&self, args: &[String], stdin: &str) -> std::io::Result<CommandOutput>;
}

/// Runs the real `kubectl` binary
#[derive(Debug, Clone)]
pub struct KubectlRunner {
    binary: PathBuf,
}

impl Default for KubectlRunner {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kubectl"),
        }
    }
}

impl KubectlRunner {
    /// Use a kubectl binary other than the one on `PATH`
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for KubectlRunner {
    async fn run(&self, args: &[String], stdin: &str) -> std::io::Result<CommandOutput> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let writer = child.stdin.take().map(|mut pipe| {
            let manifest = stdin.to_owned();
            tokio::spawn(async move { pipe.write_all(manifest.as_bytes()).await })
        });

        let output = child.wait_with_output().await?;

        // kubectl may exit before reading everything; its output says why.
        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("kubectl closed stdin early: {}", e),
                Err(e) => debug!("kubectl stdin writer failed: {}", e),
            }
        }
        Ok(CommandOutput::from(output))
    }
}

/// Why an apply failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyFailure {
    /// Connection refused, EOF or DNS failure
    ServerUnavailable,
    /// "unable to recognize": the kind's CRD is not registered yet
    KindNotRegistered,
    /// The `default` namespace does not exist yet
    DefaultNamespaceMissing,
    /// Anything else
    Fatal,
}

impl ApplyFailure {
    /// Whether a later attempt may succeed
    pub fn is_transient(self) -> bool {
        self != ApplyFailure::Fatal
    }
}

/// Classify kubectl apply output
pub fn classify_apply_failure(output: &str) -> ApplyFailure {
    if output.contains("EOF") || output.contains("refused") || output.contains("no such host") {
        ApplyFailure::ServerUnavailable
    } else if output.contains("unable to recognize") {
        ApplyFailure::KindNotRegistered
    } else if output.contains("namespaces \"default\" not found") {
        ApplyFailure::DefaultNamespaceMissing
    } else {
        ApplyFailure::Fatal
    }
}

/// kubectl arguments for `verb`; each override flag only when set
pub fn build_kubectl_args(
    verb: ManifestVerb,
    kubeconfig: Option<&std::path::Path>,
    overrides: &ContextOverrides,
) -> Vec<String> {
    let mut args = vec![verb.as_str().to_string()];
    if let Some(path) = kubeconfig {
        args.push("--kubeconfig".to_string());
        args.push(path.display().to_string());
    }
    let flags = [
        ("--cluster", &overrides.cluster),
        ("--namespace", &overrides.namespace),
        ("--user", &overrides.user),
    ];
    for (flag, value) in flags {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            args.push(flag.to_string());
            args.push(value.to_string());
        }
    }
    args.push("-f".to_string());
    args.push("-".to_string());
    args
}

/// Applies and deletes manifests through kubectl
#[derive(Debug, Clone)]
pub struct ManifestApplier<R: CommandRunner = KubectlRunner> {
    runner: R,
    kubeconfig: Option<PathBuf>,
    overrides: ContextOverrides,
    budget: PollBudget,
}

impl<R: CommandRunner> ManifestApplier<R> {
    pub fn new(
        runner: R,
        kubeconfig: Option<PathBuf>,
        overrides: ContextOverrides,
        budget: PollBudget,
    ) -> Self {
        Self {
            runner,
            kubeconfig,
            overrides,
            budget,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    async fn run(&self, verb: ManifestVerb, manifest: &str) -> Result<CommandOutput, ClusterClientError> {
        let args = build_kubectl_args(verb, self.kubeconfig.as_deref(), &self.overrides);
        self.runner
            .run(&args, manifest)
            .await
            .map_err(ClusterClientError::Command)
    }

    /// Apply `manifest`, retrying transient failures within the apply budget
    pub async fn apply(&self, manifest: &str) -> Result<(), ClusterClientError> {
        info!("Applying manifest with kubectl");
        poll_immediate(self.budget, "kubectl apply to succeed", || async move {
            let result = self.run(ManifestVerb::Apply, manifest).await?;
            if result.success {
                return Ok(true);
            }
            let failure = classify_apply_failure(&result.output);
            if failure.is_transient() {
                debug!("kubectl apply not possible yet ({:?}), retrying", failure);
                return Ok(false);
            }
            warn!("kubectl apply failed: {}", result.output.trim());
            Err(ClusterClientError::Manifest {
                verb: ManifestVerb::Apply.as_str().to_string(),
                output: result.output,
            })
        })
        .await
    }

    /// Delete the objects in `manifest`; a single attempt
    pub async fn delete(&self, manifest: &str) -> Result<(), ClusterClientError> {
        info!("Deleting manifest with kubectl");
        let result = self.run(ManifestVerb::Delete, manifest).await?;
        if result.success {
            return Ok(());
        }
        Err(ClusterClientError::Manifest {
            verb: ManifestVerb::Delete.as_str().to_string(),
            output: result.output,
        })
    }
}
