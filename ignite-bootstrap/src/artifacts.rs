use std::path::{Path, PathBuf};

use ignite_consul::KvEntry;
use ignite_exec::{CommandLine, Executor, Target};

use crate::error::{BootstrapError, Stage};

/// The program turning a cluster description into per-node artifacts.
pub static DEFAULT_GENERATOR: &str = "cfgen";

/// Loads the generated KV dataset.
pub async fn load_kv_dataset(path: &Path) -> Result<Vec<KvEntry>, BootstrapError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|error| BootstrapError::Artifact {
            path: path.to_path_buf(),
            error,
        })?;

    serde_json::from_slice(&raw).map_err(|error| BootstrapError::Dataset {
        path: path.to_path_buf(),
        error,
    })
}

#[derive(Debug, Clone)]
/// Runs the artifact generator on the local node.
///
/// The generator writes the topology, the KV dataset and the per-service
/// configuration into the output directory.
pub struct Generator {
    program: String,
    output_dir: PathBuf,
    mkfs: bool,
}

impl Generator {
    pub fn new(program: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: output_dir.into(),
            mkfs: false,
        }
    }

    pub fn with_mkfs(mut self, mkfs: bool) -> Self {
        self.mkfs = mkfs;
        self
    }

    pub fn command(&self, cluster_description: &Path) -> CommandLine {
        CommandLine::new(self.program.clone())
            .flag_if(self.mkfs, "--mkfs")
            .arg("-o")
            .path_arg(&self.output_dir)
            .path_arg(cluster_description)
    }

    /// Generates the artifacts for the cluster description.
    ///
    /// The target must be local, the generated files are read from the local
    /// filesystem right after.
    pub async fn generate<E>(
        &self,
        executor: &E,
        local: &Target,
        cluster_description: &Path,
    ) -> Result<(), BootstrapError>
    where
        E: Executor + ?Sized,
    {
        let command = self.command(cluster_description);
        info!(
            cluster_description = ?cluster_description,
            output_dir = ?self.output_dir,
            "Generating configuration artifacts."
        );

        executor
            .execute(local, &command)
            .await
            .map_err(|source| BootstrapError::Command {
                stage: Stage::Generate,
                hostname: local.hostname().to_string(),
                source,
            })
    }
}
