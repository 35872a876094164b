mod identity;

#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ignite::bootstrap::{
    Bootstrap,
    BootstrapConfig,
    Generator,
    DEFAULT_CONF_DIR,
    DEFAULT_GENERATOR,
    DEFAULT_LIBEXEC_DIR,
};
use ignite::consul::{ConsulHttpClient, DEFAULT_HTTP_ADDR};
use ignite::exec::{ShellExecutor, Target};
use ignite::topology::{NodeDescriptor, NodeSet, Role};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args: Args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ignite: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let local = identity::detect(args.node_name.as_deref()).await;
    info!(identity = %local, "Detected local node.");

    let config = args.bootstrap_config();
    let executor = ShellExecutor::default();

    if let Some(cluster_description) = args.cluster_description.as_ref() {
        if args.conf_dir.is_none() {
            // The topology does not exist before the generator ran.
            let target = Target::Local(NodeDescriptor::new("localhost", "127.0.0.1", Role::Server));
            Generator::new(args.generator.clone(), config.conf_dir.clone())
                .with_mkfs(args.mkfs)
                .generate(&executor, &target, cluster_description)
                .await?;
        }
    }

    let nodes = NodeSet::load(config.topology_path(), &local)
        .with_context(|| format!("Failed to resolve the topology in {:?}", config.conf_dir))?;

    let mut consul = ConsulHttpClient::new(args.consul_addr.clone());
    if let Some(token) = args.consul_token.clone() {
        consul = consul.with_token(token);
    }

    Bootstrap::new(config, nodes, executor, consul).run().await?;
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Bootstraps a Consul backed service cluster from zero.
pub struct Args {
    #[arg(long)]
    /// Let the services (re)create their storage. This destroys existing data.
    mkfs: bool,

    #[arg(short = 'c', long)]
    /// Use already generated artifacts from this directory.
    ///
    /// When omitted the artifacts are generated from the cluster description
    /// into the default configuration directory.
    conf_dir: Option<PathBuf>,

    #[arg(required_unless_present = "conf_dir")]
    /// The cluster description file the artifacts are generated from.
    cluster_description: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_HTTP_ADDR)]
    /// The HTTP address of the local Consul agent.
    consul_addr: String,

    #[arg(long, env = "CONSUL_HTTP_TOKEN")]
    /// The ACL token sent to the Consul agent.
    consul_token: Option<String>,

    #[arg(long, default_value = DEFAULT_LIBEXEC_DIR)]
    /// The directory holding the helper programs on every node.
    libexec_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_GENERATOR)]
    /// The program generating the artifacts from the cluster description.
    generator: String,

    #[arg(long)]
    /// The name of this node in the topology, detected when omitted.
    node_name: Option<String>,

    #[arg(long)]
    /// Give up waiting for a leader after this many seconds, waits forever when omitted.
    leader_wait_ceiling_secs: Option<u64>,

    #[arg(long)]
    /// Keep waiting for health until every service has a registered instance.
    require_registered_instances: bool,
}

impl Args {
    fn bootstrap_config(&self) -> BootstrapConfig {
        let conf_dir = self
            .conf_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONF_DIR));

        BootstrapConfig::new(conf_dir)
            .with_mkfs(self.mkfs)
            .with_libexec_dir(self.libexec_dir.clone())
            .with_leader_wait_ceiling(self.leader_wait_ceiling_secs.map(Duration::from_secs))
            .with_required_instances(self.require_registered_instances)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_conf_dir_skips_the_description() {
        let args = Args::try_parse_from(["ignite", "--mkfs", "-c", "/etc/cluster"])
            .expect("Parse args.");
        assert!(args.mkfs);
        assert!(args.cluster_description.is_none());

        let config = args.bootstrap_config();
        assert_eq!(config.conf_dir, PathBuf::from("/etc/cluster"));
        assert!(config.mkfs);
        assert_eq!(config.leader_wait.ceiling(), None);
        assert!(!config.require_registered_instances);
    }

    #[test]
    fn test_required_instances_flag() {
        let args = Args::try_parse_from([
            "ignite",
            "-c",
            "/etc/cluster",
            "--require-registered-instances",
        ])
        .expect("Parse args.");
        assert!(args.bootstrap_config().require_registered_instances);
    }

    #[test]
    fn test_description_required_without_conf_dir() {
        assert!(Args::try_parse_from(["ignite"]).is_err());

        let args = Args::try_parse_from([
            "ignite",
            "cluster.yaml",
            "--leader-wait-ceiling-secs",
            "600",
        ])
        .expect("Parse args.");
        assert_eq!(args.cluster_description, Some(PathBuf::from("cluster.yaml")));

        let config = args.bootstrap_config();
        assert_eq!(config.conf_dir, PathBuf::from(DEFAULT_CONF_DIR));
        assert!(!config.mkfs);
        assert_eq!(config.leader_wait.ceiling(), Some(Duration::from_secs(600)));
    }
}
