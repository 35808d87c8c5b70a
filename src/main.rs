use anyhow::Context;
use clap::{Parser, Subcommand};
use nodeup_script::spec::{self, ClusterSpec, InstanceGroup};
use nodeup_script::{BootstrapScript, FileConfigBuilder};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "nodeup-script")]
#[command(about = "Render nodeup bootstrap scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the bootstrap script for one instance group.
    Render {
        /// Cluster spec (YAML, or JSON with a .json extension).
        #[arg(long)]
        cluster: PathBuf,

        /// Instance group document.
        #[arg(long)]
        group: PathBuf,

        /// nodeup config to embed; instance group name and role are added.
        #[arg(long)]
        agent_config: PathBuf,

        #[arg(long)]
        nodeup_url: String,

        /// sha256 of the nodeup binary.
        #[arg(long)]
        nodeup_hash: String,

        /// Write here instead of stdout.
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Render {
            cluster,
            group,
            agent_config,
            nodeup_url,
            nodeup_hash,
            out,
        } => {
            // 1) Load inputs.
            let cluster_spec: ClusterSpec = spec::load_document(&cluster)?;
            let instance_group: InstanceGroup = spec::load_document(&group)?;

            // 2) Assemble; the config document is only read for groups that run nodeup.
            let builder = FileConfigBuilder::new(agent_config);
            let bootstrap = BootstrapScript::new(nodeup_url, nodeup_hash, builder);

            let Some(script) = bootstrap.resource_node_up(&instance_group, &cluster_spec)? else {
                eprintln!(
                    "Instance group {} ({}) does not get a bootstrap script",
                    instance_group.name,
                    instance_group.role()
                );
                return Ok(());
            };

            // 3) Render.
            let text = script.render()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("write {}", path.display()))?;
                    eprintln!("Wrote {}", path.display());
                }
                None => print!("{text}"),
            }
        }
    }

    Ok(())
}
