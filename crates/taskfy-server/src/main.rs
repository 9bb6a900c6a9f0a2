use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use taskfy_server::config::ServerConfig;
use taskfy_service::IncomingFile;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "taskfy-server")]
struct Cli {
    #[command(flatten)]
    server: ServerConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload local files to a project, each under a fresh unique name
    Upload {
        /// Project the files belong to
        #[arg(long)]
        project: String,
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List a project's files with signed URLs
    ListFiles {
        #[arg(long)]
        project: String,
    },
    /// Print a signed URL for each object key
    SignUrls {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Upload { project, paths }) => {
            let files = taskfy_server::open_files(&cli.server)?;
            for path in paths {
                let data = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let uploaded = files
                    .upload_one(Some(&project), Some(IncomingFile::new(name, data)))
                    .await
                    .with_context(|| format!("upload {}", path.display()))?;
                println!("{}\t{}", uploaded.blob_name, uploaded.url);
            }
        }
        Some(Commands::ListFiles { project }) => {
            let files = taskfy_server::open_files(&cli.server)?;
            let listed = files.list(Some(&project)).await?;
            if listed.files.is_empty() {
                eprintln!("No files found for project {project}.");
            } else {
                println!("{:<40} {:>10} {:<26} URL", "NAME", "SIZE", "LAST MODIFIED");
                for file in listed.files {
                    println!(
                        "{:<40} {:>10} {:<26} {}",
                        file.name,
                        file.size,
                        file.last_modified
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "-".into()),
                        file.url,
                    );
                }
            }
        }
        Some(Commands::SignUrls { keys }) => {
            let files = taskfy_server::open_files(&cli.server)?;
            for (key, url) in files.signed_urls(&keys).await? {
                println!("{key}\t{}", url.as_deref().unwrap_or("not found"));
            }
        }
        None => {
            let addr = SocketAddr::new(cli.server.bind.parse()?, cli.server.port);
            let state = taskfy_server::connect(&cli.server).await?;

            let listener = TcpListener::bind(addr).await?;
            info!("taskfy-server listening on http://{addr}");
            info!("signed file URLs point at {}", cli.server.public_url());

            taskfy_server::serve(listener, state).await?;
        }
    }

    Ok(())
}
