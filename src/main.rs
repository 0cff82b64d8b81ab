#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use toolgate::{catalog, gateway, Config, ToolCommands};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `toolgate` - streams sandboxed tool runs to a UI over server-sent events.
#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(version)]
#[command(about = "Tool-invocation router for a sandboxed executor.", long_about = None)]
struct Cli {
    /// Directory containing toolgate.toml (default: ~/.toolgate)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway (default when no command is given)
    #[command(long_about = "\
Start the HTTP gateway.

Serves GET /stream, /tools, /tools/definitions and /health. Binding to a \
non-loopback address requires [gateway] allow_public_bind = true.

Examples:
  toolgate serve                    # listen on 127.0.0.1:8000
  toolgate serve -p 8080            # listen on port 8080
  toolgate serve -p 0               # random available port")]
    Serve {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Inspect the tool catalog
    Tools {
        #[command(subcommand)]
        tool_command: ToolCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `toolgate`.

Examples:
  source <(toolgate completions bash)
  toolgate completions zsh > ~/.zfunc/_toolgate")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.as_os_str().is_empty() {
            bail!("--config-dir cannot be empty");
        }
    }

    // Completions must remain stdout-only and should not load config or initialize logging.
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load(cli.config_dir.as_deref()).await?;

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        host: None,
    }) {
        Commands::Completions { .. } => unreachable!(),

        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting toolgate on {host} (random port)");
            } else {
                info!("Starting toolgate on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Tools { tool_command } => catalog::handle_command(tool_command, &config),
    }
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["toolgate"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_accepts_host_and_port() {
        let cli = Cli::try_parse_from(["toolgate", "serve", "--host", "::1", "-p", "0"]).unwrap();
        match cli.command {
            Some(Commands::Serve { port, host }) => {
                assert_eq!(port, Some(0));
                assert_eq!(host.as_deref(), Some("::1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn tools_resolve_parses_target_and_scan() {
        let cli = Cli::try_parse_from([
            "toolgate",
            "--config-dir",
            "/etc/toolgate",
            "tools",
            "resolve",
            "nmap",
            "--target",
            "10.0.0.1",
            "--scan",
            "quick",
        ])
        .unwrap();

        assert_eq!(cli.config_dir, Some(PathBuf::from("/etc/toolgate")));
        match cli.command {
            Some(Commands::Tools {
                tool_command: ToolCommands::Resolve { tool, target, scan },
            }) => {
                assert_eq!(tool, "nmap");
                assert_eq!(target, "10.0.0.1");
                assert_eq!(scan.as_deref(), Some("quick"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn completions_are_written_to_the_writer() {
        let mut out = Vec::new();
        write_shell_completion(CompletionShell::Bash, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("toolgate"));
    }
}
