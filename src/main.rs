//! sos-sysml CLI - inspect and exercise the SoS <-> SysML value bridge

use clap::{Parser, Subcommand};
use serde_json::json;
use sos_sysml::adapter::{LanguageModule, default_registry};
use sos_sysml::config::{BridgeConfig, default_config_path, load_config, write_config};
use sos_sysml::encode::rule_name;
use sos_sysml::output::OutputFormat;
use sos_sysml::{HostValue, LoopbackKernel, SysmlBridge, canonicalize, decode, encode, guest, ui};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "sos-sysml")]
#[command(version = "0.1.0")]
#[command(about = "SoS language module for SysML - move variables between SoS and a SysML kernel")]
#[command(long_about = r#"
Converts values between the SoS (Python) kernel and a SysML kernel:
  • encode: host literal -> SysML source, as %get sends it
  • check:  SysML source -> host literal, as %put receives it
  • roundtrip: both directions through an in-process SysML session

Example usage:
  sos-sysml encode "{'a': [1, 2.5, None]}"
  sos-sysml decode "numpy.matrix([[1,2],[3,4]])"
  sos-sysml roundtrip "x=range(5)" "y=complex(1,2)"
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file (defaults to ./sos-sysml.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a host literal as SysML source
    Encode {
        /// Python literal, e.g. "[1, 'a', None]"
        literal: String,
    },

    /// Decode host literal text, as printed by the guest probe
    Decode {
        /// Python literal text
        text: String,
    },

    /// Evaluate SysML literal source and print what the probe would send back
    Check {
        /// SysML literal source, e.g. "Set[1,2]"
        source: String,
    },

    /// Print the guest prelude
    Prelude,

    /// Show language module and configuration details
    Info,

    /// Send variables to an in-process SysML session and read them back
    Roundtrip {
        /// Assignments of the form NAME=LITERAL
        #[arg(required = true)]
        assignments: Vec<String>,

        /// Assign every value to this guest name
        #[arg(long = "as")]
        as_var: Option<String>,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let format = OutputFormat::from_flag(cli.json);
    let config = load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Encode { literal } => {
            let value = decode(&literal)?;
            let source = encode(&value);
            if format.is_json() {
                let report = json!({
                    "input": value.to_string(),
                    "type": value.type_name(),
                    "rule": rule_name(&value),
                    "sysml": source,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", source);
            }
        }

        Commands::Decode { text } => {
            let value = decode(&text)?;
            if format.is_json() {
                let report = json!({
                    "type": value.type_name(),
                    "shape": value.shape(),
                    "value": value.to_json(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                ui::info("type", value.type_name());
                println!("{}", value);
            }
        }

        Commands::Check { source } => {
            let value = guest::read(&source)?;
            let canonical = canonicalize(&value);
            let host = decode(&canonical)?;
            if format.is_json() {
                let report = json!({
                    "class": value.class_name(),
                    "size": value.size(),
                    "canonical": canonical,
                    "host": host.to_json(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                ui::info("class", value.class_name());
                println!("{}", canonical);
            }
        }

        Commands::Prelude => {
            let registry = default_registry();
            let module = registry
                .find_for_kernel(&config.kernel_name)
                .ok_or_else(|| anyhow::anyhow!("no language module for kernel {}", config.kernel_name))?;
            print!("{}", module.init_statements());
        }

        Commands::Info => {
            let registry = default_registry();
            let modules: Vec<_> = registry.modules().iter().map(|m| m.as_ref()).collect();
            if format.is_json() {
                let report = json!({
                    "modules": modules
                        .iter()
                        .map(|m| json!({
                            "language": m.language_name(),
                            "kernels": m.kernel_names(),
                            "background_color": m.background_color(),
                        }))
                        .collect::<Vec<_>>(),
                    "config": config,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for module in modules {
                    ui::section(module.language_name());
                    ui::info("kernels", &module.kernel_names().join(", "));
                    ui::info("background", module.background_color());
                    ui::info("cd", &module.cd_command("<dir>"));
                }
                ui::section("config");
                ui::info("kernel", &config.kernel_name);
                ui::info("auxiliary prefix", &config.auxiliary_prefix);
                ui::info("auxiliary discovery", &config.discover_auxiliary.to_string());
                ui::info("echo probe output", &config.echo_probe_output.to_string());
            }
        }

        Commands::Roundtrip { assignments, as_var } => {
            run_roundtrip(config, format, &assignments, as_var.as_deref()).await?;
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(default_config_path);
            write_config(&path, &BridgeConfig::default(), force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}

async fn run_roundtrip(
    config: BridgeConfig,
    format: OutputFormat,
    assignments: &[String],
    as_var: Option<&str>,
) -> anyhow::Result<()> {
    let mut names = Vec::with_capacity(assignments.len());
    let mut ns: HashMap<String, HostValue> = HashMap::new();
    for assignment in assignments {
        let (name, literal) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected NAME=LITERAL, got {:?}", assignment))?;
        let name = name.trim();
        ns.insert(name.to_string(), decode(literal)?);
        names.push(name.to_string());
    }
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let bridge = SysmlBridge::with_config(LoopbackKernel::new(), config);
    bridge.initialize().await?;
    bridge.get_vars(&ns, &names, as_var).await?;

    if !format.is_json() {
        ui::header("Pull");
        for &name in &names {
            if let Some(value) = ns.get(name) {
                ui::transfer(as_var.unwrap_or(name), &encode(value), true);
            }
        }
    }

    let pushed: Vec<&str> = match as_var {
        Some(target) => vec![target],
        None => names.clone(),
    };
    let Some(transfer) = bridge.put_vars(&pushed, None) else {
        for warning in bridge.kernel().warnings() {
            ui::error(&warning);
        }
        anyhow::bail!("push failed, no variables were returned");
    };

    let mismatched: Vec<&str> = transfer
        .iter()
        .filter(|(name, value)| ns.get(*name).is_some_and(|sent| sent != *value))
        .map(|(name, _)| name)
        .collect();

    if format.is_json() {
        let values: serde_json::Map<String, serde_json::Value> = transfer
            .iter()
            .map(|(name, value)| (name.to_string(), json!({ "repr": value.to_string(), "value": value.to_json() })))
            .collect();
        let report = json!({ "values": values, "changed": mismatched });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ui::header("Push");
        for (name, value) in transfer.iter() {
            ui::transfer(name, &value.to_string(), false);
        }
        for name in &mismatched {
            ui::warn(&format!("{} changed type or value in transit", name));
        }
        if mismatched.is_empty() {
            ui::success(&format!("{} variable(s) survived the round trip", transfer.len()));
        } else {
            println!("{}", ui::dim("tuples, ranges with steps, series and fixed-width scalars arrive as their guest equivalents"));
        }
    }
    Ok(())
}
