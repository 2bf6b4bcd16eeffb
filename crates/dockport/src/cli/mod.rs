//! CLI command definitions and handlers.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr, eyre};
use dockport_common::Properties;
use dockport_network::{BindingReport, HostIp, HostPort, PortMapping, PortSpec, substitute};
use serde_json::Value;
use tabled::{Table, Tabled};

use crate::config::PortConfig;

/// Dockport - resolve container port mappings
#[derive(Parser)]
#[command(name = "dockport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file with `ports` and `properties`
    #[arg(short, long, global = true, env = "DOCKPORT_FILE")]
    pub file: Option<PathBuf>,

    /// Port mapping spec, e.g. `jolokia.port:8080` (repeatable)
    #[arg(short = 'P', long = "port", global = true)]
    pub ports: Vec<String>,

    /// Project property as key=value (repeatable)
    #[arg(short = 'p', long = "property", global = true, value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// System property as key=value; overrides project properties
    #[arg(short = 'D', long = "define", global = true, value_parser = parse_property)]
    pub defines: Vec<(String, String)>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format.
#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Human readable table.
    Table,
    /// JSON.
    Json,
}

/// Dockport commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show how each port mapping was classified
    Parse {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Apply engine bindings and print the resolved variables
    Resolve {
        /// Container inspect JSON, or its `NetworkSettings.Ports` object
        #[arg(short, long)]
        report: PathBuf,
    },

    /// Print known bindings as JSON
    Export {
        /// Container inspect JSON to apply first
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Print the port part of a container creation request
    Request,

    /// Substitute resolved variables into a template
    Render {
        /// Template containing `${name}` placeholders
        template: String,

        /// Container inspect JSON to apply first
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct SpecRow {
    #[tabled(rename = "SPEC")]
    spec: String,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "HOST PORT")]
    host_port: String,
    #[tabled(rename = "HOST IP")]
    host_ip: String,
}

impl From<&PortSpec> for SpecRow {
    fn from(spec: &PortSpec) -> Self {
        let host_port = match &spec.host_port {
            HostPort::None => "-".to_string(),
            HostPort::Fixed(port) => port.to_string(),
            HostPort::Variable(var) => match var.value() {
                Some(port) => format!("{port} (${{{}}})", var.name()),
                None => format!("${{{}}} (pending)", var.name()),
            },
        };
        let host_ip = match &spec.host_ip {
            HostIp::None => "-".to_string(),
            HostIp::Static(ip) => ip.to_string(),
            HostIp::Deferred(var) | HostIp::Eager(var) => match var.value() {
                Some(ip) => format!("{ip} (${{{}}})", var.name()),
                None => format!("${{{}}} (pending)", var.name()),
            },
        };
        Self {
            spec: spec.raw().to_string(),
            key: spec.key().to_string(),
            host_port,
            host_ip,
        }
    }
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    Properties::parse_assignment(s).map_err(|e| e.to_string())
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration, a port spec or a report cannot
    /// be read.
    pub fn execute(self) -> Result<()> {
        let mut mapping = self.build_mapping()?;

        match self.command {
            Commands::Parse { format } => {
                match format {
                    OutputFormat::Table => {
                        let rows: Vec<SpecRow> =
                            mapping.specs().iter().map(SpecRow::from).collect();
                        println!("{}", Table::new(rows));
                    }
                    OutputFormat::Json => {
                        let value = serde_json::json!({
                            "containerPorts": mapping.container_ports(),
                            "containerPortToHostPort": mapping.container_port_to_host_port_map(),
                            "hostPortVariables": mapping.host_port_variable_map(),
                            "hostIpVariables": mapping.host_ip_variable_map(),
                            "bindToHost": mapping.bind_to_host_map(),
                            "needsPropertiesUpdate": mapping.needs_properties_update(),
                        });
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                }
                Ok(())
            }

            Commands::Resolve { report } => {
                mapping.update_properties(&load_report(&report)?);

                for (name, value) in mapping.variables() {
                    println!("{name}={value}");
                }
                for name in mapping.pending_variables() {
                    tracing::warn!(variable = name, "Variable is still unresolved");
                }
                if !mapping.needs_properties_update() {
                    tracing::info!("No variables were resolved");
                }
                Ok(())
            }

            Commands::Export { report } => {
                if let Some(path) = report {
                    mapping.update_properties(&load_report(&path)?);
                }
                println!("{}", serde_json::to_string_pretty(&mapping.to_json()?)?);
                Ok(())
            }

            Commands::Request => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&mapping.create_request())?
                );
                Ok(())
            }

            Commands::Render { template, report } => {
                if let Some(path) = report {
                    mapping.update_properties(&load_report(&path)?);
                }
                println!("{}", substitute(&template, &mapping.variables()));
                Ok(())
            }
        }
    }

    fn build_mapping(&self) -> Result<PortMapping> {
        let config = match &self.file {
            Some(path) => PortConfig::from_file(path)
                .wrap_err_with(|| format!("Failed to load {}", path.display()))?,
            None => PortConfig::default(),
        };

        let mut properties = config.to_properties();
        for (key, value) in &self.properties {
            properties.set(key.clone(), value.clone());
        }
        for (key, value) in &self.defines {
            properties.set_system(key.clone(), value.clone());
        }

        let specs: Vec<&str> = config
            .ports
            .iter()
            .chain(&self.ports)
            .map(String::as_str)
            .collect();
        if specs.is_empty() {
            return Err(eyre!(
                "No port mappings given; use --port or a configuration file"
            ));
        }

        tracing::debug!(ports = specs.len(), "Parsing port mappings");
        Ok(PortMapping::new(specs, &properties)?)
    }
}

/// Read a binding report from a container inspect document.
///
/// Accepts the whole inspect response or just its `NetworkSettings.Ports`
/// object.
fn load_report(path: &Path) -> Result<BindingReport> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;

    let ports = value.pointer("/NetworkSettings/Ports").unwrap_or(&value);
    Ok(BindingReport::from_inspect_ports(ports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_properties() {
        let cli = Cli::try_parse_from([
            "dockport",
            "-P",
            "jolokia.port:8080",
            "-p",
            "jolokia.port=50000",
            "-D",
            "jolokia.port=99999",
            "export",
        ])
        .unwrap();
        assert_eq!(cli.properties, vec![("jolokia.port".to_string(), "50000".to_string())]);
        assert_eq!(cli.defines, vec![("jolokia.port".to_string(), "99999".to_string())]);

        let mapping = cli.build_mapping().unwrap();
        assert_eq!(mapping.host_port_variable_map()["jolokia.port"], 99999);
    }

    #[test]
    fn rejects_malformed_property() {
        assert!(Cli::try_parse_from(["dockport", "-p", "novalue", "request"]).is_err());
    }

    #[test]
    fn requires_ports() {
        let cli = Cli::try_parse_from(["dockport", "request"]).unwrap();
        assert!(cli.build_mapping().is_err());
    }

    #[test]
    fn spec_rows() {
        let mapping = PortMapping::new(["+ip:web.port:80", "9090"], &Properties::new()).unwrap();
        let rows: Vec<SpecRow> = mapping.specs().iter().map(SpecRow::from).collect();
        assert_eq!(rows[0].host_port, "${web.port} (pending)");
        assert_eq!(rows[0].host_ip, "${ip} (pending)");
        assert_eq!(rows[1].host_port, "-");
    }
}
