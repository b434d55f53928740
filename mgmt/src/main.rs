// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use krouter_mgmt::{ControllerParams, Mode, run};

#[derive(Parser, Debug)]
#[command(name = "krouter")]
#[command(about = "Kubernetes-native EVPN/VXLAN router controller", long_about = None)]
struct CmdArgs {
    /// How the data-plane target is provided on this machine.
    #[arg(long, value_enum, default_value = "k8s")]
    mode: Mode,

    /// Name of the node the controller runs on.
    #[arg(long)]
    nodename: String,

    /// Namespace the controller and the router pod run in.
    #[arg(long)]
    namespace: String,

    /// Location of the rendered FRR configuration file.
    #[arg(long, default_value = "/etc/krouter/frr/frr.conf")]
    frrconfig: PathBuf,

    /// Unix socket that triggers an FRR reload in the router target.
    #[arg(long, default_value = "/var/run/krouter/reloader.sock")]
    reloader_socket: PathBuf,

    /// CRI socket used to resolve the router pod's network namespace.
    #[arg(long, default_value = "unix:///run/containerd/containerd.sock")]
    crisocket: String,

    /// Static configuration file for host mode.
    #[arg(long, default_value = "/etc/krouter/config.yaml")]
    host_configuration: PathBuf,

    /// Seconds between attempts to reach the API server at startup.
    #[arg(long, default_value_t = 60)]
    k8s_wait_interval: u64,

    /// Verbosity of the process (a tracing filter, e.g. `info` or
    /// `debug,kube=info`).
    #[arg(long, default_value = "info")]
    loglevel: String,
}

fn validate_parameters(args: &CmdArgs) -> Result<(), String> {
    if args.nodename.is_empty() {
        return Err("nodename is required".to_string());
    }
    if args.namespace.is_empty() {
        return Err("namespace is required".to_string());
    }
    if args.mode == Mode::Host && args.host_configuration.as_os_str().is_empty() {
        return Err("host-configuration is required in host mode".to_string());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CmdArgs::parse();

    if let Err(err) = validate_parameters(&args) {
        eprintln!("validation error: {err}");
        return ExitCode::FAILURE;
    }

    let filter = match EnvFilter::try_new(&args.loglevel) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("invalid loglevel {:?}: {err}", args.loglevel);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("starting krouter controller: {args:?}");

    let params = ControllerParams {
        mode: args.mode,
        node: args.nodename,
        namespace: args.namespace,
        frr_config_path: args.frrconfig,
        reloader_socket: args.reloader_socket,
        cri_socket: args.crisocket,
        host_configuration: args.host_configuration,
        k8s_wait_interval: Duration::from_secs(args.k8s_wait_interval),
    };

    match run(params).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("controller failed: {err}");
            ExitCode::FAILURE
        }
    }
}
