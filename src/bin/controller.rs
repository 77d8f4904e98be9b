//! Signal controller binary: the TCP server side of the link.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use gb43229_link::packet::DeviceId;
use gb43229_link::session::Controller;

#[derive(Parser, Debug)]
#[command(name = "controller", about = "GB/T 43229-2023 signal controller")]
struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 40000)]
    port: u16,

    /// This controller's administrative code (24-bit).
    #[arg(long, default_value_t = 0x01AD24)]
    admin_code: u32,

    /// This controller's device id.
    #[arg(long, default_value_t = 1)]
    device_id: u16,

    /// 0 = warn, 1 = info, 2 = debug, 3 = trace.
    #[arg(long, default_value_t = 1)]
    log_level: u8,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = gb43229_link::logging::init(args.log_level, args.log_file.as_deref()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let identity = match DeviceId::new(args.admin_code, 0x0001, args.device_id) {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "invalid device identity");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = match gb43229_link::shutdown::install() {
        Ok(flag) => flag,
        Err(e) => {
            error!(error = %e, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port);
    let mut controller = match Controller::bind(addr, identity) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "controller listening");
    match controller.run(&shutdown) {
        Ok(()) => {
            info!("shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "event loop failed");
            ExitCode::FAILURE
        }
    }
}
