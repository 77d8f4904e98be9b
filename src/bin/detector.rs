//! Vehicle detector binary: the TCP client side of the link.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use gb43229_link::packet::DeviceId;
use gb43229_link::session::Detector;

#[derive(Parser, Debug)]
#[command(name = "detector", about = "GB/T 43229-2023 vehicle detector")]
struct Args {
    /// Signal controller host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Signal controller port.
    #[arg(long, default_value_t = 40000)]
    port: u16,

    /// This detector's administrative code (24-bit).
    #[arg(long, default_value_t = 0x01AD24)]
    admin_code: u32,

    /// Low byte of device_type; see DeviceKind (inductive loop, radar, ...).
    #[arg(long, default_value_t = 0x02)]
    device_type: u8,

    /// This detector's device id.
    #[arg(long, default_value_t = 100)]
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

    let identity = match DeviceId::new(args.admin_code, args.device_type as u16, args.device_id) {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "invalid device identity");
            return ExitCode::FAILURE;
        }
    };

    let server_addr: SocketAddr = match (args.host.as_str(), args.port).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                error!(host = %args.host, port = args.port, "server address resolved to nothing");
                return ExitCode::FAILURE;
            }
        },
        Err(e) => {
            error!(error = %e, host = %args.host, port = args.port, "failed to resolve server address");
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

    let mut detector = match Detector::new(server_addr, identity) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "failed to initialize client engine");
            return ExitCode::FAILURE;
        }
    };

    info!(%server_addr, "detector starting");
    match detector.run(&shutdown) {
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
