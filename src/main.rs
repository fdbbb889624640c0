//! Pinroute - serial console for the BI04 signal-routing test stand
//!
//! Thin shell over `pinroute_core`: argument parsing, port listing, one-shot
//! sends and an interactive prompt. All device interaction goes through the
//! session API; everything the operator sees comes back as log events.

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use pinroute_core::{
    AppConfig, BroadcastSink, Command as StandCommand, LogEvent, SendError, SerialSession,
    SignalType,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// CLI output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for scripting
    Json,
}

/// Pinroute CLI
#[derive(Parser, Debug)]
#[command(
    name = "pinroute",
    version,
    about = "Serial console for the BI04 signal-routing test stand",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Quiet mode (data and errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Open the stand, send one command, print the echo, close
    Send {
        /// Serial port name (e.g. COM3, /dev/ttyUSB0); falls back to the
        /// configured default port
        #[arg(short, long)]
        port: Option<String>,

        /// Clear all routed outputs instead of routing
        #[arg(long, conflicts_with_all = ["pin", "signal"])]
        clear: bool,

        /// Target pin (1-3)
        #[arg(long, required_unless_present = "clear")]
        pin: Option<u8>,

        /// Signal type (PLS, IPR, CLS)
        #[arg(long, required_unless_present = "clear")]
        signal: Option<String>,

        /// How long to linger for the device echo, in milliseconds
        #[arg(long, default_value = "500")]
        linger: u64,
    },

    /// Interactive session with the stand
    Shell {
        /// Serial port name; falls back to the configured default port
        #[arg(short, long)]
        port: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::ListPorts { detailed } => list_ports(&cli, *detailed)?,
        Commands::Send {
            port,
            clear,
            pin,
            signal,
            linger,
        } => {
            let command = build_command(*clear, *pin, signal.as_deref())?;
            let port = resolve_port(port.as_deref())?;
            send_once(&cli, &port, &command, Duration::from_millis(*linger)).await?;
        }
        Commands::Shell { port } => {
            let port = resolve_port(port.as_deref())?;
            run_shell(&cli, &port).await?;
        }
    }

    Ok(())
}

fn resolve_port(arg: Option<&str>) -> anyhow::Result<String> {
    if let Some(name) = arg {
        return Ok(name.to_string());
    }
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("config load failed: {e}"))?;
    config
        .default_port
        .ok_or_else(|| anyhow::anyhow!("no port given and no default port configured"))
}

fn build_command(clear: bool, pin: Option<u8>, signal: Option<&str>) -> anyhow::Result<StandCommand> {
    if clear {
        return Ok(StandCommand::Clear);
    }
    let (Some(pin), Some(signal)) = (pin, signal) else {
        anyhow::bail!("either --clear or both --pin and --signal are required");
    };
    let signal: SignalType = signal.parse()?;
    Ok(StandCommand::Route { signal, pin })
}

fn list_ports(cli: &Cli, detailed: bool) -> anyhow::Result<()> {
    let ports = pinroute_core::list_ports()?;

    if ports.is_empty() {
        if !cli.quiet {
            println!("No serial ports found.");
        }
        return Ok(());
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            if detailed {
                println!("Available serial ports:");
                println!("{:-<60}", "");
                for port in &ports {
                    println!("  {} [{:?}]", port.port_name, port.port_type);
                }
            } else {
                for port in &ports {
                    println!("{}", port.port_name);
                }
            }
        }
    }

    Ok(())
}

async fn send_once(
    cli: &Cli,
    port: &str,
    command: &StandCommand,
    linger: Duration,
) -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("config load failed: {e}"))?;
    let sink = Arc::new(BroadcastSink::default());
    let mut events = sink.subscribe();
    let session = SerialSession::new(sink);

    let outcome: anyhow::Result<()> = async {
        session.open(port, &config.serial).await?;
        session.send(command).await?;
        // give the stand a moment to echo before tearing down
        tokio::time::sleep(linger).await;
        Ok(())
    }
    .await;

    session.close().await;

    while let Ok(event) = events.try_recv() {
        print_event(&event, cli.quiet);
    }

    outcome
}

async fn run_shell(cli: &Cli, port: &str) -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("config load failed: {e}"))?;
    let sink = Arc::new(BroadcastSink::default());
    let mut events = sink.subscribe();
    let session = SerialSession::new(sink);

    session.open(port, &config.serial).await?;

    let quiet = cli.quiet;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event, quiet),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if !quiet {
        println!("Connected to {port}. Type 'help' for commands, 'quit' to exit.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_shell_line(&session, line.trim()).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("stdin error: {e}");
                        break;
                    }
                }
            }
        }
    }

    session.close().await;
    // the session holds the last sender; dropping it ends the printer
    drop(session);
    let _ = printer.await;

    Ok(())
}

/// Returns `false` when the shell should exit.
async fn handle_shell_line(session: &SerialSession, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    let mut parts = line.split_whitespace();
    let result = match parts.next().unwrap_or("") {
        "quit" | "exit" => return false,
        "help" => {
            print_help();
            return true;
        }
        "clear" => session.send(&StandCommand::Clear).await,
        "route" => {
            let (Some(pin), Some(signal)) = (parts.next(), parts.next()) else {
                eprintln!("usage: route <pin> <signal>");
                return true;
            };
            let Ok(pin) = pin.parse::<u8>() else {
                eprintln!("pin must be a number (1-3)");
                return true;
            };
            match signal.parse::<SignalType>() {
                Ok(signal) => session.send(&StandCommand::Route { signal, pin }).await,
                Err(e) => {
                    eprintln!("{e}");
                    return true;
                }
            }
        }
        other => {
            eprintln!("unknown command: {other} (try 'help')");
            return true;
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        // a dead reader means the link is gone; the session has already
        // settled back to disconnected
        if matches!(e, SendError::NotConnected) {
            return false;
        }
    }
    true
}

fn print_help() {
    println!("Commands:");
    println!("  route <pin> <signal>  route a signal (PLS, IPR, CLS) to pin 1-3");
    println!("  clear                 reset all routed outputs");
    println!("  quit                  close the session and exit");
    println!();
    println!("PLS = load driver, IPR = load sense, CLS = short-circuit test line.");
    println!("A signal type can be routed to one pin at a time; the stand itself");
    println!("enforces that rule.");
}

fn print_event(event: &LogEvent, quiet: bool) {
    let stamp = Local::now().format("%H:%M:%S%.3f");
    match event {
        LogEvent::Connected => {
            if !quiet {
                println!("[{stamp}] connected");
            }
        }
        LogEvent::Disconnected => {
            if !quiet {
                println!("[{stamp}] disconnected");
            }
        }
        LogEvent::Sent(text) => println!("[{stamp}] >> {text}"),
        LogEvent::Received(text) => println!("[{stamp}] << {text}"),
        LogEvent::Error(text) => eprintln!("[{stamp}] error: {text}"),
    }
}
