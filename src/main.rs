use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use motionkit::{console, init_logging, topics, Config, MotionEvent, MotionSession};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "motionkit", version = motionkit::VERSION, about = "Serial G-code motion console")]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Talk to an in-process simulated device instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    Ports,
    /// Connect and read motion commands from stdin
    Console {
        /// Port to open; "Auto" picks the first one found
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => match motionkit::default_config_path() {
            Ok(path) => Config::load_or_default(&path)
                .with_context(|| format!("loading {}", path.display()))?,
            Err(_) => Config::default(),
        },
    };
    config.apply_env_overrides()?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_session(cli: &Cli, config: &Config) -> Result<MotionSession> {
    let session = if cli.simulate {
        MotionSession::simulated(config)?
    } else {
        MotionSession::serial(config)?
    };
    Ok(session)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(Some(&config.logging.level))?;
    tracing::debug!("motionkit {} built {}", motionkit::VERSION, motionkit::BUILD_DATE);

    let session = open_session(&cli, &config)?;

    match &cli.command {
        Command::Ports => {
            for info in session.list_ports()? {
                println!("{}\t{}\t{}", info.device, info.description, info.hwid);
            }
        }
        Command::Console { port, baud } => {
            let bus = session.bus();
            bus.subscribe(topics::COMMAND_RESULT, |event: &MotionEvent| {
                if let MotionEvent::CommandResult(ack) = event {
                    println!("{}", ack.message);
                }
            });
            bus.subscribe(topics::ERRORS, |event: &MotionEvent| {
                if let MotionEvent::Error(raised) = event {
                    eprintln!("{}", raised);
                }
            });
            bus.subscribe(topics::COMMAND_LOG, |event: &MotionEvent| {
                tracing::debug!("{}", event);
            });
            bus.subscribe(topics::POSITION, |event: &MotionEvent| {
                tracing::trace!("{}", event);
            });

            session.start()?;
            let port = port.as_deref().unwrap_or(&config.connection.port);
            let connected = session.connect(port, *baud)?;
            println!("connected to {} (type 'help' for commands)", connected);

            let stdin = std::io::stdin();
            console::run(&session, stdin.lock(), std::io::stdout())?;
        }
    }

    session.shutdown();
    Ok(())
}
