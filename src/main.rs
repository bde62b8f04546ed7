use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use ar7030_remote::commands::{config, rig, serial};
use ar7030_remote::domain::{
    Configuration, LevelKind, Mode, PowerStatus, ResetKind, RigResult, Vfo,
};
use ar7030_remote::state::RigState;

/// Remote control for the AOR AR7030 Plus receiver.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port the receiver is attached to
    #[arg(short, long, global = true)]
    port: Option<String>,
    /// Serial baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,
    /// Talk to the built-in simulated receiver
    #[arg(long, global = true)]
    simulate: bool,
    /// Load settings from a saved profile before applying other flags
    #[arg(long, global = true)]
    profile: Option<String>,
    /// Retries on transport failure
    #[arg(long, global = true)]
    retries: Option<u32>,
    /// Profiles directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    ListPorts,
    /// Connect and show receiver details
    Info,
    GetFreq {
        #[arg(long, default_value = "current")]
        vfo: Vfo,
    },
    SetFreq {
        /// Frequency in Hz
        hz: f64,
        #[arg(long, default_value = "current")]
        vfo: Vfo,
    },
    GetMode {
        #[arg(long, default_value = "current")]
        vfo: Vfo,
    },
    SetMode {
        mode: Mode,
        /// Passband width in Hz; leaves the filter alone when omitted
        width: Option<u32>,
        #[arg(long, default_value = "current")]
        vfo: Vfo,
    },
    GetLevel {
        level: LevelKind,
    },
    SetLevel {
        level: LevelKind,
        value: String,
    },
    /// Switch to, or swap, the active VFO and print it
    Vfo {
        target: Option<Vfo>,
        #[arg(long, conflicts_with = "target")]
        toggle: bool,
    },
    /// Read the squelch state
    Dcd,
    /// Read the tuning step in Hz
    GetTs,
    /// Set the tuning step in Hz
    SetTs {
        hz: u32,
    },
    /// Read, or switch, the receiver power
    Power {
        switch: Option<PowerArg>,
    },
    Reset {
        #[arg(value_enum, default_value_t = ResetArg::Soft)]
        kind: ResetArg,
    },
    /// Read a memory channel (0..=399)
    Channel {
        number: u16,
    },
    /// Read the receiver clock
    Clock,
    /// Manage saved profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// Save the current settings under a name
    Save { name: String },
    /// Print a saved profile
    Load { name: String },
    List,
    Delete { name: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PowerArg {
    On,
    Off,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ResetArg {
    Soft,
    Vfo,
    MemoryClear,
    Master,
}

impl From<ResetArg> for ResetKind {
    fn from(arg: ResetArg) -> Self {
        match arg {
            ResetArg::Soft => ResetKind::Soft,
            ResetArg::Vfo => ResetKind::Vfo,
            ResetArg::MemoryClear => ResetKind::MemoryClear,
            ResetArg::Master => ResetKind::Master,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Profile (if any) overlaid with command-line flags
fn effective_config(cli: &Cli, dir: &std::path::Path) -> RigResult<Configuration> {
    let mut cfg = match &cli.profile {
        Some(name) => config::load_configuration(dir, name)?,
        None => Configuration::default(),
    };
    if let Some(port) = &cli.port {
        cfg.serial_port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        cfg.baud_rate = baud;
    }
    if let Some(retries) = cli.retries {
        cfg.retries = retries;
    }
    cfg.simulate |= cli.simulate;
    Ok(cfg)
}

fn print<T: serde::Serialize>(json: bool, value: &T, text: String) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Serialization error: {e}"),
        }
    } else {
        println!("{text}");
    }
}

fn run(cli: Cli) -> RigResult<()> {
    let dir = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => config::default_config_dir()?,
    };
    let cfg = effective_config(&cli, &dir)?;

    // Commands that do not need the receiver
    match &cli.command {
        Command::ListPorts => {
            let ports = serial::list_serial_ports()?;
            let text = ports
                .iter()
                .map(|p| format!("{}\t{}", p.name, p.port_type))
                .collect::<Vec<_>>()
                .join("\n");
            print(cli.json, &ports, text);
            return Ok(());
        }
        Command::Profile { action } => {
            return match action {
                ProfileAction::Save { name } => {
                    let profile = Configuration {
                        name: name.clone(),
                        ..cfg
                    };
                    config::save_configuration(&dir, &profile)
                }
                ProfileAction::Load { name } => {
                    let profile = config::load_configuration(&dir, name)?;
                    print(cli.json, &profile, format!("{profile:#?}"));
                    Ok(())
                }
                ProfileAction::List => {
                    let names = config::list_configurations(&dir)?;
                    print(cli.json, &names, names.join("\n"));
                    Ok(())
                }
                ProfileAction::Delete { name } => config::delete_configuration(&dir, name),
            };
        }
        _ => {}
    }

    let state = RigState::new();
    let info = serial::connect(&state, &cfg)?;
    let result = run_receiver_command(&cli, &state, &info);
    // Close regardless of the command's outcome; the command's error wins
    let closed = serial::disconnect(&state);
    result.and(closed)
}

fn run_receiver_command(
    cli: &Cli,
    state: &RigState,
    info: &ar7030_remote::domain::RigInfo,
) -> RigResult<()> {
    let json = cli.json;
    match &cli.command {
        Command::Info => print(
            json,
            info,
            format!(
                "{} on {} at {} baud\n{:.0} Hz {}",
                info.ident, info.port, info.baud_rate, info.frequency_hz, info.mode
            ),
        ),
        Command::GetFreq { vfo } => {
            let hz = rig::get_frequency(state, *vfo)?;
            print(json, &hz, format!("{hz:.0}"));
        }
        Command::SetFreq { hz, vfo } => rig::set_frequency(state, *vfo, *hz)?,
        Command::GetMode { vfo } => {
            let (mode, width) = rig::get_mode(state, *vfo)?;
            print(json, &(mode, width), format!("{mode} {width}"));
        }
        Command::SetMode { mode, width, vfo } => rig::set_mode(state, *vfo, *mode, *width)?,
        Command::GetLevel { level } => {
            let value = rig::get_level(state, *level)?;
            print(json, &value, value.to_string());
        }
        Command::SetLevel { level, value } => {
            let value = level.parse_value(value)?;
            rig::set_level(state, *level, value)?;
        }
        Command::Vfo { target, toggle } => {
            if *toggle {
                rig::toggle_vfo(state)?;
            } else if let Some(vfo) = target {
                rig::set_vfo(state, *vfo)?;
            }
            let active = rig::get_vfo(state)?;
            print(json, &active, format!("{active:?}"));
        }
        Command::Dcd => {
            let dcd = rig::get_dcd(state)?;
            print(json, &dcd, format!("{dcd:?}"));
        }
        Command::GetTs => {
            let step = rig::get_tuning_step(state)?;
            print(json, &step, step.to_string());
        }
        Command::SetTs { hz } => rig::set_tuning_step(state, *hz)?,
        Command::Power { switch: None } => {
            let status = rig::get_power_status(state)?;
            print(json, &status, format!("{status:?}"));
        }
        Command::Power { switch: Some(arg) } => {
            let status = match arg {
                PowerArg::On => PowerStatus::On,
                PowerArg::Off => PowerStatus::Off,
            };
            rig::set_power_status(state, status)?;
        }
        Command::Reset { kind } => rig::reset(state, (*kind).into())?,
        Command::Channel { number } => {
            let ch = rig::get_channel(state, *number)?;
            let mode = ch.mode.map(|m| m.to_string()).unwrap_or_else(|| "-".into());
            print(
                json,
                &ch,
                format!(
                    "{:03} {:.0} Hz {mode} filter {} ({} Hz) sql {} pbs {:.0} Hz{} '{}'",
                    ch.channel,
                    ch.frequency_hz,
                    ch.filter,
                    ch.width_hz,
                    ch.squelch,
                    ch.passband_shift_hz,
                    if ch.scan_lockout { " lockout" } else { "" },
                    ch.ident
                ),
            );
        }
        Command::Clock => {
            let t = rig::get_clock(state)?;
            print(
                json,
                &t,
                format!("{:02}:{:02}:{:02}", t.hours, t.minutes, t.seconds),
            );
        }
        Command::ListPorts | Command::Profile { .. } => {}
    }
    Ok(())
}
