use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::time::Duration;

use x32_remote::{
    midi,
    mixer::{
        limits,
        protocol::x32::Feedback,
        retry::{connect_with_retry, RetryPolicy},
    },
    ConnectionConfig, Mixer, MixerEvent, FACTORY,
};

/// Remote control for Behringer X32 mixers
#[derive(Parser, Debug)]
#[command(name = "x32-remote", version)]
struct Args {
    /// Mixer address
    #[arg(long, default_value = "192.168.1.100")]
    host: String,

    /// Transport: osc or mcu
    #[arg(short, long, default_value = "osc")]
    protocol: String,

    /// Mixer port, defaults to the protocol's
    #[arg(long)]
    port: Option<u16>,

    /// Connection timeout, defaults to the protocol's
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Retry connecting on network errors
    #[arg(long)]
    retry: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the mixer answers
    Probe,

    /// Mute or unmute a channel
    Mute {
        #[arg(value_parser = |arg: &str| limits::CHANNEL.parse(arg))]
        channel: u8,
        #[arg(long)]
        off: bool,
    },

    /// Move a channel fader
    Fader {
        #[arg(value_parser = |arg: &str| limits::CHANNEL.parse(arg))]
        channel: u8,
        /// Position from 0.0 to 1.0, 0.75 is unity gain
        level: f64,
    },

    /// Mute or unmute a DCA
    DcaMute {
        #[arg(value_parser = |arg: &str| limits::DCA.parse(arg))]
        dca: u8,
        #[arg(long)]
        off: bool,
    },

    /// Move a DCA fader
    DcaFader {
        #[arg(value_parser = |arg: &str| limits::DCA.parse(arg))]
        dca: u8,
        level: f64,
    },

    /// Recall a scene
    Scene {
        #[arg(value_parser = |arg: &str| limits::SCENE.parse(arg))]
        scene: u8,
    },

    /// Activate or release a mute group
    MuteGroup {
        #[arg(value_parser = |arg: &str| limits::MUTE_GROUP.parse(arg))]
        group: u8,
        #[arg(long)]
        off: bool,
    },

    /// Print state changes reported by the mixer
    Monitor {
        /// Channels to follow
        #[arg(long, value_delimiter = ',')]
        #[arg(value_parser = |arg: &str| limits::CHANNEL.parse(arg))]
        channels: Vec<u8>,
        /// DCAs to follow
        #[arg(long, value_delimiter = ',')]
        #[arg(value_parser = |arg: &str| limits::DCA.parse(arg))]
        dcas: Vec<u8>,
        /// Mute groups to follow
        #[arg(long, value_delimiter = ',')]
        #[arg(value_parser = |arg: &str| limits::MUTE_GROUP.parse(arg))]
        mute_groups: Vec<u8>,
    },
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match run(Args::parse()) {
        Ok(()) => log::debug!("Exiting"),
        Err(err) => {
            log::error!("Error: {err}");
            for cause in err.chain().skip(1) {
                log::error!("\t{cause}");
            }
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let port = match args.port {
        Some(port) => port,
        None => FACTORY.default_port(&args.protocol).ok_or_else(|| {
            anyhow!(
                "Unknown protocol {}, expected one of: {}",
                args.protocol,
                FACTORY.list().collect::<Vec<_>>().join(", "),
            )
        })?,
    };

    let mixer = FACTORY
        .build(&args.protocol, ConnectionConfig::new(args.host.as_str(), port))
        .context("Couldn't set up mixer client")?;

    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| mixer.default_connect_timeout());

    let connected = if args.retry {
        connect_with_retry(mixer.as_ref(), &RetryPolicy::default(), timeout)
    } else {
        mixer.connect(timeout)
    };
    connected.with_context(|| format!("Couldn't connect to {}", mixer.config()))?;

    use Command::*;
    match args.command {
        Probe => println!("{} mixer at {} is reachable", mixer.name(), mixer.config()),
        Mute { channel, off } => mixer.mute_channel(channel, !off)?,
        Fader { channel, level } => mixer.set_channel_fader(channel, level)?,
        DcaMute { dca, off } => mixer.mute_dca(dca, !off)?,
        DcaFader { dca, level } => mixer.set_dca_fader(dca, level)?,
        Scene { scene } => mixer.recall_scene(scene)?,
        MuteGroup { group, off } => mixer.set_mute_group(group, !off)?,
        Monitor {
            channels,
            dcas,
            mute_groups,
        } => {
            channels.iter().for_each(|&ch| mixer.subscribe_to_channel(ch));
            dcas.iter().for_each(|&dca| mixer.subscribe_to_dca(dca));
            mute_groups
                .iter()
                .for_each(|&group| mixer.subscribe_to_mute_group(group));

            monitor(mixer.as_ref());
        }
    }

    mixer.disconnect();

    Ok(())
}

/// Prints events until the connection drops.
fn monitor(mixer: &dyn Mixer) {
    for event in mixer.events() {
        match event {
            MixerEvent::Osc(msg) => match Feedback::parse(&msg) {
                Some(feedback) => println!("{feedback:?}"),
                None => println!("{msg}"),
            },
            MixerEvent::Midi(event) => match event {
                midi::Event::Mute { channel, muted } => {
                    println!("channel {channel} {}", if muted { "muted" } else { "unmuted" })
                }
                _ => match event.fader_level() {
                    Some(level) => println!("{event:?} level {level:.3}"),
                    None => println!("{event:?}"),
                },
            },
            MixerEvent::Connected => println!("connected"),
            MixerEvent::Disconnected => {
                println!("disconnected");
                break;
            }
            MixerEvent::Error(err) => println!("error: {err}"),
        }
    }
}
