use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::info;

use heywifi_core::external::{IpCommand, MosquittoPublisher, Nmcli};
use heywifi_core::{
    CredentialFrame, DecoderConfig, ModemConfig, ProvisioningSession, StreamDecoder,
    DEFAULT_BROKER_HOST, DEFAULT_BROKER_PASSWORD, DEFAULT_BROKER_USER,
    DEFAULT_WIRELESS_INTERFACE, SAMPLE_RATE,
};

mod modem;
mod source;

use modem::ProcessModem;
use source::AudioInput;

#[derive(Parser)]
#[command(name = "heywifi")]
#[command(about = "Provision Wi-Fi credentials received as an acoustic transmission")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for a credential transmission and run one provisioning session
    Run(RunArgs),

    /// Parse a decoded payload file and print its fields (password masked)
    Inspect {
        /// Raw payload as produced by the modem
        #[arg(value_name = "PAYLOAD.BIN")]
        payload: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Replay a WAV recording instead of reading raw PCM from stdin
    #[arg(long, value_name = "FILE")]
    wav: Option<PathBuf>,

    /// Number of interleaved capture channels
    #[arg(long, default_value = "1")]
    channels: usize,

    /// Capture channel fed to the modem
    #[arg(long, default_value = "0")]
    select: usize,

    /// PCM bit depth of the capture stream (16 or 32)
    #[arg(long, default_value = "16")]
    bits_per_sample: u32,

    /// Explicit quiet-profiles.json location
    #[arg(long, value_name = "FILE")]
    profiles: Option<PathBuf>,

    /// External decoder command
    #[arg(long, default_value = "quiet-decode")]
    modem_cmd: String,

    /// Wireless interface queried for the assigned address
    #[arg(long, default_value = DEFAULT_WIRELESS_INTERFACE)]
    iface: String,

    /// Result broker host
    #[arg(long, default_value = DEFAULT_BROKER_HOST)]
    broker_host: String,

    /// Result broker username
    #[arg(long, default_value = DEFAULT_BROKER_USER)]
    broker_user: String,

    /// Result broker password
    #[arg(long, default_value = DEFAULT_BROKER_PASSWORD)]
    broker_password: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(args),
        Commands::Inspect { payload } => inspect_command(&payload),
    }
}

fn run_command(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let modem_config = ModemConfig::resolve(args.profiles.as_deref())?;

    // A WAV replay dictates its own capture format.
    let (input, channels, bits) = match args.wav {
        Some(path) => {
            let spec = hound::WavReader::open(&path)?.spec();
            (
                AudioInput::Wav(path),
                spec.channels as usize,
                spec.bits_per_sample as u32,
            )
        }
        None => (AudioInput::Stdin, args.channels, args.bits_per_sample),
    };

    let config = DecoderConfig {
        channels,
        select: args.select,
        bits_per_sample: bits,
    };
    let mut decoder = StreamDecoder::new(config)?;
    let modem = ProcessModem::spawn(&args.modem_cmd, &modem_config)?;

    let publisher = MosquittoPublisher {
        host: args.broker_host,
        username: args.broker_user,
        password: args.broker_password,
        ..MosquittoPublisher::default()
    };
    let session = Arc::new(ProvisioningSession::new(
        Nmcli,
        IpCommand { iface: args.iface },
        publisher,
        decoder.stop_handle(),
    ));
    session.begin();

    let handler = Arc::clone(&session);
    decoder.start(modem, move |payload| handler.handle_payload(payload));

    // 100 ms capture buffers
    let sample_bytes = (bits / 8) as usize;
    let frame_bytes = (SAMPLE_RATE as usize / 10) * channels * sample_bytes;
    // Detached on purpose: a live stdin capture can stay blocked in read
    // past the end of the session.
    let _capture = source::spawn_capture(input, decoder.queue(), frame_bytes, sample_bytes);

    info!("listening for a credential transmission");
    while !session.is_done() {
        thread::sleep(Duration::from_secs(1));
    }

    decoder.stop();
    Ok(())
}

fn inspect_command(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let payload = std::fs::read(path)?;
    let frame = CredentialFrame::parse(&payload)?;
    println!("ssid:     {}", frame.ssid);
    println!("password: {}", "*".repeat(frame.password.len()));
    println!("channel:  {}", frame.channel);
    println!("payload:  {} bytes", payload.len());
    Ok(())
}
