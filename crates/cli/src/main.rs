//! keyclack: plays a typewriter click on every key press.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use keyclack_core::SoundLoader;
use keyclack_decode_symphonia::WavLoader;
use keyclack_listener::{CaptureBackend, DeviceQueryBackend, KeyboardListener, ListenerConfig};
use keyclack_player::{PlayerConfig, SoundPlayer};
use keyclack_renderer_api::OutputDevice;
use keyclack_renderer_cpal::CpalDevice;

/// How long shutdown waits for clicks that are still playing
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "keyclack", version)]
#[command(about = "Play a typewriter click on every key press")]
struct Cli {
    /// PCM WAV file to play for each key
    #[arg(env = "KEYCLACK_SOUND")]
    sound: PathBuf,

    /// Number of decoded sounds kept in memory
    #[arg(long, env = "KEYCLACK_CACHE_SIZE", default_value_t = 1)]
    cache_size: usize,

    /// Append "<timestamp> - Key pressed: <key>" lines to this file
    #[arg(long, env = "KEYCLACK_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Click on key release as well as key press
    #[arg(long)]
    releases: bool,

    /// Keyboard polling interval in milliseconds
    #[arg(long, env = "KEYCLACK_POLL_MS", default_value_t = 5)]
    poll_ms: u64,

    /// Skip clicks while this many are already playing
    #[arg(long, env = "KEYCLACK_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,
}

impl Cli {
    fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            cache_size: self.cache_size,
            max_concurrent_playbacks: self.max_concurrent,
        }
    }

    fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            log_file: self.log_file.clone(),
            report_releases: self.releases,
            poll_interval: Duration::from_millis(self.poll_ms),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to wait for Ctrl+C: {}", e);
        }
    };
    run(
        &cli,
        Arc::new(WavLoader::new()),
        Arc::new(CpalDevice::new()),
        Arc::new(DeviceQueryBackend::new()),
        shutdown,
    )
    .await
}

/// Load the sound, listen until `shutdown` resolves, then drain and clean up.
///
/// Exits with 1 when the sound cannot be loaded (the listener is never
/// started) and 2 when the listener cannot start.
async fn run(
    cli: &Cli,
    loader: Arc<dyn SoundLoader>,
    device: Arc<dyn OutputDevice>,
    backend: Arc<dyn CaptureBackend>,
    shutdown: impl Future<Output = ()>,
) -> ExitCode {
    let player = match SoundPlayer::new(cli.player_config(), loader, device) {
        Ok(player) => player,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if !player.load(&cli.sound) {
        eprintln!("Failed to load sound {}", cli.sound.display());
        return ExitCode::FAILURE;
    }
    println!("Sound loaded: {}", cli.sound.display());

    let mut listener = match KeyboardListener::new(cli.listener_config(), backend) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("{}", e);
            player.cleanup();
            return ExitCode::FAILURE;
        }
    };
    listener.add_callback(player.callback_for(cli.sound.clone()));

    if let Err(e) = listener.start() {
        eprintln!("{}", e);
        player.cleanup();
        return ExitCode::from(2);
    }
    if let Some(path) = listener.key_log_path() {
        println!("Logging keys to {}", path.display());
    }
    println!("Keyboard listener is running. Press Ctrl+C to stop.");

    shutdown.await;

    listener.stop();
    if !player.wait_idle(DRAIN_TIMEOUT) {
        log::warn!(
            "{} playbacks still running at shutdown",
            player.pending_playbacks()
        );
    }
    player.cleanup();
    println!("Keyboard listener stopped.");

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use keyclack_core::{KeyIdentity, KeyclackError, PcmData, PcmSpec, SampleFormat};
    use keyclack_listener::KeyPoller;
    use keyclack_renderer_api::OutputStream;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["keyclack", "click.wav"]).unwrap();
        assert_eq!(cli.sound, PathBuf::from("click.wav"));

        let player = cli.player_config();
        assert_eq!(player.cache_size, 1);
        assert_eq!(player.max_concurrent_playbacks, None);

        let listener = cli.listener_config();
        assert_eq!(listener.log_file, None);
        assert!(!listener.report_releases);
        assert_eq!(listener.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_flags_map_to_configs() {
        let cli = Cli::try_parse_from([
            "keyclack",
            "click.wav",
            "--cache-size",
            "3",
            "--log-file",
            "keyboard_log.txt",
            "--releases",
            "--poll-ms",
            "10",
            "--max-concurrent",
            "8",
        ])
        .unwrap();

        assert_eq!(cli.player_config().cache_size, 3);
        assert_eq!(cli.player_config().max_concurrent_playbacks, Some(8));

        let listener = cli.listener_config();
        assert_eq!(listener.log_file, Some(PathBuf::from("keyboard_log.txt")));
        assert!(listener.report_releases);
        assert_eq!(listener.poll_interval, Duration::from_millis(10));
    }

    struct StubLoader;

    impl SoundLoader for StubLoader {
        fn load(&self, path: &Path) -> keyclack_core::Result<PcmData> {
            if path == Path::new("click.wav") {
                let spec = PcmSpec::new(1, SampleFormat::I16, 8000)?;
                PcmData::new(spec, vec![0u8; 16])
            } else {
                Err(KeyclackError::LoadError(format!("File not found: {}", path.display())))
            }
        }
    }

    struct SilentDevice;

    impl OutputDevice for SilentDevice {
        fn open_stream(&self, _spec: &PcmSpec) -> keyclack_core::Result<Box<dyn OutputStream>> {
            Err(KeyclackError::DeviceError("no output in tests".to_string()))
        }

        fn release(&self) -> keyclack_core::Result<()> {
            Ok(())
        }
    }

    struct QuietPoller;

    impl KeyPoller for QuietPoller {
        fn held_keys(&mut self) -> Vec<KeyIdentity> {
            Vec::new()
        }
    }

    /// Counts how often capture was opened; `deny` makes every open fail
    #[derive(Default)]
    struct CountingBackend {
        opens: AtomicUsize,
        deny: bool,
    }

    impl CaptureBackend for CountingBackend {
        fn open(&self) -> keyclack_core::Result<Box<dyn KeyPoller>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.deny {
                return Err(KeyclackError::ListenerError("permission denied".to_string()));
            }
            Ok(Box::new(QuietPoller))
        }
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("keyclack").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    async fn test_missing_sound_exits_before_listening() {
        let dir = TempDir::new().unwrap();
        let sound = dir.path().join("absent.wav");
        let cli = parse(&[sound.to_str().unwrap()]);
        let backend = Arc::new(CountingBackend::default());

        let code = run(
            &cli,
            Arc::new(WavLoader::new()),
            Arc::new(SilentDevice),
            backend.clone(),
            async {},
        )
        .await;

        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listener_failure_exits_with_two() {
        let cli = parse(&["click.wav"]);
        let backend = Arc::new(CountingBackend {
            deny: true,
            ..CountingBackend::default()
        });

        let code = run(
            &cli,
            Arc::new(StubLoader),
            Arc::new(SilentDevice),
            backend.clone(),
            async {},
        )
        .await;

        assert_eq!(code, ExitCode::from(2));
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clean_shutdown_exits_with_success() {
        let dir = TempDir::new().unwrap();
        let log_file = dir.path().join("keyboard_log.txt");
        let cli = parse(&["click.wav", "--log-file", log_file.to_str().unwrap()]);
        let backend = Arc::new(CountingBackend::default());

        let code = run(
            &cli,
            Arc::new(StubLoader),
            Arc::new(SilentDevice),
            backend.clone(),
            async {},
        )
        .await;

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
        let contents = std::fs::read_to_string(&log_file).unwrap();
        assert!(contents.contains("Keyboard listener started"));
        assert!(contents.contains("Keyboard listener stopped"));
    }
}
