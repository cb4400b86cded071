use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use campus_voice::config::Config;
use campus_voice::controller::{Presenter, RandomChooser, VoiceInputController};
use campus_voice::correction::TranscriptCorrector;
use campus_voice::dispatch::{ChatReply, HttpDispatcher, MessageDispatcher};
use campus_voice::format::{should_speak, speakable_text};
use campus_voice::telemetry;

/// Renders pipeline signals on the terminal
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn show_listening(&mut self, interim: &str) {
        println!("[listening] {interim}");
    }

    fn show_confirmation(&mut self, transcript: &str) {
        println!("[confirm] \"{transcript}\"  (/send, /edit, /cancel)");
    }

    fn show_notice(&mut self, message: &str) {
        println!("[notice] {message}");
    }

    fn show_error(&mut self, message: &str) {
        println!("[error] {message}");
    }

    fn fill_input(&mut self, text: &str) {
        println!("[input] {text}");
    }

    fn show_reply(&mut self, reply: &ChatReply) {
        println!("[assistant] {}", reply.reply);
        if should_speak(&reply.reply) {
            println!("[speech] {}", speakable_text(&reply.reply));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    println!("✓ Config loaded from ~/.campus-voice.toml");

    telemetry::init(config.telemetry.enabled, &config.telemetry.log_path)?;
    tracing::info!("campus-voice starting");

    let corrector = TranscriptCorrector::from_config(&config.corrections);

    // The terminal host has no speech recognition capability, so every
    // /voice toggle runs the simulation fallback.
    let mut controller = VoiceInputController::new(
        None,
        &config.capture,
        &config.simulation,
        corrector,
        Box::new(ConsolePresenter),
        Box::new(HttpDispatcher::new(&config.chat.base_url)?),
        Box::new(RandomChooser),
    );

    // Separate dispatcher for messages typed directly, outside the voice
    // confirmation protocol.
    let mut typed = HttpDispatcher::new(&config.chat.base_url)?;

    println!("\nCampus Voice is running against {}.", config.chat.base_url);
    println!("Commands: /voice, /send, /edit, /cancel, or type a message.");
    println!("Press Ctrl+C to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/voice" => controller.toggle().await?,
                    // Dispatch uses a blocking HTTP client; keep it off the
                    // async workers.
                    "/send" => tokio::task::block_in_place(|| controller.confirm())?,
                    "/edit" => controller.edit(),
                    "/cancel" => controller.cancel(),
                    text => {
                        let reply = tokio::task::block_in_place(|| typed.dispatch(text))?;
                        ConsolePresenter.show_reply(&reply);
                    }
                }
            }
        }
    }

    Ok(())
}
