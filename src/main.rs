mod directives;
mod gateway;

use clap::{Parser, Subcommand};
use maitre_booking::BookingStore;
use maitre_channels::whatsapp::{generate_qr_terminal, start_pairing, WhatsAppChannel};
use maitre_core::{config, context::Context, traits::Provider};
use maitre_memory::Store;
use maitre_providers::{AnthropicProvider, OpenAiProvider};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "maitre",
    version,
    about = "Maitre — conversational appointment booking over WhatsApp"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent.
    Start,
    /// Check provider and channel health.
    Status,
    /// Pair with WhatsApp by scanning a QR code.
    Pair,
    /// Send a one-shot message to the model (no conversation state).
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;

            let provider = build_provider(&cfg)?;
            if !provider.is_available().await {
                anyhow::bail!("provider '{}' is not available", provider.name());
            }

            let mut channels: HashMap<String, Arc<dyn maitre_core::traits::Channel>> =
                HashMap::new();
            if let Some(ref wa) = cfg.channel.whatsapp {
                if wa.enabled {
                    let channel = WhatsAppChannel::new(wa.clone(), &cfg.maitre.data_dir);
                    channels.insert("whatsapp".to_string(), Arc::new(channel));
                }
            }
            if channels.is_empty() {
                anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
            }

            let memory = Store::new(&cfg.memory).await?;
            let booking = BookingStore::new(&cfg.booking).await?;

            let executor = directives::DirectiveExecutor::new(
                Arc::new(booking),
                Arc::new(memory.clone()),
                cfg.replies.clone(),
            );

            println!("Maitre — starting agent...");
            let gw = Arc::new(gateway::Gateway::new(
                provider,
                channels,
                memory,
                executor,
                cfg.behavior.clone(),
                cfg.prompts.clone(),
                cli.config.clone(),
            ));
            gw.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("Maitre — Status Check\n");
            println!("Config: {}", cli.config);
            println!("Default provider: {}", cfg.provider.default);
            println!();

            match build_provider(&cfg) {
                Ok(provider) => {
                    let available = provider.is_available().await;
                    println!(
                        "  {}: {}",
                        provider.name(),
                        if available { "available" } else { "not available" }
                    );
                }
                Err(e) => println!("  provider: {e}"),
            }
            println!();

            match cfg.channel.whatsapp {
                Some(ref wa) if wa.enabled => println!("  whatsapp: enabled"),
                Some(_) => println!("  whatsapp: disabled"),
                None => println!("  whatsapp: not configured"),
            }

            println!();
            println!(
                "  mode: {:?} | activation words: {} | exit words: {}",
                cfg.behavior.mode,
                cfg.behavior.activation_words.len(),
                cfg.behavior.user_exit_words.len(),
            );
        }
        Commands::Pair => {
            let cfg = config::load(&cli.config)?;
            println!("Pairing with WhatsApp. Scan the QR code with your phone:");
            println!("  WhatsApp → Settings → Linked Devices → Link a Device\n");

            let (mut qr_rx, mut done_rx) = start_pairing(&cfg.maitre.data_dir).await?;
            loop {
                tokio::select! {
                    Some(code) = qr_rx.recv() => {
                        match generate_qr_terminal(&code) {
                            Ok(qr) => println!("{qr}"),
                            Err(e) => eprintln!("failed to render QR: {e}"),
                        }
                    }
                    Some(_) = done_rx.recv() => {
                        println!("Paired successfully.");
                        break;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        println!("Pairing aborted.");
                        break;
                    }
                }
            }
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: maitre ask <message>");
            }

            let prompt = message.join(" ");
            let cfg = config::load(&cli.config)?;
            let provider = build_provider(&cfg)?;

            if !provider.is_available().await {
                anyhow::bail!("provider '{}' is not available", provider.name());
            }

            let mut context = Context::new(&prompt);
            context.system_prompt = cfg.prompts.system.clone();
            let response = provider.complete(&context).await?;
            println!("{}", response.text);
        }
    }

    Ok(())
}

/// Build the configured provider.
fn build_provider(cfg: &config::Config) -> anyhow::Result<Arc<dyn Provider>> {
    match cfg.provider.default.as_str() {
        "anthropic" => {
            let a = cfg
                .provider
                .anthropic
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("provider.anthropic section missing"))?;
            Ok(Arc::new(AnthropicProvider::from_config(
                a.api_key.clone(),
                a.model.clone(),
            )))
        }
        "openai" => {
            let o = cfg
                .provider
                .openai
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("provider.openai section missing"))?;
            Ok(Arc::new(OpenAiProvider::from_config(
                o.api_key.clone(),
                o.model.clone(),
                o.base_url.clone(),
            )))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}
