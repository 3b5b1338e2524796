//! Command line client for a trustlines relay.
//!
//! ```bash
//! RELAY_API_URL=https://relay.example.org/api/v1 tl-cli networks
//! PRIVATE_KEY=0x... tl-cli pay 0xNetwork 0xReceiver 12.5 --max-fees 0.1
//! tl-cli decode-extra-data 0x544c4d5081b0...
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;
use trustlines_client::amount::{calc_raw, format_to_amount};
use trustlines_client::config::TlConfig;
use trustlines_client::extra_data::{self, ExtraData};
use trustlines_client::links::contact_link;
use trustlines_client::payment::PaymentOptions;
use trustlines_client::relay_module::relay_types::{EventQuery, FeePayer};
use trustlines_client::signer::{LocalSigner, TxSigner};
use trustlines_client::tl_network::TlNetwork;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay API root; defaults to RELAY_API_URL
    #[arg(long)]
    relay: Option<String>,

    /// Subscribe over WebSocket instead of polling
    #[arg(long)]
    websockets: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relay version
    Version,
    /// ABI of the relay's token contract
    TokenAbi,
    /// List currency networks
    Networks,
    /// Show one currency network
    Network { address: String },
    /// Trustlines of the signer in a network
    Trustlines { network: String },
    /// Native balance of the signer
    Balance,
    /// Past events of the signer
    Events {
        #[arg(long)]
        network: Option<String>,
        #[arg(long = "type")]
        event_type: Option<String>,
        #[arg(long)]
        from_block: Option<u64>,
    },
    /// Print events of the signer as they happen
    Watch {
        #[arg(long = "type")]
        event_type: Option<String>,
    },
    /// Pay someone through the trustline graph
    Pay {
        network: String,
        receiver: String,
        value: String,
        #[arg(long)]
        max_fees: Option<String>,
        #[arg(long)]
        receiver_pays: bool,
        #[arg(long)]
        request_id: Option<String>,
        /// Only show the prepared transaction and its fees
        #[arg(long)]
        dry_run: bool,
    },
    /// Encode an extra-data envelope
    EncodeExtraData {
        #[arg(long)]
        payment_request_id: Option<String>,
        #[arg(long)]
        transfer_id: Option<String>,
    },
    /// Decode an extra-data envelope
    DecodeExtraData { data: String },
    /// Raw ledger integer to decimal value
    FormatAmount { raw: String, decimals: u8 },
    /// Decimal value to raw ledger integer
    ParseAmount { value: String, decimals: u8 },
    /// Contact deep link for an address
    ContactLink {
        address: String,
        #[arg(long)]
        name: Option<String>,
    },
}

fn signer_from_env() -> Result<LocalSigner> {
    match std::env::var("PRIVATE_KEY") {
        Ok(key) => LocalSigner::from_hex(&key).context("PRIVATE_KEY is not a valid key"),
        Err(_) => {
            warn!("PRIVATE_KEY not set, using a throwaway key");
            Ok(LocalSigner::random())
        }
    }
}

fn network(args: &Args) -> Result<TlNetwork> {
    let mut config = TlConfig::from_env();
    if let Some(relay) = &args.relay {
        config = TlConfig::new(relay, None, config.use_websockets);
    }
    if args.websockets {
        config.update_use_websockets(true);
    }
    let signer = signer_from_env()?;
    info!("using relay {} as {}", config.relay_api_url, signer.address());
    Ok(TlNetwork::new(config, Arc::new(signer))?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    dotenv::dotenv().ok();

    let args = Args::parse();

    match &args.command {
        Command::Version => {
            let tl = network(&args)?;
            println!("{}", tl.relay.version().await?);
        }
        Command::TokenAbi => {
            let tl = network(&args)?;
            print_json(&tl.relay.token_abi().await?)?;
        }
        Command::Networks => {
            let tl = network(&args)?;
            print_json(&tl.currency_network.get_all().await?)?;
        }
        Command::Network { address } => {
            let tl = network(&args)?;
            print_json(&tl.currency_network.get_info(address).await?)?;
        }
        Command::Trustlines { network: address } => {
            let tl = network(&args)?;
            print_json(&tl.trustline.get_all(address).await?)?;
        }
        Command::Balance => {
            let tl = network(&args)?;
            let balance = tl.user.balance().await?;
            println!("{} {}", tl.user.address(), balance.value);
        }
        Command::Events {
            network: address,
            event_type,
            from_block,
        } => {
            let tl = network(&args)?;
            let query = EventQuery {
                event_type: event_type.clone(),
                from_block: *from_block,
            };
            let events = match address {
                Some(address) => tl.event.get(address, &query).await?,
                None => tl.event.get_all(&query).await?,
            };
            print_json(&events)?;
        }
        Command::Watch { event_type } => {
            let tl = network(&args)?;
            let mut stream = tl.event.stream(event_type.as_deref(), None);
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = stream.next() => match event {
                        Some(Ok(event)) => print_json(&event)?,
                        Some(Err(e)) => warn!("{}", e),
                        None => break,
                    },
                }
            }
            stream.unsubscribe().await;
        }
        Command::Pay {
            network: address,
            receiver,
            value,
            max_fees,
            receiver_pays,
            request_id,
            dry_run,
        } => {
            let tl = network(&args)?;
            let options = PaymentOptions {
                max_fees: max_fees.clone(),
                fee_payer: if *receiver_pays {
                    FeePayer::Receiver
                } else {
                    FeePayer::Sender
                },
                extra_data: request_id.clone().map(ExtraData::with_payment_request_id),
                ..Default::default()
            };
            let tx = tl.payment.prepare(address, receiver, value, &options).await?;
            print_json(&tx)?;
            if !dry_run {
                let hash = tl.payment.confirm(&tx.prepared).await?;
                println!("{}", hash);
            }
        }
        Command::EncodeExtraData {
            payment_request_id,
            transfer_id,
        } => {
            let data = ExtraData {
                payment_request_id: payment_request_id.clone(),
                transfer_id: transfer_id.clone(),
            };
            println!("{}", extra_data::encode(&data)?);
        }
        Command::DecodeExtraData { data } => {
            let decoded = extra_data::try_decode(data)
                .with_context(|| format!("cannot decode {}", data))?;
            print_json(&decoded)?;
        }
        Command::FormatAmount { raw, decimals } => {
            println!("{}", format_to_amount(raw, *decimals)?.value);
        }
        Command::ParseAmount { value, decimals } => {
            println!("{}", calc_raw(value, *decimals)?);
        }
        Command::ContactLink { address, name } => {
            println!("{}", contact_link(address, name.as_deref(), &[])?);
        }
    }
    Ok(())
}
