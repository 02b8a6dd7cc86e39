use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use hexplay::HexViewBuilder;
use mqtt_client::{Connection, ConnectOptions, LastWill, QoS};

#[derive(Parser)]
#[clap(name = "sub_client", about = "subscribe to topics on an MQTT v3.1.1 broker")]
struct Opt {
    /// Broker host
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// Broker port
    #[clap(long, default_value = "1883")]
    port: u16,

    /// Client id; a random one is generated when omitted
    #[clap(long)]
    id: Option<String>,

    /// Keep-alive interval, in seconds
    #[clap(long, default_value = "60")]
    keep_alive: u64,

    /// Username to authenticate with
    #[clap(short, long)]
    username: Option<String>,

    /// Password to authenticate with
    #[clap(short, long)]
    password: Option<String>,

    /// Will topic
    #[clap(long)]
    will_topic: Option<String>,

    /// Will payload
    #[clap(long, default_value = "")]
    will_payload: String,

    /// Will QoS: 0, 1 or 2
    #[clap(long, default_value = "0", parse(try_from_str = parse_qos))]
    will_qos: QoS,

    /// Topic filter to subscribe to
    topic: String,

    /// QoS to request: 0, 1 or 2
    #[clap(short, long, default_value = "0", parse(try_from_str = parse_qos))]
    qos: QoS,

    /// Print payloads as hex dumps instead of lossy UTF-8
    #[clap(short, long)]
    verbose: bool,

    /// Disconnect after the first message
    #[clap(long)]
    exit_after_one: bool,
}

fn parse_qos(s: &str) -> Result<QoS, String> {
    match s {
        "0" => Ok(QoS::AtMostOnce),
        "1" => Ok(QoS::AtLeastOnce),
        "2" => Ok(QoS::ExactlyOnce),
        other => Err(format!("invalid QoS `{}`, expected 0, 1 or 2", other)),
    }
}

fn client_id(opt: &Opt) -> String {
    opt.id.clone().unwrap_or_else(|| format!("sub_client-{}", std::process::id()))
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let opt = Opt::parse();

    let connection = Connection::open((opt.host.as_str(), opt.port), Duration::from_secs(opt.keep_alive))?;

    let mut options = ConnectOptions::new(client_id(&opt));
    if let (Some(username), Some(password)) = (&opt.username, &opt.password) {
        options = options.credentials(username.clone(), password.clone());
    }
    if let Some(topic) = &opt.will_topic {
        options = options.last_will(LastWill {
            qos: opt.will_qos,
            retain: false,
            topic: topic.clone(),
            message: opt.will_payload.clone().into_bytes(),
        });
    }

    let session_present = connection.connect(&options)?;
    log::info!("connected, session_present={}", session_present);

    let status = connection
        .subscribe(&[(opt.topic.as_str(), opt.qos)])
        .map_err(|e| anyhow!("subscribe failed: {}", e))?;
    log::info!("subscribed: {:?}", status);

    loop {
        if let Some(message) = connection.get_incoming() {
            if opt.verbose {
                println!(
                    "{}:\n{}",
                    message.topic,
                    HexViewBuilder::new(&message.payload).finish()
                );
            } else {
                println!("{}: {}", message.topic, String::from_utf8_lossy(&message.payload));
            }
            if opt.exit_after_one {
                break;
            }
        } else if !connection.is_connected() {
            return Err(anyhow!("connection lost"));
        } else {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    connection.disconnect()?;
    Ok(())
}
