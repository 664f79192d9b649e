use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use ambd_wifi::{
    DnsSlot, MacAddress, WifiDrv,
    config::{self, Config},
    scan,
    sim::{self, SimControl, SimRadio, SimStack},
};

#[derive(Parser)]
#[command(name = "ambd-wifi-sim")]
#[command(about = "Drive the WiFi driver facade against a simulated radio")]
#[command(version)]
struct Cli {
    /// Bench configuration (defaults to <config dir>/ambd-wifi/sim.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for networks
    Scan {
        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Join a network as a station
    Connect {
        /// SSID of the network to join
        ssid: String,

        /// WPA/WPA2 passphrase
        #[arg(short, long, conflicts_with = "wep_key")]
        password: Option<String>,

        /// WEP key as hex (10 or 26 digits)
        #[arg(long)]
        wep_key: Option<String>,

        /// WEP key index
        #[arg(long, default_value = "0")]
        key_index: u8,

        /// Static IPv4 address (DHCP when omitted)
        #[arg(long)]
        ip: Option<Ipv4Addr>,

        /// Static gateway, requires --ip
        #[arg(long, requires = "ip")]
        gateway: Option<Ipv4Addr>,

        /// Static netmask, requires --gateway
        #[arg(long, requires = "gateway")]
        netmask: Option<Ipv4Addr>,

        /// DNS server, may be given twice
        #[arg(long, num_args = 1, action = clap::ArgAction::Append)]
        dns: Vec<Ipv4Addr>,

        /// Hostname announced over DHCP
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Start a soft access point
    Ap {
        /// SSID to broadcast
        ssid: String,

        /// WPA2 passphrase (open AP when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Channel number
        #[arg(long)]
        channel: Option<String>,

        /// Hide the SSID
        #[arg(long)]
        hidden: bool,
    },

    /// Resolve a hostname
    Resolve {
        host: String,

        /// Look up an AAAA record
        #[arg(long)]
        v6: bool,
    },

    /// Show firmware version and MAC address
    Info,

    /// Write a configuration file with the default environment
    InitConfig,

    /// Show the bench configuration
    ShowConfig,
}

type Driver = WifiDrv<SimRadio, SimStack>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let path = match cli.config {
        Some(path) => path,
        None => config::config_path()?,
    };

    match cli.command {
        Commands::Scan { json } => cmd_scan(&path, json),
        Commands::Connect {
            ssid,
            password,
            wep_key,
            key_index,
            ip,
            gateway,
            netmask,
            dns,
            hostname,
        } => {
            let (mut drv, _ctl) = open_driver(&path)?;
            if let Some(ip) = ip {
                let params = 1 + u8::from(gateway.is_some()) + u8::from(netmask.is_some());
                let unset = Ipv4Addr::UNSPECIFIED;
                drv.config(params, ip, gateway.unwrap_or(unset), netmask.unwrap_or(unset))?;
            }
            match dns.as_slice() {
                [] => {}
                [primary] => drv.set_dns(1, *primary, Ipv4Addr::UNSPECIFIED)?,
                [primary, secondary] => drv.set_dns(2, *primary, *secondary)?,
                _ => bail!("At most two DNS servers are supported"),
            }
            if let Some(hostname) = hostname {
                drv.set_hostname(&hostname);
            }
            cmd_connect(&mut drv, &ssid, password.as_deref(), wep_key.as_deref(), key_index)
        }
        Commands::Ap {
            ssid,
            password,
            channel,
            hidden,
        } => cmd_ap(&path, &ssid, password.as_deref(), channel.as_deref(), hidden),
        Commands::Resolve { host, v6 } => cmd_resolve(&path, &host, v6),
        Commands::Info => cmd_info(&path),
        Commands::InitConfig => cmd_init_config(&path),
        Commands::ShowConfig => cmd_show_config(&path),
    }
}

fn open_driver(path: &Path) -> Result<(Driver, SimControl)> {
    let cfg = Config::load(path)?;
    let (radio, stack, ctl) = sim::bench(cfg.environment);
    let drv = WifiDrv::new(radio, stack, cfg.driver).context("Driver initialization failed")?;
    Ok((drv, ctl))
}

fn cmd_scan(path: &Path, json: bool) -> Result<()> {
    let (mut drv, _ctl) = open_driver(path)?;
    drv.start_scan_networks()?;

    if json {
        let entries: Vec<_> = drv
            .scan_results()
            .iter()
            .map(|e| {
                serde_json::json!({
                    "ssid": e.ssid.to_string(),
                    "rssi": e.rssi,
                    "channel": e.channel,
                    "bssid": e.bssid.as_ref().map(format_mac),
                    "encryption": e.security.enc_type().to_string(),
                    "security": e.security.bits(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        scan::display_networks(drv.scan_results());
    }

    Ok(())
}

fn cmd_connect(
    drv: &mut Driver,
    ssid: &str,
    password: Option<&str>,
    wep_key: Option<&str>,
    key_index: u8,
) -> Result<()> {
    println!("Connecting to '{}'...", ssid);

    let result = match (password, wep_key) {
        (Some(password), _) => drv.wifi_set_passphrase(ssid, password),
        (None, Some(hex)) => drv.wifi_set_key(ssid, key_index, &parse_hex(hex)?),
        (None, None) => drv.wifi_set_network(ssid),
    };
    if let Err(e) = result {
        bail!("Connection failed ({}): {}", drv.connection_status(), e);
    }

    println!("Connected successfully!");
    println!();
    display_status(drv);

    Ok(())
}

fn cmd_ap(
    path: &Path,
    ssid: &str,
    password: Option<&str>,
    channel: Option<&str>,
    hidden: bool,
) -> Result<()> {
    let (mut drv, ctl) = open_driver(path)?;
    drv.ap_set_network(ssid)?;
    if let Some(password) = password {
        drv.ap_set_passphrase(password)?;
    }
    if let Some(channel) = channel {
        drv.ap_set_channel(channel)?;
    }
    drv.ap_activate(hidden)?;

    let params = ctl.ap().ok_or_else(|| anyhow!("Soft AP did not start"))?;
    println!("Status:    {}", drv.connection_status());
    println!("SSID:      {}", params.ssid);
    println!("Channel:   {}", params.channel);
    println!("Security:  {}", if params.passphrase.is_some() { "WPA2" } else { "open" });
    println!("Hidden:    {}", params.hidden);
    println!("Address:   {}", drv.settings().ap_address);

    Ok(())
}

fn cmd_resolve(path: &Path, host: &str, v6: bool) -> Result<()> {
    let (mut drv, _ctl) = open_driver(path)?;
    let address = if v6 {
        drv.host_by_name_v6(host)?.to_string()
    } else {
        drv.host_by_name(host)?.to_string()
    };
    println!("{} -> {}", host, address);
    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let (drv, _ctl) = open_driver(path)?;
    println!("Firmware:  {}", drv.fw_version());
    println!("MAC:       {}", format_mac(&drv.mac_address()));
    println!("Status:    {}", drv.connection_status());
    Ok(())
}

fn cmd_init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    Config::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn cmd_show_config(path: &Path) -> Result<()> {
    println!("Config file: {}", path.display());
    println!();

    let cfg = Config::load(path)?;
    println!("Connect timeout: {} ms", cfg.driver.connect_timeout_ms);
    println!("Scan timeout:    {} ms", cfg.driver.scan_timeout_ms);
    println!("AP channel:      {}", cfg.driver.default_ap_channel);
    println!();

    if cfg.environment.networks.is_empty() {
        println!("No simulated networks.");
    } else {
        println!("{:<24} {:<18} {:>5} {}", "SSID", "BSSID", "RSSI", "SECURITY");
        println!("{}", "-".repeat(60));
        for network in &cfg.environment.networks {
            println!(
                "{:<24} {:<18} {:>5} {}",
                network.ssid,
                format_mac(&network.bssid),
                network.rssi,
                network.security.enc_type()
            );
        }
    }

    Ok(())
}

fn display_status(drv: &Driver) {
    println!("Status:    {}", drv.connection_status());
    println!("SSID:      {}", drv.current_ssid());
    println!("BSSID:     {}", format_mac(&drv.current_bssid()));
    println!("RSSI:      {} dBm", drv.current_rssi());
    println!("Hostname:  {}", drv.hostname());
    println!("IP:        {}", drv.ip_address());
    println!("Netmask:   {}", drv.subnet_mask());
    println!("Gateway:   {}", drv.gateway_ip());
    println!("DNS:       {}", drv.dns_server(DnsSlot::Primary));
    println!("IPv6:      {} ({:?})", drv.ipv6_address(), drv.ipv6_status());
}

fn format_mac(mac: &MacAddress) -> String {
    mac.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Decode a `--wep-key` argument given as hex digits.
fn parse_hex(hex: &str) -> Result<Vec<u8>> {
    hex::decode(hex).with_context(|| format!("WEP key must be hex digits, got '{hex}'"))
}
