use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use netimpair::{
    device::Direction,
    schedule::ToggleSchedule,
    selector::SelectorSet,
    session::InstallRequest,
    tc::{
        impairment::ImpairmentRequest,
        netem::NetemParams,
        tbf::{RateParams, DEFAULT_BUFFER, DEFAULT_LATENCY},
    },
};

/// Selectively impair traffic on a network interface with tc.
#[derive(Parser, Debug)]
#[command(name = "netimpair", author, version, about, long_about = None)]
pub struct Cli {
    /// Name of the network interface to impair
    #[arg(short = 'n', long = "nic", value_name = "INTERFACE")]
    pub nic: String,

    /// Impair inbound traffic instead of outbound
    #[arg(long)]
    pub inbound: bool,

    /// Only impair traffic matching this selector, e.g. `src=10.0.0.0/8,dport=443`. Repeatable
    #[arg(long, value_name = "SELECTOR")]
    pub include: Vec<String>,

    /// Never impair traffic matching this selector, e.g. `dport=22`. Repeatable
    #[arg(long, value_name = "SELECTOR")]
    pub exclude: Vec<String>,

    /// Log the commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Leave qdiscs from an earlier run in place instead of deleting them first
    #[arg(long)]
    pub no_purge: bool,

    #[command(subcommand)]
    pub impairment: Impairment,
}

#[derive(Subcommand, Debug)]
pub enum Impairment {
    /// Delay, drop, duplicate or reorder packets
    Netem(NetemArgs),
    /// Limit throughput with a token bucket
    Rate(RateArgs),
}

#[derive(Args, Debug)]
pub struct NetemArgs {
    /// Delay added to every packet, in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Random variation of the delay, in milliseconds
    #[arg(long, value_name = "MS")]
    pub jitter: Option<u64>,

    /// Correlation of successive delays, in percent
    #[arg(long = "delay-jitter-corr", value_name = "PERCENT")]
    pub delay_jitter_corr: Option<f64>,

    /// Share of packets to drop, in percent
    #[arg(long, value_name = "PERCENT")]
    pub loss: Option<f64>,

    /// Correlation of successive losses, in percent
    #[arg(long = "loss-corr", value_name = "PERCENT")]
    pub loss_corr: Option<f64>,

    /// Share of packets to duplicate, in percent
    #[arg(long = "dup", value_name = "PERCENT")]
    pub duplicate: Option<f64>,

    /// Share of packets sent ahead of the delayed rest, in percent. Requires --delay
    #[arg(long, value_name = "PERCENT")]
    pub reorder: Option<f64>,

    /// Correlation of successive reorderings, in percent
    #[arg(long = "reorder-corr", value_name = "PERCENT")]
    pub reorder_corr: Option<f64>,

    #[command(flatten)]
    pub toggle: ToggleArgs,
}

impl NetemArgs {
    pub fn params(&self) -> NetemParams {
        let mut params = NetemParams::new();
        if let Some(ms) = self.delay {
            params = params.with_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.jitter {
            params = params.with_jitter(Duration::from_millis(ms));
        }
        if let Some(percent) = self.delay_jitter_corr {
            params = params.with_delay_correlation(percent);
        }
        if let Some(percent) = self.loss {
            params = params.with_loss(percent);
        }
        if let Some(percent) = self.loss_corr {
            params = params.with_loss_correlation(percent);
        }
        if let Some(percent) = self.duplicate {
            params = params.with_duplicate(percent);
        }
        if let Some(percent) = self.reorder {
            params = params.with_reorder(percent);
        }
        if let Some(percent) = self.reorder_corr {
            params = params.with_reorder_correlation(percent);
        }
        params
    }
}

#[derive(Args, Debug)]
pub struct RateArgs {
    /// Rate limit in kbit/s
    #[arg(long, value_name = "KBIT")]
    pub limit: u64,

    /// Bucket size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER)]
    pub buffer: u32,

    /// Longest time a packet may wait in the bucket before it is dropped, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_LATENCY.as_millis() as u64)]
    pub latency: u64,

    #[command(flatten)]
    pub toggle: ToggleArgs,
}

impl RateArgs {
    pub fn params(&self) -> RateParams {
        RateParams::new(self.limit)
            .with_buffer(self.buffer)
            .with_latency(Duration::from_millis(self.latency))
    }
}

#[derive(Args, Debug)]
pub struct ToggleArgs {
    /// Switch the impairment on and off: `--toggle 6 3 5 1` impairs for 6 seconds, pauses for 3,
    /// impairs for 5, pauses for 1, then exits. Without it the impairment stays until interrupted
    #[arg(long, value_name = "SECS", num_args = 1..)]
    pub toggle: Vec<u64>,
}

impl Cli {
    pub fn direction(&self) -> Direction {
        if self.inbound {
            Direction::Inbound
        } else {
            Direction::Outbound
        }
    }

    pub fn request(&self) -> netimpair::Result<InstallRequest> {
        let selectors = SelectorSet::parse(&self.include, &self.exclude)?;
        let impairment = match &self.impairment {
            Impairment::Netem(args) => ImpairmentRequest::netem(args.params()),
            Impairment::Rate(args) => ImpairmentRequest::rate(args.params()),
        };

        Ok(InstallRequest::new(self.nic.as_str(), impairment)
            .with_direction(self.direction())
            .with_selectors(selectors))
    }

    pub fn schedule(&self) -> ToggleSchedule {
        let toggle = match &self.impairment {
            Impairment::Netem(args) => &args.toggle,
            Impairment::Rate(args) => &args.toggle,
        };
        ToggleSchedule::from_secs(&toggle.toggle)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use netimpair::tc::impairment::ImpairmentSpec;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("netimpair").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn netem_with_selectors() {
        let cli = parse(&[
            "-n",
            "eth0",
            "--inbound",
            "--include",
            "dst=10.0.0.0/8",
            "--exclude",
            "dport=22",
            "--exclude",
            "sport=22",
            "netem",
            "--delay",
            "100",
            "--jitter",
            "10",
            "--loss",
            "2.5",
            "--toggle",
            "6",
            "3",
        ]);

        let request = cli.request().unwrap();
        assert_eq!(request.device, "eth0");
        assert_eq!(request.direction, Direction::Inbound);
        assert_eq!(request.selectors.include().len(), 1);
        assert_eq!(request.selectors.exclude().len(), 2);
        assert_eq!(
            request.impairment.to_spec().unwrap(),
            ImpairmentSpec::Netem(
                NetemParams::new()
                    .with_delay(Duration::from_millis(100))
                    .with_jitter(Duration::from_millis(10))
                    .with_loss(2.5)
            )
        );
        assert_eq!(cli.schedule().total(), Some(Duration::from_secs(9)));
    }

    #[test]
    fn rate_defaults() {
        let cli = parse(&["--nic", "eth1", "rate", "--limit", "512"]);

        assert_eq!(cli.direction(), Direction::Outbound);
        assert!(cli.schedule().is_empty());
        let request = cli.request().unwrap();
        assert_eq!(
            request.impairment.to_spec().unwrap(),
            ImpairmentSpec::Rate(RateParams::new(512))
        );
    }

    #[test]
    fn rate_requires_limit() {
        assert!(Cli::try_parse_from(["netimpair", "-n", "eth0", "rate"]).is_err());
    }

    #[test]
    fn malformed_selector_is_rejected() {
        let cli = parse(&["-n", "eth0", "--include", "dport=http", "netem", "--loss", "1"]);
        assert!(matches!(cli.request(), Err(netimpair::Error::MalformedSelector { .. })));
    }
}
