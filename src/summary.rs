use std::fmt::Write;

use serde_derive::Serialize;
use serde_with::{serde_as, DurationMilliSecondsWithFrac};

use crate::stats::StatsSnapshot;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
    Csv,
    None,
}

/// End-of-run report. RTT figures are in milliseconds.
#[serde_as]
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Summary {
    pub destination: String,
    pub packets_transmitted: u32,
    pub packets_received: u32,
    /// Percentage of lost packets, truncated.
    pub packet_loss: u32,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub total_time: std::time::Duration,
    /// `None` until the first reply.
    pub minimum_rtt: Option<f64>,
    pub average_rtt: f64,
    pub maximum_rtt: f64,
    pub mean_deviation: f64,
}

impl Summary {
    /// A run interrupted before its first send still reports one
    /// transmitted packet, which also keeps the loss division defined.
    pub fn new(destination: &str, stats: &StatsSnapshot, total_time: std::time::Duration) -> Self {
        let transmitted = stats.transmitted.max(1);
        let received = stats.received.min(transmitted);
        let packet_loss = 100 - (received as u64 * 100 / transmitted as u64) as u32;
        Self {
            destination: destination.to_owned(),
            packets_transmitted: transmitted,
            packets_received: received,
            packet_loss,
            total_time,
            minimum_rtt: stats.rtt_min.is_finite().then_some(stats.rtt_min),
            average_rtt: stats.rtt_avg,
            maximum_rtt: stats.rtt_max,
            mean_deviation: stats.rtt_mdev,
        }
    }

    pub fn format(&self, format: SummaryFormat) -> Result<String, Box<dyn std::error::Error>> {
        Ok(match format {
            SummaryFormat::Text => self.as_text()?,
            SummaryFormat::Json => self.as_json()? + "\n",
            SummaryFormat::Csv => self.as_csv()? + "\n",
            SummaryFormat::None => String::new(),
        })
    }

    pub fn as_text(&self) -> Result<String, std::fmt::Error> {
        let mut result = String::new();
        writeln!(&mut result)?;
        writeln!(&mut result, "--- {} ping statistics ---", self.destination)?;
        writeln!(
            &mut result,
            "{} packets transmitted, {} received, {}% packet loss time {}ms",
            self.packets_transmitted,
            self.packets_received,
            self.packet_loss,
            self.total_time.as_millis()
        )?;
        writeln!(
            &mut result,
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            self.minimum_rtt.unwrap_or(f64::INFINITY),
            self.average_rtt,
            self.maximum_rtt,
            self.mean_deviation
        )?;
        Ok(result)
    }

    pub fn as_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn as_csv(&self) -> Result<String, std::fmt::Error> {
        let mut result = String::new();
        write!(
            &mut result,
            "{},{},{},{},{:.3},{:.3},{:.3},{:.3}",
            self.packets_transmitted,
            self.packets_received,
            self.packet_loss,
            self.minimum_rtt.map_or("".to_owned(), |rtt| format!("{:.3}", rtt)),
            self.average_rtt,
            self.maximum_rtt,
            self.mean_deviation,
            self.total_time.as_secs_f64() * 1000.0
        )?;
        Ok(result)
    }
}
