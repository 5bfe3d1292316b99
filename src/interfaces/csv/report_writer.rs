use crate::application::chunked::ChunkReport;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ReportRow {
    target: u64,
    arrived: u64,
    fulfilled: u64,
    rejected: u64,
    failed: u64,
    chunk_size: Decimal,
    elapsed_ms: u64,
    throughput: Decimal,
}

impl From<&ChunkReport> for ReportRow {
    fn from(report: &ChunkReport) -> Self {
        Self {
            target: report.min_destination_amount,
            arrived: report.amount_arrived,
            fulfilled: report.fulfilled,
            rejected: report.rejected,
            failed: report.failed,
            chunk_size: report.chunk_size.round_dp(4).normalize(),
            elapsed_ms: report.elapsed.as_millis() as u64,
            throughput: report.throughput().round_dp(4).normalize(),
        }
    }
}

/// Writes chunked payment reports as CSV, one row per report.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_reports<'a>(&mut self, reports: impl IntoIterator<Item = &'a ChunkReport>) -> Result<()> {
        for report in reports {
            self.writer.serialize(ReportRow::from(report))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
