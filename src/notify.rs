use chrono::{DateTime, FixedOffset};
use log::info;

use crate::error::Result;
use crate::models::Record;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Delivers a rendered message somewhere a human will read it.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, text: &str) -> Result<()>;
}

/// `- name（category；descriptor）`, leaving out whatever is empty.
pub fn format_record_line(record: &Record) -> String {
    let parts: Vec<&str> = [record.category.as_str(), record.volatile_descriptor.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        format!("- {}", record.name)
    } else {
        format!("- {}（{}）", record.name, parts.join("；"))
    }
}

/// The announcement for newly listed shows.
pub fn render(new_records: &[Record], source: &str, at: &DateTime<FixedOffset>) -> String {
    let mut lines = Vec::with_capacity(new_records.len() + 3);
    lines.push(format!("🎯 发现猫眼网播热度新剧（{}部）", new_records.len()));
    lines.extend(new_records.iter().map(format_record_line));
    lines.push(format!("来源：{source}"));
    lines.push(format!("时间：{}", at.format(TIMESTAMP_FORMAT)));
    lines.join("\n")
}

pub fn log_records(title: &str, records: &[Record], limit: usize) {
    info!("{title} ({})", records.len());
    for record in records.iter().take(limit) {
        info!("{}", format_record_line(record));
    }
    if records.len() > limit {
        info!("Showing the first {limit}; {} more omitted", records.len() - limit);
    }
}
