//! Output formatting for fixes and merged positions

use super::board::MergedPosition;
use crate::core::Fix;
use clap::ValueEnum;

pub type FormatResult = Result<String, serde_json::Error>;

/// Renders engine output for the command line
pub trait FixFormatter {
    fn format_fix(&self, fix: &Fix) -> FormatResult;

    fn format_positions(&self, positions: &[MergedPosition]) -> FormatResult;

    /// Line printed once before a stream of [`format_fix`](Self::format_fix) output
    fn fix_header(&self) -> Option<&'static str> {
        None
    }
}

/// Output format selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn formatter(self) -> Box<dyn FixFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter::new()),
            OutputFormat::Json => Box::new(JsonFormatter::new()),
            OutputFormat::Csv => Box::new(CsvFormatter::new()),
        }
    }
}

/// Human-readable text
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    /// One line per record instead of a block
    pub compact: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compact() -> Self {
        Self { compact: true }
    }
}

impl FixFormatter for TextFormatter {
    fn format_fix(&self, fix: &Fix) -> FormatResult {
        let closest = fix.closest_address.as_deref().unwrap_or(&fix.closest_anchor);
        if self.compact {
            return Ok(format!(
                "{} [{}] ({:.2}, {:.2}, {:.2}) closest {} @ {:.2}",
                fix.tag_id, fix.technology, fix.x, fix.y, fix.z, closest, fix.closest_distance
            ));
        }

        let mut output = format!("Tag {} ({}):\n", fix.tag_id, fix.technology);
        output.push_str(&format!("  Position: ({:.2}, {:.2}, {:.2})\n", fix.x, fix.y, fix.z));
        output.push_str(&format!("  Closest:  {} at {:.2}\n", closest, fix.closest_distance));
        Ok(output)
    }

    fn format_positions(&self, positions: &[MergedPosition]) -> FormatResult {
        let mut output = String::new();
        for p in positions {
            output.push_str(&format!(
                "{:<8} ({:>6.2}, {:>6.2}, {:>6.2})  ble {} @ {:.2}  wifi {} @ {:.2}\n",
                p.id,
                p.x,
                p.y,
                p.z,
                or_dash(&p.closest_ble_mac),
                p.closest_ble_distance,
                or_dash(&p.closest_wifi_mac),
                p.closest_wifi_distance
            ));
        }
        Ok(output)
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// JSON for structured consumers
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn render<T: serde::Serialize + ?Sized>(&self, value: &T) -> FormatResult {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}

impl FixFormatter for JsonFormatter {
    fn format_fix(&self, fix: &Fix) -> FormatResult {
        self.render(fix)
    }

    fn format_positions(&self, positions: &[MergedPosition]) -> FormatResult {
        self.render(positions)
    }
}

/// CSV rows for data logging
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    pub include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self { include_header: true }
    }
}

impl CsvFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_header(&self) -> &'static str {
        "id,x,y,z,closest_ble_mac,closest_ble_distance,closest_wifi_mac,closest_wifi_distance"
    }
}

impl FixFormatter for CsvFormatter {
    fn format_fix(&self, fix: &Fix) -> FormatResult {
        Ok(format!(
            "{},{},{:.2},{:.2},{:.2},{},{:.2}",
            fix.tag_id,
            fix.technology,
            fix.x,
            fix.y,
            fix.z,
            fix.closest_address.as_deref().unwrap_or(&fix.closest_anchor),
            fix.closest_distance
        ))
    }

    fn fix_header(&self) -> Option<&'static str> {
        self.include_header
            .then_some("tag,technology,x,y,z,closest_anchor,closest_distance")
    }

    fn format_positions(&self, positions: &[MergedPosition]) -> FormatResult {
        let mut output = String::new();
        if self.include_header {
            output.push_str(self.position_header());
            output.push('\n');
        }
        for p in positions {
            output.push_str(&format!(
                "{},{:.2},{:.2},{:.2},{},{:.2},{},{:.2}\n",
                p.id,
                p.x,
                p.y,
                p.z,
                p.closest_ble_mac,
                p.closest_ble_distance,
                p.closest_wifi_mac,
                p.closest_wifi_distance
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Technology;

    fn fix() -> Fix {
        Fix {
            tag_id: "TAG3".to_string(),
            technology: Technology::Wifi,
            x: 0.69,
            y: 0.42,
            z: 2.0,
            closest_anchor: "WIFI2".to_string(),
            closest_address: Some("11:22:33:44:55:02".to_string()),
            closest_distance: 2.05,
        }
    }

    fn row() -> MergedPosition {
        MergedPosition {
            id: "TAG3".to_string(),
            x: 0.69,
            y: 0.42,
            z: 2.0,
            closest_ble_mac: String::new(),
            closest_ble_distance: 0.0,
            closest_wifi_mac: "11:22:33:44:55:02".to_string(),
            closest_wifi_distance: 2.05,
        }
    }

    #[test]
    fn test_text_format() {
        let text = TextFormatter::compact().format_fix(&fix()).unwrap();
        assert_eq!(text, "TAG3 [wifi] (0.69, 0.42, 2.00) closest 11:22:33:44:55:02 @ 2.05");

        let block = TextFormatter::new().format_fix(&fix()).unwrap();
        assert!(block.starts_with("Tag TAG3 (wifi):\n"));

        let table = TextFormatter::new().format_positions(&[row()]).unwrap();
        assert!(table.contains("ble - @ 0.00"));
    }

    #[test]
    fn test_json_format() {
        let json = JsonFormatter::new().format_fix(&fix()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["technology"], "wifi");
        assert_eq!(value["closest_anchor"], "WIFI2");

        let pretty = JsonFormatter::pretty().format_positions(&[row()]).unwrap();
        assert!(pretty.contains('\n'));
    }

    #[test]
    fn test_csv_format() {
        let csv = CsvFormatter::new();
        assert_eq!(
            csv.format_fix(&fix()).unwrap(),
            "TAG3,wifi,0.69,0.42,2.00,11:22:33:44:55:02,2.05"
        );
        let rows = csv.format_positions(&[row()]).unwrap();
        assert!(rows.starts_with(csv.position_header()));
        assert_eq!(rows.lines().count(), 2);

        let header = csv.fix_header().unwrap();
        assert_eq!(header.split(',').count(), csv.format_fix(&fix()).unwrap().split(',').count());
        assert_eq!(CsvFormatter { include_header: false }.fix_header(), None);
    }

    #[test]
    fn test_output_format_selects_formatter() {
        let json = OutputFormat::Json.formatter().format_fix(&fix()).unwrap();
        assert!(json.starts_with('{'));
        let text = OutputFormat::Text.formatter().format_fix(&fix()).unwrap();
        assert!(text.starts_with("Tag"));

        assert!(OutputFormat::Csv.formatter().fix_header().is_some());
        assert!(OutputFormat::Text.formatter().fix_header().is_none());
        assert!(OutputFormat::Json.formatter().fix_header().is_none());
    }
}
