//! setupact.log scraping.
//!
//! The upgrade assistant writes a free-text log with three recognizable
//! shapes: a "Host system information:" key/value block, operation tables
//! introduced by a `<` banner plus an "Operation completed successfully"
//! line, and standalone "Executing operation:" markers. One forward pass
//! extracts all three into a [`LogAnalysisResult`].
//!
//! Malformed values degrade to documented defaults instead of aborting the
//! scan; an I/O error mid-file ends the scan and the partial result is kept.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::Path;
use tracing::{debug, error, trace, warn};

use crate::fingerprint;

/// Timestamp layout used everywhere in the log.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Start of the host-inventory key/value block.
const SYSTEM_INFO_HEADER: &str = "Host system information:";
/// The `<` banner announcing an operation outcome. The log writes a run of
/// 60; anything at least that long counts.
const MARKER_RUN: usize = 60;
/// The dash run that terminates an operation table (94 in the log).
const TABLE_END_RUN: usize = 94;
/// Marker inside the markdown-like table header.
const TABLE_HEADER: &str = "---|---";
const SUCCESS_MARKER: &str = "Operation completed successfully: ";
const FAILURE_MARKER: &str = "Operation failed: ";
const EXECUTING_MARKER: &str = "Executing operation:";

/// Host inventory scraped from the "Host system information:" block.
///
/// String fields fall back to `"Unknown"` when the source key is absent or
/// blank; numeric fields fall back to 0 when unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os_version: String,
    pub vm: String,
    pub firmware_type: String,
    pub manufacturer: String,
    pub model: String,
    pub bios_name: String,
    pub bios_version: String,
    pub bios_release_date: String,
    /// Bytes.
    pub total_memory: i64,
    pub physical_cpus: i32,
    pub logical_cpus: i32,
    pub processor_manufacturer: String,
    pub processor_name: String,
    pub processor_caption: String,
    pub processor_architecture: String,
    /// MHz.
    pub processor_clock: i32,
}

impl Default for SystemInfo {
    /// The all-defaults record: every string field `"Unknown"`, every
    /// numeric field 0. This is what an empty inventory block produces.
    fn default() -> Self {
        Self::from_section(&HashMap::new(), "Unknown".to_string(), "Unknown".to_string())
    }
}

impl SystemInfo {
    /// Build from the captured key/value block. Only the finite set of keys
    /// the log is known to write is consulted; everything else in the block
    /// is ignored.
    fn from_section(section: &HashMap<String, String>, hostname: String, os_version: String) -> Self {
        Self {
            hostname,
            os_version,
            vm: text(section, "VM"),
            firmware_type: text(section, "Firmware type"),
            manufacturer: text(section, "Manufacturer"),
            model: text(section, "Model"),
            bios_name: text(section, "BIOS name"),
            bios_version: text(section, "BIOS version"),
            bios_release_date: text(section, "BIOS release date"),
            total_memory: long(section, "Total memory"),
            physical_cpus: int(section, "Number of physical CPUs"),
            logical_cpus: int(section, "Number of logical CPUs"),
            processor_manufacturer: text(section, "Processor manufacturer"),
            processor_name: text(section, "Processor name"),
            processor_caption: text(section, "Processor caption"),
            processor_architecture: text(section, "Processor architecture"),
            processor_clock: int(section, "Processor clock"),
        }
    }
}

fn text(section: &HashMap<String, String>, key: &str) -> String {
    match section.get(key) {
        Some(value) if !value.trim().is_empty() => value.clone(),
        _ => "Unknown".to_string(),
    }
}

fn int(section: &HashMap<String, String>, key: &str) -> i32 {
    section
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn long(section: &HashMap<String, String>, key: &str) -> i64 {
    section
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// One row of an operation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Ordinal id from the row's first field; -1 when unparseable.
    pub operation_id: i32,
    /// Operation name from the surrounding success line, shared by all rows
    /// of one table.
    pub name: String,
    pub executed: bool,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    /// Elapsed duration in milliseconds; 0 when unparseable.
    pub elapsed_ms: u64,
}

/// The last "Executing operation" marker seen without a matching terminal
/// marker before end of file. Entirely empty when no marker appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncompleteAction {
    pub action_name: Option<String>,
    pub start_time: Option<NaiveDateTime>,
}

impl UncompleteAction {
    pub fn is_empty(&self) -> bool {
        self.action_name.is_none() && self.start_time.is_none()
    }
}

/// Aggregate result of scanning one setupact.log, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAnalysisResult {
    pub system_info: SystemInfo,
    /// Table rows in encounter order.
    pub results: Vec<OperationResult>,
    pub failures: Vec<String>,
    pub uncomplete_action: UncompleteAction,
    /// Content fingerprint used as the dedup key by sinks.
    pub hash: String,
}

/// Hostname for a log file: its parent directory name, or a deterministic
/// label derived from the path when there is none.
pub fn hostname_for(path: &Path) -> String {
    if let Some(name) = path.parent().and_then(|p| p.file_name()) {
        let name = name.to_string_lossy();
        if !name.is_empty() {
            return name.into_owned();
        }
    }
    let mut hasher = DefaultHasher::new();
    path.to_string_lossy().hash(&mut hasher);
    format!("Unknown{:016x}", hasher.finish())
}

/// OS descriptor of the machine running the analysis.
pub fn host_os_version() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Scan state. The transition rules live in [`Scan::step`]; keeping them on
/// one enum makes unreachable flag combinations unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Idle,
    /// Inside the "Host system information:" block.
    SystemInfo,
    /// A `<` banner was seen; the next outcome line decides the branch.
    MarkerSeen,
    /// Success line consumed; skipping forward to the `---|---` header.
    AwaitingTableHeader,
    /// Reading pipe-delimited rows until the dash terminator.
    InTable,
}

#[derive(Debug)]
struct Scan {
    state: ScanState,
    /// The block is captured once per file and never re-entered.
    system_info_captured: bool,
    section: HashMap<String, String>,
    operation_name: String,
    results: Vec<OperationResult>,
    failures: Vec<String>,
    pending: UncompleteAction,
}

impl Scan {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            system_info_captured: false,
            section: HashMap::new(),
            operation_name: String::new(),
            results: Vec::new(),
            failures: Vec::new(),
            pending: UncompleteAction::default(),
        }
    }

    fn step(&mut self, line: &str) {
        match self.state {
            ScanState::SystemInfo => self.step_system_info(line),
            ScanState::AwaitingTableHeader => {
                if line.contains(TABLE_HEADER) {
                    trace!("table header detected");
                    self.state = ScanState::InTable;
                }
            }
            ScanState::InTable => self.step_table_row(line),
            ScanState::Idle | ScanState::MarkerSeen => self.step_outer(line),
        }
    }

    fn step_system_info(&mut self, line: &str) {
        if line.trim().is_empty() {
            debug!("end of system information section");
            self.system_info_captured = true;
            self.state = ScanState::Idle;
            return;
        }
        // The header takes precedence over the key/value split, so a
        // repeated header line is not captured as data.
        if line.contains(SYSTEM_INFO_HEADER) {
            return;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            trace!("captured system info: {key} = {value}");
            // Last write wins on repeated keys.
            self.section.insert(key, value);
        }
    }

    fn step_table_row(&mut self, line: &str) {
        if contains_run(line, '-', TABLE_END_RUN) {
            trace!("end of table detected");
            self.state = ScanState::Idle;
            return;
        }
        match parse_row(line, &self.operation_name) {
            Some(row) => {
                trace!(
                    "parsed operation {} with id {}",
                    row.name,
                    row.operation_id
                );
                self.results.push(row);
            }
            None => warn!("failed to parse table row: {line}"),
        }
    }

    fn step_outer(&mut self, line: &str) {
        if line.contains(SYSTEM_INFO_HEADER) {
            if !self.system_info_captured {
                trace!("system information section detected");
                self.state = ScanState::SystemInfo;
            }
            return;
        }

        if contains_run(line, '<', MARKER_RUN) {
            trace!("operation marker detected");
            self.state = ScanState::MarkerSeen;
            return;
        }

        if self.state == ScanState::MarkerSeen && line.contains(SUCCESS_MARKER) {
            if let Some(name) = after_first_colon_space(line) {
                trace!("detected successful operation: {name}");
                self.operation_name = name.to_string();
                self.state = ScanState::AwaitingTableHeader;
            }
            return;
        }

        if line.contains(EXECUTING_MARKER) {
            if let Some(name) = after_first_colon_space(line) {
                debug!("detected executing operation: {name}");
                self.pending.action_name = Some(name.to_string());
                self.pending.start_time = executing_start_time(line);
            }
            return;
        }

        if self.state == ScanState::MarkerSeen && line.contains(FAILURE_MARKER) {
            if let Some(reason) = after_first_colon_space(line) {
                error!("detected failed operation: {reason}");
                self.failures.push(reason.to_string());
                self.state = ScanState::Idle;
            }
        }
    }
}

/// Parses setupact.log line sequences into [`LogAnalysisResult`]s.
pub struct SetupLogParser {
    os_version: String,
}

impl Default for SetupLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupLogParser {
    pub fn new() -> Self {
        Self {
            os_version: host_os_version(),
        }
    }

    /// Override the OS descriptor stamped into results (tests, replays).
    pub fn with_os_version(os_version: impl Into<String>) -> Self {
        Self {
            os_version: os_version.into(),
        }
    }

    /// Single forward pass over `lines`. Never fails: an I/O error mid-file
    /// ends the scan early and whatever was accumulated is returned.
    pub fn parse<I>(&self, source: &Path, lines: I) -> LogAnalysisResult
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut scan = Scan::new();
        for line in lines {
            match line {
                Ok(line) => scan.step(&line),
                Err(err) => {
                    error!(
                        "error while reading {}, keeping partial result: {err}",
                        source.display()
                    );
                    break;
                }
            }
        }

        let system_info = SystemInfo::from_section(
            &scan.section,
            hostname_for(source),
            self.os_version.clone(),
        );
        let hash = fingerprint::log_analysis(&system_info, &scan.pending);

        debug!(
            "scan of {} complete: {} operations, {} failures",
            source.display(),
            scan.results.len(),
            scan.failures.len()
        );

        LogAnalysisResult {
            system_info,
            results: scan.results,
            failures: scan.failures,
            uncomplete_action: scan.pending,
            hash,
        }
    }
}

/// True when `line` contains a run of at least `len` consecutive `ch`.
fn contains_run(line: &str, ch: char, len: usize) -> bool {
    let mut run = 0;
    for c in line.chars() {
        if c == ch {
            run += 1;
            if run >= len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// The trimmed remainder after the first `": "` in the line.
fn after_first_colon_space(line: &str) -> Option<&str> {
    line.find(": ").map(|idx| line[idx + 2..].trim())
}

/// Start time of an "Executing operation" line: the first two whitespace
/// tokens (`2024-05-01 12:00:03,`) with the trailing comma stripped.
fn executing_start_time(line: &str) -> Option<NaiveDateTime> {
    let mut tokens = line.split_whitespace();
    let date = tokens.next()?.trim();
    let time = tokens.next()?.trim_end_matches(',').trim();
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), TIME_FORMAT).ok()
}

/// Parse one pipe-delimited table row. Rows with fewer than 6 fields, or
/// that are themselves separators, do not parse.
fn parse_row(line: &str, operation_name: &str) -> Option<OperationResult> {
    if !line.contains('|') || line.starts_with("---") {
        return None;
    }
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 6 {
        return None;
    }

    let operation_id = parts[0]
        .split_whitespace()
        .last()
        .and_then(|id| id.parse().ok())
        .unwrap_or(-1);

    Some(OperationResult {
        operation_id,
        name: operation_name.to_string(),
        executed: parts[2].trim().eq_ignore_ascii_case("Yes"),
        start_time: NaiveDateTime::parse_from_str(parts[3].trim(), TIME_FORMAT).ok(),
        end_time: NaiveDateTime::parse_from_str(parts[4].trim(), TIME_FORMAT).ok(),
        elapsed_ms: parse_elapsed_ms(parts[5].trim()).unwrap_or(0),
    })
}

/// Parse an elapsed field: `HH:MM:SS`, optionally with a leading day count
/// (`1.02:03:04`) and/or a fractional second (`00:00:01.5000000`).
fn parse_elapsed_ms(text: &str) -> Option<u64> {
    let (days, clock) = match text.split_once('.') {
        Some((d, rest))
            if rest.contains(':') && !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()) =>
        {
            (d.parse::<u64>().ok()?, rest)
        }
        _ => (0, text),
    };

    let mut fields = clock.split(':');
    let hours: u64 = fields.next()?.parse().ok()?;
    let minutes: u64 = fields.next()?.parse().ok()?;
    let seconds: f64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let whole = (days * 86_400 + hours * 3_600 + minutes * 60) * 1_000;
    Some(whole + (seconds * 1_000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_lines(text: &str) -> Vec<io::Result<String>> {
        text.lines().map(|l| Ok(l.to_string())).collect()
    }

    fn parse(text: &str) -> LogAnalysisResult {
        SetupLogParser::with_os_version("test-os")
            .parse(Path::new("/logs/HOST01/setupact.log"), ok_lines(text))
    }

    const MARKER: &str = "2024-05-01 12:00:00, Info                  SP     <<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<";

    fn table_end() -> String {
        "-".repeat(94)
    }

    fn sample_log() -> String {
        format!(
            "\
2024-05-01 11:58:00, Info                  Host system information:
    VM: Yes
    Firmware type: UEFI
    Manufacturer: Contoso Ltd.
    Model: Virtual Machine
    BIOS name: Hyper-V UEFI Release v4.1
    BIOS version: 4.1
    BIOS release date: 2023-01-10
    Total memory: 17179869184
    Number of physical CPUs: 1
    Number of logical CPUs: 4
    Processor manufacturer: GenuineIntel
    Processor name: Intel(R) Xeon(R) Platinum
    Processor caption: Intel64 Family 6
    Processor architecture: x64
    Processor clock: 2400

2024-05-01 11:59:00, Info                  SP     Not table related
{MARKER}
2024-05-01 12:00:01, Info                  SP     Operation completed successfully: Gather data
2024-05-01 12:00:01, Info                  SP     Operation | Description | Executed | Start | End | Elapsed
   ---|---|---|---|---|---
 Operation 1 | Collect drivers | Yes | 2024-05-01 11:59:01 | 2024-05-01 11:59:02 | 00:00:01.0000000
 Operation 2 | Scan appraiser | No | not-a-date | 2024-05-01 11:59:04 | bogus
{end}
2024-05-01 12:00:03, Info                  SP     Executing operation: Migrate data
{MARKER}
2024-05-01 12:00:05, Info                  SP     Operation failed: Disk read error
",
            MARKER = MARKER,
            end = table_end()
        )
    }

    #[test]
    fn test_system_info_block() {
        let result = parse(&sample_log());
        let info = &result.system_info;
        assert_eq!(info.hostname, "HOST01");
        assert_eq!(info.os_version, "test-os");
        assert_eq!(info.vm, "Yes");
        assert_eq!(info.firmware_type, "UEFI");
        assert_eq!(info.manufacturer, "Contoso Ltd.");
        assert_eq!(info.total_memory, 17_179_869_184);
        assert_eq!(info.physical_cpus, 1);
        assert_eq!(info.logical_cpus, 4);
        assert_eq!(info.processor_clock, 2400);
    }

    #[test]
    fn test_missing_keys_default() {
        let result = parse("irrelevant line\n");
        let info = &result.system_info;
        assert_eq!(info.vm, "Unknown");
        assert_eq!(info.bios_name, "Unknown");
        assert_eq!(info.total_memory, 0);
        assert_eq!(info.processor_clock, 0);
    }

    #[test]
    fn test_blank_value_defaults_to_unknown() {
        let log = "Host system information:\n    Model:   \n\n";
        let result = parse(log);
        assert_eq!(result.system_info.model, "Unknown");
    }

    #[test]
    fn test_repeated_key_last_write_wins() {
        let log = "Host system information:\n    Model: First\n    Model: Second\n\n";
        let result = parse(log);
        assert_eq!(result.system_info.model, "Second");
    }

    #[test]
    fn test_operation_table_rows() {
        let result = parse(&sample_log());
        assert_eq!(result.results.len(), 2);

        let first = &result.results[0];
        assert_eq!(first.operation_id, 1);
        assert_eq!(first.name, "Gather data");
        assert!(first.executed);
        assert_eq!(
            first.start_time.unwrap().format(TIME_FORMAT).to_string(),
            "2024-05-01 11:59:01"
        );
        assert_eq!(first.elapsed_ms, 1_000);

        let second = &result.results[1];
        assert_eq!(second.operation_id, 2);
        assert!(!second.executed);
        assert!(second.start_time.is_none());
        assert_eq!(second.elapsed_ms, 0);
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        // Scenario: two valid rows, one with too few fields.
        let log = format!(
            "{MARKER}\nOperation completed successfully: Op\nx ---|---\n\
 Operation 1 | a | Yes | 2024-05-01 11:59:01 | 2024-05-01 11:59:02 | 00:00:01\n\
 broken row without enough pipes | x\n\
 Operation 2 | b | No | 2024-05-01 11:59:03 | 2024-05-01 11:59:04 | 00:00:01\n\
{end}\n",
            MARKER = MARKER,
            end = table_end()
        );
        let result = parse(&log);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].operation_id, 1);
        assert_eq!(result.results[1].operation_id, 2);
    }

    #[test]
    fn test_success_without_marker_is_ignored() {
        let log = "Operation completed successfully: Op\n   ---|---\n 1 | a | Yes | x | y | z\n";
        let result = parse(log);
        assert!(result.results.is_empty());
    }

    #[test]
    fn test_table_without_header_yields_no_rows() {
        let log = format!(
            "{MARKER}\nOperation completed successfully: Op\n 1 | a | Yes | x | y | 00:00:01\n",
            MARKER = MARKER
        );
        let result = parse(&log);
        assert!(result.results.is_empty());
    }

    #[test]
    fn test_failure_recorded() {
        let result = parse(&sample_log());
        assert_eq!(result.failures, vec!["Disk read error".to_string()]);
    }

    #[test]
    fn test_uncomplete_action() {
        // Scenario: executing marker with no terminal marker after it.
        let log = "2024-05-01 12:00:03, Info SP Executing operation: Migrate data\n";
        let result = parse(log);
        assert_eq!(
            result.uncomplete_action.action_name.as_deref(),
            Some("Migrate data")
        );
        assert_eq!(
            result
                .uncomplete_action
                .start_time
                .unwrap()
                .format(TIME_FORMAT)
                .to_string(),
            "2024-05-01 12:00:03"
        );
    }

    #[test]
    fn test_last_executing_marker_wins() {
        let log = "\
2024-05-01 12:00:03, Info SP Executing operation: First
2024-05-01 12:00:09, Info SP Executing operation: Second
";
        let result = parse(log);
        assert_eq!(
            result.uncomplete_action.action_name.as_deref(),
            Some("Second")
        );
    }

    #[test]
    fn test_no_executing_marker_leaves_action_empty() {
        let result = parse("nothing to see\n");
        assert!(result.uncomplete_action.is_empty());
    }

    #[test]
    fn test_unparseable_executing_time_left_absent() {
        let log = "garbled Executing operation: Thing\n";
        let result = parse(log);
        assert_eq!(result.uncomplete_action.action_name.as_deref(), Some("Thing"));
        assert!(result.uncomplete_action.start_time.is_none());
    }

    #[test]
    fn test_io_error_returns_partial_result() {
        let lines: Vec<io::Result<String>> = vec![
            Ok("Host system information:".to_string()),
            Ok("    VM: Yes".to_string()),
            Ok(String::new()),
            Err(io::Error::new(io::ErrorKind::Other, "disk gone")),
            Ok("    Model: Never seen".to_string()),
        ];
        let result = SetupLogParser::with_os_version("test-os")
            .parse(Path::new("/logs/HOST01/setupact.log"), lines);
        assert_eq!(result.system_info.vm, "Yes");
        assert_eq!(result.system_info.model, "Unknown");
    }

    #[test]
    fn test_system_info_block_not_reentered() {
        let log = "\
Host system information:
    VM: Yes

Host system information:
    VM: Overwritten

";
        let result = parse(log);
        assert_eq!(result.system_info.vm, "Yes");
    }

    #[test]
    fn test_hash_is_stable() {
        let a = parse(&sample_log());
        let b = parse(&sample_log());
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
    }

    #[test]
    fn test_hostname_fallback_is_deterministic() {
        let a = hostname_for(Path::new("setupact.log"));
        let b = hostname_for(Path::new("setupact.log"));
        assert_eq!(a, b);
        assert!(a.starts_with("Unknown"));
    }

    #[test]
    fn test_row_parser_edge_cases() {
        assert!(parse_row("--- | a | b | c | d | e", "op").is_none());
        assert!(parse_row("no pipes at all", "op").is_none());
        assert!(parse_row("a | b | c", "op").is_none());

        let row = parse_row(" garbage id | x | yes | bad | bad | bad", "op").unwrap();
        assert_eq!(row.operation_id, -1);
        assert!(row.executed);
        assert!(row.start_time.is_none());
        assert!(row.end_time.is_none());
        assert_eq!(row.elapsed_ms, 0);
    }

    #[test]
    fn test_parse_elapsed_ms() {
        assert_eq!(parse_elapsed_ms("00:01:30"), Some(90_000));
        assert_eq!(parse_elapsed_ms("00:00:01.5000000"), Some(1_500));
        assert_eq!(parse_elapsed_ms("1.02:00:00"), Some(93_600_000));
        assert_eq!(parse_elapsed_ms("12:34"), None);
        assert_eq!(parse_elapsed_ms("00:99:00"), None);
        assert_eq!(parse_elapsed_ms("bogus"), None);
    }
}
