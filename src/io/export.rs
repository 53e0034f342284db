//! CSV export for simulation step results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::StepResult;

/// Column header for CSV telemetry export.
const HEADER: &str = "tick,timestamp,elapsed_s,ghi,temp_air,intensity,\
                      voltage,current,power,mpp_power,next_reference,end_reached";

/// Exports simulation results to a CSV file at the given path.
///
/// Writes a header row followed by one data row per step. Timestamps are
/// RFC 3339 in the array's local timezone. Produces deterministic output for
/// identical inputs.
///
/// # Arguments
///
/// * `results` - Step results in tick order
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[StepResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes simulation results as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[StepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        wtr.write_record(&[
            r.tick.to_string(),
            r.timestamp.to_rfc3339(),
            format!("{:.1}", r.elapsed_s),
            format!("{:.3}", r.ghi),
            format!("{:.3}", r.temp_air),
            r.intensity.to_string(),
            format!("{:.4}", r.voltage),
            format!("{:.6}", r.current),
            format!("{:.4}", r.power),
            format!("{:.4}", r.mpp_power),
            format!("{:.4}", r.next_reference),
            r.end_reached.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, TimeZone};
    use chrono_tz::America::New_York;

    fn make_step(t: usize) -> StepResult {
        let start = New_York
            .with_ymd_and_hms(2000, 8, 24, 0, 0, 0)
            .single()
            .expect("unambiguous");
        StepResult {
            tick: t,
            timestamp: start + TimeDelta::minutes(7 * t as i64),
            elapsed_s: 420.0 * t as f64,
            ghi: 512.25,
            temp_air: 24.5,
            intensity: 131,
            voltage: 45.5,
            current: 2.75,
            power: 125.125,
            mpp_power: 130.0,
            next_reference: 46.0,
            end_reached: false,
        }
    }

    fn render(results: &[StepResult]) -> String {
        let mut buf = Vec::new();
        write_csv(results, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }

    #[test]
    fn header_lists_every_column() {
        let output = render(&[make_step(0)]);
        let first_line = output.lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "tick,timestamp,elapsed_s,ghi,temp_air,intensity,\
             voltage,current,power,mpp_power,next_reference,end_reached"
        );
    }

    #[test]
    fn row_count_matches_step_count() {
        let results: Vec<StepResult> = (0..24).map(make_step).collect();
        // 1 header + 24 data rows
        assert_eq!(render(&results).lines().count(), 25);
    }

    #[test]
    fn deterministic_output() {
        let results: Vec<StepResult> = (0..5).map(make_step).collect();
        assert_eq!(render(&results), render(&results));
    }

    #[test]
    fn rows_parse_back() {
        let results: Vec<StepResult> = (0..3).map(make_step).collect();
        let output = render(&results);

        let mut rdr = csv::ReaderBuilder::new().from_reader(output.as_bytes());
        let headers = rdr.headers().cloned().ok();
        assert_eq!(headers.as_ref().map(csv::StringRecord::len), Some(12));

        let mut row_count = 0;
        for record in rdr.records() {
            let Ok(rec) = record else {
                panic!("every row should parse");
            };
            assert!(DateTime::parse_from_rfc3339(&rec[1]).is_ok(), "timestamp column");
            for i in 2..11 {
                assert!(rec[i].parse::<f64>().is_ok(), "column {i} should parse as f64");
            }
            assert!(rec[11].parse::<bool>().is_ok(), "end_reached should parse as bool");
            row_count += 1;
        }
        assert_eq!(row_count, 3);
    }

    #[test]
    fn timestamps_keep_local_offset() {
        let output = render(&[make_step(0)]);
        assert!(output.contains("2000-08-24T00:00:00-04:00"), "{output}");
    }
}
