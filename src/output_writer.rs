use crate::time_index::Frequency;
use crate::CellOutput;
use chrono::NaiveDateTime;
use csv::WriterBuilder;
use std::io::Write;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// One row per cell and input period, with a units row under the headings.
///
/// The energy unit follows the first cell: Wh for hourly input, otherwise
/// mean Wh per day; the frequency column says which applies to each row.
pub fn write_period_output(writer: impl Write, outputs: &[&CellOutput]) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    let energy_units = match outputs.first().map(|output| output.frequency) {
        Some(Frequency::Hourly) => "[Wh]",
        _ => "[Wh/day]",
    };
    writer.write_record(["lat", "lon", "time", "frequency", "pv_output"])?;
    writer.write_record(["[deg]", "[deg]", "[-]", "[-]", energy_units])?;

    for output in outputs {
        for period in &output.periods {
            writer.write_record(&[
                output.latitude.to_string(),
                output.longitude.to_string(),
                format_timestamp(&period.timestamp),
                output.frequency.to_string(),
                period.energy.to_string(),
            ])?;
        }
    }

    debug!("flushing out period CSV");
    writer.flush()?;
    Ok(())
}

/// One row per cell and synthesised hour.
pub fn write_hourly_output(writer: impl Write, outputs: &[&CellOutput]) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    writer.write_record([
        "lat",
        "lon",
        "time",
        "global_horizontal",
        "direct_horizontal",
        "diffuse_horizontal",
        "plane_direct",
        "plane_diffuse",
        "pv_output",
    ])?;
    writer.write_record([
        "[deg]", "[deg]", "[-]", "[W/m2]", "[W/m2]", "[W/m2]", "[W/m2]", "[W/m2]", "[Wh]",
    ])?;

    for output in outputs {
        for (t_idx, timestamp) in output.hourly.timestamps.iter().enumerate() {
            let (direct, diffuse) = output.horizontal[t_idx];
            let plane = output.plane_irradiance[t_idx];
            writer.write_record(&[
                output.latitude.to_string(),
                output.longitude.to_string(),
                format_timestamp(timestamp),
                output.hourly.global_horizontal[t_idx].to_string(),
                direct.to_string(),
                diffuse.to_string(),
                plane.direct.to_string(),
                plane.diffuse.to_string(),
                output.ac_output[t_idx].to_string(),
            ])?;
        }
    }

    debug!("flushing out hourly CSV");
    writer.flush()?;
    Ok(())
}
