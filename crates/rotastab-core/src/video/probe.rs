use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use super::frame::VideoInfo;

/// Read stream metadata with ffprobe.
///
/// Packets are counted rather than trusting the container's `nb_frames`,
/// which is missing or stale for many recordings. Dimensions are reported as
/// displayed, after any rotation metadata is applied.
pub fn probe(ffprobe: &str, path: &Path) -> Result<VideoInfo> {
    info!(?path, "probing video metadata with ffprobe");

    let output = Command::new(ffprobe)
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-count_packets",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_read_packets\
             :stream_tags=rotate:stream_side_data=rotation:format=duration",
            "-of", "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to run {ffprobe}, is ffmpeg installed?"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        bail!("ffprobe failed on {}: {}", path.display(), stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let info = parse_probe_output(&stdout)
        .with_context(|| format!("unexpected ffprobe output for {}", path.display()))?;

    info!(
        width = info.width,
        height = info.height,
        fps = info.fps,
        frame_count = info.frame_count,
        duration_seconds = info.duration_seconds,
        "probe completed"
    );
    Ok(info)
}

/// Container duration in seconds.
pub fn probe_duration(ffprobe: &str, path: &Path) -> Result<f64> {
    let output = Command::new(ffprobe)
        .args([
            "-v", "error",
            "-show_entries", "format=duration",
            "-of", "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to run {ffprobe}, is ffmpeg installed?"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ffprobe failed on {}: {}", path.display(), stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .trim()
        .parse()
        .with_context(|| format!("failed to parse duration {:?}", stdout.trim()))
}

/// Rates above this are treated as timebase artifacts, not real frame rates.
const MAX_PLAUSIBLE_REAL_RATE: f64 = 210.0;
/// An average rate below this makes a timebase-derived `r_frame_rate` suspect.
const MAX_TYPICAL_AVG_RATE: f64 = 70.0;

/// Parse ffprobe `key=value` lines.
pub(crate) fn parse_probe_output(stdout: &str) -> Result<VideoInfo> {
    let mut fields = HashMap::new();
    for line in stdout.lines().map(str::trim) {
        if let Some((key, value)) = line.split_once('=') {
            fields.entry(key).or_insert(value);
        }
    }

    let coded_width: u32 = field(&fields, "width")?.parse().context("failed to parse width")?;
    let coded_height: u32 = field(&fields, "height")?.parse().context("failed to parse height")?;
    if coded_width == 0 || coded_height == 0 {
        bail!("invalid video dimensions: {coded_width}x{coded_height}");
    }

    let rotation = display_rotation(&fields);
    let (width, height) = if rotation % 180 == 90 {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };
    if rotation != 0 {
        info!(rotation, width, height, "applying display rotation to dimensions");
    }

    let real_rate = parse_rate(field(&fields, "r_frame_rate")?)?;
    let avg_rate = fields
        .get("avg_frame_rate")
        .and_then(|raw| parse_rate(raw).ok())
        .unwrap_or(0.0);
    let fps = guess_frame_rate(real_rate, avg_rate);
    if fps.is_nan() || fps <= 0.0 {
        bail!("video has no usable frame rate (r={real_rate}, avg={avg_rate})");
    }

    let duration_seconds = match fields.get("duration").map(|d| d.parse::<f64>()) {
        Some(Ok(d)) => d,
        _ => {
            warn!("duration unavailable, reporting 0");
            0.0
        }
    };

    let packets = fields.get("nb_read_packets").copied().unwrap_or("N/A");
    let frame_count = match packets.parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            let estimate = (duration_seconds * fps).round() as u32;
            warn!(
                raw = packets,
                estimate, "packet count unavailable, estimating from duration"
            );
            estimate
        }
    };

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
        duration_seconds,
    })
}

fn field<'a>(fields: &HashMap<&str, &'a str>, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .copied()
        .with_context(|| format!("ffprobe output has no {key}, is there a video stream?"))
}

/// Pick the stream's nominal rate the way ffmpeg itself guesses it.
///
/// Variable frame rate recordings often report a timebase such as `90000/1`
/// as `r_frame_rate`. When that is implausibly high and the average rate is a
/// typical display rate, the average wins. A missing `r_frame_rate` also
/// falls back to the average.
fn guess_frame_rate(real_rate: f64, avg_rate: f64) -> f64 {
    let usable = |r: f64| r.is_finite() && r > 0.0;
    if !usable(real_rate) {
        return avg_rate;
    }
    if usable(avg_rate) && avg_rate < MAX_TYPICAL_AVG_RATE && real_rate > MAX_PLAUSIBLE_REAL_RATE {
        warn!(real_rate, avg_rate, "r_frame_rate looks like a timebase, using average rate");
        return avg_rate;
    }
    real_rate
}

/// Clockwise display rotation in whole degrees, normalized to `0..360`.
///
/// Newer ffprobe reports it as display matrix side data, older ones as a
/// `rotate` stream tag.
fn display_rotation(fields: &HashMap<&str, &str>) -> i64 {
    let raw = fields
        .get("rotation")
        .or_else(|| fields.get("TAG:rotate"))
        .and_then(|r| r.parse::<f64>().ok())
        .unwrap_or(0.0);
    (raw.round() as i64).rem_euclid(360)
}

fn parse_rate(raw: &str) -> Result<f64> {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.parse().context("failed to parse fps numerator")?;
        let den: f64 = den.parse().context("failed to parse fps denominator")?;
        Ok(if den > 0.0 { num / den } else { 0.0 })
    } else {
        raw.parse().context("failed to parse fps")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(width: u32, height: u32, r: &str, avg: &str, packets: &str, extra: &str) -> String {
        format!(
            "width={width}\nheight={height}\nr_frame_rate={r}\navg_frame_rate={avg}\n\
             nb_read_packets={packets}\n{extra}duration=10.010000\n"
        )
    }

    #[test]
    fn parses_stream_and_format_fields() {
        let info = parse_probe_output(&output(1920, 1080, "60000/1001", "60000/1001", "600", ""))
            .unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.fps - 59.94).abs() < 0.01);
        assert_eq!(info.frame_count, 600);
        assert_eq!(info.duration_seconds, 10.01);
    }

    #[test]
    fn field_order_does_not_matter() {
        let info = parse_probe_output(
            "duration=2.0\nnb_read_packets=60\navg_frame_rate=30/1\n\
             r_frame_rate=30/1\nheight=720\nwidth=1280\n",
        )
        .unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.frame_count, 60);
    }

    #[test]
    fn timebase_rate_of_variable_rate_recording_falls_back_to_average() {
        let info = parse_probe_output(&output(1920, 1080, "90000/1", "1200000/20033", "1200", ""))
            .unwrap();
        assert!((info.fps - 59.9).abs() < 0.01, "fps {}", info.fps);
        assert_eq!(info.frame_count, 1200);
    }

    #[test]
    fn high_real_rate_is_kept_when_average_is_also_high() {
        let info = parse_probe_output(&output(640, 480, "240/1", "240/1", "240", "")).unwrap();
        assert_eq!(info.fps, 240.0);
    }

    #[test]
    fn missing_real_rate_uses_average() {
        let info = parse_probe_output(&output(640, 480, "0/0", "30/1", "30", "")).unwrap();
        assert_eq!(info.fps, 30.0);
    }

    #[test]
    fn rotated_phone_recording_reports_display_dimensions() {
        let info = parse_probe_output(&output(1920, 1080, "60/1", "60/1", "60", "rotation=-90\n"))
            .unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let legacy = parse_probe_output(&output(1920, 1080, "60/1", "60/1", "60", "TAG:rotate=270\n"))
            .unwrap();
        assert_eq!((legacy.width, legacy.height), (1080, 1920));
    }

    #[test]
    fn upside_down_recording_keeps_dimensions() {
        let info = parse_probe_output(&output(1920, 1080, "60/1", "60/1", "60", "rotation=180\n"))
            .unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn estimates_frame_count_without_packet_count() {
        let info = parse_probe_output(
            "width=1280\nheight=720\nr_frame_rate=30/1\nnb_read_packets=N/A\nduration=2.000000\n",
        )
        .unwrap();
        assert_eq!(info.frame_count, 60);
    }

    #[test]
    fn missing_duration_is_zero() {
        let info = parse_probe_output(
            "width=1280\nheight=720\nr_frame_rate=30/1\nnb_read_packets=12\nduration=N/A\n",
        )
        .unwrap();
        assert_eq!(info.duration_seconds, 0.0);
        assert_eq!(info.frame_count, 12);
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(parse_probe_output(&output(1280, 720, "0/0", "0/0", "12", "")).is_err());
    }

    #[test]
    fn rejects_output_without_video_stream() {
        assert!(parse_probe_output("duration=1.0\n").is_err());
        assert!(parse_probe_output("").is_err());
    }

    #[test]
    fn plain_decimal_rate() {
        assert_eq!(parse_rate("59.97").unwrap(), 59.97);
    }
}
