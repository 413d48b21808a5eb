//! Typed audio filter chains.
//!
//! Each `Filter` renders to one ffmpeg filtergraph element; a
//! `FilterChain` joins them with commas in order.

use std::fmt;

use crate::planning::{LoudnessMeasurement, LoudnessTarget};

/// Sample rate of the pivot format.
pub const PIVOT_SAMPLE_RATE: u32 = 48_000;

/// Channel layout of the pivot format.
pub const PIVOT_CHANNEL_LAYOUT: &str = "mono";

/// Channel count matching `PIVOT_CHANNEL_LAYOUT`.
pub const PIVOT_CHANNELS: u32 = 1;

/// Direction of a fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    In,
    Out,
}

impl FadeKind {
    fn as_str(&self) -> &'static str {
        match self {
            FadeKind::In => "in",
            FadeKind::Out => "out",
        }
    }
}

/// How loudnorm reports its statistics on the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintFormat {
    Json,
    Summary,
}

impl PrintFormat {
    fn as_str(&self) -> &'static str {
        match self {
            PrintFormat::Json => "json",
            PrintFormat::Summary => "summary",
        }
    }
}

/// Parameters for an EBU R128 loudnorm pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnormParams {
    pub target: LoudnessTarget,
    /// First-pass statistics, present only on the corrective pass.
    pub measured: Option<LoudnessMeasurement>,
    pub linear: bool,
    pub print_format: PrintFormat,
}

/// A single element of an audio filtergraph.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Fix sample format (32-bit float), rate and layout.
    Format { sample_rate: u32, channel_layout: &'static str },
    /// Pitch-preserving tempo change; output duration = input / tempo.
    Tempo(f64),
    Loudnorm(LoudnormParams),
    /// Linear fade.
    Fade {
        kind: FadeKind,
        start_secs: f64,
        duration_secs: f64,
    },
    /// Append silence.
    Pad { duration_secs: f64 },
    /// Hard cut to `[0, end_secs]`.
    Trim { end_secs: f64 },
    /// Rebase presentation timestamps from zero.
    RebaseTimestamps,
}

impl Filter {
    /// Pivot format filter (mono / 48 kHz / float).
    pub fn pivot_format() -> Self {
        Filter::Format {
            sample_rate: PIVOT_SAMPLE_RATE,
            channel_layout: PIVOT_CHANNEL_LAYOUT,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Format {
                sample_rate,
                channel_layout,
            } => write!(
                f,
                "aformat=sample_fmts=flt:sample_rates={}:channel_layouts={}",
                sample_rate, channel_layout
            ),
            Filter::Tempo(tempo) => write!(f, "atempo={:.8}", tempo),
            Filter::Loudnorm(params) => {
                write!(
                    f,
                    "loudnorm=I={}:LRA={}:TP={}",
                    params.target.integrated_lufs,
                    params.target.loudness_range_lu,
                    params.target.true_peak_dbtp
                )?;
                if let Some(ref m) = params.measured {
                    write!(
                        f,
                        ":measured_I={}:measured_LRA={}:measured_TP={}:measured_thresh={}:offset={}",
                        m.input_i, m.input_lra, m.input_tp, m.input_thresh, m.target_offset
                    )?;
                }
                if params.linear {
                    f.write_str(":linear=true")?;
                }
                write!(f, ":print_format={}", params.print_format.as_str())
            }
            Filter::Fade {
                kind,
                start_secs,
                duration_secs,
            } => write!(
                f,
                "afade=t={}:st={:.6}:d={:.6}:curve=tri",
                kind.as_str(),
                start_secs,
                duration_secs
            ),
            Filter::Pad { duration_secs } => write!(f, "apad=pad_dur={:.6}", duration_secs),
            Filter::Trim { end_secs } => write!(f, "atrim=0:{:.6}", end_secs),
            Filter::RebaseTimestamps => f.write_str("asetpts=N/SR/TB"),
        }
    }
}

/// Ordered list of filters applied in one engine invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter.
    pub fn push(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Append a filter (builder pattern).
    pub fn with(mut self, filter: Filter) -> Self {
        self.push(filter);
        self
    }

    /// Filters in application order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }
}

impl From<Vec<Filter>> for FilterChain {
    fn from(filters: Vec<Filter>) -> Self {
        Self { filters }
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_and_tempo_render() {
        let chain = FilterChain::new()
            .with(Filter::pivot_format())
            .with(Filter::Tempo(1.0 / 0.9));
        assert_eq!(
            chain.to_string(),
            "aformat=sample_fmts=flt:sample_rates=48000:channel_layouts=mono,atempo=1.11111111"
        );
    }

    #[test]
    fn measurement_loudnorm_renders() {
        let f = Filter::Loudnorm(LoudnormParams {
            target: LoudnessTarget::default(),
            measured: None,
            linear: false,
            print_format: PrintFormat::Json,
        });
        assert_eq!(f.to_string(), "loudnorm=I=-23:LRA=7:TP=-1:print_format=json");
    }

    #[test]
    fn corrective_loudnorm_feeds_back_measurements() {
        let f = Filter::Loudnorm(LoudnormParams {
            target: LoudnessTarget::default(),
            measured: Some(LoudnessMeasurement {
                input_i: -27.5,
                input_lra: 5.2,
                input_tp: -4.1,
                input_thresh: -38.0,
                target_offset: 0.25,
            }),
            linear: true,
            print_format: PrintFormat::Summary,
        });
        assert_eq!(
            f.to_string(),
            "loudnorm=I=-23:LRA=7:TP=-1:measured_I=-27.5:measured_LRA=5.2:measured_TP=-4.1:\
             measured_thresh=-38:offset=0.25:linear=true:print_format=summary"
        );
    }

    #[test]
    fn fit_filters_render() {
        let chain = FilterChain::from(vec![
            Filter::Pad {
                duration_secs: 0.01,
            },
            Filter::Trim { end_secs: 9.0 },
            Filter::RebaseTimestamps,
        ]);
        assert_eq!(
            chain.to_string(),
            "apad=pad_dur=0.010000,atrim=0:9.000000,asetpts=N/SR/TB"
        );
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn fade_renders_linear_curve() {
        let f = Filter::Fade {
            kind: FadeKind::Out,
            start_secs: 8.99,
            duration_secs: 0.01,
        };
        assert_eq!(f.to_string(), "afade=t=out:st=8.990000:d=0.010000:curve=tri");
    }
}
