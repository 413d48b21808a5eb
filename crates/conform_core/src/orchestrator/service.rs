//! Conform service: runs one request through the standard pipeline.
//!
//! The service owns the collaborators (engine, fetcher, store) and the
//! settings. Each call gets a fresh scratch directory that is removed on
//! every exit path, and its own logger.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::Settings;
use crate::engine::{FfmpegEngine, MediaEngine};
use crate::logging::{JobLoggerBuilder, LogConfig, LogSink};
use crate::models::{ConformRequest, ConformResult};
use crate::source::{HttpFetcher, SourceFetcher};
use crate::store::{FsResultStore, ResultStore, StoreResult};

use super::errors::{PipelineError, PipelineResult, StepError};
use super::types::{Context, JobState, ProgressCallback};
use super::create_standard_pipeline;

/// Runs conform requests.
///
/// # Example
///
/// ```ignore
/// let service = ConformService::from_settings(settings)?;
/// let result = service.conform(ConformRequest::new("https://host/clip.wav", 9_000))?;
/// println!("{} ms", result.final_duration_ms);
/// ```
#[derive(Clone)]
pub struct ConformService {
    settings: Settings,
    engine: Arc<dyn MediaEngine>,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn ResultStore>,
}

impl ConformService {
    pub fn new(
        settings: Settings,
        engine: Arc<dyn MediaEngine>,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            settings,
            engine,
            fetcher,
            store,
        }
    }

    /// Build the production collaborators from settings.
    pub fn from_settings(settings: Settings) -> StoreResult<Self> {
        let engine = FfmpegEngine::new()
            .with_ffmpeg_path(&settings.tools.ffmpeg_path)
            .with_ffprobe_path(&settings.tools.ffprobe_path);
        let fetcher = HttpFetcher::new(Duration::from_secs(settings.sources.fetch_timeout_secs))
            .allow_local_files(settings.sources.allow_local_files);
        let store = FsResultStore::new(
            &settings.paths.store_folder,
            &settings.encoding.artifact_prefix,
        )?;

        Ok(Self::new(
            settings,
            Arc::new(engine),
            Arc::new(fetcher),
            Arc::new(store),
        ))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Shared handle to the result store (for retrieval).
    pub fn store(&self) -> Arc<dyn ResultStore> {
        Arc::clone(&self.store)
    }

    /// Conform one request.
    pub fn conform(&self, request: ConformRequest) -> PipelineResult<ConformResult> {
        self.conform_with(request, None, None)
    }

    /// Conform one request, forwarding log lines and progress to callbacks.
    pub fn conform_with(
        &self,
        request: ConformRequest,
        sink: Option<LogSink>,
        progress: Option<ProgressCallback>,
    ) -> PipelineResult<ConformResult> {
        let job_id = Uuid::new_v4().simple().to_string();
        let job_name = format!("conform_{}", &job_id[..8]);

        // Rejected requests never reach the engine or the fetcher
        request
            .validate(&self.settings.request_limits())
            .map_err(|message| {
                tracing::info!(job = %job_name, "Rejected request: {}", message);
                PipelineError::validation_failed(&job_name, message)
            })?;

        let temp_root = PathBuf::from(&self.settings.paths.temp_root);
        fs::create_dir_all(&temp_root).map_err(|e| {
            PipelineError::setup_failed(&job_name, format!("creating temp root: {}", e))
        })?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}_", job_name))
            .tempdir_in(&temp_root)
            .map_err(|e| {
                PipelineError::setup_failed(&job_name, format!("creating scratch dir: {}", e))
            })?;

        let mut logger = JobLoggerBuilder::new(&job_name)
            .config(LogConfig::from(&self.settings.logging));
        if self.settings.logging.job_log_files {
            logger = logger.log_dir(&self.settings.paths.logs_folder);
        }
        if let Some(sink) = sink {
            logger = logger.sink(sink);
        }
        let logger = Arc::new(logger.build().map_err(|e| {
            PipelineError::setup_failed(&job_name, format!("creating logger: {}", e))
        })?);

        let mut ctx = Context::new(
            request,
            self.settings.clone(),
            &job_name,
            scratch.path().to_path_buf(),
            Arc::clone(&self.engine),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.store),
            Arc::clone(&logger),
        );
        if let Some(callback) = progress {
            ctx = ctx.with_progress_callback(callback);
        }

        logger.info(&format!(
            "Starting job {}: {} -> {} ms ({})",
            job_id,
            ctx.request.audio_url,
            ctx.target_ms(),
            ctx.request.format_out
        ));

        let mut state = JobState::new(&job_id);
        let outcome = create_standard_pipeline().run(&ctx, &mut state);

        let result = outcome.and_then(|_| {
            state.conform_result().ok_or_else(|| {
                PipelineError::step_failed(
                    &job_name,
                    "Publish",
                    StepError::invalid_output("pipeline finished without a published artifact"),
                )
            })
        });

        match &result {
            Ok(done) => logger.success(&format!(
                "Conformed to {} ms (factor {:.6}, correction {:.6})",
                done.final_duration_ms, done.factor, done.factor_correction
            )),
            Err(e) => {
                let reached = state.stage().map_or("nothing", |stage| stage.as_str());
                logger.error(&format!("Job failed (last stage reached: {}): {}", reached, e));
            }
        }
        logger.close();

        if let Err(e) = scratch.close() {
            tracing::warn!(job = %job_name, "Failed to remove scratch directory: {}", e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::engine::{Encoding, Filter, OutputTarget};
    use crate::logging::LogLevel;
    use crate::models::OutputFormat;
    use crate::orchestrator::errors::ErrorKind;
    use crate::planning::LoudnessError;
    use crate::store::StoreError;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        _dir: TempDir,
        source: PathBuf,
        temp_root: PathBuf,
        store_root: PathBuf,
        engine: Arc<ScriptedEngine>,
        service: ConformService,
    }

    fn harness(engine: ScriptedEngine, source_ms: u64) -> Harness {
        harness_with(engine, source_ms, |_| {})
    }

    fn harness_with(
        engine: ScriptedEngine,
        source_ms: u64,
        adjust: impl FnOnce(&mut Settings),
    ) -> Harness {
        let dir = tempdir().unwrap();
        let source = dir.path().join("clip.wav");
        ScriptedEngine::write_clip(&source, source_ms).unwrap();

        let mut settings = Settings::default();
        settings.paths.temp_root = dir.path().join("temp").to_string_lossy().to_string();
        settings.paths.store_folder = dir.path().join("out").to_string_lossy().to_string();
        adjust(&mut settings);

        let temp_root = PathBuf::from(&settings.paths.temp_root);
        let store_root = PathBuf::from(&settings.paths.store_folder);
        let engine = Arc::new(engine);
        let store = FsResultStore::new(&store_root, "chronique").unwrap();
        let service = ConformService::new(
            settings,
            engine.clone(),
            Arc::new(HttpFetcher::default().allow_local_files(true)),
            Arc::new(store),
        );

        Harness {
            _dir: dir,
            source,
            temp_root,
            store_root,
            engine,
            service,
        }
    }

    impl Harness {
        fn request(&self, target_ms: i64) -> ConformRequest {
            ConformRequest::new(self.source.to_string_lossy(), target_ms)
        }

        fn tempo_calls(&self) -> Vec<f64> {
            self.engine
                .calls()
                .iter()
                .flat_map(|c| c.filters.filters().to_vec())
                .filter_map(|f| match f {
                    Filter::Tempo(t) => Some(t),
                    _ => None,
                })
                .collect()
        }

        fn published(&self) -> usize {
            fs::read_dir(&self.store_root).map(|d| d.count()).unwrap_or(0)
        }

        fn scratch_left(&self) -> usize {
            fs::read_dir(&self.temp_root).map(|d| d.count()).unwrap_or(0)
        }
    }

    #[test]
    fn conforms_ten_seconds_to_nine() {
        let h = harness(ScriptedEngine::new(), 10_000);
        let result = h.service.conform(h.request(9_000)).unwrap();

        assert_eq!(result.final_duration_ms, 9_000);
        assert!((result.factor - 0.9).abs() < 1e-12);
        assert!((result.factor_correction - 1.0).abs() < 1e-9);
        assert_eq!(result.input_duration_ms, 10_000);
        assert_eq!(result.post_norm_ms, 9_000);
        assert_eq!(result.format, OutputFormat::Mp3);
        assert!(result.artifact_id.starts_with("chronique_"));
        assert!(result.artifact_id.ends_with("_9000.mp3"));

        let stored = h.service.store().get(&result.artifact_id).unwrap();
        assert_eq!(stored.content_type(), "audio/mpeg");
        assert_eq!(h.scratch_left(), 0);
    }

    #[test]
    fn issues_requests_in_pipeline_order() {
        let h = harness(ScriptedEngine::new(), 10_000);
        h.service.conform(h.request(9_000)).unwrap();

        let calls = h.engine.calls();
        // pivot, stretch, correct, measure, normalize, encode (no fit needed)
        assert_eq!(calls.len(), 6);
        assert!(calls[0].filters.is_empty());
        assert!(matches!(calls[1].filters.filters()[0], Filter::Format { .. }));
        assert!(matches!(calls[1].filters.filters()[1], Filter::Tempo(_)));
        assert_eq!(calls[3].output, OutputTarget::Null);
        assert!(calls[4].filters.to_string().contains("linear=true"));
        assert!(matches!(
            calls[5].output,
            OutputTarget::File {
                encoding: Encoding::Mp3 { bitrate_kbps: 192 },
                ..
            }
        ));
    }

    #[test]
    fn stretch_bounds_are_inclusive() {
        let h = harness(ScriptedEngine::new(), 10_000);
        let low = h.service.conform(h.request(8_000)).unwrap();
        assert_eq!(low.final_duration_ms, 8_000);

        let high = h.service.conform(h.request(12_500)).unwrap();
        assert_eq!(high.final_duration_ms, 12_500);
        assert!((high.factor - 1.25).abs() < 1e-12);
    }

    #[test]
    fn out_of_bounds_rejected_before_any_stretch() {
        let h = harness(ScriptedEngine::new(), 10_000);
        let err = h.service.conform(h.request(7_000)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        assert_eq!(err.step_name(), Some("Stretch"));
        assert_eq!(err.client_message(), "Stretch factor 0.700 outside [0.8,1.25]");
        // Only the pivot conversion ran
        assert_eq!(h.engine.calls().len(), 1);
        assert!(h.tempo_calls().is_empty());
        assert_eq!(h.published(), 0);
        assert_eq!(h.scratch_left(), 0);
    }

    #[test]
    fn widened_settings_keep_fixed_limits() {
        let h = harness_with(ScriptedEngine::new(), 100_000, |settings| {
            settings.stretch.min_factor = 0.1;
            settings.stretch.max_factor = 5.0;
            settings.fitting.max_target_ms = 900_000;
            settings.fitting.verify_tolerance_ms = 500;
        });

        let err = h.service.conform(h.request(400_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(h.engine.calls().is_empty());

        let err = h.service.conform(h.request(150_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        assert_eq!(err.client_message(), "Stretch factor 1.500 outside [0.8,1.25]");
        assert!(h.tempo_calls().is_empty());
        assert_eq!(h.published(), 0);
    }

    #[test]
    fn widened_verify_tolerance_still_fails_drift() {
        let h = harness_with(ScriptedEngine::new().with_encode_drift(5), 10_000, |settings| {
            settings.fitting.verify_tolerance_ms = 500;
        });
        let err = h.service.conform(h.request(9_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(h.published(), 0);
    }

    #[test]
    fn zero_length_source_is_out_of_bounds() {
        let h = harness(ScriptedEngine::new(), 0);
        let err = h.service.conform(h.request(9_000)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        assert_eq!(err.step_name(), Some("Stretch"));
        assert_eq!(h.engine.calls().len(), 1);
        assert!(h.tempo_calls().is_empty());
        assert_eq!(h.published(), 0);
        assert_eq!(h.scratch_left(), 0);
    }

    #[test]
    fn failure_log_names_last_stage_reached() {
        let h = harness(ScriptedEngine::new(), 10_000);
        let lines = Arc::new(parking_lot::Mutex::new(Vec::<(LogLevel, String)>::new()));
        let l = lines.clone();

        h.service
            .conform_with(
                h.request(7_000),
                Some(Box::new(move |level: LogLevel, msg: &str| {
                    l.lock().push((level, msg.to_string()))
                })),
                None,
            )
            .unwrap_err();

        let lines = lines.lock();
        let (level, msg) = lines
            .iter()
            .find(|(_, m)| m.starts_with("Job failed"))
            .expect("failure line");
        assert_eq!(*level, LogLevel::Error);
        assert!(msg.starts_with("Job failed (last stage reached: pivoted): "), "{}", msg);
    }

    #[test]
    fn invalid_target_never_reaches_engine() {
        let h = harness(ScriptedEngine::new(), 10_000);
        for target in [0, -5, 180_001] {
            let err = h.service.conform(h.request(target)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(
                err.client_message(),
                "target_duration_ms out of bounds (0, 180000]"
            );
        }
        assert!(h.engine.calls().is_empty());
        assert_eq!(h.scratch_left(), 0);
    }

    #[test]
    fn correction_uses_measured_first_pass() {
        let h = harness(ScriptedEngine::new().with_step1_drift(7), 10_000);
        let result = h.service.conform(h.request(9_000)).unwrap();

        let expected = 9_000.0 / 9_007.0;
        assert!((result.factor_correction - expected).abs() < 1e-12);

        let tempos = h.tempo_calls();
        assert_eq!(tempos.len(), 2);
        assert!((tempos[1] - 9_007.0 / 9_000.0).abs() < 1e-12);
        assert_eq!(result.final_duration_ms, 9_000);
    }

    #[test]
    fn short_signal_is_padded_then_trimmed() {
        let h = harness(ScriptedEngine::new().with_norm_drift(-10), 10_000);
        let result = h.service.conform(h.request(9_000)).unwrap();

        assert_eq!(result.post_norm_ms, 8_990);
        assert_eq!(result.final_duration_ms, 9_000);

        let fit_call = h
            .engine
            .calls()
            .into_iter()
            .find(|c| c.filters.filters().iter().any(|f| matches!(f, Filter::Trim { .. })))
            .unwrap();
        assert_eq!(
            fit_call.filters.to_string(),
            "apad=pad_dur=0.010000,atrim=0:9.000000,asetpts=N/SR/TB"
        );
    }

    #[test]
    fn long_signal_is_trimmed_only() {
        let h = harness(ScriptedEngine::new().with_norm_drift(5), 10_000);
        let result = h.service.conform(h.request(9_000)).unwrap();

        assert_eq!(result.post_norm_ms, 9_005);
        assert_eq!(result.final_duration_ms, 9_000);
        let calls = h.engine.calls();
        assert!(!calls
            .iter()
            .any(|c| c.filters.filters().iter().any(|f| matches!(f, Filter::Pad { .. }))));
    }

    #[test]
    fn no_fit_request_within_two_ms() {
        let h = harness(ScriptedEngine::new().with_norm_drift(-1), 10_000);
        let result = h.service.conform(h.request(9_000)).unwrap();

        assert_eq!(result.final_duration_ms, 8_999);
        assert!(!h
            .engine
            .calls()
            .iter()
            .any(|c| c.filters.filters().iter().any(|f| matches!(f, Filter::Trim { .. }))));
    }

    #[test]
    fn unfitted_two_ms_gap_fails_verification() {
        let h = harness(ScriptedEngine::new().with_norm_drift(-2), 10_000);
        let err = h.service.conform(h.request(9_000)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.step_name(), Some("Verify"));
        assert_eq!(h.published(), 0);
    }

    #[test]
    fn encoder_drift_fails_verification() {
        let h = harness(ScriptedEngine::new().with_encode_drift(5), 10_000);
        let err = h.service.conform(h.request(9_000)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(err.client_message().contains("9005 ms vs target 9000 ms"));
        assert_eq!(h.published(), 0);
        assert_eq!(h.scratch_left(), 0);
    }

    #[test]
    fn wav_output_is_copied_not_encoded() {
        let h = harness(ScriptedEngine::new().with_encode_drift(50), 10_000);
        let result = h
            .service
            .conform(h.request(9_000).with_format(OutputFormat::Wav))
            .unwrap();

        assert_eq!(result.final_duration_ms, 9_000);
        assert!(result.artifact_id.ends_with(".wav"));
        assert!(!h
            .engine
            .calls()
            .iter()
            .any(|c| matches!(c.output, OutputTarget::File { encoding: Encoding::Mp3 { .. }, .. })));
    }

    #[test]
    fn engine_failure_carries_diagnostics() {
        let h = harness(ScriptedEngine::new().failing_on_call(2), 10_000);
        let err = h.service.conform(h.request(9_000)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(err.step_name(), Some("Correct"));
        assert!(err.client_message().contains("scripted failure on call 2"));
        assert_eq!(h.scratch_left(), 0);
    }

    #[test]
    fn missing_statistics_block_is_analysis_error() {
        let h = harness(
            ScriptedEngine::new().with_measurement_stderr("size=N/A time=00:00:09.00"),
            10_000,
        );
        let err = h.service.conform(h.request(9_000)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Analysis);
        match err {
            PipelineError::StepFailed {
                source: StepError::Analysis(inner),
                ..
            } => assert_eq!(inner, LoudnessError::BlockNotFound),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn unreachable_source_is_download_error() {
        let h = harness(ScriptedEngine::new(), 10_000);
        let err = h
            .service
            .conform(ConformRequest::new("/nonexistent/clip.wav", 9_000))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Download);
        assert!(h.engine.calls().is_empty());
    }

    #[test]
    fn replay_is_deterministic() {
        let h = harness(
            ScriptedEngine::new().with_step1_drift(3).with_norm_drift(-4),
            12_000,
        );
        let first = h.service.conform(h.request(11_000)).unwrap();
        let second = h.service.conform(h.request(11_000)).unwrap();

        assert_eq!(first.final_duration_ms, second.final_duration_ms);
        assert_eq!(first.factor, second.factor);
        assert_eq!(first.factor_correction, second.factor_correction);
        assert_ne!(first.artifact_id, second.artifact_id);
        assert_eq!(h.published(), 2);
    }

    #[test]
    fn sink_and_progress_receive_updates() {
        let h = harness(ScriptedEngine::new(), 10_000);
        let lines = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let steps = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let (l, s) = (lines.clone(), steps.clone());

        h.service
            .conform_with(
                h.request(9_000),
                Some(Box::new(move |_: LogLevel, msg: &str| {
                    l.lock().push(msg.to_string())
                })),
                Some(Box::new(move |step: &str, _: u32, _: &str| {
                    s.lock().push(step.to_string())
                })),
            )
            .unwrap();

        assert!(lines.lock().iter().any(|m| m == "=== Stretch ==="));
        let steps = steps.lock();
        assert_eq!(steps.first().map(String::as_str), Some("Acquire"));
        assert_eq!(steps.last().map(String::as_str), Some("Complete"));
    }

    #[test]
    fn unknown_artifact_is_not_found() {
        let h = harness(ScriptedEngine::new(), 10_000);
        assert!(matches!(
            h.service.store().get("chronique_missing_9000.mp3"),
            Err(StoreError::NotFound(_))
        ));
    }
}
