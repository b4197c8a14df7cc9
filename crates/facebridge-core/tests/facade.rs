use facebridge_core::{
    Capabilities, Capability, Credentials, DecodedImage, DetectedFace, EngineConfig,
    EngineProvider, EngineResult, ExtractPurpose, FaceEngine, FaceError, FaceFacade,
    FeatureVector, Gender, ImageLoader, Liveness, PixelBuffer, PixelFormat, ResultCode,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- Scripted engine ---

#[derive(Default)]
struct Calls {
    activate: AtomicUsize,
    create: AtomicUsize,
    detect: AtomicUsize,
    compare: AtomicUsize,
    process: AtomicUsize,
    uninit: AtomicUsize,
}

struct Script {
    activated: bool,
    activation_error: Option<ResultCode>,
    create_error: Option<ResultCode>,
    faces: Vec<DetectedFace>,
    detect_error: Option<ResultCode>,
    process_error: Option<ResultCode>,
    fetch_error: Option<ResultCode>,
    liveness: Vec<Liveness>,
    ages: Vec<i32>,
    genders: Vec<Gender>,
    uninit_error: Option<ResultCode>,
    panic_on_detect: bool,
    last_image: Option<(u32, u32)>,
    last_extract_face: Option<DetectedFace>,
    last_mask: Option<Capabilities>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            activated: false,
            activation_error: None,
            create_error: None,
            faces: vec![face(10, 20), face(200, 40)],
            detect_error: None,
            process_error: None,
            fetch_error: None,
            liveness: Vec::new(),
            ages: Vec::new(),
            genders: Vec::new(),
            uninit_error: None,
            panic_on_detect: false,
            last_image: None,
            last_extract_face: None,
            last_mask: None,
        }
    }
}

fn face(left: i32, top: i32) -> DetectedFace {
    DetectedFace {
        left,
        top,
        right: left + 50,
        bottom: top + 60,
        orient: 1,
    }
}

#[derive(Clone, Default)]
struct Harness {
    calls: Arc<Calls>,
    script: Arc<Mutex<Script>>,
    loads: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
    fail_conversion: Arc<AtomicBool>,
}

impl Harness {
    fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    fn facade(&self) -> FaceFacade {
        FaceFacade::new(
            MockProvider {
                calls: self.calls.clone(),
                script: self.script.clone(),
            },
            EngineConfig::default(),
        )
        .with_loader(CountingLoader {
            loads: self.loads.clone(),
            drops: self.drops.clone(),
            fail_conversion: self.fail_conversion.clone(),
        })
    }

    fn ready_facade(&self) -> FaceFacade {
        let facade = self.facade();
        facade.initialize(&valid_credentials()).expect("initialize");
        facade
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

struct MockProvider {
    calls: Arc<Calls>,
    script: Arc<Mutex<Script>>,
}

impl EngineProvider for MockProvider {
    fn activate(&self, _credentials: &Credentials) -> EngineResult<()> {
        self.calls.activate.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if let Some(code) = script.activation_error {
            return Err(code);
        }
        if script.activated {
            return Err(ResultCode::ALREADY_ACTIVATED);
        }
        script.activated = true;
        Ok(())
    }

    fn create(&self, _config: &EngineConfig) -> EngineResult<Box<dyn FaceEngine>> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.script.lock().unwrap().create_error {
            return Err(code);
        }
        Ok(Box::new(MockEngine {
            calls: self.calls.clone(),
            script: self.script.clone(),
            busy: AtomicBool::new(false),
        }))
    }
}

struct MockEngine {
    calls: Arc<Calls>,
    script: Arc<Mutex<Script>>,
    busy: AtomicBool,
}

impl FaceEngine for MockEngine {
    fn detect_faces(&mut self, image: &PixelBuffer) -> EngineResult<Vec<DetectedFace>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            panic!("engine entered concurrently");
        }
        self.calls.detect.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let mut script = self.script.lock().unwrap();
        script.last_image = Some((image.width(), image.height()));
        let panic_now = script.panic_on_detect;
        let faces = script.faces.clone();
        let detect_error = script.detect_error;
        drop(script);
        self.busy.store(false, Ordering::SeqCst);
        if panic_now {
            panic!("detector crashed");
        }
        detect_error.map_or(Ok(faces), Err)
    }

    fn extract_feature(
        &mut self,
        _image: &PixelBuffer,
        face: &DetectedFace,
        purpose: ExtractPurpose,
    ) -> EngineResult<FeatureVector> {
        self.script.lock().unwrap().last_extract_face = Some(*face);
        let tag = match purpose {
            ExtractPurpose::Register => 0u8,
            ExtractPurpose::Recognize => 1u8,
        };
        Ok(FeatureVector::new(vec![tag, face.left as u8, 0xFF, 0x00]))
    }

    fn compare_features(&mut self, a: &FeatureVector, b: &FeatureVector) -> EngineResult<f32> {
        self.calls.compare.fetch_add(1, Ordering::SeqCst);
        if a.len() != b.len() {
            return Err(ResultCode::INVALID_FEATURE);
        }
        Ok(if a == b { 0.875 } else { 0.125 })
    }

    fn process(
        &mut self,
        _image: &PixelBuffer,
        _faces: &[DetectedFace],
        capabilities: Capabilities,
    ) -> EngineResult<()> {
        self.calls.process.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        script.last_mask = Some(capabilities);
        match script.process_error {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn liveness(&mut self) -> EngineResult<Vec<Liveness>> {
        let script = self.script.lock().unwrap();
        script.fetch_error.map_or(Ok(script.liveness.clone()), Err)
    }

    fn ages(&mut self) -> EngineResult<Vec<i32>> {
        let script = self.script.lock().unwrap();
        script.fetch_error.map_or(Ok(script.ages.clone()), Err)
    }

    fn genders(&mut self) -> EngineResult<Vec<Gender>> {
        let script = self.script.lock().unwrap();
        script.fetch_error.map_or(Ok(script.genders.clone()), Err)
    }

    fn uninit(&mut self) -> EngineResult<()> {
        self.calls.uninit.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().uninit_error {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }
}

// --- Counting image loader ---

struct CountingLoader {
    loads: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
    fail_conversion: Arc<AtomicBool>,
}

impl ImageLoader for CountingLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn DecodedImage>, FaceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if path.to_string_lossy().contains("missing") {
            return Err(FaceError::ImageLoad {
                path: path.to_path_buf(),
                reason: "not found".into(),
            });
        }
        Ok(Box::new(CountingImage {
            drops: self.drops.clone(),
            fail_conversion: self.fail_conversion.load(Ordering::SeqCst),
        }))
    }
}

struct CountingImage {
    drops: Arc<AtomicUsize>,
    fail_conversion: bool,
}

impl DecodedImage for CountingImage {
    fn width(&self) -> u32 {
        8
    }

    fn height(&self) -> u32 {
        4
    }

    fn to_pixel_buffer(&self, format: PixelFormat) -> Result<PixelBuffer, FaceError> {
        if self.fail_conversion {
            return Err(FaceError::FormatConversion {
                format,
                reason: "scripted failure".into(),
            });
        }
        PixelBuffer::new(vec![0; 8 * 4 * 3], 8, 4, format)
    }
}

impl Drop for CountingImage {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn valid_credentials() -> Credentials {
    Credentials::new("Gx7sK2pQ9mWf", "4HqLz8VtR1cN", "")
}

// --- Initialize / shutdown ---

#[test]
fn test_placeholder_credentials_never_activate() {
    let h = Harness::default();
    let facade = h.facade();

    for creds in [
        Credentials::new("YOUR_ARCSOFT_APP_ID", "4HqLz8VtR1cN", ""),
        Credentials::new("Gx7sK2pQ9mWf", "", ""),
        Credentials::new("", "", ""),
    ] {
        let err = facade.initialize(&creds).unwrap_err();
        assert!(matches!(err, FaceError::Credential { .. }), "{err:?}");
        assert_eq!(err.code(), "INVALID_CREDENTIALS");
    }

    assert_eq!(h.calls.activate.load(Ordering::SeqCst), 0);
    assert!(!facade.status().initialized);
}

#[test]
fn test_initialize_twice_is_idempotent() {
    let h = Harness::default();
    let facade = h.facade();

    facade.initialize(&valid_credentials()).unwrap();
    facade.initialize(&valid_credentials()).unwrap();

    assert_eq!(h.calls.activate.load(Ordering::SeqCst), 1);
    assert_eq!(h.calls.create.load(Ordering::SeqCst), 1);
    assert!(facade.status().initialized);
}

#[test]
fn test_initialize_with_live_engine_skips_activation() {
    let h = Harness::default();
    let facade = h.ready_facade();
    h.script(|s| s.activation_error = Some(ResultCode(3)));

    facade.initialize(&valid_credentials()).unwrap();
    facade
        .initialize(&Credentials::new("Zr5tB8nLq2Yc", "7PwKd3JsE6uA", ""))
        .unwrap();
    assert!(facade.status().initialized);
    assert_eq!(h.calls.activate.load(Ordering::SeqCst), 1);

    // Credentials are still checked, and a fresh engine activates again.
    let err = facade
        .initialize(&Credentials::new("YOUR_APP_ID", "7PwKd3JsE6uA", ""))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_CREDENTIALS");

    facade.shutdown().unwrap();
    let err = facade.initialize(&valid_credentials()).unwrap_err();
    assert_eq!(err.code(), "ACTIVE_ERROR");
    assert!(!facade.status().initialized);
}

#[test]
fn test_already_activated_from_previous_process_is_success() {
    let h = Harness::default();
    h.script(|s| s.activated = true);
    let facade = h.facade();

    facade.initialize(&valid_credentials()).unwrap();
    assert!(facade.status().initialized);
}

#[test]
fn test_activation_failure_is_classified() {
    let h = Harness::default();
    h.script(|s| s.activation_error = Some(ResultCode(3)));
    let facade = h.facade();

    let err = facade.initialize(&valid_credentials()).unwrap_err();
    match &err {
        FaceError::Activation { code, kind, message } => {
            assert_eq!(*code, ResultCode(3));
            assert_eq!(*kind, facebridge_core::ActivationFailure::QuotaExceeded);
            assert!(message.contains("quota"));
        }
        other => panic!("expected activation error, got {other:?}"),
    }
    assert_eq!(h.calls.create.load(Ordering::SeqCst), 0);
    assert!(!facade.status().initialized);
}

#[test]
fn test_unknown_activation_code_is_not_swallowed() {
    let h = Harness::default();
    h.script(|s| s.activation_error = Some(ResultCode(555_001)));
    let err = h.facade().initialize(&valid_credentials()).unwrap_err();
    assert_eq!(err.code(), "ACTIVE_ERROR");
    assert!(err.to_string().contains("555001"), "{err}");
}

#[test]
fn test_init_failure_leaves_no_partial_engine() {
    let h = Harness::default();
    h.script(|s| s.create_error = Some(ResultCode::NOT_ACTIVATED));
    let facade = h.facade();

    let err = facade.initialize(&valid_credentials()).unwrap_err();
    assert_eq!(err.code(), "INIT_ERROR");
    assert_eq!(err.result_code(), Some(ResultCode::NOT_ACTIVATED));
    assert!(err.to_string().contains("activation required"));

    let err = facade.detect_faces("/img/a.jpg").unwrap_err();
    assert!(matches!(err, FaceError::NotInitialized));
    assert_eq!(h.loads(), 0);
}

#[test]
fn test_shutdown_without_engine_succeeds() {
    let h = Harness::default();
    h.facade().shutdown().unwrap();
    assert_eq!(h.calls.uninit.load(Ordering::SeqCst), 0);
}

#[test]
fn test_shutdown_returns_to_uninitialized() {
    let h = Harness::default();
    let facade = h.ready_facade();

    facade.shutdown().unwrap();
    assert_eq!(h.calls.uninit.load(Ordering::SeqCst), 1);
    assert!(!facade.status().initialized);
    assert!(matches!(
        facade.detect_faces("/img/a.jpg"),
        Err(FaceError::NotInitialized)
    ));

    // A second shutdown is a no-op.
    facade.shutdown().unwrap();
    assert_eq!(h.calls.uninit.load(Ordering::SeqCst), 1);
}

#[test]
fn test_uninit_failure_surfaces_but_releases_handle() {
    let h = Harness::default();
    let facade = h.ready_facade();
    h.script(|s| s.uninit_error = Some(ResultCode::BAD_STATE));

    let err = facade.shutdown().unwrap_err();
    assert_eq!(err.code(), "UNINIT_ERROR");
    assert!(!facade.status().initialized);

    // Re-initialization creates a fresh engine.
    h.script(|s| s.uninit_error = None);
    facade.initialize(&valid_credentials()).unwrap();
    assert_eq!(h.calls.create.load(Ordering::SeqCst), 2);
}

// --- Ordering ---

#[test]
fn test_operations_before_initialize_never_decode() {
    let h = Harness::default();
    let facade = h.facade();
    let feature = FeatureVector::new(vec![1, 2, 3]).to_base64();

    let errors = vec![
        facade.detect_faces("/img/a.jpg").unwrap_err(),
        facade
            .extract_feature("/img/a.jpg", ExtractPurpose::Register)
            .unwrap_err(),
        facade.compare_features(&feature, &feature).unwrap_err(),
        facade.check_liveness("/img/a.jpg").unwrap_err(),
        facade.estimate_age("/img/a.jpg").unwrap_err(),
        facade.estimate_gender("/img/a.jpg").unwrap_err(),
    ];

    for err in errors {
        assert!(matches!(err, FaceError::NotInitialized), "{err:?}");
        assert_eq!(err.code(), "ENGINE_NOT_INIT");
    }
    assert_eq!(h.loads(), 0);
    assert_eq!(h.calls.compare.load(Ordering::SeqCst), 0);
}

// --- Detection and extraction ---

#[test]
fn test_detect_with_no_faces_is_empty_success() {
    let h = Harness::default();
    h.script(|s| s.faces.clear());
    let facade = h.ready_facade();

    let faces = facade.detect_faces("/img/empty.jpg").unwrap();
    assert!(faces.is_empty());
    assert_eq!((h.loads(), h.drops()), (1, 1));
}

#[test]
fn test_detect_returns_engine_faces() {
    let h = Harness::default();
    let facade = h.ready_facade();

    let faces = facade.detect_faces("/img/two.jpg").unwrap();
    assert_eq!(faces, vec![face(10, 20), face(200, 40)]);
}

#[test]
fn test_extract_with_no_faces_fails() {
    let h = Harness::default();
    h.script(|s| s.faces.clear());
    let facade = h.ready_facade();

    let err = facade
        .extract_feature("/img/empty.jpg", ExtractPurpose::Recognize)
        .unwrap_err();
    assert!(matches!(err, FaceError::NoFaceDetected));
    assert_eq!(err.code(), "NO_FACE");
    assert_eq!(h.drops(), 1);
}

#[test]
fn test_failed_detection_is_no_face_in_per_face_pipelines() {
    let h = Harness::default();
    h.script(|s| s.detect_error = Some(ResultCode::UNKNOWN));
    let facade = h.ready_facade();

    let errors = vec![
        facade
            .extract_feature("/img/a.jpg", ExtractPurpose::Register)
            .unwrap_err(),
        facade.check_liveness("/img/a.jpg").unwrap_err(),
        facade.estimate_age("/img/a.jpg").unwrap_err(),
        facade.estimate_gender("/img/a.jpg").unwrap_err(),
    ];
    for err in errors {
        assert!(matches!(err, FaceError::NoFaceDetected), "{err:?}");
        assert_eq!(err.code(), "NO_FACE");
    }
    assert_eq!(h.calls.process.load(Ordering::SeqCst), 0);

    // Plain detection still reports the engine failure.
    let err = facade.detect_faces("/img/a.jpg").unwrap_err();
    assert_eq!(err.code(), "DETECT_ERROR");
    assert_eq!(err.result_code(), Some(ResultCode::UNKNOWN));
    assert_eq!(h.drops(), h.loads());
}

#[test]
fn test_extract_uses_first_face_and_encodes() {
    let h = Harness::default();
    let facade = h.ready_facade();

    let text = facade
        .extract_feature("/img/two.jpg", ExtractPurpose::Recognize)
        .unwrap();
    let bytes = FeatureVector::from_base64(&text).unwrap().into_bytes();
    assert_eq!(bytes, vec![1, 10, 0xFF, 0x00]);
    assert_eq!(h.script.lock().unwrap().last_extract_face, Some(face(10, 20)));
}

#[test]
fn test_load_failure_is_image_load_error() {
    let h = Harness::default();
    let facade = h.ready_facade();

    let err = facade.detect_faces("/img/missing.jpg").unwrap_err();
    assert_eq!(err.code(), "IMAGE_LOAD_ERROR");
    assert_eq!(h.drops(), 0);
    assert_eq!(h.calls.detect.load(Ordering::SeqCst), 0);
}

#[test]
fn test_conversion_failure_releases_image() {
    let h = Harness::default();
    h.fail_conversion.store(true, Ordering::SeqCst);
    let facade = h.ready_facade();

    let err = facade.estimate_age("/img/a.jpg").unwrap_err();
    assert!(matches!(err, FaceError::FormatConversion { .. }));
    assert_eq!((h.loads(), h.drops()), (1, 1));
    assert_eq!(h.calls.detect.load(Ordering::SeqCst), 0);
}

#[test]
fn test_every_path_releases_image_exactly_once() {
    let h = Harness::default();
    let facade = h.ready_facade();

    let _ = facade.detect_faces("/img/a.jpg");
    let _ = facade.extract_feature("/img/a.jpg", ExtractPurpose::Register);
    let _ = facade.check_liveness("/img/a.jpg");
    h.script(|s| s.process_error = Some(ResultCode::UNSUPPORTED));
    let _ = facade.estimate_age("/img/a.jpg");
    h.script(|s| s.faces.clear());
    let _ = facade.estimate_gender("/img/a.jpg");
    let _ = facade.extract_feature("/img/a.jpg", ExtractPurpose::Recognize);

    assert_eq!(h.loads(), 6);
    assert_eq!(h.drops(), 6);
}

// --- Comparison ---

#[test]
fn test_compare_rejects_empty_inputs_before_engine() {
    let h = Harness::default();
    let facade = h.ready_facade();
    let feature = FeatureVector::new(vec![9, 9]).to_base64();

    let err = facade.compare_features("", &feature).unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMETER");
    assert!(err.to_string().contains("first"));

    let err = facade.compare_features(&feature, "  ").unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMETER");
    assert!(err.to_string().contains("second"));

    assert_eq!(h.calls.compare.load(Ordering::SeqCst), 0);
}

#[test]
fn test_compare_returns_engine_score() {
    let h = Harness::default();
    let facade = h.ready_facade();
    let a = facade
        .extract_feature("/img/a.jpg", ExtractPurpose::Register)
        .unwrap();
    let b = facade
        .extract_feature("/img/b.jpg", ExtractPurpose::Register)
        .unwrap();

    assert_eq!(facade.compare_features(&a, &b).unwrap(), 0.875);
    let other = FeatureVector::new(vec![7, 7, 7, 7]).to_base64();
    assert_eq!(facade.compare_features(&a, &other).unwrap(), 0.125);
}

#[test]
fn test_compare_engine_failure_and_bad_encoding() {
    let h = Harness::default();
    let facade = h.ready_facade();
    let short = FeatureVector::new(vec![1]).to_base64();
    let long = FeatureVector::new(vec![1, 2, 3]).to_base64();

    let err = facade.compare_features(&short, &long).unwrap_err();
    assert_eq!(err.code(), "COMPARE_ERROR");
    assert_eq!(err.result_code(), Some(ResultCode::INVALID_FEATURE));

    let err = facade.compare_features("@@not-base64@@", &long).unwrap_err();
    assert_eq!(err.code(), "COMPARE_ERROR");
    assert_eq!(h.calls.compare.load(Ordering::SeqCst), 1);
}

// --- Liveness / age / gender ---

#[test]
fn test_analysis_defaults_on_empty_results() {
    let h = Harness::default();
    let facade = h.ready_facade();

    assert!(!facade.check_liveness("/img/a.jpg").unwrap());
    assert_eq!(facade.estimate_age("/img/a.jpg").unwrap(), 0);
    assert_eq!(facade.estimate_gender("/img/a.jpg").unwrap(), Gender::Unknown);
}

#[test]
fn test_analysis_defaults_when_fetch_fails() {
    let h = Harness::default();
    h.script(|s| {
        s.ages = vec![40];
        s.fetch_error = Some(ResultCode::BAD_STATE);
    });
    let facade = h.ready_facade();

    assert_eq!(facade.estimate_age("/img/a.jpg").unwrap(), 0);
}

#[test]
fn test_analysis_reads_first_face() {
    let h = Harness::default();
    h.script(|s| {
        s.liveness = vec![Liveness::Alive, Liveness::NotAlive];
        s.ages = vec![37, 12];
        s.genders = vec![Gender::Female, Gender::Male];
    });
    let facade = h.ready_facade();

    assert!(facade.check_liveness("/img/a.jpg").unwrap());
    assert_eq!(facade.estimate_age("/img/a.jpg").unwrap(), 37);
    assert_eq!(facade.estimate_gender("/img/a.jpg").unwrap(), Gender::Female);
}

#[test]
fn test_liveness_unknown_is_not_alive() {
    let h = Harness::default();
    h.script(|s| s.liveness = vec![Liveness::Unknown]);
    let facade = h.ready_facade();
    assert!(!facade.check_liveness("/img/a.jpg").unwrap());
}

#[test]
fn test_analysis_runs_single_capability_pass() {
    let h = Harness::default();
    let facade = h.ready_facade();

    facade.estimate_gender("/img/a.jpg").unwrap();
    let mask = h.script.lock().unwrap().last_mask.unwrap();
    assert!(mask.contains(Capability::Gender));
    assert_eq!(mask.iter().count(), 1);
}

#[test]
fn test_analysis_process_failure() {
    let h = Harness::default();
    h.script(|s| s.process_error = Some(ResultCode::UNSUPPORTED));
    let facade = h.ready_facade();

    let err = facade.check_liveness("/img/a.jpg").unwrap_err();
    match &err {
        FaceError::Processing { capability, code, .. } => {
            assert_eq!(*capability, Capability::Liveness);
            assert_eq!(*code, Some(ResultCode::UNSUPPORTED));
        }
        other => panic!("expected processing error, got {other:?}"),
    }
}

#[test]
fn test_analysis_without_faces_fails() {
    let h = Harness::default();
    h.script(|s| s.faces.clear());
    let facade = h.ready_facade();

    assert!(matches!(
        facade.estimate_gender("/img/a.jpg"),
        Err(FaceError::NoFaceDetected)
    ));
    assert_eq!(h.calls.process.load(Ordering::SeqCst), 0);
}

// --- Fault containment and serialization ---

#[test]
fn test_engine_panic_is_reclassified() {
    let h = Harness::default();
    h.script(|s| s.panic_on_detect = true);
    let facade = h.ready_facade();

    let err = facade.detect_faces("/img/a.jpg").unwrap_err();
    assert_eq!(err.code(), "DETECT_ERROR");
    assert!(err.to_string().contains("detector crashed"));

    let err = facade.estimate_age("/img/a.jpg").unwrap_err();
    assert_eq!(err.code(), "PROCESS_ERROR");

    h.script(|s| s.panic_on_detect = false);
    assert_eq!(facade.detect_faces("/img/a.jpg").unwrap().len(), 2);
    assert_eq!(h.drops(), h.loads());
}

#[test]
fn test_concurrent_calls_are_serialized() {
    let h = Harness::default();
    let facade = Arc::new(h.ready_facade());

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let facade = facade.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    facade.detect_faces("/img/a.jpg").unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(h.calls.detect.load(Ordering::SeqCst), 40);
}

// --- Real decoder ---

#[test]
fn test_file_decoder_feeds_aligned_bgr24() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portrait.png");
    image::RgbImage::from_pixel(10, 7, image::Rgb([90, 120, 150]))
        .save(&path)
        .unwrap();

    let h = Harness::default();
    let facade = FaceFacade::new(
        MockProvider {
            calls: h.calls.clone(),
            script: h.script.clone(),
        },
        EngineConfig::default(),
    );
    facade.initialize(&valid_credentials()).unwrap();

    facade.detect_faces(&path).unwrap();
    assert_eq!(h.script.lock().unwrap().last_image, Some((8, 6)));

    let err = facade.detect_faces(dir.path().join("absent.png")).unwrap_err();
    assert_eq!(err.code(), "IMAGE_LOAD_ERROR");
}
