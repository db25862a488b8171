//! In-memory device platform.
//!
//! Every simulated device records what was asked of it, so tests can assert on
//! acquire/release balance, request counts and late callbacks. Outcomes can be
//! queued ahead of time or held open with a oneshot sender and resolved later.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::encoding::{encode_jpeg, EncodedImage};

use super::{
    BackendError, FacingMode, Geolocation, GeolocationError, HostContext, MediaDevices,
    MediaError, MediaStream, PermissionName, PermissionQueryError, PermissionStatus,
    Permissions, Platform, Position, PositionOptions, Resolution, SceneBackend,
    ScriptError, ScriptHost, VideoConstraints,
};

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Scripted<T> {
    Ready(T),
    Held(oneshot::Receiver<T>),
}

/// Deterministic test pattern used for every simulated frame.
pub fn test_pattern(resolution: Resolution) -> RgbaImage {
    let Resolution { width, height } = resolution;
    RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgba([r, g, 96, 255])
    })
}

pub struct SimulatedCamera {
    resolution: Resolution,
    outcomes: Mutex<VecDeque<Scripted<Result<(), MediaError>>>>,
    playback_failures: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<VideoConstraints>>,
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
    snapshots: Arc<AtomicUsize>,
}

impl SimulatedCamera {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            outcomes: Mutex::new(VecDeque::new()),
            playback_failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            snapshots: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue the outcome of the next stream request. Requests with nothing
    /// queued are granted.
    pub fn push_outcome(&self, outcome: Result<(), MediaError>) {
        lock(&self.outcomes).push_back(Scripted::Ready(outcome));
    }

    /// Hold the next stream request open until the returned sender resolves it.
    pub fn hold_next(&self) -> oneshot::Sender<Result<(), MediaError>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.outcomes).push_back(Scripted::Held(rx));
        tx
    }

    pub fn fail_next_playback(&self, reason: &str) {
        lock(&self.playback_failures).push_back(reason.to_string());
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn open_streams(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    /// Frames taken from any stream this camera handed out.
    pub fn snapshots(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_constraints(&self) -> Option<VideoConstraints> {
        lock(&self.requests).last().copied()
    }
}

#[async_trait]
impl MediaDevices for SimulatedCamera {
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError> {
        lock(&self.requests).push(*constraints);
        let scripted = lock(&self.outcomes).pop_front();
        match scripted {
            None => {}
            Some(Scripted::Ready(outcome)) => outcome?,
            Some(Scripted::Held(rx)) => rx.await.unwrap_or(Err(MediaError::Aborted))?,
        }

        self.acquired.fetch_add(1, Ordering::SeqCst);
        let playback_failure = lock(&self.playback_failures).pop_front();
        Ok(Box::new(SimulatedStream {
            id: Uuid::new_v4().to_string(),
            resolution: self.resolution,
            facing: constraints.facing.unwrap_or_default(),
            playback_failure,
            playing: false,
            stopped: false,
            released: Arc::clone(&self.released),
            snapshots: Arc::clone(&self.snapshots),
        }))
    }
}

pub struct SimulatedStream {
    id: String,
    resolution: Resolution,
    facing: FacingMode,
    playback_failure: Option<String>,
    playing: bool,
    stopped: bool,
    released: Arc<AtomicUsize>,
    snapshots: Arc<AtomicUsize>,
}

impl SimulatedStream {
    pub fn facing(&self) -> FacingMode {
        self.facing
    }
}

impl MediaStream for SimulatedStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if let Some(reason) = self.playback_failure.take() {
            return Err(MediaError::Playback(reason));
        }
        self.playing = true;
        Ok(())
    }

    fn snapshot(&self) -> Result<RgbaImage, MediaError> {
        if self.stopped || !self.playing {
            return Err(MediaError::Other("stream is not playing".into()));
        }
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(test_pattern(self.resolution))
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.playing = false;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

type PositionResult = Result<Position, GeolocationError>;

pub struct SimulatedGeolocation {
    scripted: Mutex<VecDeque<Scripted<PositionResult>>>,
    /// Answer when nothing is scripted; `None` never resolves.
    fallback: Option<PositionResult>,
    calls: AtomicUsize,
}

impl SimulatedGeolocation {
    pub fn fixed(latitude: f64, longitude: f64) -> Self {
        Self::with_fallback(Some(Ok(Position {
            latitude,
            longitude,
            accuracy_m: Some(5.0),
        })))
    }

    pub fn failing(err: GeolocationError) -> Self {
        Self::with_fallback(Some(Err(err)))
    }

    pub fn never_resolves() -> Self {
        Self::with_fallback(None)
    }

    fn with_fallback(fallback: Option<PositionResult>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, result: PositionResult) {
        lock(&self.scripted).push_back(Scripted::Ready(result));
    }

    pub fn hold_next(&self) -> oneshot::Sender<PositionResult> {
        let (tx, rx) = oneshot::channel();
        lock(&self.scripted).push_back(Scripted::Held(rx));
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geolocation for SimulatedGeolocation {
    async fn current_position(&self, _options: &PositionOptions) -> PositionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = lock(&self.scripted).pop_front();
        match scripted {
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Held(rx)) => match rx.await {
                Ok(result) => result,
                Err(_) => std::future::pending().await,
            },
            None => match self.fallback {
                Some(result) => result,
                None => std::future::pending().await,
            },
        }
    }
}

pub struct SimulatedPermissions {
    answers: HashMap<PermissionName, Result<PermissionStatus, PermissionQueryError>>,
}

impl SimulatedPermissions {
    pub fn all(status: PermissionStatus) -> Self {
        let mut answers = HashMap::new();
        answers.insert(PermissionName::Camera, Ok(status));
        answers.insert(PermissionName::Geolocation, Ok(status));
        Self { answers }
    }

    pub fn with(
        mut self,
        name: PermissionName,
        answer: Result<PermissionStatus, PermissionQueryError>,
    ) -> Self {
        self.answers.insert(name, answer);
        self
    }
}

#[async_trait]
impl Permissions for SimulatedPermissions {
    async fn query(&self, name: PermissionName) -> Result<PermissionStatus, PermissionQueryError> {
        self.answers
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Err(PermissionQueryError(format!("{name:?} not queryable"))))
    }
}

#[derive(Default)]
pub struct SimulatedScriptHost {
    present: Mutex<HashSet<String>>,
    injections: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    load_delay: Mutex<Option<Duration>>,
}

impl SimulatedScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a script as already present in the document.
    pub fn preload(&self, src: &str) {
        lock(&self.present).insert(src.to_string());
    }

    pub fn fail_on(&self, src: &str) {
        lock(&self.failing).insert(src.to_string());
    }

    pub fn hang_on(&self, src: &str) {
        lock(&self.hanging).insert(src.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *lock(&self.load_delay) = Some(delay);
    }

    pub fn injections(&self) -> Vec<String> {
        lock(&self.injections).clone()
    }
}

#[async_trait]
impl ScriptHost for SimulatedScriptHost {
    fn is_injected(&self, src: &str) -> bool {
        lock(&self.present).contains(src)
    }

    async fn inject(&self, src: &str) -> Result<(), ScriptError> {
        lock(&self.injections).push(src.to_string());
        let delay = *lock(&self.load_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let hangs = lock(&self.hanging).contains(src);
        if hangs {
            std::future::pending::<()>().await;
        }
        let fails = lock(&self.failing).contains(src);
        if fails {
            return Err(ScriptError {
                src: src.to_string(),
                reason: "network error".into(),
            });
        }
        lock(&self.present).insert(src.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct SimulatedScene {
    mounted: Mutex<Option<String>>,
    mounts: AtomicUsize,
    unmounts: AtomicUsize,
}

impl SimulatedScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted_markup(&self) -> Option<String> {
        lock(&self.mounted).clone()
    }

    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    pub fn unmounts(&self) -> usize {
        self.unmounts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SceneBackend for SimulatedScene {
    fn mount(&self, markup: &str) -> Result<(), BackendError> {
        *lock(&self.mounted) = Some(markup.to_string());
        self.mounts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unmount(&self) {
        if lock(&self.mounted).take().is_some() {
            self.unmounts.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn screenshot(&self) -> Result<EncodedImage, BackendError> {
        let mounted = lock(&self.mounted).is_some();
        if !mounted {
            return Err(BackendError("no scene mounted".into()));
        }
        encode_jpeg(&test_pattern(Resolution::new(64, 48)), 80)
            .map_err(|err| BackendError(err.to_string()))
    }
}

/// A complete simulated device with a working camera, a fixed position and
/// every permission granted.
pub struct SimulatedPlatform {
    pub host: HostContext,
    pub camera: Arc<SimulatedCamera>,
    pub geolocation: Arc<SimulatedGeolocation>,
    pub permissions: Option<Arc<SimulatedPermissions>>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self {
            host: HostContext::new("https:", "civicsnap.local", DESKTOP_USER_AGENT),
            camera: Arc::new(SimulatedCamera::new(Resolution::new(640, 480))),
            geolocation: Arc::new(SimulatedGeolocation::fixed(40.7128, -74.0060)),
            permissions: Some(Arc::new(SimulatedPermissions::all(PermissionStatus::Granted))),
        }
    }

    pub fn with_camera(mut self, camera: SimulatedCamera) -> Self {
        self.camera = Arc::new(camera);
        self
    }

    pub fn with_geolocation(mut self, geolocation: SimulatedGeolocation) -> Self {
        self.geolocation = Arc::new(geolocation);
        self
    }

    pub fn with_permissions(mut self, permissions: SimulatedPermissions) -> Self {
        self.permissions = Some(Arc::new(permissions));
        self
    }

    pub fn without_permissions_api(mut self) -> Self {
        self.permissions = None;
        self
    }

    pub fn platform(&self) -> Platform {
        Platform {
            host: self.host.clone(),
            media: Some(self.camera.clone() as Arc<dyn MediaDevices>),
            geolocation: Some(self.geolocation.clone() as Arc<dyn Geolocation>),
            permissions: self
                .permissions
                .clone()
                .map(|permissions| permissions as Arc<dyn Permissions>),
        }
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}
