//! Engine without a renderer.
//!
//! Loads read the referenced file with `tokio::fs` on a background runtime and
//! complete when the bytes arrive. Scene operations only track residency, which
//! is enough to drive the loader from tools and to inspect it remotely.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::catalog::DocNode;
use crate::core::{Result, Vec3};

use super::{
    Engine, EngineHandle, FactoryRequest, LightSetup, LoadStatus, LoadTicket, MaterialBinding,
    MeshRequest, PortalSetup, SectorSetup, TextureRequest,
};

/// Residency counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct HeadlessStats {
    pub sectors: usize,
    pub attached_meshes: usize,
    pub portals: usize,
    pub lights: usize,
    pub materials: usize,
    pub loads_started: usize,
    pub loads_failed: usize,
    pub bytes_loaded: u64,
}

type LoadReply = std::result::Result<u64, String>;

pub struct HeadlessEngine {
    base_dir: PathBuf,
    next_id: u64,
    in_flight: HashMap<LoadTicket, oneshot::Receiver<LoadReply>>,
    /// Loads that completed at request time, handed out on first poll
    finished: HashMap<LoadTicket, LoadStatus>,
    sectors: HashSet<EngineHandle>,
    attached: HashSet<EngineHandle>,
    portals: HashSet<EngineHandle>,
    lights: HashSet<EngineHandle>,
    stats: HeadlessStats,
    handle: Handle,
    /// Owned runtime (None when running on a caller-provided runtime)
    #[allow(dead_code)]
    runtime: Option<Runtime>,
}

impl HeadlessEngine {
    /// Create an engine with its own runtime. File paths resolve against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sectorstream-io")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::build(base_dir.into(), handle, Some(runtime)))
    }

    /// Create an engine that spawns its reads on an existing runtime.
    pub fn with_handle(base_dir: impl Into<PathBuf>, handle: Handle) -> Self {
        Self::build(base_dir.into(), handle, None)
    }

    fn build(base_dir: PathBuf, handle: Handle, runtime: Option<Runtime>) -> Self {
        Self {
            base_dir,
            next_id: 0,
            in_flight: HashMap::new(),
            finished: HashMap::new(),
            sectors: HashSet::new(),
            attached: HashSet::new(),
            portals: HashSet::new(),
            lights: HashSet::new(),
            stats: HeadlessStats::default(),
            handle,
            runtime,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn stats(&self) -> HeadlessStats {
        let mut stats = self.stats.clone();
        stats.sectors = self.sectors.len();
        stats.attached_meshes = self.attached.len();
        stats.portals = self.portals.len();
        stats.lights = self.lights.len();
        stats
    }

    /// Number of loads that have not been observed as finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn next_handle(&mut self) -> EngineHandle {
        self.next_id += 1;
        EngineHandle(self.next_id)
    }

    /// Start reading `file`, or finish immediately when there is nothing to read.
    fn start_load(&mut self, name: &str, file: Option<&str>) -> LoadTicket {
        self.next_id += 1;
        let ticket = LoadTicket(self.next_id);
        self.stats.loads_started += 1;

        let Some(file) = file else {
            let handle = self.next_handle();
            self.finished.insert(ticket, LoadStatus::Loaded(handle));
            return ticket;
        };

        let path = self.base_dir.join(file);
        log::trace!("Reading '{}' for {}", path.display(), name);
        let (tx, rx) = oneshot::channel();
        self.handle.spawn(async move {
            let reply = match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes.len() as u64),
                Err(e) => Err(format!("{}: {}", path.display(), e)),
            };
            let _ = tx.send(reply);
        });
        self.in_flight.insert(ticket, rx);
        ticket
    }
}

/// The `file` child of a catalog node, if any.
fn file_of(node: &DocNode) -> Option<&str> {
    node.child("file").and_then(DocNode::text)
}

impl Engine for HeadlessEngine {
    fn request_texture(&mut self, request: &TextureRequest) -> LoadTicket {
        self.start_load(&request.name, request.file.as_deref())
    }

    fn request_mesh_factory(&mut self, request: &FactoryRequest) -> LoadTicket {
        let file = file_of(&request.source).map(str::to_owned);
        self.start_load(&request.name, file.as_deref())
    }

    fn request_mesh(&mut self, request: &MeshRequest) -> LoadTicket {
        self.start_load(&request.name, None)
    }

    fn poll(&mut self, ticket: LoadTicket) -> LoadStatus {
        if let Some(status) = self.finished.remove(&ticket) {
            return status;
        }
        let Some(rx) = self.in_flight.get_mut(&ticket) else {
            return LoadStatus::Failed(format!("unknown ticket {:?}", ticket));
        };
        let status = match rx.try_recv() {
            Err(TryRecvError::Empty) => return LoadStatus::Pending,
            Ok(Ok(bytes)) => {
                self.stats.bytes_loaded += bytes;
                LoadStatus::Loaded(self.next_handle())
            }
            Ok(Err(message)) => {
                self.stats.loads_failed += 1;
                LoadStatus::Failed(message)
            }
            Err(TryRecvError::Closed) => {
                self.stats.loads_failed += 1;
                LoadStatus::Failed("load task dropped".into())
            }
        };
        self.in_flight.remove(&ticket);
        status
    }

    fn bind_material(&mut self, _binding: &MaterialBinding) -> EngineHandle {
        self.stats.materials += 1;
        self.next_handle()
    }

    fn create_sector(&mut self, setup: &SectorSetup) -> EngineHandle {
        let handle = self.next_handle();
        log::trace!("Engine sector '{}' -> {:?}", setup.name, handle);
        self.sectors.insert(handle);
        handle
    }

    fn destroy_sector(&mut self, sector: EngineHandle) {
        self.sectors.remove(&sector);
    }

    fn attach_mesh(&mut self, mesh: EngineHandle, _sector: EngineHandle, _position: Vec3) {
        self.attached.insert(mesh);
    }

    fn detach_mesh(&mut self, mesh: EngineHandle) {
        self.attached.remove(&mesh);
    }

    fn release(&mut self, _handle: EngineHandle) {}

    fn create_portal(&mut self, _from: EngineHandle, _to: EngineHandle, _setup: &PortalSetup) -> EngineHandle {
        let handle = self.next_handle();
        self.portals.insert(handle);
        handle
    }

    fn remove_portal(&mut self, portal: EngineHandle) {
        self.portals.remove(&portal);
    }

    fn add_light(&mut self, _sector: EngineHandle, _setup: &LightSetup) -> EngineHandle {
        let handle = self.next_handle();
        self.lights.insert(handle);
        handle
    }

    fn remove_light(&mut self, light: EngineHandle) {
        self.lights.remove(&light);
    }

    fn preload_shader(&mut self, file: &str) {
        log::debug!("Shader preload requested: {}", file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait(engine: &mut HeadlessEngine, ticket: LoadTicket) -> LoadStatus {
        let start = Instant::now();
        loop {
            let status = engine.poll(ticket);
            if status != LoadStatus::Pending || start.elapsed() > Duration::from_secs(5) {
                return status;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn texture(name: &str, file: Option<&str>) -> TextureRequest {
        TextureRequest {
            name: name.into(),
            file: file.map(str::to_owned),
            class: None,
            params: DocNode::new("texture"),
        }
    }

    #[test]
    fn test_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stone.png"), [0u8; 64]).unwrap();

        let mut engine = HeadlessEngine::new(dir.path()).unwrap();
        let ticket = engine.request_texture(&texture("stone", Some("stone.png")));
        assert!(matches!(wait(&mut engine, ticket), LoadStatus::Loaded(_)));
        assert_eq!(engine.stats().bytes_loaded, 64);
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_consumed_loads_are_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stone.png"), [0u8; 8]).unwrap();

        let mut engine = HeadlessEngine::new(dir.path()).unwrap();
        let read = engine.request_texture(&texture("stone", Some("stone.png")));
        let procedural: Vec<LoadTicket> = (0..100)
            .map(|i| engine.request_texture(&texture(&format!("p{}", i), None)))
            .collect();
        assert_eq!(engine.finished.len(), 100);

        assert!(matches!(wait(&mut engine, read), LoadStatus::Loaded(_)));
        for ticket in procedural {
            assert!(matches!(engine.poll(ticket), LoadStatus::Loaded(_)));
        }
        assert!(engine.finished.is_empty());
        assert_eq!(engine.in_flight(), 0);

        // A ticket is answered once
        assert!(matches!(engine.poll(read), LoadStatus::Failed(_)));
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = HeadlessEngine::new(dir.path()).unwrap();
        let ticket = engine.request_texture(&texture("ghost", Some("ghost.png")));
        assert!(matches!(wait(&mut engine, ticket), LoadStatus::Failed(_)));
        assert_eq!(engine.stats().loads_failed, 1);
    }

    #[test]
    fn test_no_file_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = HeadlessEngine::new(dir.path()).unwrap();
        let ticket = engine.request_texture(&texture("procedural", None));
        assert!(matches!(engine.poll(ticket), LoadStatus::Loaded(_)));
    }

    #[test]
    fn test_residency_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = HeadlessEngine::new(dir.path()).unwrap();
        let setup = |name: &str| SectorSetup {
            name: name.into(),
            ambient: None,
            culler: None,
        };
        let a = engine.create_sector(&setup("A"));
        let b = engine.create_sector(&setup("B"));
        let portal = engine.create_portal(
            a,
            b,
            &PortalSetup {
                name: "P".into(),
                polygon: Vec::new(),
                offset: Vec3::ZERO,
            },
        );
        assert_eq!(engine.stats().sectors, 2);
        assert_eq!(engine.stats().portals, 1);

        engine.remove_portal(portal);
        engine.destroy_sector(b);
        assert_eq!(engine.stats().sectors, 1);
        assert_eq!(engine.stats().portals, 0);
    }
}
