mod common;

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{returns, writes_bytes, Fixture, MemoryDocuments, DOWNLOADS_TREE};
use torch_converter::handle::{ChildEntry, DocumentProvider, Location, ResourceHandle};
use torch_converter::runner::STATUS_SUCCESS;
use torch_converter::{
    DocumentPicker, Failure, JobStatus, MemoryBundle, Preset, ProgressSink, Stager, TaskRunner,
    ToastDuration, Workflow,
};

const WAIT: Duration = Duration::from_secs(10);

fn downloads() -> ResourceHandle {
    ResourceHandle::tree_write(Location::Document(DOWNLOADS_TREE.to_string()))
}

fn toast_messages(workflow: &mut Workflow<MemoryBundle>) -> Vec<String> {
    workflow
        .view_mut()
        .take_toasts()
        .into_iter()
        .map(|toast| toast.message)
        .collect()
}

struct FixedPicker {
    document: Option<ResourceHandle>,
    tree: Option<ResourceHandle>,
}

impl DocumentPicker for FixedPicker {
    fn pick_document(&self, _mime_filters: &[&str]) -> Option<ResourceHandle> {
        self.document.clone()
    }

    fn pick_tree(&self) -> Option<ResourceHandle> {
        self.tree.clone()
    }
}

#[test]
fn starship_to_app_directory() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(writes_bytes(12_345));

    workflow.accept_rom(fixture.rom());
    assert_eq!(workflow.view().rom_status, "ROM: Star Fox 64 (U) [!].z64");
    workflow.choose_preset(Preset::Starship);
    assert_eq!(
        workflow.view().config_status,
        "Config: Starship (Star Fox 64) assets loaded"
    );
    assert!(workflow.view().convert_enabled);

    assert!(workflow.convert());
    assert!(workflow.view().progress.visible);
    assert!(workflow.view().torch.is_running());
    assert!(!workflow.view().convert_enabled);
    assert!(workflow.wait_for_completion(WAIT));

    let output = fixture.work_dir().join("sf64.o2r");
    assert_eq!(
        workflow.view().rom_status,
        "Conversion complete! sf64.o2r saved to app directory (12 KB)"
    );
    assert_eq!(
        workflow.last_status(),
        Some(&JobStatus::Success {
            output_path: output.clone(),
            bytes: 12_345,
        })
    );
    assert_eq!(fs::metadata(&output).expect("output").len(), 12_345);

    let toasts = workflow.view_mut().take_toasts();
    let success = toasts.last().expect("success toast");
    assert_eq!(success.duration, ToastDuration::Long);
    assert_eq!(
        success.message,
        format!(
            "sf64.o2r created successfully for Starship!\nLocation: {}",
            fixture.work_dir().display()
        )
    );
}

#[test]
fn spaghetti_exported_to_internal_storage() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(writes_bytes(4_096));

    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Spaghetti);
    workflow.accept_output(downloads());
    assert_eq!(workflow.view().output_status, "Output: Internal Storage/Downloads");

    assert!(workflow.convert());
    assert!(workflow.wait_for_completion(WAIT));

    let local = fs::read(fixture.work_dir().join("mk64.o2r")).expect("local copy");
    let exported = fixture
        .docs
        .read(&MemoryDocuments::child_id(DOWNLOADS_TREE, "mk64.o2r"))
        .expect("exported copy");
    assert_eq!(local, exported);
    assert_eq!(
        workflow.view().rom_status,
        "Conversion complete! mk64.o2r saved to Internal Storage/Downloads (4 KB)"
    );
    assert!(toast_messages(&mut workflow).contains(
        &"mk64.o2r created successfully for Spaghetti Kart!\nSaved to: Internal Storage/Downloads"
            .to_string()
    ));
}

#[test]
fn v64_rom_is_rejected() {
    let fixture = Fixture::new();
    let v64 = "content://downloads/document/raw%3Astarfox.v64";
    fixture.docs.add_file(v64, "starfox.v64", vec![1u8; 64]);
    let mut workflow = fixture.workflow(writes_bytes(1));
    workflow.choose_preset(Preset::Starship);

    workflow.accept_rom(ResourceHandle::file_read(Location::Document(v64.to_string())));

    assert_eq!(
        workflow.view().rom_status,
        "Error: Only .z64 format ROMs are supported"
    );
    assert!(!workflow.readiness().rom_staged());
    assert!(!workflow.view().convert_enabled);
    assert!(!fixture.work_dir().join("baserom.z64").exists());
    assert_eq!(
        toast_messages(&mut workflow),
        vec!["Please select a .z64 format Star Fox 64 ROM"]
    );
}

#[test]
fn converter_failure_reenables_convert() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(returns("bad rom checksum"));
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);

    assert!(workflow.convert());
    assert!(workflow.wait_for_completion(WAIT));

    assert_eq!(
        workflow.last_status(),
        Some(&JobStatus::Failure(Failure::ConversionFailed(
            "bad rom checksum".to_string()
        )))
    );
    assert_eq!(workflow.view().rom_status, "Conversion failed: bad rom checksum");
    assert!(workflow.view().convert_enabled);
    assert!(!workflow.view().progress.visible);
    assert!(!workflow.view().torch.is_running());
    assert_eq!(toast_messages(&mut workflow), vec!["Conversion failed"]);
}

#[test]
fn empty_status_reads_unknown_error() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(returns(""));
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);

    assert!(workflow.convert());
    assert!(workflow.wait_for_completion(WAIT));
    assert_eq!(workflow.view().rom_status, "Conversion failed: Unknown error");
}

#[test]
fn success_without_output_is_missing_output() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(returns(STATUS_SUCCESS));
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);

    assert!(workflow.convert());
    assert!(workflow.wait_for_completion(WAIT));

    assert_eq!(
        workflow.last_status(),
        Some(&JobStatus::Failure(Failure::OutputMissing))
    );
    assert_eq!(
        workflow.view().rom_status,
        "Conversion reported success but no output file found"
    );
    assert_eq!(toast_messages(&mut workflow), vec!["No output file created"]);
    assert!(workflow.view().convert_enabled);
}

#[test]
fn preset_change_requires_restaging() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(writes_bytes(2_048));
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);
    workflow.accept_output(downloads());
    let rom_before = fs::read(fixture.work_dir().join("baserom.z64")).expect("rom");

    workflow.select_preset(Preset::Spaghetti);
    assert_eq!(workflow.view().config_status, "Config: Not selected");
    assert!(!workflow.view().convert_enabled);
    assert!(workflow.readiness().rom_staged());
    assert!(workflow.readiness().output_chosen());

    assert!(!workflow.convert());
    assert_eq!(
        toast_messages(&mut workflow),
        vec!["Please select config directory first"]
    );

    assert!(workflow.stage_config());
    assert!(workflow.view().convert_enabled);
    assert_eq!(
        fs::read(fixture.work_dir().join("baserom.z64")).expect("rom"),
        rom_before
    );
    assert_eq!(
        fs::read_to_string(fixture.work_dir().join("config.yml")).expect("config"),
        "game: mk64\n"
    );
    assert!(!fixture.work_dir().join("assets/yaml").exists());
}

#[test]
fn convert_without_rom_is_refused() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(writes_bytes(1));
    workflow.choose_preset(Preset::Starship);

    assert!(!workflow.convert());
    assert_eq!(toast_messages(&mut workflow), vec!["Please select a ROM first"]);
    assert!(!workflow.readiness().job_in_flight());
}

#[test]
fn failed_export_keeps_local_copy() {
    let fixture = Fixture::new();
    fixture.docs.make_read_only(DOWNLOADS_TREE);
    let mut workflow = fixture.workflow(writes_bytes(3_000));
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);
    workflow.accept_output(downloads());

    assert!(workflow.convert());
    assert!(workflow.wait_for_completion(WAIT));

    assert!(fixture.work_dir().join("sf64.o2r").is_file());
    assert_eq!(
        workflow.view().rom_status,
        "Conversion complete! sf64.o2r saved to app directory (2 KB)"
    );
    assert!(toast_messages(&mut workflow).contains(
        &"sf64.o2r created successfully for Starship!\nSaved to app directory (failed to copy to selected location)"
            .to_string()
    ));
}

#[test]
fn second_convert_while_running_is_ignored() {
    let fixture = Fixture::new();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let mut workflow = fixture.workflow(
        move |_: &Path, output: &Path, _: &Path, _: &ProgressSink| {
            counted.fetch_add(1, Ordering::SeqCst);
            let _ = release_rx.lock().expect("release").recv();
            fs::write(output, b"o2r").expect("output");
            STATUS_SUCCESS.to_string()
        },
    );
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);

    assert!(workflow.convert());
    assert!(!workflow.convert());
    assert!(!workflow.stage_config());

    release_tx.send(()).expect("release");
    assert!(workflow.wait_for_completion(WAIT));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(workflow.view().convert_enabled);
}

#[test]
fn progress_reaches_the_view_in_order() {
    let fixture = Fixture::new();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let mut workflow = fixture.workflow(
        move |_: &Path, output: &Path, _: &Path, progress: &ProgressSink| {
            progress.update_progress("Extracting textures...");
            let _ = release_rx.lock().expect("release").recv();
            fs::write(output, b"o2r").expect("output");
            STATUS_SUCCESS.to_string()
        },
    );
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);
    assert!(workflow.convert());

    let deadline = Instant::now() + WAIT;
    let mut seen = vec![workflow.view().progress.text.clone()];
    while seen.last().map(String::as_str) != Some("Extracting textures...") {
        assert!(Instant::now() < deadline, "progress stalled at {seen:?}");
        workflow.pump();
        let text = &workflow.view().progress.text;
        if seen.last() != Some(text) {
            seen.push(text.clone());
        }
        thread::sleep(Duration::from_millis(1));
    }
    release_tx.send(()).expect("release");
    assert!(workflow.wait_for_completion(WAIT));

    assert_eq!(seen.first().map(String::as_str), Some("Initializing Torch..."));
    let order = [
        "Initializing Torch...",
        "Reading ROM file...",
        "Loading configuration...",
        "Processing assets...",
        "Extracting textures...",
    ];
    let positions = seen
        .iter()
        .map(|text| order.iter().position(|step| step == text).expect("known step"))
        .collect::<Vec<_>>();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(!workflow.view().progress.visible);
}

#[test]
fn pickers_drive_the_same_commands() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(writes_bytes(1_024));
    let picker = FixedPicker {
        document: Some(fixture.rom()),
        tree: Some(downloads()),
    };

    workflow.pick_rom(&picker);
    workflow.choose_preset(Preset::Starship);
    workflow.pick_output(&picker);
    assert!(workflow.rom().is_some());
    assert_eq!(workflow.output(), Some(&downloads()));

    let cancelled = FixedPicker {
        document: None,
        tree: None,
    };
    workflow.pick_rom(&cancelled);
    workflow.pick_output(&cancelled);
    assert!(workflow.view().convert_enabled);
    assert_eq!(workflow.view().output_status, "Output: Internal Storage/Downloads");
}

#[test]
fn read_only_output_handle_is_refused() {
    let fixture = Fixture::new();
    let mut workflow = fixture.workflow(writes_bytes(1));

    workflow.accept_output(ResourceHandle::file_read(Location::Document(
        DOWNLOADS_TREE.to_string(),
    )));
    assert!(!workflow.readiness().output_chosen());
    assert_eq!(workflow.view().output_status, "Output: App directory");
    assert_eq!(
        toast_messages(&mut workflow),
        vec!["Error accessing selected directory"]
    );
}

#[test]
fn custom_config_tree_replaces_bundled_preset() {
    let fixture = Fixture::new();
    let tree = "content://com.android.externalstorage.documents/tree/primary%3Atorch%2Fcustom";
    fixture.docs.add_dir(tree);
    fixture.docs.add_file(
        &MemoryDocuments::child_id(tree, "config.yml"),
        "config.yml",
        "game: custom\n",
    );
    let assets = MemoryDocuments::child_id(tree, "assets");
    fixture.docs.add_dir(&assets);
    fixture.docs.add_file(
        &MemoryDocuments::child_id(&assets, "ship.yaml"),
        "ship.yaml",
        "ship: {}\n",
    );

    let mut workflow = fixture.workflow(writes_bytes(1_024));
    workflow.choose_preset(Preset::Starship);
    assert!(fixture.work_dir().join("include/sf64.h").is_file());

    let picker = FixedPicker {
        document: None,
        tree: Some(ResourceHandle::tree_write(Location::Document(tree.to_string()))),
    };
    workflow.pick_config_tree(&picker);

    assert!(workflow.readiness().config_staged());
    assert_eq!(workflow.view().config_status, "Config: custom loaded");
    assert_eq!(
        fs::read_to_string(fixture.work_dir().join("config.yml")).expect("config"),
        "game: custom\n"
    );
    assert!(fixture.work_dir().join("assets/ship.yaml").is_file());
    assert!(!fixture.work_dir().join("include").exists());
}

#[test]
fn preset_without_assets_fails_before_converting() {
    let fixture = Fixture::new();
    let called = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&called);
    let runner = TaskRunner::new(Arc::new(
        move |_: &Path, _: &Path, _: &Path, _: &ProgressSink| {
            counted.fetch_add(1, Ordering::SeqCst);
            STATUS_SUCCESS.to_string()
        },
    ))
    .with_step_delay(Duration::ZERO);
    let bundle = MemoryBundle::new()
        .with_file("spaghetti/config.yml", "game: mk64\n")
        .with_file("spaghetti/yamls/us/courses.yml", "courses: []\n");
    let docs: Arc<dyn DocumentProvider> = fixture.docs.clone();
    let mut workflow = Workflow::new(Stager::new(fixture.work_dir(), bundle), docs, runner);

    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Spaghetti);
    assert!(workflow.convert());
    assert!(workflow.wait_for_completion(WAIT));

    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert_eq!(
        workflow.view().rom_status,
        "Conversion failed: assets directory not found in selected folder"
    );
    assert!(workflow.view().convert_enabled);
}

/// Delegates to the in-memory store but crashes whenever a document is
/// opened for writing.
struct CrashingWrites(Arc<MemoryDocuments>);

impl DocumentProvider for CrashingWrites {
    fn query_display_name(&self, handle: &ResourceHandle) -> Option<String> {
        self.0.query_display_name(handle)
    }

    fn open_input(&self, handle: &ResourceHandle) -> io::Result<Box<dyn Read + Send>> {
        self.0.open_input(handle)
    }

    fn open_output(&self, _handle: &ResourceHandle) -> io::Result<Box<dyn Write + Send>> {
        panic!("document provider crashed")
    }

    fn can_write(&self, tree: &ResourceHandle) -> bool {
        self.0.can_write(tree)
    }

    fn find_child(&self, tree: &ResourceHandle, name: &str) -> io::Result<Option<ResourceHandle>> {
        self.0.find_child(tree, name)
    }

    fn delete(&self, handle: &ResourceHandle) -> io::Result<bool> {
        self.0.delete(handle)
    }

    fn create_child(
        &self,
        tree: &ResourceHandle,
        mime: &str,
        name: &str,
    ) -> io::Result<Option<ResourceHandle>> {
        self.0.create_child(tree, mime, name)
    }

    fn children(&self, tree: &ResourceHandle) -> io::Result<Vec<ChildEntry>> {
        self.0.children(tree)
    }
}

#[test]
fn crashing_export_still_completes_the_job() {
    let fixture = Fixture::new();
    let runner = TaskRunner::new(Arc::new(writes_bytes(2_048))).with_step_delay(Duration::ZERO);
    let docs: Arc<dyn DocumentProvider> = Arc::new(CrashingWrites(fixture.docs.clone()));
    let mut workflow = Workflow::new(fixture.stager(), docs, runner);
    workflow.accept_rom(fixture.rom());
    workflow.choose_preset(Preset::Starship);
    workflow.accept_output(downloads());

    assert!(workflow.convert());
    assert!(workflow.wait_for_completion(WAIT));

    assert!(!workflow.readiness().job_in_flight());
    assert!(workflow.view().convert_enabled);
    assert!(matches!(
        workflow.last_status(),
        Some(JobStatus::Success { bytes: 2_048, .. })
    ));
    assert_eq!(
        workflow.view().rom_status,
        "Conversion complete! sf64.o2r saved to app directory (2 KB)"
    );
    assert!(fixture.work_dir().join("sf64.o2r").is_file());
    assert!(toast_messages(&mut workflow).contains(
        &"sf64.o2r created successfully for Starship!\nSaved to app directory (failed to copy to selected location)"
            .to_string()
    ));
}
