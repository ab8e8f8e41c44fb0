use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use argh::FromArgs;
use colored::Colorize;
use thiserror::Error;

use torch_converter::handle::{Location, ResourceHandle};
use torch_converter::settings::SETTINGS_FILE_NAME;
use torch_converter::{
    init_logging, local_workflow, CommandConverter, ConverterCommand, DocumentPicker, JobStatus,
    Preset, SettingsError, Settings, Toast,
};

#[derive(Debug, FromArgs)]
#[argh(
    description = "Converts a .z64 ROM into an O2R archive with a bundled preset.\nReads converter.toml from the current folder when present:\n\twork_dir = \"torch-workdir\"\n\tassets_dir = \"assets\"\t\t# holds starship/ and spaghetti/\n\tpreset = \"starship\"\n\t[converter]\n\tprogram = \"torch\"\n\targs = [\"o2r\", \"{{rom}}\", \"{{output}}\", \"{{config}}\"]\n"
)]
struct Args {
    /// ROM file to convert (.z64)
    #[argh(option, short = 'r')]
    rom: Option<PathBuf>,
    /// preset to convert with: starship or spaghetti
    #[argh(option, short = 'p')]
    preset: Option<Preset>,
    /// folder to copy the finished archive into
    #[argh(option, short = 'o')]
    output_dir: Option<PathBuf>,
    /// working directory the ROM and config are staged in
    #[argh(option)]
    work_dir: Option<PathBuf>,
    /// folder holding the bundled presets
    #[argh(option)]
    assets: Option<PathBuf>,
    /// settings file (default: ./converter.toml)
    #[argh(option)]
    settings: Option<PathBuf>,
    /// print the working directory contents and exit
    #[argh(switch)]
    list: bool,
    /// converter program, overriding the settings file
    #[argh(option)]
    program: Option<String>,
    /// converter arguments; the rom, output and config placeholders are substituted
    #[argh(positional)]
    converter_args: Vec<String>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to list working directory: {0}")]
    List(#[source] io::Error),
    #[error("{0}")]
    Usage(&'static str),
}

/// Hands the paths given on the command line to the workflow as picker results.
struct ArgsPicker<'a> {
    rom: Option<&'a Path>,
    output_dir: Option<&'a Path>,
}

impl DocumentPicker for ArgsPicker<'_> {
    fn pick_document(&self, _mime_filters: &[&str]) -> Option<ResourceHandle> {
        let rom = self.rom?;
        let handle = ResourceHandle::file_read(Location::LocalPath(rom.to_path_buf()));
        Some(match rom.metadata() {
            Ok(metadata) => handle.with_size(metadata.len()),
            Err(_) => handle,
        })
    }

    fn pick_tree(&self) -> Option<ResourceHandle> {
        self.output_dir
            .map(|dir| ResourceHandle::tree_write(Location::LocalPath(dir.to_path_buf())))
    }
}

fn main() -> ExitCode {
    init_logging("info");
    let args: Args = argh::from_env();

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, CliError> {
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME));
    let mut settings = Settings::load(&settings_path)?;
    apply_overrides(&mut settings, &args);

    if args.list {
        return list_work_dir(&settings);
    }

    let Some(rom) = args.rom.as_deref() else {
        return Err(CliError::Usage("--rom is required unless --list is given"));
    };
    let Some(command) = settings.converter.clone() else {
        return Err(CliError::Usage(
            "no converter configured; pass --program or add a [converter] section",
        ));
    };

    let mut workflow = local_workflow(
        &settings,
        Arc::new(CommandConverter::new(command)),
        None,
    );
    let picker = ArgsPicker {
        rom: Some(rom),
        output_dir: args.output_dir.as_deref(),
    };

    workflow.pick_rom(&picker);
    workflow.choose_preset(settings.preset);
    workflow.pick_output(&picker);
    print_toasts(workflow.view_mut().take_toasts());
    println!("{}", workflow.view().rom_status);
    println!("{}", workflow.view().config_status);
    println!("{}", workflow.view().output_status);

    if !workflow.convert() {
        print_toasts(workflow.view_mut().take_toasts());
        return Ok(ExitCode::FAILURE);
    }
    println!("{}", workflow.view().rom_status.bold());

    let mut last_progress = String::new();
    loop {
        let done = workflow.wait_for_completion(Duration::from_millis(100));
        let progress = &workflow.view().progress;
        if progress.visible && progress.text != last_progress {
            println!("  {}", progress.text.dimmed());
            last_progress = progress.text.clone();
        }
        if done {
            break;
        }
    }

    print_toasts(workflow.view_mut().take_toasts());
    let status = &workflow.view().rom_status;
    match workflow.last_status() {
        Some(JobStatus::Success { .. }) => {
            println!("{}", status.green());
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            println!("{}", status.red());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(work_dir) = &args.work_dir {
        settings.work_dir = work_dir.clone();
    }
    if let Some(assets) = &args.assets {
        settings.assets_dir = assets.clone();
    }
    if let Some(preset) = args.preset {
        settings.preset = preset;
    }
    if let Some(program) = &args.program {
        let mut command = ConverterCommand::new(program.clone());
        if !args.converter_args.is_empty() {
            command.args = args.converter_args.clone();
        }
        settings.converter = Some(command);
    } else if let Some(command) = settings.converter.as_mut() {
        if !args.converter_args.is_empty() {
            command.args = args.converter_args.clone();
        }
    }
}

fn list_work_dir(settings: &Settings) -> Result<ExitCode, CliError> {
    let stager = torch_converter::Stager::new(
        &settings.work_dir,
        torch_converter::DirBundle::new(&settings.assets_dir),
    );
    let entries = stager.list_contents().map_err(CliError::List)?;
    println!("{}", settings.work_dir.display().to_string().bold());
    for entry in entries {
        let indent = "  ".repeat(entry.depth + 1);
        let name = entry
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if entry.is_dir {
            println!("{indent}{}", format!("{name}/").blue());
        } else {
            println!("{indent}{name} ({} bytes)", entry.size);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_toasts(toasts: Vec<Toast>) {
    for toast in toasts {
        println!("{}", toast.message.yellow());
    }
}
