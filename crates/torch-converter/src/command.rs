use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, error, info};

use crate::runner::{Converter, ProgressSink, STATUS_SUCCESS};
use crate::settings::ConverterCommand;

const ROM_PLACEHOLDER: &str = "{rom}";
const OUTPUT_PLACEHOLDER: &str = "{output}";
const CONFIG_PLACEHOLDER: &str = "{config}";

/// Drives an external converter program.
///
/// The program runs inside the config directory. Every non-empty stdout line
/// is reported as progress; on a non-zero exit the last stderr line becomes
/// the failure reason.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    command: ConverterCommand,
}

impl CommandConverter {
    pub fn new(command: ConverterCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &ConverterCommand {
        &self.command
    }

    fn arguments(&self, rom: &Path, output: &Path, config: &Path) -> Vec<String> {
        let rom = rom.to_string_lossy();
        let output = output.to_string_lossy();
        let config = config.to_string_lossy();
        self.command
            .args
            .iter()
            .map(|arg| {
                arg.replace(ROM_PLACEHOLDER, &rom)
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(CONFIG_PLACEHOLDER, &config)
            })
            .collect()
    }
}

impl Converter for CommandConverter {
    fn convert(&self, rom: &Path, output: &Path, config: &Path, progress: &ProgressSink) -> String {
        let args = self.arguments(rom, output, config);
        info!(program = %self.command.program, ?args, "spawning converter");

        let mut child = match Command::new(&self.command.program)
            .args(&args)
            .current_dir(config)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                error!(program = %self.command.program, error = %err, "failed to spawn converter");
                return err.to_string();
            }
        };

        let stderr = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                let line = line.trim_end();
                if !line.is_empty() {
                    progress.update_progress(line);
                }
            }
        }

        let stderr = stderr
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        let status = match child.wait() {
            Ok(status) => status,
            Err(err) => return err.to_string(),
        };
        debug!(%status, "converter exited");

        if status.success() {
            return STATUS_SUCCESS.to_string();
        }

        stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(str::to_string)
            .unwrap_or_else(|| match status.code() {
                Some(code) => format!("exit status {code}"),
                None => status.to_string(),
            })
    }
}
