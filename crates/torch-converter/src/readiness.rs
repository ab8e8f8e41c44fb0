/// Which inputs of a conversion are in place.
///
/// `output_chosen` is informational only: without a destination the artifact
/// stays in the working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    rom_staged: bool,
    config_staged: bool,
    output_chosen: bool,
    job_in_flight: bool,
}

impl Readiness {
    pub fn rom_staged(&self) -> bool {
        self.rom_staged
    }

    pub fn config_staged(&self) -> bool {
        self.config_staged
    }

    pub fn output_chosen(&self) -> bool {
        self.output_chosen
    }

    pub fn job_in_flight(&self) -> bool {
        self.job_in_flight
    }

    pub fn can_convert(&self) -> bool {
        self.rom_staged && self.config_staged && !self.job_in_flight
    }

    pub fn rom_imported(&mut self) {
        self.rom_staged = true;
    }

    /// A failed re-import leaves the slot in an unknown state.
    pub fn rom_import_failed(&mut self) {
        self.rom_staged = false;
    }

    pub fn config_staged_ok(&mut self) {
        self.config_staged = true;
    }

    /// Staged config no longer matches the selected preset.
    pub fn preset_changed(&mut self) {
        self.config_staged = false;
    }

    /// Staging purged the previous config before failing.
    pub fn config_lost(&mut self) {
        self.config_staged = false;
    }

    pub fn output_accepted(&mut self) {
        self.output_chosen = true;
    }

    pub fn job_started(&mut self) {
        self.job_in_flight = true;
    }

    pub fn job_finished(&mut self) {
        self.job_in_flight = false;
    }
}
