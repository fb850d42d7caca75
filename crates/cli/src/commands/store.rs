//! Store inspection commands.

use super::{CliError, Shell};

impl Shell {
    /// Print every stored key with its raw value.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the medium is disabled.
    #[allow(clippy::print_stdout)]
    pub fn store_dump(&self) -> Result<(), CliError> {
        let entries = self.profile.snapshot()?;
        if let Some(path) = self.profile.backing_path() {
            println!("# {}", path.display());
        }
        for (key, value) in &entries {
            println!("{key} = {value}");
        }
        Ok(())
    }
}
