// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! YAML configuration.

use std::path::Path;

use config::{Config, File};

mod error;
mod synth;

pub use self::error::ConfigError;
pub use self::synth::{OutputLayout, SynthConfig};

/// Loads the synthesizer configuration from a YAML file.
pub fn load(path: &Path) -> Result<SynthConfig, ConfigError> {
    Ok(Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize()?)
}

#[cfg(test)]
mod test {
    use std::{fs, time::Duration};

    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfsynth.yaml");
        fs::write(&path, "max_voices: 32\nkill_fade: 80ms\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.max_voices(), 32);
        assert_eq!(config.kill_fade().unwrap(), Duration::from_millis(80));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
    }
}
