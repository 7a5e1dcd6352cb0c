use crate::load::Library;
use crate::mode::{OpenMode, RawMode};
use crate::platform::Platform;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// How the open mode is written in a library description: either the raw
/// integer or a list of flag names such as `["now", "global"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeSpec {
    Raw(i64),
    Flags(Vec<String>),
}

impl ModeSpec {
    pub fn to_mode(&self) -> Result<OpenMode> {
        match self {
            ModeSpec::Raw(bits) => {
                let bits = RawMode::try_from(*bits)
                    .map_err(|_| anyhow!("Mode exceeds the range of C int: {}", bits))?;
                Ok(OpenMode::from_raw(bits))
            }
            ModeSpec::Flags(names) => names.iter().try_fold(OpenMode::empty(), |acc, name| {
                OpenMode::from_name(name)
                    .map(|mode| acc | mode)
                    .ok_or_else(|| anyhow!("Unknown mode flag: {}", name))
            }),
        }
    }
}

/// A JSON description of a library to open.
///
/// ```json
/// { "path": "libfoo", "mode": ["now", "local"], "platform": "linux" }
/// ```
///
/// Every field is optional: a missing `path` means the current process,
/// a missing `mode` the default mode, a missing `platform` the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub mode: Option<ModeSpec>,
    #[serde(default)]
    pub platform: Option<String>,
}

impl LibraryConfig {
    pub fn from_str(s: &str) -> Result<Self> {
        let res: LibraryConfig = serde_json::from_str(s)?;

        // Fail on bad values here rather than at open time.
        res.mode()?;
        res.platform()?;

        Ok(res)
    }

    pub fn to_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_str(&s)
    }

    pub fn mode(&self) -> Result<OpenMode> {
        match &self.mode {
            Some(spec) => spec.to_mode(),
            None => Ok(OpenMode::default()),
        }
    }

    pub fn platform(&self) -> Result<Option<Platform>> {
        match &self.platform {
            Some(p) => Ok(Some(p.parse()?)),
            None => Ok(None),
        }
    }

    pub fn open(&self) -> Result<Library> {
        let mode = self.mode()?;
        let lib = match self.platform()? {
            Some(platform) => Library::open_with_platform(self.path.as_deref(), mode, platform)?,
            None => Library::open(self.path.as_deref(), mode)?,
        };

        Ok(lib)
    }
}
