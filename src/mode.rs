//! Open-mode flags passed to the OS loader.
//!
//! On Unix these are the `RTLD_*` flags of `dlopen()`, on Windows the
//! `LOAD_*` flags of `LoadLibraryExW()`. The raw constants are re-exported
//! under their C names.

use std::fmt::{Debug, Formatter};
use std::ops::{BitOr, BitOrAssign};

#[cfg(unix)]
pub use libloading::os::unix::{RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

#[cfg(any(target_os = "linux", target_os = "macos"))]
pub use libc::{RTLD_NODELETE, RTLD_NOLOAD};

#[cfg(target_os = "macos")]
pub use libc::RTLD_FIRST; // Mac OS X 10.5 and later

#[cfg(windows)]
pub use libloading::os::windows::{
    LOAD_LIBRARY_SEARCH_DEFAULT_DIRS, LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR,
    LOAD_WITH_ALTERED_SEARCH_PATH,
};

#[cfg(unix)]
pub type RawMode = std::os::raw::c_int;

#[cfg(windows)]
pub type RawMode = u32;

/// A set of loader flags.
///
/// `OpenMode::default()` is lazy binding on Unix and no flags on Windows.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct OpenMode(RawMode);

impl OpenMode {
    #[cfg(unix)]
    pub const LAZY: OpenMode = OpenMode(RTLD_LAZY);
    #[cfg(unix)]
    pub const NOW: OpenMode = OpenMode(RTLD_NOW);
    #[cfg(unix)]
    pub const GLOBAL: OpenMode = OpenMode(RTLD_GLOBAL);
    #[cfg(unix)]
    pub const LOCAL: OpenMode = OpenMode(RTLD_LOCAL);
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    pub const NOLOAD: OpenMode = OpenMode(RTLD_NOLOAD);
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    pub const NODELETE: OpenMode = OpenMode(RTLD_NODELETE);
    #[cfg(target_os = "macos")]
    pub const FIRST: OpenMode = OpenMode(RTLD_FIRST);

    #[cfg(windows)]
    pub const ALTERED_SEARCH_PATH: OpenMode = OpenMode(LOAD_WITH_ALTERED_SEARCH_PATH);
    #[cfg(windows)]
    pub const SEARCH_DEFAULT_DIRS: OpenMode = OpenMode(LOAD_LIBRARY_SEARCH_DEFAULT_DIRS);
    #[cfg(windows)]
    pub const SEARCH_DLL_LOAD_DIR: OpenMode = OpenMode(LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR);

    /// Flag names accepted by [`from_name`](Self::from_name) on this platform.
    pub const NAMES: &'static [(&'static str, OpenMode)] = &[
        #[cfg(unix)]
        ("lazy", Self::LAZY),
        #[cfg(unix)]
        ("now", Self::NOW),
        #[cfg(unix)]
        ("global", Self::GLOBAL),
        #[cfg(unix)]
        ("local", Self::LOCAL),
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        ("noload", Self::NOLOAD),
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        ("nodelete", Self::NODELETE),
        #[cfg(target_os = "macos")]
        ("first", Self::FIRST),
        #[cfg(windows)]
        ("altered_search_path", Self::ALTERED_SEARCH_PATH),
        #[cfg(windows)]
        ("search_default_dirs", Self::SEARCH_DEFAULT_DIRS),
        #[cfg(windows)]
        ("search_dll_load_dir", Self::SEARCH_DLL_LOAD_DIR),
    ];

    pub const fn empty() -> Self {
        OpenMode(0)
    }

    pub const fn from_raw(bits: RawMode) -> Self {
        OpenMode(bits)
    }

    pub const fn bits(&self) -> RawMode {
        self.0
    }

    pub const fn contains(&self, other: OpenMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let name = name.trim_start_matches("rtld_");
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, mode)| *mode)
    }
}

impl Default for OpenMode {
    #[cfg(unix)]
    fn default() -> Self {
        Self::LAZY
    }

    #[cfg(windows)]
    fn default() -> Self {
        Self::empty()
    }
}

impl BitOr for OpenMode {
    type Output = OpenMode;

    fn bitor(self, rhs: Self) -> Self::Output {
        OpenMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Debug for OpenMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenMode({:#x})", self.0)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn default_is_lazy() {
        assert_eq!(OpenMode::default(), OpenMode::LAZY);
        assert_eq!(OpenMode::default().bits(), RTLD_LAZY);
    }

    #[test]
    fn combines_flags() {
        let mut mode = OpenMode::NOW | OpenMode::GLOBAL;
        assert!(mode.contains(OpenMode::NOW));
        assert!(mode.contains(OpenMode::GLOBAL));
        assert_eq!(mode.bits(), RTLD_NOW | RTLD_GLOBAL);

        mode |= OpenMode::LOCAL;
        assert_eq!(mode.bits(), RTLD_NOW | RTLD_GLOBAL | RTLD_LOCAL);
    }

    #[test]
    fn looks_up_names() {
        assert_eq!(OpenMode::from_name("now"), Some(OpenMode::NOW));
        assert_eq!(OpenMode::from_name("RTLD_GLOBAL"), Some(OpenMode::GLOBAL));
        assert_eq!(OpenMode::from_name("eventually"), None);
    }
}
