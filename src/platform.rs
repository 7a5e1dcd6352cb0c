use crate::error::Error;
use std::fmt::Display;
use std::str::FromStr;

/// Platform identifiers understood when resolving a library name.
///
/// Each identifier maps to the dynamic library file name extension
/// used on that platform.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Platform {
    Linux,
    Linux2,
    SunOs,
    Solaris,
    FreeBsd,
    OpenBsd,
    Darwin,
    Mac,
    Win32,
}

impl Platform {
    pub const ALL: [Platform; 9] = [
        Platform::Linux,
        Platform::Linux2,
        Platform::SunOs,
        Platform::Solaris,
        Platform::FreeBsd,
        Platform::OpenBsd,
        Platform::Darwin,
        Platform::Mac,
        Platform::Win32,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Linux2 => "linux2",
            Platform::SunOs => "sunos",
            Platform::Solaris => "solaris",
            Platform::FreeBsd => "freebsd",
            Platform::OpenBsd => "openbsd",
            Platform::Darwin => "darwin",
            Platform::Mac => "mac",
            Platform::Win32 => "win32",
        }
    }

    /// The canonical dynamic library suffix, including the leading dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            Platform::Linux
            | Platform::Linux2
            | Platform::SunOs
            | Platform::Solaris
            | Platform::FreeBsd
            | Platform::OpenBsd => ".so",
            Platform::Darwin | Platform::Mac => ".dylib",
            Platform::Win32 => ".dll",
        }
    }

    /// The platform this crate was compiled for, if it is one of the known identifiers.
    pub fn current() -> Option<Platform> {
        Self::from_target_os(std::env::consts::OS)
    }

    fn from_target_os(os: &str) -> Option<Platform> {
        match os {
            "linux" | "android" => Some(Platform::Linux),
            "solaris" => Some(Platform::Solaris),
            "illumos" => Some(Platform::SunOs),
            "freebsd" => Some(Platform::FreeBsd),
            "openbsd" => Some(Platform::OpenBsd),
            "macos" | "ios" => Some(Platform::Darwin),
            "windows" => Some(Platform::Win32),
            _ => None,
        }
    }

    /// Appends [`suffix`](Self::suffix) to `name` unless it already ends with it.
    pub fn resolve_name(&self, name: &str) -> String {
        with_suffix(name, self.suffix())
    }
}

/// Suffix for the host, falling back to the toolchain's own notion of it
/// on targets outside the identifier table.
pub(crate) fn host_suffix() -> &'static str {
    match Platform::current() {
        Some(p) => p.suffix(),
        None => std::env::consts::DLL_SUFFIX,
    }
}

pub(crate) fn with_suffix(name: &str, suffix: &str) -> String {
    if name.ends_with(suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.identifier() == s)
            .ok_or_else(|| Error::UnknownPlatform(s.to_string()))
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("linux", ".so")]
    #[case("linux2", ".so")]
    #[case("sunos", ".so")]
    #[case("solaris", ".so")]
    #[case("freebsd", ".so")]
    #[case("openbsd", ".so")]
    #[case("darwin", ".dylib")]
    #[case("mac", ".dylib")]
    #[case("win32", ".dll")]
    fn suffix_table(#[case] identifier: &str, #[case] suffix: &str) {
        let platform: Platform = identifier.parse().unwrap();
        assert_eq!(platform.suffix(), suffix);
        assert_eq!(platform.to_string(), identifier);
    }

    #[rstest]
    #[case("linux", "libfoo", "libfoo.so")]
    #[case("linux", "libfoo.so", "libfoo.so")]
    #[case("darwin", "libfoo", "libfoo.dylib")]
    #[case("darwin", "libfoo.dylib", "libfoo.dylib")]
    #[case("darwin", "libfoo.so", "libfoo.so.dylib")]
    #[case("win32", "foo", "foo.dll")]
    #[case("win32", "foo.dll", "foo.dll")]
    fn appends_suffix_once(#[case] identifier: &str, #[case] name: &str, #[case] expected: &str) {
        let platform: Platform = identifier.parse().unwrap();
        assert_eq!(platform.resolve_name(name), expected);
    }

    #[test]
    fn unknown_identifier() {
        let err = "beos".parse::<Platform>().unwrap_err();
        assert!(matches!(err, Error::UnknownPlatform(ref p) if p == "beos"));
    }

    #[test]
    fn host_mapping() {
        assert_eq!(Platform::from_target_os("linux"), Some(Platform::Linux));
        assert_eq!(Platform::from_target_os("macos"), Some(Platform::Darwin));
        assert_eq!(Platform::from_target_os("windows"), Some(Platform::Win32));
        assert_eq!(Platform::from_target_os("haiku"), None);

        #[cfg(target_os = "linux")]
        assert_eq!(host_suffix(), ".so");
        #[cfg(target_os = "macos")]
        assert_eq!(host_suffix(), ".dylib");
        #[cfg(target_os = "windows")]
        assert_eq!(host_suffix(), ".dll");
    }
}
