use crate::error::{Error, Result};
use crate::mode::OpenMode;
use crate::platform::{host_suffix, with_suffix, Platform};
#[cfg(unix)]
use libloading::os::unix::{
    Library as LLNativeLibrary, // LL means libloading
    Symbol as LLSymbol,
};
#[cfg(windows)]
use libloading::os::windows::{
    Library as LLNativeLibrary, // LL means libloading
    Symbol as LLSymbol,
};
use log::{debug, trace, warn};
use std::ffi::c_void;
use std::fmt::{Debug, Formatter};
use std::sync::Mutex;

/// An open dynamic library, or the symbol table of the current process.
///
/// The handle stays valid until [`close`](Library::close) is called or the
/// value is dropped, whichever comes first.
///
/// Lookups go straight to the OS loader without any locking. Whether
/// concurrent lookups on one handle are safe is up to the platform's
/// `dlsym()`/`GetProcAddress()`.
pub struct Library {
    path: Option<String>,
    mode: OpenMode,
    raw_library: Option<LLNativeLibrary>,
    pseudo: Option<PseudoHandle>,
    last_error: Mutex<Option<String>>,
}

impl Library {
    /// Opens `path` with the host platform's suffix rules, or the current
    /// process when `path` is `None`.
    pub fn open(path: Option<&str>, mode: OpenMode) -> Result<Self> {
        let path = path.map(|p| {
            let resolved = with_suffix(p, host_suffix());
            if resolved != p {
                debug!("appending dynamic lib suffix ({}): {}", host_suffix(), p);
            }
            resolved
        });

        Self::open_resolved(path, mode)
    }

    /// Like [`open`](Library::open), but resolves the suffix for `platform`.
    pub fn open_with_platform(
        path: Option<&str>,
        mode: OpenMode,
        platform: Platform,
    ) -> Result<Self> {
        let path = path.map(|p| {
            let resolved = platform.resolve_name(p);
            if resolved != p {
                debug!("appending dynamic lib suffix ({}): {}", platform.suffix(), p);
            }
            resolved
        });

        Self::open_resolved(path, mode)
    }

    fn open_resolved(path: Option<String>, mode: OpenMode) -> Result<Self> {
        debug!("library name {:?}, mode {:?}", path, mode);

        let raw_library = unsafe { libloading_open(path.as_deref(), mode) }.map_err(|e| {
            debug!("open failed: {}", e);
            Error::Open {
                name: path.clone(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            path,
            mode,
            raw_library: Some(raw_library),
            pseudo: None,
            last_error: Mutex::new(None),
        })
    }

    /// Wraps one of the loader's special `dlsym()` handles.
    ///
    /// Nothing is opened, and [`close`](Library::close) never passes the
    /// handle to `dlclose()`.
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    pub fn pseudo(handle: PseudoHandle) -> Self {
        debug!("pseudo handle {:?}", handle);

        Self {
            path: None,
            mode: OpenMode::empty(),
            raw_library: Some(unsafe { LLNativeLibrary::from_raw(handle.as_raw()) }),
            pseudo: Some(handle),
            last_error: Mutex::new(None),
        }
    }

    /// Looks symbols up with the loader's default search order.
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    pub fn default_scope() -> Self {
        Self::pseudo(PseudoHandle::Default)
    }

    /// The name the library was opened with, after suffix resolution.
    /// `None` for the current process.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.raw_library.is_some()
    }

    /// The special handle this value wraps, if it was built with
    /// [`pseudo`](Library::pseudo).
    pub fn pseudo_handle(&self) -> Option<PseudoHandle> {
        self.pseudo
    }

    /// Resolves `name` with an unknown (zero) length.
    pub fn get(&self, name: &str) -> Result<Symbol<'_>> {
        self.get_sized(name, 0)
    }

    /// Resolves `name` and tags the result with a byte length of `size`.
    pub fn get_sized(&self, name: &str, size: usize) -> Result<Symbol<'_>> {
        trace!("get(): {} ({} bytes)", name, size);

        let Some(lib) = &self.raw_library else {
            return Err(Error::Closed {
                name: self.path.clone(),
            });
        };

        let symbol: LLSymbol<*mut c_void> = match unsafe { lib.get(name.as_bytes()) } {
            Ok(symbol) => symbol,
            Err(e) => {
                let message = e.to_string();
                self.set_last_error(Some(message.clone()));
                return Err(Error::SymbolNotFound {
                    symbol: name.to_string(),
                    message,
                });
            }
        };
        let address = *symbol;
        self.set_last_error(None);

        trace!("dlsym() result: {} = {:p}", name, address);

        Ok(Symbol {
            address,
            len: size,
            name: name.to_string(),
            library: self,
            on_release: None,
        })
    }

    /// Like [`get_sized`](Library::get_sized), but runs `on_release` once the
    /// returned [`Symbol`] is dropped.
    ///
    /// The callback runs at scope exit of the `Symbol`, not when the memory
    /// it points to is released by the loader.
    pub fn get_with_release<'lib>(
        &'lib self,
        name: &str,
        size: usize,
        on_release: impl FnOnce() + 'lib,
    ) -> Result<Symbol<'lib>> {
        let mut symbol = self.get_sized(name, size)?;
        symbol.on_release = Some(Box::new(on_release));
        Ok(symbol)
    }

    /// The diagnostic left by the most recent loader call through this
    /// handle, or `"no error"` if that call succeeded.
    pub fn last_error(&self) -> String {
        self.last_error
            .lock()
            .ok()
            .and_then(|e| e.clone())
            .unwrap_or_else(|| "no error".to_string())
    }

    fn set_last_error(&self, message: Option<String>) {
        if let Ok(mut e) = self.last_error.lock() {
            *e = message;
        }
    }

    /// Unloads the library. Calling it again is a no-op.
    ///
    /// [`RawSymbol`]s taken from this library dangle afterwards.
    pub fn close(&mut self) {
        let Some(lib) = self.raw_library.take() else {
            return;
        };

        debug!("close(): {:?}", self.path);
        self.set_last_error(None);

        if let Some(handle) = self.pseudo {
            trace!("not closing pseudo handle {:?}", handle);
            #[cfg(unix)]
            let _ = lib.into_raw();
            return;
        }

        // There is nothing useful a caller can do about a failed unload.
        if let Err(e) = lib.close() {
            warn!("failed to close {:?}: {}", self.path, e);
            self.set_last_error(Some(e.to_string()));
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        self.close();
    }
}

impl Debug for Library {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("open", &self.is_open())
            .field("pseudo", &self.pseudo)
            .finish()
    }
}

/// The special handles `dlsym()` accepts in place of an opened library.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PseudoHandle {
    /// `RTLD_DEFAULT`: the default search order of the process.
    Default,
    /// `RTLD_NEXT`: objects loaded after the one making the lookup.
    Next,
    /// `RTLD_SELF`: the calling object and those loaded after it.
    #[cfg(target_os = "macos")]
    SelfAndNext,
    /// `RTLD_MAIN_ONLY`: the main executable only.
    #[cfg(target_os = "macos")]
    MainOnly,
}

impl PseudoHandle {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    pub fn as_raw(&self) -> *mut c_void {
        match self {
            PseudoHandle::Default => libc::RTLD_DEFAULT,
            PseudoHandle::Next => libc::RTLD_NEXT,
            #[cfg(target_os = "macos")]
            PseudoHandle::SelfAndNext => libc::RTLD_SELF,
            #[cfg(target_os = "macos")]
            PseudoHandle::MainOnly => libc::RTLD_MAIN_ONLY,
        }
    }
}

type OpenResult = std::result::Result<LLNativeLibrary, libloading::Error>;

#[cfg(unix)]
unsafe fn libloading_open(path: Option<&str>, mode: OpenMode) -> OpenResult {
    LLNativeLibrary::open(path, mode.bits())
}

#[cfg(windows)]
unsafe fn libloading_open(path: Option<&str>, mode: OpenMode) -> OpenResult {
    match path {
        Some(path) => LLNativeLibrary::load_with_flags(path, mode.bits()),
        None => LLNativeLibrary::this(),
    }
}

/// A resolved symbol: an address plus a caller-declared byte length.
///
/// Borrows the [`Library`] it came from, so the library cannot be closed
/// while this value is alive.
pub struct Symbol<'lib> {
    address: *mut c_void,
    len: usize,
    name: String,
    library: &'lib Library,
    on_release: Option<Box<dyn FnOnce() + 'lib>>,
}

impl<'lib> Symbol<'lib> {
    pub fn address(&self) -> *mut c_void {
        self.address
    }

    /// The byte length hint given at lookup. 0 means unknown.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn library(&self) -> &'lib Library {
        self.library
    }

    pub fn as_ptr<T>(&self) -> *mut T {
        self.address.cast()
    }

    /// # Safety
    ///
    /// The symbol must refer to at least [`len`](Self::len) readable bytes.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.address as *const u8, self.len)
    }

    /// Reads a `T` from the symbol's address, without alignment requirements.
    ///
    /// # Safety
    ///
    /// The symbol must refer to a valid, initialized `T`.
    pub unsafe fn read<T: Copy>(&self) -> T {
        std::ptr::read_unaligned(self.address as *const T)
    }

    /// Detaches the address and length from the library's lifetime.
    pub fn raw(&self) -> RawSymbol {
        RawSymbol {
            address: self.address,
            len: self.len,
        }
    }
}

impl Drop for Symbol<'_> {
    fn drop(&mut self) {
        if let Some(on_release) = self.on_release.take() {
            trace!("release callback: {}", self.name);
            on_release();
        }
    }
}

impl Debug for Symbol<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Symbol")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("len", &self.len)
            .field("library", &self.library.path)
            .finish()
    }
}

/// A symbol address that is not tied to its library's lifetime.
///
/// Nothing tracks it: once the owning [`Library`] is closed, dereferencing
/// it is undefined behavior.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RawSymbol {
    pub address: *mut c_void,
    pub len: usize,
}

/// Opens `name` with the default mode. `None` opens the current process.
pub fn load(name: Option<&str>) -> Result<Library> {
    Library::open(name, OpenMode::default())
}

/// Opens `name` for the platform given by its identifier, e.g. `"darwin"`.
pub fn load_with_platform(name: Option<&str>, mode: OpenMode, platform: &str) -> Result<Library> {
    let platform: Platform = platform.parse()?;
    Library::open_with_platform(name, mode, platform)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn current_process() {
        let lib = load(None).unwrap();
        assert_eq!(lib.path(), None);
        assert!(lib.is_open());
        assert_eq!(lib.mode(), OpenMode::LAZY);
    }

    #[test]
    fn missing_symbol_records_last_error() {
        let lib = load(None).unwrap();
        assert_eq!(lib.last_error(), "no error");

        let err = lib.get("dlfcn_no_such_symbol").unwrap_err();
        assert!(matches!(
            err,
            Error::SymbolNotFound { ref symbol, .. } if symbol == "dlfcn_no_such_symbol"
        ));
        assert!(!err.to_string().is_empty());
        assert_eq!(lib.last_error(), err.to_string());
    }

    #[test]
    fn successful_get_clears_last_error() {
        let lib = load(None).unwrap();
        assert!(lib.get("dlfcn_no_such_symbol").is_err());
        assert_ne!(lib.last_error(), "no error");

        assert!(lib.get("malloc").is_ok());
        assert_eq!(lib.last_error(), "no error");
    }

    #[test]
    fn close_clears_last_error() {
        let mut lib = load(None).unwrap();
        assert!(lib.get("dlfcn_no_such_symbol").is_err());
        assert_ne!(lib.last_error(), "no error");

        lib.close();
        assert_eq!(lib.last_error(), "no error");
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn default_scope_resolves_malloc() {
        let mut lib = Library::default_scope();
        assert_eq!(lib.pseudo_handle(), Some(PseudoHandle::Default));
        assert_eq!(lib.path(), None);

        let malloc = lib.get("malloc").unwrap();
        assert!(!malloc.address().is_null());
        drop(malloc);

        lib.close();
        lib.close();
        assert!(!lib.is_open());
        assert!(matches!(lib.get("malloc"), Err(Error::Closed { name: None })));
    }

    #[test]
    fn get_after_close() {
        let mut lib = load(None).unwrap();
        lib.close();
        assert!(!lib.is_open());
        assert!(matches!(lib.get("malloc"), Err(Error::Closed { name: None })));
    }

    #[test]
    fn release_callback_runs_once() {
        let lib = load(None).unwrap();
        let released = Cell::new(0);

        let symbol = lib
            .get_with_release("malloc", 0, || released.set(released.get() + 1))
            .unwrap();
        assert_eq!(released.get(), 0);
        drop(symbol);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn unknown_platform_identifier() {
        let err = load_with_platform(Some("libc"), OpenMode::default(), "plan9").unwrap_err();
        assert!(matches!(err, Error::UnknownPlatform(_)));
    }
}
