//! An object-oriented wrapper around the OS dynamic loader:
//! `dlopen()`, `dlsym()`, `dlerror()` and `dlclose()` on Unix, and their
//! `LoadLibraryExW()` family counterparts on Windows.
//!
//! ```no_run
//! let lib = dlfcn::load(Some("libm")).unwrap();
//! let cos = lib.get("cos").unwrap();
//! println!("cos is at {:p}", cos.address());
//! ```
pub mod config;
pub mod error;
pub mod load;
pub mod mode;
pub mod platform;

pub use config::LibraryConfig;
pub use error::{Error, Result};
pub use load::{load, load_with_platform, Library, PseudoHandle, RawSymbol, Symbol};
pub use mode::OpenMode;
pub use platform::Platform;
