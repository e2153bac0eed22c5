//! Default values shared by the configuration structs and the runtime.

pub mod atomic_write {
    /// Bytes accepted by a write session before it reports back-pressure.
    /// Large enough that project serialization rarely stalls on disk IO.
    pub const DEFAULT_HIGH_WATER_MARK_BYTES: usize = 5 * 1024 * 1024;
    pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;
    pub const DEFAULT_TEMP_PREFIX: &str = ".warden-";
    /// Permission bits used when the destination does not exist yet.
    pub const DEFAULT_FILE_MODE: u32 = 0o666;
    /// Set to `1` by hosts running inside a sandbox that forbids rename.
    pub const SANDBOXED_FS_ENV: &str = "WARDEN_FS_SANDBOXED";
}

pub mod intercept {
    pub const DEFAULT_ASSET_ORIGINS: &[&str] = &[
        "https://assets.scratch.mit.edu",
        "https://cdn.assets.scratch.mit.edu",
    ];
    pub const DEFAULT_EXTENSION_ORIGIN: &str = "https://extensions.turbowarp.org";
    pub const DEFAULT_LIBRARY_SCHEME: &str = "tw-library";
    pub const DEFAULT_EXTENSION_SCHEME: &str = "tw-extensions";
    /// Suffix of compressed entries in the local asset directory.
    pub const COMPRESSED_ASSET_SUFFIX: &str = ".br";
    pub const DEVTOOLS_SCHEME_PREFIX: &str = "devtools:";
}

pub mod trust {
    pub const DEFAULT_ALWAYS_TRUSTED: &[&str] = &[
        "https://extensions.turbowarp.org",
        "https://trampoline.turbowarp.org",
    ];
}

pub mod debug {
    pub const DEFAULT_TRACE_TARGETS: &[&str] = &["warden", "warden_core"];
}

pub mod loader {
    pub const CONFIG_FILE_NAME: &str = "warden.toml";
    pub const CONFIG_DIR_NAME: &str = "warden";
    pub const CONFIG_PATH_ENV: &str = "WARDEN_CONFIG_PATH";
}
