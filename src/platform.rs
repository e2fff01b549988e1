use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
    Unknown,
}

impl Os {
    pub fn as_str(self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::MacOs => "macos",
            Os::Linux => "linux",
            Os::Unknown => "unknown",
        }
    }

    fn detect() -> Self {
        match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::MacOs,
            "linux" => Os::Linux,
            _ => Os::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Unix,
    Unknown,
}

impl OsFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Unix => "unix",
            OsFamily::Unknown => "unknown",
        }
    }

    fn detect() -> Self {
        match std::env::consts::FAMILY {
            "windows" => OsFamily::Windows,
            "unix" => OsFamily::Unix,
            _ => OsFamily::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Arm64,
    Unknown,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
            Arch::Unknown => "unknown",
        }
    }

    fn detect() -> Self {
        match std::env::consts::ARCH {
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Arm64,
            _ => Arch::Unknown,
        }
    }
}

/// Facts about the machine that constraints are matched against.
///
/// Detected once per process and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformFacts {
    pub os: Os,
    pub os_family: OsFamily,
    pub arch: Arch,
}

impl PlatformFacts {
    pub fn detect() -> Self {
        Self {
            os: Os::detect(),
            os_family: OsFamily::detect(),
            arch: Arch::detect(),
        }
    }

    /// Facts of the running process.
    pub fn current() -> &'static PlatformFacts {
        static FACTS: OnceLock<PlatformFacts> = OnceLock::new();
        FACTS.get_or_init(PlatformFacts::detect)
    }
}

impl fmt::Display for PlatformFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}",
            self.os.as_str(),
            self.os_family.as_str(),
            self.arch.as_str()
        )
    }
}

/// Normalizes a user-written platform value so that `Linux`, ` linux ` and
/// `linux` compare equal, and common synonyms map to the canonical spelling.
pub fn canonicalize(value: &str) -> String {
    let lowered = value.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "amd64" | "x64" | "x86-64" => "x86_64".to_string(),
        "aarch64" => "arm64".to_string(),
        "darwin" | "osx" | "mac" => "macos".to_string(),
        "win" | "win32" => "windows".to_string(),
        _ => lowered,
    }
}
