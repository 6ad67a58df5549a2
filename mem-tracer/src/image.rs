//! Main-executable image tracking.
//!
//! Instructions observed before the main executable is mapped belong to
//! loader and runtime startup code; they are never traced. The gate in
//! this module is the single authority for that decision.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A loaded module as reported by the host runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Module name or path.
    pub name: String,
    /// Lowest mapped address of the module.
    pub low: u64,
    /// Highest mapped address of the module (inclusive).
    pub high: u64,
    /// Whether this module is the target's main executable.
    pub main_executable: bool,
}

/// Inclusive address bounds of the main executable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    /// Lowest address of the image.
    pub low: u64,
    /// Highest address of the image (inclusive).
    pub high: u64,
}

impl AddressRange {
    /// Whether `address` falls inside these bounds.
    pub fn contains(&self, address: u64) -> bool {
        self.low <= address && address <= self.high
    }
}

/// Gate deciding whether an address belongs to the main executable.
///
/// Inactive until the main executable's image-load notification
/// arrives. While inactive, no address is in range and nothing is
/// eligible for tracing. Once recorded, the bounds are fixed for the
/// process lifetime.
#[derive(Debug, Default)]
pub struct RangeGate {
    range: RwLock<Option<AddressRange>>,
}

impl RangeGate {
    /// Create an inactive gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a module-load notification from the host.
    ///
    /// Shared libraries are ignored; only the main executable activates
    /// the gate. A notification with inverted bounds is rejected and
    /// leaves the gate untouched.
    pub fn on_image_load(&self, image: &ImageInfo) {
        if !image.main_executable {
            tracing::debug!("ignoring shared module {}", image.name);
            return;
        }
        if image.low > image.high {
            tracing::warn!(
                "rejecting malformed bounds {:#x}..{:#x} for {}",
                image.low,
                image.high,
                image.name
            );
            return;
        }

        let mut range = self.range.write();
        if range.is_some() {
            tracing::warn!(
                "main executable {} reported twice, keeping first bounds",
                image.name
            );
            return;
        }
        *range = Some(AddressRange {
            low: image.low,
            high: image.high,
        });
        tracing::info!(
            "main executable {} mapped at {:#x}..{:#x}",
            image.name,
            image.low,
            image.high
        );
    }

    /// Whether the main executable has been recorded.
    pub fn is_active(&self) -> bool {
        self.range.read().is_some()
    }

    /// The recorded bounds, if the gate is active.
    pub fn range(&self) -> Option<AddressRange> {
        *self.range.read()
    }

    /// Whether `address` lies inside the main executable.
    ///
    /// Unconditionally false while the gate is inactive.
    pub fn is_in_range(&self, address: u64) -> bool {
        self.range.read().is_some_and(|range| range.contains(address))
    }
}
