//! Board configuration and revision selection
//!
//! [`BoardConfig`] bundles every table the bring-up components consume. It is
//! built once at startup, validated, and passed by reference into each stage.
//!
//! The revision is picked at compile time with cargo features, the same way
//! the kernel selects its console:
//! - `board-cx`: Nspire CX (default)
//! - `board-classic`: classic greyscale models

use alloc::boxed::Box;

use crate::clock::{validate_clocks, ClockBinding, ClockSource};
use crate::device::{SerialConfig, SerialKind};
use crate::display::{ClassicLcd, CxLcd, DisplayBoardOps, PanelGeometry, CLASSIC_PANEL, CX_PANEL};
use crate::irq::IrqMask;
use crate::keypad::{KeypadConfig, KeypadMap, CLASSIC_KEYMAP, CX_KEYMAP};
use crate::mmio::{validate_regions, MemoryRegion};
use crate::resources::{
    CLASSIC_CLOCKS, CLASSIC_CLOCK_BINDINGS, CLASSIC_TIMERS, CX_CLOCKS, CX_CLOCK_BINDINGS,
    CX_TIMERS, IMPLEMENTED_IRQS, IO_REGIONS,
};
use crate::timer::SocTimer;
use crate::Result;

/// Hardware revision of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardRevision {
    /// Greyscale models with the clickpad/touchpad keypads
    Classic,
    /// Colour CX models
    Cx,
}

impl BoardRevision {
    /// Revision selected by cargo features
    #[cfg(feature = "board-classic")]
    pub const fn from_build() -> Self {
        BoardRevision::Classic
    }

    /// Revision selected by cargo features
    #[cfg(not(feature = "board-classic"))]
    pub const fn from_build() -> Self {
        BoardRevision::Cx
    }

    pub fn name(self) -> &'static str {
        match self {
            BoardRevision::Classic => "TI-Nspire",
            BoardRevision::Cx => "TI-Nspire CX",
        }
    }

    pub fn clock_sources(self) -> &'static [&'static ClockSource] {
        match self {
            BoardRevision::Classic => &CLASSIC_CLOCKS,
            BoardRevision::Cx => &CX_CLOCKS,
        }
    }

    pub fn clock_bindings(self) -> &'static [ClockBinding] {
        match self {
            BoardRevision::Classic => &CLASSIC_CLOCK_BINDINGS,
            BoardRevision::Cx => &CX_CLOCK_BINDINGS,
        }
    }

    pub fn timers(self) -> &'static [SocTimer] {
        match self {
            BoardRevision::Classic => &CLASSIC_TIMERS,
            BoardRevision::Cx => &CX_TIMERS,
        }
    }

    pub fn panel(self) -> PanelGeometry {
        match self {
            BoardRevision::Classic => CLASSIC_PANEL,
            BoardRevision::Cx => CX_PANEL,
        }
    }

    pub fn serial(self) -> SerialConfig {
        match self {
            BoardRevision::Classic => SerialConfig {
                kind: SerialKind::Ns16550,
                baud: 115_200,
            },
            BoardRevision::Cx => SerialConfig {
                kind: SerialKind::Pl011,
                baud: 115_200,
            },
        }
    }

    pub fn keymap(self) -> Result<KeypadMap> {
        match self {
            BoardRevision::Classic => KeypadMap::from_rows(&CLASSIC_KEYMAP),
            BoardRevision::Cx => KeypadMap::from_rows(&CX_KEYMAP),
        }
    }

    /// Keypad inputs read low when pressed on the CX only
    pub fn keypad_active_low(self) -> bool {
        matches!(self, BoardRevision::Cx)
    }

    /// Display callbacks for this revision
    pub fn display_ops(self) -> Box<dyn DisplayBoardOps> {
        match self {
            BoardRevision::Classic => Box::new(ClassicLcd::new()),
            BoardRevision::Cx => Box::new(CxLcd::new()),
        }
    }
}

/// Everything bring-up needs to know about the board
#[derive(Debug, Clone)]
pub struct BoardConfig {
    revision: BoardRevision,
    regions: &'static [MemoryRegion],
    clock_sources: &'static [&'static ClockSource],
    clock_bindings: &'static [ClockBinding],
    irq_mask: IrqMask,
    timers: &'static [SocTimer],
    keypad: KeypadConfig,
    panel: PanelGeometry,
    serial: SerialConfig,
}

impl BoardConfig {
    /// Build and validate the configuration of `revision`
    ///
    /// # Errors
    /// `ResourceConflict` or `InvalidKeymap` if any static table breaks its
    /// invariants.
    pub fn new(revision: BoardRevision) -> Result<Self> {
        validate_regions(&IO_REGIONS)?;
        validate_clocks(revision.clock_sources(), revision.clock_bindings())?;
        let keypad = KeypadConfig::new(revision.keymap()?, revision.keypad_active_low())?;

        Ok(Self {
            revision,
            regions: &IO_REGIONS,
            clock_sources: revision.clock_sources(),
            clock_bindings: revision.clock_bindings(),
            irq_mask: IMPLEMENTED_IRQS,
            timers: revision.timers(),
            keypad,
            panel: revision.panel(),
            serial: revision.serial(),
        })
    }

    /// Configuration of the revision selected at build time
    pub fn from_build() -> Result<Self> {
        Self::new(BoardRevision::from_build())
    }

    pub fn revision(&self) -> BoardRevision {
        self.revision
    }

    pub fn regions(&self) -> &'static [MemoryRegion] {
        self.regions
    }

    pub fn clock_sources(&self) -> &'static [&'static ClockSource] {
        self.clock_sources
    }

    pub fn clock_bindings(&self) -> &'static [ClockBinding] {
        self.clock_bindings
    }

    pub fn irq_mask(&self) -> IrqMask {
        self.irq_mask
    }

    pub fn timers(&self) -> &'static [SocTimer] {
        self.timers
    }

    pub fn keypad(&self) -> &KeypadConfig {
        &self.keypad
    }

    pub fn panel(&self) -> &PanelGeometry {
        &self.panel
    }

    pub fn serial(&self) -> SerialConfig {
        self.serial
    }
}
