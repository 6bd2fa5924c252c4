//! Display board callbacks
//!
//! The generic CLCD driver calls back into the board for everything that
//! depends on the panel wired to it. [`DisplayBoardOps`] is that capability;
//! each board revision provides one implementation owning its framebuffer.

use static_assertions::const_assert_eq;

use crate::framebuffer::{
    AddressSpace, DmaAllocator, FramebufferBuffer, FramebufferError, FramebufferManager,
};

/// Scanout pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4bpp greyscale, two pixels per byte
    Grey4,
    /// 16bpp colour
    Rgb565,
}

/// Panel timing, in pixel clocks / lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTiming {
    pub refresh_hz: u32,
    pub hsync_len: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub vsync_len: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
}

/// Fixed geometry of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub format: PixelFormat,
    pub timing: PanelTiming,
}

impl PanelGeometry {
    /// Bytes of one scanline
    pub const fn line_length(&self) -> usize {
        (self.width * self.bits_per_pixel / 8) as usize
    }

    /// Bytes of one full frame
    pub const fn framebuffer_len(&self) -> usize {
        self.line_length() * self.height as usize
    }
}

/// Colour panel of the CX
pub const CX_PANEL: PanelGeometry = PanelGeometry {
    width: 320,
    height: 240,
    bits_per_pixel: 16,
    format: PixelFormat::Rgb565,
    timing: PanelTiming {
        refresh_hz: 60,
        hsync_len: 6,
        left_margin: 50,
        right_margin: 38,
        vsync_len: 1,
        upper_margin: 3,
        lower_margin: 10,
    },
};

/// Greyscale panel of the classic models
pub const CLASSIC_PANEL: PanelGeometry = PanelGeometry {
    width: 320,
    height: 240,
    bits_per_pixel: 4,
    format: PixelFormat::Grey4,
    timing: PanelTiming {
        refresh_hz: 60,
        hsync_len: 6,
        left_margin: 6,
        right_margin: 6,
        vsync_len: 1,
        upper_margin: 1,
        lower_margin: 1,
    },
};

const_assert_eq!(CX_PANEL.framebuffer_len(), 320 * 240 * 2);
const_assert_eq!(CLASSIC_PANEL.framebuffer_len(), 320 * 240 / 2);

/// Board hooks for the display driver
///
/// `setup`, `mmap` and `remove` drive the framebuffer lifecycle; the driver
/// holds this value from construction onwards, so every hook must be usable
/// as soon as the descriptor is registered.
pub trait DisplayBoardOps: Send + Sync {
    /// Name the driver reports for the panel
    fn name(&self) -> &'static str;

    fn panel(&self) -> &PanelGeometry;

    fn framebuffer(&self) -> &FramebufferManager;

    /// Allocate the scanout buffer
    fn setup(&self, dma: &mut dyn DmaAllocator) -> Result<FramebufferBuffer, FramebufferError> {
        self.framebuffer().allocate(dma)
    }

    /// Expose the scanout buffer to a process
    fn mmap(&self, target: &mut dyn AddressSpace) -> Result<usize, FramebufferError> {
        self.framebuffer().expose_to_address_space(target)
    }

    /// Release the scanout buffer
    fn remove(&self, dma: &mut dyn DmaAllocator) -> Result<(), FramebufferError> {
        self.framebuffer().free(dma)
    }

    /// Panel power-up after the controller is programmed
    fn enable(&self) {}

    /// Panel power-down before the controller stops
    fn disable(&self) {}
}

/// Classic (greyscale) LCD
#[derive(Debug)]
pub struct ClassicLcd {
    fb: FramebufferManager,
}

impl ClassicLcd {
    pub const fn new() -> Self {
        Self {
            fb: FramebufferManager::new(CLASSIC_PANEL.framebuffer_len()),
        }
    }
}

impl Default for ClassicLcd {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBoardOps for ClassicLcd {
    fn name(&self) -> &'static str {
        "LCD"
    }

    fn panel(&self) -> &PanelGeometry {
        &CLASSIC_PANEL
    }

    fn framebuffer(&self) -> &FramebufferManager {
        &self.fb
    }
}

/// CX (colour) LCD
#[derive(Debug)]
pub struct CxLcd {
    fb: FramebufferManager,
}

impl CxLcd {
    pub const fn new() -> Self {
        Self {
            fb: FramebufferManager::new(CX_PANEL.framebuffer_len()),
        }
    }
}

impl Default for CxLcd {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBoardOps for CxLcd {
    fn name(&self) -> &'static str {
        "LCD"
    }

    fn panel(&self) -> &PanelGeometry {
        &CX_PANEL
    }

    fn framebuffer(&self) -> &FramebufferManager {
        &self.fb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FramebufferState;
    use crate::mock::{MockAddressSpace, MockDma};

    #[test]
    fn test_panel_sizes() {
        assert_eq!(CX_PANEL.line_length(), 640);
        assert_eq!(CX_PANEL.framebuffer_len(), 153_600);
        assert_eq!(CLASSIC_PANEL.framebuffer_len(), 38_400);
    }

    #[test]
    fn test_cx_ops_drive_framebuffer() {
        let ops: &dyn DisplayBoardOps = &CxLcd::new();
        let mut dma = MockDma::new();
        let mut space = MockAddressSpace::new(0x4000_0000);

        let buffer = ops.setup(&mut dma).unwrap();
        assert_eq!(buffer.length, 153_600);
        ops.enable();
        ops.mmap(&mut space).unwrap();
        ops.disable();
        ops.remove(&mut dma).unwrap();

        assert_eq!(ops.framebuffer().state(), FramebufferState::Freed);
        assert!(ops.mmap(&mut space).is_err());
    }

    #[test]
    fn test_classic_buffer_matches_panel() {
        let ops = ClassicLcd::new();
        let mut dma = MockDma::new();
        let buffer = ops.setup(&mut dma).unwrap();
        assert_eq!(buffer.length, ops.panel().framebuffer_len());
    }
}
