//! Resource tables for the Nspire SoC
//!
//! Physical layout, interrupt wiring and clock tree of both supported board
//! revisions. Pure data: the invariants are checked once by
//! [`crate::BoardConfig::new`] and pinned at compile time where possible.

use static_assertions::const_assert;

use crate::clock::{ClockBinding, ClockSource};
use crate::irq::{InterruptLine, IrqMask};
use crate::mmio::{AccessClass, MemoryRegion, PAGE_SIZE};
use crate::timer::{SocTimer, TimerKind};

// =============================================================================
// Register windows
// =============================================================================

/// APB peripheral block
pub const APB_PHYS_BASE: usize = 0x9000_0000;
pub const APB_VIRT_BASE: usize = 0xFEE0_0000;
pub const APB_SIZE: usize = 0x0011_0000;

/// Offsets of the APB peripherals
pub const APB_GPIO: usize = 0x00000;
pub const APB_UART: usize = 0x20000;
pub const APB_TIMER0: usize = 0xC0000;
pub const APB_TIMER1: usize = 0xD0000;
pub const APB_MISC: usize = 0xA0000;
pub const APB_KEYPAD: usize = 0xE0000;
pub const APB_CONTRAST: usize = 0xF0000;

/// Size of one APB peripheral slot
pub const APB_SLOT_SIZE: usize = 0x1000;

/// Misc block: hardware reset control
pub const MISC_HWRESET: usize = 0x08;
/// Value that asserts the reset line
pub const HWRESET_TRIGGER: u32 = 2;

/// Contrast block: backlight level register
pub const CONTRAST_LEVEL: usize = 0x20;

/// Vectored interrupt controller
pub const VIC_PHYS_BASE: usize = 0xDC00_0000;
pub const VIC_VIRT_BASE: usize = 0xFEF2_0000;
pub const VIC_SIZE: usize = 0x1000;

/// Display controller (PL111 CLCD)
pub const LCD_PHYS_BASE: usize = 0xC000_0000;
pub const LCD_SIZE: usize = 0x1000;

/// USB host controller
pub const USB_PHYS_BASE: usize = 0xB000_0000;
pub const USB_SIZE: usize = 0x1000;

/// Early console: the UART slot inside the APB window
pub const EARLY_UART_VIRT_BASE: usize = APB_VIRT_BASE + APB_UART;

pub const APB_REGION: &str = "apb";
pub const VIC_REGION: &str = "vic";

/// Windows mapped before any driver runs
pub static IO_REGIONS: [MemoryRegion; 2] = [
    MemoryRegion::new(
        APB_REGION,
        APB_PHYS_BASE,
        APB_VIRT_BASE,
        APB_SIZE,
        AccessClass::Device,
    ),
    MemoryRegion::new(
        VIC_REGION,
        VIC_PHYS_BASE,
        VIC_VIRT_BASE,
        VIC_SIZE,
        AccessClass::Device,
    ),
];

const_assert!(APB_SIZE % PAGE_SIZE == 0);
const_assert!(VIC_SIZE % PAGE_SIZE == 0);
const_assert!(APB_VIRT_BASE + APB_SIZE <= VIC_VIRT_BASE);
const_assert!(APB_CONTRAST + APB_SLOT_SIZE <= APB_SIZE);
const_assert!(APB_MISC + MISC_HWRESET < APB_MISC + APB_SLOT_SIZE);
const_assert!(APB_TIMER1 + APB_SLOT_SIZE <= APB_SIZE);

// =============================================================================
// Interrupt wiring
// =============================================================================

pub const IRQ_UART: InterruptLine = InterruptLine::new(1);
pub const IRQ_USB: InterruptLine = InterruptLine::new(8);
pub const IRQ_KEYPAD: InterruptLine = InterruptLine::new(16);
pub const IRQ_TIMER0: InterruptLine = InterruptLine::new(17);
pub const IRQ_TIMER1: InterruptLine = InterruptLine::new(18);
pub const IRQ_LCD: InterruptLine = InterruptLine::new(21);

/// Lines 0-21 are wired to peripherals; 22-31 float
pub const IMPLEMENTED_IRQS: IrqMask = IrqMask::new(0x003F_FFFF);

// =============================================================================
// Clock tree
// =============================================================================

pub static CX_AHB_CLK: ClockSource = ClockSource::new("ahb_clk", 66_000_000);
pub static CX_APB_PCLK: ClockSource = ClockSource::new("apb_pclk", 33_000_000);
pub static CX_UART_CLK: ClockSource = ClockSource::new("uart_clk", 12_000_000);
pub static CX_TIMER_CLK: ClockSource = ClockSource::new("timer_clk", 32_768);

pub static CX_CLOCKS: [&ClockSource; 4] = [&CX_AHB_CLK, &CX_APB_PCLK, &CX_UART_CLK, &CX_TIMER_CLK];

pub static CX_CLOCK_BINDINGS: [ClockBinding; 8] = [
    ClockBinding::new("lcd", None, &CX_AHB_CLK),
    ClockBinding::new("lcd", Some("apb_pclk"), &CX_APB_PCLK),
    ClockBinding::new("uart", None, &CX_UART_CLK),
    ClockBinding::new("uart", Some("apb_pclk"), &CX_APB_PCLK),
    ClockBinding::new("keypad", None, &CX_APB_PCLK),
    ClockBinding::new("usb-host", None, &CX_AHB_CLK),
    ClockBinding::new("timer", None, &CX_TIMER_CLK),
    ClockBinding::new("timer", Some("apb_pclk"), &CX_APB_PCLK),
];

pub static CLASSIC_AHB_CLK: ClockSource = ClockSource::new("ahb_clk", 45_000_000);
pub static CLASSIC_APB_PCLK: ClockSource = ClockSource::new("apb_pclk", 22_500_000);
pub static CLASSIC_TIMER_CLK: ClockSource = ClockSource::new("timer_clk", 32_768);

pub static CLASSIC_CLOCKS: [&ClockSource; 3] =
    [&CLASSIC_AHB_CLK, &CLASSIC_APB_PCLK, &CLASSIC_TIMER_CLK];

// The classic UART is clocked straight from the APB bus.
pub static CLASSIC_CLOCK_BINDINGS: [ClockBinding; 6] = [
    ClockBinding::new("lcd", None, &CLASSIC_AHB_CLK),
    ClockBinding::new("lcd", Some("apb_pclk"), &CLASSIC_APB_PCLK),
    ClockBinding::new("uart", None, &CLASSIC_APB_PCLK),
    ClockBinding::new("keypad", None, &CLASSIC_APB_PCLK),
    ClockBinding::new("usb-host", None, &CLASSIC_AHB_CLK),
    ClockBinding::new("timer", None, &CLASSIC_TIMER_CLK),
];

// =============================================================================
// Timers
// =============================================================================

/// Dual SP804 timers of the CX
pub static CX_TIMERS: [SocTimer; 2] = [
    SocTimer::new(APB_PHYS_BASE + APB_TIMER0, Some(IRQ_TIMER0), TimerKind::Sp804),
    SocTimer::new(APB_PHYS_BASE + APB_TIMER1, Some(IRQ_TIMER1), TimerKind::Sp804),
];

/// Classic timer blocks at the same slots
pub static CLASSIC_TIMERS: [SocTimer; 2] = [
    SocTimer::new(APB_PHYS_BASE + APB_TIMER0, Some(IRQ_TIMER0), TimerKind::NspireClassic),
    SocTimer::new(APB_PHYS_BASE + APB_TIMER1, Some(IRQ_TIMER1), TimerKind::NspireClassic),
];
