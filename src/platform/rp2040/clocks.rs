//! Clock tree setup.
//!
//! The bus loop has a few hundred nanoseconds per console access, so the
//! system clock runs at 250 MHz with the core voltage raised to 1.20 V.
//! The USB PLL stays at the usual 48 MHz.

use fugit::RateExtU32;
use rp2040_hal as hal;

use hal::clocks::{ClocksManager, InitError};
use hal::pac;
use hal::pll::{PLLConfig, common_configs::PLL_USB_48MHZ, setup_pll_blocking};
use hal::xosc::setup_xosc_blocking;
use hal::Watchdog;

/// Crystal on the Pico and most clones.
pub const XTAL_FREQ_HZ: u32 = 12_000_000;

/// 12 MHz * 125 = 1500 MHz VCO, / 6 / 1 = 250 MHz.
const PLL_SYS_250MHZ: PLLConfig = PLLConfig {
    vco_freq: fugit::HertzU32::MHz(1500),
    refdiv: 1,
    post_div1: 6,
    post_div2: 1,
};

/// VREG VSEL encoding for 1.20 V.
const VSEL_1V20: u8 = 0b1101;

/// Raise the core voltage and bring up the overclocked clock tree.
pub fn configure_overclock(
    xosc_dev: pac::XOSC,
    clocks_dev: pac::CLOCKS,
    pll_sys_dev: pac::PLL_SYS,
    pll_usb_dev: pac::PLL_USB,
    vreg: &mut pac::VREG_AND_CHIP_RESET,
    resets: &mut pac::RESETS,
    watchdog: &mut Watchdog,
) -> Result<ClocksManager, InitError> {
    vreg.vreg().modify(|_, w| unsafe { w.vsel().bits(VSEL_1V20) });
    // Let the regulator settle before speeding up
    cortex_m::asm::delay(XTAL_FREQ_HZ / 1000);

    let xosc = setup_xosc_blocking(xosc_dev, XTAL_FREQ_HZ.Hz()).map_err(InitError::XoscErr)?;
    watchdog.enable_tick_generation((XTAL_FREQ_HZ / 1_000_000) as u8);

    let mut clocks = ClocksManager::new(clocks_dev);

    let pll_sys = setup_pll_blocking(pll_sys_dev, xosc.operating_frequency(), PLL_SYS_250MHZ, &mut clocks, resets)
        .map_err(InitError::PllError)?;
    let pll_usb = setup_pll_blocking(pll_usb_dev, xosc.operating_frequency(), PLL_USB_48MHZ, &mut clocks, resets)
        .map_err(InitError::PllError)?;

    clocks.init_default(&xosc, &pll_sys, &pll_usb).map_err(InitError::ClockError)?;
    Ok(clocks)
}
