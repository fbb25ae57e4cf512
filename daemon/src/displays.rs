//! Display name enumeration
//!
//! Names returned here are the ones passed to the applier's `--display`.

use anyhow::Result;

/// Source of the names of the displays attached to this machine
pub trait DisplaySource {
    fn display_names(&self) -> Result<Vec<String>>;
}

/// Displays reported by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDisplays;

impl DisplaySource for SystemDisplays {
    fn display_names(&self) -> Result<Vec<String>> {
        enumerate()
    }
}

/// GDI device names such as `\\.\DISPLAY1`
#[cfg(windows)]
fn enumerate() -> Result<Vec<String>> {
    use windows::core::BOOL;
    use windows::Win32::Foundation::{LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOEXW,
    };

    unsafe extern "system" fn collect(
        monitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let names = &mut *(lparam.0 as *mut Vec<String>);

        let mut info: MONITORINFOEXW = std::mem::zeroed();
        info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;

        if GetMonitorInfoW(monitor, &mut info as *mut MONITORINFOEXW as *mut MONITORINFO).as_bool() {
            let len = info.szDevice.iter().position(|&c| c == 0).unwrap_or(info.szDevice.len());
            names.push(String::from_utf16_lossy(&info.szDevice[..len]));
        }
        BOOL(1)
    }

    let mut names: Vec<String> = Vec::new();
    let ok = unsafe {
        EnumDisplayMonitors(
            None,
            None,
            Some(collect),
            LPARAM(&mut names as *mut Vec<String> as isize),
        )
    };
    if !ok.as_bool() {
        anyhow::bail!("EnumDisplayMonitors failed");
    }
    Ok(names)
}

/// Quartz display ids, rendered as `Display <id>`
#[cfg(target_os = "macos")]
fn enumerate() -> Result<Vec<String>> {
    use core_graphics::display::CGDisplay;

    let ids = CGDisplay::active_displays()
        .map_err(|code| anyhow::anyhow!("CGGetActiveDisplayList failed: {code}"))?;
    Ok(ids.into_iter().map(|id| format!("Display {id}")).collect())
}

/// Connected RandR output names such as `DP-1` or `HDMI-A-0`
#[cfg(all(unix, not(target_os = "macos")))]
fn enumerate() -> Result<Vec<String>> {
    use x11rb::connection::Connection;
    use x11rb::protocol::randr::{self, ConnectionExt as _};
    use x11rb::rust_connection::RustConnection;

    let (conn, screen_num) = RustConnection::connect(None)?;
    let root = conn
        .setup()
        .roots
        .get(screen_num)
        .map(|screen| screen.root)
        .ok_or_else(|| anyhow::anyhow!("no screen {screen_num}"))?;

    let resources = conn.randr_get_screen_resources_current(root)?.reply()?;
    let mut names = Vec::new();
    for output in resources.outputs {
        let info = conn
            .randr_get_output_info(output, resources.config_timestamp)?
            .reply()?;
        if info.connection == randr::Connection::CONNECTED {
            names.push(String::from_utf8_lossy(&info.name).into_owned());
        }
    }
    Ok(names)
}

#[cfg(not(any(windows, unix)))]
fn enumerate() -> Result<Vec<String>> {
    Ok(Vec::new())
}
